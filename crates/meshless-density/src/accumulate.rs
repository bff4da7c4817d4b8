//! Pairwise accumulation over one center's neighborhood.
//!
//! Every in-range neighbor contributes to the count, density and radius
//! sensitivity sums. Pairs at non-zero separation also feed the velocity
//! divergence, the moment matrix (fluid centers) and the [`PairPhysics`]
//! hook. All sums are plain additions or minima, so [`Accumulated::merge`]
//! combines partial results from any number of partitions in any order.

use crate::element::{Element, ElementId, ElementKind};
use crate::extension::{Extras, PairPhysics};
use crate::kernel::{InverseRadius, Kernel};
use crate::moment::SymMoment;
use glam::DVec3;
use meshless_space::{Candidate, Dimensions, NeighborQuery};
use serde::{Deserialize, Serialize};

/// The center fields a search needs, small enough to ship to a partition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Center {
    pub id: ElementId,
    pub kind: ElementKind,
    pub position: DVec3,
    pub velocity: DVec3,
    pub acceleration: DVec3,
    pub radius: f64,
    pub delayed: bool,
}

impl Center {
    pub fn of(element: &Element) -> Self {
        Self {
            id: element.id,
            kind: element.kind,
            position: element.position,
            velocity: element.velocity,
            acceleration: element.acceleration,
            radius: element.radius,
            delayed: element.delay_time > 0.0,
        }
    }
}

/// Geometry and kernel values for one in-range pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pair {
    /// `center − neighbor`, nearest image.
    pub offset: DVec3,
    pub distance: f64,
    /// `distance / radius`.
    pub u: f64,
    pub w: f64,
    pub dw: f64,
    /// `v_center − v_neighbor`.
    pub relative_velocity: DVec3,
}

/// Raw per-center sums for one pass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Accumulated {
    /// Σ W.
    pub weighted_count: f64,
    /// Σ m W.
    pub density: f64,
    /// Σ −(D W / h + u dW).
    pub radius_sensitivity: f64,
    /// Σ −dW (dp · dv) / r.
    pub velocity_divergence: f64,
    /// Σ W dp ⊗ dp, fluid centers only.
    pub moment: SymMoment,
    /// Σ −m (D W / h + u dW).
    pub hydro_sum: f64,
    pub extras: Extras,
}

impl Default for Accumulated {
    fn default() -> Self {
        Self::zeroed()
    }
}

impl Accumulated {
    pub fn zeroed() -> Self {
        Self {
            weighted_count: 0.0,
            density: 0.0,
            radius_sensitivity: 0.0,
            velocity_divergence: 0.0,
            moment: SymMoment::default(),
            hydro_sum: 0.0,
            extras: Extras::default(),
        }
    }

    /// Fold another partial result into this one.
    pub fn merge(&mut self, other: &Accumulated) {
        self.weighted_count += other.weighted_count;
        self.density += other.density;
        self.radius_sensitivity += other.radius_sensitivity;
        self.velocity_divergence += other.velocity_divergence;
        self.moment.merge(&other.moment);
        self.hydro_sum += other.hydro_sum;
        self.extras.merge(&other.extras);
    }
}

/// Applies the kernel and physics hook to candidate pairs.
pub struct Accumulator<'a, K: ?Sized, H: ?Sized> {
    kernel: &'a K,
    physics: &'a H,
    dims: Dimensions,
}

impl<K: ?Sized, H: ?Sized> Clone for Accumulator<'_, K, H> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K: ?Sized, H: ?Sized> Copy for Accumulator<'_, K, H> {}

impl<'a, K, H> Accumulator<'a, K, H>
where
    K: Kernel + ?Sized,
    H: PairPhysics + ?Sized,
{
    pub fn new(kernel: &'a K, physics: &'a H, dims: Dimensions) -> Self {
        Self {
            kernel,
            physics,
            dims,
        }
    }

    pub fn dims(&self) -> Dimensions {
        self.dims
    }

    /// Add one candidate to `out`. Out-of-range and excluded pairs are no-ops.
    pub fn add(
        &self,
        center: &Center,
        inv: &InverseRadius,
        neighbor: &Element,
        candidate: &Candidate,
        out: &mut Accumulated,
    ) {
        if neighbor.delay_time > 0.0 && !center.delayed {
            return;
        }
        if !(neighbor.mass > 0.0) {
            return;
        }
        if !(candidate.distance_sq < center.radius * center.radius) {
            return;
        }

        let distance = candidate.distance_sq.sqrt();
        let u = distance * inv.h;
        let (w, dw) = self.kernel.evaluate(u, inv);
        let d = self.dims.as_f64();
        let sensitivity = -(d * inv.h * w + u * dw);

        out.weighted_count += w;
        out.density += neighbor.mass * w;
        out.radius_sensitivity += sensitivity;
        out.hydro_sum += neighbor.mass * sensitivity;

        let relative_velocity = center.velocity - neighbor.velocity;
        let pair = Pair {
            offset: candidate.offset,
            distance,
            u,
            w,
            dw,
            relative_velocity,
        };

        if distance > 0.0 {
            if center.kind == ElementKind::Gas {
                out.moment.add_outer(w, candidate.offset);
            }
            out.velocity_divergence -= dw * candidate.offset.dot(relative_velocity) / distance;
            self.physics.accumulate(center, &pair, neighbor, &mut out.extras);
        } else {
            self.physics.accumulate_self(center, &pair, neighbor, &mut out.extras);
        }
    }

    /// Sum every candidate a query returns.
    pub fn evaluate<Q: NeighborQuery + ?Sized>(
        &self,
        center: &Center,
        elements: &[Element],
        query: &Q,
    ) -> Accumulated {
        let mut out = Accumulated::zeroed();
        if !(center.radius > 0.0) {
            return out;
        }
        let inv = InverseRadius::new(center.radius, self.dims);
        for candidate in query.query(center.position, center.radius) {
            self.add(center, &inv, &elements[candidate.index], &candidate, &mut out);
        }
        out
    }
}

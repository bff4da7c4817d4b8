//! Physics riding on the density neighbor walk.
//!
//! The core accumulator knows about counts, density, divergence and the
//! moment matrix. Everything else (sink bookkeeping, grain drag inputs,
//! feedback statistics, viscosity tensors) goes through [`PairPhysics`],
//! which sees each in-range pair once and writes into [`Extras`].
//!
//! A hook may touch the neighbor only through [`CaptureFlags`](crate::CaptureFlags),
//! whose single mutation is an idempotent store. Radii and convergence state
//! of neighbors are out of reach.

use crate::accumulate::{Center, Pair};
use crate::config::PhysicsToggles;
use crate::element::{Element, ElementKind, TIME_BINS};
use glam::{DMat3, DVec3};
use meshless_space::Dimensions;
use serde::{Deserialize, Serialize};

/// Per-center sums contributed by [`PairPhysics`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Extras {
    /// Σ m_j W v_j over non-self gas neighbors.
    pub gas_velocity: DVec3,
    /// Σ m_j W u_j.
    pub gas_internal_energy: f64,
    /// Σ (m_j dW / r) dp.
    pub density_gradient: DVec3,
    /// Σ (1 − u²).
    pub source_kernel_sum: f64,
    /// min sqrt(s_j² + r²).
    pub nearest_gas_distance: f64,
    /// min time bin seen.
    pub min_neighbor_time_bin: u8,
    /// Σ m_j W v_j including the self pair.
    pub mesh_velocity: DVec3,
    /// Σ W dv ⊗ dp.
    pub velocity_shear: DMat3,
    /// Σ W da ⊗ dp.
    pub acceleration_shear: DMat3,
}

impl Default for Extras {
    fn default() -> Self {
        Self {
            gas_velocity: DVec3::ZERO,
            gas_internal_energy: 0.0,
            density_gradient: DVec3::ZERO,
            source_kernel_sum: 0.0,
            nearest_gas_distance: f64::MAX,
            min_neighbor_time_bin: TIME_BINS,
            mesh_velocity: DVec3::ZERO,
            velocity_shear: DMat3::ZERO,
            acceleration_shear: DMat3::ZERO,
        }
    }
}

impl Extras {
    /// Sums add; minima take the smaller side.
    pub fn merge(&mut self, other: &Extras) {
        self.gas_velocity += other.gas_velocity;
        self.gas_internal_energy += other.gas_internal_energy;
        self.density_gradient += other.density_gradient;
        self.source_kernel_sum += other.source_kernel_sum;
        self.nearest_gas_distance = self.nearest_gas_distance.min(other.nearest_gas_distance);
        self.min_neighbor_time_bin = self.min_neighbor_time_bin.min(other.min_neighbor_time_bin);
        self.mesh_velocity += other.mesh_velocity;
        self.velocity_shear += other.velocity_shear;
        self.acceleration_shear += other.acceleration_shear;
    }
}

/// Extension point called for every in-range pair.
pub trait PairPhysics: Send + Sync {
    /// A pair at non-zero separation.
    fn accumulate(&self, center: &Center, pair: &Pair, neighbor: &Element, extras: &mut Extras);

    /// The zero-separation pair, normally the center itself.
    fn accumulate_self(&self, _center: &Center, _pair: &Pair, _neighbor: &Element, _extras: &mut Extras) {}
}

/// Core sums only.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoExtraPhysics;

impl PairPhysics for NoExtraPhysics {
    fn accumulate(&self, _center: &Center, _pair: &Pair, _neighbor: &Element, _extras: &mut Extras) {}
}

/// The built-in sink, grain, feedback and fluid-diagnostic sums.
#[derive(Debug, Clone, Copy)]
pub struct StandardPhysics {
    toggles: PhysicsToggles,
    dims: Dimensions,
}

impl StandardPhysics {
    pub fn new(toggles: PhysicsToggles, dims: Dimensions) -> Self {
        Self { toggles, dims }
    }
}

fn outer(a: DVec3, b: DVec3) -> DMat3 {
    DMat3::from_cols(a * b.x, a * b.y, a * b.z)
}

impl PairPhysics for StandardPhysics {
    fn accumulate(&self, center: &Center, pair: &Pair, neighbor: &Element, extras: &mut Extras) {
        let mw = neighbor.mass * pair.w;
        match center.kind {
            ElementKind::Sink if self.toggles.sinks => {
                neighbor.capture.clear();
                extras.min_neighbor_time_bin = extras.min_neighbor_time_bin.min(neighbor.time_bin);
                let size = neighbor.spacing(self.dims);
                let effective = (size * size + pair.distance * pair.distance).sqrt();
                extras.nearest_gas_distance = extras.nearest_gas_distance.min(effective);
            }
            ElementKind::Grain if self.toggles.grains => {
                extras.gas_velocity += mw * neighbor.velocity;
                extras.gas_internal_energy += mw * neighbor.internal_energy;
            }
            ElementKind::Star if self.toggles.feedback => {
                extras.density_gradient += (neighbor.mass * pair.dw / pair.distance) * pair.offset;
            }
            ElementKind::Source if self.toggles.radiation => {
                extras.density_gradient += (neighbor.mass * pair.dw / pair.distance) * pair.offset;
                extras.source_kernel_sum += 1.0 - pair.u * pair.u;
            }
            ElementKind::Gas => {
                if self.toggles.turbulence {
                    extras.gas_velocity += mw * neighbor.velocity;
                }
                if self.toggles.mesh_motion {
                    extras.mesh_velocity += mw * neighbor.velocity;
                }
                if self.toggles.viscosity_switch {
                    let da = center.acceleration - neighbor.acceleration;
                    extras.acceleration_shear += outer(da, pair.offset) * pair.w;
                    extras.velocity_shear += outer(pair.relative_velocity, pair.offset) * pair.w;
                }
            }
            _ => {}
        }
    }

    fn accumulate_self(&self, center: &Center, pair: &Pair, neighbor: &Element, extras: &mut Extras) {
        match center.kind {
            ElementKind::Gas if self.toggles.mesh_motion => {
                extras.mesh_velocity += neighbor.mass * pair.w * neighbor.velocity;
            }
            ElementKind::Source if self.toggles.radiation => {
                extras.source_kernel_sum += 1.0 - pair.u * pair.u;
            }
            _ => {}
        }
    }
}

//! Elements and their derived per-step outputs.
//!
//! An [`Element`] is owned by the caller's table. The solver reads its
//! kinematics and mass, writes its interaction radius, and fills
//! [`HydroState`] with everything derived from the final neighborhood.

use glam::{DMat3, DVec3};
use meshless_space::Dimensions;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Stable element identifier.
pub type ElementId = u64;

/// Number of time bins; also the "no neighbor seen" sentinel for bin minima.
pub const TIME_BINS: u8 = 60;

/// Participant kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementKind {
    /// Fluid sample point.
    Gas,
    /// Accreting sink.
    Sink,
    /// Dust grain embedded in the fluid.
    Grain,
    /// Star needing local gas statistics for feedback.
    Star,
    /// Radiation source injecting into nearby gas.
    Source,
    /// Pure N-body matter; never participates.
    Collisionless,
}

impl ElementKind {
    pub const ALL: [ElementKind; 6] = [
        ElementKind::Gas,
        ElementKind::Sink,
        ElementKind::Grain,
        ElementKind::Star,
        ElementKind::Source,
        ElementKind::Collisionless,
    ];

    /// Gas is the only kind that appears in neighbor searches.
    pub const fn is_searchable(self) -> bool {
        matches!(self, ElementKind::Gas)
    }
}

/// Cross-element bookkeeping that sinks may clear on their neighbors.
///
/// Written concurrently by every sink whose search reaches this element, so
/// the only mutation offered is an idempotent store.
#[derive(Debug, Default)]
pub struct CaptureFlags {
    pending: AtomicU64,
}

impl CaptureFlags {
    pub fn new(pending: u64) -> Self {
        Self {
            pending: AtomicU64::new(pending),
        }
    }

    /// Id of the sink that has claimed this element, 0 if none.
    pub fn pending(&self) -> u64 {
        self.pending.load(Ordering::Relaxed)
    }

    pub fn clear(&self) {
        self.pending.store(0, Ordering::Relaxed);
    }

    pub fn claim(&self, sink: u64) {
        self.pending.store(sink, Ordering::Relaxed);
    }
}

impl Clone for CaptureFlags {
    fn clone(&self) -> Self {
        Self::new(self.pending())
    }
}

/// Neighborhood statistics gathered for non-fluid centers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Surroundings {
    /// Kernel-weighted gas density around the element.
    pub gas_density: f64,
    /// Gas velocity average (grains).
    pub gas_velocity: DVec3,
    /// Gas specific energy average (grains).
    pub gas_internal_energy: f64,
    /// Kernel-derivative density gradient (stars, sources).
    pub density_gradient: DVec3,
    /// Σ(1 − u²) over neighbors (sources).
    pub source_kernel_sum: f64,
    /// Closest effective distance to a gas neighbor (sinks).
    pub nearest_gas_distance: f64,
    /// Smallest time bin among neighbors (sinks).
    pub min_neighbor_time_bin: u8,
}

impl Default for Surroundings {
    fn default() -> Self {
        Self {
            gas_density: 0.0,
            gas_velocity: DVec3::ZERO,
            gas_internal_energy: 0.0,
            density_gradient: DVec3::ZERO,
            source_kernel_sum: 0.0,
            nearest_gas_distance: f64::MAX,
            min_neighbor_time_bin: TIME_BINS,
        }
    }
}

/// Velocity-gradient diagnostics for the artificial viscosity switch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ShearDiagnostics {
    pub divergence: f64,
    /// Σ S_ij² of the trace-free symmetric shear.
    pub shear_squared: f64,
    /// Time derivative of the divergence.
    pub divergence_rate: f64,
}

/// Everything the solver derives for one element.
#[derive(Debug, Clone, PartialEq)]
pub struct HydroState {
    /// Neighbor count integrated over the kernel volume.
    pub neighbor_count: f64,
    pub density: f64,
    pub pressure: f64,
    /// `1 / (1 + (h/(D N)) dN/dh)`-style sensitivity used for radius steps.
    pub radius_sensitivity: f64,
    pub velocity_divergence: f64,
    /// Inverse of the neighbor second-moment matrix; zero when unreliable.
    pub gradient_matrix: DMat3,
    pub gradient_reliable: bool,
    /// Conditioning carried across steps; starts at 1.
    pub condition_number: f64,
    /// Kernel-sum density derivative correction.
    pub hydro_sum_factor: f64,
    pub mesh_velocity: DVec3,
    pub smoothed_velocity: DVec3,
    pub shear: Option<ShearDiagnostics>,
    pub surroundings: Surroundings,
}

impl Default for HydroState {
    fn default() -> Self {
        Self {
            neighbor_count: 0.0,
            density: 0.0,
            pressure: 0.0,
            radius_sensitivity: 1.0,
            velocity_divergence: 0.0,
            gradient_matrix: DMat3::ZERO,
            gradient_reliable: false,
            condition_number: 1.0,
            hydro_sum_factor: 0.0,
            mesh_velocity: DVec3::ZERO,
            smoothed_velocity: DVec3::ZERO,
            shear: None,
            surroundings: Surroundings::default(),
        }
    }
}

/// One discretization point.
#[derive(Debug, Clone)]
pub struct Element {
    pub id: ElementId,
    pub kind: ElementKind,
    pub position: DVec3,
    pub velocity: DVec3,
    pub acceleration: DVec3,
    pub mass: f64,
    /// Interaction radius; solved for.
    pub radius: f64,
    pub internal_energy: f64,
    pub time_bin: u8,
    /// Positive while the element is hydrodynamically decoupled.
    pub delay_time: f64,
    /// Age in Gyr for stars and sources.
    pub stellar_age: Option<f64>,
    /// A supernova fires from this element during the current step.
    pub supernova_pending: bool,
    pub capture: CaptureFlags,
    pub hydro: HydroState,
}

impl Element {
    pub fn new(id: ElementId, kind: ElementKind, position: DVec3, mass: f64, radius: f64) -> Self {
        Self {
            id,
            kind,
            position,
            velocity: DVec3::ZERO,
            acceleration: DVec3::ZERO,
            mass,
            radius,
            internal_energy: 0.0,
            time_bin: 0,
            delay_time: 0.0,
            stellar_age: None,
            supernova_pending: false,
            capture: CaptureFlags::default(),
            hydro: HydroState::default(),
        }
    }

    pub fn gas(id: ElementId, position: DVec3, mass: f64, radius: f64) -> Self {
        Self::new(id, ElementKind::Gas, position, mass, radius)
    }

    pub fn with_velocity(mut self, velocity: DVec3) -> Self {
        self.velocity = velocity;
        self
    }

    pub fn with_acceleration(mut self, acceleration: DVec3) -> Self {
        self.acceleration = acceleration;
        self
    }

    pub fn with_internal_energy(mut self, u: f64) -> Self {
        self.internal_energy = u;
        self
    }

    pub fn with_stellar_age(mut self, age: f64) -> Self {
        self.stellar_age = Some(age);
        self
    }

    pub fn with_time_bin(mut self, bin: u8) -> Self {
        self.time_bin = bin;
        self
    }

    /// Characteristic inter-element spacing: `h / N^(1/D)`.
    pub fn spacing(&self, dims: Dimensions) -> f64 {
        let n = self.hydro.neighbor_count;
        if n > 0.0 {
            self.radius / dims.root(n)
        } else {
            self.radius
        }
    }
}

/// Per-step inputs that are not properties of any element.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StepContext {
    /// First step of a run; tightens the base deviation.
    pub first_step: bool,
    /// Every element is synchronized this step.
    pub full_step: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_state_has_unit_conditioning() {
        let e = Element::gas(1, DVec3::ZERO, 1.0, 0.1);
        assert_eq!(e.hydro.condition_number, 1.0);
        assert_eq!(e.hydro.surroundings.min_neighbor_time_bin, TIME_BINS);
        assert!(!e.hydro.gradient_reliable);
    }

    #[test]
    fn capture_clear_is_idempotent() {
        let flags = CaptureFlags::new(42);
        let copy = flags.clone();
        flags.clear();
        flags.clear();
        assert_eq!(flags.pending(), 0);
        assert_eq!(copy.pending(), 42, "clone must not share storage");
    }

    #[test]
    fn spacing_falls_back_to_radius() {
        let mut e = Element::gas(1, DVec3::ZERO, 1.0, 2.0);
        assert_eq!(e.spacing(Dimensions::Three), 2.0);
        e.hydro.neighbor_count = 8.0;
        assert!((e.spacing(Dimensions::Three) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn only_gas_is_searchable() {
        let searchable: Vec<ElementKind> = ElementKind::ALL.into_iter().filter(|k| k.is_searchable()).collect();
        assert_eq!(searchable, vec![ElementKind::Gas]);
    }
}

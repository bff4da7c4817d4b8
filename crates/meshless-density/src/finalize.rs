//! Turning raw sums into per-element outputs.
//!
//! [`normalize`] runs after every pass: the solver needs the normalized
//! count, the radius sensitivity and the moment inversion to decide the next
//! radius. [`Finalizer::apply`] runs once per element per step, on the sums
//! from its last pass, and does everything that must not see an unconverged
//! radius: final density, pressure, mesh drift and the viscosity tensors.

use crate::accumulate::Accumulated;
use crate::config::{DensityEstimator, SolverConfig};
use crate::element::{Element, ElementKind, ShearDiagnostics};
use crate::eos::EquationOfState;
use crate::moment::{invert, Inversion};
use glam::DMat3;
use meshless_space::Dimensions;

/// Sensitivities at or below this are treated as unusable.
const SENSITIVITY_FLOOR: f64 = -0.9;

/// Weight of the element's own velocity in mesh drift blending.
const MESH_SELF_WEIGHT: f64 = 0.7;

/// Pass-level quantities derived from raw sums.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Normalized {
    pub neighbor_count: f64,
    pub sensitivity: f64,
    pub velocity_divergence: f64,
    /// Present for fluid centers.
    pub inversion: Option<Inversion>,
}

/// Normalize one pass's sums at `radius`.
pub fn normalize(sums: &Accumulated, radius: f64, kind: ElementKind, dims: Dimensions) -> Normalized {
    let (raw_sensitivity, mut divergence, count) = if sums.weighted_count > 0.0 {
        (
            sums.radius_sensitivity * radius / (dims.as_f64() * sums.weighted_count),
            sums.velocity_divergence / sums.weighted_count,
            sums.weighted_count * dims.ball_volume(radius),
        )
    } else {
        (0.0, 0.0, 0.0)
    };

    let sensitivity = if raw_sensitivity > SENSITIVITY_FLOOR {
        1.0 / (1.0 + raw_sensitivity)
    } else {
        1.0
    };
    divergence *= sensitivity;

    let inversion = (kind == ElementKind::Gas).then(|| invert(&sums.moment, dims));

    Normalized {
        neighbor_count: count,
        sensitivity,
        velocity_divergence: divergence,
        inversion,
    }
}

/// Mass-and-volume density for the fixed-neighbor-number estimator.
///
/// With no neighbors at all (not even itself) the element falls back to its
/// own mass spread over its kernel volume; a non-positive radius gives 0.
pub fn neighbor_number_density(mass: f64, count: f64, radius: f64, dims: Dimensions) -> f64 {
    if radius <= 0.0 {
        return 0.0;
    }
    let volume = dims.ball_volume(radius);
    if count > 0.0 {
        mass * count / volume
    } else {
        mass / volume
    }
}

/// Once-per-step output stage.
pub struct Finalizer<'a, E: ?Sized> {
    config: &'a SolverConfig,
    eos: &'a E,
}

impl<'a, E: EquationOfState + ?Sized> Finalizer<'a, E> {
    pub fn new(config: &'a SolverConfig, eos: &'a E) -> Self {
        Self { config, eos }
    }

    /// Write final outputs for `element` from its last pass.
    pub fn apply(&self, element: &mut Element, sums: &Accumulated) {
        match element.kind {
            ElementKind::Gas if element.mass > 0.0 => self.apply_gas(element, sums),
            ElementKind::Gas => {}
            ElementKind::Grain => {
                let s = &mut element.hydro.surroundings;
                s.gas_density = sums.density;
                if sums.density > 0.0 {
                    s.gas_velocity = sums.extras.gas_velocity / sums.density;
                    s.gas_internal_energy = sums.extras.gas_internal_energy / sums.density;
                } else {
                    s.gas_velocity = glam::DVec3::ZERO;
                    s.gas_internal_energy = 0.0;
                }
            }
            ElementKind::Star | ElementKind::Source => {
                let s = &mut element.hydro.surroundings;
                s.gas_density = sums.density;
                s.density_gradient = sums.extras.density_gradient;
                s.source_kernel_sum = sums.extras.source_kernel_sum;
            }
            ElementKind::Sink => {
                let s = &mut element.hydro.surroundings;
                s.gas_density = sums.density;
                s.nearest_gas_distance = sums.extras.nearest_gas_distance;
                s.min_neighbor_time_bin = sums.extras.min_neighbor_time_bin;
            }
            ElementKind::Collisionless => {}
        }
    }

    fn apply_gas(&self, element: &mut Element, sums: &Accumulated) {
        let dims = self.config.dimensions;
        let physics = &self.config.physics;
        let rho = sums.density;
        let h = element.radius;
        let velocity = element.velocity;
        let hydro = &mut element.hydro;

        if rho > 0.0 {
            if physics.mesh_motion {
                hydro.mesh_velocity = MESH_SELF_WEIGHT * velocity
                    + (1.0 - MESH_SELF_WEIGHT) * sums.extras.mesh_velocity / rho;
            }
            if physics.viscosity_switch {
                hydro.shear = Some(shear_diagnostics(
                    &sums.extras.velocity_shear,
                    &sums.extras.acceleration_shear,
                    &hydro.gradient_matrix,
                    dims,
                ));
            }
            if physics.turbulence {
                hydro.smoothed_velocity = sums.extras.gas_velocity / rho;
            }
            hydro.hydro_sum_factor = if sums.weighted_count > 0.0 {
                -hydro.radius_sensitivity * sums.hydro_sum * h / (dims.as_f64() * sums.weighted_count)
            } else {
                0.0
            };
        } else {
            hydro.hydro_sum_factor = 0.0;
        }

        hydro.density = match self.config.density_estimator {
            DensityEstimator::KernelSum => rho,
            DensityEstimator::NeighborNumber => {
                neighbor_number_density(element.mass, hydro.neighbor_count, h, dims)
            }
        };
        let density = hydro.density;
        element.hydro.pressure = self.eos.pressure(element, density);
    }
}

/// Velocity-gradient diagnostics from the shear sums and `T⁻¹`.
pub fn shear_diagnostics(
    velocity_shear: &DMat3,
    acceleration_shear: &DMat3,
    inverse_moment: &DMat3,
    dims: Dimensions,
) -> ShearDiagnostics {
    let v = *velocity_shear * *inverse_moment;
    let a = *acceleration_shear * *inverse_moment;
    let trace = |m: &DMat3| m.x_axis.x + m.y_axis.y + m.z_axis.z;

    let divergence = trace(&v);
    let mut s = (v + v.transpose()) * 0.5;
    let iso = divergence / dims.as_f64();
    for axis in 0..dims.count() {
        *s.col_mut(axis) -= glam::DVec3::AXES[axis] * iso;
    }
    let shear_squared = s.to_cols_array().iter().map(|x| x * x).sum();
    let divergence_rate = trace(&(a - v * v));

    ShearDiagnostics {
        divergence,
        shear_squared,
        divergence_rate,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eos::IdealGas;
    use glam::DVec3;

    #[test]
    fn empty_sums_normalize_to_zero() {
        let n = normalize(&Accumulated::zeroed(), 1.0, ElementKind::Gas, Dimensions::Three);
        assert_eq!(n.neighbor_count, 0.0);
        assert_eq!(n.velocity_divergence, 0.0);
        assert_eq!(n.sensitivity, 1.0);
        assert!(!n.inversion.unwrap().reliable);
    }

    #[test]
    fn count_is_weight_times_ball_volume() {
        let sums = Accumulated {
            weighted_count: 2.0,
            ..Accumulated::zeroed()
        };
        let n = normalize(&sums, 0.5, ElementKind::Sink, Dimensions::Two);
        assert!((n.neighbor_count - 2.0 * std::f64::consts::PI * 0.25).abs() < 1e-12);
        assert!(n.inversion.is_none());
    }

    #[test]
    fn strongly_negative_sensitivity_is_ignored() {
        let sums = Accumulated {
            weighted_count: 1.0,
            radius_sensitivity: -10.0,
            ..Accumulated::zeroed()
        };
        let n = normalize(&sums, 1.0, ElementKind::Gas, Dimensions::One);
        assert_eq!(n.sensitivity, 1.0);
    }

    #[test]
    fn lone_element_density_fallback() {
        let d = neighbor_number_density(2.0, 0.0, 1.0, Dimensions::Three);
        assert!((d - 2.0 / (4.0 * std::f64::consts::PI / 3.0)).abs() < 1e-12);
        assert_eq!(neighbor_number_density(2.0, 0.0, 0.0, Dimensions::Three), 0.0);
    }

    #[test]
    fn grain_without_gas_gets_zero_averages() {
        let config = SolverConfig::default();
        let eos = IdealGas::default();
        let fin = Finalizer::new(&config, &eos);
        let mut grain = Element::new(0, ElementKind::Grain, DVec3::ZERO, 1.0, 1.0);
        grain.hydro.surroundings.gas_velocity = DVec3::ONE;
        fin.apply(&mut grain, &Accumulated::zeroed());
        assert_eq!(grain.hydro.surroundings.gas_velocity, DVec3::ZERO);
        assert_eq!(grain.hydro.surroundings.gas_density, 0.0);
    }

    #[test]
    fn gas_pressure_uses_final_density() {
        let config = SolverConfig {
            density_estimator: DensityEstimator::KernelSum,
            ..SolverConfig::default()
        };
        let eos = IdealGas { gamma: 2.0 };
        let fin = Finalizer::new(&config, &eos);
        let mut gas = Element::gas(0, DVec3::ZERO, 1.0, 1.0).with_internal_energy(3.0);
        let sums = Accumulated {
            weighted_count: 1.0,
            density: 0.5,
            ..Accumulated::zeroed()
        };
        fin.apply(&mut gas, &sums);
        assert_eq!(gas.hydro.density, 0.5);
        assert!((gas.hydro.pressure - 1.5).abs() < 1e-12);
    }

    #[test]
    fn uniform_expansion_has_no_shear() {
        // v = x: dv ⊗ dp = dp ⊗ dp, so V = T T⁻¹ = I
        let t = DMat3::from_diagonal(DVec3::new(2.0, 3.0, 4.0));
        let diag = shear_diagnostics(&t, &DMat3::ZERO, &t.inverse(), Dimensions::Three);
        assert!((diag.divergence - 3.0).abs() < 1e-12);
        assert!(diag.shear_squared.abs() < 1e-12);
        // d(div v)/dt = tr(0 - I) = -3
        assert!((diag.divergence_rate + 3.0).abs() < 1e-12);
    }

    #[test]
    fn mesh_velocity_blends_toward_flow() {
        let mut config = SolverConfig::default();
        config.physics.mesh_motion = true;
        let eos = IdealGas::default();
        let fin = Finalizer::new(&config, &eos);
        let mut gas = Element::gas(0, DVec3::ZERO, 1.0, 1.0).with_velocity(DVec3::X);
        let mut sums = Accumulated {
            weighted_count: 1.0,
            density: 2.0,
            ..Accumulated::zeroed()
        };
        sums.extras.mesh_velocity = DVec3::Y * 2.0;
        fin.apply(&mut gas, &sums);
        assert!((gas.hydro.mesh_velocity - DVec3::new(0.7, 0.3, 0.0)).length() < 1e-12);
    }
}

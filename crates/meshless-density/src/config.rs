//! Solver configuration.
//!
//! [`SolverConfig`] is plain serde data with a default for every field, so a
//! JSON file only needs to name what it changes. [`SolverConfig::from_env`]
//! overlays the handful of knobs that are commonly tweaked per run.

use crate::{ElementKind, Error, Result};
use meshless_space::{DVec3, Dimensions, PeriodicBox};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// How the final density is obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DensityEstimator {
    /// `ρ = Σ m_j W(r_ij, h)`.
    KernelSum,
    /// `ρ = m N / V(h)`, the fixed-neighbor-number discretization.
    #[default]
    NeighborNumber,
}

/// Tolerance rule for a kind's neighbor count.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum DeviationRule {
    /// The global deviation, widened with iteration count.
    Global,
    /// A fixed tolerance.
    Absolute(f64),
    /// A fixed fraction of the kind's target.
    FractionOfTarget(f64),
}

/// Per-kind overrides.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KindProfile {
    /// Multiplier on the global target.
    pub target_factor: f64,
    /// Lower bound on the kind's target.
    pub target_floor: f64,
    pub deviation: DeviationRule,
    /// Overrides the global minimum radius.
    pub min_radius: Option<f64>,
    /// Overrides the global maximum radius.
    pub max_radius: Option<f64>,
    /// Inflate the target from the moment-matrix condition number.
    pub conditioning: bool,
}

impl Default for KindProfile {
    fn default() -> Self {
        Self {
            target_factor: 1.0,
            target_floor: 0.0,
            deviation: DeviationRule::Global,
            min_radius: None,
            max_radius: None,
            conditioning: false,
        }
    }
}

impl KindProfile {
    pub fn gas() -> Self {
        Self {
            conditioning: true,
            ..Self::default()
        }
    }

    /// Sinks look for `factor` times the target with a tolerance of `4(factor + 1)`.
    pub fn sink(factor: f64) -> Self {
        Self {
            target_factor: factor,
            deviation: DeviationRule::Absolute(4.0 * (factor + 1.0)),
            ..Self::default()
        }
    }

    pub fn grain() -> Self {
        Self {
            deviation: DeviationRule::FractionOfTarget(0.25),
            ..Self::default()
        }
    }

    /// Stars and sources only need rough local statistics.
    pub fn point_statistics() -> Self {
        Self {
            target_floor: 64.0,
            deviation: DeviationRule::FractionOfTarget(0.5),
            ..Self::default()
        }
    }
}

/// One profile per participating kind.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KindProfiles {
    pub gas: KindProfile,
    pub sink: KindProfile,
    pub grain: KindProfile,
    pub star: KindProfile,
    pub source: KindProfile,
}

impl Default for KindProfiles {
    fn default() -> Self {
        Self {
            gas: KindProfile::gas(),
            sink: KindProfile::sink(1.0),
            grain: KindProfile::grain(),
            star: KindProfile::point_statistics(),
            source: KindProfile::point_statistics(),
        }
    }
}

impl KindProfiles {
    /// Profile for `kind`; collisionless elements fall back to the gas profile
    /// but never reach the solver.
    pub fn get(&self, kind: ElementKind) -> &KindProfile {
        match kind {
            ElementKind::Gas | ElementKind::Collisionless => &self.gas,
            ElementKind::Sink => &self.sink,
            ElementKind::Grain => &self.grain,
            ElementKind::Star => &self.star,
            ElementKind::Source => &self.source,
        }
    }
}

/// Which optional physics participates in the neighbor walk and finalize.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsToggles {
    pub sinks: bool,
    pub grains: bool,
    /// Stars gather gas statistics for feedback.
    pub feedback: bool,
    /// Sources gather gas statistics for radiation injection.
    pub radiation: bool,
    /// Blend mesh-point velocity toward the local gas flow.
    pub mesh_motion: bool,
    /// Velocity-gradient tensors for the viscosity switch.
    pub viscosity_switch: bool,
    /// Kernel-smoothed velocity for turbulence driving.
    pub turbulence: bool,
    /// Sources are active while younger than this many Gyr.
    pub source_age_window: f64,
    /// Stars younger than this many Gyr always refresh their statistics.
    pub young_star_age: f64,
}

impl Default for PhysicsToggles {
    fn default() -> Self {
        Self {
            sinks: true,
            grains: true,
            feedback: false,
            radiation: false,
            mesh_motion: false,
            viscosity_switch: false,
            turbulence: false,
            source_age_window: 0.1,
            young_star_age: 0.035,
        }
    }
}

/// Radius step heuristics. None of these affect correctness, only speed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StepTuning {
    /// Largest log-step when only a lower bound is known.
    pub max_log_growth: f64,
    /// Largest log-shrink when only an upper bound is known.
    pub max_log_shrink: f64,
    /// Extra log-step allowed beyond the plain estimate when near target.
    pub near_target_slack: f64,
    /// Fraction of `ln(upper/lower)` a bracketed step may move.
    pub bracket_jump: f64,
    /// Relative bracket width below which an element counts as converged.
    pub bracket_tolerance: f64,
    /// Step multiplier once the sensitivity is stuck at exactly 1.
    pub stuck_boost: f64,
}

impl Default for StepTuning {
    fn default() -> Self {
        Self {
            max_log_growth: 1.4,
            max_log_shrink: 1.535,
            near_target_slack: 0.231,
            bracket_jump: 0.2,
            bracket_tolerance: 1.0e-3,
            stuck_boost: 10.0,
        }
    }
}

/// Everything the radius solver needs to know up front.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    pub dimensions: Dimensions,
    pub target_neighbors: f64,
    pub neighbor_deviation: f64,
    pub min_radius: f64,
    pub max_radius: f64,
    pub condition_danger: f64,
    pub max_iterations: usize,
    pub initial_step_deviation_cap: f64,
    pub density_estimator: DensityEstimator,
    pub profiles: KindProfiles,
    pub physics: PhysicsToggles,
    pub tuning: StepTuning,
    /// Number of slabs the searchable elements are split into.
    pub partitions: usize,
    /// Periodic box edge lengths; open boundaries when absent.
    pub periodic_box: Option<[f64; 3]>,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            dimensions: Dimensions::Three,
            target_neighbors: 32.0,
            neighbor_deviation: 1.0,
            min_radius: 0.0,
            max_radius: f64::MAX,
            condition_danger: 1000.0,
            max_iterations: 200,
            initial_step_deviation_cap: 0.05,
            density_estimator: DensityEstimator::default(),
            profiles: KindProfiles::default(),
            physics: PhysicsToggles::default(),
            tuning: StepTuning::default(),
            partitions: 1,
            periodic_box: None,
        }
    }
}

impl SolverConfig {
    /// Defaults overlaid with `MESHLESS_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::default().with_env()
    }

    /// Read a JSON file, then validate.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::InvalidConfig(format!("{}: {}", path.display(), e)))?;
        let config = Self::from_json(&text)?;
        Ok(config)
    }

    /// Parse JSON, then validate.
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(text).map_err(|e| Error::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Overlay environment variables on this config.
    pub fn with_env(mut self) -> Result<Self> {
        if let Some(v) = env_number("MESHLESS_TARGET_NEIGHBORS")? {
            self.target_neighbors = v;
        }
        if let Some(v) = env_number("MESHLESS_MAX_ITERATIONS")? {
            self.max_iterations = v as usize;
        }
        if let Some(v) = env_number("MESHLESS_MIN_RADIUS")? {
            self.min_radius = v;
        }
        if let Some(v) = env_number("MESHLESS_MAX_RADIUS")? {
            self.max_radius = v;
        }
        self.validate()?;
        Ok(self)
    }

    /// Reject settings the solver cannot work with.
    pub fn validate(&self) -> Result<()> {
        let fail = |msg: String| Err(Error::InvalidConfig(msg));
        if !(self.target_neighbors > 0.0 && self.target_neighbors.is_finite()) {
            return fail(format!("target_neighbors must be positive, got {}", self.target_neighbors));
        }
        if !(self.neighbor_deviation > 0.0 && self.neighbor_deviation.is_finite()) {
            return fail(format!("neighbor_deviation must be positive, got {}", self.neighbor_deviation));
        }
        if !(self.min_radius >= 0.0) || !(self.max_radius > self.min_radius) {
            return fail(format!(
                "radius limits must satisfy 0 <= min < max, got [{}, {}]",
                self.min_radius, self.max_radius
            ));
        }
        if !(self.condition_danger > 0.0) {
            return fail(format!("condition_danger must be positive, got {}", self.condition_danger));
        }
        if self.max_iterations <= 10 {
            return fail(format!("max_iterations must exceed 10, got {}", self.max_iterations));
        }
        if self.partitions == 0 {
            return fail("partitions must be at least 1".to_string());
        }
        if let Some(lengths) = self.periodic_box {
            PeriodicBox::new(DVec3::from_array(lengths)).map_err(|e| Error::InvalidConfig(e.to_string()))?;
        }
        for kind in ElementKind::ALL {
            let p = self.profiles.get(kind);
            if !(p.target_factor > 0.0) || p.target_floor < 0.0 {
                return fail(format!("{kind:?} profile has a non-positive target"));
            }
            if let (Some(lo), Some(hi)) = (p.min_radius, p.max_radius) {
                if !(hi > lo) {
                    return fail(format!("{kind:?} profile radius limits are inverted"));
                }
            }
        }
        Ok(())
    }

    /// The periodic box, if any.
    pub fn periodic(&self) -> Option<PeriodicBox> {
        self.periodic_box
            .and_then(|l| PeriodicBox::new(DVec3::from_array(l)).ok())
    }

    /// Radius limits for a kind after profile overrides.
    pub fn radius_limits(&self, kind: ElementKind) -> (f64, f64) {
        let p = self.profiles.get(kind);
        (
            p.min_radius.unwrap_or(self.min_radius),
            p.max_radius.unwrap_or(self.max_radius),
        )
    }
}

fn env_number(key: &str) -> Result<Option<f64>> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|_| Error::InvalidConfig(format!("{key}={raw} is not a number"))),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let config = SolverConfig::default();
        config.validate().unwrap();
        assert_eq!(config.target_neighbors, 32.0);
        assert_eq!(config.max_iterations, 200);
        assert_eq!(config.dimensions, Dimensions::Three);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config = SolverConfig::from_json(
            r#"{ "dimensions": 2, "target_neighbors": 20, "profiles": { "sink": { "target_factor": 2.0 } } }"#,
        )
        .unwrap();
        assert_eq!(config.dimensions, Dimensions::Two);
        assert_eq!(config.target_neighbors, 20.0);
        assert_eq!(config.neighbor_deviation, 1.0);
        assert_eq!(config.profiles.sink.target_factor, 2.0);
        assert!(config.profiles.gas.conditioning);
    }

    #[test]
    fn rejects_inverted_limits() {
        let config = SolverConfig {
            min_radius: 2.0,
            max_radius: 1.0,
            ..SolverConfig::default()
        };
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn rejects_four_dimensions_in_json() {
        assert!(SolverConfig::from_json(r#"{ "dimensions": 4 }"#).is_err());
    }

    #[test]
    fn sink_deviation_tracks_factor() {
        assert_eq!(KindProfile::sink(1.0).deviation, DeviationRule::Absolute(8.0));
        assert_eq!(KindProfile::sink(2.0).deviation, DeviationRule::Absolute(12.0));
    }

    #[test]
    fn profile_limits_override_globals() {
        let mut config = SolverConfig {
            max_radius: 5.0,
            ..SolverConfig::default()
        };
        config.profiles.star.max_radius = Some(0.5);
        assert_eq!(config.radius_limits(ElementKind::Star), (0.0, 0.5));
        assert_eq!(config.radius_limits(ElementKind::Gas), (0.0, 5.0));
    }
}

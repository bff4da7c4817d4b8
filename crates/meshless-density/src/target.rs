//! Neighbor-count targets and tolerances.
//!
//! The band an element's normalized neighbor count must land in is not
//! fixed:
//! - fluid elements inflate their target (up to 2×) when the moment matrix
//!   was badly conditioned, trading resolution for a usable gradient
//! - the global tolerance widens geometrically with iteration count, capped
//!   at a quarter of the target, so a pass cannot chase an exact count forever
//! - each kind may replace the tolerance outright

use crate::config::{DeviationRule, KindProfile};

/// Ceiling on the conditioning inflation factor.
pub const MAX_CONDITIONING_INFLATION: f64 = 2.0;

/// Widened tolerance never exceeds this fraction of the target.
pub const MAX_DEVIATION_FRACTION: f64 = 0.25;

/// A target count and its half-width.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NeighborTarget {
    pub desired: f64,
    pub deviation: f64,
}

impl NeighborTarget {
    pub fn lower(&self) -> f64 {
        self.desired - self.deviation
    }

    pub fn upper(&self) -> f64 {
        self.desired + self.deviation
    }

    pub fn too_few(&self, count: f64) -> bool {
        count < self.lower()
    }

    pub fn too_many(&self, count: f64) -> bool {
        count > self.upper()
    }
}

/// Target inflation for a given condition number.
///
/// 1 below a tenth of the danger threshold, then `sqrt(1 + (c − c₀)/danger)`,
/// never above [`MAX_CONDITIONING_INFLATION`].
pub fn conditioning_inflation(condition: f64, danger: f64) -> f64 {
    let onset = 0.1 * danger;
    if condition > onset {
        (1.0 + (condition - onset) / danger)
            .sqrt()
            .min(MAX_CONDITIONING_INFLATION)
    } else {
        1.0
    }
}

/// Whether a freshly measured condition number should replace the stored one
/// before the first pass of a step.
///
/// A jump is accepted only if the current count is within ten tolerances of
/// the target under either the old or the new inflation, so a wildly
/// mis-sized first guess cannot lock in a spurious inflation.
pub fn accept_condition_jump(
    count: f64,
    target: f64,
    deviation: f64,
    previous: f64,
    measured: f64,
    danger: f64,
) -> bool {
    if measured <= previous {
        return false;
    }
    let distance = |factor: f64| (count - target * factor).abs() / (deviation * factor);
    let before = distance(conditioning_inflation(previous, danger));
    let after = distance(conditioning_inflation(measured, danger));
    before.min(after) < 10.0
}

/// Geometric widening of the global tolerance.
///
/// From the third pass on, the tolerance grows by `(desired / 16·dev)^(0.1·iter)`
/// but never shrinks and never exceeds a quarter of the target.
pub fn widen_deviation(desired: f64, deviation: f64, iteration: usize) -> f64 {
    if iteration <= 1 {
        return deviation;
    }
    let ratio = (desired / (16.0 * deviation)).max(1.0);
    let widened = deviation * (0.1 * ratio.ln() * iteration as f64).exp();
    widened.min(MAX_DEVIATION_FRACTION * desired).max(deviation)
}

/// Resolve the band for one element on one pass.
///
/// `base_target` and `base_deviation` are the global settings (the latter
/// already capped for a first step); `inflation` is 1 unless the kind uses
/// conditioning.
pub fn neighbor_target(
    profile: &KindProfile,
    base_target: f64,
    base_deviation: f64,
    inflation: f64,
    iteration: usize,
) -> NeighborTarget {
    let desired = (base_target * profile.target_factor * inflation).max(profile.target_floor);
    let deviation = match profile.deviation {
        DeviationRule::Global => widen_deviation(desired, base_deviation * inflation, iteration),
        DeviationRule::Absolute(d) => d,
        DeviationRule::FractionOfTarget(f) => f * desired,
    };
    NeighborTarget { desired, deviation }
}

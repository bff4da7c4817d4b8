//! Per-element root bracketing and radius steps.
//!
//! The neighbor count grows with radius, so every pass tells the solver
//! whether the current radius undershoots or overshoots. [`Bracket`] keeps
//! the tightest of each, and [`next_radius`] picks the next trial:
//!
//! - both ends known: a derivative-scaled log step, limited to a fraction
//!   of the bracket's log-width and kept off its ends, falling back to a
//!   geometric blend when the step lands outside
//! - one end known: an exponential step toward the missing end, bounded in
//!   log space so a far-off first guess cannot run away
//! - neither known: there is nothing to step from, which is fatal

use crate::config::StepTuning;
use meshless_space::Dimensions;

/// Iteration state of one element within a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConvergenceState {
    /// Needs another pass.
    #[default]
    Active,
    /// Pinned at the maximum radius for one final pass.
    ClampedMax,
    /// Pinned at the minimum radius for one final pass.
    ClampedMin,
    /// Done for this step.
    Converged,
}

impl ConvergenceState {
    pub const fn needs_pass(self) -> bool {
        !matches!(self, ConvergenceState::Converged)
    }

    pub const fn is_clamped(self) -> bool {
        matches!(self, ConvergenceState::ClampedMax | ConvergenceState::ClampedMin)
    }
}

/// Largest radius known to undershoot, smallest known to overshoot.
///
/// Zero means "unknown" for either end.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Bracket {
    pub lower: f64,
    pub upper: f64,
}

impl Bracket {
    /// `radius` gave too few neighbors.
    pub fn record_undershoot(&mut self, radius: f64) {
        self.lower = self.lower.max(radius);
    }

    /// `radius` gave too many neighbors.
    pub fn record_overshoot(&mut self, radius: f64) {
        if self.upper == 0.0 || radius < self.upper {
            self.upper = radius;
        }
    }

    pub fn is_closed(&self) -> bool {
        self.lower > 0.0 && self.upper > 0.0
    }

    /// Both ends known and closer than `tolerance` relative to the lower end.
    pub fn is_tight(&self, tolerance: f64) -> bool {
        self.is_closed() && (self.upper - self.lower) < tolerance * self.lower
    }
}

/// What the step rule needs to know about the last pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepInput {
    pub radius: f64,
    /// Normalized neighbor count at `radius`.
    pub count: f64,
    /// Desired normalized count.
    pub target: f64,
    /// Dimensionless `1 / (1 + d ln N / d ln h^D)`-style sensitivity.
    pub sensitivity: f64,
    pub iteration: usize,
    pub dims: Dimensions,
}

/// Next trial radius, or `None` when the bracket has no end to step from.
pub fn next_radius(bracket: &Bracket, input: &StepInput, tuning: &StepTuning) -> Option<f64> {
    let d = input.dims.as_f64();
    let log_gap = (input.target / input.count).ln() / d;
    let mut h = input.radius;

    if bracket.is_closed() {
        let (lo, hi) = (bracket.lower, bracket.upper);
        let max_jump = if input.iteration > 1 {
            tuning.bracket_jump * (hi / lo).ln()
        } else {
            0.0
        };

        if input.count > 1.0 {
            let mut jump = input.sensitivity * log_gap;
            if input.iteration > 1 {
                jump = jump.max(-max_jump).min(max_jump);
            }
            h *= jump.exp();
        } else {
            h *= 2.0;
        }

        if h > lo && h < hi {
            if input.iteration > 1 {
                let margin = max_jump.exp();
                h = h.min(hi / margin).max(lo * margin);
            }
        } else {
            h = h.max(lo).min(hi);
            h = (h * lo * hi).cbrt();
        }
        return Some(h);
    }

    if bracket.lower == 0.0 && bracket.upper == 0.0 {
        return None;
    }

    let near_target = input.count < 2.0 * input.target && input.count > 0.1 * input.target;
    let growing = bracket.upper == 0.0;

    let limit = if input.count > 1.0 {
        if growing {
            log_gap.min(tuning.max_log_growth)
        } else {
            log_gap.max(-tuning.max_log_shrink)
        }
    } else {
        tuning.max_log_growth
    };

    let step = if near_target {
        let mut slope = input.sensitivity;
        if input.iteration > 2 && slope < 1.0 {
            slope = 0.5 * (slope + 1.0);
        }
        let mut fac = limit * slope;
        if input.iteration >= 4 && input.sensitivity == 1.0 {
            fac *= tuning.stuck_boost;
        }
        if growing {
            fac.min(limit + tuning.near_target_slack)
        } else {
            fac.max(limit - tuning.near_target_slack)
        }
    } else {
        limit
    };

    h *= step.exp();
    Some(h)
}

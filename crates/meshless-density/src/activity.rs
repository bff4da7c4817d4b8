//! Which elements take part in a density step.
//!
//! Eligibility is decided once, before the first pass, and does not change
//! while the step iterates. Elements then drop out individually as their
//! [`ConvergenceState`](crate::ConvergenceState) reaches `Converged`.

use crate::config::SolverConfig;
use crate::element::{Element, ElementKind, StepContext};

/// Whether `element` needs a radius this step.
pub fn is_eligible(element: &Element, config: &SolverConfig, ctx: &StepContext) -> bool {
    let physics = &config.physics;
    match element.kind {
        ElementKind::Gas => element.mass > 0.0,
        ElementKind::Sink => physics.sinks,
        ElementKind::Grain => physics.grains,
        ElementKind::Source => {
            physics.radiation
                && (ctx.full_step
                    || element
                        .stellar_age
                        .is_some_and(|age| age > 0.0 && age < physics.source_age_window))
        }
        ElementKind::Star => {
            physics.feedback
                && (element.supernova_pending
                    || element.hydro.surroundings.gas_density <= 0.0
                    || element
                        .stellar_age
                        .is_some_and(|age| age < physics.young_star_age))
        }
        ElementKind::Collisionless => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::DVec3;

    fn config_with(feedback: bool, radiation: bool) -> SolverConfig {
        let mut config = SolverConfig::default();
        config.physics.feedback = feedback;
        config.physics.radiation = radiation;
        config
    }

    #[test]
    fn massless_gas_sits_out() {
        let config = SolverConfig::default();
        let ctx = StepContext::default();
        assert!(is_eligible(&Element::gas(0, DVec3::ZERO, 1.0, 1.0), &config, &ctx));
        assert!(!is_eligible(&Element::gas(0, DVec3::ZERO, 0.0, 1.0), &config, &ctx));
    }

    #[test]
    fn sinks_always_when_enabled() {
        let sink = Element::new(1, ElementKind::Sink, DVec3::ZERO, 1.0, 1.0);
        assert!(is_eligible(&sink, &SolverConfig::default(), &StepContext::default()));
        let mut off = SolverConfig::default();
        off.physics.sinks = false;
        assert!(!is_eligible(&sink, &off, &StepContext::default()));
    }

    #[test]
    fn sources_follow_age_window_or_full_step() {
        let config = config_with(false, true);
        let young = Element::new(2, ElementKind::Source, DVec3::ZERO, 1.0, 1.0).with_stellar_age(0.05);
        let old = Element::new(3, ElementKind::Source, DVec3::ZERO, 1.0, 1.0).with_stellar_age(0.5);
        let partial = StepContext::default();
        let full = StepContext {
            full_step: true,
            ..StepContext::default()
        };
        assert!(is_eligible(&young, &config, &partial));
        assert!(!is_eligible(&old, &config, &partial));
        assert!(is_eligible(&old, &config, &full));
    }

    #[test]
    fn stars_refresh_on_supernova_or_missing_density() {
        let config = config_with(true, false);
        let ctx = StepContext::default();
        let mut star = Element::new(4, ElementKind::Star, DVec3::ZERO, 1.0, 1.0).with_stellar_age(1.0);
        // never measured
        assert!(is_eligible(&star, &config, &ctx));
        star.hydro.surroundings.gas_density = 3.0;
        assert!(!is_eligible(&star, &config, &ctx));
        star.supernova_pending = true;
        assert!(is_eligible(&star, &config, &ctx));
        star.supernova_pending = false;
        star.stellar_age = Some(0.01);
        assert!(is_eligible(&star, &config, &ctx));
    }

    #[test]
    fn collisionless_never_participates() {
        let dm = Element::new(5, ElementKind::Collisionless, DVec3::ZERO, 1.0, 1.0);
        assert!(!is_eligible(&dm, &config_with(true, true), &StepContext::default()));
    }
}

//! Randomized checks over irregular clouds.

use meshless_density::{
    normalize, Accumulator, Center, CubicSpline, DVec3, Dimensions, Element, NoExtraPhysics, RadiusSolver,
    SolverConfig, StepContext,
};
use meshless_space::BruteForce;
use proptest::prelude::*;

fn cloud(points: &[(f64, f64, f64)], radius: f64) -> Vec<Element> {
    points
        .iter()
        .enumerate()
        .map(|(i, &(x, y, z))| Element::gas(i as u64, DVec3::new(x, y, z), 1.0, radius))
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn normalized_count_grows_with_radius(
        points in prop::collection::vec((0.0f64..4.0, 0.0f64..4.0, 0.0f64..4.0), 2..80),
        small in 0.1f64..2.0,
        factor in 1.0f64..3.0,
    ) {
        let kernel = CubicSpline::new(Dimensions::Three);
        let acc = Accumulator::new(&kernel, &NoExtraPhysics, Dimensions::Three);
        let mut elements = cloud(&points, small);
        let positions: Vec<DVec3> = elements.iter().map(|e| e.position).collect();
        let scan = BruteForce::all(&positions, None);

        let near = acc.evaluate(&Center::of(&elements[0]), &elements, &scan);
        let n_small = normalize(&near, small, elements[0].kind, Dimensions::Three).neighbor_count;

        elements[0].radius = small * factor;
        let far = acc.evaluate(&Center::of(&elements[0]), &elements, &scan);
        let n_large = normalize(&far, small * factor, elements[0].kind, Dimensions::Three).neighbor_count;

        prop_assert!(n_large >= n_small * (1.0 - 1e-12), "{} < {}", n_large, n_small);
    }

    #[test]
    fn random_periodic_cloud_converges(
        points in prop::collection::vec((0.0f64..5.0, 0.0f64..5.0, 0.0f64..5.0), 40..120),
        guess in 0.3f64..3.0,
    ) {
        let config = SolverConfig {
            periodic_box: Some([5.0; 3]),
            ..SolverConfig::default()
        };
        let solver = RadiusSolver::new(config).unwrap();
        let mut elements = cloud(&points, guess);

        let report = solver.solve(&mut elements, &StepContext::default());
        prop_assert!(report.is_ok(), "{:?}", report.err());
        let report = report.unwrap();
        prop_assert_eq!(report.converged + report.clamped_max + report.clamped_min, elements.len());
        for e in &elements {
            prop_assert!(e.radius.is_finite() && e.radius > 0.0);
            prop_assert!(e.hydro.density.is_finite());
        }
    }
}

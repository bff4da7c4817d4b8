//! The adaptive-radius iteration.
//!
//! # Passes
//!
//! Each pass evaluates every element that still needs one, in parallel, then
//! applies the results sequentially in element order. Evaluation only reads
//! the element table; all writes happen in the apply phase, so a pass is
//! deterministic regardless of how rayon schedules it.
//!
//! # Per-element decisions
//!
//! After a pass an element either
//! - lands inside its target band and is done,
//! - is pinned to a radius limit for exactly one more pass (a second arrival
//!   at the same limit ends it),
//! - has a bracket narrower than the tolerance and is done, or
//! - steps to a new radius via [`next_radius`] and goes again.
//!
//! Running out of passes, or needing a step with no bracket end to step
//! from, aborts the whole step.

use crate::accumulate::{Accumulated, Accumulator, Center};
use crate::activity::is_eligible;
use crate::bracket::{next_radius, Bracket, ConvergenceState, StepInput};
use crate::config::SolverConfig;
use crate::element::{Element, StepContext};
use crate::eos::{EquationOfState, IdealGas};
use crate::error::ElementDiagnostic;
use crate::extension::{PairPhysics, StandardPhysics};
use crate::finalize::{normalize, Finalizer};
use crate::kernel::{CubicSpline, Kernel};
use crate::remote::{gather, PartitionServer};
use crate::target::{accept_condition_jump, conditioning_inflation, neighbor_target, NeighborTarget};
use crate::{Error, Result};
use meshless_exchange::{Loopback, TrafficStats, Transport};
use meshless_space::{DVec3, Domain};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, info_span, warn};

/// An element at or above this fraction of the maximum radius counts as at it.
const MAX_LIMIT_SLACK: f64 = 0.99;

/// An element at or below this multiple of the minimum radius counts as at it.
const MIN_LIMIT_SLACK: f64 = 1.01;

/// Condition numbers beyond this multiple of the danger threshold are reported.
const CONDITION_WARNING_FACTOR: f64 = 1.0e6;

/// Passes before the budget at which stuck elements start being reported.
const LATE_PASS_WINDOW: usize = 10;

/// Outcome of one [`RadiusSolver::solve`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SolveReport {
    /// Passes run.
    pub iterations: usize,
    /// Elements that took part.
    pub evaluated: usize,
    /// Elements that settled inside their band or a tight bracket.
    pub converged: usize,
    /// Elements left pinned at their maximum radius.
    pub clamped_max: usize,
    /// Elements left pinned at their minimum radius.
    pub clamped_min: usize,
    /// Cross-partition traffic over all passes.
    pub exchange: TrafficStats,
}

/// Per-element bookkeeping for one step.
#[derive(Debug, Clone)]
struct Work {
    index: usize,
    bracket: Bracket,
    state: ConvergenceState,
    settled: ConvergenceState,
    pinned_max: bool,
    pinned_min: bool,
    target: NeighborTarget,
    sums: Accumulated,
    /// Condition number measured on the latest pass, fluid centers only.
    measured_condition: Option<f64>,
}

impl Work {
    fn new(index: usize) -> Self {
        Self {
            index,
            bracket: Bracket::default(),
            state: ConvergenceState::Active,
            settled: ConvergenceState::Active,
            pinned_max: false,
            pinned_min: false,
            target: NeighborTarget {
                desired: 0.0,
                deviation: 0.0,
            },
            sums: Accumulated::zeroed(),
            measured_condition: None,
        }
    }
}

/// Drives neighbor passes until every participating element has a radius.
pub struct RadiusSolver<K = CubicSpline, H = StandardPhysics, E = IdealGas> {
    config: SolverConfig,
    kernel: K,
    physics: H,
    eos: E,
}

impl RadiusSolver {
    /// Cubic spline, the standard physics hook and an ideal gas.
    pub fn new(config: SolverConfig) -> Result<Self> {
        let kernel = CubicSpline::new(config.dimensions);
        let physics = StandardPhysics::new(config.physics, config.dimensions);
        Self::with_parts(config, kernel, physics, IdealGas::default())
    }
}

impl<K, H, E> RadiusSolver<K, H, E>
where
    K: Kernel,
    H: PairPhysics,
    E: EquationOfState,
{
    pub fn with_parts(config: SolverConfig, kernel: K, physics: H, eos: E) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            kernel,
            physics,
            eos,
        })
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// Solve radii for every eligible element, then finalize their outputs.
    pub fn solve(&self, elements: &mut [Element], ctx: &StepContext) -> Result<SolveReport> {
        let _span = info_span!("ngb_solve", elements = elements.len()).entered();
        let config = &self.config;

        let mut works: Vec<Work> = elements
            .iter()
            .enumerate()
            .filter(|(_, e)| is_eligible(e, config, ctx))
            .map(|(i, _)| Work::new(i))
            .collect();
        let mut report = SolveReport {
            evaluated: works.len(),
            ..SolveReport::default()
        };
        if works.is_empty() {
            return Ok(report);
        }

        let domain = self.build_domain(elements, &works)?;
        let accumulator = Accumulator::new(&self.kernel, &self.physics, config.dimensions);
        let base_deviation = if ctx.first_step {
            config.neighbor_deviation.min(config.initial_step_deviation_cap)
        } else {
            config.neighbor_deviation
        };

        let mut iteration = 0;
        loop {
            let pending: Vec<usize> = (0..works.len()).filter(|&k| works[k].state.needs_pass()).collect();
            if pending.is_empty() {
                break;
            }
            if iteration >= config.max_iterations {
                let work = &works[pending[0]];
                return Err(Error::NonConvergence {
                    iterations: iteration,
                    diagnostic: Box::new(self.diagnostic(&elements[work.index], work)),
                });
            }
            if iteration > LATE_PASS_WINDOW {
                info!("ngb iteration {}: repeating for {} elements", iteration, pending.len());
            }
            let _pass = info_span!("ngb_pass", iteration).entered();

            let (results, traffic) = {
                let table: &[Element] = elements;
                let server = PartitionServer::new(&domain, table, accumulator);
                let transport = Loopback::new(&server, domain.len());
                let results = pending
                    .par_iter()
                    .map(|&k| gather(&server, &transport, &Center::of(&table[works[k].index])))
                    .collect::<Result<Vec<Accumulated>>>()?;
                (results, transport.stats())
            };
            report.exchange.merge(&traffic);
            debug!(
                "ngb pass {}: {} elements, {} remote requests",
                iteration,
                pending.len(),
                traffic.requests
            );

            for (&k, sums) in pending.iter().zip(results) {
                let work = &mut works[k];
                let element = &mut elements[work.index];
                work.sums = sums;
                self.update(element, work, iteration, base_deviation)?;
            }
            iteration += 1;
        }
        report.iterations = iteration;

        let finalizer = Finalizer::new(config, &self.eos);
        for work in &works {
            finalizer.apply(&mut elements[work.index], &work.sums);
            match work.settled {
                ConvergenceState::ClampedMax => report.clamped_max += 1,
                ConvergenceState::ClampedMin => report.clamped_min += 1,
                _ => report.converged += 1,
            }
        }

        debug!(
            "ngb step done after {} passes: {} converged, {} at max, {} at min",
            report.iterations, report.converged, report.clamped_max, report.clamped_min
        );
        Ok(report)
    }

    /// Index every searchable element once for the whole step.
    fn build_domain(&self, elements: &[Element], works: &[Work]) -> Result<Domain> {
        let positions: Vec<DVec3> = elements.iter().map(|e| e.position).collect();
        let searchable: Vec<usize> = elements
            .iter()
            .enumerate()
            .filter(|(_, e)| e.kind.is_searchable())
            .map(|(i, _)| i)
            .collect();

        let (sum, n) = works
            .iter()
            .map(|w| elements[w.index].radius)
            .filter(|r| r.is_finite() && *r > 0.0)
            .fold((0.0, 0usize), |(s, n), r| (s + r, n + 1));
        let cell_size = if n > 0 { sum / n as f64 } else { 1.0 };

        let domain = Domain::decompose(
            &positions,
            &searchable,
            self.config.partitions,
            cell_size,
            self.config.periodic(),
        )?;
        Ok(domain)
    }

    /// Apply one pass's sums to one element and decide what happens next.
    fn update(&self, element: &mut Element, work: &mut Work, iteration: usize, base_deviation: f64) -> Result<()> {
        let config = &self.config;
        let dims = config.dimensions;
        let danger = config.condition_danger;
        let profile = config.profiles.get(element.kind);

        let normalized = normalize(&work.sums, element.radius, element.kind, dims);
        let hydro = &mut element.hydro;
        hydro.neighbor_count = normalized.neighbor_count;
        hydro.radius_sensitivity = normalized.sensitivity;
        hydro.velocity_divergence = normalized.velocity_divergence;

        // The stored condition number belongs to the previous step. It only
        // moves mid-step for an accepted jump on the first pass.
        work.measured_condition = normalized.inversion.map(|inversion| inversion.condition);
        if let Some(inversion) = normalized.inversion {
            hydro.gradient_matrix = inversion.inverse;
            hydro.gradient_reliable = inversion.reliable;

            let measured = inversion.condition;
            if iteration == 0 && measured > hydro.condition_number {
                let plain = neighbor_target(profile, config.target_neighbors, base_deviation, 1.0, 0);
                if accept_condition_jump(
                    normalized.neighbor_count,
                    plain.desired,
                    plain.deviation,
                    hydro.condition_number,
                    measured,
                    danger,
                ) {
                    hydro.condition_number = measured;
                }
            }
        }

        let inflation = if profile.conditioning {
            conditioning_inflation(element.hydro.condition_number, danger)
        } else {
            1.0
        };
        let target = neighbor_target(profile, config.target_neighbors, base_deviation, inflation, iteration);
        work.target = target;

        let (min_radius, max_radius) = config.radius_limits(element.kind);
        let count = element.hydro.neighbor_count;
        let radius = element.radius;
        let too_few = target.too_few(count);
        let too_many = target.too_many(count);

        let mut redo = too_few || (too_many && radius > MIN_LIMIT_SLACK * min_radius);
        let mut state = ConvergenceState::Active;

        // A pass already run at the limit itself needs no repeat.
        if too_few && radius >= MAX_LIMIT_SLACK * max_radius {
            redo = !(work.pinned_max || radius == max_radius);
            element.radius = max_radius;
            work.pinned_max = true;
            state = ConvergenceState::ClampedMax;
        }
        if too_many && radius <= MIN_LIMIT_SLACK * min_radius {
            redo = !(work.pinned_min || radius == min_radius);
            element.radius = min_radius;
            work.pinned_min = true;
            state = ConvergenceState::ClampedMin;
        }

        if redo && state == ConvergenceState::Active {
            if iteration + LATE_PASS_WINDOW >= config.max_iterations {
                warn!(
                    "ngb iteration {}: still searching, {}",
                    iteration,
                    self.diagnostic(element, work)
                );
            }

            if work.bracket.is_tight(config.tuning.bracket_tolerance) {
                redo = false;
            } else {
                if too_few {
                    work.bracket.record_undershoot(radius);
                } else {
                    work.bracket.record_overshoot(radius);
                }
                let input = StepInput {
                    radius,
                    count,
                    target: target.desired,
                    sensitivity: element.hydro.radius_sensitivity,
                    iteration,
                    dims,
                };
                let next = next_radius(&work.bracket, &input, &config.tuning).ok_or_else(|| Error::BracketCollapse {
                    diagnostic: Box::new(self.diagnostic(element, work)),
                })?;
                element.radius = next.max(min_radius).min(max_radius);
            }
        }

        if redo {
            work.state = state;
        } else {
            if let Some(measured) = work.measured_condition {
                if measured > CONDITION_WARNING_FACTOR * danger {
                    warn!(
                        "Element {} has condition number {:.3e} (previous step {:.3e}, danger {}); gradients may be inaccurate",
                        element.id, measured, element.hydro.condition_number, danger
                    );
                }
                element.hydro.condition_number = measured;
            }
            work.state = ConvergenceState::Converged;
            work.settled = if work.pinned_max && element.radius >= max_radius {
                ConvergenceState::ClampedMax
            } else if work.pinned_min && element.radius <= min_radius {
                ConvergenceState::ClampedMin
            } else {
                ConvergenceState::Converged
            };
        }
        Ok(())
    }

    fn diagnostic(&self, element: &Element, work: &Work) -> ElementDiagnostic {
        let (min_radius, max_radius) = self.config.radius_limits(element.kind);
        ElementDiagnostic {
            id: element.id,
            kind: element.kind,
            radius: element.radius,
            lower: work.bracket.lower,
            upper: work.bracket.upper,
            neighbor_count: element.hydro.neighbor_count,
            target: work.target.desired,
            deviation: work.target.deviation,
            clamped_max: work.pinned_max,
            clamped_min: work.pinned_min,
            min_radius,
            max_radius,
            position: element.position,
        }
    }
}

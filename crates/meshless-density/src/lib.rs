//! Meshless Density
//!
//! Adaptive interaction radii and the density estimate that goes with them.
//! Every participating element gets a radius whose kernel-weighted neighbor
//! count lands in a target band, and the sums gathered at that radius become
//! its density, pressure and gradient-correction operator.
//!
//! # Core Loop
//!
//! 1. Pick the elements that need a radius this step ([`is_eligible`])
//! 2. Gather pair sums over each neighborhood ([`Accumulator`], [`gather`])
//! 3. Normalize, invert the moment matrix, compare against the target
//! 4. Step the radius inside a shrinking bracket ([`next_radius`])
//! 5. Repeat for the elements still outside their band
//! 6. Finalize density and the finalize-once physics ([`Finalizer`])
//!
//! # Degenerate Geometry
//!
//! Collinear or sparse neighborhoods never fail a step. The moment matrix
//! falls back to zero with `gradient_reliable = false`, and a high condition
//! number inflates the element's neighbor target on later passes (at most
//! 2×) until its neighborhood is well spread.
//!
//! # Failure
//!
//! Only two things abort a step: running out of passes and needing a step
//! with an empty bracket. Both carry an [`ElementDiagnostic`].

mod accumulate;
mod activity;
mod bracket;
mod config;
mod element;
mod eos;
mod error;
mod extension;
mod finalize;
mod kernel;
mod moment;
mod remote;
mod solver;
mod target;

pub use accumulate::{Accumulated, Accumulator, Center, Pair};
pub use activity::is_eligible;
pub use bracket::{next_radius, Bracket, ConvergenceState, StepInput};
pub use config::{
    DensityEstimator, DeviationRule, KindProfile, KindProfiles, PhysicsToggles, SolverConfig, StepTuning,
};
pub use element::{
    CaptureFlags, Element, ElementId, ElementKind, HydroState, ShearDiagnostics, StepContext, Surroundings,
    TIME_BINS,
};
pub use eos::{EquationOfState, IdealGas, Isothermal};
pub use error::{ElementDiagnostic, Error, Result};
pub use extension::{Extras, NoExtraPhysics, PairPhysics, StandardPhysics};
pub use finalize::{neighbor_number_density, normalize, shear_diagnostics, Finalizer, Normalized};
pub use kernel::{CubicSpline, InverseRadius, Kernel};
pub use moment::{invert, Inversion, SymMoment};
pub use remote::{gather, PartitionServer, SearchRequest};
pub use solver::{RadiusSolver, SolveReport};
pub use target::{
    accept_condition_jump, conditioning_inflation, neighbor_target, widen_deviation, NeighborTarget,
    MAX_CONDITIONING_INFLATION, MAX_DEVIATION_FRACTION,
};

pub use meshless_space::{DVec3, Dimensions, PeriodicBox};

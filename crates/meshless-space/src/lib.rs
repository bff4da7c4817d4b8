//! Meshless Space
//!
//! Spatial plumbing for the adaptive-radius density solver: how many axes are
//! in play, how separations wrap in a periodic box, and how to find every
//! element inside a ball without scanning the whole table.
//!
//! # Search
//!
//! [`NeighborQuery`] is the seam. [`CellGrid`] is the production
//! implementation; [`BruteForce`] is the linear reference used to check it.
//! Queries are strict (`r² < h²`) and report separations under the
//! minimum-image convention.
//!
//! # Decomposition
//!
//! [`Domain`] cuts the searchable elements into slabs, each with its own grid.
//! A search centered in one slab learns which other slabs it must visit from
//! [`Domain::remote_reach`].

mod dims;
mod domain;
mod error;
mod grid;
mod periodic;
mod query;

pub use dims::Dimensions;
pub use domain::{Domain, Partition, PartitionId};
pub use error::{Error, Result};
pub use grid::{CellGrid, GridQuery};
pub use periodic::{separation, Aabb, PeriodicBox};
pub use query::{BruteForce, BruteForceIter, Candidate, NeighborQuery};

/// Re-exported so downstream crates agree on the vector type.
pub use glam::DVec3;

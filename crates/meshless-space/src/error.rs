//! Error types for meshless-space.

use thiserror::Error;

/// Result type for spatial operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while building search structures.
#[derive(Debug, Error, PartialEq)]
pub enum Error {
    /// Cell edge length must be finite and strictly positive.
    #[error("invalid cell size {0}")]
    InvalidCellSize(f64),

    /// Periodic box lengths must be finite and strictly positive.
    #[error("invalid periodic box [{x}, {y}, {z}]")]
    InvalidBox { x: f64, y: f64, z: f64 },

    /// A member position was NaN or infinite.
    #[error("non-finite position for member {index}")]
    NonFinitePosition { index: usize },

    /// A decomposition needs at least one partition.
    #[error("cannot decompose into zero partitions")]
    NoPartitions,

    /// A member index pointed past the position table.
    #[error("member {index} out of range for {len} positions")]
    MemberOutOfRange { index: usize, len: usize },
}

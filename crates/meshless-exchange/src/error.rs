//! Error types for meshless-exchange.

use crate::MessageKind;
use meshless_space::PartitionId;
use thiserror::Error;

/// Result type for exchange operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while moving requests between partitions.
#[derive(Debug, Error)]
pub enum Error {
    /// Encoding or decoding a wire payload failed.
    #[error("wire codec error: {0}")]
    Codec(#[from] bincode::Error),

    /// No handler serves the addressed partition.
    #[error("unknown partition {0}")]
    UnknownPartition(PartitionId),

    /// The remote handler ran and reported a failure.
    #[error("partition {partition} failed: {message}")]
    Remote {
        partition: PartitionId,
        message: String,
    },

    /// An envelope arrived with the wrong role.
    #[error("unexpected {0:?} envelope")]
    UnexpectedKind(MessageKind),

    /// A reply did not answer the request it was paired with.
    #[error("reply sequence {actual} does not match request {expected}")]
    SequenceMismatch { expected: u64, actual: u64 },
}

//! Meshless Exchange
//!
//! Request/reply plumbing between partitions of a decomposed element set.
//!
//! # Design
//!
//! A search that crosses a partition boundary is shipped to the owning
//! partition as a bincode [`Envelope`]. The partition evaluates it against
//! its own elements and returns a partial result, which the caller merges.
//! Envelopes carry a sequence number so replies can be paired even on a
//! transport that reorders.
//!
//! The only transport shipped here is [`Loopback`], which runs the handler in
//! the caller's thread while still paying the full encode/decode cost.

mod envelope;
mod error;
mod transport;

pub use envelope::{Envelope, MessageKind};
pub use error::{Error, Result};
pub use transport::{call, serve, Handler, Loopback, TrafficStats, Transport};

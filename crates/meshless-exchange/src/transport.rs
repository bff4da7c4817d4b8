//! Transports and handlers.
//!
//! A [`Transport`] moves encoded request envelopes to a partition and hands
//! back the encoded reply. A [`Handler`] is the partition-side counterpart.
//! [`Loopback`] connects the two in-process, which is how a single address
//! space runs the partitioned code path; a networked transport would slot in
//! behind the same trait.

use crate::{Envelope, Error, MessageKind, Result};
use meshless_space::PartitionId;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

/// Something that can deliver a request to a partition and return its reply.
///
/// Implementations must be shareable across worker threads; requests for
/// different elements are issued concurrently.
pub trait Transport: Sync {
    /// Deliver encoded request bytes, return encoded reply bytes.
    fn exchange(&self, partition: PartitionId, request: Vec<u8>) -> Result<Vec<u8>>;

    /// Fresh sequence number for pairing a request with its reply.
    fn next_sequence(&self) -> u64;

    /// Counters accumulated so far.
    fn stats(&self) -> TrafficStats;
}

/// Partition-side request processing.
pub trait Handler: Sync {
    /// Answer one request envelope with a reply envelope.
    fn handle(&self, request: &Envelope) -> Result<Envelope>;
}

/// Decode a request payload, run `f`, and wrap its output as the reply.
pub fn serve<Req, Resp, F>(request: &Envelope, f: F) -> Result<Envelope>
where
    Req: DeserializeOwned,
    Resp: Serialize,
    F: FnOnce(Req) -> Result<Resp>,
{
    if request.kind != MessageKind::Request {
        return Err(Error::UnexpectedKind(request.kind));
    }
    let response = f(request.payload()?)?;
    request.reply(&response)
}

/// Typed request/reply through any transport.
pub fn call<T, Req, Resp>(transport: &T, partition: PartitionId, request: &Req) -> Result<Resp>
where
    T: Transport + ?Sized,
    Req: Serialize,
    Resp: DeserializeOwned,
{
    let sequence = transport.next_sequence();
    let envelope = Envelope::new(partition, sequence, MessageKind::Request, request)?;
    let reply = Envelope::from_bytes(&transport.exchange(partition, envelope.to_bytes()?)?)?;
    if reply.sequence != sequence {
        return Err(Error::SequenceMismatch {
            expected: sequence,
            actual: reply.sequence,
        });
    }
    match reply.kind {
        MessageKind::Reply => reply.payload(),
        MessageKind::Failure => Err(Error::Remote {
            partition,
            message: reply.payload()?,
        }),
        MessageKind::Request => Err(Error::UnexpectedKind(MessageKind::Request)),
    }
}

/// Snapshot of transport counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrafficStats {
    pub requests: u64,
    pub failures: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
}

impl TrafficStats {
    /// Add another snapshot into this one.
    pub fn merge(&mut self, other: &TrafficStats) {
        self.requests += other.requests;
        self.failures += other.failures;
        self.bytes_sent += other.bytes_sent;
        self.bytes_received += other.bytes_received;
    }
}

/// In-process transport that calls a handler directly.
///
/// Requests still go through full envelope encoding so the byte counters
/// reflect what a wire transport would carry.
pub struct Loopback<'h, H: Handler> {
    handler: &'h H,
    partitions: usize,
    sequence: AtomicU64,
    requests: AtomicU64,
    failures: AtomicU64,
    bytes_sent: AtomicU64,
    bytes_received: AtomicU64,
}

impl<'h, H: Handler> Loopback<'h, H> {
    /// Loopback serving partitions `0..partitions`.
    pub fn new(handler: &'h H, partitions: usize) -> Self {
        Self {
            handler,
            partitions,
            sequence: AtomicU64::new(0),
            requests: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
        }
    }
}

impl<H: Handler> Transport for Loopback<'_, H> {
    fn exchange(&self, partition: PartitionId, request: Vec<u8>) -> Result<Vec<u8>> {
        if partition.0 as usize >= self.partitions {
            return Err(Error::UnknownPartition(partition));
        }
        self.requests.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(request.len() as u64, Ordering::Relaxed);

        let envelope = Envelope::from_bytes(&request)?;
        let reply = match self.handler.handle(&envelope) {
            Ok(reply) => reply,
            Err(e) => {
                warn!("Partition {} failed sequence {}: {}", partition, envelope.sequence, e);
                self.failures.fetch_add(1, Ordering::Relaxed);
                envelope.failure(&e.to_string())?
            }
        };
        let bytes = reply.to_bytes()?;
        self.bytes_received.fetch_add(bytes.len() as u64, Ordering::Relaxed);
        debug!(
            "Loopback {} seq {}: {} bytes out, {} bytes back",
            partition,
            envelope.sequence,
            request.len(),
            bytes.len()
        );
        Ok(bytes)
    }

    fn next_sequence(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::Relaxed)
    }

    fn stats(&self) -> TrafficStats {
        TrafficStats {
            requests: self.requests.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Doubles a number; refuses odd partitions.
    struct Doubler;

    impl Handler for Doubler {
        fn handle(&self, request: &Envelope) -> Result<Envelope> {
            if request.partition.0 % 2 == 1 {
                return Err(Error::Remote {
                    partition: request.partition,
                    message: "odd partition".into(),
                });
            }
            serve(request, |x: u64| Ok(x * 2))
        }
    }

    #[test]
    fn call_round_trips_through_handler() {
        let loopback = Loopback::new(&Doubler, 4);
        let out: u64 = call(&loopback, PartitionId(2), &21u64).unwrap();
        assert_eq!(out, 42);
        let stats = loopback.stats();
        assert_eq!(stats.requests, 1);
        assert_eq!(stats.failures, 0);
        assert!(stats.bytes_sent > 0 && stats.bytes_received > 0);
    }

    #[test]
    fn handler_failure_surfaces_as_remote_error() {
        let loopback = Loopback::new(&Doubler, 4);
        let err = call::<_, u64, u64>(&loopback, PartitionId(1), &5).unwrap_err();
        match err {
            Error::Remote { partition, message } => {
                assert_eq!(partition, PartitionId(1));
                assert!(message.contains("odd partition"), "message: {message}");
            }
            other => panic!("expected remote failure, got {other:?}"),
        }
        assert_eq!(loopback.stats().failures, 1);
    }

    #[test]
    fn unknown_partition_is_rejected_before_delivery() {
        let loopback = Loopback::new(&Doubler, 2);
        let err = call::<_, u64, u64>(&loopback, PartitionId(9), &5).unwrap_err();
        assert!(matches!(err, Error::UnknownPartition(PartitionId(9))));
        assert_eq!(loopback.stats().requests, 0);
    }

    #[test]
    fn sequences_are_unique() {
        let loopback = Loopback::new(&Doubler, 1);
        let a = loopback.next_sequence();
        let b = loopback.next_sequence();
        assert_ne!(a, b);
    }

    #[test]
    fn serve_rejects_reply_envelopes() {
        let env = Envelope::new(PartitionId(0), 0, MessageKind::Reply, &1u64).unwrap();
        let err = serve(&env, |x: u64| Ok(x)).unwrap_err();
        assert!(matches!(err, Error::UnexpectedKind(MessageKind::Reply)));
    }

    #[test]
    fn stats_merge_adds_counters() {
        let mut a = TrafficStats {
            requests: 1,
            failures: 0,
            bytes_sent: 10,
            bytes_received: 20,
        };
        a.merge(&TrafficStats {
            requests: 2,
            failures: 1,
            bytes_sent: 5,
            bytes_received: 5,
        });
        assert_eq!(a.requests, 3);
        assert_eq!(a.failures, 1);
        assert_eq!(a.bytes_sent, 15);
        assert_eq!(a.bytes_received, 25);
    }
}

//! Partition-side search service and the caller-side gather.
//!
//! A center is always evaluated against its home partition directly. Every
//! other partition its search ball reaches receives a [`SearchRequest`]
//! through the transport and answers with a partial [`Accumulated`], which is
//! folded in with the same merge used for local sums.

use crate::accumulate::{Accumulated, Accumulator, Center};
use crate::element::Element;
use crate::extension::PairPhysics;
use crate::kernel::Kernel;
use crate::Result;
use meshless_exchange::{call, serve, Envelope, Handler, Transport};
use meshless_space::{Domain, PartitionId};
use serde::{Deserialize, Serialize};

/// What a remote partition needs to evaluate one center.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub center: Center,
}

/// Answers search requests against one element table.
pub struct PartitionServer<'a, K: ?Sized, H: ?Sized> {
    domain: &'a Domain,
    elements: &'a [Element],
    accumulator: Accumulator<'a, K, H>,
}

impl<'a, K, H> PartitionServer<'a, K, H>
where
    K: Kernel + ?Sized,
    H: PairPhysics + ?Sized,
{
    pub fn new(domain: &'a Domain, elements: &'a [Element], accumulator: Accumulator<'a, K, H>) -> Self {
        Self {
            domain,
            elements,
            accumulator,
        }
    }

    pub fn domain(&self) -> &Domain {
        self.domain
    }

    /// Sums over one partition's members, `None` if the partition is unknown.
    pub fn evaluate(&self, partition: PartitionId, center: &Center) -> Option<Accumulated> {
        self.domain
            .partition(partition)
            .map(|p| self.accumulator.evaluate(center, self.elements, p.grid()))
    }
}

impl<K, H> Handler for PartitionServer<'_, K, H>
where
    K: Kernel + ?Sized,
    H: PairPhysics + ?Sized,
{
    fn handle(&self, request: &Envelope) -> meshless_exchange::Result<Envelope> {
        let partition = request.partition;
        serve(request, |req: SearchRequest| {
            self.evaluate(partition, &req.center)
                .ok_or(meshless_exchange::Error::UnknownPartition(partition))
        })
    }
}

/// Full-neighborhood sums for `center`: home partition locally, the rest
/// through `transport` in partition id order.
pub fn gather<K, H, T>(server: &PartitionServer<'_, K, H>, transport: &T, center: &Center) -> Result<Accumulated>
where
    K: Kernel + ?Sized,
    H: PairPhysics + ?Sized,
    T: Transport + ?Sized,
{
    let domain = server.domain();
    let home = domain.home(center.position);
    let mut sums = server.evaluate(home, center).unwrap_or_default();

    let remotes: Vec<PartitionId> = domain.remote_reach(center.position, center.radius, home).collect();
    if remotes.is_empty() {
        return Ok(sums);
    }
    let request = SearchRequest { center: center.clone() };
    for partition in remotes {
        let partial: Accumulated = call(transport, partition, &request)?;
        sums.merge(&partial);
    }
    Ok(sums)
}

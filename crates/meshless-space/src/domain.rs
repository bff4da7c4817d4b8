//! Slab decomposition of searchable members into partitions.
//!
//! Members are sorted along the longest axis and cut into contiguous slabs
//! of near-equal population. Each partition owns its own [`CellGrid`], and a
//! search that reaches beyond its home slab is routed to every other
//! partition whose bounds intersect the search ball.
//!
//! Partition ids are dense, starting at zero, and remote partitions are
//! always reported in id order so that merged results do not depend on
//! scheduling.

use crate::grid::CellGrid;
use crate::periodic::{Aabb, PeriodicBox};
use crate::{Error, Result};
use glam::DVec3;
use tracing::debug;

/// Identifier of one partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PartitionId(pub u32);

impl std::fmt::Display for PartitionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "P{}", self.0)
    }
}

/// One slab: its members, their bounds and their search grid.
#[derive(Debug, Clone)]
pub struct Partition {
    id: PartitionId,
    members: Vec<usize>,
    bounds: Option<Aabb>,
    grid: CellGrid,
}

impl Partition {
    pub fn id(&self) -> PartitionId {
        self.id
    }

    pub fn members(&self) -> &[usize] {
        &self.members
    }

    /// Bounds of the members, `None` for an empty slab.
    pub fn bounds(&self) -> Option<&Aabb> {
        self.bounds.as_ref()
    }

    pub fn grid(&self) -> &CellGrid {
        &self.grid
    }

    /// Whether any member could lie within `radius` of `center`.
    pub fn reaches(&self, center: DVec3, radius: f64, periodic: Option<&PeriodicBox>) -> bool {
        match &self.bounds {
            Some(b) => b.distance_sq(center, periodic) < radius * radius,
            None => false,
        }
    }
}

/// The full set of partitions plus the slab cuts used to find a home.
#[derive(Debug, Clone)]
pub struct Domain {
    partitions: Vec<Partition>,
    axis: usize,
    cuts: Vec<f64>,
    periodic: Option<PeriodicBox>,
}

impl Domain {
    /// Split `members` (indices into `positions`) into `count` slabs.
    pub fn decompose(
        positions: &[DVec3],
        members: &[usize],
        count: usize,
        cell_size: f64,
        periodic: Option<PeriodicBox>,
    ) -> Result<Self> {
        if count == 0 {
            return Err(Error::NoPartitions);
        }
        for &index in members {
            match positions.get(index) {
                None => {
                    return Err(Error::MemberOutOfRange {
                        index,
                        len: positions.len(),
                    })
                }
                Some(p) if !p.is_finite() => return Err(Error::NonFinitePosition { index }),
                Some(_) => {}
            }
        }

        let place = |index: usize| match &periodic {
            Some(pbox) => pbox.wrap(positions[index]),
            None => positions[index],
        };

        let extent = match &periodic {
            Some(pbox) => pbox.lengths(),
            None => Aabb::enclosing(members.iter().map(|&i| place(i)))
                .map(|b| b.extent())
                .unwrap_or(DVec3::ZERO),
        };
        let axis = longest_axis(extent);

        let mut order: Vec<usize> = members.to_vec();
        order.sort_by(|&a, &b| place(a)[axis].total_cmp(&place(b)[axis]).then(a.cmp(&b)));

        let n = order.len();
        let mut partitions = Vec::with_capacity(count);
        let mut cuts = Vec::with_capacity(count.saturating_sub(1));
        for k in 0..count {
            let lo = k * n / count;
            let hi = (k + 1) * n / count;
            if k > 0 {
                cuts.push(order.get(lo).map_or(f64::INFINITY, |&i| place(i)[axis]));
            }
            let slab = order[lo..hi].to_vec();
            let bounds = Aabb::enclosing(slab.iter().map(|&i| place(i)));
            let grid = CellGrid::build(positions, &slab, cell_size, periodic)?;
            partitions.push(Partition {
                id: PartitionId(k as u32),
                members: slab,
                bounds,
                grid,
            });
        }

        debug!(
            "Decomposed {} members into {} slabs along axis {}",
            n, count, axis
        );

        Ok(Self {
            partitions,
            axis,
            cuts,
            periodic,
        })
    }

    /// A single partition holding every member.
    pub fn single(
        positions: &[DVec3],
        members: &[usize],
        cell_size: f64,
        periodic: Option<PeriodicBox>,
    ) -> Result<Self> {
        Self::decompose(positions, members, 1, cell_size, periodic)
    }

    pub fn len(&self) -> usize {
        self.partitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.partitions.is_empty()
    }

    pub fn partitions(&self) -> &[Partition] {
        &self.partitions
    }

    pub fn partition(&self, id: PartitionId) -> Option<&Partition> {
        self.partitions.get(id.0 as usize)
    }

    pub fn periodic(&self) -> Option<&PeriodicBox> {
        self.periodic.as_ref()
    }

    /// Axis the slabs were cut along.
    pub fn axis(&self) -> usize {
        self.axis
    }

    /// Slab whose coordinate range contains `position`.
    pub fn home(&self, position: DVec3) -> PartitionId {
        let p = match &self.periodic {
            Some(pbox) => pbox.wrap(position),
            None => position,
        };
        let coord = p[self.axis];
        PartitionId(self.cuts.partition_point(|&c| c <= coord) as u32)
    }

    /// Partitions other than `home` that a search ball reaches, in id order.
    pub fn remote_reach(
        &self,
        center: DVec3,
        radius: f64,
        home: PartitionId,
    ) -> impl Iterator<Item = PartitionId> + '_ {
        let periodic = self.periodic.as_ref();
        self.partitions
            .iter()
            .filter(move |p| p.id != home && p.reaches(center, radius, periodic))
            .map(Partition::id)
    }
}

fn longest_axis(extent: DVec3) -> usize {
    let mut axis = 0;
    for a in 1..3 {
        if extent[a] > extent[axis] {
            axis = a;
        }
    }
    axis
}

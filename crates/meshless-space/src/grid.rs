//! Uniform cell grid for fixed-radius neighbor search.
//!
//! Members are bucketed into cubic-ish cells and stored contiguously by cell
//! (a compressed row layout: `cell_start[c]..cell_start[c + 1]` indexes into
//! `entries`). A query visits only the cells overlapping the search ball's
//! bounding box, so cost scales with the local member count rather than the
//! table size.
//!
//! # Periodic domains
//!
//! With a [`PeriodicBox`] the grid covers `[0, L)` on each axis and cell
//! ranges wrap. When a search ball spans the whole box along an axis every
//! cell on that axis is visited exactly once, and each member is reported
//! through its nearest image only.

use crate::periodic::{separation, Aabb, PeriodicBox};
use crate::query::{Candidate, NeighborQuery};
use crate::{Error, Result};
use glam::DVec3;

/// Cell budget per indexed member before cells are coarsened.
const CELLS_PER_MEMBER: usize = 8;

/// Floor on the cell budget for very small sets.
const MIN_CELL_BUDGET: usize = 64;

/// Bucketed spatial index over a subset of a position table.
#[derive(Debug, Clone)]
pub struct CellGrid {
    origin: DVec3,
    cell: DVec3,
    counts: [usize; 3],
    periodic: Option<PeriodicBox>,
    cell_start: Vec<usize>,
    entries: Vec<usize>,
    entry_positions: Vec<DVec3>,
}

impl CellGrid {
    /// Index `members` (indices into `positions`) with the requested cell edge.
    ///
    /// The edge is a lower bound: it grows when the box does not divide
    /// evenly or when the cell count would dwarf the member count.
    pub fn build(
        positions: &[DVec3],
        members: &[usize],
        cell_size: f64,
        periodic: Option<PeriodicBox>,
    ) -> Result<Self> {
        if !(cell_size.is_finite() && cell_size > 0.0) {
            return Err(Error::InvalidCellSize(cell_size));
        }
        for &index in members {
            let p = positions.get(index).ok_or(Error::MemberOutOfRange {
                index,
                len: positions.len(),
            })?;
            if !p.is_finite() {
                return Err(Error::NonFinitePosition { index });
            }
        }

        let wrapped: Vec<DVec3> = members
            .iter()
            .map(|&i| match &periodic {
                Some(pbox) => pbox.wrap(positions[i]),
                None => positions[i],
            })
            .collect();

        let (origin, extent) = match &periodic {
            Some(pbox) => (DVec3::ZERO, pbox.lengths()),
            None => match Aabb::enclosing(wrapped.iter().copied()) {
                Some(bounds) => (bounds.min, bounds.extent()),
                None => (DVec3::ZERO, DVec3::ZERO),
            },
        };

        let budget = (members.len() * CELLS_PER_MEMBER).max(MIN_CELL_BUDGET);
        let mut edge = cell_size;
        let (counts, cell) = loop {
            let (counts, cell) = layout(extent, edge, periodic.is_some());
            let total = counts.iter().try_fold(1usize, |acc, &n| acc.checked_mul(n));
            if total.is_some_and(|t| t <= budget) {
                break (counts, cell);
            }
            edge *= 2.0;
        };

        let total = counts.iter().product::<usize>();
        let cell_of = |p: DVec3| flat_index(axis_cells(p, origin, cell, counts), counts);

        let mut cell_start = vec![0usize; total + 1];
        for p in &wrapped {
            cell_start[cell_of(*p) + 1] += 1;
        }
        for c in 0..total {
            cell_start[c + 1] += cell_start[c];
        }

        let mut fill = cell_start.clone();
        let mut entries = vec![0usize; members.len()];
        let mut entry_positions = vec![DVec3::ZERO; members.len()];
        for (&index, p) in members.iter().zip(&wrapped) {
            let c = cell_of(*p);
            entries[fill[c]] = index;
            entry_positions[fill[c]] = *p;
            fill[c] += 1;
        }

        Ok(Self {
            origin,
            cell,
            counts,
            periodic,
            cell_start,
            entries,
            entry_positions,
        })
    }

    /// Number of indexed members.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Cells along each axis.
    pub fn cell_counts(&self) -> [usize; 3] {
        self.counts
    }

    /// Effective cell edge along each axis.
    pub fn cell_size(&self) -> DVec3 {
        self.cell
    }

    /// Indexed member indices in storage order.
    pub fn members(&self) -> &[usize] {
        &self.entries
    }

    fn axis_range(&self, axis: usize, center: f64, radius: f64) -> AxisRange {
        let n = self.counts[axis];
        let edge = self.cell[axis];
        let origin = self.origin[axis];
        if self.periodic.is_some() {
            let span = (radius / edge).ceil();
            if !span.is_finite() || 2.0 * span + 1.0 >= n as f64 {
                return AxisRange { start: 0, len: n, n };
            }
            let span = span as isize;
            let home = clamp_cell((center - origin) / edge, n) as isize;
            AxisRange {
                start: home - span,
                len: (2 * span + 1) as usize,
                n,
            }
        } else {
            let lo = clamp_cell((center - radius - origin) / edge, n);
            let hi = clamp_cell((center + radius - origin) / edge, n);
            AxisRange {
                start: lo as isize,
                len: hi - lo + 1,
                n,
            }
        }
    }
}

impl NeighborQuery for CellGrid {
    type Iter<'a>
        = GridQuery<'a>
    where
        Self: 'a;

    fn query(&self, center: DVec3, radius: f64) -> Self::Iter<'_> {
        let center = match &self.periodic {
            Some(pbox) => pbox.wrap(center),
            None => center,
        };
        let empty = self.entries.is_empty() || !(radius > 0.0);
        let axes = [
            self.axis_range(0, center.x, radius),
            self.axis_range(1, center.y, radius),
            self.axis_range(2, center.z, radius),
        ];
        let cells_total = if empty {
            0
        } else {
            axes.iter().map(|a| a.len).product()
        };
        GridQuery {
            grid: self,
            center,
            radius_sq: radius * radius,
            axes,
            next_cell: 0,
            cells_total,
            slot: 0,
            slot_end: 0,
        }
    }
}

/// Cells to visit along one axis, possibly wrapping.
#[derive(Debug, Clone, Copy)]
struct AxisRange {
    start: isize,
    len: usize,
    n: usize,
}

impl AxisRange {
    fn cell(&self, k: usize) -> usize {
        (self.start + k as isize).rem_euclid(self.n as isize) as usize
    }
}

/// Lazy iterator returned by [`CellGrid::query`].
pub struct GridQuery<'a> {
    grid: &'a CellGrid,
    center: DVec3,
    radius_sq: f64,
    axes: [AxisRange; 3],
    next_cell: usize,
    cells_total: usize,
    slot: usize,
    slot_end: usize,
}

impl Iterator for GridQuery<'_> {
    type Item = Candidate;

    fn next(&mut self) -> Option<Candidate> {
        loop {
            while self.slot < self.slot_end {
                let slot = self.slot;
                self.slot += 1;
                let offset = separation(
                    self.center,
                    self.grid.entry_positions[slot],
                    self.grid.periodic.as_ref(),
                );
                let distance_sq = offset.length_squared();
                if distance_sq < self.radius_sq {
                    return Some(Candidate {
                        index: self.grid.entries[slot],
                        offset,
                        distance_sq,
                    });
                }
            }

            if self.next_cell >= self.cells_total {
                return None;
            }
            let k = self.next_cell;
            self.next_cell += 1;
            let [ax, ay, az] = self.axes;
            let i = ax.cell(k % ax.len);
            let j = ay.cell((k / ax.len) % ay.len);
            let l = az.cell(k / (ax.len * ay.len));
            let c = flat_index([i, j, l], self.grid.counts);
            self.slot = self.grid.cell_start[c];
            self.slot_end = self.grid.cell_start[c + 1];
        }
    }
}

fn layout(extent: DVec3, edge: f64, periodic: bool) -> ([usize; 3], DVec3) {
    let mut counts = [1usize; 3];
    let mut cell = DVec3::splat(edge);
    for axis in 0..3 {
        let e = extent[axis];
        if periodic {
            let n = ((e / edge).floor() as usize).max(1);
            counts[axis] = n;
            cell[axis] = e / n as f64;
        } else {
            counts[axis] = ((e / edge).floor() as usize).saturating_add(1);
        }
    }
    (counts, cell)
}

fn clamp_cell(coord: f64, n: usize) -> usize {
    if coord.is_nan() || coord <= 0.0 {
        0
    } else {
        (coord.floor() as usize).min(n - 1)
    }
}

fn axis_cells(p: DVec3, origin: DVec3, cell: DVec3, counts: [usize; 3]) -> [usize; 3] {
    let rel = (p - origin) / cell;
    [
        clamp_cell(rel.x, counts[0]),
        clamp_cell(rel.y, counts[1]),
        clamp_cell(rel.z, counts[2]),
    ]
}

fn flat_index([i, j, k]: [usize; 3], counts: [usize; 3]) -> usize {
    i + counts[0] * (j + counts[1] * k)
}

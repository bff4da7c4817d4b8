//! The neighbor search seam.
//!
//! A query yields every indexed member strictly inside a ball, each with
//! the separation vector from the query center to that member. The
//! separation is already folded to the nearest periodic image, so callers
//! never need to know whether the domain wraps.

use crate::periodic::{separation, PeriodicBox};
use glam::DVec3;

/// One member found inside a search ball.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    /// Index of the member in the caller's element table.
    pub index: usize,
    /// `center - member`, nearest image.
    pub offset: DVec3,
    /// `offset.length_squared()`, always `< radius²`.
    pub distance_sq: f64,
}

/// Anything that can enumerate members within a radius of a point.
///
/// The returned iterator is lazy and finite. Each member appears at most
/// once, and the center itself is included when it is indexed.
pub trait NeighborQuery {
    type Iter<'a>: Iterator<Item = Candidate>
    where
        Self: 'a;

    fn query(&self, center: DVec3, radius: f64) -> Self::Iter<'_>;
}

/// Linear scan over an explicit member list.
///
/// Useful as a reference for tiny sets and for checking the grid.
#[derive(Debug, Clone)]
pub struct BruteForce<'p> {
    positions: &'p [DVec3],
    members: Vec<usize>,
    periodic: Option<PeriodicBox>,
}

impl<'p> BruteForce<'p> {
    pub fn new(positions: &'p [DVec3], members: Vec<usize>, periodic: Option<PeriodicBox>) -> Self {
        Self {
            positions,
            members,
            periodic,
        }
    }

    /// Index every position.
    pub fn all(positions: &'p [DVec3], periodic: Option<PeriodicBox>) -> Self {
        Self::new(positions, (0..positions.len()).collect(), periodic)
    }
}

impl NeighborQuery for BruteForce<'_> {
    type Iter<'a>
        = BruteForceIter<'a>
    where
        Self: 'a;

    fn query(&self, center: DVec3, radius: f64) -> Self::Iter<'_> {
        BruteForceIter {
            positions: self.positions,
            members: self.members.iter(),
            periodic: self.periodic.as_ref(),
            center,
            radius_sq: radius * radius,
        }
    }
}

/// Iterator returned by [`BruteForce::query`].
pub struct BruteForceIter<'a> {
    positions: &'a [DVec3],
    members: std::slice::Iter<'a, usize>,
    periodic: Option<&'a PeriodicBox>,
    center: DVec3,
    radius_sq: f64,
}

impl Iterator for BruteForceIter<'_> {
    type Item = Candidate;

    fn next(&mut self) -> Option<Candidate> {
        for &index in self.members.by_ref() {
            let offset = separation(self.center, self.positions[index], self.periodic);
            let distance_sq = offset.length_squared();
            if distance_sq < self.radius_sq {
                return Some(Candidate {
                    index,
                    offset,
                    distance_sq,
                });
            }
        }
        None
    }
}

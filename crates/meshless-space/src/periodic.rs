//! Periodic boundary handling and axis-aligned bounds.

use crate::{Error, Result};
use glam::DVec3;

/// A rectangular box with periodic boundaries on every axis.
///
/// Separations are reported under the minimum-image convention: each
/// component is folded into `[-L/2, L/2]`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PeriodicBox {
    lengths: DVec3,
}

impl PeriodicBox {
    /// Box with the given edge lengths. All must be finite and positive.
    pub fn new(lengths: DVec3) -> Result<Self> {
        let ok = |l: f64| l.is_finite() && l > 0.0;
        if !(ok(lengths.x) && ok(lengths.y) && ok(lengths.z)) {
            return Err(Error::InvalidBox {
                x: lengths.x,
                y: lengths.y,
                z: lengths.z,
            });
        }
        Ok(Self { lengths })
    }

    /// Cube of edge `length`.
    pub fn cube(length: f64) -> Result<Self> {
        Self::new(DVec3::splat(length))
    }

    pub fn lengths(&self) -> DVec3 {
        self.lengths
    }

    /// Fold a position into `[0, L)` on every axis.
    pub fn wrap(&self, p: DVec3) -> DVec3 {
        let w = p - self.lengths * (p / self.lengths).floor();
        // floor can leave w == L for tiny negative inputs
        DVec3::new(
            if w.x >= self.lengths.x { 0.0 } else { w.x },
            if w.y >= self.lengths.y { 0.0 } else { w.y },
            if w.z >= self.lengths.z { 0.0 } else { w.z },
        )
    }

    /// Nearest-image form of a separation vector.
    pub fn nearest_image(&self, d: DVec3) -> DVec3 {
        d - self.lengths * (d / self.lengths).round()
    }
}

/// Separation `a - b`, folded to the nearest image when a box is given.
pub fn separation(a: DVec3, b: DVec3, periodic: Option<&PeriodicBox>) -> DVec3 {
    let d = a - b;
    match periodic {
        Some(pbox) => pbox.nearest_image(d),
        None => d,
    }
}

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: DVec3,
    pub max: DVec3,
}

impl Aabb {
    /// Bounds of a point set, or `None` when it is empty.
    pub fn enclosing(points: impl IntoIterator<Item = DVec3>) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let mut bounds = Aabb {
            min: first,
            max: first,
        };
        for p in iter {
            bounds.min = bounds.min.min(p);
            bounds.max = bounds.max.max(p);
        }
        Some(bounds)
    }

    pub fn extent(&self) -> DVec3 {
        self.max - self.min
    }

    /// Squared distance from `p` to the nearest point of the box.
    ///
    /// With a periodic box the gap along each axis is measured to whichever
    /// image of `p` lies closest.
    pub fn distance_sq(&self, p: DVec3, periodic: Option<&PeriodicBox>) -> f64 {
        let center = (self.min + self.max) * 0.5;
        let half = self.extent() * 0.5;
        let offset = separation(p, center, periodic).abs();
        let gap = (offset - half).max(DVec3::ZERO);
        gap.length_squared()
    }
}

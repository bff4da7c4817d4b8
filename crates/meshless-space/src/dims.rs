//! Spatial dimensionality.
//!
//! Everything dimension-dependent in the solver (kernel normalization, the
//! volume a radius encloses, the exponent used when converting a neighbor
//! count deficit into a radius step) hangs off [`Dimensions`]. Positions are
//! always stored as three components; unused axes stay at zero.

use glam::DVec3;
use std::f64::consts::PI;

/// Number of spatial axes in use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "u8", into = "u8"))]
pub enum Dimensions {
    One,
    Two,
    #[default]
    Three,
}

impl Dimensions {
    /// Axis count as an integer.
    pub const fn count(self) -> usize {
        match self {
            Dimensions::One => 1,
            Dimensions::Two => 2,
            Dimensions::Three => 3,
        }
    }

    /// Axis count as a float, for exponents and divisors.
    pub fn as_f64(self) -> f64 {
        self.count() as f64
    }

    /// Volume of the unit ball: 2, pi, 4pi/3.
    pub fn unit_ball(self) -> f64 {
        match self {
            Dimensions::One => 2.0,
            Dimensions::Two => PI,
            Dimensions::Three => 4.0 * PI / 3.0,
        }
    }

    /// Volume enclosed by a ball of the given radius.
    pub fn ball_volume(self, radius: f64) -> f64 {
        self.unit_ball() * self.power(radius)
    }

    /// `value^D` without going through `powi` for the common cases.
    pub fn power(self, value: f64) -> f64 {
        match self {
            Dimensions::One => value,
            Dimensions::Two => value * value,
            Dimensions::Three => value * value * value,
        }
    }

    /// D-th root.
    pub fn root(self, value: f64) -> f64 {
        match self {
            Dimensions::One => value,
            Dimensions::Two => value.sqrt(),
            Dimensions::Three => value.cbrt(),
        }
    }

    /// Zero the components beyond the active axes.
    pub fn project(self, v: DVec3) -> DVec3 {
        match self {
            Dimensions::One => DVec3::new(v.x, 0.0, 0.0),
            Dimensions::Two => DVec3::new(v.x, v.y, 0.0),
            Dimensions::Three => v,
        }
    }
}

impl TryFrom<u8> for Dimensions {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Dimensions::One),
            2 => Ok(Dimensions::Two),
            3 => Ok(Dimensions::Three),
            other => Err(format!("unsupported dimensionality {other}")),
        }
    }
}

impl From<Dimensions> for u8 {
    fn from(dims: Dimensions) -> Self {
        dims.count() as u8
    }
}

impl std::fmt::Display for Dimensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}D", self.count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_ball_matches_closed_forms() {
        assert_eq!(Dimensions::One.unit_ball(), 2.0);
        assert!((Dimensions::Two.unit_ball() - PI).abs() < 1e-15);
        assert!((Dimensions::Three.unit_ball() - 4.18879020478639).abs() < 1e-12);
    }

    #[test]
    fn power_and_root_are_inverse() {
        for dims in [Dimensions::One, Dimensions::Two, Dimensions::Three] {
            let x = 2.75;
            let back = dims.root(dims.power(x));
            assert!((back - x).abs() < 1e-12, "{dims}: {back} != {x}");
        }
    }

    #[test]
    fn project_drops_unused_axes() {
        let v = DVec3::new(1.0, 2.0, 3.0);
        assert_eq!(Dimensions::One.project(v), DVec3::new(1.0, 0.0, 0.0));
        assert_eq!(Dimensions::Two.project(v), DVec3::new(1.0, 2.0, 0.0));
        assert_eq!(Dimensions::Three.project(v), v);
    }

    #[test]
    fn rejects_four_dimensions() {
        assert!(Dimensions::try_from(4u8).is_err());
        assert_eq!(Dimensions::try_from(2u8), Ok(Dimensions::Two));
    }
}

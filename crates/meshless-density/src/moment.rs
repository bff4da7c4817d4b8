//! Second-moment matrix of neighbor offsets and its inversion.
//!
//! For a fluid center the solver accumulates `T = Σ w_j · dp_j ⊗ dp_j` over
//! its neighbors. `T⁻¹` turns weighted offset sums into least-squares
//! gradients, and how badly `T` is conditioned says how much those gradients
//! can be trusted.
//!
//! # Degenerate neighborhoods
//!
//! A singular or NaN determinant yields a zero inverse with
//! `reliable = false`. The condition estimate is still computed from the
//! finite entries, which with a zero inverse floors it at 1. Callers treat
//! this as "no gradient", never as an error.

use glam::{DMat3, DVec3};
use meshless_space::Dimensions;
use serde::{Deserialize, Serialize};

/// Upper triangle of a symmetric 3×3 matrix.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SymMoment {
    pub xx: f64,
    pub xy: f64,
    pub xz: f64,
    pub yy: f64,
    pub yz: f64,
    pub zz: f64,
}

impl SymMoment {
    /// Add `weight · d ⊗ d`.
    #[inline]
    pub fn add_outer(&mut self, weight: f64, d: DVec3) {
        self.xx += weight * d.x * d.x;
        self.xy += weight * d.x * d.y;
        self.xz += weight * d.x * d.z;
        self.yy += weight * d.y * d.y;
        self.yz += weight * d.y * d.z;
        self.zz += weight * d.z * d.z;
    }

    pub fn merge(&mut self, other: &SymMoment) {
        self.xx += other.xx;
        self.xy += other.xy;
        self.xz += other.xz;
        self.yy += other.yy;
        self.yz += other.yz;
        self.zz += other.zz;
    }

    /// Mirrored full matrix.
    pub fn to_matrix(&self) -> DMat3 {
        DMat3::from_cols(
            DVec3::new(self.xx, self.xy, self.xz),
            DVec3::new(self.xy, self.yy, self.yz),
            DVec3::new(self.xz, self.yz, self.zz),
        )
    }
}

/// Result of inverting a moment matrix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Inversion {
    pub inverse: DMat3,
    /// `sqrt(‖T‖²_F · ‖T⁻¹‖²_F) / D`, at least 1.
    pub condition: f64,
    pub reliable: bool,
}

/// Invert the active `D × D` block of `moment`.
pub fn invert(moment: &SymMoment, dims: Dimensions) -> Inversion {
    let m = moment.to_matrix();
    let inverse = match dims {
        Dimensions::One => {
            let det = m.x_axis.x;
            usable(det).then(|| {
                let mut inv = DMat3::ZERO;
                inv.x_axis.x = 1.0 / det;
                inv
            })
        }
        Dimensions::Two => {
            let (a, b, d) = (m.x_axis.x, m.y_axis.x, m.y_axis.y);
            let det = a * d - b * b;
            usable(det).then(|| {
                let mut inv = DMat3::ZERO;
                inv.x_axis.x = d / det;
                inv.y_axis.y = a / det;
                inv.x_axis.y = -b / det;
                inv.y_axis.x = -b / det;
                inv
            })
        }
        Dimensions::Three => {
            let det = m.determinant();
            usable(det).then(|| m.inverse())
        }
    }
    .filter(|inv| inv.is_finite());

    let reliable = inverse.is_some();
    let inverse = inverse.unwrap_or(DMat3::ZERO);
    let condition = ((frobenius_sq(&m) * frobenius_sq(&inverse)).sqrt() / dims.as_f64()).max(1.0);

    Inversion {
        inverse,
        condition,
        reliable,
    }
}

fn usable(det: f64) -> bool {
    det != 0.0 && !det.is_nan()
}

/// Sum of squared finite entries.
fn frobenius_sq(m: &DMat3) -> f64 {
    m.to_cols_array()
        .iter()
        .filter(|v| v.is_finite())
        .map(|v| v * v)
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn isotropic(dims: Dimensions) -> SymMoment {
        let mut t = SymMoment::default();
        let axes = [DVec3::X, DVec3::Y, DVec3::Z];
        for axis in &axes[..dims.count()] {
            t.add_outer(1.0, *axis);
            t.add_outer(1.0, -*axis);
        }
        t
    }

    #[test]
    fn isotropic_neighbors_are_perfectly_conditioned() {
        for dims in [Dimensions::One, Dimensions::Two, Dimensions::Three] {
            let inv = invert(&isotropic(dims), dims);
            assert!(inv.reliable);
            assert!((inv.condition - 1.0).abs() < 1e-12, "{dims}: {}", inv.condition);
            assert!((inv.inverse.x_axis.x - 0.5).abs() < 1e-12);
        }
    }

    #[test]
    fn inverse_times_matrix_is_identity_on_active_block() {
        let mut t = SymMoment::default();
        t.add_outer(0.7, DVec3::new(1.0, 0.2, 0.0));
        t.add_outer(1.3, DVec3::new(-0.3, 0.9, 0.0));
        t.add_outer(0.4, DVec3::new(0.5, -0.5, 0.0));
        let inv = invert(&t, Dimensions::Two);
        let product = t.to_matrix() * inv.inverse;
        assert!((product.x_axis.x - 1.0).abs() < 1e-12);
        assert!((product.y_axis.y - 1.0).abs() < 1e-12);
        assert!(product.x_axis.y.abs() < 1e-12);
        assert!(product.y_axis.x.abs() < 1e-12);
    }

    #[test]
    fn singular_matrix_gives_zero_inverse_and_floor() {
        let mut t = SymMoment::default();
        t.add_outer(1.0, DVec3::X);
        t.add_outer(1.0, -DVec3::X);
        let inv = invert(&t, Dimensions::Two);
        assert!(!inv.reliable);
        assert_eq!(inv.inverse, DMat3::ZERO);
        assert_eq!(inv.condition, 1.0);
    }

    #[test]
    fn nan_entries_do_not_poison_condition() {
        let t = SymMoment {
            xx: f64::NAN,
            ..SymMoment::default()
        };
        let inv = invert(&t, Dimensions::One);
        assert!(!inv.reliable);
        assert_eq!(inv.condition, 1.0);
    }

    #[test]
    fn nearly_collinear_offsets_blow_up_condition() {
        let mut t = SymMoment::default();
        t.add_outer(1.0, DVec3::new(1.0, 0.0, 0.0));
        t.add_outer(1.0, DVec3::new(-1.0, 0.0, 0.0));
        t.add_outer(1.0, DVec3::new(0.5, 1e-3, 0.0));
        let inv = invert(&t, Dimensions::Two);
        assert!(inv.reliable);
        assert!(inv.condition > 1e5, "condition {}", inv.condition);
    }

    #[test]
    fn merge_is_entrywise_sum() {
        let mut a = isotropic(Dimensions::Three);
        let b = isotropic(Dimensions::Three);
        a.merge(&b);
        assert_eq!(a.xx, 4.0);
        assert_eq!(a.zz, 4.0);
        assert_eq!(a.xy, 0.0);
    }
}

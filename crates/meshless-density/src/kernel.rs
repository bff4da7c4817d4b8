//! Smoothing kernels.
//!
//! A kernel is radially symmetric with compact support on `u = r/h < 1`.
//! Callers precompute the inverse radius powers once per center and pass
//! them with every evaluation, so a pair costs one polynomial.

use meshless_space::Dimensions;
use std::f64::consts::PI;

/// `1/h`, `1/h^D` and `1/h^(D+1)` for one interaction radius.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InverseRadius {
    pub h: f64,
    pub h_dim: f64,
    pub h_dim1: f64,
}

impl InverseRadius {
    pub fn new(radius: f64, dims: Dimensions) -> Self {
        let h = 1.0 / radius;
        let h_dim = dims.power(h);
        Self {
            h,
            h_dim,
            h_dim1: h_dim * h,
        }
    }
}

/// A radial smoothing function and its derivative.
pub trait Kernel: Send + Sync {
    /// Weight and radial derivative at normalized distance `u` in `[0, 1)`.
    ///
    /// `w` carries `1/h^D` and `dw` carries `1/h^(D+1)`.
    fn evaluate(&self, u: f64, inv: &InverseRadius) -> (f64, f64);
}

/// The M4 cubic spline with support `h` (not `2h`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CubicSpline {
    norm: f64,
}

impl CubicSpline {
    pub fn new(dims: Dimensions) -> Self {
        let norm = match dims {
            Dimensions::One => 4.0 / 3.0,
            Dimensions::Two => 40.0 / (7.0 * PI),
            Dimensions::Three => 8.0 / PI,
        };
        Self { norm }
    }
}

impl Kernel for CubicSpline {
    #[inline]
    fn evaluate(&self, u: f64, inv: &InverseRadius) -> (f64, f64) {
        if u < 0.5 {
            let w = self.norm * inv.h_dim * (1.0 + 6.0 * (u - 1.0) * u * u);
            let dw = self.norm * inv.h_dim1 * u * (18.0 * u - 12.0);
            (w, dw)
        } else if u < 1.0 {
            let t = 1.0 - u;
            let w = self.norm * inv.h_dim * 2.0 * t * t * t;
            let dw = -self.norm * inv.h_dim1 * 6.0 * t * t;
            (w, dw)
        } else {
            (0.0, 0.0)
        }
    }
}

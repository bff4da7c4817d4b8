//! Error types for meshless-density.
//!
//! Only step-wide failures become an [`Error`]. Degenerate geometry, clamped
//! radii and empty neighborhoods are handled per element and never surface
//! here.

use crate::ElementKind;
use glam::DVec3;
use std::fmt;
use thiserror::Error;

/// Result type for solver operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that abort a density step.
#[derive(Debug, Error)]
pub enum Error {
    /// An element was still iterating when the budget ran out.
    #[error("failed to converge in neighbor iteration after {iterations} passes: {diagnostic}")]
    NonConvergence {
        iterations: usize,
        diagnostic: Box<ElementDiagnostic>,
    },

    /// Both bracket ends were zero when a step was needed.
    #[error("radius bracket collapsed: {diagnostic}")]
    BracketCollapse { diagnostic: Box<ElementDiagnostic> },

    /// Configuration failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Building the spatial index failed.
    #[error("spatial index error: {0}")]
    Space(#[from] meshless_space::Error),

    /// A remote partition request failed.
    #[error("exchange error: {0}")]
    Exchange(#[from] meshless_exchange::Error),
}

/// Snapshot of one element's iteration state, for fatal reports and warnings.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementDiagnostic {
    pub id: u64,
    pub kind: ElementKind,
    pub radius: f64,
    pub lower: f64,
    pub upper: f64,
    pub neighbor_count: f64,
    pub target: f64,
    pub deviation: f64,
    pub clamped_max: bool,
    pub clamped_min: bool,
    pub min_radius: f64,
    pub max_radius: f64,
    pub position: DVec3,
}

impl fmt::Display for ElementDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "element {} ({:?}) h={:.6e} bracket=[{:.6e}, {:.6e}] ngb={:.4} target={:.4}±{:.4} \
             clamp(max={}, min={}) limits=[{:.6e}, {:.6e}] pos=({:.6}, {:.6}, {:.6})",
            self.id,
            self.kind,
            self.radius,
            self.lower,
            self.upper,
            self.neighbor_count,
            self.target,
            self.deviation,
            self.clamped_max,
            self.clamped_min,
            self.min_radius,
            self.max_radius,
            self.position.x,
            self.position.y,
            self.position.z,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostic_names_element_and_bracket() {
        let diag = ElementDiagnostic {
            id: 17,
            kind: ElementKind::Gas,
            radius: 0.5,
            lower: 0.25,
            upper: 0.75,
            neighbor_count: 12.0,
            target: 32.0,
            deviation: 1.0,
            clamped_max: false,
            clamped_min: true,
            min_radius: 0.0,
            max_radius: 10.0,
            position: DVec3::new(1.0, 2.0, 3.0),
        };
        let text = Error::NonConvergence {
            iterations: 201,
            diagnostic: Box::new(diag),
        }
        .to_string();
        assert!(text.contains("element 17"), "{text}");
        assert!(text.contains("201 passes"), "{text}");
        assert!(text.contains("min=true"), "{text}");
    }
}

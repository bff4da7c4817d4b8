//! Equations of state.

use crate::element::Element;

/// Pressure from the element's thermodynamic state at a given density.
pub trait EquationOfState: Send + Sync {
    fn pressure(&self, element: &Element, density: f64) -> f64;
}

/// `P = (γ − 1) ρ u`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IdealGas {
    pub gamma: f64,
}

impl Default for IdealGas {
    fn default() -> Self {
        Self { gamma: 5.0 / 3.0 }
    }
}

impl EquationOfState for IdealGas {
    fn pressure(&self, element: &Element, density: f64) -> f64 {
        (self.gamma - 1.0) * density * element.internal_energy
    }
}

/// `P = c² ρ`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Isothermal {
    pub sound_speed: f64,
}

impl EquationOfState for Isothermal {
    fn pressure(&self, _element: &Element, density: f64) -> f64 {
        self.sound_speed * self.sound_speed * density
    }
}

use crate::G;
use crate::error::{FlowError, Result};
use serde::{Deserialize, Serialize};

// Longitudinal dispersion law of the solute
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "law", rename_all = "snake_case")]
pub enum Dispersion {
    Rutherford { k: f64 },
}

impl Dispersion {
    pub fn code(&self) -> u32 {
        match self {
            Dispersion::Rutherford { .. } => 1,
        }
    }

    pub fn validate(&self) -> Result<()> {
        match *self {
            Dispersion::Rutherford { k } if k.is_finite() && k >= 0.0 => Ok(()),
            Dispersion::Rutherford { .. } => Err(FlowError::invalid(
                "diffusion",
                "coefficient must be non-negative",
            )),
        }
    }

    // Dispersion coefficient Kx [m²/s] from perimeter, area and friction slope
    pub fn coefficient(&self, p: f64, a: f64, sf: f64) -> f64 {
        match *self {
            Dispersion::Rutherford { k } => k * (G * p * a * sf.abs()).sqrt(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn scales_with_shear_velocity() {
        let law = Dispersion::Rutherford { k: 5.93 };
        let kx = law.coefficient(1.4, 0.2, 0.001);
        assert_relative_eq!(kx, 5.93 * (G * 1.4 * 0.2 * 0.001f64).sqrt());
        assert_eq!(law.coefficient(1.4, 0.2, -0.001), kx);
        assert_eq!(law.coefficient(1.4, 0.0, 0.0), 0.0);
    }
}

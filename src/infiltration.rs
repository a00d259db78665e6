use crate::error::{FlowError, Result};
use serde::{Deserialize, Serialize};

// Soil infiltration law
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "law", rename_all = "snake_case")]
pub enum Infiltration {
    // Cumulative depth Z(t) = a t^b + c t over a wetted length l
    KostiakovLewis { a: f64, b: f64, c: f64, l: f64 },
}

impl Infiltration {
    pub fn code(&self) -> u32 {
        match self {
            Infiltration::KostiakovLewis { .. } => 1,
        }
    }

    pub fn validate(&self) -> Result<()> {
        match *self {
            Infiltration::KostiakovLewis { a, b, c, l } => {
                if [a, b, c, l].iter().any(|v| !v.is_finite()) {
                    return Err(FlowError::invalid("infiltration", "non-finite coefficient"));
                }
                if a < 0.0 || b < 0.0 {
                    return Err(FlowError::invalid(
                        "infiltration",
                        "coefficients a and b must be non-negative",
                    ));
                }
                if l <= 0.0 {
                    return Err(FlowError::invalid(
                        "infiltration",
                        "reference length must be positive",
                    ));
                }
                Ok(())
            }
        }
    }

    /**
    Depth [m] infiltrated during `dt` [s] by soil that already holds an
    infiltrated area `ai` [m²].

    The power term is integrated over the step from the time at which the
    law reaches `ai`, so it stays bounded when nothing has infiltrated yet.
    */
    pub fn depth_increment(&self, ai: f64, dt: f64) -> f64 {
        match *self {
            Infiltration::KostiakovLewis { a, b, c, l } => {
                let mut z = c * dt;
                if a > 0.0 && b > 0.0 {
                    let t = (ai.max(0.0) / (a * l)).powf(1.0 / b);
                    z += a * ((t + dt).powf(b) - t.powf(b));
                }
                z
            }
        }
    }

    // Mean infiltration velocity [m/s] over a step of `dt` [s]
    pub fn rate(&self, ai: f64, dt: f64) -> f64 {
        if dt <= 0.0 {
            return 0.0;
        }
        self.depth_increment(ai, dt) / dt
    }
}

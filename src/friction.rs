use crate::error::{FlowError, Result};
use serde::{Deserialize, Serialize};

/// Friction law of the channel bed.
///
/// Every law is written as `Sf = f Q |Q|`, so the momentum equations and the
/// normal-flow discharge `Q = sqrt(S / f)` only need the coefficient `f`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "law", rename_all = "snake_case")]
pub enum Friction {
    Manning { n: f64 },
    // Manning with the velocity profile that minimises energy losses
    ManningMinimalLosses { n: f64 },
}

// Friction coefficient and momentum correction factor of a wet section
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrictionTerms {
    pub f: f64,
    pub beta: f64,
}

impl FrictionTerms {
    pub const NONE: FrictionTerms = FrictionTerms { f: 0.0, beta: 1.0 };
}

impl Friction {
    pub fn code(&self) -> u32 {
        match self {
            Friction::Manning { .. } => 1,
            Friction::ManningMinimalLosses { .. } => 2,
        }
    }

    pub fn validate(&self) -> Result<()> {
        let n = match self {
            Friction::Manning { n } | Friction::ManningMinimalLosses { n } => *n,
        };
        if !n.is_finite() || n < 0.0 {
            return Err(FlowError::invalid(
                "friction",
                "Manning coefficient must be non-negative",
            ));
        }
        Ok(())
    }

    /**
    Coefficients for a trapezoidal section.

    # Arguments
    * `a` - Wetted area [m²]
    * `h` - Depth [m]
    * `p` - Wetted perimeter [m]
    * `b0` - Bottom width [m]
    * `z` - Side slope [-]
    */
    pub fn terms(&self, a: f64, h: f64, p: f64, b0: f64, z: f64) -> FrictionTerms {
        if a <= 0.0 || h <= 0.0 {
            return FrictionTerms::NONE;
        }
        match *self {
            Friction::Manning { n } => FrictionTerms {
                f: n * n * (p / a).powf(4.0 / 3.0) / (a * a),
                beta: 1.0,
            },
            Friction::ManningMinimalLosses { n } => {
                let i5 = b0 * h.powf(5.0 / 3.0) + 0.75 * z * h.powf(8.0 / 3.0);
                let i7 = b0 * h.powf(7.0 / 3.0) + 0.6 * z * h.powf(10.0 / 3.0);
                if i5 <= 0.0 {
                    return FrictionTerms::NONE;
                }
                FrictionTerms {
                    f: n * n / (i5 * i5),
                    beta: a * i7 / (i5 * i5),
                }
            }
        }
    }
}

// Friction slope for a coefficient and a discharge
pub fn friction_slope(f: f64, q: f64) -> f64 {
    f * q * q.abs()
}

// Discharge of uniform flow along a slope, zero for adverse or flat slopes
pub fn normal_discharge(f: f64, slope: f64) -> f64 {
    if slope <= 0.0 || f <= 0.0 {
        0.0
    } else {
        (slope / f).sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn manning_matches_the_textbook_formula() {
        // Rectangular 1 m wide, 0.2 m deep
        let (b0, h) = (1.0, 0.2);
        let a = b0 * h;
        let p = b0 + 2.0 * h;
        let n = 0.03;
        let terms = Friction::Manning { n }.terms(a, h, p, b0, 0.0);
        let q = 0.1;
        let u = q / a;
        let r: f64 = a / p;
        assert_relative_eq!(
            friction_slope(terms.f, q),
            n * n * u * u / r.powf(4.0 / 3.0),
            max_relative = 1e-12
        );
        assert_eq!(terms.beta, 1.0);
    }

    #[test]
    fn normal_discharge_inverts_the_slope() {
        let terms = Friction::Manning { n: 0.02 }.terms(0.3, 0.3, 1.6, 1.0, 0.0);
        let q = normal_discharge(terms.f, 0.004);
        assert_relative_eq!(friction_slope(terms.f, q), 0.004, max_relative = 1e-12);
        assert_eq!(normal_discharge(terms.f, -0.004), 0.0);
    }

    #[test]
    fn minimal_losses_factor_is_not_below_one() {
        let law = Friction::ManningMinimalLosses { n: 0.03 };
        let (b0, z, h) = (0.1, 1.0, 0.15);
        let a = h * (b0 + z * h);
        let p = b0 + 2.0 * (1.0f64 + z * z).sqrt() * h;
        let terms = law.terms(a, h, p, b0, z);
        assert!(terms.f > 0.0);
        assert!(terms.beta >= 1.0);

        // A rectangle has a uniform velocity profile
        let rect = law.terms(0.2, 0.2, 1.4, 1.0, 0.0);
        assert_relative_eq!(rect.beta, 1.0, max_relative = 1e-12);
    }

    #[test]
    fn dry_section_has_no_friction() {
        let terms = Friction::Manning { n: 0.03 }.terms(0.0, 0.0, 1.0, 1.0, 0.0);
        assert_eq!(terms, FrictionTerms::NONE);
    }
}

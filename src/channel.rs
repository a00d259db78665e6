use crate::dispersion::Dispersion;
use crate::error::{FlowError, Result};
use crate::friction::Friction;
use crate::geometry::Geometry;
use crate::hydrogram::Hydrogram;
use crate::infiltration::Infiltration;
use serde::{Deserialize, Serialize};

// Regime imposed at the upstream end
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InletType {
    Subcritical,   // Discharge clipped below the critical discharge
    Supercritical, // Discharge left free
}

// Condition imposed at the downstream end
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutletType {
    Closed, // Zero discharge
    Open,   // At least critical discharge, free outfall
}

impl InletType {
    pub fn from_code(code: i64) -> Result<Self> {
        match code {
            1 => Ok(InletType::Subcritical),
            2 => Ok(InletType::Supercritical),
            _ => Err(FlowError::invalid("channel", format!("bad inlet type {code}"))),
        }
    }

    pub fn code(&self) -> u32 {
        match self {
            InletType::Subcritical => 1,
            InletType::Supercritical => 2,
        }
    }
}

impl OutletType {
    pub fn from_code(code: i64) -> Result<Self> {
        match code {
            1 => Ok(OutletType::Closed),
            2 => Ok(OutletType::Open),
            _ => Err(FlowError::invalid("channel", format!("bad outlet type {code}"))),
        }
    }

    pub fn code(&self) -> u32 {
        match self {
            OutletType::Closed => 1,
            OutletType::Open => 2,
        }
    }
}

// Static description of the reach: shape, boundary fluxes and sub-models
#[derive(Debug, Clone)]
pub struct Channel {
    pub geometry: Geometry,
    pub water_inlet: Hydrogram,  // Discharge [m³/s]
    pub solute_inlet: Hydrogram, // Solute mass flux [kg/s]
    pub inlet: InletType,
    pub outlet: OutletType,
    pub friction: Friction,
    pub infiltration: Infiltration,
    pub dispersion: Dispersion,
}

impl Channel {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        geometry: Geometry,
        water_inlet: Hydrogram,
        solute_inlet: Hydrogram,
        inlet: InletType,
        outlet: OutletType,
        friction: Friction,
        infiltration: Infiltration,
        dispersion: Dispersion,
    ) -> Result<Self> {
        friction.validate()?;
        infiltration.validate()?;
        dispersion.validate()?;
        Ok(Channel {
            geometry,
            water_inlet,
            solute_inlet,
            inlet,
            outlet,
            friction,
            infiltration,
            dispersion,
        })
    }

    pub fn length(&self) -> f64 {
        self.geometry.length()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::GeometryPoint;

    #[test]
    fn type_codes_round_trip() {
        for code in [1, 2] {
            assert_eq!(InletType::from_code(code).unwrap().code() as i64, code);
            assert_eq!(OutletType::from_code(code).unwrap().code() as i64, code);
        }
        assert!(OutletType::from_code(3).is_err());
        assert!(InletType::from_code(0).is_err());
    }

    #[test]
    fn rejects_invalid_sub_models() {
        let flat = |x: f64| GeometryPoint {
            x,
            zb: 0.0,
            b0: 1.0,
            z: 0.0,
            zmax: 1.0,
        };
        let geometry = Geometry::new(vec![flat(0.0), flat(10.0)]).unwrap();
        let channel = Channel::new(
            geometry,
            Hydrogram::constant(0.0),
            Hydrogram::constant(0.0),
            InletType::Subcritical,
            OutletType::Closed,
            Friction::Manning { n: -0.01 },
            Infiltration::KostiakovLewis {
                a: 0.0,
                b: 0.0,
                c: 0.0,
                l: 1.0,
            },
            Dispersion::Rutherford { k: 0.0 },
        );
        assert!(channel.is_err());
    }
}

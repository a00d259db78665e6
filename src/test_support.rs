use crate::channel::{Channel, InletType, OutletType};
use crate::dispersion::Dispersion;
use crate::flow_model::Physics;
use crate::friction::Friction;
use crate::geometry::{Geometry, GeometryPoint};
use crate::hydrogram::Hydrogram;
use crate::infiltration::Infiltration;

// Rectangular reach falling uniformly from x = 0 to x = length
pub fn rectangular_channel(length: f64, b0: f64, slope: f64) -> Channel {
    let point = |x: f64, zb: f64| GeometryPoint {
        x,
        zb,
        b0,
        z: 0.0,
        zmax: zb + 10.0,
    };
    let geometry = Geometry::new(vec![point(0.0, length * slope), point(length, 0.0)]).unwrap();
    Channel::new(
        geometry,
        Hydrogram::constant(0.0),
        Hydrogram::constant(0.0),
        InletType::Subcritical,
        OutletType::Closed,
        Friction::Manning { n: 0.03 },
        no_infiltration(),
        Dispersion::Rutherford { k: 0.0 },
    )
    .unwrap()
}

pub fn no_infiltration() -> Infiltration {
    Infiltration::KostiakovLewis {
        a: 0.0,
        b: 0.0,
        c: 0.0,
        l: 1.0,
    }
}

// Manning friction, no infiltration, no dispersion, closed outlet
pub fn physics(n: f64, minimum_depth: f64) -> Physics {
    Physics {
        friction: Friction::Manning { n },
        infiltration: no_infiltration(),
        dispersion: Dispersion::Rutherford { k: 0.0 },
        inlet: InletType::Subcritical,
        outlet: OutletType::Closed,
        minimum_depth,
    }
}

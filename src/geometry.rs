use crate::error::{FlowError, Result};
use serde::{Deserialize, Serialize};

// Cross section surveyed at one longitudinal station
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeometryPoint {
    pub x: f64,    // Station [m]
    pub zb: f64,   // Bed level [m]
    pub b0: f64,   // Bottom width [m]
    pub z: f64,    // Side slope, horizontal over vertical [-]
    pub zmax: f64, // Maximum level before overflow [m]
}

// Attributes sampled at one station, used to build a mesh node
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Section {
    pub zb: f64,
    pub b0: f64,
    pub z: f64,
    pub zmax: f64,
}

/**
Longitudinal description of the channel.

Stations are non-decreasing. Every attribute is linearly interpolated between
the bracketing stations and held constant beyond the first and last ones.
*/
#[derive(Debug, Clone, PartialEq)]
pub struct Geometry {
    points: Vec<GeometryPoint>,
}

impl Geometry {
    pub fn new(points: Vec<GeometryPoint>) -> Result<Self> {
        if points.len() < 2 {
            return Err(FlowError::invalid("geometry", "at least two points are required"));
        }
        for (i, p) in points.iter().enumerate() {
            if [p.x, p.zb, p.b0, p.z, p.zmax].iter().any(|v| !v.is_finite()) {
                return Err(FlowError::invalid("geometry", format!("point {i}: non-finite value")));
            }
            if p.b0 < 0.0 || p.z < 0.0 {
                return Err(FlowError::invalid(
                    "geometry",
                    format!("point {i}: negative bottom width or side slope"),
                ));
            }
            if p.b0 == 0.0 && p.z == 0.0 {
                return Err(FlowError::invalid(
                    "geometry",
                    format!("point {i}: zero bottom width needs a side slope"),
                ));
            }
            if p.zmax <= p.zb {
                return Err(FlowError::invalid(
                    "geometry",
                    format!("point {i}: maximum level must exceed the bed level"),
                ));
            }
        }
        if points.windows(2).any(|w| w[1].x < w[0].x) {
            return Err(FlowError::invalid("geometry", "stations must be non-decreasing"));
        }
        let geometry = Geometry { points };
        if geometry.length() <= 0.0 {
            return Err(FlowError::invalid("geometry", "channel length must be positive"));
        }
        Ok(geometry)
    }

    pub fn points(&self) -> &[GeometryPoint] {
        &self.points
    }

    pub fn start(&self) -> f64 {
        self.points[0].x
    }

    pub fn length(&self) -> f64 {
        self.points[self.points.len() - 1].x - self.points[0].x
    }

    pub fn level_at(&self, x: f64) -> f64 {
        self.interpolate(x, |p| p.zb)
    }

    pub fn bottom_width_at(&self, x: f64) -> f64 {
        self.interpolate(x, |p| p.b0)
    }

    pub fn side_slope_at(&self, x: f64) -> f64 {
        self.interpolate(x, |p| p.z)
    }

    pub fn max_level_at(&self, x: f64) -> f64 {
        self.interpolate(x, |p| p.zmax)
    }

    pub fn section_at(&self, x: f64) -> Section {
        Section {
            zb: self.level_at(x),
            b0: self.bottom_width_at(x),
            z: self.side_slope_at(x),
            zmax: self.max_level_at(x),
        }
    }

    fn interpolate(&self, x: f64, value: impl Fn(&GeometryPoint) -> f64) -> f64 {
        let first = &self.points[0];
        let last = &self.points[self.points.len() - 1];
        if x <= first.x {
            return value(first);
        }
        if x >= last.x {
            return value(last);
        }
        // points[i - 1].x <= x < points[i].x
        let i = self.points.partition_point(|p| p.x <= x);
        let (p1, p2) = (&self.points[i - 1], &self.points[i]);
        value(p1) + (x - p1.x) * (value(p2) - value(p1)) / (p2.x - p1.x)
    }
}

use crate::channel::Channel;
use crate::error::{FlowError, Result};
use crate::node::{AREA, DISCHARGE, INFILTRATED, INFILTRATED_SOLUTE, Node, SOLUTE};
use serde::{Deserialize, Serialize};

// One station of a longitudinal initial profile
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProfilePoint {
    pub x: f64, // Station [m]
    pub a: f64, // Wetted area [m²]
    pub q: f64, // Discharge [m³/s]
    pub s: f64, // Concentration [kg/m³]
}

// Initial state of the channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "profile", rename_all = "snake_case")]
pub enum InitialConditions {
    Dry,
    Profile(Vec<ProfilePoint>),
}

impl InitialConditions {
    pub fn validate(&self) -> Result<()> {
        let InitialConditions::Profile(points) = self else {
            return Ok(());
        };
        if points.is_empty() {
            return Err(FlowError::invalid("initial profile", "no points"));
        }
        for (i, p) in points.iter().enumerate() {
            if [p.x, p.a, p.q, p.s].iter().any(|v| !v.is_finite()) {
                return Err(FlowError::invalid(
                    "initial profile",
                    format!("point {i}: non-finite value"),
                ));
            }
            if p.a < 0.0 || p.s < 0.0 {
                return Err(FlowError::invalid(
                    "initial profile",
                    format!("point {i}: negative area or concentration"),
                ));
            }
        }
        if points.windows(2).any(|w| w[1].x < w[0].x) {
            return Err(FlowError::invalid(
                "initial profile",
                "stations must be non-decreasing",
            ));
        }
        Ok(())
    }
}

// Linear interpolation in a profile, held constant beyond its ends
fn profile_at(points: &[ProfilePoint], x: f64) -> (f64, f64, f64) {
    let first = &points[0];
    let last = &points[points.len() - 1];
    if x <= first.x {
        return (first.a, first.q, first.s);
    }
    if x >= last.x {
        return (last.a, last.q, last.s);
    }
    let j = points.partition_point(|p| p.x <= x);
    let (p1, p2) = (&points[j - 1], &points[j]);
    let w = (x - p1.x) / (p2.x - p1.x);
    (
        p1.a + w * (p2.a - p1.a),
        p1.q + w * (p2.q - p1.q),
        p1.s + w * (p2.s - p1.s),
    )
}

/**
Uniform finite-volume mesh along the channel.

Nodes are `ix` apart; the boundary nodes own half a cell so that the control
volumes tile the reach exactly.
*/
#[derive(Debug, Clone)]
pub struct Mesh {
    pub nodes: Vec<Node>,
}

impl Mesh {
    pub fn open(channel: &Channel, n: usize) -> Result<Self> {
        if n < 3 {
            return Err(FlowError::invalid("mesh", "at least three nodes are required"));
        }
        let ix = channel.length() / (n - 1) as f64;
        let start = channel.geometry.start();
        let nodes = (0..n)
            .map(|i| {
                let x = start + i as f64 * ix;
                let dx = if i == 0 || i == n - 1 { 0.5 * ix } else { ix };
                Node::new(x, dx, ix, channel.geometry.section_at(x))
            })
            .collect();
        Ok(Mesh { nodes })
    }

    pub fn apply_initial_conditions(&mut self, initial: &InitialConditions) -> Result<()> {
        initial.validate()?;
        for node in &mut self.nodes {
            node.state = [0.0; 5];
            if let InitialConditions::Profile(points) = initial {
                let (a, q, s) = profile_at(points, node.x);
                node.state[AREA] = a;
                node.state[DISCHARGE] = q;
                node.state[SOLUTE] = a * s;
            }
            node.update_geometry();
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    // Surface plus infiltrated water volume [m³]
    pub fn water_mass(&self) -> f64 {
        self.nodes
            .iter()
            .map(|n| n.dx * (n.state[AREA] + n.state[INFILTRATED]))
            .sum()
    }

    // Surface plus infiltrated solute mass [kg]
    pub fn solute_mass(&self) -> f64 {
        self.nodes
            .iter()
            .map(|n| n.dx * (n.state[SOLUTE] + n.state[INFILTRATED_SOLUTE]))
            .sum()
    }

    pub fn infiltrated_mass(&self) -> f64 {
        self.nodes.iter().map(|n| n.dx * n.state[INFILTRATED]).sum()
    }

    // Station of the last wet node before the first dry one
    pub fn advance(&self) -> f64 {
        let first_dry = self
            .nodes
            .iter()
            .position(|n| n.state[AREA] == 0.0)
            .unwrap_or(self.nodes.len());
        self.nodes[first_dry.saturating_sub(1)].x
    }

    // Index of the node closest to a station
    pub fn nearest_node(&self, x: f64) -> usize {
        let mut best = 0;
        let mut distance = f64::INFINITY;
        for (i, node) in self.nodes.iter().enumerate() {
            let d = (node.x - x).abs();
            if d < distance {
                distance = d;
                best = i;
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::rectangular_channel;
    use approx::assert_relative_eq;

    #[test]
    fn cells_tile_the_channel() {
        let channel = rectangular_channel(100.0, 1.0, 0.0);
        let mesh = Mesh::open(&channel, 11).unwrap();
        assert_eq!(mesh.len(), 11);
        assert_relative_eq!(mesh.nodes[0].dx, 5.0);
        assert_relative_eq!(mesh.nodes[5].dx, 10.0);
        assert_relative_eq!(mesh.nodes[10].x, 100.0);
        let total: f64 = mesh.nodes.iter().map(|n| n.dx).sum();
        assert_relative_eq!(total, 100.0, max_relative = 1e-12);
    }

    #[test]
    fn rejects_small_meshes() {
        let channel = rectangular_channel(100.0, 1.0, 0.0);
        assert!(Mesh::open(&channel, 2).is_err());
    }

    fn point(x: f64, a: f64, q: f64, s: f64) -> ProfilePoint {
        ProfilePoint { x, a, q, s }
    }

    #[test]
    fn profile_is_interpolated() {
        let channel = rectangular_channel(100.0, 1.0, 0.0);
        let mut mesh = Mesh::open(&channel, 5).unwrap();
        let profile = InitialConditions::Profile(vec![
            point(0.0, 0.2, 0.1, 2.0),
            point(50.0, 0.1, 0.05, 1.0),
        ]);
        mesh.apply_initial_conditions(&profile).unwrap();
        assert_relative_eq!(mesh.nodes[1].state[AREA], 0.15);
        assert_relative_eq!(mesh.nodes[1].state[SOLUTE], 0.15 * 1.5);
        assert_relative_eq!(mesh.nodes[4].state[DISCHARGE], 0.05);
        assert_eq!(mesh.nodes[4].state[INFILTRATED], 0.0);
        assert_relative_eq!(mesh.nodes[2].hyd.h, 0.1);
    }

    #[test]
    fn rejects_bad_profiles() {
        let channel = rectangular_channel(100.0, 1.0, 0.0);
        let mut mesh = Mesh::open(&channel, 5).unwrap();
        let backwards = InitialConditions::Profile(vec![
            point(10.0, 0.2, 0.0, 0.0),
            point(5.0, 0.2, 0.0, 0.0),
        ]);
        assert!(mesh.apply_initial_conditions(&backwards).is_err());
        let negative = InitialConditions::Profile(vec![point(0.0, -0.2, 0.0, 0.0)]);
        assert!(mesh.apply_initial_conditions(&negative).is_err());
    }

    #[test]
    fn masses_and_advance() {
        let channel = rectangular_channel(100.0, 1.0, 0.0);
        let mut mesh = Mesh::open(&channel, 11).unwrap();
        mesh.apply_initial_conditions(&InitialConditions::Dry).unwrap();
        assert_eq!(mesh.advance(), 0.0);
        for node in mesh.nodes.iter_mut().take(4) {
            node.state[AREA] = 0.1;
            node.state[SOLUTE] = 0.2;
            node.state[INFILTRATED] = 0.05;
        }
        // 5 + 10 + 10 + 10 metres of cells
        assert_relative_eq!(mesh.water_mass(), 35.0 * 0.15, max_relative = 1e-12);
        assert_relative_eq!(mesh.solute_mass(), 35.0 * 0.2, max_relative = 1e-12);
        assert_relative_eq!(mesh.advance(), 30.0);
        assert_eq!(mesh.nearest_node(44.0), 4);
        assert_eq!(mesh.nearest_node(-10.0), 0);
    }
}

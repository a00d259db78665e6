use crate::G;
use crate::infiltration::Infiltration;
use crate::node::{AREA, DISCHARGE, INFILTRATED, INFILTRATED_SOLUTE, Node, SOLUTE};

/**
Friction source of the momentum equation, point-implicit in the discharge.

`previous_area` and `previous_slope` are the area and friction slope before
the step. The implicit part solves `Q + k Q |Q| = Q*` with
`k = theta g dt A f` for the root of the sign of `Q*`.

With `implicit_surface` the surface step has already applied the whole
friction of the previous state inside its flux differences: the `theta`
share of it is handed back before the implicit solve, and the bed-slope term
is advanced with the area increment of the step. Otherwise the `(1 - theta)`
explicit share is applied here.
*/
pub fn friction(
    nodes: &mut [Node],
    previous_area: &[f64],
    previous_slope: &[f64],
    dt: f64,
    theta: f64,
    implicit_surface: bool,
) {
    let last = nodes.len() - 1;
    let slopes: Vec<f64> = (0..nodes.len())
        .map(|i| {
            if !implicit_surface || i == 0 || i == last {
                return 0.0;
            }
            (nodes[i + 1].zb - nodes[i - 1].zb) / (nodes[i + 1].x - nodes[i - 1].x)
        })
        .collect();

    for (i, node) in nodes.iter_mut().enumerate() {
        let a = node.state[AREA];
        let mut q = node.state[DISCHARGE];
        let explicit = G * dt * previous_area[i] * previous_slope[i];
        if implicit_surface {
            q += theta * explicit;
            q -= G * theta * dt * (a - previous_area[i]) * slopes[i];
        } else {
            q -= (1.0 - theta) * explicit;
        }
        let k = theta * G * dt * a * node.hyd.f;
        if k > 0.0 {
            q = if q > 0.0 {
                ((1.0 + 4.0 * k * q).sqrt() - 1.0) / (2.0 * k)
            } else {
                (1.0 - (1.0 - 4.0 * k * q).sqrt()) / (2.0 * k)
            };
        }
        node.state[DISCHARGE] = q;
    }
}

/**
Moves water and solute from the channel into the soil.

The infiltration velocity is the mean of the law over the step; the wetted
perimeter turns it into an area rate. A node never loses more water than it
holds, and solute leaves at the node's concentration.
*/
pub fn infiltration(nodes: &mut [Node], law: &Infiltration, dt: f64) {
    if dt <= 0.0 {
        return;
    }
    for node in nodes.iter_mut().filter(|n| n.is_wet()) {
        node.hyd.i = law.rate(node.state[INFILTRATED], dt);
        node.hyd.pi = node.hyd.p * node.hyd.i;
        let a = node.state[AREA];
        let pidt = (node.hyd.pi * dt).min(a);
        if pidt.is_nan() || pidt <= 0.0 {
            continue;
        }
        let solute = (node.state[SOLUTE].max(0.0) * pidt / a).min(node.state[SOLUTE].max(0.0));
        node.state[AREA] -= pidt;
        node.state[INFILTRATED] += pidt;
        node.state[SOLUTE] -= solute;
        node.state[INFILTRATED_SOLUTE] += solute;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::Mesh;
    use crate::test_support::rectangular_channel;
    use approx::assert_relative_eq;

    #[test]
    fn friction_brakes_without_reversing() {
        let channel = rectangular_channel(100.0, 1.0, 0.0);
        let mut mesh = Mesh::open(&channel, 3).unwrap();
        for (node, q) in mesh.nodes.iter_mut().zip([0.5, -0.5, 0.0]) {
            node.state[AREA] = 0.2;
            node.state[DISCHARGE] = q;
            node.hyd.f = 10.0;
        }
        let previous = [0.2; 3];
        friction(&mut mesh.nodes, &previous, &[0.0; 3], 1.0, 1.0, false);
        let k = G * 0.2 * 10.0;
        let expected = ((1.0 + 4.0 * k * 0.5f64).sqrt() - 1.0) / (2.0 * k);
        assert_relative_eq!(mesh.nodes[0].discharge(), expected, max_relative = 1e-12);
        assert_relative_eq!(mesh.nodes[1].discharge(), -expected, max_relative = 1e-12);
        assert_eq!(mesh.nodes[2].discharge(), 0.0);
        // The solved discharge satisfies Q + k Q² = Q*
        let q = mesh.nodes[0].discharge();
        assert_relative_eq!(q + k * q * q, 0.5, max_relative = 1e-12);
    }

    #[test]
    fn uniform_flow_keeps_its_discharge_after_an_implicit_surface_step() {
        let channel = rectangular_channel(100.0, 1.0, 0.0);
        let mut mesh = Mesh::open(&channel, 3).unwrap();
        for node in &mut mesh.nodes {
            node.state[AREA] = 0.2;
            node.state[DISCHARGE] = 0.3;
            node.hyd.f = 0.05;
        }
        let slope = 0.05 * 0.3 * 0.3;
        friction(&mut mesh.nodes, &[0.2; 3], &[slope; 3], 2.0, 0.7, true);
        for node in &mesh.nodes {
            assert_relative_eq!(node.discharge(), 0.3, max_relative = 1e-12);
        }
    }

    #[test]
    fn infiltration_conserves_water_and_solute() {
        let channel = rectangular_channel(100.0, 1.0, 0.0);
        let mut mesh = Mesh::open(&channel, 3).unwrap();
        for (node, area) in mesh.nodes.iter_mut().zip([0.1, 1e-3, 0.0]) {
            node.state[AREA] = area;
            node.state[SOLUTE] = 3.0 * area;
            node.update_geometry();
        }
        let law = Infiltration::KostiakovLewis {
            a: 0.0,
            b: 0.0,
            c: 1e-4,
            l: 1.0,
        };
        let (water, solute) = (mesh.water_mass(), mesh.solute_mass());
        infiltration(&mut mesh.nodes, &law, 10.0);
        assert_relative_eq!(mesh.water_mass(), water, max_relative = 1e-12);
        assert_relative_eq!(mesh.solute_mass(), solute, max_relative = 1e-12);
        // P = 1 + 2 h on the unit-width channel
        let infiltrated = 1e-3 * (1.0 + 2.0 * 0.1);
        assert_relative_eq!(mesh.nodes[0].state[INFILTRATED], infiltrated, max_relative = 1e-12);
        let left = 3.0 * (0.1 - infiltrated);
        assert_relative_eq!(mesh.nodes[0].state[SOLUTE], left, max_relative = 1e-12);
        // Never more than the water available
        assert_eq!(mesh.nodes[1].state[AREA], 0.0);
        assert_relative_eq!(mesh.nodes[1].state[INFILTRATED_SOLUTE], 3e-3, max_relative = 1e-12);
        assert_eq!(mesh.nodes[2].state[INFILTRATED], 0.0);
    }

    #[test]
    fn newly_wetted_soil_keeps_most_of_the_water() {
        let channel = rectangular_channel(100.0, 1.0, 0.0);
        let mut mesh = Mesh::open(&channel, 3).unwrap();
        for node in &mut mesh.nodes {
            node.state[AREA] = 0.1;
            node.update_geometry();
        }
        let law = Infiltration::KostiakovLewis {
            a: 0.004,
            b: 0.5,
            c: 0.0,
            l: 1.0,
        };
        infiltration(&mut mesh.nodes, &law, 2.27);
        for node in &mesh.nodes {
            assert!(node.hyd.i.is_finite());
            // a sqrt(dt) over the wetted perimeter
            let expected = 1.2 * 0.004 * 2.27_f64.sqrt();
            assert_relative_eq!(node.state[INFILTRATED], expected, max_relative = 1e-12);
            assert!(node.state[AREA] > 0.09);
        }
    }
}

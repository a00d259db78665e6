use crate::node::{AREA, Node, SOLUTE};
use nalgebra::DVector;
use serde::{Deserialize, Serialize};

// Dispersion schemes of the solute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffusionScheme {
    Explicit,
    Implicit,
}

impl DiffusionScheme {
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(DiffusionScheme::Explicit),
            2 => Some(DiffusionScheme::Implicit),
            _ => None,
        }
    }

    pub fn code(&self) -> u32 {
        match self {
            DiffusionScheme::Explicit => 1,
            DiffusionScheme::Implicit => 2,
        }
    }
}

fn concentration(node: &Node) -> f64 {
    let a = node.state[AREA];
    if a > 0.0 { node.state[SOLUTE] / a } else { 0.0 }
}

// Kx A of the interface between two nodes; no exchange with a dry side
fn conductance(left: &Node, right: &Node) -> f64 {
    left.hyd.kxa.min(right.hyd.kxa).max(0.0)
}

/**
Thomas algorithm for a tridiagonal system.

`lower[0]` and `upper[n - 1]` are ignored. Returns `None` when a pivot
vanishes.
*/
pub fn solve_tridiagonal(
    lower: &DVector<f64>,
    diagonal: &DVector<f64>,
    upper: &DVector<f64>,
    rhs: &DVector<f64>,
) -> Option<DVector<f64>> {
    let n = diagonal.len();
    let mut c = DVector::zeros(n);
    let mut d = DVector::zeros(n);
    let mut pivot = diagonal[0];
    if pivot == 0.0 {
        return None;
    }
    c[0] = upper[0] / pivot;
    d[0] = rhs[0] / pivot;
    for i in 1..n {
        pivot = diagonal[i] - lower[i] * c[i - 1];
        if pivot == 0.0 {
            return None;
        }
        c[i] = if i + 1 < n { upper[i] / pivot } else { 0.0 };
        d[i] = (rhs[i] - lower[i] * d[i - 1]) / pivot;
    }
    let mut x = d;
    for i in (0..n - 1).rev() {
        x[i] -= c[i] * x[i + 1];
    }
    Some(x)
}

// Explicit dispersion flux between neighbours
pub fn explicit(nodes: &mut [Node], dt: f64) {
    let exchange: Vec<f64> = nodes
        .windows(2)
        .map(|pair| {
            let k = conductance(&pair[0], &pair[1]);
            dt * k * (concentration(&pair[1]) - concentration(&pair[0])) / pair[0].ix
        })
        .collect();
    for (i, dd) in exchange.iter().enumerate() {
        let (dx1, dx2) = (nodes[i].dx, nodes[i + 1].dx);
        nodes[i].state[SOLUTE] += dd / dx1;
        nodes[i + 1].state[SOLUTE] -= dd / dx2;
    }
}

/**
Backward-Euler dispersion of the concentration.

Solves `A dx s' - dt sum k (s'_nb - s') / ix = As dx` for the new
concentrations and stores `A s'` back. Dry nodes keep their solute.
Returns `false` if the system could not be solved, leaving the nodes as they
were.
*/
pub fn implicit(nodes: &mut [Node], dt: f64) -> bool {
    let n = nodes.len();
    let mut lower = DVector::zeros(n);
    let mut diagonal = DVector::zeros(n);
    let mut upper = DVector::zeros(n);
    let mut rhs = DVector::zeros(n);
    for i in 0..n {
        let node = &nodes[i];
        let west = if i > 0 {
            dt * conductance(&nodes[i - 1], node) / nodes[i - 1].ix
        } else {
            0.0
        };
        let east = if i + 1 < n {
            dt * conductance(node, &nodes[i + 1]) / node.ix
        } else {
            0.0
        };
        let storage = node.state[AREA].max(0.0) * node.dx;
        if storage + west + east == 0.0 {
            diagonal[i] = 1.0;
            rhs[i] = concentration(node);
            continue;
        }
        lower[i] = -west;
        upper[i] = -east;
        diagonal[i] = storage + west + east;
        rhs[i] = node.state[SOLUTE] * node.dx;
    }
    let Some(s) = solve_tridiagonal(&lower, &diagonal, &upper, &rhs) else {
        return false;
    };
    for (node, si) in nodes.iter_mut().zip(s.iter()) {
        if node.state[AREA] > 0.0 {
            node.state[SOLUTE] = node.state[AREA] * si;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::Mesh;
    use crate::test_support::rectangular_channel;
    use approx::assert_relative_eq;

    fn plume() -> Mesh {
        let channel = rectangular_channel(40.0, 1.0, 0.0);
        let mut mesh = Mesh::open(&channel, 5).unwrap();
        for node in &mut mesh.nodes {
            node.state[AREA] = 0.1;
            node.hyd.kxa = 0.1 * 0.5;
        }
        mesh.nodes[2].state[SOLUTE] = 0.1 * 4.0;
        mesh
    }

    #[test]
    fn thomas_solves_a_small_system() {
        let lower = DVector::from_vec(vec![0.0, -1.0, -1.0]);
        let diagonal = DVector::from_vec(vec![2.0, 2.0, 2.0]);
        let upper = DVector::from_vec(vec![-1.0, -1.0, 0.0]);
        let rhs = DVector::from_vec(vec![1.0, 0.0, 1.0]);
        let x = solve_tridiagonal(&lower, &diagonal, &upper, &rhs).unwrap();
        for xi in x.iter() {
            assert_relative_eq!(*xi, 1.0, epsilon = 1e-12);
        }
        let singular = DVector::from_vec(vec![0.0, 2.0, 2.0]);
        assert!(solve_tridiagonal(&lower, &singular, &upper, &rhs).is_none());
    }

    #[test]
    fn explicit_dispersion_spreads_and_conserves() {
        let mut mesh = plume();
        let total = mesh.solute_mass();
        explicit(&mut mesh.nodes, 10.0);
        assert_relative_eq!(mesh.solute_mass(), total, max_relative = 1e-12);
        assert!(mesh.nodes[2].state[SOLUTE] < 0.4);
        assert!(mesh.nodes[1].state[SOLUTE] > 0.0);
        assert_relative_eq!(mesh.nodes[1].state[SOLUTE], mesh.nodes[3].state[SOLUTE]);
    }

    #[test]
    fn implicit_dispersion_spreads_and_conserves() {
        let mut mesh = plume();
        let total = mesh.solute_mass();
        assert!(implicit(&mut mesh.nodes, 1000.0));
        assert_relative_eq!(mesh.solute_mass(), total, max_relative = 1e-9);
        let peak = mesh.nodes[2].state[SOLUTE];
        assert!(mesh.nodes.iter().all(|n| n.state[SOLUTE] >= 0.0 && n.state[SOLUTE] <= peak));
    }

    #[test]
    fn dry_nodes_do_not_disperse() {
        let mut mesh = plume();
        mesh.nodes[3].state[AREA] = 0.0;
        mesh.nodes[3].hyd.kxa = 0.0;
        assert!(implicit(&mut mesh.nodes, 100.0));
        assert_eq!(mesh.nodes[3].state[SOLUTE], 0.0);
        assert_eq!(mesh.nodes[4].state[SOLUTE], 0.0);
    }
}

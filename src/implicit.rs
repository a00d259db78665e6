use crate::channel::OutletType;
use crate::diffusion::solve_tridiagonal;
use crate::explicit::{self, ExplicitScheme};
use crate::flow_model::{Family, FlowModel, Physics, parameters, surface_diffusivity};
use crate::node::{AREA, DISCHARGE, Node, SOLUTE};
use log::trace;
use nalgebra::{DVector, Matrix2, Matrix3, Vector2, Vector3};

// Outer iterations of the linearised solve
const TWO_WAVE_ITERATIONS: usize = 2;
const SINGLE_WAVE_ITERATIONS: usize = 1;

// Singular blocks contribute nothing instead of propagating NaN
fn invert3(m: &Matrix3<f64>) -> Matrix3<f64> {
    m.try_inverse().unwrap_or_else(Matrix3::zeros)
}

fn invert2(m: &Matrix2<f64>) -> Matrix2<f64> {
    m.try_inverse().unwrap_or_else(Matrix2::zeros)
}

/**
Positive and negative parts of the flux Jacobian of a two-wave node.

Built from the eigen-decomposition with eigenvalues `l1`, `l2` for the water
and the velocity for the solute. Thin and degenerate nodes get zero blocks.
*/
pub fn split_jacobians(node: &Node, minimum_depth: f64) -> (Matrix3<f64>, Matrix3<f64>) {
    let hyd = &node.hyd;
    let c2 = hyd.l1 - hyd.l2;
    if hyd.h <= minimum_depth || c2 <= 0.0 {
        return (Matrix3::zeros(), Matrix3::zeros());
    }
    let part = |sign: fn(f64) -> f64| {
        let (p1, p2, p3) = (sign(hyd.l1), sign(hyd.l2), sign(hyd.u));
        let m00 = (hyd.l1 * p2 - hyd.l2 * p1) / c2;
        let m01 = (p1 - p2) / c2;
        let m11 = (hyd.l1 * p1 - hyd.l2 * p2) / c2;
        Matrix3::new(
            m00,
            m01,
            0.0,
            -hyd.l1 * hyd.l2 * m01,
            m11,
            0.0,
            (m00 - p3) * hyd.s,
            m01 * hyd.s,
            p3,
        )
    };
    (part(|l: f64| l.max(0.0)), part(|l: f64| l.min(0.0)))
}

// Jacobian of (Q, Q s) with respect to (A, A s) for a single-wave node
pub fn single_wave_jacobian(node: &Node, minimum_depth: f64) -> Matrix2<f64> {
    let hyd = &node.hyd;
    if hyd.h <= minimum_depth || node.state[DISCHARGE] == 0.0 {
        return Matrix2::zeros();
    }
    let l = hyd.l1.max(0.0);
    let u = hyd.u.max(0.0);
    Matrix2::new(l, 0.0, (l - u) * hyd.s, u)
}

fn vector3(values: [f64; 3]) -> Vector3<f64> {
    Vector3::from(values)
}

/**
Linearised implicit step of a two-wave model.

The flux differences of the previous state, friction included, are split
by the upwind scheme, then the increments are found with two block sweeps:
left-going waves from the outlet towards the inlet and right-going waves from
the inlet towards the outlet. What a sweep carries out through a closed end
is swept back into the reach so the step conserves mass. The Jacobians are
refreshed between outer iterations. Returns the water and solute carried
out through an open outlet by the implicit part of the step.
*/
pub fn two_wave(
    flow: &dyn FlowModel,
    nodes: &mut [Node],
    physics: &Physics,
    dt: f64,
    theta: f64,
    inflow: [f64; 2],
) -> [f64; 2] {
    let n = nodes.len();
    let theta_dt = theta * dt;
    let mut outflow = [0.0; 2];
    let previous: Vec<Vector3<f64>> = nodes
        .iter()
        .map(|node| Vector3::new(node.state[AREA], node.state[DISCHARGE], node.state[SOLUTE]))
        .collect();
    let inlet = Vector3::new(
        inflow[0] - dt * nodes[0].state[DISCHARGE],
        0.0,
        inflow[1] - dt * nodes[0].hyd.solute_flux,
    );
    let faces = explicit::resisted_interfaces(flow, nodes, physics.minimum_depth);
    let dfl: Vec<Vector3<f64>> = faces.iter().map(|f| vector3(f.dfl)).collect();
    let dfr: Vec<Vector3<f64>> = faces.iter().map(|f| vector3(f.dfr)).collect();
    let identity = Matrix3::<f64>::identity();

    for iteration in 0..TWO_WAVE_ITERATIONS {
        let (jp, jn): (Vec<Matrix3<f64>>, Vec<Matrix3<f64>>) = nodes
            .iter()
            .map(|node| split_jacobians(node, physics.minimum_depth))
            .unzip();

        // Left-going waves, anchored at the outlet
        let mut minus = vec![Vector3::zeros(); n];
        for i in (0..n - 1).rev() {
            let a = identity * nodes[i].dx - jn[i] * theta_dt;
            let d = -(jn[i + 1] * minus[i + 1]) * theta_dt - dfr[i] * dt;
            minus[i] = invert3(&a) * d;
        }
        let inlet_leak = -(jn[0] * minus[0]) * theta_dt;

        // Right-going waves, anchored at the inlet
        let mut plus = vec![Vector3::zeros(); n];
        for i in 0..n {
            let a = identity * nodes[i].dx + jp[i] * theta_dt;
            let d = if i == 0 {
                inlet + inlet_leak
            } else {
                jp[i - 1] * plus[i - 1] * theta_dt - dfl[i - 1] * dt
            };
            plus[i] = invert3(&a) * d;
        }
        let outlet_leak = jp[n - 1] * plus[n - 1] * theta_dt;

        let mut reflected = vec![Vector3::zeros(); n];
        if physics.outlet == OutletType::Open {
            outflow = [outlet_leak[0], outlet_leak[2]];
        } else {
            for i in (0..n).rev() {
                let a = identity * nodes[i].dx - jn[i] * theta_dt;
                let d = if i == n - 1 {
                    outlet_leak
                } else {
                    -(jn[i + 1] * reflected[i + 1]) * theta_dt
                };
                reflected[i] = invert3(&a) * d;
            }
            let leak = -(jn[0] * reflected[0]) * theta_dt;
            reflected[0] += leak / nodes[0].dx;
        }

        for (i, node) in nodes.iter_mut().enumerate() {
            let u = previous[i] + minus[i] + plus[i] + reflected[i];
            node.state[AREA] = u[0];
            node.state[DISCHARGE] = u[1];
            node.state[SOLUTE] = u[2];
        }
        parameters(flow, nodes, physics);
        trace!("implicit iteration {iteration}: outlet leak {:e}", outlet_leak[0]);
    }
    outflow
}

// Implicit smoothing of the area increments with the diffusive-wave diffusivity
fn smooth_increments(nodes: &[Node], delta: &mut [Vector2<f64>], theta_dt: f64) {
    let n = nodes.len();
    let conductances: Vec<f64> = nodes
        .windows(2)
        .map(|pair| {
            let d = surface_diffusivity(&pair[0]).min(surface_diffusivity(&pair[1]));
            theta_dt * d / pair[0].ix
        })
        .collect();
    let mut lower = DVector::zeros(n);
    let mut diagonal = DVector::zeros(n);
    let mut upper = DVector::zeros(n);
    let mut rhs = DVector::zeros(n);
    for i in 0..n {
        let west = if i > 0 { conductances[i - 1] } else { 0.0 };
        let east = if i + 1 < n { conductances[i] } else { 0.0 };
        lower[i] = -west;
        upper[i] = -east;
        diagonal[i] = nodes[i].dx + west + east;
        rhs[i] = nodes[i].dx * delta[i][0];
    }
    if let Some(smoothed) = solve_tridiagonal(&lower, &diagonal, &upper, &rhs) {
        for (d, s) in delta.iter_mut().zip(smoothed.iter()) {
            d[0] = *s;
        }
    }
}

// Level at which two neighbours hold their joint volume
fn common_level(left: &Node, right: &Node) -> f64 {
    let volume = left.dx * left.state[AREA] + right.dx * right.state[AREA];
    let (mut low, mut high) = (left.hyd.zs, right.hyd.zs);
    for _ in 0..100 {
        let mid = 0.5 * (low + high);
        if left.dx * left.area_at_level(mid) + right.dx * right.area_at_level(mid) > volume {
            high = mid;
        } else {
            low = mid;
        }
        if high - low <= f64::EPSILON * high.abs().max(1.0) {
            break;
        }
    }
    0.5 * (low + high)
}

/**
Levels out every surface that rises downstream.

Water of the higher node is moved upstream until both nodes share a level;
its solute goes with it at the donor concentration. Returns whether any node
changed.
*/
pub fn stabilize(nodes: &mut [Node]) -> bool {
    let mut changed = false;
    for i in 1..nodes.len() {
        let (head, tail) = nodes.split_at_mut(i);
        let (left, right) = (&mut head[i - 1], &mut tail[0]);
        if !right.is_wet() || right.hyd.zs <= left.hyd.zs {
            continue;
        }
        let level = common_level(left, right);
        let a = right.state[AREA];
        let moved = (right.dx * (a - right.area_at_level(level))).clamp(0.0, right.dx * a);
        if moved == 0.0 {
            continue;
        }
        let solute = moved * right.state[SOLUTE] / a;
        right.state[AREA] -= moved / right.dx;
        right.state[SOLUTE] -= solute / right.dx;
        left.state[AREA] += moved / left.dx;
        left.state[SOLUTE] += solute / left.dx;
        left.update_geometry();
        right.update_geometry();
        changed = true;
    }
    changed
}

/**
Linearised implicit step of a single-wave model.

All waves travel downstream, so one forward block sweep over (A, A s)
suffices. The discharge is a diagnostic recomputed by the parameter pass.
Diffusive waves also smooth the area increments and level out any surface
rising downstream. Returns the open-outlet outflow of the implicit part.
*/
pub fn single_wave(
    flow: &dyn FlowModel,
    nodes: &mut [Node],
    physics: &Physics,
    dt: f64,
    theta: f64,
    inflow: [f64; 2],
) -> [f64; 2] {
    let n = nodes.len();
    let theta_dt = theta * dt;
    let mut outflow = [0.0; 2];
    let previous: Vec<Vector2<f64>> = nodes
        .iter()
        .map(|node| Vector2::new(node.state[AREA], node.state[SOLUTE]))
        .collect();
    let inlet = Vector2::new(
        inflow[0] - dt * nodes[0].state[DISCHARGE],
        inflow[1] - dt * nodes[0].hyd.solute_flux,
    );
    let faces = explicit::interfaces(flow, ExplicitScheme::Upwind, nodes, physics.minimum_depth);
    let identity = Matrix2::<f64>::identity();

    for _ in 0..SINGLE_WAVE_ITERATIONS {
        let jp: Vec<Matrix2<f64>> = nodes
            .iter()
            .map(|node| single_wave_jacobian(node, physics.minimum_depth))
            .collect();
        let mut delta = vec![Vector2::zeros(); n];
        for i in 0..n {
            let mut d = if i == 0 {
                inlet
            } else {
                let face = &faces[i - 1];
                jp[i - 1] * delta[i - 1] * theta_dt - Vector2::new(face.dfl[0], face.dfl[2]) * dt
            };
            if i + 1 < n {
                d -= Vector2::new(faces[i].dfr[0], faces[i].dfr[2]) * dt;
            }
            let a = identity * nodes[i].dx + jp[i] * theta_dt;
            delta[i] = invert2(&a) * d;
        }
        let leak = jp[n - 1] * delta[n - 1] * theta_dt;
        if physics.outlet == OutletType::Closed {
            delta[n - 1] += leak / nodes[n - 1].dx;
        } else {
            outflow = [leak[0], leak[1]];
        }
        if flow.follows_surface() {
            smooth_increments(nodes, &mut delta, theta_dt);
        }

        for (i, node) in nodes.iter_mut().enumerate() {
            node.state[AREA] = previous[i][0] + delta[i][0];
            node.state[SOLUTE] = previous[i][1] + delta[i][1];
        }
        parameters(flow, nodes, physics);
        if flow.follows_surface() && stabilize(nodes) {
            parameters(flow, nodes, physics);
        }
    }
    outflow
}

// Implicit surface-flow step of any model
pub fn surface_flow(
    flow: &dyn FlowModel,
    nodes: &mut [Node],
    physics: &Physics,
    dt: f64,
    theta: f64,
    inflow: [f64; 2],
) -> [f64; 2] {
    match flow.family() {
        Family::TwoWave => two_wave(flow, nodes, physics, dt, theta, inflow),
        Family::SingleWave => single_wave(flow, nodes, physics, dt, theta, inflow),
    }
}

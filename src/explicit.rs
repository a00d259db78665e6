use crate::G;
use crate::flow_model::{Family, FlowModel};
use crate::node::{AREA, DISCHARGE, Node, SOLUTE};

// Flux split of one interface between its two cells
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Interface {
    pub dfl: [f64; 3],       // Part applied to the right cell
    pub dfr: [f64; 3],       // Part applied to the left cell
    pub speeds: [f64; 3],    // Roe wave speeds, the third carries the solute
    pub strengths: [f64; 3], // Wave strengths in flux units
    pub s: f64,              // Roe concentration
    pub active: bool,        // Both cells deeper than the minimum depth
}

// Explicit surface-flow schemes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExplicitScheme {
    Upwind,
    LaxFriedrichs,
    Tvd,
}

/**
Superbee limiter of a wave.

`dw1` is the strength of the same wave at the upwind interface and `dw2` its
local strength. Opposite signs switch the second order correction off.
*/
pub fn limiter(dw1: f64, dw2: f64) -> f64 {
    if dw1 * dw2 <= 0.0 {
        return 0.0;
    }
    let r = dw1 / dw2;
    (2.0 * r).min(1.0).max(r.min(2.0))
}

fn thin(node: &Node, minimum_depth: f64) -> bool {
    node.hyd.h <= minimum_depth
}

fn wave_speed(node: &Node) -> f64 {
    node.hyd.l1.abs().max(node.hyd.l2.abs()).max(node.hyd.u.abs())
}

fn difference(left: &Node, right: &Node) -> [f64; 3] {
    [
        right.state[AREA] - left.state[AREA],
        right.state[DISCHARGE] - left.state[DISCHARGE],
        right.state[SOLUTE] - left.state[SOLUTE],
    ]
}

// Roe decomposition of a two-wave interface with the entropy fix
fn roe_two_wave(flow: &dyn FlowModel, left: &Node, right: &Node, df: [f64; 3]) -> Interface {
    let mut face = Interface::default();
    let (a1, a2) = (left.state[AREA].max(0.0), right.state[AREA].max(0.0));
    let b = left.hyd.b + right.hyd.b;
    if b <= 0.0 || a1 + a2 <= 0.0 {
        return face;
    }
    let dh = right.hyd.h - left.hyd.h;
    let trapezoid = a1 + a2 - 0.5 * (left.z + right.z) * dh * dh / 3.0;
    let c = if trapezoid > 0.0 {
        (G * trapezoid / b).sqrt()
    } else {
        (G * (a1 + a2) / b).sqrt()
    };
    let (sa1, sa2) = (a1.sqrt(), a2.sqrt());
    let (w1, w2) = (sa1 / (sa1 + sa2), sa2 / (sa1 + sa2));
    let u = w1 * left.hyd.u + w2 * right.hyd.u;
    let s = w1 * left.hyd.s + w2 * right.hyd.s;
    let ua = flow.roe_velocity(u);
    let (l1, l2) = (ua + c, ua - c);

    let strengths = [
        (df[1] - l2 * df[0]) / (2.0 * c),
        (l1 * df[0] - df[1]) / (2.0 * c),
        df[2] - s * df[0],
    ];
    let waves = [
        [strengths[0], l1 * strengths[0], s * strengths[0]],
        [strengths[1], l2 * strengths[1], s * strengths[1]],
        [0.0, 0.0, strengths[2]],
    ];
    let speeds = [l1, l2, u];
    for (wave, speed) in waves.iter().zip(speeds) {
        let side = if speed >= 0.0 { &mut face.dfl } else { &mut face.dfr };
        for j in 0..3 {
            side[j] += wave[j];
        }
    }

    // Transonic rarefaction
    let fix = if left.hyd.l2 < 0.0 && right.hyd.l2 > 0.0 {
        0.25 * (right.hyd.l2 - left.hyd.l2 - 2.0 * l2.abs())
    } else if left.hyd.l1 < 0.0 && right.hyd.l1 > 0.0 {
        0.25 * (right.hyd.l1 - left.hyd.l1 - 2.0 * l1.abs())
    } else {
        0.0
    };
    if fix > 0.0 {
        let du = difference(left, right);
        for j in 0..3 {
            face.dfl[j] += fix * du[j];
            face.dfr[j] -= fix * du[j];
        }
    }

    face.speeds = speeds;
    face.strengths = strengths;
    face.s = s;
    face
}

// Single-wave interface: every difference travels with the kinematic celerity
fn upwind_single_wave(left: &Node, right: &Node, df: [f64; 3]) -> Interface {
    let mut face = Interface::default();
    let celerity = 0.5 * (left.hyd.l1 + right.hyd.l1);
    if celerity >= 0.0 {
        face.dfl = [df[0], 0.0, df[2]];
    } else {
        face.dfr = [df[0], 0.0, df[2]];
    }
    face
}

fn lax_friedrichs(family: Family, left: &Node, right: &Node, df: [f64; 3]) -> Interface {
    let mut face = Interface::default();
    let k = 0.5 * wave_speed(left).max(wave_speed(right));
    let mut du = difference(left, right);
    let mut df = df;
    if family == Family::SingleWave {
        du[1] = 0.0;
        df[1] = 0.0;
    }
    for j in 0..3 {
        face.dfl[j] = 0.5 * df[j] + k * du[j];
        face.dfr[j] = 0.5 * df[j] - k * du[j];
    }
    face
}

// A cell without water cannot lose any through this interface
fn keep_positive(face: &mut Interface, left: &Node, right: &Node, minimum_depth: f64) {
    if thin(right, minimum_depth) && face.dfl[0] > 0.0 {
        for j in [0, 2] {
            face.dfr[j] += face.dfl[j];
            face.dfl[j] = 0.0;
        }
    }
    if thin(left, minimum_depth) && face.dfr[0] > 0.0 {
        for j in [0, 2] {
            face.dfl[j] += face.dfr[j];
            face.dfr[j] = 0.0;
        }
    }
}

// Solute crosses with the concentration of the cell the water leaves
fn donor_solute(face: &mut Interface, left: &Node, right: &Node) {
    let discharge = left.state[DISCHARGE] + face.dfr[0];
    let s = if discharge >= 0.0 { left.hyd.s } else { right.hyd.s };
    let solute_flux = discharge * s;
    face.dfr[2] = solute_flux - left.hyd.solute_flux;
    face.dfl[2] = right.hyd.solute_flux - solute_flux;
}

fn split_interfaces(
    flow: &dyn FlowModel,
    scheme: ExplicitScheme,
    nodes: &[Node],
    minimum_depth: f64,
    differences: impl Fn(&Node, &Node) -> [f64; 3],
) -> Vec<Interface> {
    nodes
        .windows(2)
        .map(|pair| {
            let (left, right) = (&pair[0], &pair[1]);
            if thin(left, minimum_depth) && thin(right, minimum_depth) {
                return Interface::default();
            }
            let df = differences(left, right);
            let mut face = match (scheme, flow.family()) {
                (ExplicitScheme::LaxFriedrichs, family) => lax_friedrichs(family, left, right, df),
                (_, Family::TwoWave) => roe_two_wave(flow, left, right, df),
                (_, Family::SingleWave) => upwind_single_wave(left, right, df),
            };
            keep_positive(&mut face, left, right, minimum_depth);
            if scheme != ExplicitScheme::LaxFriedrichs && flow.family() == Family::TwoWave {
                donor_solute(&mut face, left, right);
            }
            face.active = !thin(left, minimum_depth) && !thin(right, minimum_depth);
            face
        })
        .collect()
}

// First order flux split of every interface, computed from the current state
pub fn interfaces(
    flow: &dyn FlowModel,
    scheme: ExplicitScheme,
    nodes: &[Node],
    minimum_depth: f64,
) -> Vec<Interface> {
    split_interfaces(flow, scheme, nodes, minimum_depth, |left, right| {
        flow.flows(left, right)
    })
}

/**
Upwind split of the flux differences with the friction of both cells added
to the momentum, so that uniform flow splits into nothing.
*/
pub fn resisted_interfaces(
    flow: &dyn FlowModel,
    nodes: &[Node],
    minimum_depth: f64,
) -> Vec<Interface> {
    split_interfaces(flow, ExplicitScheme::Upwind, nodes, minimum_depth, |left, right| {
        let mut df = flow.flows(left, right);
        let resistance = left.state[AREA] * left.hyd.sf + right.state[AREA] * right.hyd.sf;
        df[1] += 0.5 * G * left.ix * resistance;
        df
    })
}

// Adds the split fluxes of every interface to its two cells
pub fn update(nodes: &mut [Node], faces: &[Interface], dt: f64) {
    for (i, face) in faces.iter().enumerate() {
        let (dx1, dx2) = (nodes[i].dx, nodes[i + 1].dx);
        for j in 0..3 {
            nodes[i].state[j] -= dt * face.dfr[j] / dx1;
            nodes[i + 1].state[j] -= dt * face.dfl[j] / dx2;
        }
    }
}

/**
Second order wave-propagation correction for two-wave models.

Each wave of an active interface is limited against the same wave at the
interface it comes from and the resulting flux is exchanged between the two
cells of the interface, so the correction conserves mass and solute.
*/
pub fn tvd_correction(nodes: &mut [Node], faces: &[Interface], dt: f64) {
    let corrections: Vec<[f64; 3]> = faces
        .iter()
        .enumerate()
        .map(|(j, face)| {
            let mut flux = [0.0; 3];
            if !face.active {
                return flux;
            }
            for k in 0..3 {
                let speed = face.speeds[k];
                if speed == 0.0 || face.strengths[k] == 0.0 {
                    continue;
                }
                let upwind = if speed > 0.0 {
                    j.checked_sub(1)
                } else {
                    Some(j + 1).filter(|&u| u < faces.len())
                };
                let Some(upwind) = upwind else { continue };
                if !faces[upwind].active {
                    continue;
                }
                let phi = limiter(faces[upwind].strengths[k], face.strengths[k]);
                let courant = (1.0 - speed.abs() * dt / nodes[j].ix).max(0.0);
                let amount = 0.5 * speed.signum() * courant * phi * face.strengths[k];
                let direction = if k < 2 {
                    [1.0, speed, face.s]
                } else {
                    [0.0, 0.0, 1.0]
                };
                for m in 0..3 {
                    flux[m] += amount * direction[m];
                }
            }
            flux
        })
        .collect();

    for (j, flux) in corrections.iter().enumerate() {
        let (dx1, dx2) = (nodes[j].dx, nodes[j + 1].dx);
        for m in 0..3 {
            nodes[j].state[m] -= dt * flux[m] / dx1;
            nodes[j + 1].state[m] += dt * flux[m] / dx2;
        }
    }
}

/**
One explicit surface-flow step.

`inflow` holds the water volume and solute mass entering through the inlet
during the step. The boundary flux of the first node is replaced by it, so
the reach gains exactly the inlet volume minus what crosses the outlet.
*/
pub fn surface_flow(
    flow: &dyn FlowModel,
    scheme: ExplicitScheme,
    nodes: &mut [Node],
    dt: f64,
    minimum_depth: f64,
    inflow: [f64; 2],
) {
    let water = inflow[0] - dt * nodes[0].state[DISCHARGE];
    let solute = inflow[1] - dt * nodes[0].hyd.solute_flux;

    let faces = interfaces(flow, scheme, nodes, minimum_depth);
    update(nodes, &faces, dt);
    if scheme == ExplicitScheme::Tvd {
        tvd_correction(nodes, &faces, dt);
    }

    let inlet = &mut nodes[0];
    inlet.state[AREA] += water / inlet.dx;
    inlet.state[SOLUTE] += solute / inlet.dx;
}

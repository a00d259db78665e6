use crate::G;
use crate::channel::{InletType, OutletType};
use crate::dispersion::Dispersion;
use crate::friction::{Friction, friction_slope, normal_discharge};
use crate::infiltration::Infiltration;
use crate::node::{AREA, DISCHARGE, Node, SOLUTE};
use serde::{Deserialize, Serialize};

// Physical model selected for a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelType {
    Hydrodynamic,
    ZeroAdvection,
    ZeroInertia,
    Kinematic,
}

impl ModelType {
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(ModelType::Hydrodynamic),
            2 => Some(ModelType::ZeroAdvection),
            3 => Some(ModelType::ZeroInertia),
            4 => Some(ModelType::Kinematic),
            _ => None,
        }
    }

    pub fn code(&self) -> u32 {
        match self {
            ModelType::Hydrodynamic => 1,
            ModelType::ZeroAdvection => 2,
            ModelType::ZeroInertia => 3,
            ModelType::Kinematic => 4,
        }
    }

    pub fn build(&self) -> Box<dyn FlowModel> {
        match self {
            ModelType::Hydrodynamic => Box::new(Hydrodynamic),
            ModelType::ZeroAdvection => Box::new(ZeroAdvection),
            ModelType::ZeroInertia => Box::new(ZeroInertia),
            ModelType::Kinematic => Box::new(Kinematic),
        }
    }
}

/// Number of characteristic families carried by a model.
///
/// Two-wave models evolve the discharge with a momentum equation. Single-wave
/// models compute it from a normal-flow relation, so it is never negative and
/// every wave travels downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
    TwoWave,
    SingleWave,
}

// Sub-models and limits shared by every node update
#[derive(Debug, Clone, Copy)]
pub struct Physics {
    pub friction: Friction,
    pub infiltration: Infiltration,
    pub dispersion: Dispersion,
    pub inlet: InletType,
    pub outlet: OutletType,
    pub minimum_depth: f64,
}

pub trait FlowModel: std::fmt::Debug {
    fn name(&self) -> &'static str;

    fn family(&self) -> Family;

    // Derived quantities of node `index`; geometry of all nodes is current
    fn node_parameters(&self, nodes: &mut [Node], index: usize, physics: &Physics);

    // Inverse of the largest stable time step of a node
    fn inv_dt(&self, node: &Node) -> f64;

    // Flux differences (mass, momentum, solute) from `left` to `right`
    fn flows(&self, left: &Node, right: &Node) -> [f64; 3];

    // Largest time step that keeps the inlet discharge `q` resolved
    fn inlet_dtmax(&self, node: &Node, q: f64, tolerance: f64) -> f64;

    // Advective velocity of the Roe linearisation
    fn roe_velocity(&self, u: f64) -> f64 {
        u
    }

    // Discharge driven by the free-surface slope
    fn follows_surface(&self) -> bool {
        false
    }
}

// Refreshes every node: geometry first, then model quantities left to right
pub fn parameters(flow: &dyn FlowModel, nodes: &mut [Node], physics: &Physics) {
    for node in nodes.iter_mut() {
        node.update_geometry();
    }
    for index in 0..nodes.len() {
        flow.node_parameters(nodes, index, physics);
    }
}

// Critical velocity of the inlet section carrying `q` at critical depth
fn inlet_critical_state(node: &Node, q: f64, tolerance: f64) -> Option<(f64, f64)> {
    let h = node.critical_depth(q, tolerance);
    let a = node.area_for_depth(h);
    let b = node.width_for_depth(h);
    if a <= 0.0 || b <= 0.0 {
        return None;
    }
    Some(((G * a / b).sqrt(), q / a))
}

fn dry(node: &mut Node) {
    node.state[DISCHARGE] = 0.0;
    let hyd = &mut node.hyd;
    hyd.s = 0.0;
    hyd.u = 0.0;
    hyd.f = 0.0;
    hyd.sf = 0.0;
    hyd.flux = 0.0;
    hyd.solute_flux = 0.0;
    hyd.kx = 0.0;
    hyd.kxa = 0.0;
    hyd.beta = 1.0;
    hyd.l1 = 0.0;
    hyd.l2 = 0.0;
    hyd.i = 0.0;
    hyd.pi = 0.0;
}

// Wet but shallower than the minimum depth: solute kept, flow stopped
fn thin_film(node: &mut Node) {
    let s = node.state[SOLUTE] / node.state[AREA];
    dry(node);
    node.hyd.s = s;
}

fn boundary_discharge(node: &mut Node, index: usize, last: usize, physics: &Physics) {
    if index == 0 && physics.inlet == InletType::Subcritical {
        node.subcritical_discharge();
    }
    if index == last {
        match physics.outlet {
            OutletType::Closed => node.close_outlet(),
            OutletType::Open => node.open_outlet(),
        }
    }
}

// Hydrostatic pressure force of a trapezoidal section over g
fn pressure(node: &Node) -> f64 {
    let h = node.hyd.h;
    h * h * (0.5 * node.b0 + node.z * h / 3.0)
}

fn two_wave_flows(left: &Node, right: &Node) -> [f64; 3] {
    let dh = right.hyd.h - left.hyd.h;
    // Mean area that balances the pressure jump of a still trapezoid
    let am = 0.5 * (left.state[AREA] + right.state[AREA]) - (left.z + right.z) * dh * dh / 12.0;
    [
        right.state[DISCHARGE] - left.state[DISCHARGE],
        right.hyd.flux - left.hyd.flux + G * am * (right.zb - left.zb),
        right.hyd.solute_flux - left.hyd.solute_flux,
    ]
}

fn single_wave_flows(left: &Node, right: &Node) -> [f64; 3] {
    [
        right.state[DISCHARGE] - left.state[DISCHARGE],
        0.0,
        right.hyd.solute_flux - left.hyd.solute_flux,
    ]
}

// Discharge-dependent quantities shared by the two-wave models
fn two_wave_parameters(
    nodes: &mut [Node],
    index: usize,
    physics: &Physics,
    with_advection: bool,
) {
    let last = nodes.len() - 1;
    let node = &mut nodes[index];
    boundary_discharge(node, index, last, physics);
    if !node.is_wet() {
        dry(node);
        return;
    }
    if node.hyd.h < physics.minimum_depth {
        thin_film(node);
        node.hyd.l1 = node.hyd.c;
        node.hyd.l2 = -node.hyd.c;
        return;
    }

    let a = node.state[AREA];
    let q = node.state[DISCHARGE];
    let terms = physics
        .friction
        .terms(a, node.hyd.h, node.hyd.p, node.b0, node.z);
    let gp = G * pressure(node);
    let hyd = &mut node.hyd;
    hyd.s = node.state[SOLUTE] / a;
    hyd.u = q / a;
    hyd.f = terms.f;
    hyd.sf = friction_slope(terms.f, q);
    hyd.solute_flux = q * hyd.s;
    hyd.kx = physics.dispersion.coefficient(hyd.p, a, hyd.sf);
    hyd.kxa = hyd.kx * a;
    if with_advection {
        hyd.beta = terms.beta;
        let beta_u = hyd.beta * hyd.u;
        hyd.flux = a * beta_u * hyd.u + gp;
        let cm = (hyd.c * hyd.c + (hyd.beta - 1.0) * beta_u * hyd.u).max(0.0).sqrt();
        hyd.l1 = beta_u + cm;
        hyd.l2 = beta_u - cm;
    } else {
        hyd.beta = 1.0;
        hyd.flux = gp;
        hyd.l1 = hyd.c;
        hyd.l2 = -hyd.c;
    }
}

// Normal-flow discharge driven by the slope of `level` between neighbours
fn single_wave_parameters(
    nodes: &mut [Node],
    index: usize,
    physics: &Physics,
    level: fn(&Node) -> f64,
) {
    let last = nodes.len() - 1;
    let slope = if index == 0 {
        (level(&nodes[0]) - level(&nodes[1])) / nodes[0].ix
    } else if index == last {
        (level(&nodes[last - 1]) - level(&nodes[last])) / nodes[last - 1].ix
    } else {
        (level(&nodes[index - 1]) - level(&nodes[index + 1]))
            / (nodes[index - 1].ix + nodes[index].ix)
    };

    let node = &mut nodes[index];
    if !node.is_wet() {
        dry(node);
        return;
    }
    if node.hyd.h < physics.minimum_depth {
        thin_film(node);
        return;
    }

    let a = node.state[AREA];
    let terms = physics
        .friction
        .terms(a, node.hyd.h, node.hyd.p, node.b0, node.z);
    node.state[DISCHARGE] = normal_discharge(terms.f, slope);
    if index == last {
        match physics.outlet {
            OutletType::Closed => node.close_outlet(),
            OutletType::Open => node.open_outlet(),
        }
    }
    let q = node.state[DISCHARGE];
    let hyd = &mut node.hyd;
    hyd.s = node.state[SOLUTE] / a;
    hyd.u = q / a;
    hyd.beta = 1.0;
    hyd.f = terms.f;
    hyd.sf = friction_slope(terms.f, q);
    hyd.flux = 0.0;
    hyd.solute_flux = q * hyd.s;
    hyd.kx = physics.dispersion.coefficient(hyd.p, a, hyd.sf);
    hyd.kxa = hyd.kx * a;
    // dQ/dA of the Manning normal-flow relation
    hyd.l1 = if hyd.b > 0.0 && hyd.p > 0.0 {
        q * (5.0 / (3.0 * a) - 4.0 * (1.0 + node.z * node.z).sqrt() / (3.0 * hyd.b * hyd.p))
    } else {
        0.0
    };
    hyd.l2 = hyd.u;
}

// Full Saint-Venant equations
#[derive(Debug, Clone, Copy)]
pub struct Hydrodynamic;

// Momentum equation without the advective term
#[derive(Debug, Clone, Copy)]
pub struct ZeroAdvection;

// Diffusive wave: discharge from the free-surface slope
#[derive(Debug, Clone, Copy)]
pub struct ZeroInertia;

// Kinematic wave: discharge from the bed slope
#[derive(Debug, Clone, Copy)]
pub struct Kinematic;

impl FlowModel for Hydrodynamic {
    fn name(&self) -> &'static str {
        "hydrodynamic"
    }

    fn family(&self) -> Family {
        Family::TwoWave
    }

    fn node_parameters(&self, nodes: &mut [Node], index: usize, physics: &Physics) {
        two_wave_parameters(nodes, index, physics, true);
    }

    fn inv_dt(&self, node: &Node) -> f64 {
        let hyd = &node.hyd;
        (hyd.c + hyd.u.abs()).max(hyd.l1.abs()).max(hyd.l2.abs()) / node.dx
    }

    fn flows(&self, left: &Node, right: &Node) -> [f64; 3] {
        two_wave_flows(left, right)
    }

    fn inlet_dtmax(&self, node: &Node, q: f64, tolerance: f64) -> f64 {
        match inlet_critical_state(node, q, tolerance) {
            Some((c, u)) => node.ix / (c + u.abs()),
            None => f64::INFINITY,
        }
    }
}

impl FlowModel for ZeroAdvection {
    fn name(&self) -> &'static str {
        "zero-advection"
    }

    fn family(&self) -> Family {
        Family::TwoWave
    }

    fn node_parameters(&self, nodes: &mut [Node], index: usize, physics: &Physics) {
        two_wave_parameters(nodes, index, physics, false);
    }

    fn inv_dt(&self, node: &Node) -> f64 {
        node.hyd.c.max(node.hyd.u.abs()) / node.dx
    }

    fn flows(&self, left: &Node, right: &Node) -> [f64; 3] {
        two_wave_flows(left, right)
    }

    fn inlet_dtmax(&self, node: &Node, q: f64, tolerance: f64) -> f64 {
        match inlet_critical_state(node, q, tolerance) {
            Some((c, _)) => node.ix / c,
            None => f64::INFINITY,
        }
    }

    fn roe_velocity(&self, _u: f64) -> f64 {
        0.0
    }
}

impl FlowModel for ZeroInertia {
    fn name(&self) -> &'static str {
        "zero-inertia"
    }

    fn family(&self) -> Family {
        Family::SingleWave
    }

    fn node_parameters(&self, nodes: &mut [Node], index: usize, physics: &Physics) {
        single_wave_parameters(nodes, index, physics, |n| n.hyd.zs);
    }

    fn inv_dt(&self, node: &Node) -> f64 {
        (node.hyd.l1.abs() + 2.0 * surface_diffusivity(node) / node.dx) / node.dx
    }

    fn flows(&self, left: &Node, right: &Node) -> [f64; 3] {
        single_wave_flows(left, right)
    }

    fn inlet_dtmax(&self, node: &Node, q: f64, tolerance: f64) -> f64 {
        match inlet_critical_state(node, q, tolerance) {
            Some((c, _)) => node.ix / c,
            None => f64::INFINITY,
        }
    }

    fn follows_surface(&self) -> bool {
        true
    }
}

impl FlowModel for Kinematic {
    fn name(&self) -> &'static str {
        "kinematic"
    }

    fn family(&self) -> Family {
        Family::SingleWave
    }

    fn node_parameters(&self, nodes: &mut [Node], index: usize, physics: &Physics) {
        single_wave_parameters(nodes, index, physics, |n| n.zb);
    }

    fn inv_dt(&self, node: &Node) -> f64 {
        node.hyd.l1.abs() / node.dx
    }

    fn flows(&self, left: &Node, right: &Node) -> [f64; 3] {
        single_wave_flows(left, right)
    }

    fn inlet_dtmax(&self, node: &Node, q: f64, tolerance: f64) -> f64 {
        match inlet_critical_state(node, q, tolerance) {
            Some((c, _)) => node.ix / c,
            None => f64::INFINITY,
        }
    }
}

// Diffusivity 1 / (2 f Q B) of a diffusive wave, zero where it is undefined
pub fn surface_diffusivity(node: &Node) -> f64 {
    let q = node.state[DISCHARGE];
    let d = 2.0 * node.hyd.f * q * node.hyd.b;
    if d > 0.0 { 1.0 / d } else { 0.0 }
}

// Diffusion-number bound of an explicit dispersion step
pub fn diffusion_inv_dt(node: &Node) -> f64 {
    (2.0 * node.hyd.kx + node.hyd.u.abs() * node.dx) / (node.dx * node.dx)
}

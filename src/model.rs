use crate::channel::Channel;
use crate::diffusion::{self, DiffusionScheme};
use crate::error::{FlowError, Result};
use crate::explicit::{self, ExplicitScheme};
use crate::flow_model::{Family, FlowModel, ModelType, Physics, diffusion_inv_dt, parameters};
use crate::implicit;
use crate::mesh::{InitialConditions, Mesh};
use crate::node::{AREA, DISCHARGE, Node, SOLUTE};
use crate::source;
use log::{debug, info, trace, warn};
use serde::{Deserialize, Serialize};

// Numerical scheme of the surface flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SurfaceScheme {
    Upwind,
    LaxFriedrichs,
    Implicit,
    Tvd,
}

impl SurfaceScheme {
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(SurfaceScheme::Upwind),
            2 => Some(SurfaceScheme::LaxFriedrichs),
            3 => Some(SurfaceScheme::Implicit),
            4 => Some(SurfaceScheme::Tvd),
            _ => None,
        }
    }

    pub fn code(&self) -> u32 {
        match self {
            SurfaceScheme::Upwind => 1,
            SurfaceScheme::LaxFriedrichs => 2,
            SurfaceScheme::Implicit => 3,
            SurfaceScheme::Tvd => 4,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SurfaceScheme::Upwind => "upwind",
            SurfaceScheme::LaxFriedrichs => "Lax-Friedrichs",
            SurfaceScheme::Implicit => "implicit",
            SurfaceScheme::Tvd => "TVD",
        }
    }

    fn explicit(&self) -> Option<ExplicitScheme> {
        match self {
            SurfaceScheme::Upwind => Some(ExplicitScheme::Upwind),
            SurfaceScheme::LaxFriedrichs => Some(ExplicitScheme::LaxFriedrichs),
            SurfaceScheme::Tvd => Some(ExplicitScheme::Tvd),
            SurfaceScheme::Implicit => None,
        }
    }
}

fn default_theta() -> f64 {
    1.0
}

fn default_tolerance() -> f64 {
    0.001
}

// Numeric controls of a run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RunSettings {
    pub t_final: f64,       // Final time [s]
    pub interval: f64,      // Probe output interval [s], 0 for the final time only
    pub cfl: f64,           // Courant number [-]
    pub minimum_depth: f64, // Depth below which the flow is stopped [m]
    #[serde(default = "default_theta")]
    pub theta: f64, // Implicit weighting [-]
    #[serde(default = "default_tolerance")]
    pub critical_depth_tolerance: f64, // [m]
}

impl RunSettings {
    pub fn validate(&self) -> Result<()> {
        let context = "run settings";
        let values = [
            self.t_final,
            self.interval,
            self.cfl,
            self.minimum_depth,
            self.theta,
            self.critical_depth_tolerance,
        ];
        if values.iter().any(|v| !v.is_finite()) {
            return Err(FlowError::invalid(context, "non-finite value"));
        }
        if self.t_final < 0.0 || self.interval < 0.0 {
            return Err(FlowError::invalid(context, "times must not be negative"));
        }
        if self.cfl <= 0.0 {
            return Err(FlowError::invalid(context, "the CFL number must be positive"));
        }
        if self.minimum_depth < 0.0 {
            return Err(FlowError::invalid(context, "negative minimum depth"));
        }
        if self.theta <= 0.0 || self.theta > 1.0 {
            return Err(FlowError::invalid(context, "theta must be in (0, 1]"));
        }
        if self.critical_depth_tolerance <= 0.0 {
            return Err(FlowError::invalid(
                context,
                "the critical depth tolerance must be positive",
            ));
        }
        Ok(())
    }
}

// Callbacks of the time loop
pub trait Observer {
    // After every step
    fn step(&mut self, _model: &Model) -> Result<()> {
        Ok(())
    }

    // At the start, at every output interval crossed and at the final time
    fn interval(&mut self, _model: &Model) -> Result<()> {
        Ok(())
    }
}

impl Observer for () {}

// Mass bookkeeping of a finished run
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RunSummary {
    pub steps: usize,
    pub time: f64,
    pub initial_water: f64,    // [m³]
    pub final_water: f64,      // Surface plus infiltrated [m³]
    pub infiltrated_water: f64, // [m³]
    pub inflow_water: f64,     // [m³]
    pub outflow_water: f64,    // [m³]
    pub initial_solute: f64,   // [kg]
    pub final_solute: f64,     // [kg]
    pub inflow_solute: f64,    // [kg]
    pub outflow_solute: f64,   // [kg]
}

impl RunSummary {
    pub fn water_balance_error(&self) -> f64 {
        self.final_water - self.initial_water - self.inflow_water + self.outflow_water
    }

    pub fn solute_balance_error(&self) -> f64 {
        self.final_solute - self.initial_solute - self.inflow_solute + self.outflow_solute
    }
}

/**
Fills a negative solute mass at node `i` from its neighbours.

The neighbour holding more solute gives first, and no neighbour gives more
than it holds. The node ends at zero; returns the mass nobody could cover.
*/
fn borrow_solute(nodes: &mut [Node], i: usize) -> f64 {
    let mut deficit = -nodes[i].state[SOLUTE] * nodes[i].dx;
    nodes[i].state[SOLUTE] = 0.0;
    let mut neighbours: Vec<usize> = [i.checked_sub(1), Some(i + 1)]
        .into_iter()
        .flatten()
        .filter(|&j| j < nodes.len())
        .collect();
    let held = |node: &Node| (node.state[SOLUTE] * node.dx).max(0.0);
    neighbours.sort_by(|&a, &b| held(&nodes[b]).total_cmp(&held(&nodes[a])));
    for j in neighbours {
        let available = held(&nodes[j]);
        let taken = deficit.min(available);
        if taken <= 0.0 {
            continue;
        }
        nodes[j].state[SOLUTE] = (available - taken) / nodes[j].dx;
        deficit -= taken;
    }
    deficit
}

/**
Furrow model: a channel, its mesh and the strategies bound to it.

# Arguments
* `t`, `t2` - Current time and end of the step in progress [s]
* `dt` - Last time step [s]
* `inflow`, `outflow` - Water volume and solute mass that crossed the inlet and
  the outlet since the start
*/
#[derive(Debug)]
pub struct Model {
    pub channel: Channel,
    pub mesh: Mesh,
    pub probes: Vec<f64>,
    pub settings: RunSettings,
    pub model_type: ModelType,
    pub scheme: SurfaceScheme,
    pub diffusion: DiffusionScheme,
    pub t: f64,
    pub t2: f64,
    pub dt: f64,
    pub steps: usize,
    pub inflow: [f64; 2],
    pub outflow: [f64; 2],
    flow: Box<dyn FlowModel>,
    physics: Physics,
    overflow_reported: bool,
}

impl Model {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        channel: Channel,
        nodes: usize,
        initial: &InitialConditions,
        probes: Vec<f64>,
        settings: RunSettings,
        model_type: ModelType,
        scheme: SurfaceScheme,
        diffusion: DiffusionScheme,
    ) -> Result<Self> {
        settings.validate()?;
        let flow = model_type.build();
        if scheme == SurfaceScheme::Tvd && flow.family() != Family::TwoWave {
            return Err(FlowError::UnsupportedScheme {
                model: flow.name(),
                scheme: scheme.name(),
            });
        }
        if probes.iter().any(|x| !x.is_finite()) {
            return Err(FlowError::invalid("probes", "non-finite station"));
        }
        let mut mesh = Mesh::open(&channel, nodes)?;
        mesh.apply_initial_conditions(initial)?;
        let physics = Physics {
            friction: channel.friction,
            infiltration: channel.infiltration,
            dispersion: channel.dispersion,
            inlet: channel.inlet,
            outlet: channel.outlet,
            minimum_depth: settings.minimum_depth,
        };
        parameters(flow.as_ref(), &mut mesh.nodes, &physics);
        info!(
            "{} model, {} scheme, {} nodes over {} m",
            flow.name(),
            scheme.name(),
            mesh.len(),
            channel.length()
        );
        Ok(Model {
            channel,
            mesh,
            probes,
            settings,
            model_type,
            scheme,
            diffusion,
            t: 0.0,
            t2: 0.0,
            dt: 0.0,
            steps: 0,
            inflow: [0.0; 2],
            outflow: [0.0; 2],
            flow,
            physics,
            overflow_reported: false,
        })
    }

    pub fn flow(&self) -> &dyn FlowModel {
        self.flow.as_ref()
    }

    pub fn nodes(&self) -> &[Node] {
        &self.mesh.nodes
    }

    // Largest step the inlet allows for the discharge about to enter
    fn inlet_dtmax(&self) -> f64 {
        let hydrogram = &self.channel.water_inlet;
        let next = hydrogram.next_time_after(self.t);
        let now = hydrogram.discharge_at(self.t);
        let q = next.map_or(now, |tn| now.max(hydrogram.discharge_at(tn)));
        if q > 0.0 {
            self.flow.inlet_dtmax(
                &self.mesh.nodes[0],
                q,
                self.settings.critical_depth_tolerance,
            )
        } else {
            next.map_or(f64::INFINITY, |tn| tn - self.t)
        }
    }

    /**
    Time step of the next integration step.

    The CFL bound of the fastest node, the inlet bound and the time left are
    combined. A reach without any wave returns the time left.
    */
    pub fn time_step(&self) -> f64 {
        let explicit_diffusion = self.diffusion == DiffusionScheme::Explicit;
        let inv = self.mesh.nodes.iter().fold(0.0_f64, |inv, node| {
            let mut inv = inv.max(self.flow.inv_dt(node));
            if explicit_diffusion {
                inv = inv.max(diffusion_inv_dt(node));
            }
            inv
        });
        let cfl_dt = if inv > 0.0 {
            self.settings.cfl / inv
        } else {
            f64::INFINITY
        };
        cfl_dt
            .min(self.inlet_dtmax())
            .min(self.settings.t_final - self.t)
    }

    // Clamps round-off negatives and stops on anything worse
    fn check(&mut self) -> Result<()> {
        let minimum_depth = self.settings.minimum_depth;
        for (i, node) in self.mesh.nodes.iter_mut().enumerate() {
            if node.state.iter().any(|v| !v.is_finite()) {
                return Err(FlowError::NumericalInstability {
                    time: self.t2,
                    node: i,
                    message: format!("non-finite state {:?}", node.state),
                });
            }
            let a = node.state[AREA];
            if a < 0.0 {
                if -a > node.area_for_depth(minimum_depth) {
                    return Err(FlowError::NumericalInstability {
                        time: self.t2,
                        node: i,
                        message: format!("negative area {a:e}"),
                    });
                }
                debug!("t={} node {i}: negative area {a:e} set to zero", self.t2);
                node.state[AREA] = 0.0;
                node.state[DISCHARGE] = 0.0;
                node.state[SOLUTE] = 0.0;
            }
        }
        for i in 0..self.mesh.len() {
            if self.mesh.nodes[i].state[SOLUTE] < 0.0 {
                let missing = borrow_solute(&mut self.mesh.nodes, i);
                if missing > 0.0 {
                    debug!("t={} node {i}: {missing:e} kg of negative solute dropped", self.t2);
                }
            }
        }
        Ok(())
    }

    // Advances the model by one time step
    pub fn step(&mut self) -> Result<()> {
        let dt = self.time_step();
        if !(dt.is_finite() && dt > 0.0) {
            return Err(FlowError::NumericalInstability {
                time: self.t,
                node: 0,
                message: format!("bad time step {dt:e}"),
            });
        }
        let remaining = self.settings.t_final - self.t;
        self.dt = dt;
        self.t2 = if dt >= remaining {
            self.settings.t_final
        } else {
            self.t + dt
        };
        let inflow = [
            self.channel.water_inlet.integrate(self.t, self.t2),
            self.channel.solute_inlet.integrate(self.t, self.t2),
        ];
        let (last_q, last_t) = {
            let last = &self.mesh.nodes[self.mesh.len() - 1];
            (last.state[DISCHARGE], last.hyd.solute_flux)
        };
        let previous_area: Vec<f64> = self.mesh.nodes.iter().map(|n| n.state[AREA]).collect();
        let previous_slope: Vec<f64> = self.mesh.nodes.iter().map(|n| n.hyd.sf).collect();
        let two_wave = self.flow.family() == Family::TwoWave;
        let nodes = &mut self.mesh.nodes;

        let mut outflow = [dt * last_q, dt * last_t];
        match self.scheme.explicit() {
            Some(scheme) => {
                explicit::surface_flow(
                    self.flow.as_ref(),
                    scheme,
                    nodes,
                    dt,
                    self.settings.minimum_depth,
                    inflow,
                );
                if two_wave {
                    source::friction(nodes, &previous_area, &previous_slope, dt, 1.0, false);
                }
            }
            None => {
                let theta = self.settings.theta;
                let leak = implicit::surface_flow(
                    self.flow.as_ref(),
                    nodes,
                    &self.physics,
                    dt,
                    theta,
                    inflow,
                );
                outflow[0] += leak[0];
                outflow[1] += leak[1];
                if two_wave {
                    source::friction(nodes, &previous_area, &previous_slope, dt, theta, true);
                }
            }
        }

        match self.diffusion {
            DiffusionScheme::Explicit => diffusion::explicit(nodes, dt),
            DiffusionScheme::Implicit => {
                if !diffusion::implicit(nodes, dt) {
                    return Err(FlowError::NumericalInstability {
                        time: self.t2,
                        node: 0,
                        message: "singular dispersion system".to_string(),
                    });
                }
            }
        }
        source::infiltration(nodes, &self.physics.infiltration, dt);
        self.check()?;
        parameters(self.flow.as_ref(), &mut self.mesh.nodes, &self.physics);

        if !self.overflow_reported {
            if let Some(node) = self.mesh.nodes.iter().find(|n| n.is_overflowing()) {
                warn!(
                    "water overflows the channel at x={} m, t={} s",
                    node.x, self.t2
                );
                self.overflow_reported = true;
            }
        }

        for j in 0..2 {
            self.inflow[j] += inflow[j];
            self.outflow[j] += outflow[j];
        }
        self.t = self.t2;
        self.steps += 1;
        trace!("step {}: t={} dt={}", self.steps, self.t, dt);
        Ok(())
    }

    /**
    Integrates up to the final time.

    The observer sees the model after every step and at every crossed output
    interval. Returns the mass bookkeeping of the run.
    */
    pub fn run(&mut self, observer: &mut dyn Observer) -> Result<RunSummary> {
        let initial_water = self.mesh.water_mass();
        let initial_solute = self.mesh.solute_mass();
        info!(
            "initial water {:e} m³, solute {:e} kg",
            initial_water, initial_solute
        );

        let interval = self.settings.interval;
        let mut next_output = if interval > 0.0 {
            self.t + interval
        } else {
            f64::INFINITY
        };
        observer.interval(self)?;
        while self.t < self.settings.t_final {
            self.step()?;
            observer.step(self)?;
            if self.t >= next_output || self.t >= self.settings.t_final {
                observer.interval(self)?;
                while next_output <= self.t {
                    next_output += interval;
                }
            }
            debug!("t={} s dt={} s advance={} m", self.t, self.dt, self.mesh.advance());
        }

        let summary = RunSummary {
            steps: self.steps,
            time: self.t,
            initial_water,
            final_water: self.mesh.water_mass(),
            infiltrated_water: self.mesh.infiltrated_mass(),
            inflow_water: self.inflow[0],
            outflow_water: self.outflow[0],
            initial_solute,
            final_solute: self.mesh.solute_mass(),
            inflow_solute: self.inflow[1],
            outflow_solute: self.outflow[1],
        };
        info!(
            "final water {:e} m³ (infiltrated {:e}), solute {:e} kg after {} steps",
            summary.final_water, summary.infiltrated_water, summary.final_solute, summary.steps
        );
        info!(
            "balance errors: water {:e} m³, solute {:e} kg",
            summary.water_balance_error(),
            summary.solute_balance_error()
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hydrogram::Hydrogram;
    use crate::mesh::ProfilePoint;
    use crate::test_support::rectangular_channel;
    use approx::assert_relative_eq;

    fn settings(t_final: f64) -> RunSettings {
        RunSettings {
            t_final,
            interval: 0.0,
            cfl: 0.9,
            minimum_depth: 1e-4,
            theta: 1.0,
            critical_depth_tolerance: 0.001,
        }
    }

    fn model(
        channel: Channel,
        initial: &InitialConditions,
        t_final: f64,
        model_type: ModelType,
        scheme: SurfaceScheme,
    ) -> Model {
        Model::new(
            channel,
            21,
            initial,
            vec![],
            settings(t_final),
            model_type,
            scheme,
            DiffusionScheme::Explicit,
        )
        .unwrap()
    }

    #[test]
    fn dry_channel_stays_dry() {
        let mut m = model(
            rectangular_channel(100.0, 1.0, 0.001),
            &InitialConditions::Dry,
            10.0,
            ModelType::Hydrodynamic,
            SurfaceScheme::Upwind,
        );
        m.step().unwrap();
        // Nothing moves, so the step spans the whole run
        assert_eq!(m.t, 10.0);
        for node in m.nodes() {
            assert_eq!(node.state, [0.0; 5]);
        }
    }

    #[test]
    fn tvd_needs_two_waves() {
        let err = Model::new(
            rectangular_channel(100.0, 1.0, 0.001),
            21,
            &InitialConditions::Dry,
            vec![],
            settings(10.0),
            ModelType::Kinematic,
            SurfaceScheme::Tvd,
            DiffusionScheme::Explicit,
        )
        .unwrap_err();
        assert!(matches!(err, FlowError::UnsupportedScheme { .. }));
    }

    #[test]
    fn rejects_bad_settings() {
        let mut bad = settings(10.0);
        bad.cfl = 0.0;
        assert!(bad.validate().is_err());
        let mut bad = settings(10.0);
        bad.theta = 1.5;
        assert!(bad.validate().is_err());
        assert!(settings(10.0).validate().is_ok());
    }

    #[test]
    fn steps_respect_the_cfl_bound() {
        let initial = InitialConditions::Profile(vec![ProfilePoint {
            x: 0.0,
            a: 0.2,
            q: 0.0,
            s: 0.0,
        }]);
        let m = model(
            rectangular_channel(100.0, 1.0, 0.0),
            &initial,
            100.0,
            ModelType::Hydrodynamic,
            SurfaceScheme::Upwind,
        );
        let c = (crate::G * 0.2).sqrt();
        // Boundary cells are half as wide
        assert_relative_eq!(m.time_step(), 0.9 * 2.5 / c, max_relative = 1e-12);
    }

    #[test]
    fn inlet_limits_the_first_steps() {
        let mut channel = rectangular_channel(100.0, 1.0, 0.001);
        channel.water_inlet = Hydrogram::constant(0.02);
        let m = model(
            channel,
            &InitialConditions::Dry,
            100.0,
            ModelType::Kinematic,
            SurfaceScheme::Upwind,
        );
        let node = &m.nodes()[0];
        let expected = m.flow().inlet_dtmax(node, 0.02, 0.001);
        assert_relative_eq!(m.time_step(), expected);
        assert!(expected < 100.0);
    }

    #[test]
    fn lake_at_rest_is_preserved() {
        let channel = rectangular_channel(100.0, 1.0, 0.002);
        let top = 0.2 + 100.0 * 0.002;
        let point = |x: f64, a: f64| ProfilePoint {
            x,
            a,
            q: 0.0,
            s: 0.0,
        };
        let initial = InitialConditions::Profile(vec![point(0.0, top - 0.2), point(100.0, top)]);
        for scheme in [SurfaceScheme::Upwind, SurfaceScheme::Tvd, SurfaceScheme::Implicit] {
            let mut m = model(channel.clone(), &initial, 20.0, ModelType::Hydrodynamic, scheme);
            m.run(&mut ()).unwrap();
            for node in m.nodes() {
                assert!((node.hyd.zs - top).abs() < 1e-9, "{scheme:?}: {}", node.hyd.zs);
                assert!(node.discharge().abs() < 1e-9);
            }
        }
    }

    #[test]
    fn run_lands_on_the_final_time() {
        let mut channel = rectangular_channel(100.0, 1.0, 0.001);
        channel.water_inlet = Hydrogram::constant(0.01);
        channel.solute_inlet = Hydrogram::constant(0.001);
        let mut m = model(
            channel,
            &InitialConditions::Dry,
            30.0,
            ModelType::Hydrodynamic,
            SurfaceScheme::Upwind,
        );
        let summary = m.run(&mut ()).unwrap();
        assert_eq!(summary.time, 30.0);
        assert!(summary.steps > 1);
        assert_relative_eq!(summary.inflow_water, 0.3, max_relative = 1e-12);
        assert_eq!(summary.outflow_water, 0.0);
        assert!((summary.final_water - 0.3).abs() < 0.01);
        assert!(m.mesh.advance() > 0.0);
    }

    fn salted_nodes(solute: [f64; 3]) -> Vec<Node> {
        let mut mesh = Mesh::open(&rectangular_channel(100.0, 1.0, 0.001), 3).unwrap();
        for (node, s) in mesh.nodes.iter_mut().zip(solute) {
            node.state[AREA] = 0.1;
            node.state[SOLUTE] = s;
        }
        mesh.nodes
    }

    #[test]
    fn negative_solute_is_borrowed_from_the_richer_neighbour() {
        let mut nodes = salted_nodes([0.5, -0.01, 0.2]);
        let mass = |nodes: &[Node]| nodes.iter().map(|n| n.dx * n.state[SOLUTE]).sum::<f64>();
        let before = mass(&nodes);
        let missing = borrow_solute(&mut nodes, 1);
        assert_eq!(missing, 0.0);
        assert_eq!(nodes[1].state[SOLUTE], 0.0);
        assert_eq!(nodes[2].state[SOLUTE], 0.2);
        assert!(nodes[0].state[SOLUTE] < 0.5);
        assert_relative_eq!(mass(&nodes), before, max_relative = 1e-12);
    }

    #[test]
    fn borrowing_stops_when_the_neighbours_run_dry() {
        let mut nodes = salted_nodes([0.001, -1.0, 0.0]);
        let expected = 1.0 * nodes[1].dx - 0.001 * nodes[0].dx;
        let missing = borrow_solute(&mut nodes, 1);
        assert_relative_eq!(missing, expected, max_relative = 1e-12);
        for node in &nodes {
            assert_eq!(node.state[SOLUTE], 0.0);
        }
    }

    struct Counter {
        steps: usize,
        intervals: Vec<f64>,
    }

    impl Observer for Counter {
        fn step(&mut self, _model: &Model) -> Result<()> {
            self.steps += 1;
            Ok(())
        }

        fn interval(&mut self, model: &Model) -> Result<()> {
            self.intervals.push(model.t);
            Ok(())
        }
    }

    #[test]
    fn observer_sees_every_interval() {
        let mut channel = rectangular_channel(100.0, 1.0, 0.001);
        channel.water_inlet = Hydrogram::constant(0.01);
        let mut m = model(
            channel,
            &InitialConditions::Dry,
            30.0,
            ModelType::Kinematic,
            SurfaceScheme::Upwind,
        );
        m.settings.interval = 10.0;
        let mut counter = Counter {
            steps: 0,
            intervals: vec![],
        };
        let summary = m.run(&mut counter).unwrap();
        assert_eq!(counter.steps, summary.steps);
        assert_eq!(counter.intervals[0], 0.0);
        assert_eq!(*counter.intervals.last().unwrap(), 30.0);
        assert!(counter.intervals.len() >= 4);
        for pair in counter.intervals.windows(2) {
            assert!(pair[1] > pair[0]);
        }
    }
}

use crate::channel::{InletType, OutletType};
use crate::config::{ChannelConfig, MeshConfig, ModelConfig, Strategies};
use crate::diffusion::DiffusionScheme;
use crate::dispersion::Dispersion;
use crate::error::{FlowError, Result};
use crate::flow_model::ModelType;
use crate::friction::Friction;
use crate::geometry::GeometryPoint;
use crate::infiltration::Infiltration;
use crate::mesh::{InitialConditions, ProfilePoint};
use crate::model::{RunSettings, SurfaceScheme};
use std::fs;
use std::path::Path;
use std::str::SplitWhitespace;

// Whitespace separated tokens consumed in order
struct Tokens<'a> {
    iter: SplitWhitespace<'a>,
}

impl<'a> Tokens<'a> {
    fn new(text: &'a str) -> Self {
        Tokens {
            iter: text.split_whitespace(),
        }
    }

    fn token(&mut self, context: &str) -> Result<&'a str> {
        self.iter
            .next()
            .ok_or_else(|| FlowError::parse(context, "unexpected end of file"))
    }

    fn real(&mut self, context: &str) -> Result<f64> {
        let token = self.token(context)?;
        token
            .parse()
            .map_err(|_| FlowError::parse(context, format!("bad real number '{token}'")))
    }

    fn integer(&mut self, context: &str) -> Result<i64> {
        let token = self.token(context)?;
        token
            .parse()
            .map_err(|_| FlowError::parse(context, format!("bad integer '{token}'")))
    }

    fn count(&mut self, context: &str) -> Result<usize> {
        let n = self.integer(context)?;
        usize::try_from(n).map_err(|_| FlowError::parse(context, format!("bad count {n}")))
    }

    fn pairs(&mut self, context: &str) -> Result<Vec<(f64, f64)>> {
        let n = self.count(context)?;
        (0..n)
            .map(|_| Ok((self.real(context)?, self.real(context)?)))
            .collect()
    }
}

fn friction(code: i64, tokens: &mut Tokens) -> Result<Friction> {
    let context = "friction";
    match code {
        1 => Ok(Friction::Manning {
            n: tokens.real(context)?,
        }),
        2 => Ok(Friction::ManningMinimalLosses {
            n: tokens.real(context)?,
        }),
        _ => Err(FlowError::parse(context, format!("bad model {code}"))),
    }
}

fn infiltration(code: i64, tokens: &mut Tokens) -> Result<Infiltration> {
    let context = "infiltration";
    match code {
        1 => Ok(Infiltration::KostiakovLewis {
            a: tokens.real(context)?,
            b: tokens.real(context)?,
            c: tokens.real(context)?,
            l: tokens.real(context)?,
        }),
        _ => Err(FlowError::parse(context, format!("bad model {code}"))),
    }
}

fn dispersion(code: i64, tokens: &mut Tokens) -> Result<Dispersion> {
    let context = "diffusion";
    match code {
        1 => Ok(Dispersion::Rutherford {
            k: tokens.real(context)?,
        }),
        _ => Err(FlowError::parse(context, format!("bad model {code}"))),
    }
}

fn initial_conditions(code: i64, tokens: &mut Tokens) -> Result<InitialConditions> {
    let context = "initial conditions";
    match code {
        1 => Ok(InitialConditions::Dry),
        2 => {
            let n = tokens.count(context)?;
            let profile = (0..n)
                .map(|_| {
                    Ok(ProfilePoint {
                        x: tokens.real(context)?,
                        a: tokens.real(context)?,
                        q: tokens.real(context)?,
                        s: tokens.real(context)?,
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(InitialConditions::Profile(profile))
        }
        _ => Err(FlowError::parse(context, format!("bad type {code}"))),
    }
}

/**
Reads a model written as whitespace separated tokens.

The order is: inlet, outlet, friction, infiltration and diffusion codes;
geometry points (count, then x, zb, B0, Z, zmax each); friction, infiltration
and diffusion coefficients; water and solute inlet hydrograms (count, then
time and flux pairs); mesh nodes and initial-condition type, followed by the
profile (count, then x, A, Q, s) for type 2; final time, output interval,
CFL number, minimum depth, surface-flow scheme, diffusion scheme and model
codes, and an optional implicit weighting.
*/
pub fn parse_model(text: &str) -> Result<ModelConfig> {
    let mut tokens = Tokens::new(text);
    let context = "channel";
    let inlet = InletType::from_code(tokens.integer(context)?)?;
    let outlet = OutletType::from_code(tokens.integer(context)?)?;
    let friction_code = tokens.integer(context)?;
    let infiltration_code = tokens.integer(context)?;
    let dispersion_code = tokens.integer(context)?;

    let n = tokens.count("geometry")?;
    let geometry = (0..n)
        .map(|_| {
            let context = "geometry";
            Ok(GeometryPoint {
                x: tokens.real(context)?,
                zb: tokens.real(context)?,
                b0: tokens.real(context)?,
                z: tokens.real(context)?,
                zmax: tokens.real(context)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let friction = friction(friction_code, &mut tokens)?;
    let infiltration = infiltration(infiltration_code, &mut tokens)?;
    let dispersion = dispersion(dispersion_code, &mut tokens)?;
    let water_inlet = tokens.pairs("water hydrogram")?;
    let solute_inlet = tokens.pairs("solute hydrogram")?;

    let context = "mesh";
    let nodes = tokens.count(context)?;
    let initial_type = tokens.integer(context)?;
    let initial = initial_conditions(initial_type, &mut tokens)?;

    let context = "model";
    let t_final = tokens.real(context)?;
    let interval = tokens.real(context)?;
    let cfl = tokens.real(context)?;
    let minimum_depth = tokens.real(context)?;
    let surface_code = tokens.integer(context)?;
    let diffusion_code = tokens.integer(context)?;
    let model_code = tokens.integer(context)?;
    let theta = match tokens.iter.next() {
        Some(token) => token
            .parse()
            .map_err(|_| FlowError::parse(context, format!("bad implicit weighting '{token}'")))?,
        None => 1.0,
    };
    if let Some(token) = tokens.iter.next() {
        return Err(FlowError::parse(context, format!("unexpected token '{token}'")));
    }

    let scheme = SurfaceScheme::from_code(surface_code).ok_or_else(|| {
        FlowError::parse(context, format!("bad surface flow scheme {surface_code}"))
    })?;
    let diffusion = DiffusionScheme::from_code(diffusion_code).ok_or_else(|| {
        FlowError::parse(context, format!("bad diffusion scheme {diffusion_code}"))
    })?;
    let model = ModelType::from_code(model_code)
        .ok_or_else(|| FlowError::parse(context, format!("bad model type {model_code}")))?;

    Ok(ModelConfig {
        channel: ChannelConfig {
            inlet,
            outlet,
            friction,
            infiltration,
            dispersion,
            geometry,
            water_inlet,
            solute_inlet,
        },
        mesh: MeshConfig { nodes, initial },
        run: RunSettings {
            t_final,
            interval,
            cfl,
            minimum_depth,
            theta,
            critical_depth_tolerance: 0.001,
        },
        strategies: Strategies {
            model,
            scheme,
            diffusion,
        },
        probes: Vec::new(),
    })
}

pub fn read_model_file(path: impl AsRef<Path>) -> Result<ModelConfig> {
    let text = fs::read_to_string(path)?;
    parse_model(&text)
}

// Probe stations: a count followed by that many stations
pub fn parse_probes(text: &str) -> Result<Vec<f64>> {
    let mut tokens = Tokens::new(text);
    let n = tokens.count("probes")?;
    (0..n).map(|_| tokens.real("probes")).collect()
}

pub fn read_probes_file(path: impl AsRef<Path>) -> Result<Vec<f64>> {
    let text = fs::read_to_string(path)?;
    parse_probes(&text)
}

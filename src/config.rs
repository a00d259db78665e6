use crate::channel::{Channel, InletType, OutletType};
use crate::diffusion::DiffusionScheme;
use crate::dispersion::Dispersion;
use crate::error::Result;
use crate::flow_model::ModelType;
use crate::friction::Friction;
use crate::geometry::{Geometry, GeometryPoint};
use crate::hydrogram::Hydrogram;
use crate::infiltration::Infiltration;
use crate::mesh::InitialConditions;
use crate::model::{Model, RunSettings, SurfaceScheme};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

// Channel section of a TOML model file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelConfig {
    pub inlet: InletType,
    pub outlet: OutletType,
    pub friction: Friction,
    pub infiltration: Infiltration,
    pub dispersion: Dispersion,
    pub geometry: Vec<GeometryPoint>,
    pub water_inlet: Vec<(f64, f64)>,  // (time [s], discharge [m³/s])
    #[serde(default)]
    pub solute_inlet: Vec<(f64, f64)>, // (time [s], solute flux [kg/s])
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeshConfig {
    pub nodes: usize,
    pub initial: InitialConditions,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Strategies {
    pub model: ModelType,
    pub scheme: SurfaceScheme,
    pub diffusion: DiffusionScheme,
}

/**
Complete description of a run, as read from a TOML file or a token file.

```toml
[channel]
inlet = "subcritical"
outlet = "closed"
friction = { law = "manning", n = 0.03 }
infiltration = { law = "kostiakov_lewis", a = 0.0, b = 0.0, c = 0.0, l = 1.0 }
dispersion = { law = "rutherford", k = 0.0 }
geometry = [
    { x = 0.0, zb = 0.2, b0 = 1.0, z = 0.0, zmax = 1.0 },
    { x = 200.0, zb = 0.0, b0 = 1.0, z = 0.0, zmax = 1.0 },
]
water_inlet = [[0.0, 0.01]]

[mesh]
nodes = 101
initial = { type = "dry" }

[run]
t_final = 100.0
interval = 10.0
cfl = 0.9
minimum_depth = 1e-4

[strategies]
model = "hydrodynamic"
scheme = "upwind"
diffusion = "explicit"
```
*/
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub channel: ChannelConfig,
    pub mesh: MeshConfig,
    pub run: RunSettings,
    pub strategies: Strategies,
    #[serde(default)]
    pub probes: Vec<f64>, // Stations [m]
}

fn hydrogram(points: &[(f64, f64)]) -> Result<Hydrogram> {
    if points.is_empty() {
        return Ok(Hydrogram::constant(0.0));
    }
    Hydrogram::new(points)
}

impl ModelConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    // Reads TOML for a `.toml` extension and the token format otherwise
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.extension().is_some_and(|e| e.eq_ignore_ascii_case("toml")) {
            Self::from_toml_file(path)
        } else {
            crate::input::read_model_file(path)
        }
    }

    pub fn channel(&self) -> Result<Channel> {
        let c = &self.channel;
        Channel::new(
            Geometry::new(c.geometry.clone())?,
            hydrogram(&c.water_inlet)?,
            hydrogram(&c.solute_inlet)?,
            c.inlet,
            c.outlet,
            c.friction,
            c.infiltration,
            c.dispersion,
        )
    }

    pub fn build(&self) -> Result<Model> {
        Model::new(
            self.channel()?,
            self.mesh.nodes,
            &self.mesh.initial,
            self.probes.clone(),
            self.run,
            self.strategies.model,
            self.strategies.scheme,
            self.strategies.diffusion,
        )
    }
}

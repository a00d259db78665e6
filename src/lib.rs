pub mod channel;
pub mod config;
pub mod diffusion;
pub mod dispersion;
pub mod error;
pub mod explicit;
pub mod flow_model;
pub mod friction;
pub mod geometry;
pub mod hydrogram;
pub mod implicit;
pub mod infiltration;
pub mod input;
pub mod mesh;
pub mod model;
pub mod node;
pub mod output;
pub mod source;

#[cfg(test)]
mod test_support;

pub use config::ModelConfig;
pub use error::{FlowError, Result};
pub use model::{Model, RunSettings, RunSummary};

// Gravitational acceleration [m/s²]
pub const G: f64 = 9.81;

use thiserror::Error;

// Errors raised while reading a model or advancing it in time
#[derive(Debug, Error)]
pub enum FlowError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    // Missing or malformed token in the model file
    #[error("{context}: {message}")]
    Parse { context: String, message: String },

    // Well-formed value outside its allowed range
    #[error("{context}: {message}")]
    Invalid { context: String, message: String },

    #[error("the {scheme} scheme is not available for the {model} model")]
    UnsupportedScheme {
        model: &'static str,
        scheme: &'static str,
    },

    #[error("numerical instability at t={time} in node {node}: {message}")]
    NumericalInstability {
        time: f64,
        node: usize,
        message: String,
    },
}

impl FlowError {
    pub(crate) fn parse(context: &str, message: impl Into<String>) -> Self {
        FlowError::Parse {
            context: context.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn invalid(context: &str, message: impl Into<String>) -> Self {
        FlowError::Invalid {
            context: context.to_string(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, FlowError>;

use std::path::PathBuf;

use compute::ComputeError;
use thiserror::Error;

/// Errors raised while configuring the engine or feeding it input.
///
/// Once a frame is running nothing fails: degraded cases are logged and
/// rendered around instead.
#[derive(Error, Debug)]
pub enum FusionError {
    #[error("invalid settings: {0}")]
    InvalidSettings(String),
    #[error("failed to read {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Compute(#[from] ComputeError),
}

pub type Result<T> = std::result::Result<T, FusionError>;

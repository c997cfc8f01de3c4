//! Simulation Errors

use std::path::PathBuf;
use thiserror::Error;

use loadout_core::{ConfigError, EngineError};

/// Errors that can stop the simulation from starting or saving its output.
#[derive(Debug, Error)]
pub enum SimError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

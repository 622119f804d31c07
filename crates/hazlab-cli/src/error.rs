//! Error types for the command-line front end.

use hazlab_data::HazardError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum CliError {
    /// Failed to read the configuration file.
    #[error("failed to read config {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid YAML for [`crate::Config`].
    #[error("invalid config {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// A required setting was given neither on the command line nor in config.
    #[error("missing setting: {0}")]
    MissingSetting(&'static str),

    /// Error from the hazard data layer.
    #[error(transparent)]
    Data(#[from] HazardError),

    /// Failed to render output.
    #[error("output error: {0}")]
    Output(#[from] serde_json::Error),
}

/// Result type for CLI operations.
pub type Result<T> = std::result::Result<T, CliError>;

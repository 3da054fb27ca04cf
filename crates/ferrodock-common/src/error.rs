use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FerrodockError {
    #[error("Missing dependency: {tool} ({reason})")]
    MissingDependency { tool: String, reason: String },

    #[error("Missing input: {0}")]
    MissingInput(PathBuf),

    #[error("Task id collision: '{id}' is produced by both {first:?} and {second:?}")]
    IdCollision {
        id: String,
        first: PathBuf,
        second: PathBuf,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("No compatible GPU device: {0}")]
    DeviceUnavailable(String),

    #[error("Conversion failed: {0}")]
    Conversion(String),

    #[error("Docking engine failed: {0}")]
    Engine(String),

    #[error("Pose split failed: {0}")]
    Split(String),

    #[error("{tool} timed out after {after:?}")]
    Timeout { tool: String, after: Duration },

    #[error("Scheduler error: {0}")]
    Scheduler(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl FerrodockError {
    /// Fatal errors abort the whole run before any task is dispatched.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            FerrodockError::MissingDependency { .. }
                | FerrodockError::MissingInput(_)
                | FerrodockError::IdCollision { .. }
                | FerrodockError::Config(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, FerrodockError>;

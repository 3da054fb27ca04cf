//! Shared types, configuration and errors used across all Ferrodock crates.

pub mod error;
pub mod task;
pub mod config;
pub mod geometry;
pub mod layout;

// Re-export commonly used types
pub use config::{CompletionRule, ConfigFile, EngineMode, PipelineConfig};
pub use error::{FerrodockError, Result};
pub use geometry::{BoxGeometry, BoxSizing, Extents};
pub use layout::RunLayout;
pub use task::{Task, TaskId, TaskSet, TaskState};

//! Error types for the stack crate

use crate::config::ConfigError;
use sih_graph::{BuildError, RenderError};

/// Result alias for stack operations
pub type StackResult<T> = Result<T, StackError>;

/// Anything that can stop a synthesis or render run
#[derive(Debug, thiserror::Error)]
pub enum StackError {
    /// Graph assembly failed
    #[error("assembly failed: {0}")]
    Build(#[from] BuildError),

    /// Condition evaluation failed
    #[error("render failed: {0}")]
    Render(#[from] RenderError),

    /// Configuration could not be loaded
    #[error(transparent)]
    Config(#[from] ConfigError),
}

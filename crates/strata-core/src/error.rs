//! Centralized error types for strata.

use thiserror::Error;

/// Main error type for strata operations.
#[derive(Error, Debug)]
pub enum StrataError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid label '{0}': labels must be plain identifiers")]
    InvalidLabel(String),

    #[error("Unknown job: {0}")]
    UnknownJob(String),

    #[error("Malformed job definition '{name}': {reason}")]
    MalformedJob { name: String, reason: String },

    #[error("Graph store error: {0}")]
    Graph(String),

    #[error("Cleanup did not converge for job '{job}' after {attempts} passes")]
    CleanupStalled { job: String, attempts: u32 },

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for strata operations.
pub type StrataResult<T> = Result<T, StrataError>;

impl StrataError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a graph store error.
    pub fn graph(msg: impl Into<String>) -> Self {
        Self::Graph(msg.into())
    }

    /// Create a provider error.
    pub fn provider(msg: impl Into<String>) -> Self {
        Self::Provider(msg.into())
    }
}

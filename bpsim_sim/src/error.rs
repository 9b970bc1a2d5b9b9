//! Error types for running a batch from the command line.

use std::path::PathBuf;

use bpsim_core::{ConfigError, GraphBuildError};
use thiserror::Error;

/// Errors that stop a run before any replication starts.
#[derive(Debug, Error)]
pub enum RunError {
    /// Input file could not be read
    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Model JSON could not be parsed, or the report could not be encoded
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Graph(#[from] GraphBuildError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl RunError {
    /// Creates an I/O error for `path`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

//! Loading models and configurations from JSON files.

use std::path::Path;

use bpsim_core::{BatchConfig, Definitions};

use crate::error::RunError;

/// Parses a process definitions tree.
pub fn parse_model(json: &str) -> Result<Definitions, RunError> {
    Ok(serde_json::from_str(json)?)
}

/// Reads a process definitions tree from `path`.
pub fn load_model(path: &Path) -> Result<Definitions, RunError> {
    let json = std::fs::read_to_string(path).map_err(|e| RunError::io(path, e))?;
    parse_model(&json)
}

/// Reads a batch configuration from `path`.
pub fn load_config(path: &Path) -> Result<BatchConfig, RunError> {
    let json = std::fs::read_to_string(path).map_err(|e| RunError::io(path, e))?;
    Ok(BatchConfig::from_json_str(&json)?)
}

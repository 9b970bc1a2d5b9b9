//! Error types raised before a batch starts.
//!
//! Once replications are running nothing is fatal: per-token problems are
//! logged as `token_error` rows and the token stops.

use thiserror::Error;

/// Errors raised while indexing a process definition.
#[derive(Debug, Error)]
pub enum GraphBuildError {
    /// The definitions contain no `bpmn:Process` root element
    #[error("No bpmn:Process found in definitions")]
    NoProcess,

    /// The process has no start event to seed arrivals from
    #[error("Process {process_id} has no start event")]
    NoStartEvent { process_id: String },
}

/// Errors raised while resolving a batch configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Neither the configuration nor the graph names a start event.
    ///
    /// Graphs from `ProcessGraph::build` always have one, so this only guards
    /// `resolve_start` against an empty start list.
    #[error("No start event found; set startEventId")]
    NoStartEvent,

    /// `startEventId` does not name an element of the graph
    #[error("Unknown start event: {0}")]
    UnknownStartEvent(String),

    /// Configuration JSON could not be parsed
    #[error("Configuration parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

impl ConfigError {
    /// Creates an unknown-start-event error.
    pub fn unknown_start(id: impl Into<String>) -> Self {
        Self::UnknownStartEvent(id.into())
    }
}

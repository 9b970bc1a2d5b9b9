//! bpsim Core
//! ==========
//!
//! Everything a replication needs that is not the event loop itself:
//!
//! - **Model**: the in-memory process definition tree ([`Definitions`]) and a
//!   fluent [`ProcessBuilder`] for assembling one in code
//! - **Graph**: the immutable [`ProcessGraph`] index built once per batch
//! - **Distributions**: the [`Distribution`] sampler feeding durations,
//!   timer delays and inter-arrival gaps
//! - **Config**: [`BatchConfig`], the knobs of a batch run
//! - **Rows**: the flat output records the engine emits
//! - **Heatmap**: visit/traversal counts derived from event rows

pub mod config;
pub mod distribution;
pub mod error;
pub mod graph;
pub mod heatmap;
pub mod model;
pub mod rows;

pub use config::{BatchConfig, XorPolicy};
pub use distribution::Distribution;
pub use error::{ConfigError, GraphBuildError};
pub use graph::{Element, ElementIdx, ElementKind, FlowIdx, ProcessGraph, SequenceFlow, Triggers};
pub use heatmap::{intensity_bin, HeatmapCounts};
pub use model::{Definitions, EventDefinition, FlowElement, ProcessBuilder, RootElement};
pub use rows::{
    BatchResult, CaseRow, EventKind, EventRow, PathRow, ProofRow, SpanOutcome, SummaryRow,
    TaskSpanRow,
};

//! bpsim Batch Simulator
//!
//! Replays a process model as stochastic token traffic and reports what
//! happened: an event log, per-replication summaries, gateway path
//! frequencies, case cycle times, task spans and a WIP/throughput trace.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                      BatchRunner                         │
//! │   seed_r = seed + r * 1009          (r = 1..=N, rayon)   │
//! │        │                 │                 │             │
//! │  ┌─────▼──────┐    ┌─────▼──────┐    ┌─────▼──────┐      │
//! │  │Replication │    │Replication │    │Replication │ ...  │
//! │  │ EventQueue │    │ EventQueue │    │ EventQueue │      │
//! │  │ tokens     │    │ tokens     │    │ tokens     │      │
//! │  └─────┬──────┘    └─────┬──────┘    └─────┬──────┘      │
//! │        └──────── rows, in replication order ─┘           │
//! └──────────────────────────────────────────────────────────┘
//!            ▲ shared, read-only: ProcessGraph + BatchConfig
//! ```
//!
//! # Usage
//!
//! ```
//! use bpsim_core::{BatchConfig, Distribution, ProcessBuilder, ProcessGraph};
//! use bpsim_env::Mulberry32Factory;
//! use bpsim_sim::run_batch;
//!
//! let defs = ProcessBuilder::new("P")
//!     .start("S")
//!     .task("A")
//!     .end("E")
//!     .flow("f1", "S", "A")
//!     .flow("f2", "A", "E")
//!     .build();
//! let graph = ProcessGraph::build(&defs).unwrap();
//! let config = BatchConfig::default().with_activity("A", Distribution::fixed(2.0));
//!
//! let result = run_batch(&graph, &config, &Mulberry32Factory).unwrap();
//! assert_eq!(result.summary[0].throughput, 0.5);
//! ```

mod engine;
mod queue;
pub mod error;
pub mod input;
pub mod runner;
pub mod scenarios;

pub use engine::Replication;
pub use error::RunError;
pub use queue::EventQueue;
pub use runner::{run_batch, BatchRunner};
pub use scenarios::{Scenario, ScenarioId};

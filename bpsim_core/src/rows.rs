//! Flat output records.
//!
//! Every row carries the scenario label and replication number so rows from
//! many batches can be stacked into one table. Times and ratios are rounded
//! to six decimals at emission.

use serde::{Deserialize, Serialize};

/// Rounds to six decimals.
pub fn round6(x: f64) -> f64 {
    (x * 1e6).round() / 1e6
}

/// Kind of an event-log row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    CaseStart,
    Enter,
    Leave,
    TaskComplete,
    BoundaryTimerFire,
    CaseEnd,
    TokenError,
}

impl EventKind {
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::CaseStart => "case_start",
            EventKind::Enter => "enter",
            EventKind::Leave => "leave",
            EventKind::TaskComplete => "task_complete",
            EventKind::BoundaryTimerFire => "boundary_timer_fire",
            EventKind::CaseEnd => "case_end",
            EventKind::TokenError => "token_error",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// One entry of the event log. Unused id columns are empty strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRow {
    pub scenario_id: String,
    pub replication: u32,
    pub sim_time: f64,
    pub event_type: EventKind,
    pub case_id: String,
    pub token_id: String,
    pub element_id: String,
    pub element_type: String,
    pub from_id: String,
    pub to_id: String,
    pub flow_id: String,
}

/// End-of-replication metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryRow {
    pub scenario_id: String,
    pub replication: u32,
    pub sim_end_time: f64,
    pub completed_cases: u64,
    pub throughput: f64,
    pub avg_wip: f64,
    pub processed_events: u64,
}

/// Observed branch frequency of one gateway exit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathRow {
    pub scenario_id: String,
    pub replication: u32,
    pub gateway_id: String,
    pub flow_id: String,
    pub traversals: u64,
    pub total_gateway_exits: u64,
    pub path_probability: f64,
}

/// WIP/throughput trace point, written before each event takes effect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProofRow {
    pub scenario_id: String,
    pub replication: u32,
    pub time: f64,
    pub dt: f64,
    pub active_cases: u64,
    pub completed_cases: u64,
    pub wip_area_cum: f64,
    pub throughput_cum: f64,
}

/// One case, complete or truncated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseRow {
    pub scenario_id: String,
    pub replication: u32,
    pub case_id: String,
    pub start_time: f64,
    pub end_time: Option<f64>,
    pub cycle_time: Option<f64>,
    pub completed: bool,
}

/// How a task execution ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpanOutcome {
    Completed,
    CanceledByBoundaryTimer,
}

/// One task execution attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskSpanRow {
    pub scenario_id: String,
    pub replication: u32,
    pub case_id: String,
    pub task_id: String,
    pub start_time: f64,
    pub end_time: f64,
    pub duration: f64,
    /// Sampled duration the task would have run without preemption
    pub planned_duration: f64,
    pub outcome: SpanOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boundary_id: Option<String>,
}

/// Everything a batch produces, replication outputs concatenated in order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchResult {
    #[serde(rename = "eventsRows")]
    pub events: Vec<EventRow>,
    #[serde(rename = "summaryRows")]
    pub summary: Vec<SummaryRow>,
    #[serde(rename = "pathRows")]
    pub paths: Vec<PathRow>,
    #[serde(rename = "proofRows")]
    pub proof: Vec<ProofRow>,
    #[serde(rename = "casesRows")]
    pub cases: Vec<CaseRow>,
    #[serde(rename = "taskRows")]
    pub tasks: Vec<TaskSpanRow>,
}

impl BatchResult {
    /// Appends another result's rows after this one's.
    pub fn extend(&mut self, other: BatchResult) {
        self.events.extend(other.events);
        self.summary.extend(other.summary);
        self.paths.extend(other.paths);
        self.proof.extend(other.proof);
        self.cases.extend(other.cases);
        self.tasks.extend(other.tasks);
    }
}

//! Batch configuration.
//!
//! Every field is optional in JSON; missing fields take the defaults listed
//! on [`BatchConfig`]. Per-element maps are keyed by element id.

use std::collections::HashMap;

use bpsim_env::StreamKind;
use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};

use crate::distribution::{number, Distribution};
use crate::error::ConfigError;
use crate::graph::{ElementIdx, ProcessGraph};

/// Branch selection policy for an exclusive gateway.
///
/// Decoding is lenient: anything other than an object with
/// `"type": "weighted"` is a uniform pick, and weights that are not numbers
/// (or numeric strings) weigh 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Value", into = "Value")]
pub enum XorPolicy {
    /// Pick an outgoing flow proportionally to its weight.
    ///
    /// Flows missing from the map weigh 0. If no weight is positive the
    /// gateway falls back to a uniform pick.
    Weighted {
        weights_by_flow_id: HashMap<String, f64>,
    },

    /// Uniform pick among outgoing flows
    Uniform,
}

impl From<Value> for XorPolicy {
    fn from(value: Value) -> Self {
        let Value::Object(spec) = value else {
            return XorPolicy::Uniform;
        };
        if spec.get("type").and_then(Value::as_str) != Some("weighted") {
            return XorPolicy::Uniform;
        }
        let weights_by_flow_id = match spec.get("weightsByFlowId") {
            Some(Value::Object(weights)) => weights
                .iter()
                .map(|(flow, w)| (flow.clone(), number(w).unwrap_or(0.0)))
                .collect(),
            _ => HashMap::new(),
        };
        XorPolicy::Weighted { weights_by_flow_id }
    }
}

impl From<XorPolicy> for Value {
    fn from(policy: XorPolicy) -> Self {
        match policy {
            XorPolicy::Weighted { weights_by_flow_id } => {
                json!({"type": "weighted", "weightsByFlowId": weights_by_flow_id})
            }
            XorPolicy::Uniform => json!({"type": "uniform"}),
        }
    }
}

/// Accepts any integral JSON seed, folding negatives into the unsigned range.
fn lenient_seed<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    let value = Value::deserialize(deserializer)?;
    let seed = match &value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_i64().map(|x| x as u64))
            .or_else(|| n.as_f64().filter(|x| x.is_finite()).map(|x| x as i64 as u64)),
        Value::String(s) => s.trim().parse::<i64>().ok().map(|x| x as u64),
        _ => None,
    };
    seed.ok_or_else(|| de::Error::custom(format!("invalid seed: {}", value)))
}

/// Configuration for a batch of replications.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BatchConfig {
    /// Number of replications; values below 1 run one
    pub replications: u32,

    /// Base seed for replication streams; negative JSON seeds wrap
    #[serde(deserialize_with = "lenient_seed")]
    pub seed: u64,

    /// Arrivals after this simulated time are dropped
    pub max_sim_time: f64,

    /// Processed-event budget per replication
    pub max_events: u64,

    /// Element where arrivals enter (first start event when unset)
    pub start_event_id: Option<String>,

    /// Inter-arrival distribution (fixed 0 = a single case)
    pub case_arrival: Distribution,

    /// Task durations (default fixed 1)
    pub activity_durations: HashMap<String, Distribution>,

    /// Intermediate timer delays (default fixed 1)
    pub timer_events: HashMap<String, Distribution>,

    /// Message catch delays (default fixed 0)
    pub message_delays: HashMap<String, Distribution>,

    /// Boundary timer delays (default fixed task duration + 1)
    pub boundary_timers: HashMap<String, Distribution>,

    /// Exclusive gateway policies (default uniform)
    pub xor_policies: HashMap<String, XorPolicy>,

    /// Label stamped onto every output row
    pub scenario_id: String,

    /// Generator family for replication streams
    pub rng: StreamKind,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            replications: 1,
            seed: 123,
            max_sim_time: 1000.0,
            max_events: 200_000,
            start_event_id: None,
            case_arrival: Distribution::fixed(0.0),
            activity_durations: HashMap::new(),
            timer_events: HashMap::new(),
            message_delays: HashMap::new(),
            boundary_timers: HashMap::new(),
            xor_policies: HashMap::new(),
            scenario_id: "scenario".to_string(),
            rng: StreamKind::default(),
        }
    }
}

impl BatchConfig {
    /// Parses a configuration from JSON.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Replication count actually run.
    pub fn effective_replications(&self) -> u32 {
        self.replications.max(1)
    }

    /// Resolves the element arrivals enter at.
    pub fn resolve_start(&self, graph: &ProcessGraph) -> Result<ElementIdx, ConfigError> {
        match self.start_event_id.as_deref().filter(|id| !id.is_empty()) {
            Some(id) => graph.lookup(id).ok_or_else(|| ConfigError::unknown_start(id)),
            // Unreachable for graphs from `ProcessGraph::build`, which rejects
            // processes without a start event; kept as a guard.
            None => graph
                .start_events()
                .first()
                .copied()
                .ok_or(ConfigError::NoStartEvent),
        }
    }

    pub fn with_scenario_id(mut self, scenario_id: &str) -> Self {
        self.scenario_id = scenario_id.to_string();
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_replications(mut self, replications: u32) -> Self {
        self.replications = replications;
        self
    }

    pub fn with_case_arrival(mut self, dist: Distribution) -> Self {
        self.case_arrival = dist;
        self
    }

    pub fn with_activity(mut self, task_id: &str, dist: Distribution) -> Self {
        self.activity_durations.insert(task_id.to_string(), dist);
        self
    }

    pub fn with_timer(mut self, event_id: &str, dist: Distribution) -> Self {
        self.timer_events.insert(event_id.to_string(), dist);
        self
    }

    pub fn with_message_delay(mut self, event_id: &str, dist: Distribution) -> Self {
        self.message_delays.insert(event_id.to_string(), dist);
        self
    }

    pub fn with_boundary_timer(mut self, boundary_id: &str, dist: Distribution) -> Self {
        self.boundary_timers.insert(boundary_id.to_string(), dist);
        self
    }

    /// Sets weighted selection for a gateway from `(flow id, weight)` pairs.
    pub fn with_weights(mut self, gateway_id: &str, weights: &[(&str, f64)]) -> Self {
        let weights_by_flow_id = weights
            .iter()
            .map(|(flow, w)| (flow.to_string(), *w))
            .collect();
        self.xor_policies
            .insert(gateway_id.to_string(), XorPolicy::Weighted { weights_by_flow_id });
        self
    }
}

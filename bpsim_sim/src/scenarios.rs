//! Built-in process models for smoke runs and demos.

use bpsim_core::{BatchConfig, Definitions, Distribution, ProcessBuilder};

/// Scenario identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioId {
    /// One task between a start and an end event
    SingleTask,

    /// Exclusive gateway with 3:1 branch weights
    WeightedGateway,

    /// Task raced by an interrupting timer boundary event
    BoundaryTimeout,

    /// Intermediate timer wait, message throw and message catch
    TimerMessage,

    /// Exponential arrivals through a review loop with an escalation timer
    ArrivalStream,
}

/// A ready-to-run model with its configuration.
#[derive(Debug, Clone)]
pub struct Scenario {
    pub id: ScenarioId,
    pub definitions: Definitions,
    pub config: BatchConfig,
}

impl ScenarioId {
    /// Returns a list of all scenarios.
    pub fn all() -> Vec<ScenarioId> {
        vec![
            ScenarioId::SingleTask,
            ScenarioId::WeightedGateway,
            ScenarioId::BoundaryTimeout,
            ScenarioId::TimerMessage,
            ScenarioId::ArrivalStream,
        ]
    }

    /// Returns the scenario name.
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::SingleTask => "single_task",
            ScenarioId::WeightedGateway => "weighted_gateway",
            ScenarioId::BoundaryTimeout => "boundary_timeout",
            ScenarioId::TimerMessage => "timer_message",
            ScenarioId::ArrivalStream => "arrival_stream",
        }
    }

    /// Returns a description of the scenario.
    pub fn description(&self) -> &'static str {
        match self {
            ScenarioId::SingleTask => "One case through one fixed 2-unit task",
            ScenarioId::WeightedGateway => "XOR split weighted 3:1 between two tasks",
            ScenarioId::BoundaryTimeout => "5-unit task interrupted by a 2-unit boundary timer",
            ScenarioId::TimerMessage => "Timer wait, message hand-off, then a normal-duration task",
            ScenarioId::ArrivalStream => {
                "Exponential arrivals, review/rework loop, escalation on slow reviews"
            }
        }
    }

    /// Builds the model and configuration.
    pub fn build(&self) -> Scenario {
        let (definitions, config) = match self {
            ScenarioId::SingleTask => single_task(),
            ScenarioId::WeightedGateway => weighted_gateway(),
            ScenarioId::BoundaryTimeout => boundary_timeout(),
            ScenarioId::TimerMessage => timer_message(),
            ScenarioId::ArrivalStream => arrival_stream(),
        };
        Scenario {
            id: *self,
            definitions,
            config: config.with_scenario_id(self.name()),
        }
    }
}

impl std::fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ScenarioId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "single_task" | "singletask" => Ok(ScenarioId::SingleTask),
            "weighted_gateway" | "weightedgateway" | "xor" => Ok(ScenarioId::WeightedGateway),
            "boundary_timeout" | "boundarytimeout" | "boundary" => Ok(ScenarioId::BoundaryTimeout),
            "timer_message" | "timermessage" => Ok(ScenarioId::TimerMessage),
            "arrival_stream" | "arrivalstream" => Ok(ScenarioId::ArrivalStream),
            _ => Err(format!("Unknown scenario: {}", s)),
        }
    }
}

fn single_task() -> (Definitions, BatchConfig) {
    let defs = ProcessBuilder::new("Process_SingleTask")
        .start("Start")
        .task("Work")
        .end("End")
        .flow("Flow_1", "Start", "Work")
        .flow("Flow_2", "Work", "End")
        .build();
    let config = BatchConfig::default().with_activity("Work", Distribution::fixed(2.0));
    (defs, config)
}

fn weighted_gateway() -> (Definitions, BatchConfig) {
    let defs = ProcessBuilder::new("Process_Xor")
        .start("Start")
        .exclusive_gateway("Split")
        .task("Standard")
        .task("Express")
        .end("End")
        .flow("Flow_in", "Start", "Split")
        .flow("Flow_standard", "Split", "Standard")
        .flow("Flow_express", "Split", "Express")
        .flow("Flow_s_end", "Standard", "End")
        .flow("Flow_e_end", "Express", "End")
        .build();
    let config = BatchConfig::default()
        .with_replications(200)
        .with_weights("Split", &[("Flow_standard", 3.0), ("Flow_express", 1.0)])
        .with_activity("Standard", Distribution::uniform(2.0, 4.0))
        .with_activity("Express", Distribution::fixed(1.0));
    (defs, config)
}

fn boundary_timeout() -> (Definitions, BatchConfig) {
    let defs = ProcessBuilder::new("Process_Timeout")
        .start("Start")
        .task("Approve")
        .boundary_timer("Timeout", "Approve", true)
        .task("Escalate")
        .end("Approved")
        .end("Escalated")
        .flow("Flow_1", "Start", "Approve")
        .flow("Flow_ok", "Approve", "Approved")
        .flow("Flow_timeout", "Timeout", "Escalate")
        .flow("Flow_esc", "Escalate", "Escalated")
        .build();
    let config = BatchConfig::default()
        .with_activity("Approve", Distribution::fixed(5.0))
        .with_boundary_timer("Timeout", Distribution::fixed(2.0));
    (defs, config)
}

fn timer_message() -> (Definitions, BatchConfig) {
    let defs = ProcessBuilder::new("Process_TimerMessage")
        .start("Start")
        .timer_catch("Cooldown")
        .message_throw("Notify")
        .message_catch("Reply")
        .task("Handle")
        .end("End")
        .flow("Flow_1", "Start", "Cooldown")
        .flow("Flow_2", "Cooldown", "Notify")
        .flow("Flow_3", "Notify", "Reply")
        .flow("Flow_4", "Reply", "Handle")
        .flow("Flow_5", "Handle", "End")
        .build();
    let config = BatchConfig::default()
        .with_replications(20)
        .with_timer("Cooldown", Distribution::fixed(3.0))
        .with_message_delay("Reply", Distribution::exponential(0.5))
        .with_activity("Handle", Distribution::normal(2.0, 0.5));
    (defs, config)
}

fn arrival_stream() -> (Definitions, BatchConfig) {
    let defs = ProcessBuilder::new("Process_Claims")
        .start("Received")
        .task("Triage")
        .sub_process("Assessment", |b| {
            b.task("Review")
                .boundary_timer("ReviewSla", "Review", true)
                .exclusive_gateway("Decision")
                .task("Rework")
                .flow("Flow_review", "Review", "Decision")
                .flow("Flow_rework", "Decision", "Rework")
                .flow("Flow_again", "Rework", "Review")
        })
        .task("Supervisor")
        .end("Closed")
        .flow("Flow_in", "Received", "Triage")
        .flow("Flow_assess", "Triage", "Review")
        .flow("Flow_accept", "Decision", "Closed")
        .flow("Flow_sla", "ReviewSla", "Supervisor")
        .flow("Flow_sup_end", "Supervisor", "Closed")
        .build();

    let mut config = BatchConfig::default()
        .with_replications(5)
        .with_case_arrival(Distribution::exponential(4.0))
        .with_activity("Triage", Distribution::uniform(0.5, 1.5))
        .with_activity("Review", Distribution::exponential(3.0))
        .with_activity("Rework", Distribution::normal(2.0, 0.75))
        .with_activity("Supervisor", Distribution::fixed(1.0))
        .with_boundary_timer("ReviewSla", Distribution::fixed(6.0))
        .with_weights("Decision", &[("Flow_accept", 4.0), ("Flow_rework", 1.0)]);
    config.max_sim_time = 200.0;
    (defs, config)
}

//! Single-replication simulation engine.
//!
//! One [`Replication`] owns everything that changes while a replication runs:
//! the event queue, the token registry, case records, metric accumulators
//! and the output rows. Events are processed one at a time in time order, so
//! handlers mutate state freely without any synchronization.
//!
//! # Token state machine
//!
//! ```text
//!   ARRIVAL ──► ENTER(start) ──► LEAVE(flow) ──► ENTER(target) ──► ...
//!                                    ▲               │
//!                                    │   task        ▼
//!                                    ├──── TASK_DONE ◄── schedule(duration)
//!                                    └──── BOUNDARY  ◄── schedule(timer)
//! ```
//!
//! A task entry records an in-progress attempt on the token. Whichever of
//! `TASK_DONE` and an interrupting `BOUNDARY` arrives first while that attempt
//! is still live settles it; the other one finds no live attempt and is a
//! no-op.

use bpsim_core::rows::round6;
use bpsim_core::{
    BatchConfig, BatchResult, CaseRow, Distribution, ElementIdx, ElementKind, EventKind, EventRow,
    FlowIdx, PathRow, ProcessGraph, ProofRow, SpanOutcome, SummaryRow, TaskSpanRow, Triggers,
    XorPolicy,
};
use bpsim_env::UniformSource;
use indexmap::IndexMap;
use tracing::{debug, warn};

use crate::queue::EventQueue;

/// Lower bound for the simulated end time used as a divisor.
const MIN_SIM_END: f64 = 1e-9;

/// Default task duration.
const DEFAULT_ACTIVITY_DURATION: f64 = 1.0;

/// Default intermediate timer delay.
const DEFAULT_TIMER_DELAY: f64 = 1.0;

/// Default message catch delay.
const DEFAULT_MESSAGE_DELAY: f64 = 0.0;

const TASK_ELEMENT_TYPE: &str = "task";
const BOUNDARY_ELEMENT_TYPE: &str = "boundary_timer";

/// Handle into the token registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct TokenIdx(usize);

/// Scheduled occurrences.
#[derive(Debug, Clone, Copy)]
pub(crate) enum SimEvent {
    Arrival,
    Enter {
        token: TokenIdx,
    },
    Leave {
        token: TokenIdx,
        flow: FlowIdx,
    },
    TaskDone {
        token: TokenIdx,
        task: ElementIdx,
        attempt: u64,
    },
    Boundary {
        token: TokenIdx,
        boundary: ElementIdx,
        task: ElementIdx,
        attempt: u64,
    },
}

/// Where a token sits.
#[derive(Debug, Clone)]
enum Position {
    At(ElementIdx),
    /// Reached through a flow whose target is not in the graph
    Dangling(String),
}

/// Task-in-progress record of a token.
#[derive(Debug, Clone)]
struct TaskAttempt {
    task: ElementIdx,
    attempt: u64,
    started_at: f64,
    done_at: f64,
    planned: f64,
    canceled: bool,
}

impl TaskAttempt {
    fn is_live(&self, task: ElementIdx, attempt: u64) -> bool {
        self.task == task && self.attempt == attempt && !self.canceled
    }
}

#[derive(Debug)]
struct Token {
    case: usize,
    id: String,
    position: Position,
    /// At most one task attempt per token at any instant
    task: Option<TaskAttempt>,
}

#[derive(Debug)]
struct CaseRecord {
    id: String,
    start_time: f64,
    end_time: Option<f64>,
}

/// One replication of the batch.
pub struct Replication<'a, R> {
    graph: &'a ProcessGraph,
    config: &'a BatchConfig,
    start: ElementIdx,
    replication: u32,
    rng: R,

    queue: EventQueue<SimEvent>,
    tokens: Vec<Token>,
    cases: Vec<CaseRecord>,
    next_attempt: u64,
    repeat_arrivals: bool,

    // Metrics
    active_cases: u64,
    completed_cases: u64,
    wip_area: f64,
    last_time: f64,
    processed: u64,
    flow_traversals: Vec<u64>,
    gateway_exits: IndexMap<ElementIdx, u64>,

    // Output
    events: Vec<EventRow>,
    proof: Vec<ProofRow>,
    spans: Vec<TaskSpanRow>,
}

impl<'a, R: UniformSource> Replication<'a, R> {
    /// Prepares a replication. `start` is where arrivals enter.
    pub fn new(
        graph: &'a ProcessGraph,
        config: &'a BatchConfig,
        start: ElementIdx,
        replication: u32,
        rng: R,
    ) -> Self {
        // A draw-free arrival spec that never advances time yields one case.
        let repeat_arrivals = !matches!(config.case_arrival.constant(), Some(gap) if gap <= 0.0);

        Self {
            graph,
            config,
            start,
            replication,
            rng,
            queue: EventQueue::new(),
            tokens: Vec::new(),
            cases: Vec::new(),
            next_attempt: 0,
            repeat_arrivals,
            active_cases: 0,
            completed_cases: 0,
            wip_area: 0.0,
            last_time: 0.0,
            processed: 0,
            flow_traversals: vec![0; graph.flow_count()],
            gateway_exits: IndexMap::new(),
            events: Vec::new(),
            proof: Vec::new(),
            spans: Vec::new(),
        }
    }

    /// Runs until the queue drains, the event budget is spent, or time passes
    /// `maxSimTime` with no case left active.
    pub fn run(mut self) -> BatchResult {
        debug!(
            "Replication {} starting ({} max events, max sim time {})",
            self.replication, self.config.max_events, self.config.max_sim_time
        );

        self.queue.push(0.0, SimEvent::Arrival);

        while self.processed < self.config.max_events {
            let Some((t, event)) = self.queue.pop() else {
                break;
            };
            if t > self.config.max_sim_time && self.active_cases == 0 {
                break;
            }

            match event {
                SimEvent::Arrival => self.on_arrival(t),
                SimEvent::Enter { token } => self.on_enter(t, token),
                SimEvent::Leave { token, flow } => self.on_leave(t, token, flow),
                SimEvent::TaskDone {
                    token,
                    task,
                    attempt,
                } => self.on_task_done(t, token, task, attempt),
                SimEvent::Boundary {
                    token,
                    boundary,
                    task,
                    attempt,
                } => self.on_boundary(t, token, boundary, task, attempt),
            }

            self.processed += 1;
        }

        if !self.queue.is_empty() {
            debug!(
                "Replication {} stopped with {} events pending",
                self.replication,
                self.queue.len()
            );
        }

        self.finish()
    }

    // ───────────────────────────────────────────────────────────────────
    // Bookkeeping
    // ───────────────────────────────────────────────────────────────────

    /// Integrates WIP over the interval since the previous event, using the
    /// case count that held during that interval, and records a trace row.
    fn update_wip(&mut self, t: f64) {
        let dt = t - self.last_time;
        if dt > 0.0 {
            self.wip_area += self.active_cases as f64 * dt;
        }
        self.proof.push(ProofRow {
            scenario_id: self.config.scenario_id.clone(),
            replication: self.replication,
            time: round6(t),
            dt: round6(dt),
            active_cases: self.active_cases,
            completed_cases: self.completed_cases,
            wip_area_cum: round6(self.wip_area),
            throughput_cum: round6(self.completed_cases as f64 / t.max(MIN_SIM_END)),
        });
        self.last_time = t;
    }

    /// Event row for `token` with all id columns empty.
    fn event_row(&self, t: f64, kind: EventKind, token: TokenIdx) -> EventRow {
        let tok = &self.tokens[token.0];
        EventRow {
            scenario_id: self.config.scenario_id.clone(),
            replication: self.replication,
            sim_time: round6(t),
            event_type: kind,
            case_id: self.cases[tok.case].id.clone(),
            token_id: tok.id.clone(),
            element_id: String::new(),
            element_type: String::new(),
            from_id: String::new(),
            to_id: String::new(),
            flow_id: String::new(),
        }
    }

    fn log_element(&mut self, t: f64, kind: EventKind, token: TokenIdx, element: ElementIdx) {
        let el = self.graph.element(element);
        let row = EventRow {
            element_id: el.id.clone(),
            element_type: el.type_name.clone(),
            ..self.event_row(t, kind, token)
        };
        self.events.push(row);
    }

    /// Samples `dist`, or returns `default` without touching the stream.
    fn sample_or(&mut self, dist: Option<&Distribution>, default: f64) -> f64 {
        match dist {
            Some(dist) => dist.sample(&mut self.rng),
            None => default,
        }
    }

    fn schedule_leave(&mut self, at: f64, token: TokenIdx, flow: FlowIdx) {
        self.queue.push(at, SimEvent::Leave { token, flow });
    }

    /// Leaves `from` through its first outgoing flow at `at`; a token with
    /// nowhere to go stops where it is.
    fn leave_first(&mut self, at: f64, token: TokenIdx, from: ElementIdx) {
        match self.graph.first_outgoing(from) {
            Some(flow) => self.schedule_leave(at, token, flow),
            None => warn!(
                "Token {} stopped at {} (no outgoing flow)",
                self.tokens[token.0].id,
                self.graph.element(from).id
            ),
        }
    }

    // ───────────────────────────────────────────────────────────────────
    // Handlers
    // ───────────────────────────────────────────────────────────────────

    fn on_arrival(&mut self, t: f64) {
        self.update_wip(t);
        if t > self.config.max_sim_time {
            return;
        }

        let case = self.cases.len();
        let serial = case + 1;
        self.cases.push(CaseRecord {
            id: format!("C{}_{}", self.replication, serial),
            start_time: t,
            end_time: None,
        });
        let token = TokenIdx(self.tokens.len());
        self.tokens.push(Token {
            case,
            id: format!("T{}_{}", self.replication, serial),
            position: Position::At(self.start),
            task: None,
        });
        self.active_cases += 1;

        self.log_element(t, EventKind::CaseStart, token, self.start);
        self.queue.push(t, SimEvent::Enter { token });

        if self.repeat_arrivals {
            let config = self.config;
            let gap = config.case_arrival.sample(&mut self.rng);
            if gap.is_finite() && gap >= 0.0 {
                self.queue.push(t + gap, SimEvent::Arrival);
            }
        }
    }

    fn on_enter(&mut self, t: f64, token: TokenIdx) {
        self.update_wip(t);

        let idx = match &self.tokens[token.0].position {
            Position::At(idx) => *idx,
            Position::Dangling(id) => {
                let id = id.clone();
                warn!(
                    "Token {} entered unknown element {}",
                    self.tokens[token.0].id, id
                );
                let row = EventRow {
                    element_id: id,
                    ..self.event_row(t, EventKind::TokenError, token)
                };
                self.events.push(row);
                return;
            }
        };

        let config = self.config;
        let element = self.graph.element(idx);
        self.log_element(t, EventKind::Enter, token, idx);

        match element.kind {
            ElementKind::StartEvent => self.leave_first(t, token, idx),
            ElementKind::EndEvent => self.finish_case(t, token, idx),
            ElementKind::IntermediateCatch(Triggers { timer: true, .. })
            | ElementKind::Boundary {
                triggers: Triggers { timer: true, .. },
                ..
            } => {
                let delay =
                    self.sample_or(config.timer_events.get(&element.id), DEFAULT_TIMER_DELAY);
                self.leave_first(after(t, delay), token, idx);
            }
            ElementKind::IntermediateCatch(Triggers { message: true, .. }) => {
                let delay =
                    self.sample_or(config.message_delays.get(&element.id), DEFAULT_MESSAGE_DELAY);
                self.leave_first(after(t, delay), token, idx);
            }
            ElementKind::Task => self.start_task(t, token, idx),
            ElementKind::ExclusiveGateway => self.route_gateway(t, token, idx),
            _ => self.leave_first(t, token, idx),
        }
    }

    fn finish_case(&mut self, t: f64, token: TokenIdx, end: ElementIdx) {
        self.active_cases = self.active_cases.saturating_sub(1);
        self.completed_cases += 1;
        let case = self.tokens[token.0].case;
        self.cases[case].end_time = Some(t);
        self.log_element(t, EventKind::CaseEnd, token, end);
    }

    fn start_task(&mut self, t: f64, token: TokenIdx, task: ElementIdx) {
        let config = self.config;
        let graph = self.graph;
        let task_id = &graph.element(task).id;

        let duration = self
            .sample_or(config.activity_durations.get(task_id), DEFAULT_ACTIVITY_DURATION)
            .max(0.0);
        let done_at = t + duration;

        self.next_attempt += 1;
        let attempt = self.next_attempt;
        self.tokens[token.0].task = Some(TaskAttempt {
            task,
            attempt,
            started_at: t,
            done_at,
            planned: duration,
            canceled: false,
        });

        for &boundary in graph.boundaries(task) {
            if !graph.element(boundary).kind.is_interrupting_timer() {
                continue;
            }
            let boundary_id = &graph.element(boundary).id;
            let delay = self.sample_or(config.boundary_timers.get(boundary_id), duration + 1.0);
            self.queue.push(
                after(t, delay),
                SimEvent::Boundary {
                    token,
                    boundary,
                    task,
                    attempt,
                },
            );
        }

        self.queue.push(
            done_at,
            SimEvent::TaskDone {
                token,
                task,
                attempt,
            },
        );
    }

    fn route_gateway(&mut self, t: f64, token: TokenIdx, gateway: ElementIdx) {
        let graph = self.graph;
        let outgoing = graph.outgoing(gateway);
        if outgoing.is_empty() {
            warn!(
                "Token {} stopped at gateway {} (no outgoing flow)",
                self.tokens[token.0].id,
                graph.element(gateway).id
            );
            return;
        }

        let flow = match self.config.xor_policies.get(&graph.element(gateway).id) {
            Some(XorPolicy::Weighted { weights_by_flow_id }) => {
                let weights: Vec<f64> = outgoing
                    .iter()
                    .map(|&f| {
                        weights_by_flow_id
                            .get(&graph.flow(f).id)
                            .copied()
                            .unwrap_or(0.0)
                    })
                    .collect();
                pick_weighted(outgoing, &weights, &mut self.rng)
            }
            _ => pick_uniform(outgoing, &mut self.rng),
        };

        *self.gateway_exits.entry(gateway).or_insert(0) += 1;
        self.schedule_leave(t, token, flow);
    }

    fn on_leave(&mut self, t: f64, token: TokenIdx, flow: FlowIdx) {
        self.update_wip(t);
        self.flow_traversals[flow.index()] += 1;

        let graph = self.graph;
        let f = graph.flow(flow);
        let from_id = if f.source_id.is_empty() {
            match &self.tokens[token.0].position {
                Position::At(idx) => graph.element(*idx).id.clone(),
                Position::Dangling(id) => id.clone(),
            }
        } else {
            f.source_id.clone()
        };

        let row = EventRow {
            from_id,
            to_id: f.target_id.clone(),
            flow_id: f.id.clone(),
            ..self.event_row(t, EventKind::Leave, token)
        };
        self.events.push(row);

        self.tokens[token.0].position = match f.target {
            Some(idx) => Position::At(idx),
            None => Position::Dangling(f.target_id.clone()),
        };
        self.queue.push(t, SimEvent::Enter { token });
    }

    fn on_task_done(&mut self, t: f64, token: TokenIdx, task: ElementIdx, attempt: u64) {
        self.update_wip(t);

        let live = matches!(&self.tokens[token.0].task, Some(a) if a.is_live(task, attempt));
        if !live {
            return;
        }
        let Some(record) = self.tokens[token.0].task.take() else {
            return;
        };

        let row = EventRow {
            element_id: self.graph.element(task).id.clone(),
            element_type: TASK_ELEMENT_TYPE.to_string(),
            ..self.event_row(t, EventKind::TaskComplete, token)
        };
        self.events.push(row);
        self.close_span(t, token, &record, SpanOutcome::Completed, None);

        self.leave_first(t, token, task);
    }

    fn on_boundary(
        &mut self,
        t: f64,
        token: TokenIdx,
        boundary: ElementIdx,
        task: ElementIdx,
        attempt: u64,
    ) {
        self.update_wip(t);

        let record = match &mut self.tokens[token.0].task {
            Some(a) if a.is_live(task, attempt) => a,
            _ => return,
        };
        // At or after natural completion the timer is stale.
        if t >= record.done_at {
            return;
        }
        record.canceled = true;
        let record = record.clone();

        let graph = self.graph;
        let row = EventRow {
            element_id: graph.element(boundary).id.clone(),
            element_type: BOUNDARY_ELEMENT_TYPE.to_string(),
            from_id: graph.element(task).id.clone(),
            ..self.event_row(t, EventKind::BoundaryTimerFire, token)
        };
        self.events.push(row);
        self.close_span(
            t,
            token,
            &record,
            SpanOutcome::CanceledByBoundaryTimer,
            Some(graph.element(boundary).id.clone()),
        );

        self.leave_first(t, token, boundary);
    }

    fn close_span(
        &mut self,
        t: f64,
        token: TokenIdx,
        record: &TaskAttempt,
        outcome: SpanOutcome,
        boundary_id: Option<String>,
    ) {
        let case = self.tokens[token.0].case;
        self.spans.push(TaskSpanRow {
            scenario_id: self.config.scenario_id.clone(),
            replication: self.replication,
            case_id: self.cases[case].id.clone(),
            task_id: self.graph.element(record.task).id.clone(),
            start_time: round6(record.started_at),
            end_time: round6(t),
            duration: round6(t - record.started_at),
            planned_duration: round6(record.planned),
            outcome,
            boundary_id,
        });
    }

    // ───────────────────────────────────────────────────────────────────
    // Output shaping
    // ───────────────────────────────────────────────────────────────────

    fn finish(self) -> BatchResult {
        let scenario_id = &self.config.scenario_id;
        let sim_end = self.last_time.max(MIN_SIM_END);

        let summary = SummaryRow {
            scenario_id: scenario_id.clone(),
            replication: self.replication,
            sim_end_time: round6(sim_end),
            completed_cases: self.completed_cases,
            throughput: round6(self.completed_cases as f64 / sim_end),
            avg_wip: round6(self.wip_area / sim_end),
            processed_events: self.processed,
        };

        let mut paths = Vec::new();
        for (&gateway, &total) in &self.gateway_exits {
            for &flow in self.graph.outgoing(gateway) {
                let traversals = self.flow_traversals[flow.index()];
                paths.push(PathRow {
                    scenario_id: scenario_id.clone(),
                    replication: self.replication,
                    gateway_id: self.graph.element(gateway).id.clone(),
                    flow_id: self.graph.flow(flow).id.clone(),
                    traversals,
                    total_gateway_exits: total,
                    path_probability: if total > 0 {
                        round6(traversals as f64 / total as f64)
                    } else {
                        0.0
                    },
                });
            }
        }

        let cases = self
            .cases
            .iter()
            .map(|c| CaseRow {
                scenario_id: scenario_id.clone(),
                replication: self.replication,
                case_id: c.id.clone(),
                start_time: round6(c.start_time),
                end_time: c.end_time.map(round6),
                cycle_time: c.end_time.map(|end| round6(end - c.start_time)),
                completed: c.end_time.is_some(),
            })
            .collect();

        debug!(
            "Replication {} done: {} events, {} completed cases, end time {:.3}",
            self.replication, self.processed, self.completed_cases, sim_end
        );

        BatchResult {
            events: self.events,
            summary: vec![summary],
            paths,
            proof: self.proof,
            cases,
            tasks: self.spans,
        }
    }
}

/// Scheduling time for a delay; negative or NaN delays fire immediately.
fn after(t: f64, delay: f64) -> f64 {
    t + delay.max(0.0)
}

/// Uniform pick among `flows`, one draw.
fn pick_uniform<R: UniformSource>(flows: &[FlowIdx], rng: &mut R) -> FlowIdx {
    let i = (rng.next_f64() * flows.len() as f64).floor() as usize;
    flows[i.min(flows.len() - 1)]
}

/// Weighted pick among `flows`, one draw. Falls back to a uniform pick when
/// no weight is positive.
fn pick_weighted<R: UniformSource>(flows: &[FlowIdx], weights: &[f64], rng: &mut R) -> FlowIdx {
    let sum: f64 = weights.iter().sum();
    if sum.is_nan() || sum <= 0.0 {
        return pick_uniform(flows, rng);
    }
    let mut r = rng.next_f64() * sum;
    for (&flow, &w) in flows.iter().zip(weights) {
        r -= w;
        if r <= 0.0 {
            return flow;
        }
    }
    flows[flows.len() - 1]
}

#[cfg(test)]
mod tests {
    use super::*;
    use bpsim_core::{Definitions, ProcessBuilder};
    use bpsim_env::{Mulberry32, SequenceSource};
    use std::collections::HashMap;

    fn gateway_probability_sums(paths: &[PathRow]) -> HashMap<(u32, String), f64> {
        let mut sums: HashMap<(u32, String), f64> = HashMap::new();
        for row in paths {
            *sums
                .entry((row.replication, row.gateway_id.clone()))
                .or_insert(0.0) += row.path_probability;
        }
        sums
    }

    /// Outgoing flows of a gateway with `n` branches.
    fn branches(n: usize) -> Vec<FlowIdx> {
        let mut builder = ProcessBuilder::new("P").start("S").exclusive_gateway("G");
        for i in 0..n {
            let end = format!("E{i}");
            builder = builder.end(&end).flow(&format!("g{i}"), "G", &end);
        }
        let graph = ProcessGraph::build(&builder.flow("f0", "S", "G").build()).unwrap();
        let gateway = graph.lookup("G").unwrap();
        graph.outgoing(gateway).to_vec()
    }

    fn run(defs: &Definitions, config: &BatchConfig) -> BatchResult {
        let graph = ProcessGraph::build(defs).unwrap();
        let start = config.resolve_start(&graph).unwrap();
        Replication::new(&graph, config, start, 1, Mulberry32::new(42)).run()
    }

    fn kinds_at(result: &BatchResult) -> Vec<(String, f64, String)> {
        result
            .events
            .iter()
            .map(|e| {
                let target = if e.event_type == EventKind::Leave {
                    e.flow_id.clone()
                } else {
                    e.element_id.clone()
                };
                (e.event_type.name().to_string(), e.sim_time, target)
            })
            .collect()
    }

    fn single_task() -> Definitions {
        ProcessBuilder::new("P")
            .start("S")
            .task("A")
            .end("E")
            .flow("f1", "S", "A")
            .flow("f2", "A", "E")
            .build()
    }

    #[test]
    fn test_single_task_trace() {
        let config = BatchConfig::default().with_activity("A", Distribution::fixed(2.0));
        let result = run(&single_task(), &config);

        let expected = vec![
            ("case_start", 0.0, "S"),
            ("enter", 0.0, "S"),
            ("leave", 0.0, "f1"),
            ("enter", 0.0, "A"),
            ("task_complete", 2.0, "A"),
            ("leave", 2.0, "f2"),
            ("enter", 2.0, "E"),
            ("case_end", 2.0, "E"),
        ];
        let expected: Vec<(String, f64, String)> = expected
            .into_iter()
            .map(|(k, t, id)| (k.to_string(), t, id.to_string()))
            .collect();
        assert_eq!(kinds_at(&result), expected);

        let summary = &result.summary[0];
        assert_eq!(summary.completed_cases, 1);
        assert_eq!(summary.sim_end_time, 2.0);
        assert_eq!(summary.throughput, 0.5);
        assert_eq!(summary.avg_wip, 1.0);

        assert_eq!(result.cases.len(), 1);
        assert_eq!(result.cases[0].case_id, "C1_1");
        assert_eq!(result.cases[0].cycle_time, Some(2.0));
        assert!(result.cases[0].completed);

        assert_eq!(result.tasks.len(), 1);
        assert_eq!(result.tasks[0].outcome, SpanOutcome::Completed);
        assert_eq!(result.tasks[0].duration, 2.0);
    }

    #[test]
    fn test_leave_row_carries_flow_endpoints() {
        let result = run(&single_task(), &BatchConfig::default());
        let leave = result
            .events
            .iter()
            .find(|e| e.event_type == EventKind::Leave)
            .unwrap();
        assert_eq!(leave.from_id, "S");
        assert_eq!(leave.to_id, "A");
        assert_eq!(leave.flow_id, "f1");
        assert_eq!(leave.token_id, "T1_1");
    }

    #[test]
    fn test_default_task_duration_is_one() {
        let result = run(&single_task(), &BatchConfig::default());
        assert_eq!(result.tasks[0].end_time, 1.0);
    }

    #[test]
    fn test_wip_trace_runs_before_each_event() {
        let config = BatchConfig::default().with_activity("A", Distribution::fixed(2.0));
        let result = run(&single_task(), &config);

        // One trace row per processed event.
        assert_eq!(result.proof.len() as u64, result.summary[0].processed_events);

        // The TASK_DONE row integrates the 2 time units with 1 active case.
        let done = result.proof.iter().find(|p| p.time == 2.0).unwrap();
        assert_eq!(done.dt, 2.0);
        assert_eq!(done.active_cases, 1);
        assert_eq!(done.wip_area_cum, 2.0);
        assert_eq!(done.completed_cases, 0);

        // The arrival row is written before the case becomes active.
        assert_eq!(result.proof[0].active_cases, 0);
    }

    fn boundary_model() -> Definitions {
        ProcessBuilder::new("P")
            .start("S")
            .task("A")
            .boundary_timer("B", "A", true)
            .task("Escalate")
            .end("E_ok")
            .end("E_late")
            .flow("f1", "S", "A")
            .flow("f_ok", "A", "E_ok")
            .flow("f_b", "B", "Escalate")
            .flow("f_late", "Escalate", "E_late")
            .build()
    }

    #[test]
    fn test_boundary_timer_preempts_task() {
        let config = BatchConfig::default()
            .with_activity("A", Distribution::fixed(5.0))
            .with_boundary_timer("B", Distribution::fixed(2.0));
        let result = run(&boundary_model(), &config);

        let span = result.tasks.iter().find(|s| s.task_id == "A").unwrap();
        assert_eq!(span.outcome, SpanOutcome::CanceledByBoundaryTimer);
        assert_eq!(span.end_time, 2.0);
        assert_eq!(span.planned_duration, 5.0);
        assert_eq!(span.boundary_id.as_deref(), Some("B"));

        let fire = result
            .events
            .iter()
            .find(|e| e.event_type == EventKind::BoundaryTimerFire)
            .unwrap();
        assert_eq!(fire.sim_time, 2.0);
        assert_eq!(fire.element_id, "B");
        assert_eq!(fire.from_id, "A");

        let flows: Vec<&str> = result
            .events
            .iter()
            .filter(|e| e.event_type == EventKind::Leave)
            .map(|e| e.flow_id.as_str())
            .collect();
        assert!(flows.contains(&"f_b"));
        assert!(!flows.contains(&"f_ok"));

        // The stale TASK_DONE at t=5 neither completes A nor emits a row.
        assert!(!result
            .events
            .iter()
            .any(|e| e.event_type == EventKind::TaskComplete && e.element_id == "A"));
        assert_eq!(result.tasks.iter().filter(|s| s.task_id == "A").count(), 1);

        let case = &result.cases[0];
        assert_eq!(case.end_time, Some(3.0));
    }

    #[test]
    fn test_boundary_after_completion_is_stale() {
        let config = BatchConfig::default()
            .with_activity("A", Distribution::fixed(2.0))
            .with_boundary_timer("B", Distribution::fixed(2.0));
        let result = run(&boundary_model(), &config);

        assert!(!result
            .events
            .iter()
            .any(|e| e.event_type == EventKind::BoundaryTimerFire));
        assert_eq!(result.tasks[0].outcome, SpanOutcome::Completed);
    }

    #[test]
    fn test_default_boundary_delay_never_preempts() {
        let config = BatchConfig::default().with_activity("A", Distribution::fixed(3.0));
        let result = run(&boundary_model(), &config);
        assert_eq!(result.tasks[0].outcome, SpanOutcome::Completed);
        // The default timer (duration + 1) still fires later as a stale event.
        assert_eq!(result.summary[0].sim_end_time, 4.0);
    }

    #[test]
    fn test_non_interrupting_boundary_not_scheduled() {
        let defs = ProcessBuilder::new("P")
            .start("S")
            .task("A")
            .boundary_timer("B", "A", false)
            .end("E")
            .end("E_b")
            .flow("f1", "S", "A")
            .flow("f2", "A", "E")
            .flow("f_b", "B", "E_b")
            .build();
        let config = BatchConfig::default()
            .with_activity("A", Distribution::fixed(5.0))
            .with_boundary_timer("B", Distribution::fixed(1.0));
        let result = run(&defs, &config);
        assert_eq!(result.tasks[0].outcome, SpanOutcome::Completed);
        assert_eq!(result.summary[0].sim_end_time, 5.0);
    }

    #[test]
    fn test_timer_and_message_events() {
        let defs = ProcessBuilder::new("P")
            .start("S")
            .timer_catch("Wait")
            .message_throw("Send")
            .message_catch("Reply")
            .end("E")
            .flow("f1", "S", "Wait")
            .flow("f2", "Wait", "Send")
            .flow("f3", "Send", "Reply")
            .flow("f4", "Reply", "E")
            .build();

        let result = run(&defs, &BatchConfig::default());
        // Default timer 1, default message delay 0.
        assert_eq!(result.cases[0].end_time, Some(1.0));

        let config = BatchConfig::default()
            .with_timer("Wait", Distribution::fixed(3.0))
            .with_message_delay("Reply", Distribution::fixed(0.5));
        let result = run(&defs, &config);
        assert_eq!(result.cases[0].end_time, Some(3.5));
    }

    #[test]
    fn test_unknown_element_logs_token_error() {
        let defs = ProcessBuilder::new("P")
            .start("S")
            .flow("f1", "S", "Ghost")
            .build();
        let result = run(&defs, &BatchConfig::default());

        let err = result.events.last().unwrap();
        assert_eq!(err.event_type, EventKind::TokenError);
        assert_eq!(err.element_id, "Ghost");
        assert_eq!(result.summary[0].completed_cases, 0);
        assert_eq!(result.cases[0].end_time, None);
        assert!(!result.cases[0].completed);
    }

    #[test]
    fn test_dead_end_stops_token_quietly() {
        let defs = ProcessBuilder::new("P")
            .start("S")
            .task("A")
            .flow("f1", "S", "A")
            .build();
        let result = run(&defs, &BatchConfig::default());
        assert_eq!(result.tasks.len(), 1);
        assert!(!result.cases[0].completed);
        assert_eq!(result.summary[0].avg_wip, 1.0);
    }

    #[test]
    fn test_fallback_follows_first_flow() {
        let defs = ProcessBuilder::new("P")
            .start("S")
            .element(bpsim_core::FlowElement::new("bpmn:ParallelGateway", "PG"))
            .end("E1")
            .end("E2")
            .flow("f1", "S", "PG")
            .flow("pg_1", "PG", "E1")
            .flow("pg_2", "PG", "E2")
            .build();
        let result = run(&defs, &BatchConfig::default());
        let end = result
            .events
            .iter()
            .find(|e| e.event_type == EventKind::CaseEnd)
            .unwrap();
        assert_eq!(end.element_id, "E1");
        assert!(result.paths.is_empty());
    }

    #[test]
    fn test_single_arrival_for_zero_gap() {
        let result = run(&single_task(), &BatchConfig::default());
        assert_eq!(result.cases.len(), 1);
    }

    #[test]
    fn test_arrivals_stop_at_max_sim_time() {
        let mut config = BatchConfig::default().with_case_arrival(Distribution::fixed(2.0));
        config.max_sim_time = 9.0;
        let result = run(&single_task(), &config);

        // Arrivals at 0, 2, 4, 6, 8; the one at 10 is dropped.
        assert_eq!(result.cases.len(), 5);
        assert!(result.cases.iter().all(|c| c.start_time <= 9.0));
        assert!(result.cases.iter().all(|c| c.completed));

        // With no case active the late arrival ends the run unprocessed.
        assert_eq!(result.proof.last().unwrap().time, 9.0);
    }

    #[test]
    fn test_dropped_arrival_still_integrates_wip() {
        let mut config = BatchConfig::default()
            .with_case_arrival(Distribution::fixed(2.0))
            .with_activity("A", Distribution::fixed(5.0));
        config.max_sim_time = 3.0;
        let result = run(&single_task(), &config);

        // Arrival at 4 is past the bound but two cases are still active.
        assert_eq!(result.cases.len(), 2);
        let dropped = result.proof.iter().find(|p| p.time == 4.0).unwrap();
        assert_eq!(dropped.dt, 2.0);
        assert_eq!(dropped.active_cases, 2);
        assert_eq!(dropped.wip_area_cum, 6.0);
        assert!(!result
            .events
            .iter()
            .any(|e| e.event_type == EventKind::CaseStart && e.sim_time == 4.0));
        assert!(result.cases.iter().all(|c| c.completed));
    }

    #[test]
    fn test_active_cases_drain_past_max_sim_time() {
        let mut config = BatchConfig::default().with_activity("A", Distribution::fixed(50.0));
        config.max_sim_time = 10.0;
        let result = run(&single_task(), &config);
        assert!(result.cases[0].completed);
        assert_eq!(result.cases[0].end_time, Some(50.0));
    }

    #[test]
    fn test_event_budget_stops_run() {
        let mut config = BatchConfig::default().with_case_arrival(Distribution::fixed(1.0));
        config.max_events = 3;
        let result = run(&single_task(), &config);
        assert_eq!(result.summary[0].processed_events, 3);
        assert_eq!(result.proof.len(), 3);
    }

    #[test]
    fn test_loop_reentry_ignores_stale_completion() {
        // A loops back to itself once through the gateway; each entry gets
        // its own attempt, so every span closes exactly once.
        let defs = ProcessBuilder::new("P")
            .start("S")
            .task("A")
            .exclusive_gateway("G")
            .end("E")
            .flow("f1", "S", "A")
            .flow("f2", "A", "G")
            .flow("g_back", "G", "A")
            .flow("g_out", "G", "E")
            .build();
        let config = BatchConfig::default()
            .with_activity("A", Distribution::fixed(1.0))
            .with_weights("G", &[("g_back", 1.0), ("g_out", 1.0)]);
        let result = run(&defs, &config);

        let entries = result
            .events
            .iter()
            .filter(|e| e.event_type == EventKind::Enter && e.element_id == "A")
            .count();
        assert_eq!(result.tasks.len(), entries);
        assert!(result.tasks.iter().all(|s| s.duration == 1.0));
    }

    #[test]
    fn test_gateway_path_rows() {
        let defs = ProcessBuilder::new("P")
            .start("S")
            .exclusive_gateway("G")
            .end("E1")
            .end("E2")
            .flow("f1", "S", "G")
            .flow("g1", "G", "E1")
            .flow("g2", "G", "E2")
            .build();
        let mut config = BatchConfig::default()
            .with_case_arrival(Distribution::fixed(1.0))
            .with_weights("G", &[("g1", 1.0), ("g2", 1.0)]);
        config.max_sim_time = 99.0;
        let result = run(&defs, &config);

        assert_eq!(result.paths.len(), 2);
        assert_eq!(result.paths[0].flow_id, "g1");
        assert_eq!(result.paths[0].total_gateway_exits, 100);
        let total: u64 = result.paths.iter().map(|p| p.traversals).sum();
        assert_eq!(total, 100);
        for sum in gateway_probability_sums(&result.paths).values() {
            assert!((sum - 1.0).abs() <= 1e-6);
        }
    }

    #[test]
    fn test_pick_weighted() {
        let flows = branches(2);
        // r = u * 4; first flow absorbs r <= 3.
        let mut src = SequenceSource::new(vec![0.75, 0.76]);
        assert_eq!(pick_weighted(&flows, &[3.0, 1.0], &mut src), flows[0]);
        assert_eq!(pick_weighted(&flows, &[3.0, 1.0], &mut src), flows[1]);
        assert_eq!(src.taken(), 2);
    }

    #[test]
    fn test_pick_weighted_degenerate_falls_back_to_uniform() {
        let flows = branches(2);
        let mut src = SequenceSource::new(vec![0.6]);
        assert_eq!(pick_weighted(&flows, &[0.0, -1.0], &mut src), flows[1]);
        assert_eq!(src.taken(), 1);
    }

    #[test]
    fn test_pick_uniform() {
        let flows = branches(3);
        let mut src = SequenceSource::new(vec![0.0, 0.5, 0.999]);
        assert_eq!(pick_uniform(&flows, &mut src), flows[0]);
        assert_eq!(pick_uniform(&flows, &mut src), flows[1]);
        assert_eq!(pick_uniform(&flows, &mut src), flows[2]);
    }

    #[test]
    fn test_after_clamps_negative_delay() {
        assert_eq!(after(5.0, -2.0), 5.0);
        assert_eq!(after(5.0, f64::NAN), 5.0);
        assert_eq!(after(5.0, 1.5), 6.5);
    }
}

//! Process graph index.
//!
//! Built once per batch from a [`Definitions`] tree and read-only afterwards.
//! Elements and flows live in two arenas addressed by [`ElementIdx`] and
//! [`FlowIdx`]; adjacency is stored as index lists, so the graph can hold
//! cycles without any shared ownership.
//!
//! Sub-process bodies are flattened into the same arenas as the top level.
//! A token entering the sub-process element itself just follows its first
//! outgoing flow.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::error::GraphBuildError;
use crate::model::{self, Definitions, FlowElement};

/// Position of an element in the graph arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementIdx(u32);

impl ElementIdx {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Position of a sequence flow in the graph arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FlowIdx(u32);

impl FlowIdx {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Event definition markers relevant to simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Triggers {
    pub timer: bool,
    pub message: bool,
}

impl Triggers {
    fn of(el: &FlowElement) -> Self {
        Self {
            timer: el.has_definition(model::TIMER_EVENT_DEFINITION),
            message: el.has_definition(model::MESSAGE_EVENT_DEFINITION),
        }
    }
}

/// What an element does when a token enters it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    StartEvent,
    EndEvent,
    /// `bpmn:Task`, `bpmn:UserTask`, `bpmn:ServiceTask` or any `*:Task`
    Task,
    ExclusiveGateway,
    IntermediateCatch(Triggers),
    IntermediateThrow(Triggers),
    Boundary {
        /// Activity the event is attached to, if it exists in the graph
        host: Option<ElementIdx>,
        /// False only when the model says so explicitly
        cancel_activity: bool,
        triggers: Triggers,
    },
    SubProcess,
    /// Anything else (parallel/inclusive gateways, script tasks, ...)
    Other,
}

impl ElementKind {
    /// Classifies a flow element by its type tag and event markers.
    pub fn classify(el: &FlowElement) -> Self {
        let tag = el.type_name.as_str();
        match tag {
            model::START_EVENT => ElementKind::StartEvent,
            model::END_EVENT => ElementKind::EndEvent,
            model::TASK | model::USER_TASK | model::SERVICE_TASK => ElementKind::Task,
            _ if tag.ends_with(":Task") => ElementKind::Task,
            model::EXCLUSIVE_GATEWAY => ElementKind::ExclusiveGateway,
            model::INTERMEDIATE_CATCH_EVENT => ElementKind::IntermediateCatch(Triggers::of(el)),
            model::INTERMEDIATE_THROW_EVENT => ElementKind::IntermediateThrow(Triggers::of(el)),
            model::BOUNDARY_EVENT => ElementKind::Boundary {
                host: None,
                cancel_activity: el.cancel_activity != Some(false),
                triggers: Triggers::of(el),
            },
            model::SUB_PROCESS => ElementKind::SubProcess,
            _ => ElementKind::Other,
        }
    }

    pub fn is_task(&self) -> bool {
        matches!(self, ElementKind::Task)
    }

    /// True for an interrupting timer boundary event.
    pub fn is_interrupting_timer(&self) -> bool {
        matches!(
            self,
            ElementKind::Boundary {
                cancel_activity: true,
                triggers: Triggers { timer: true, .. },
                ..
            }
        )
    }
}

/// A node of the process graph.
#[derive(Debug, Clone)]
pub struct Element {
    pub id: String,
    pub name: Option<String>,
    /// Original `bpmn:*` tag, stamped onto event rows
    pub type_name: String,
    pub kind: ElementKind,
}

/// A directed edge of the process graph.
#[derive(Debug, Clone)]
pub struct SequenceFlow {
    pub id: String,
    pub source_id: String,
    pub target_id: String,
    /// Resolved target; `None` when the target id names no element
    pub target: Option<ElementIdx>,
}

/// Immutable index over one process.
#[derive(Debug, Clone)]
pub struct ProcessGraph {
    process_id: String,
    elements: Vec<Element>,
    element_index: HashMap<String, ElementIdx>,
    flows: Vec<SequenceFlow>,
    flow_index: HashMap<String, FlowIdx>,
    outgoing: Vec<Vec<FlowIdx>>,
    boundaries: Vec<Vec<ElementIdx>>,
    start_events: Vec<ElementIdx>,
}

/// Accumulates arenas during the recursive walk.
#[derive(Default)]
struct Collector {
    elements: Vec<Element>,
    element_index: HashMap<String, ElementIdx>,
    attachments: HashMap<ElementIdx, String>,
    flows: Vec<(String, Option<String>, Option<String>)>,
    flow_index: HashMap<String, FlowIdx>,
}

impl Collector {
    fn collect(&mut self, container: &[FlowElement]) {
        for el in container {
            let Some(id) = el.id.as_deref() else {
                continue;
            };

            if el.type_name == model::SEQUENCE_FLOW {
                self.add_flow(id, el);
                continue;
            }

            let idx = self.add_element(id, el);
            if let Some(host) = &el.attached_to_ref {
                if el.type_name == model::BOUNDARY_EVENT {
                    self.attachments.insert(idx, host.clone());
                }
            }

            if el.type_name == model::SUB_PROCESS {
                self.collect(&el.flow_elements);
            }
        }
    }

    fn add_element(&mut self, id: &str, el: &FlowElement) -> ElementIdx {
        let element = Element {
            id: id.to_string(),
            name: el.name.clone(),
            type_name: el.type_name.clone(),
            kind: ElementKind::classify(el),
        };
        if let Some(&idx) = self.element_index.get(id) {
            warn!("Duplicate element id {}, later declaration wins", id);
            self.elements[idx.index()] = element;
            self.attachments.remove(&idx);
            return idx;
        }
        let idx = ElementIdx(self.elements.len() as u32);
        self.elements.push(element);
        self.element_index.insert(id.to_string(), idx);
        idx
    }

    fn add_flow(&mut self, id: &str, el: &FlowElement) {
        let entry = (id.to_string(), el.source_ref.clone(), el.target_ref.clone());
        if let Some(&idx) = self.flow_index.get(id) {
            warn!("Duplicate flow id {}, later declaration wins", id);
            self.flows[idx.index()] = entry;
            return;
        }
        self.flow_index.insert(id.to_string(), FlowIdx(self.flows.len() as u32));
        self.flows.push(entry);
    }
}

impl ProcessGraph {
    /// Indexes the first process of `definitions`.
    pub fn build(definitions: &Definitions) -> Result<Self, GraphBuildError> {
        let process = definitions
            .root_elements
            .iter()
            .find(|root| root.type_name == model::PROCESS)
            .ok_or(GraphBuildError::NoProcess)?;

        let mut collector = Collector::default();
        collector.collect(&process.flow_elements);

        let Collector {
            mut elements,
            element_index,
            attachments,
            flows: raw_flows,
            flow_index,
        } = collector;

        let mut outgoing = vec![Vec::new(); elements.len()];
        let mut flows = Vec::with_capacity(raw_flows.len());
        for (i, (id, source, target)) in raw_flows.into_iter().enumerate() {
            let source_idx = source.as_deref().and_then(|s| element_index.get(s).copied());
            if let Some(src) = source_idx {
                outgoing[src.index()].push(FlowIdx(i as u32));
            }
            let target_id = target.unwrap_or_default();
            flows.push(SequenceFlow {
                target: element_index.get(&target_id).copied(),
                id,
                source_id: source.unwrap_or_default(),
                target_id,
            });
        }

        let mut boundaries = vec![Vec::new(); elements.len()];
        let mut attached: Vec<_> = attachments.into_iter().collect();
        attached.sort_by_key(|(idx, _)| *idx);
        for (idx, host_id) in attached {
            let Some(&host_idx) = element_index.get(&host_id) else {
                warn!("Boundary event {} attached to unknown activity {}", elements[idx.index()].id, host_id);
                continue;
            };
            if let ElementKind::Boundary { host, .. } = &mut elements[idx.index()].kind {
                *host = Some(host_idx);
            }
            boundaries[host_idx.index()].push(idx);
        }

        let start_events: Vec<ElementIdx> = elements
            .iter()
            .enumerate()
            .filter(|(_, el)| el.kind == ElementKind::StartEvent)
            .map(|(i, _)| ElementIdx(i as u32))
            .collect();

        if start_events.is_empty() {
            return Err(GraphBuildError::NoStartEvent {
                process_id: process.id.clone(),
            });
        }

        debug!(
            "Indexed process {}: {} elements, {} flows, {} start events",
            process.id,
            elements.len(),
            flows.len(),
            start_events.len()
        );

        Ok(Self {
            process_id: process.id.clone(),
            elements,
            element_index,
            flows,
            flow_index,
            outgoing,
            boundaries,
            start_events,
        })
    }

    pub fn process_id(&self) -> &str {
        &self.process_id
    }

    /// Resolves an element id.
    pub fn lookup(&self, id: &str) -> Option<ElementIdx> {
        self.element_index.get(id).copied()
    }

    pub fn element(&self, idx: ElementIdx) -> &Element {
        &self.elements[idx.index()]
    }

    pub fn element_by_id(&self, id: &str) -> Option<&Element> {
        self.lookup(id).map(|idx| self.element(idx))
    }

    pub fn elements(&self) -> impl Iterator<Item = (ElementIdx, &Element)> {
        self.elements
            .iter()
            .enumerate()
            .map(|(i, el)| (ElementIdx(i as u32), el))
    }

    pub fn element_count(&self) -> usize {
        self.elements.len()
    }

    pub fn flow(&self, idx: FlowIdx) -> &SequenceFlow {
        &self.flows[idx.index()]
    }

    pub fn flow_by_id(&self, id: &str) -> Option<&SequenceFlow> {
        self.flow_index.get(id).map(|&idx| self.flow(idx))
    }

    pub fn flow_count(&self) -> usize {
        self.flows.len()
    }

    /// Outgoing flows of an element, in declaration order.
    pub fn outgoing(&self, idx: ElementIdx) -> &[FlowIdx] {
        &self.outgoing[idx.index()]
    }

    pub fn first_outgoing(&self, idx: ElementIdx) -> Option<FlowIdx> {
        self.outgoing(idx).first().copied()
    }

    /// Boundary events attached to an activity, in declaration order.
    pub fn boundaries(&self, host: ElementIdx) -> &[ElementIdx] {
        &self.boundaries[host.index()]
    }

    /// All start events, in declaration order. Never empty.
    pub fn start_events(&self) -> &[ElementIdx] {
        &self.start_events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ProcessBuilder, RootElement};

    fn linear() -> Definitions {
        ProcessBuilder::new("P")
            .start("S")
            .task("A")
            .end("E")
            .flow("f1", "S", "A")
            .flow("f2", "A", "E")
            .build()
    }

    #[test]
    fn test_build_linear_process() {
        let graph = ProcessGraph::build(&linear()).unwrap();
        assert_eq!(graph.process_id(), "P");
        assert_eq!(graph.element_count(), 3);
        assert_eq!(graph.flow_count(), 2);

        let s = graph.lookup("S").unwrap();
        let f1 = graph.first_outgoing(s).unwrap();
        assert_eq!(graph.flow(f1).id, "f1");
        assert_eq!(graph.flow(f1).target, graph.lookup("A"));
        assert_eq!(graph.start_events(), &[s]);
        assert!(graph.element_by_id("A").unwrap().kind.is_task());
    }

    #[test]
    fn test_missing_process_fails() {
        let defs = Definitions {
            id: None,
            root_elements: vec![RootElement {
                type_name: "bpmn:Collaboration".to_string(),
                id: "C".to_string(),
                flow_elements: Vec::new(),
            }],
        };
        assert!(matches!(ProcessGraph::build(&defs), Err(GraphBuildError::NoProcess)));
    }

    #[test]
    fn test_missing_start_event_fails() {
        let defs = ProcessBuilder::new("P").task("A").build();
        let err = ProcessGraph::build(&defs).unwrap_err();
        assert!(matches!(err, GraphBuildError::NoStartEvent { ref process_id } if process_id == "P"));
    }

    #[test]
    fn test_outgoing_keeps_declaration_order() {
        let defs = ProcessBuilder::new("P")
            .start("S")
            .exclusive_gateway("G")
            .end("E1")
            .end("E2")
            .flow("g_b", "G", "E2")
            .flow("s_g", "S", "G")
            .flow("g_a", "G", "E1")
            .build();
        let graph = ProcessGraph::build(&defs).unwrap();
        let g = graph.lookup("G").unwrap();
        let ids: Vec<&str> = graph.outgoing(g).iter().map(|&f| graph.flow(f).id.as_str()).collect();
        assert_eq!(ids, vec!["g_b", "g_a"]);
    }

    #[test]
    fn test_sub_process_is_flattened() {
        let defs = ProcessBuilder::new("P")
            .start("S")
            .sub_process("Sub", |b| {
                b.start("SubStart").task("Inner").flow("fi", "SubStart", "Inner")
            })
            .end("E")
            .flow("f1", "S", "Sub")
            .flow("f2", "Sub", "E")
            .build();
        let graph = ProcessGraph::build(&defs).unwrap();
        assert!(graph.lookup("Inner").is_some());
        assert!(graph.flow_by_id("fi").is_some());
        assert_eq!(graph.element_by_id("Sub").unwrap().kind, ElementKind::SubProcess);
        // Nested start events are indexed too; the top-level one comes first.
        assert_eq!(graph.element(graph.start_events()[0]).id, "S");
        assert_eq!(graph.start_events().len(), 2);
    }

    #[test]
    fn test_boundary_indexed_by_host() {
        let defs = ProcessBuilder::new("P")
            .start("S")
            .task("A")
            .boundary_timer("B1", "A", true)
            .boundary_timer("B2", "A", false)
            .flow("f1", "S", "A")
            .build();
        let graph = ProcessGraph::build(&defs).unwrap();
        let a = graph.lookup("A").unwrap();
        let ids: Vec<&str> = graph.boundaries(a).iter().map(|&b| graph.element(b).id.as_str()).collect();
        assert_eq!(ids, vec!["B1", "B2"]);

        let b1 = graph.element_by_id("B1").unwrap();
        assert!(b1.kind.is_interrupting_timer());
        assert!(matches!(b1.kind, ElementKind::Boundary { host: Some(h), .. } if h == a));
        assert!(!graph.element_by_id("B2").unwrap().kind.is_interrupting_timer());
    }

    #[test]
    fn test_dangling_flow_target_kept_unresolved() {
        let defs = ProcessBuilder::new("P")
            .start("S")
            .flow("f1", "S", "Nowhere")
            .build();
        let graph = ProcessGraph::build(&defs).unwrap();
        let flow = graph.flow_by_id("f1").unwrap();
        assert_eq!(flow.target_id, "Nowhere");
        assert!(flow.target.is_none());
    }

    #[test]
    fn test_classify_task_variants() {
        let kind = |tag: &str| ElementKind::classify(&FlowElement::new(tag, "x"));
        assert_eq!(kind("bpmn:UserTask"), ElementKind::Task);
        assert_eq!(kind("bpmn:ServiceTask"), ElementKind::Task);
        assert_eq!(kind("custom:Task"), ElementKind::Task);
        assert_eq!(kind("bpmn:ScriptTask"), ElementKind::Other);
        assert_eq!(kind(model::PARALLEL_GATEWAY), ElementKind::Other);
    }

    #[test]
    fn test_elements_without_id_are_skipped() {
        let mut defs = linear();
        defs.root_elements[0].flow_elements.push(FlowElement {
            type_name: model::TASK.to_string(),
            ..Default::default()
        });
        let graph = ProcessGraph::build(&defs).unwrap();
        assert_eq!(graph.element_count(), 3);
    }
}

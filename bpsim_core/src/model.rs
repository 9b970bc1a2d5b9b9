//! In-memory process definition tree.
//!
//! This is the shape a BPMN modeler hands over after parsing: a definitions
//! root holding processes, each process holding flow elements tagged with
//! their `bpmn:*` type. Parsing the XML serialization itself happens
//! elsewhere; here the tree is either deserialized from JSON or assembled
//! with [`ProcessBuilder`].

use serde::{Deserialize, Serialize};

pub const PROCESS: &str = "bpmn:Process";
pub const START_EVENT: &str = "bpmn:StartEvent";
pub const END_EVENT: &str = "bpmn:EndEvent";
pub const TASK: &str = "bpmn:Task";
pub const USER_TASK: &str = "bpmn:UserTask";
pub const SERVICE_TASK: &str = "bpmn:ServiceTask";
pub const EXCLUSIVE_GATEWAY: &str = "bpmn:ExclusiveGateway";
pub const PARALLEL_GATEWAY: &str = "bpmn:ParallelGateway";
pub const INTERMEDIATE_CATCH_EVENT: &str = "bpmn:IntermediateCatchEvent";
pub const INTERMEDIATE_THROW_EVENT: &str = "bpmn:IntermediateThrowEvent";
pub const BOUNDARY_EVENT: &str = "bpmn:BoundaryEvent";
pub const SUB_PROCESS: &str = "bpmn:SubProcess";
pub const SEQUENCE_FLOW: &str = "bpmn:SequenceFlow";
pub const TIMER_EVENT_DEFINITION: &str = "bpmn:TimerEventDefinition";
pub const MESSAGE_EVENT_DEFINITION: &str = "bpmn:MessageEventDefinition";

/// Definitions root.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Definitions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default)]
    pub root_elements: Vec<RootElement>,
}

/// Top-level element (processes, collaborations, messages...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RootElement {
    #[serde(rename = "$type")]
    pub type_name: String,

    #[serde(default)]
    pub id: String,

    #[serde(default)]
    pub flow_elements: Vec<FlowElement>,
}

/// Event definition marker (`bpmn:TimerEventDefinition`, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventDefinition {
    #[serde(rename = "$type")]
    pub type_name: String,
}

/// Any element that lives inside a process or sub-process.
///
/// Sequence flows are flow elements too; they carry `source_ref` and
/// `target_ref` instead of event markers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowElement {
    #[serde(rename = "$type")]
    pub type_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub event_definitions: Vec<EventDefinition>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attached_to_ref: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancel_activity: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_ref: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_ref: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub flow_elements: Vec<FlowElement>,
}

impl FlowElement {
    /// Creates an element of the given type.
    pub fn new(type_name: &str, id: &str) -> Self {
        Self {
            type_name: type_name.to_string(),
            id: Some(id.to_string()),
            ..Default::default()
        }
    }

    /// Creates a sequence flow.
    pub fn sequence_flow(id: &str, source: &str, target: &str) -> Self {
        Self {
            source_ref: Some(source.to_string()),
            target_ref: Some(target.to_string()),
            ..Self::new(SEQUENCE_FLOW, id)
        }
    }

    /// Adds an event definition marker.
    pub fn with_definition(mut self, type_name: &str) -> Self {
        self.event_definitions.push(EventDefinition {
            type_name: type_name.to_string(),
        });
        self
    }

    /// Returns true if any event definition has the given type.
    pub fn has_definition(&self, type_name: &str) -> bool {
        self.event_definitions.iter().any(|d| d.type_name == type_name)
    }
}

/// Fluent builder for a single-process definition.
///
/// ```
/// use bpsim_core::ProcessBuilder;
///
/// let defs = ProcessBuilder::new("Process_1")
///     .start("S")
///     .task("A")
///     .end("E")
///     .flow("f1", "S", "A")
///     .flow("f2", "A", "E")
///     .build();
/// assert_eq!(defs.root_elements[0].flow_elements.len(), 5);
/// ```
#[derive(Debug, Clone)]
pub struct ProcessBuilder {
    process_id: String,
    elements: Vec<FlowElement>,
}

impl ProcessBuilder {
    /// Starts a process with the given id.
    pub fn new(process_id: &str) -> Self {
        Self {
            process_id: process_id.to_string(),
            elements: Vec::new(),
        }
    }

    /// Appends an arbitrary element.
    pub fn element(mut self, element: FlowElement) -> Self {
        self.elements.push(element);
        self
    }

    pub fn start(self, id: &str) -> Self {
        self.element(FlowElement::new(START_EVENT, id))
    }

    pub fn end(self, id: &str) -> Self {
        self.element(FlowElement::new(END_EVENT, id))
    }

    pub fn task(self, id: &str) -> Self {
        self.element(FlowElement::new(TASK, id))
    }

    pub fn exclusive_gateway(self, id: &str) -> Self {
        self.element(FlowElement::new(EXCLUSIVE_GATEWAY, id))
    }

    /// Intermediate catch event with a timer definition.
    pub fn timer_catch(self, id: &str) -> Self {
        self.element(
            FlowElement::new(INTERMEDIATE_CATCH_EVENT, id).with_definition(TIMER_EVENT_DEFINITION),
        )
    }

    /// Intermediate catch event with a message definition.
    pub fn message_catch(self, id: &str) -> Self {
        self.element(
            FlowElement::new(INTERMEDIATE_CATCH_EVENT, id)
                .with_definition(MESSAGE_EVENT_DEFINITION),
        )
    }

    /// Intermediate throw event with a message definition.
    pub fn message_throw(self, id: &str) -> Self {
        self.element(
            FlowElement::new(INTERMEDIATE_THROW_EVENT, id)
                .with_definition(MESSAGE_EVENT_DEFINITION),
        )
    }

    /// Timer boundary event attached to `host`.
    ///
    /// `cancel_activity: false` makes it non-interrupting, which the engine
    /// does not schedule.
    pub fn boundary_timer(self, id: &str, host: &str, cancel_activity: bool) -> Self {
        let mut boundary =
            FlowElement::new(BOUNDARY_EVENT, id).with_definition(TIMER_EVENT_DEFINITION);
        boundary.attached_to_ref = Some(host.to_string());
        boundary.cancel_activity = Some(cancel_activity);
        self.element(boundary)
    }

    /// Sub-process whose body is assembled by `body`.
    pub fn sub_process(self, id: &str, body: impl FnOnce(ProcessBuilder) -> ProcessBuilder) -> Self {
        let inner = body(ProcessBuilder::new(id));
        let mut sub = FlowElement::new(SUB_PROCESS, id);
        sub.flow_elements = inner.elements;
        self.element(sub)
    }

    pub fn flow(self, id: &str, source: &str, target: &str) -> Self {
        self.element(FlowElement::sequence_flow(id, source, target))
    }

    /// Finishes the definitions tree.
    pub fn build(self) -> Definitions {
        Definitions {
            id: Some(format!("Definitions_{}", self.process_id)),
            root_elements: vec![RootElement {
                type_name: PROCESS.to_string(),
                id: self.process_id,
                flow_elements: self.elements,
            }],
        }
    }
}

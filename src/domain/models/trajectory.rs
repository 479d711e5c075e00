//! Core trajectory types: the recorded action log of a running agent.
//!
//! A **Trajectory** is the ordered sequence of actions an agent took during
//! one execution -- tool invocations, model completions, memory operations,
//! findings. Steps are appended as they happen and are immutable afterwards.
//! Scorers only ever see snapshots (deep copies), never the live log.
//!
//! ## Key Types
//!
//! - [`StepKind`] -- The open set of recordable action kinds.
//! - [`TrajectoryStep`] -- One timestamped action record.
//! - [`Trajectory`] -- The ordered step sequence with start/end times.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// StepKind
// ---------------------------------------------------------------------------

/// The kind of action a trajectory step records.
///
/// This is an open set: kinds the engine does not know about round-trip
/// through [`StepKind::Other`]. Memory operations carry their sub-operation
/// (`memory.store`, `memory.recall`, ...) in the [`StepKind::Memory`] variant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum StepKind {
    /// A tool invocation (e.g. `nmap`, `http-client`).
    Tool,
    /// A model completion call.
    Llm,
    /// Delegation to a sub-agent.
    Delegate,
    /// A submitted finding.
    Finding,
    /// A memory operation; the payload is the sub-operation name.
    Memory(String),
    /// A plugin invocation.
    Plugin,
    /// A graph-RAG query.
    GraphRag,
    /// A planning step.
    Planning,
    /// A mission-level control step.
    Mission,
    /// Any kind the engine does not model explicitly.
    Other(String),
}

impl StepKind {
    /// Construct a memory operation kind from its sub-operation name.
    pub fn memory(op: impl Into<String>) -> Self {
        Self::Memory(op.into())
    }

    /// Whether two kinds match for the purposes of step matching.
    ///
    /// `Memory` kinds match on the `memory.` prefix alone when the expected
    /// sub-operation is empty, so an expectation of "any memory op" can be
    /// expressed as `StepKind::memory("")`.
    pub fn matches(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Memory(a), Self::Memory(b)) => a.is_empty() || b.is_empty() || a == b,
            (a, b) => a == b,
        }
    }
}

impl From<String> for StepKind {
    fn from(s: String) -> Self {
        match s.as_str() {
            "tool" => Self::Tool,
            "llm" => Self::Llm,
            "delegate" => Self::Delegate,
            "finding" => Self::Finding,
            "plugin" => Self::Plugin,
            "graphrag" => Self::GraphRag,
            "planning" => Self::Planning,
            "mission" => Self::Mission,
            other => {
                if let Some(op) = other.strip_prefix("memory.") {
                    Self::Memory(op.to_string())
                } else if other == "memory" {
                    Self::Memory(String::new())
                } else {
                    Self::Other(other.to_string())
                }
            }
        }
    }
}

impl From<StepKind> for String {
    fn from(kind: StepKind) -> Self {
        kind.to_string()
    }
}

impl std::fmt::Display for StepKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Tool => write!(f, "tool"),
            Self::Llm => write!(f, "llm"),
            Self::Delegate => write!(f, "delegate"),
            Self::Finding => write!(f, "finding"),
            Self::Memory(op) if op.is_empty() => write!(f, "memory"),
            Self::Memory(op) => write!(f, "memory.{op}"),
            Self::Plugin => write!(f, "plugin"),
            Self::GraphRag => write!(f, "graphrag"),
            Self::Planning => write!(f, "planning"),
            Self::Mission => write!(f, "mission"),
            Self::Other(s) => write!(f, "{s}"),
        }
    }
}

// ---------------------------------------------------------------------------
// TrajectoryStep
// ---------------------------------------------------------------------------

/// One timestamped action record. Immutable once appended to a trajectory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryStep {
    /// What kind of action this was.
    pub kind: StepKind,

    /// Action name (tool name, model name, finding title, ...).
    pub name: String,

    /// Input payload of the action (tool arguments, prompt, ...).
    pub input: Value,

    /// Output payload, if the action succeeded.
    pub output: Option<Value>,

    /// Error message, if the action failed.
    pub error: Option<String>,

    /// When the action started.
    pub start_time: DateTime<Utc>,

    /// Wall-clock duration of the action in milliseconds.
    pub duration_ms: u64,
}

impl TrajectoryStep {
    /// Create a step starting now with the given kind and name.
    pub fn new(kind: StepKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            input: Value::Null,
            output: None,
            error: None,
            start_time: Utc::now(),
            duration_ms: 0,
        }
    }

    /// Attach an input payload.
    pub fn with_input(mut self, input: Value) -> Self {
        self.input = input;
        self
    }

    /// Attach an output payload.
    pub fn with_output(mut self, output: Value) -> Self {
        self.output = Some(output);
        self
    }

    /// Attach an error message.
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Set the recorded duration.
    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    /// The step's input interpreted as a tool-argument map, if it is an
    /// object. Non-object inputs (including `null`) yield `None`.
    pub fn argument_map(&self) -> Option<&serde_json::Map<String, Value>> {
        self.input.as_object()
    }
}

// ---------------------------------------------------------------------------
// Trajectory
// ---------------------------------------------------------------------------

/// The ordered log of one agent execution.
///
/// Owned exclusively by one trajectory store; everything handed to scorers
/// is a snapshot (deep copy) with a materialized `end_time`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trajectory {
    /// Steps in append order. Append order is authoritative -- wall-clock
    /// start times may interleave under concurrency.
    pub steps: Vec<TrajectoryStep>,

    /// When recording started.
    pub start_time: DateTime<Utc>,

    /// When the snapshot was taken, or when the run finished.
    pub end_time: Option<DateTime<Utc>>,
}

impl Trajectory {
    /// Create an empty trajectory starting now.
    pub fn new() -> Self {
        Self {
            steps: Vec::new(),
            start_time: Utc::now(),
            end_time: None,
        }
    }

    /// Number of recorded steps.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether no steps have been recorded.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// All steps that are tool invocations, in append order.
    pub fn tool_calls(&self) -> Vec<&TrajectoryStep> {
        self.steps
            .iter()
            .filter(|s| s.kind == StepKind::Tool)
            .collect()
    }

    /// All steps that are submitted findings, in append order.
    pub fn findings(&self) -> Vec<&TrajectoryStep> {
        self.steps
            .iter()
            .filter(|s| s.kind == StepKind::Finding)
            .collect()
    }
}

impl Default for Trajectory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_step_kind_string_roundtrip() {
        for (kind, repr) in [
            (StepKind::Tool, "tool"),
            (StepKind::Llm, "llm"),
            (StepKind::Finding, "finding"),
            (StepKind::memory("store"), "memory.store"),
            (StepKind::memory(""), "memory"),
            (StepKind::Other("custom".into()), "custom"),
        ] {
            assert_eq!(kind.to_string(), repr);
            assert_eq!(StepKind::from(repr.to_string()), kind);
        }
    }

    #[test]
    fn test_step_kind_serde_uses_string_repr() {
        let json = serde_json::to_string(&StepKind::memory("recall")).unwrap();
        assert_eq!(json, "\"memory.recall\"");

        let kind: StepKind = serde_json::from_str("\"graphrag\"").unwrap();
        assert_eq!(kind, StepKind::GraphRag);
    }

    #[test]
    fn test_memory_kind_wildcard_matching() {
        let any_memory = StepKind::memory("");
        assert!(any_memory.matches(&StepKind::memory("store")));
        assert!(StepKind::memory("store").matches(&any_memory));
        assert!(!StepKind::memory("store").matches(&StepKind::memory("recall")));
        assert!(!any_memory.matches(&StepKind::Tool));
    }

    #[test]
    fn test_step_builder() {
        let step = TrajectoryStep::new(StepKind::Tool, "nmap")
            .with_input(json!({"target": "10.0.0.1"}))
            .with_output(json!({"open_ports": [22, 80]}))
            .with_duration_ms(1_500);

        assert_eq!(step.name, "nmap");
        assert_eq!(step.duration_ms, 1_500);
        assert!(step.error.is_none());
        assert_eq!(
            step.argument_map().unwrap().get("target").unwrap(),
            &json!("10.0.0.1")
        );
    }

    #[test]
    fn test_trajectory_filters() {
        let mut trajectory = Trajectory::new();
        trajectory.steps.push(TrajectoryStep::new(StepKind::Tool, "nmap"));
        trajectory
            .steps
            .push(TrajectoryStep::new(StepKind::Llm, "analyze"));
        trajectory
            .steps
            .push(TrajectoryStep::new(StepKind::Finding, "open-redirect"));
        trajectory.steps.push(TrajectoryStep::new(StepKind::Tool, "nuclei"));

        assert_eq!(trajectory.len(), 4);
        assert_eq!(trajectory.tool_calls().len(), 2);
        assert_eq!(trajectory.findings().len(), 1);
        assert_eq!(trajectory.tool_calls()[1].name, "nuclei");
    }
}

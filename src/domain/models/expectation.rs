//! Expected-behavior specification types.
//!
//! These are the immutable configuration an agent run is judged against:
//! which steps should appear, which tools should be called (and with what
//! arguments), and which findings should be reported. Loaded from eval-set
//! files by external tooling; the engine only consumes them.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::trajectory::{StepKind, TrajectoryStep};

/// Ordering semantics for sequence matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    /// Position-wise comparison; any misalignment invalidates the position.
    Exact,
    /// Order-free greedy matching; each expected item claims the first
    /// unclaimed actual item that matches it.
    Subset,
    /// Forward-only cursor matching; relative order of matched items is
    /// enforced, interleaved noise is tolerated (reported as extra).
    OrderedSubset,
}

impl MatchMode {
    /// Stable string form used in score details.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Subset => "subset",
            Self::OrderedSubset => "ordered_subset",
        }
    }
}

/// One expected step in a behavioral specification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpectedStep {
    /// Expected step kind.
    pub kind: StepKind,

    /// Expected name. Empty means wildcard: any name of the right kind.
    #[serde(default)]
    pub name: String,

    /// Whether this step must appear for the run to score fully.
    #[serde(default = "default_required")]
    pub required: bool,
}

impl ExpectedStep {
    /// A required expected step.
    pub fn required(kind: StepKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            required: true,
        }
    }

    /// An optional expected step.
    pub fn optional(kind: StepKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            required: false,
        }
    }

    /// Whether an actual step satisfies this expectation.
    ///
    /// Kind must match (memory wildcarding per [`StepKind::matches`]); an
    /// empty expected name matches any actual name.
    pub fn matches(&self, actual: &TrajectoryStep) -> bool {
        self.kind.matches(&actual.kind) && (self.name.is_empty() || self.name == actual.name)
    }
}

/// One expected tool invocation, optionally constraining arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpectedToolCall {
    /// Expected tool name. Empty means any tool.
    #[serde(default)]
    pub name: String,

    /// Whether this call must appear.
    #[serde(default = "default_required")]
    pub required: bool,

    /// Argument constraints. Every listed key must be present in the actual
    /// call with an equal value (numeric tolerance applies); actual calls
    /// may carry additional arguments.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Map<String, Value>>,
}

impl ExpectedToolCall {
    /// A required call of the named tool with no argument constraints.
    pub fn required(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            required: true,
            arguments: None,
        }
    }

    /// An optional call of the named tool.
    pub fn optional(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            required: false,
            arguments: None,
        }
    }

    /// Attach argument constraints.
    pub fn with_arguments(mut self, arguments: Map<String, Value>) -> Self {
        self.arguments = Some(arguments);
        self
    }

    /// Whether an actual tool name satisfies this expectation.
    pub fn name_matches(&self, actual_name: &str) -> bool {
        self.name.is_empty() || self.name == actual_name
    }
}

/// One expected finding (vulnerability, insight) the agent should report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpectedFinding {
    /// Expected finding name. Empty means any finding.
    #[serde(default)]
    pub name: String,

    /// Whether this finding must be reported.
    #[serde(default = "default_required")]
    pub required: bool,
}

impl ExpectedFinding {
    /// A required finding with the given name.
    pub fn required(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            required: true,
        }
    }

    /// Whether an actual finding step satisfies this expectation.
    ///
    /// Matching is case-insensitive on the name, since finding titles are
    /// free text produced by a model.
    pub fn matches(&self, actual: &TrajectoryStep) -> bool {
        actual.kind == StepKind::Finding
            && (self.name.is_empty() || self.name.eq_ignore_ascii_case(&actual.name))
    }
}

fn default_required() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expected_step_wildcard_name() {
        let any_tool = ExpectedStep::required(StepKind::Tool, "");
        assert!(any_tool.matches(&TrajectoryStep::new(StepKind::Tool, "nmap")));
        assert!(any_tool.matches(&TrajectoryStep::new(StepKind::Tool, "sqlmap")));
        assert!(!any_tool.matches(&TrajectoryStep::new(StepKind::Llm, "nmap")));
    }

    #[test]
    fn test_expected_step_named() {
        let nmap = ExpectedStep::required(StepKind::Tool, "nmap");
        assert!(nmap.matches(&TrajectoryStep::new(StepKind::Tool, "nmap")));
        assert!(!nmap.matches(&TrajectoryStep::new(StepKind::Tool, "nuclei")));
    }

    #[test]
    fn test_expected_finding_case_insensitive() {
        let expected = ExpectedFinding::required("SQL Injection");
        assert!(expected.matches(&TrajectoryStep::new(StepKind::Finding, "sql injection")));
        assert!(!expected.matches(&TrajectoryStep::new(StepKind::Finding, "xss")));
        // Kind must be Finding even for wildcard names.
        let any = ExpectedFinding {
            name: String::new(),
            required: true,
        };
        assert!(!any.matches(&TrajectoryStep::new(StepKind::Tool, "nmap")));
    }

    #[test]
    fn test_required_defaults_when_deserializing() {
        let step: ExpectedStep = serde_json::from_str(r#"{"kind": "tool", "name": "nmap"}"#).unwrap();
        assert!(step.required);

        let call: ExpectedToolCall = serde_json::from_str(r#"{"name": "nmap"}"#).unwrap();
        assert!(call.required);
        assert!(call.arguments.is_none());
    }

    #[test]
    fn test_match_mode_as_str() {
        assert_eq!(MatchMode::Exact.as_str(), "exact");
        assert_eq!(MatchMode::Subset.as_str(), "subset");
        assert_eq!(MatchMode::OrderedSubset.as_str(), "ordered_subset");
    }
}

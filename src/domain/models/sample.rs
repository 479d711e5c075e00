//! Evaluation samples and model-call messages.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::trajectory::Trajectory;

/// The unit a whole-trajectory [`Scorer`](crate::domain::ports::Scorer)
/// evaluates: one named agent run with its recorded trajectory.
///
/// The streaming adapter builds synthetic samples from partial trajectory
/// snapshots so that non-streaming scorers can participate in streaming
/// evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalSample {
    /// Unique identifier, shared with exported partial scores as trace id.
    pub id: Uuid,

    /// Human-readable sample name (eval case name, task title, ...).
    pub name: String,

    /// The recorded trajectory being evaluated.
    pub trajectory: Trajectory,

    /// Free-form metadata (tags, target, eval-set origin).
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl EvalSample {
    /// Create a sample with a fresh id and empty metadata.
    pub fn new(name: impl Into<String>, trajectory: Trajectory) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            trajectory,
            metadata: Map::new(),
        }
    }
}

/// One message in a model call, the surface feedback injection touches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Message role: system, user, assistant.
    pub role: String,

    /// Message text.
    pub content: String,
}

impl ChatMessage {
    /// A system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    /// A user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_new() {
        let sample = EvalSample::new("sql-injection-basic", Trajectory::new());
        assert_eq!(sample.name, "sql-injection-basic");
        assert!(sample.trajectory.is_empty());
        assert!(sample.metadata.is_empty());
    }

    #[test]
    fn test_chat_message_roles() {
        assert_eq!(ChatMessage::system("hi").role, "system");
        assert_eq!(ChatMessage::user("hi").role, "user");
    }
}

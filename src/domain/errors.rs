//! Domain errors for the Vigil evaluation engine.

use thiserror::Error;

/// Format a list of scorer failures as `name: reason; name: reason`.
fn format_failures(failures: &[(String, String)]) -> String {
    failures
        .iter()
        .map(|(name, reason)| format!("{name}: {reason}"))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Domain-level errors that can occur during evaluation.
#[derive(Debug, Error)]
pub enum EvalError {
    #[error("No scorers configured for dispatch")]
    NoScorersConfigured,

    #[error("All {} scorers failed: {}", .0.len(), format_failures(.0))]
    AllScorersFailed(Vec<(String, String)>),

    #[error("Invalid score {value} from {source_name}: scores must be finite and within [0, 1]")]
    InvalidScore { source_name: String, value: f64 },

    #[error("Scorer {scorer} timed out after {timeout_ms}ms")]
    ScorerTimeout { scorer: String, timeout_ms: u64 },

    #[error("Shutdown did not complete within {timeout_ms}ms")]
    ShutdownTimedOut { timeout_ms: u64 },

    #[error("Export failed: {0}")]
    ExportFailed(String),

    #[error("Sink error: {0}")]
    SinkError(String),

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

/// Convenience result alias for domain operations.
pub type EvalResult<T> = Result<T, EvalError>;

impl From<serde_json::Error> for EvalError {
    fn from(err: serde_json::Error) -> Self {
        EvalError::SerializationError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_scorers_failed_message() {
        let err = EvalError::AllScorersFailed(vec![
            ("tool_usage".into(), "timed out".into()),
            ("trajectory".into(), "channel closed".into()),
        ]);
        let msg = err.to_string();
        assert!(msg.contains("All 2 scorers failed"));
        assert!(msg.contains("tool_usage: timed out"));
        assert!(msg.contains("trajectory: channel closed"));
    }

    #[test]
    fn test_invalid_score_message() {
        let err = EvalError::InvalidScore {
            source_name: "finding_accuracy".into(),
            value: 1.7,
        };
        assert!(err.to_string().contains("1.7"));
        assert!(err.to_string().contains("finding_accuracy"));
    }
}

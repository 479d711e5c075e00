//! Score, feedback and alert types.
//!
//! Two result shapes exist: [`ScoreResult`] for complete-trajectory
//! evaluation, and [`PartialScore`] for streaming evaluation of a growing
//! trajectory. A partial score carries a **confidence** expressing how
//! trustworthy the score is given incomplete data -- independent of the
//! score itself -- plus a status and a recommended action.
//!
//! A [`Feedback`] is the aggregate of one dispatch cycle: per-scorer partial
//! scores, one overall partial score, and any threshold [`Alert`]s. Once
//! handed out it is a value, never mutated by the dispatcher again.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::domain::errors::{EvalError, EvalResult};

/// Reject scores that are NaN, infinite or outside `[0, 1]`.
///
/// Validation is explicit wherever a score is finalized; silent clamping is
/// reserved for the one place it is an intentional design choice (the
/// matcher's extra-step penalty application).
pub fn validate_score(source_name: &str, value: f64) -> EvalResult<f64> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(EvalError::InvalidScore {
            source_name: source_name.to_string(),
            value,
        })
    }
}

// ---------------------------------------------------------------------------
// ScoreResult
// ---------------------------------------------------------------------------

/// Result of evaluating a complete trajectory once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreResult {
    /// Score in `[0, 1]`.
    pub score: f64,

    /// Scorer-specific detail map (counts, matched names, ...).
    #[serde(default)]
    pub details: Map<String, Value>,
}

impl ScoreResult {
    /// Create a result with an empty detail map.
    pub fn new(score: f64) -> Self {
        Self {
            score,
            details: Map::new(),
        }
    }

    /// Attach a detail entry.
    pub fn with_detail(mut self, key: impl Into<String>, value: Value) -> Self {
        self.details.insert(key.into(), value);
        self
    }
}

// ---------------------------------------------------------------------------
// ScoreStatus / RecommendedAction
// ---------------------------------------------------------------------------

/// Lifecycle status of a streaming evaluation.
///
/// Progresses monotonically `Pending -> Partial -> Complete` per scorer
/// within one trajectory's lifetime; it never regresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreStatus {
    /// Not enough data to evaluate yet.
    Pending,
    /// Evaluated against an incomplete trajectory.
    Partial,
    /// Evaluation reflects the full expected behavior.
    Complete,
}

impl ScoreStatus {
    /// Stable string form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Partial => "partial",
            Self::Complete => "complete",
        }
    }
}

impl std::fmt::Display for ScoreStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What the agent should do in response to an evaluation.
///
/// Severity order is fixed and structural: `Continue < Adjust < Reconsider
/// < Abort`. The derived `Ord` encodes it, so "highest-severity action"
/// is simply `max()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendedAction {
    /// Current approach looks fine; keep going.
    Continue,
    /// Minor course correction advised.
    Adjust,
    /// The approach has likely diverged; reconsider it.
    Reconsider,
    /// Stop: continuing is unlikely to be productive.
    Abort,
}

impl RecommendedAction {
    /// Stable string form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Continue => "continue",
            Self::Adjust => "adjust",
            Self::Reconsider => "reconsider",
            Self::Abort => "abort",
        }
    }
}

impl std::fmt::Display for RecommendedAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ---------------------------------------------------------------------------
// PartialScore
// ---------------------------------------------------------------------------

/// Result of a streaming evaluation over a possibly incomplete trajectory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartialScore {
    /// Score in `[0, 1]`.
    pub score: f64,

    /// How trustworthy the score is given the data seen so far, in `[0, 1]`.
    pub confidence: f64,

    /// Lifecycle status of this evaluation.
    pub status: ScoreStatus,

    /// Recommended agent action.
    pub action: RecommendedAction,

    /// Human-readable feedback for the agent.
    #[serde(default)]
    pub feedback: String,

    /// Scorer-specific detail map.
    #[serde(default)]
    pub details: Map<String, Value>,
}

impl PartialScore {
    /// A pending score: no usable signal yet.
    pub fn pending(feedback: impl Into<String>) -> Self {
        Self {
            score: 0.0,
            confidence: 0.0,
            status: ScoreStatus::Pending,
            action: RecommendedAction::Continue,
            feedback: feedback.into(),
            details: Map::new(),
        }
    }

    /// Create a partial score with the given numbers, defaulting to
    /// `Partial`/`Continue` with empty feedback.
    pub fn new(score: f64, confidence: f64) -> Self {
        Self {
            score,
            confidence,
            status: ScoreStatus::Partial,
            action: RecommendedAction::Continue,
            feedback: String::new(),
            details: Map::new(),
        }
    }

    /// Set the status.
    pub fn with_status(mut self, status: ScoreStatus) -> Self {
        self.status = status;
        self
    }

    /// Set the recommended action.
    pub fn with_action(mut self, action: RecommendedAction) -> Self {
        self.action = action;
        self
    }

    /// Set the feedback text.
    pub fn with_feedback(mut self, feedback: impl Into<String>) -> Self {
        self.feedback = feedback.into();
        self
    }

    /// Attach a detail entry.
    pub fn with_detail(mut self, key: impl Into<String>, value: Value) -> Self {
        self.details.insert(key.into(), value);
        self
    }

    /// Whether this score is confident enough to drive decisions.
    ///
    /// The 0.5 cut-off is shared by aggregation, action selection and
    /// alerting: low-confidence scores contribute to fallback averages but
    /// never trigger alerts or override actions.
    pub fn is_confident(&self) -> bool {
        self.confidence > 0.5
    }
}

// ---------------------------------------------------------------------------
// Alerts
// ---------------------------------------------------------------------------

/// Severity of a threshold alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertLevel {
    /// Score fell below the warning threshold.
    Warning,
    /// Score fell below the critical threshold.
    Critical,
}

impl AlertLevel {
    /// Stable string form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Warning => "warning",
            Self::Critical => "critical",
        }
    }
}

impl std::fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One threshold breach detected during aggregation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    /// Breach severity.
    pub level: AlertLevel,

    /// Name of the breaching scorer; empty for the overall score.
    #[serde(default)]
    pub scorer: String,

    /// The score that breached.
    pub score: f64,

    /// The threshold that was breached.
    pub threshold: f64,

    /// Human-readable description.
    pub message: String,

    /// Action recommended in response to this breach.
    pub action: RecommendedAction,
}

// ---------------------------------------------------------------------------
// Feedback
// ---------------------------------------------------------------------------

/// The aggregate product of one dispatch cycle.
///
/// `consumed` flips exactly once, on the first successful destructive read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feedback {
    /// Unique identifier for this feedback object.
    pub id: Uuid,

    /// When the dispatch cycle completed.
    pub timestamp: DateTime<Utc>,

    /// Trajectory length at the time the snapshot was taken.
    pub step_index: usize,

    /// Per-scorer partial scores, keyed by scorer name. A `BTreeMap` keeps
    /// iteration (and therefore formatting and alert order) deterministic.
    pub scores: BTreeMap<String, PartialScore>,

    /// Aggregated overall partial score.
    pub overall: PartialScore,

    /// Threshold alerts, overall first, then per-scorer in name order.
    pub alerts: Vec<Alert>,

    /// Whether a destructive read has already returned this feedback.
    pub consumed: bool,
}

impl Feedback {
    /// Create a feedback object for a completed dispatch cycle.
    pub fn new(
        step_index: usize,
        scores: BTreeMap<String, PartialScore>,
        overall: PartialScore,
        alerts: Vec<Alert>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            step_index,
            scores,
            overall,
            alerts,
            consumed: false,
        }
    }

    /// The most severe alert level present, if any alerts exist.
    pub fn max_alert_level(&self) -> Option<AlertLevel> {
        self.alerts.iter().map(|a| a.level).max()
    }
}

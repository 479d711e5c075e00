//! Vigil - Streaming Trajectory Evaluation
//!
//! Vigil scores the behavior of a running AI agent while it runs: every tool
//! call, completion, finding and memory operation is recorded into a
//! trajectory, periodically evaluated by a set of scorers, and turned into
//! actionable feedback (scores, alerts, a recommended action) the agent can
//! consume mid-run instead of after the fact.
//!
//! # Architecture
//!
//! This crate follows Clean Architecture / Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain`): Trajectory and score models, pure matching
//!   logic, and the scorer/sink ports
//! - **Service Layer** (`services`): Scorers, the parallel feedback
//!   dispatcher, and the stateful feedback harness
//! - **Infrastructure Layer** (`infrastructure`): Configuration loading and
//!   logger setup
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use vigil::{
//!     ExpectedToolCall, FeedbackDispatcher, FeedbackHarness, HarnessConfig,
//!     ToolUsageScorer, TrajectoryStore,
//! };
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let store = Arc::new(TrajectoryStore::new());
//!     let scorer = Arc::new(ToolUsageScorer::new(vec![
//!         ExpectedToolCall::required("nmap"),
//!         ExpectedToolCall::required("nuclei"),
//!     ]));
//!     let dispatcher = FeedbackDispatcher::new(vec![scorer], Default::default());
//!     let harness = FeedbackHarness::new(store, dispatcher, HarnessConfig::default());
//!
//!     // record_step() as the agent acts, get_feedback() between turns
//!     harness.shutdown().await?;
//!     Ok(())
//! }
//! ```

pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::errors::{EvalError, EvalResult};
pub use domain::matching::{
    match_steps, match_tool_calls, StepMatchReport, ToolMatchOptions, ToolMatchReport,
};
pub use domain::models::{
    Alert, AlertLevel, ChatMessage, DispatchConfig, EvalSample, ExpectedFinding, ExpectedStep,
    ExpectedToolCall, Feedback, FeedbackFrequency, HarnessConfig, MatchMode, PartialScore,
    RecommendedAction, ScoreResult, ScoreStatus, StepKind, ThresholdConfig, Trajectory,
    TrajectoryStep, VigilConfig,
};
pub use domain::ports::{ResultSink, ScoreExporter, Scorer, StreamingScorer};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{
    format_feedback, FeedbackDispatcher, FeedbackHarness, FindingAccuracyScorer, StreamingAdapter,
    ToolUsageScorer, TrajectoryScorer, TrajectoryStore,
};

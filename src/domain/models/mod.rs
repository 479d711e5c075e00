//! Domain models: trajectories, expectations, scores, and policy config.

pub mod config;
pub mod expectation;
pub mod sample;
pub mod score;
pub mod trajectory;

pub use config::{
    DispatchConfig, FeedbackFrequency, FeedbackSettings, HarnessConfig, LoggingConfig,
    ThresholdConfig, VigilConfig,
};
pub use expectation::{ExpectedFinding, ExpectedStep, ExpectedToolCall, MatchMode};
pub use sample::{ChatMessage, EvalSample};
pub use score::{
    validate_score, Alert, AlertLevel, Feedback, PartialScore, RecommendedAction, ScoreResult,
    ScoreStatus,
};
pub use trajectory::{StepKind, Trajectory, TrajectoryStep};

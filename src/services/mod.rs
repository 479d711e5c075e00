//! Service layer: evaluation logic over the domain types.
//!
//! The [`trajectory_store::TrajectoryStore`] records what the agent does,
//! [`scorers`] judge it, the [`dispatcher::FeedbackDispatcher`] runs all
//! scorers in parallel and aggregates, and the [`harness::FeedbackHarness`]
//! owns the whole loop for a live run.

pub mod dispatcher;
pub mod harness;
pub mod scorers;
pub mod trajectory_store;

pub use dispatcher::FeedbackDispatcher;
pub use harness::{format_feedback, FeedbackHarness};
pub use scorers::{FindingAccuracyScorer, StreamingAdapter, ToolUsageScorer, TrajectoryScorer};
pub use trajectory_store::TrajectoryStore;

//! Scoring strategies.
//!
//! Native streaming scorers ([`ToolUsageScorer`], [`TrajectoryScorer`],
//! [`FindingAccuracyScorer`]) implement mode-specific partial logic directly:
//! they know where in the expected sequence the run currently is, which lets
//! them produce precise feedback text and an early `Reconsider` on prefix
//! divergence. Anything else is promoted with [`StreamingAdapter`].

pub mod finding;
pub mod streaming_adapter;
pub mod tool_usage;
pub mod trajectory;

pub use finding::FindingAccuracyScorer;
pub use streaming_adapter::StreamingAdapter;
pub use tool_usage::ToolUsageScorer;
pub use trajectory::TrajectoryScorer;

use crate::domain::models::RecommendedAction;

/// The shared score-to-action rule for streaming scorers.
///
/// Below 0.5 confidence there is not enough signal to recommend anything
/// but continuing. With sufficient confidence, a score under 0.3 means the
/// approach has likely diverged and under 0.5 means it needs adjustment.
pub(crate) fn recommend_action(score: f64, confidence: f64) -> RecommendedAction {
    if confidence < 0.5 {
        RecommendedAction::Continue
    } else if score < 0.3 {
        RecommendedAction::Reconsider
    } else if score < 0.5 {
        RecommendedAction::Adjust
    } else {
        RecommendedAction::Continue
    }
}

//! Scorer port traits.
//!
//! A [`Scorer`] evaluates a finished trajectory once. A [`StreamingScorer`]
//! additionally evaluates a growing, possibly incomplete trajectory and must
//! never assume completeness. Scoring strategies that can reason about where
//! in the expected sequence the run currently is implement `StreamingScorer`
//! natively; anything else can be promoted with
//! [`StreamingAdapter`](crate::services::scorers::StreamingAdapter).

use async_trait::async_trait;

use crate::domain::errors::EvalResult;
use crate::domain::models::{EvalSample, PartialScore, ScoreResult, Trajectory};

/// Evaluates one complete agent run.
#[async_trait]
pub trait Scorer: Send + Sync {
    /// Stable scorer name, used as the key in feedback score maps.
    fn name(&self) -> &str;

    /// Evaluate a finished sample, producing a score in `[0, 1]`.
    async fn score(&self, sample: &EvalSample) -> EvalResult<ScoreResult>;
}

/// Evaluates a growing trajectory while the agent is still running.
#[async_trait]
pub trait StreamingScorer: Scorer {
    /// Evaluate a partial trajectory snapshot.
    ///
    /// Implementations must tolerate any prefix of a run, including an empty
    /// one, and express data sufficiency through the returned confidence and
    /// status rather than by erroring.
    async fn score_partial(&self, trajectory: &Trajectory) -> EvalResult<PartialScore>;

    /// Whether this scorer produces meaningful partial results. Defaults to
    /// `true`; adapters around batch-only scorers may report reduced fidelity
    /// through confidence instead.
    fn supports_streaming(&self) -> bool {
        true
    }
}

//! Adapter that promotes a whole-trajectory scorer into a streaming one.
//!
//! The adapter cannot know where in the expected sequence the run currently
//! is -- only native streaming scorers can. What it can do is evaluate the
//! partial trajectory as if it were complete and discount the confidence by
//! how little data has accumulated: a fixed low confidence (0.3) below the
//! minimum step count, then a decay-from-full ramp that reaches the
//! configured weight three steps past the minimum.

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::errors::EvalResult;
use crate::domain::models::{
    validate_score, EvalSample, PartialScore, ScoreResult, ScoreStatus, Trajectory,
};
use crate::domain::ports::{Scorer, StreamingScorer};

use super::recommend_action;

/// Confidence reported before the minimum step count is reached.
const PENDING_CONFIDENCE: f64 = 0.3;

/// Steps past the minimum at which confidence reaches the full weight.
const RAMP_STEPS: usize = 3;

/// Promotes any [`Scorer`] into a [`StreamingScorer`] via confidence decay.
pub struct StreamingAdapter {
    inner: Arc<dyn Scorer>,
    min_steps_for_eval: usize,
    partial_score_weight: f64,
}

impl StreamingAdapter {
    /// Wrap a scorer with the default minimum of 3 steps and a 0.8 partial
    /// score weight.
    pub fn new(inner: Arc<dyn Scorer>) -> Self {
        Self {
            inner,
            min_steps_for_eval: 3,
            partial_score_weight: 0.8,
        }
    }

    /// Set the minimum step count before delegating to the inner scorer.
    pub fn with_min_steps(mut self, min_steps_for_eval: usize) -> Self {
        self.min_steps_for_eval = min_steps_for_eval;
        self
    }

    /// Set the confidence ceiling for partial evaluations.
    pub fn with_partial_score_weight(mut self, weight: f64) -> Self {
        self.partial_score_weight = weight;
        self
    }

    /// Confidence for a trajectory of the given length: the configured
    /// weight, reduced 10% per step short of `min + RAMP_STEPS`, up to 30%.
    fn confidence_for(&self, step_count: usize) -> f64 {
        let beyond_minimum = step_count.saturating_sub(self.min_steps_for_eval);
        let deficit = RAMP_STEPS.saturating_sub(beyond_minimum);
        self.partial_score_weight * (1.0 - 0.1 * deficit as f64)
    }
}

#[async_trait]
impl Scorer for StreamingAdapter {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn score(&self, sample: &EvalSample) -> EvalResult<ScoreResult> {
        self.inner.score(sample).await
    }
}

#[async_trait]
impl StreamingScorer for StreamingAdapter {
    async fn score_partial(&self, trajectory: &Trajectory) -> EvalResult<PartialScore> {
        if trajectory.len() < self.min_steps_for_eval {
            return Ok(PartialScore {
                score: 0.0,
                confidence: PENDING_CONFIDENCE,
                status: ScoreStatus::Pending,
                action: crate::domain::models::RecommendedAction::Continue,
                feedback: format!(
                    "Waiting for at least {} steps before evaluating",
                    self.min_steps_for_eval
                ),
                details: serde_json::Map::new(),
            });
        }

        // Evaluate the partial trajectory as a synthetic complete sample.
        let sample = EvalSample::new(format!("partial:{}", self.inner.name()), trajectory.clone());
        let result = self.inner.score(&sample).await?;
        let score = validate_score(self.inner.name(), result.score)?;

        let confidence = self.confidence_for(trajectory.len());

        Ok(PartialScore {
            score,
            confidence,
            status: ScoreStatus::Partial,
            action: recommend_action(score, confidence),
            feedback: String::new(),
            details: result.details,
        })
    }
}

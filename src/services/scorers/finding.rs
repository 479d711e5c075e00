//! Finding-accuracy scorer.
//!
//! Judges the findings an agent reports against the findings the eval case
//! expects. Order is irrelevant -- what matters is that the expected
//! findings appear and that the agent does not flood the report with
//! unexpected ones (false positives, penalized per configured weight).

use async_trait::async_trait;
use serde_json::json;

use crate::domain::errors::EvalResult;
use crate::domain::models::{
    validate_score, EvalSample, ExpectedFinding, PartialScore, ScoreResult, ScoreStatus,
    Trajectory, TrajectoryStep,
};
use crate::domain::ports::{Scorer, StreamingScorer};

use super::recommend_action;

/// Scores reported findings against expectations.
pub struct FindingAccuracyScorer {
    expected: Vec<ExpectedFinding>,
    penalize_unexpected: f64,
}

impl FindingAccuracyScorer {
    /// Create a scorer with no false-positive penalty.
    pub fn new(expected: Vec<ExpectedFinding>) -> Self {
        Self {
            expected,
            penalize_unexpected: 0.0,
        }
    }

    /// Set the per-unexpected-finding score penalty.
    pub fn with_unexpected_penalty(mut self, penalty: f64) -> Self {
        self.penalize_unexpected = penalty;
        self
    }

    /// Greedy order-free matching of findings, mirroring subset-mode step
    /// matching: each expectation claims the first unclaimed finding.
    fn evaluate(&self, findings: &[&TrajectoryStep]) -> (usize, usize, usize) {
        let total_required = self.expected.iter().filter(|e| e.required).count();
        let mut claimed = vec![false; findings.len()];
        let mut matched_required = 0;

        for exp in &self.expected {
            let found = findings
                .iter()
                .enumerate()
                .find(|(i, step)| !claimed[*i] && exp.matches(step))
                .map(|(i, _)| i);
            if let Some(i) = found {
                claimed[i] = true;
                if exp.required {
                    matched_required += 1;
                }
            }
        }

        let unexpected = claimed.iter().filter(|taken| !**taken).count();
        (matched_required, total_required, unexpected)
    }

    fn score_value(&self, matched: usize, total: usize, unexpected: usize) -> f64 {
        let base = if total == 0 {
            1.0
        } else {
            matched as f64 / total as f64
        };
        (base - unexpected as f64 * self.penalize_unexpected).clamp(0.0, 1.0)
    }
}

#[async_trait]
impl Scorer for FindingAccuracyScorer {
    fn name(&self) -> &str {
        "finding_accuracy"
    }

    async fn score(&self, sample: &EvalSample) -> EvalResult<ScoreResult> {
        let findings = sample.trajectory.findings();
        let (matched, total, unexpected) = self.evaluate(&findings);
        let score = validate_score(self.name(), self.score_value(matched, total, unexpected))?;

        Ok(ScoreResult::new(score)
            .with_detail("matched_count", json!(matched))
            .with_detail("total_required", json!(total))
            .with_detail("unexpected_count", json!(unexpected)))
    }
}

#[async_trait]
impl StreamingScorer for FindingAccuracyScorer {
    async fn score_partial(&self, trajectory: &Trajectory) -> EvalResult<PartialScore> {
        if self.expected.is_empty() {
            return Ok(PartialScore::new(1.0, 1.0)
                .with_status(ScoreStatus::Complete)
                .with_feedback("No finding expectations configured"));
        }

        let findings = trajectory.findings();
        if findings.is_empty() {
            // Findings typically arrive late in a run; their absence early
            // on is not a signal either way.
            return Ok(PartialScore::pending("No findings reported yet"));
        }

        let (matched, total, unexpected) = self.evaluate(&findings);
        let score = validate_score(self.name(), self.score_value(matched, total, unexpected))?;
        let confidence = if total == 0 {
            1.0
        } else {
            matched as f64 / total as f64
        };

        let status = if matched == total {
            ScoreStatus::Complete
        } else {
            ScoreStatus::Partial
        };

        Ok(PartialScore::new(score, confidence)
            .with_status(status)
            .with_action(recommend_action(score, confidence))
            .with_feedback(format!(
                "Reported {matched}/{total} expected findings ({unexpected} unexpected)"
            ))
            .with_detail("matched_count", json!(matched))
            .with_detail("total_required", json!(total))
            .with_detail("unexpected_count", json!(unexpected)))
    }
}

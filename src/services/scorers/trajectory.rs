//! Whole-sequence trajectory scorer.
//!
//! Judges every recorded step (tools, completions, findings, memory ops)
//! against an expected step sequence under one of the three ordering modes.
//! Confidence tracks how much of the expected sequence has been consumed, so
//! early low scores read as "not enough signal" rather than "failing".

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::domain::errors::EvalResult;
use crate::domain::matching::{match_steps, StepMatchReport};
use crate::domain::models::{
    validate_score, EvalSample, ExpectedStep, MatchMode, PartialScore, ScoreResult, ScoreStatus,
    Trajectory,
};
use crate::domain::ports::{Scorer, StreamingScorer};

use super::recommend_action;

/// Scores the full step sequence against an expected specification.
pub struct TrajectoryScorer {
    expected: Vec<ExpectedStep>,
    mode: MatchMode,
    penalize_extra: f64,
}

impl TrajectoryScorer {
    /// Create a scorer with no extra-step penalty.
    pub fn new(expected: Vec<ExpectedStep>, mode: MatchMode) -> Self {
        Self {
            expected,
            mode,
            penalize_extra: 0.0,
        }
    }

    /// Set the per-extra-step score penalty (subset modes only; exact mode
    /// already treats misaligned steps as mismatches).
    pub fn with_extra_penalty(mut self, penalize_extra: f64) -> Self {
        self.penalize_extra = penalize_extra;
        self
    }

    fn effective_penalty(&self) -> f64 {
        match self.mode {
            MatchMode::Exact => 0.0,
            MatchMode::Subset | MatchMode::OrderedSubset => self.penalize_extra,
        }
    }

    fn details(&self, report: &StepMatchReport) -> Vec<(String, Value)> {
        let missing: Vec<String> = report
            .missing
            .iter()
            .map(|&i| {
                let exp = &self.expected[i];
                format!("{}:{}", exp.kind, exp.name)
            })
            .collect();
        vec![
            ("mode".into(), json!(self.mode.as_str())),
            ("matched_count".into(), json!(report.matched.len())),
            ("total_required".into(), json!(report.total_required)),
            ("missing_steps".into(), json!(missing)),
            ("extra_count".into(), json!(report.extra.len())),
        ]
    }

    fn feedback_text(&self, report: &StepMatchReport) -> String {
        if report.all_required_matched() {
            if report.extra.is_empty() {
                "Trajectory matches the expected sequence".to_string()
            } else {
                format!(
                    "All required steps present, with {} unexpected step(s)",
                    report.extra.len()
                )
            }
        } else {
            format!(
                "Matched {}/{} required steps ({} extra)",
                report.matched_required,
                report.total_required,
                report.extra.len()
            )
        }
    }
}

#[async_trait]
impl Scorer for TrajectoryScorer {
    fn name(&self) -> &str {
        "trajectory"
    }

    async fn score(&self, sample: &EvalSample) -> EvalResult<ScoreResult> {
        let report = match_steps(&self.expected, &sample.trajectory.steps, self.mode);
        let score = validate_score(self.name(), report.score(self.effective_penalty()))?;

        let mut result = ScoreResult::new(score);
        for (key, value) in self.details(&report) {
            result.details.insert(key, value);
        }
        Ok(result)
    }
}

#[async_trait]
impl StreamingScorer for TrajectoryScorer {
    async fn score_partial(&self, trajectory: &Trajectory) -> EvalResult<PartialScore> {
        if self.expected.is_empty() {
            return Ok(PartialScore::new(1.0, 1.0)
                .with_status(ScoreStatus::Complete)
                .with_feedback("No step expectations configured"));
        }
        if trajectory.is_empty() {
            return Ok(PartialScore::pending("No steps recorded yet"));
        }

        let report = match_steps(&self.expected, &trajectory.steps, self.mode);
        let score = validate_score(self.name(), report.score(self.effective_penalty()))?;

        // Confidence is the consumed fraction of the expectation: extras do
        // not advance it, missing steps hold it down.
        let confidence = report.base_score();

        let status = if report.all_required_matched() {
            ScoreStatus::Complete
        } else {
            ScoreStatus::Partial
        };

        let mut partial = PartialScore::new(score, confidence)
            .with_status(status)
            .with_action(recommend_action(score, confidence))
            .with_feedback(self.feedback_text(&report));
        for (key, value) in self.details(&report) {
            partial.details.insert(key, value);
        }
        Ok(partial)
    }
}

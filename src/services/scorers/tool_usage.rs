//! Tool-correctness scorer.
//!
//! Judges the tools an agent invokes against an expected call sequence. In
//! ordered mode the expectation is a prefix: the actual sequence must match
//! from the start, and the first divergence triggers an immediate
//! `Reconsider` regardless of thresholds -- that is the point of streaming
//! tool scoring, catching the wrong tool as early as possible.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::domain::errors::EvalResult;
use crate::domain::matching::{match_tool_calls, ToolMatchOptions, ToolMatchReport};
use crate::domain::models::{
    validate_score, EvalSample, ExpectedToolCall, PartialScore, RecommendedAction, ScoreResult,
    ScoreStatus, Trajectory,
};
use crate::domain::ports::{Scorer, StreamingScorer};

use super::recommend_action;

/// Scores tool usage against an expected call sequence.
pub struct ToolUsageScorer {
    expected: Vec<ExpectedToolCall>,
    options: ToolMatchOptions,
}

impl ToolUsageScorer {
    /// Create an ordered (prefix-matching) tool scorer.
    pub fn new(expected: Vec<ExpectedToolCall>) -> Self {
        Self {
            expected,
            options: ToolMatchOptions::default(),
        }
    }

    /// Create an order-free tool scorer.
    pub fn unordered(expected: Vec<ExpectedToolCall>) -> Self {
        Self {
            expected,
            options: ToolMatchOptions {
                ordered: false,
                ..Default::default()
            },
        }
    }

    /// Set the numeric argument tolerance.
    pub fn with_numeric_tolerance(mut self, tolerance: f64) -> Self {
        self.options.numeric_tolerance = tolerance;
        self
    }

    fn evaluate(&self, trajectory: &Trajectory) -> (ToolMatchReport, usize) {
        let calls = trajectory.tool_calls();
        let report = match_tool_calls(&self.expected, &calls, &self.options);
        (report, calls.len())
    }

    fn details(&self, report: &ToolMatchReport, call_count: usize) -> Vec<(String, Value)> {
        let missing: Vec<&str> = report
            .missing
            .iter()
            .map(|&i| self.expected[i].name.as_str())
            .collect();
        vec![
            ("matched_count".into(), json!(report.matched.len())),
            ("total_required".into(), json!(report.total_required)),
            ("missing_tools".into(), json!(missing)),
            ("extra_count".into(), json!(report.extra.len())),
            ("call_count".into(), json!(call_count)),
            ("ordered".into(), json!(self.options.ordered)),
            ("diverged_at".into(), json!(report.diverged_at)),
        ]
    }

    fn feedback_text(&self, report: &ToolMatchReport) -> String {
        if let Some(position) = report.diverged_at {
            let expected_name = self
                .expected
                .get(position)
                .map_or("(none)", |c| c.name.as_str());
            return format!(
                "Tool sequence diverged at call {}: expected {expected_name}",
                position + 1
            );
        }
        if report.all_required_matched() {
            return format!(
                "All {} expected tool calls observed",
                report.total_required
            );
        }
        let next = report
            .matched
            .len()
            .min(self.expected.len().saturating_sub(1));
        format!(
            "Matched {}/{} expected tool calls; next expected: {}",
            report.matched_required,
            report.total_required,
            self.expected[next].name
        )
    }
}

#[async_trait]
impl Scorer for ToolUsageScorer {
    fn name(&self) -> &str {
        "tool_usage"
    }

    async fn score(&self, sample: &EvalSample) -> EvalResult<ScoreResult> {
        let (report, call_count) = self.evaluate(&sample.trajectory);
        let score = validate_score(self.name(), report.base_score())?;

        let mut result = ScoreResult::new(score);
        for (key, value) in self.details(&report, call_count) {
            result.details.insert(key, value);
        }
        Ok(result)
    }
}

#[async_trait]
impl StreamingScorer for ToolUsageScorer {
    async fn score_partial(&self, trajectory: &Trajectory) -> EvalResult<PartialScore> {
        if self.expected.is_empty() {
            return Ok(PartialScore::new(1.0, 1.0)
                .with_status(ScoreStatus::Complete)
                .with_feedback("No tool expectations configured"));
        }

        let (report, call_count) = self.evaluate(trajectory);
        if call_count == 0 {
            return Ok(PartialScore::pending("No tool calls recorded yet"));
        }

        let score = validate_score(self.name(), report.base_score())?;
        let confidence = (call_count as f64 / self.expected.len() as f64).min(1.0);

        let status = if report.all_required_matched() || call_count >= self.expected.len() {
            ScoreStatus::Complete
        } else {
            ScoreStatus::Partial
        };

        // A prefix divergence is a concrete wrong-tool signal; it overrides
        // the threshold-based action rule.
        let action = if self.options.ordered && report.diverged_at.is_some() {
            RecommendedAction::Reconsider
        } else {
            recommend_action(score, confidence)
        };

        let mut partial = PartialScore::new(score, confidence)
            .with_status(status)
            .with_action(action)
            .with_feedback(self.feedback_text(&report));
        for (key, value) in self.details(&report, call_count) {
            partial.details.insert(key, value);
        }
        Ok(partial)
    }
}

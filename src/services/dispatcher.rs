//! Feedback dispatcher: parallel scorer fan-out and aggregation.
//!
//! One dispatch cycle takes a trajectory snapshot, runs every configured
//! streaming scorer concurrently (each bounded by the per-dispatch timeout),
//! and folds the surviving partial scores into a single [`Feedback`]:
//! overall score, confidence, status, recommended action, and threshold
//! alerts. Individual scorer failures are recorded, not fatal; only a full
//! wipeout fails the cycle.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::json;
use tokio::task::JoinSet;
use uuid::Uuid;

use crate::domain::errors::{EvalError, EvalResult};
use crate::domain::models::{
    validate_score, Alert, AlertLevel, DispatchConfig, Feedback, PartialScore, RecommendedAction,
    ScoreStatus, ThresholdConfig, Trajectory,
};
use crate::domain::ports::{ScoreExporter, StreamingScorer};

/// Fans one trajectory snapshot out to N scorers and aggregates the results.
pub struct FeedbackDispatcher {
    scorers: Vec<Arc<dyn StreamingScorer>>,
    config: DispatchConfig,
    exporter: Option<Arc<dyn ScoreExporter>>,
    /// Trace id shared with the exporter across this run's cycles.
    trace_id: Uuid,
}

impl FeedbackDispatcher {
    /// Create a dispatcher over the given scorers.
    pub fn new(scorers: Vec<Arc<dyn StreamingScorer>>, config: DispatchConfig) -> Self {
        Self {
            scorers,
            config,
            exporter: None,
            trace_id: Uuid::new_v4(),
        }
    }

    /// Attach a real-time partial-score exporter.
    pub fn with_exporter(mut self, exporter: Arc<dyn ScoreExporter>) -> Self {
        self.exporter = Some(exporter);
        self
    }

    /// Number of configured scorers.
    pub fn scorer_count(&self) -> usize {
        self.scorers.len()
    }

    /// Run one dispatch cycle against a trajectory snapshot.
    ///
    /// `step_index` is the trajectory length at snapshot time; it is carried
    /// on the resulting [`Feedback`] so consumers can tell which state of
    /// the run it describes.
    pub async fn evaluate(
        &self,
        trajectory: &Trajectory,
        step_index: usize,
    ) -> EvalResult<Feedback> {
        if self.scorers.is_empty() {
            return Err(EvalError::NoScorersConfigured);
        }

        let mut tasks: JoinSet<(String, Result<PartialScore, String>)> = JoinSet::new();
        for scorer in &self.scorers {
            let scorer = Arc::clone(scorer);
            let snapshot = trajectory.clone();
            let timeout = self.config.timeout;
            tasks.spawn(async move {
                let name = scorer.name().to_string();
                let outcome = match tokio::time::timeout(timeout, scorer.score_partial(&snapshot))
                    .await
                {
                    Ok(Ok(partial)) => Ok(partial),
                    Ok(Err(err)) => Err(err.to_string()),
                    Err(_) => Err(EvalError::ScorerTimeout {
                        scorer: name.clone(),
                        timeout_ms: timeout.as_millis() as u64,
                    }
                    .to_string()),
                };
                (name, outcome)
            });
        }

        let mut scores: BTreeMap<String, PartialScore> = BTreeMap::new();
        let mut failures: Vec<(String, String)> = Vec::new();

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((name, Ok(partial))) => {
                    // Scores are validated where they are finalized; a bad
                    // value demotes the scorer to a recorded failure.
                    match validate_partial(&name, &partial) {
                        Ok(()) => {
                            scores.insert(name, partial);
                        }
                        Err(err) => failures.push((name, err.to_string())),
                    }
                }
                Ok((name, Err(reason))) => {
                    tracing::warn!(scorer = %name, error = %reason, "Scorer failed during dispatch");
                    failures.push((name, reason));
                }
                Err(join_err) => {
                    tracing::warn!(error = %join_err, "Scorer task panicked or was cancelled");
                    failures.push(("unknown".to_string(), join_err.to_string()));
                }
            }
        }

        if scores.is_empty() {
            return Err(EvalError::AllScorersFailed(failures));
        }

        if let Some(exporter) = &self.exporter {
            for (name, partial) in &scores {
                if let Err(err) = exporter
                    .export_partial_score(self.trace_id, name, partial)
                    .await
                {
                    tracing::debug!(scorer = %name, error = %err, "Partial score export failed");
                }
            }
        }

        let overall = aggregate(&scores, &failures, &self.config.thresholds);
        let alerts = collect_alerts(&scores, &overall, &self.config.thresholds);

        tracing::debug!(
            step_index,
            overall_score = overall.score,
            overall_confidence = overall.confidence,
            action = %overall.action,
            alert_count = alerts.len(),
            "Dispatch cycle complete"
        );

        Ok(Feedback::new(step_index, scores, overall, alerts))
    }
}

fn validate_partial(name: &str, partial: &PartialScore) -> EvalResult<()> {
    validate_score(name, partial.score)?;
    // Label the confidence check so the recorded failure names the field
    // that was out of range, not just the scorer.
    validate_score(&format!("{name}.confidence"), partial.confidence)?;
    Ok(())
}

/// Fold per-scorer partial scores into the overall partial score.
fn aggregate(
    scores: &BTreeMap<String, PartialScore>,
    failures: &[(String, String)],
    thresholds: &ThresholdConfig,
) -> PartialScore {
    let confident: Vec<&PartialScore> = scores.values().filter(|s| s.is_confident()).collect();

    // Overall score: mean of confident scores, falling back to the mean of
    // everything available when no scorer is confident yet.
    let score = if confident.is_empty() {
        mean(scores.values().map(|s| s.score))
    } else {
        mean(confident.iter().map(|s| s.score))
    };

    let confidence = mean(scores.values().map(|s| s.confidence));

    let status = if scores.values().all(|s| s.status == ScoreStatus::Complete) {
        ScoreStatus::Complete
    } else if scores.values().any(|s| s.status == ScoreStatus::Partial) {
        ScoreStatus::Partial
    } else {
        ScoreStatus::Pending
    };

    // Overall action: most severe confident recommendation; a confident
    // Abort is already the maximum. Without any confident scorer, derive
    // the action from where the overall score sits against the thresholds.
    let action = confident
        .iter()
        .map(|s| s.action)
        .max()
        .unwrap_or_else(|| threshold_action(score, thresholds));

    let feedback = summarize(scores, confident.len());

    let mut overall = PartialScore::new(score, confidence)
        .with_status(status)
        .with_action(action)
        .with_feedback(feedback)
        .with_detail("confident_count", json!(confident.len()));
    if !failures.is_empty() {
        let failed: Vec<_> = failures
            .iter()
            .map(|(name, reason)| json!({"scorer": name, "error": reason}))
            .collect();
        overall = overall.with_detail("failed_scorers", json!(failed));
    }
    overall
}

fn threshold_action(score: f64, thresholds: &ThresholdConfig) -> RecommendedAction {
    if score < thresholds.critical {
        RecommendedAction::Reconsider
    } else if score < thresholds.warning {
        RecommendedAction::Adjust
    } else {
        RecommendedAction::Continue
    }
}

/// One alert per threshold breach: the overall score first, then each
/// confident scorer, in name order (the map's iteration order).
fn collect_alerts(
    scores: &BTreeMap<String, PartialScore>,
    overall: &PartialScore,
    thresholds: &ThresholdConfig,
) -> Vec<Alert> {
    let mut alerts = Vec::new();

    if let Some(alert) = breach_alert("", overall.score, thresholds) {
        alerts.push(alert);
    }
    for (name, partial) in scores {
        if !partial.is_confident() {
            continue;
        }
        if let Some(alert) = breach_alert(name, partial.score, thresholds) {
            alerts.push(alert);
        }
    }
    alerts
}

fn breach_alert(scorer: &str, score: f64, thresholds: &ThresholdConfig) -> Option<Alert> {
    let subject = if scorer.is_empty() {
        "Overall score".to_string()
    } else {
        format!("Scorer {scorer}")
    };
    if score < thresholds.critical {
        Some(Alert {
            level: AlertLevel::Critical,
            scorer: scorer.to_string(),
            score,
            threshold: thresholds.critical,
            message: format!(
                "{subject} {score:.2} is below the critical threshold {:.2}",
                thresholds.critical
            ),
            action: RecommendedAction::Reconsider,
        })
    } else if score < thresholds.warning {
        Some(Alert {
            level: AlertLevel::Warning,
            scorer: scorer.to_string(),
            score,
            threshold: thresholds.warning,
            message: format!(
                "{subject} {score:.2} is below the warning threshold {:.2}",
                thresholds.warning
            ),
            action: RecommendedAction::Adjust,
        })
    } else {
        None
    }
}

fn summarize(scores: &BTreeMap<String, PartialScore>, confident_count: usize) -> String {
    let lowest = scores
        .iter()
        .min_by(|a, b| {
            a.1.score
                .partial_cmp(&b.1.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .map(|(name, partial)| format!("{name} at {:.2}", partial.score));

    match lowest {
        Some(lowest) => format!(
            "{confident_count}/{} scorers confident; lowest: {lowest}",
            scores.len()
        ),
        None => String::new(),
    }
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let mut sum = 0.0;
    let mut count = 0usize;
    for value in values {
        sum += value;
        count += 1;
    }
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use crate::domain::models::{EvalSample, ScoreResult};
    use crate::domain::ports::Scorer;

    /// A scripted streaming scorer for dispatcher tests.
    struct ScriptedScorer {
        name: String,
        partial: EvalResult<PartialScore>,
        delay: Duration,
    }

    impl ScriptedScorer {
        fn ok(name: &str, partial: PartialScore) -> Arc<dyn StreamingScorer> {
            Arc::new(Self {
                name: name.to_string(),
                partial: Ok(partial),
                delay: Duration::ZERO,
            })
        }

        fn failing(name: &str) -> Arc<dyn StreamingScorer> {
            Arc::new(Self {
                name: name.to_string(),
                partial: Err(EvalError::ValidationFailed("boom".into())),
                delay: Duration::ZERO,
            })
        }

        fn slow(name: &str, delay: Duration) -> Arc<dyn StreamingScorer> {
            Arc::new(Self {
                name: name.to_string(),
                partial: Ok(PartialScore::new(0.9, 0.9)),
                delay,
            })
        }
    }

    #[async_trait]
    impl Scorer for ScriptedScorer {
        fn name(&self) -> &str {
            &self.name
        }

        async fn score(&self, _sample: &EvalSample) -> EvalResult<ScoreResult> {
            Ok(ScoreResult::new(0.5))
        }
    }

    #[async_trait]
    impl StreamingScorer for ScriptedScorer {
        async fn score_partial(&self, _trajectory: &Trajectory) -> EvalResult<PartialScore> {
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            match &self.partial {
                Ok(partial) => Ok(partial.clone()),
                Err(_) => Err(EvalError::ValidationFailed("boom".into())),
            }
        }
    }

    fn dispatcher(scorers: Vec<Arc<dyn StreamingScorer>>) -> FeedbackDispatcher {
        FeedbackDispatcher::new(scorers, DispatchConfig::default())
    }

    /// An exporter whose sink is always unreachable, counting attempts.
    struct UnreachableExporter {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ScoreExporter for UnreachableExporter {
        async fn export_partial_score(
            &self,
            _trace_id: Uuid,
            _scorer_name: &str,
            _score: &PartialScore,
        ) -> EvalResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(EvalError::ExportFailed("sink unreachable".into()))
        }
    }

    #[tokio::test]
    async fn test_empty_scorer_set_rejected() {
        let dispatcher = dispatcher(Vec::new());
        let err = dispatcher.evaluate(&Trajectory::new(), 0).await.unwrap_err();
        assert!(matches!(err, EvalError::NoScorersConfigured));
    }

    #[tokio::test]
    async fn test_overall_score_prefers_confident_scorers() {
        let dispatcher = dispatcher(vec![
            ScriptedScorer::ok("confident", PartialScore::new(0.8, 0.9)),
            ScriptedScorer::ok("unsure", PartialScore::new(0.1, 0.2)),
        ]);

        let feedback = dispatcher.evaluate(&Trajectory::new(), 4).await.unwrap();
        // Only the confident scorer contributes to the overall score.
        assert!((feedback.overall.score - 0.8).abs() < 1e-9);
        // Confidence averages everyone.
        assert!((feedback.overall.confidence - 0.55).abs() < 1e-9);
        assert_eq!(feedback.step_index, 4);
    }

    #[tokio::test]
    async fn test_overall_falls_back_to_all_scores() {
        let dispatcher = dispatcher(vec![
            ScriptedScorer::ok("a", PartialScore::new(0.2, 0.3)),
            ScriptedScorer::ok("b", PartialScore::new(0.6, 0.4)),
        ]);

        let feedback = dispatcher.evaluate(&Trajectory::new(), 1).await.unwrap();
        assert!((feedback.overall.score - 0.4).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_overall_score_within_contributor_bounds() {
        let dispatcher = dispatcher(vec![
            ScriptedScorer::ok("a", PartialScore::new(0.3, 0.9)),
            ScriptedScorer::ok("b", PartialScore::new(0.7, 0.9)),
            ScriptedScorer::ok("c", PartialScore::new(0.5, 0.9)),
        ]);

        let feedback = dispatcher.evaluate(&Trajectory::new(), 1).await.unwrap();
        assert!(feedback.overall.score >= 0.3 && feedback.overall.score <= 0.7);
    }

    #[tokio::test]
    async fn test_partial_failure_recorded_not_fatal() {
        let dispatcher = dispatcher(vec![
            ScriptedScorer::ok("good", PartialScore::new(0.9, 0.9)),
            ScriptedScorer::failing("bad"),
        ]);

        let feedback = dispatcher.evaluate(&Trajectory::new(), 1).await.unwrap();
        assert_eq!(feedback.scores.len(), 1);
        let failed = feedback.overall.details["failed_scorers"].as_array().unwrap();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0]["scorer"], "bad");
    }

    #[tokio::test]
    async fn test_all_failures_fatal() {
        let dispatcher = dispatcher(vec![
            ScriptedScorer::failing("a"),
            ScriptedScorer::failing("b"),
        ]);

        let err = dispatcher.evaluate(&Trajectory::new(), 1).await.unwrap_err();
        match err {
            EvalError::AllScorersFailed(failures) => assert_eq!(failures.len(), 2),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_timeout_counts_as_failure() {
        let config = DispatchConfig {
            timeout: Duration::from_millis(20),
            ..Default::default()
        };
        let dispatcher = FeedbackDispatcher::new(
            vec![
                ScriptedScorer::ok("fast", PartialScore::new(0.6, 0.9)),
                ScriptedScorer::slow("slow", Duration::from_secs(30)),
            ],
            config,
        );

        let feedback = dispatcher.evaluate(&Trajectory::new(), 1).await.unwrap();
        assert!(feedback.scores.contains_key("fast"));
        assert!(!feedback.scores.contains_key("slow"));
        let failed = feedback.overall.details["failed_scorers"].as_array().unwrap();
        assert!(failed[0]["error"].as_str().unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn test_invalid_score_demoted_to_failure() {
        let dispatcher = dispatcher(vec![
            ScriptedScorer::ok("good", PartialScore::new(0.6, 0.9)),
            ScriptedScorer::ok("broken", PartialScore::new(1.5, 0.9)),
        ]);

        let feedback = dispatcher.evaluate(&Trajectory::new(), 1).await.unwrap();
        assert!(!feedback.scores.contains_key("broken"));
        assert!(feedback.overall.details.contains_key("failed_scorers"));
    }

    #[tokio::test]
    async fn test_invalid_confidence_failure_names_the_field() {
        let dispatcher = dispatcher(vec![
            ScriptedScorer::ok("good", PartialScore::new(0.6, 0.9)),
            ScriptedScorer::ok("broken", PartialScore::new(0.5, 1.5)),
        ]);

        let feedback = dispatcher.evaluate(&Trajectory::new(), 1).await.unwrap();
        assert!(!feedback.scores.contains_key("broken"));
        let failed = feedback.overall.details["failed_scorers"].as_array().unwrap();
        let error = failed[0]["error"].as_str().unwrap();
        // The failure must point at the confidence field, not the score.
        assert!(error.contains("broken.confidence"));
    }

    #[tokio::test]
    async fn test_export_failures_do_not_affect_feedback() {
        let exporter = Arc::new(UnreachableExporter {
            calls: AtomicUsize::new(0),
        });
        let dispatcher = dispatcher(vec![
            ScriptedScorer::ok("a", PartialScore::new(0.8, 0.9)),
            ScriptedScorer::ok("b", PartialScore::new(0.6, 0.9)),
        ])
        .with_exporter(Arc::clone(&exporter) as Arc<dyn ScoreExporter>);

        let feedback = dispatcher.evaluate(&Trajectory::new(), 2).await.unwrap();
        // Export is best effort: every score survives and nothing is
        // demoted to a failure.
        assert_eq!(feedback.scores.len(), 2);
        assert!((feedback.overall.score - 0.7).abs() < 1e-9);
        assert!(!feedback.overall.details.contains_key("failed_scorers"));
        // One attempt per surviving scorer.
        assert_eq!(exporter.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_status_aggregation() {
        let all_complete = dispatcher(vec![
            ScriptedScorer::ok(
                "a",
                PartialScore::new(0.9, 0.9).with_status(ScoreStatus::Complete),
            ),
            ScriptedScorer::ok(
                "b",
                PartialScore::new(0.8, 0.9).with_status(ScoreStatus::Complete),
            ),
        ]);
        let feedback = all_complete.evaluate(&Trajectory::new(), 1).await.unwrap();
        assert_eq!(feedback.overall.status, ScoreStatus::Complete);

        let mixed = dispatcher(vec![
            ScriptedScorer::ok(
                "a",
                PartialScore::new(0.9, 0.9).with_status(ScoreStatus::Complete),
            ),
            ScriptedScorer::ok("b", PartialScore::new(0.8, 0.9)),
        ]);
        let feedback = mixed.evaluate(&Trajectory::new(), 1).await.unwrap();
        assert_eq!(feedback.overall.status, ScoreStatus::Partial);

        let all_pending = dispatcher(vec![ScriptedScorer::ok(
            "a",
            PartialScore::pending("waiting"),
        )]);
        let feedback = all_pending.evaluate(&Trajectory::new(), 1).await.unwrap();
        assert_eq!(feedback.overall.status, ScoreStatus::Pending);
    }

    #[tokio::test]
    async fn test_confident_abort_overrides_everything() {
        let dispatcher = dispatcher(vec![
            ScriptedScorer::ok(
                "calm",
                PartialScore::new(0.9, 0.9).with_action(RecommendedAction::Continue),
            ),
            ScriptedScorer::ok(
                "alarmed",
                PartialScore::new(0.05, 0.9).with_action(RecommendedAction::Abort),
            ),
        ]);

        let feedback = dispatcher.evaluate(&Trajectory::new(), 1).await.unwrap();
        assert_eq!(feedback.overall.action, RecommendedAction::Abort);
    }

    #[tokio::test]
    async fn test_unconfident_severe_action_ignored() {
        let dispatcher = dispatcher(vec![
            ScriptedScorer::ok(
                "confident",
                PartialScore::new(0.9, 0.9).with_action(RecommendedAction::Continue),
            ),
            ScriptedScorer::ok(
                "guessing",
                PartialScore::new(0.1, 0.2).with_action(RecommendedAction::Abort),
            ),
        ]);

        let feedback = dispatcher.evaluate(&Trajectory::new(), 1).await.unwrap();
        assert_eq!(feedback.overall.action, RecommendedAction::Continue);
    }

    #[tokio::test]
    async fn test_threshold_derived_action_without_confident_scorers() {
        let dispatcher = dispatcher(vec![ScriptedScorer::ok(
            "unsure",
            PartialScore::new(0.2, 0.3),
        )]);

        let feedback = dispatcher.evaluate(&Trajectory::new(), 1).await.unwrap();
        // 0.2 < critical 0.3 -> Reconsider, derived from the overall score.
        assert_eq!(feedback.overall.action, RecommendedAction::Reconsider);
    }

    #[tokio::test]
    async fn test_alerts_overall_first_then_scorers_in_name_order() {
        let dispatcher = dispatcher(vec![
            ScriptedScorer::ok("zeta", PartialScore::new(0.1, 0.9)),
            ScriptedScorer::ok("alpha", PartialScore::new(0.4, 0.9)),
        ]);

        let feedback = dispatcher.evaluate(&Trajectory::new(), 1).await.unwrap();
        // Overall = mean(0.1, 0.4) = 0.25 -> critical.
        assert_eq!(feedback.alerts.len(), 3);
        assert_eq!(feedback.alerts[0].scorer, "");
        assert_eq!(feedback.alerts[0].level, AlertLevel::Critical);
        assert_eq!(feedback.alerts[1].scorer, "alpha");
        assert_eq!(feedback.alerts[1].level, AlertLevel::Warning);
        assert_eq!(feedback.alerts[2].scorer, "zeta");
        assert_eq!(feedback.alerts[2].level, AlertLevel::Critical);
    }

    #[tokio::test]
    async fn test_unconfident_scorers_do_not_alert() {
        let dispatcher = dispatcher(vec![
            ScriptedScorer::ok("fine", PartialScore::new(0.9, 0.9)),
            ScriptedScorer::ok("unsure", PartialScore::new(0.1, 0.2)),
        ]);

        let feedback = dispatcher.evaluate(&Trajectory::new(), 1).await.unwrap();
        assert!(feedback.alerts.is_empty());
    }
}

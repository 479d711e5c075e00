//! Stateful feedback harness.
//!
//! Sits between the running agent and the dispatcher: records trajectory
//! steps, decides when a new dispatch cycle is due (step cadence, debounce,
//! threshold re-arm), and runs cycles on a background worker fed by a
//! bounded queue. Evaluation never blocks the agent: when the queue is full
//! the request is dropped, since a fresher snapshot is always coming.
//!
//! Feedback flows out three ways: destructive reads ([`FeedbackHarness::get_feedback`]),
//! non-destructive peeks, and optional auto-injection of the formatted text
//! into an outgoing chat prompt.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{mpsc, watch, RwLock};
use tokio::task::JoinHandle;

use crate::domain::errors::{EvalError, EvalResult};
use crate::domain::models::{ChatMessage, Feedback, HarnessConfig, Trajectory, TrajectoryStep};
use crate::services::dispatcher::FeedbackDispatcher;
use crate::services::trajectory_store::TrajectoryStore;

/// One queued evaluation request: a trajectory snapshot and its length.
struct EvalRequest {
    snapshot: Trajectory,
    step_index: usize,
}

#[derive(Default)]
struct HarnessState {
    /// Latest unconsumed feedback, replaced wholesale by each cycle.
    pending: Option<Feedback>,
    /// Every feedback produced during this run, oldest first.
    history: Vec<Feedback>,
    /// Steps recorded since the last evaluation was enqueued.
    steps_since_eval: u32,
    /// When the last evaluation was enqueued; debounce measures from here.
    last_enqueued: Option<Instant>,
    /// Set when the last cycle raised alerts; re-arms out-of-cadence
    /// evaluation on the next step when `on_threshold` is enabled.
    threshold_breached: bool,
}

/// Drives streaming evaluation of a live trajectory.
pub struct FeedbackHarness {
    store: Arc<TrajectoryStore>,
    config: HarnessConfig,
    state: Arc<RwLock<HarnessState>>,
    queue_tx: std::sync::Mutex<Option<mpsc::Sender<EvalRequest>>>,
    cancel_tx: watch::Sender<bool>,
    worker: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl FeedbackHarness {
    /// Create a harness and spawn its evaluation worker.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(
        store: Arc<TrajectoryStore>,
        dispatcher: FeedbackDispatcher,
        config: HarnessConfig,
    ) -> Self {
        let (queue_tx, queue_rx) = mpsc::channel(config.queue_depth.max(1));
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let state = Arc::new(RwLock::new(HarnessState::default()));

        let worker = tokio::spawn(run_worker(
            dispatcher,
            queue_rx,
            cancel_rx,
            Arc::clone(&state),
        ));

        Self {
            store,
            config,
            state,
            queue_tx: std::sync::Mutex::new(Some(queue_tx)),
            cancel_tx,
            worker: std::sync::Mutex::new(Some(worker)),
        }
    }

    /// The trajectory store this harness records into.
    pub fn store(&self) -> &Arc<TrajectoryStore> {
        &self.store
    }

    /// Record one trajectory step and enqueue an evaluation if one is due.
    pub async fn record_step(&self, step: TrajectoryStep) {
        self.store.append(step);

        let mut state = self.state.write().await;
        state.steps_since_eval += 1;

        let cadence_due = state.steps_since_eval >= self.config.frequency.every_n_steps;
        let threshold_due = self.config.frequency.on_threshold && state.threshold_breached;
        if !cadence_due && !threshold_due {
            return;
        }

        let debounced = state
            .last_enqueued
            .is_some_and(|at| at.elapsed() < self.config.frequency.debounce);
        if debounced {
            return;
        }

        let snapshot = self.store.snapshot();
        let step_index = snapshot.len();
        let request = EvalRequest {
            snapshot,
            step_index,
        };

        let sent = {
            let guard = match self.queue_tx.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            match guard.as_ref() {
                Some(tx) => tx.try_send(request).is_ok(),
                None => false,
            }
        };

        if sent {
            state.steps_since_eval = 0;
            state.last_enqueued = Some(Instant::now());
            state.threshold_breached = false;
        } else {
            // Full or closed queue: drop the request, a later step will
            // carry a fresher snapshot anyway.
            tracing::debug!(step_index, "Evaluation queue unavailable, dropping request");
        }
    }

    /// Destructively read the pending feedback.
    ///
    /// Returns `None` if nothing is pending or it was already consumed. The
    /// history copy is marked consumed too.
    pub async fn get_feedback(&self) -> Option<Feedback> {
        let mut state = self.state.write().await;
        let mut feedback = state.pending.take()?;
        feedback.consumed = true;
        if let Some(entry) = state.history.iter_mut().find(|f| f.id == feedback.id) {
            entry.consumed = true;
        }
        Some(feedback)
    }

    /// Read the pending feedback without consuming it.
    pub async fn peek_feedback(&self) -> Option<Feedback> {
        self.state.read().await.pending.clone()
    }

    /// All feedback produced during this run, oldest first.
    pub async fn history(&self) -> Vec<Feedback> {
        self.state.read().await.history.clone()
    }

    /// Prepend pending feedback to an outgoing prompt as a system message.
    ///
    /// Only active when `auto_inject` is configured. Injection does not
    /// consume the feedback; an explicit `get_feedback` still returns it.
    pub async fn inject_feedback(&self, messages: &mut Vec<ChatMessage>) {
        if !self.config.auto_inject {
            return;
        }
        let state = self.state.read().await;
        if let Some(feedback) = &state.pending {
            messages.insert(0, ChatMessage::system(format_feedback(feedback)));
        }
    }

    /// Stop the worker, waiting up to the configured shutdown timeout.
    pub async fn shutdown(&self) -> EvalResult<()> {
        let _ = self.cancel_tx.send(true);
        // Dropping the sender lets the worker drain and observe channel
        // closure even if the watch signal races.
        if let Ok(mut guard) = self.queue_tx.lock() {
            guard.take();
        }

        let handle = match self.worker.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        let Some(handle) = handle else {
            return Ok(());
        };

        match tokio::time::timeout(self.config.shutdown_timeout, handle).await {
            Ok(_) => Ok(()),
            Err(_) => Err(EvalError::ShutdownTimedOut {
                timeout_ms: self.config.shutdown_timeout.as_millis() as u64,
            }),
        }
    }
}

async fn run_worker(
    dispatcher: FeedbackDispatcher,
    mut queue_rx: mpsc::Receiver<EvalRequest>,
    mut cancel_rx: watch::Receiver<bool>,
    state: Arc<RwLock<HarnessState>>,
) {
    loop {
        let request = tokio::select! {
            changed = cancel_rx.changed() => {
                // A dropped sender means the harness is gone.
                if changed.is_err() || *cancel_rx.borrow() {
                    break;
                }
                continue;
            }
            request = queue_rx.recv() => match request {
                Some(request) => request,
                None => break,
            },
        };

        match dispatcher
            .evaluate(&request.snapshot, request.step_index)
            .await
        {
            Ok(feedback) => {
                let mut state = state.write().await;
                state.threshold_breached = !feedback.alerts.is_empty();
                state.history.push(feedback.clone());
                state.pending = Some(feedback);
            }
            Err(err) => {
                // Evaluation is advisory; a failed cycle never takes the
                // harness down.
                tracing::warn!(step_index = request.step_index, error = %err, "Evaluation cycle failed");
            }
        }
    }
}

/// Render a feedback object as agent-facing text.
pub fn format_feedback(feedback: &Feedback) -> String {
    use std::fmt::Write;

    let mut out = String::new();
    let _ = writeln!(
        out,
        "=== Evaluation Feedback (step {}) ===",
        feedback.step_index
    );
    let _ = writeln!(
        out,
        "Overall score: {:.2} (confidence {:.2}, {})",
        feedback.overall.score, feedback.overall.confidence, feedback.overall.status
    );
    let _ = writeln!(out, "Recommended action: {}", feedback.overall.action);
    if !feedback.overall.feedback.is_empty() {
        let _ = writeln!(out, "{}", feedback.overall.feedback);
    }

    if !feedback.alerts.is_empty() {
        let _ = writeln!(out, "Alerts:");
        for alert in &feedback.alerts {
            let _ = writeln!(out, "  [{}] {}", alert.level, alert.message);
        }
    }

    if !feedback.scores.is_empty() {
        let _ = writeln!(out, "Scorer breakdown:");
        for (name, partial) in &feedback.scores {
            let _ = write!(
                out,
                "  {name}: {:.2} (confidence {:.2}, {})",
                partial.score, partial.confidence, partial.status
            );
            if partial.feedback.is_empty() {
                let _ = writeln!(out);
            } else {
                let _ = writeln!(out, ": {}", partial.feedback);
            }
        }
    }

    let guidance = match feedback.overall.action {
        crate::domain::models::RecommendedAction::Continue => {
            "The current approach is on track. Continue."
        }
        crate::domain::models::RecommendedAction::Adjust => {
            "Make minor adjustments to better match the expected approach."
        }
        crate::domain::models::RecommendedAction::Reconsider => {
            "The current approach has likely diverged from what is expected. Reconsider the plan."
        }
        crate::domain::models::RecommendedAction::Abort => {
            "Stop the current approach. Continuing is unlikely to be productive."
        }
    };
    let _ = write!(out, "Guidance: {guidance}");
    out
}

//! Append-only, thread-safe trajectory store.
//!
//! The store is the only resource in the engine mutated concurrently from
//! multiple call sites: every instrumented agent operation appends a step.
//! A single mutex guards the log; step order is lock-acquisition order, and
//! readers only ever receive deep-copy snapshots, so they never observe a
//! half-written step.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use chrono::Utc;
use serde_json::Value;

use crate::domain::models::{StepKind, Trajectory, TrajectoryStep};

/// Thread-safe append-only log of one agent run's actions.
#[derive(Debug)]
pub struct TrajectoryStore {
    inner: Mutex<Trajectory>,
}

impl TrajectoryStore {
    /// Create an empty store starting now.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Trajectory::new()),
        }
    }

    // Steps are plain data; a poisoned lock still guards a valid log.
    fn lock(&self) -> MutexGuard<'_, Trajectory> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a step. O(1) amortized; first to acquire the lock wins the
    /// earlier position. Never loses an entry under concurrent callers.
    pub fn append(&self, step: TrajectoryStep) {
        self.lock().steps.push(step);
    }

    /// Return a defensive deep copy with `end_time` materialized to now.
    pub fn snapshot(&self) -> Trajectory {
        let mut copy = self.lock().clone();
        copy.end_time = Some(Utc::now());
        copy
    }

    /// Clear all steps and restart the trajectory clock.
    pub fn reset(&self) {
        *self.lock() = Trajectory::new();
    }

    /// Number of recorded steps.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no steps have been recorded.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // -- recorder conveniences ---------------------------------------------
    //
    // The instrumentation wrapper's contract is to call through to the
    // wrapped component and append one step per operation; these helpers
    // build the step shapes it needs.

    /// Record a tool invocation.
    pub fn record_tool_call(
        &self,
        name: impl Into<String>,
        input: Value,
        output: Result<Value, String>,
        started: Instant,
    ) {
        let mut step = TrajectoryStep::new(StepKind::Tool, name)
            .with_input(input)
            .with_duration_ms(started.elapsed().as_millis() as u64);
        match output {
            Ok(value) => step = step.with_output(value),
            Err(error) => step = step.with_error(error),
        }
        self.append(step);
    }

    /// Record a model completion call.
    pub fn record_completion(
        &self,
        model: impl Into<String>,
        input: Value,
        output: Result<Value, String>,
        started: Instant,
    ) {
        let mut step = TrajectoryStep::new(StepKind::Llm, model)
            .with_input(input)
            .with_duration_ms(started.elapsed().as_millis() as u64);
        match output {
            Ok(value) => step = step.with_output(value),
            Err(error) => step = step.with_error(error),
        }
        self.append(step);
    }

    /// Record a submitted finding.
    pub fn record_finding(&self, title: impl Into<String>, detail: Value) {
        self.append(TrajectoryStep::new(StepKind::Finding, title).with_input(detail));
    }

    /// Record a memory operation (`store`, `recall`, ...).
    pub fn record_memory_op(&self, op: impl Into<String>, key: impl Into<String>, input: Value) {
        self.append(TrajectoryStep::new(StepKind::memory(op), key).with_input(input));
    }
}

impl Default for TrajectoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn test_append_and_snapshot() {
        let store = TrajectoryStore::new();
        store.append(TrajectoryStep::new(StepKind::Tool, "nmap"));
        store.append(TrajectoryStep::new(StepKind::Llm, "analyze"));

        let snapshot = store.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert!(snapshot.end_time.is_some());
        assert_eq!(snapshot.steps[0].name, "nmap");
    }

    #[test]
    fn test_snapshot_is_a_deep_copy() {
        let store = TrajectoryStore::new();
        store.append(TrajectoryStep::new(StepKind::Tool, "nmap"));

        let mut snapshot = store.snapshot();
        snapshot.steps.clear();

        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_reset_clears_steps_and_restarts_clock() {
        let store = TrajectoryStore::new();
        store.append(TrajectoryStep::new(StepKind::Tool, "nmap"));
        let before = store.snapshot().start_time;

        store.reset();
        assert!(store.is_empty());
        assert!(store.snapshot().start_time >= before);
    }

    #[test]
    fn test_concurrent_appends_lose_nothing() {
        let store = Arc::new(TrajectoryStore::new());
        let mut handles = Vec::new();

        for worker in 0..8 {
            let store = Arc::clone(&store);
            handles.push(std::thread::spawn(move || {
                for i in 0..50 {
                    store.append(TrajectoryStep::new(
                        StepKind::Tool,
                        format!("w{worker}-{i}"),
                    ));
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.len(), 400);
    }

    #[test]
    fn test_record_tool_call_success_and_failure() {
        let store = TrajectoryStore::new();
        let started = Instant::now();

        store.record_tool_call(
            "nmap",
            json!({"target": "10.0.0.1"}),
            Ok(json!({"open_ports": [80]})),
            started,
        );
        store.record_tool_call("hydra", json!({}), Err("connection refused".into()), started);

        let snapshot = store.snapshot();
        assert!(snapshot.steps[0].output.is_some());
        assert!(snapshot.steps[0].error.is_none());
        assert!(snapshot.steps[1].output.is_none());
        assert_eq!(snapshot.steps[1].error.as_deref(), Some("connection refused"));
    }

    #[test]
    fn test_record_memory_op_kind() {
        let store = TrajectoryStore::new();
        store.record_memory_op("store", "subnet-hosts", json!({"hosts": 3}));

        let snapshot = store.snapshot();
        assert_eq!(snapshot.steps[0].kind, StepKind::memory("store"));
        assert_eq!(snapshot.steps[0].name, "subnet-hosts");
    }
}

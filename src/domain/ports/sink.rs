//! Result persistence and export ports.
//!
//! These are the best-effort side channels of the engine: JSONL persistence
//! and third-party observability export live behind these traits, outside
//! this crate. Failures returned here are reported to the immediate caller
//! and never block or fail the evaluation pipeline.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::EvalResult;
use crate::domain::models::{EvalSample, PartialScore, ScoreResult};

/// Persists finished evaluation results.
#[async_trait]
pub trait ResultSink: Send + Sync {
    /// Record one sample/result pair.
    async fn log(&self, sample: &EvalSample, result: &ScoreResult) -> EvalResult<()>;

    /// Flush and release the sink.
    async fn close(&self) -> EvalResult<()>;
}

/// Exports partial scores in real time as dispatch cycles complete.
#[async_trait]
pub trait ScoreExporter: Send + Sync {
    /// Export one scorer's partial score for a trace.
    ///
    /// Implementations must treat a disabled sink or a score whose
    /// confidence is below their configured minimum as a silent no-op, not
    /// an error.
    async fn export_partial_score(
        &self,
        trace_id: Uuid,
        scorer_name: &str,
        score: &PartialScore,
    ) -> EvalResult<()>;
}

/// A no-op result sink that stores nothing.
///
/// Use this when persistence is disabled but the type system requires a
/// `ResultSink` implementation.
#[derive(Debug, Clone, Default)]
pub struct NullResultSink;

impl NullResultSink {
    /// Create a null sink.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ResultSink for NullResultSink {
    async fn log(&self, _sample: &EvalSample, _result: &ScoreResult) -> EvalResult<()> {
        Ok(())
    }

    async fn close(&self) -> EvalResult<()> {
        Ok(())
    }
}

/// A no-op score exporter.
#[derive(Debug, Clone, Default)]
pub struct NullScoreExporter;

impl NullScoreExporter {
    /// Create a null exporter.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ScoreExporter for NullScoreExporter {
    async fn export_partial_score(
        &self,
        _trace_id: Uuid,
        _scorer_name: &str,
        _score: &PartialScore,
    ) -> EvalResult<()> {
        Ok(())
    }
}

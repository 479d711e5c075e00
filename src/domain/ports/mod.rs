//! Port trait definitions (Hexagonal Architecture)
//!
//! This module defines async trait interfaces the engine consumes or
//! produces at its boundaries:
//! - [`Scorer`] / [`StreamingScorer`]: scoring strategies
//! - [`ResultSink`]: result persistence
//! - [`ScoreExporter`]: real-time partial-score export
//!
//! These traits keep the evaluation core independent of any concrete
//! persistence or observability backend.

pub mod scorer;
pub mod sink;

pub use scorer::{Scorer, StreamingScorer};
pub use sink::{NullResultSink, NullScoreExporter, ResultSink, ScoreExporter};

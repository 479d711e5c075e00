//! Policy and engine configuration types.
//!
//! Runtime policy objects ([`ThresholdConfig`], [`FeedbackFrequency`],
//! [`DispatchConfig`], [`HarnessConfig`]) are immutable once a harness is
//! constructed. [`VigilConfig`] is the serde-facing aggregate the figment
//! loader in `infrastructure::config` produces; `HarnessConfig::from` bridges
//! the two.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Score thresholds that drive alerts and threshold-derived actions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdConfig {
    /// Scores below this raise a warning alert (and suggest `Adjust`).
    pub warning: f64,
    /// Scores below this raise a critical alert (and suggest `Reconsider`).
    pub critical: f64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            warning: 0.5,
            critical: 0.3,
        }
    }
}

/// When the harness triggers a new dispatch cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedbackFrequency {
    /// Evaluate once this many steps have accumulated since the last cycle.
    pub every_n_steps: u32,
    /// Minimum wall-clock interval between two cycles.
    pub debounce: Duration,
    /// When set, a threshold breach in the previous cycle forces the next
    /// evaluation out of cadence (ignoring the step counter).
    pub on_threshold: bool,
}

impl Default for FeedbackFrequency {
    fn default() -> Self {
        Self {
            every_n_steps: 3,
            debounce: Duration::from_secs(2),
            on_threshold: true,
        }
    }
}

/// Configuration for one dispatch cycle.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Per-dispatch timeout applied to every scorer task.
    pub timeout: Duration,
    /// Thresholds used for overall-action derivation and alerting.
    pub thresholds: ThresholdConfig,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            thresholds: ThresholdConfig::default(),
        }
    }
}

/// Full harness policy configuration.
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    /// Dispatch trigger policy.
    pub frequency: FeedbackFrequency,
    /// Whether unconsumed feedback is auto-injected into model calls.
    pub auto_inject: bool,
    /// Bounded work-queue depth. Requests are dropped silently when full --
    /// feedback is advisory, recency beats completeness.
    pub queue_depth: usize,
    /// How long `shutdown` waits for the worker to drain.
    pub shutdown_timeout: Duration,
    /// Per-cycle dispatch configuration.
    pub dispatch: DispatchConfig,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            frequency: FeedbackFrequency::default(),
            auto_inject: false,
            queue_depth: 10,
            shutdown_timeout: Duration::from_secs(5),
            dispatch: DispatchConfig::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Serde-facing configuration (figment)
// ---------------------------------------------------------------------------

/// Logging configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Output format: json or pretty.
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

/// Feedback engine configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackSettings {
    /// Master switch for streaming evaluation.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Steps between dispatch cycles.
    #[serde(default = "default_every_n_steps")]
    pub every_n_steps: u32,
    /// Debounce interval in milliseconds.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    /// Whether threshold breaches force out-of-cadence evaluation.
    #[serde(default = "default_true")]
    pub on_threshold: bool,
    /// Whether to auto-inject feedback into model calls.
    #[serde(default)]
    pub auto_inject: bool,
    /// Bounded work-queue depth.
    #[serde(default = "default_queue_depth")]
    pub queue_depth: usize,
    /// Per-dispatch timeout in milliseconds.
    #[serde(default = "default_dispatch_timeout_ms")]
    pub dispatch_timeout_ms: u64,
    /// Shutdown drain timeout in milliseconds.
    #[serde(default = "default_shutdown_timeout_ms")]
    pub shutdown_timeout_ms: u64,
    /// Warning threshold.
    #[serde(default = "default_warning_threshold")]
    pub warning_threshold: f64,
    /// Critical threshold.
    #[serde(default = "default_critical_threshold")]
    pub critical_threshold: f64,
    /// Minimum confidence below which partial-score export is skipped.
    #[serde(default = "default_min_export_confidence")]
    pub min_export_confidence: f64,
}

impl Default for FeedbackSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            every_n_steps: default_every_n_steps(),
            debounce_ms: default_debounce_ms(),
            on_threshold: true,
            auto_inject: false,
            queue_depth: default_queue_depth(),
            dispatch_timeout_ms: default_dispatch_timeout_ms(),
            shutdown_timeout_ms: default_shutdown_timeout_ms(),
            warning_threshold: default_warning_threshold(),
            critical_threshold: default_critical_threshold(),
            min_export_confidence: default_min_export_confidence(),
        }
    }
}

/// Root configuration loaded by the figment loader.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VigilConfig {
    /// Logging section.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Feedback section.
    #[serde(default)]
    pub feedback: FeedbackSettings,
}

impl From<&FeedbackSettings> for HarnessConfig {
    fn from(settings: &FeedbackSettings) -> Self {
        Self {
            frequency: FeedbackFrequency {
                every_n_steps: settings.every_n_steps,
                debounce: Duration::from_millis(settings.debounce_ms),
                on_threshold: settings.on_threshold,
            },
            auto_inject: settings.auto_inject,
            queue_depth: settings.queue_depth,
            shutdown_timeout: Duration::from_millis(settings.shutdown_timeout_ms),
            dispatch: DispatchConfig {
                timeout: Duration::from_millis(settings.dispatch_timeout_ms),
                thresholds: ThresholdConfig {
                    warning: settings.warning_threshold,
                    critical: settings.critical_threshold,
                },
            },
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_true() -> bool {
    true
}

fn default_every_n_steps() -> u32 {
    3
}

fn default_debounce_ms() -> u64 {
    2_000
}

fn default_queue_depth() -> usize {
    10
}

fn default_dispatch_timeout_ms() -> u64 {
    5_000
}

fn default_shutdown_timeout_ms() -> u64 {
    5_000
}

fn default_warning_threshold() -> f64 {
    0.5
}

fn default_critical_threshold() -> f64 {
    0.3
}

fn default_min_export_confidence() -> f64 {
    0.3
}

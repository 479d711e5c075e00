//! Configuration loading with hierarchical merging.

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::models::VigilConfig;

/// Configuration error types.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Log level is not one of the recognized values.
    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    /// Log format is not one of the recognized values.
    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    /// A threshold fell outside `[0, 1]`.
    #[error("Invalid {name} threshold: {value}. Must be between 0.0 and 1.0")]
    InvalidThreshold {
        /// Which threshold.
        name: &'static str,
        /// The offending value.
        value: f64,
    },

    /// Critical threshold set above the warning threshold.
    #[error(
        "Invalid thresholds: critical ({critical}) must not exceed warning ({warning})"
    )]
    ThresholdOrder {
        /// Configured warning threshold.
        warning: f64,
        /// Configured critical threshold.
        critical: f64,
    },

    /// Evaluation cadence of zero steps.
    #[error("Invalid every_n_steps: must be at least 1")]
    InvalidCadence,

    /// Work queue with no capacity.
    #[error("Invalid queue_depth: must be at least 1")]
    InvalidQueueDepth,

    /// A timeout of zero milliseconds.
    #[error("Invalid {0}: must be positive")]
    InvalidTimeout(&'static str),
}

/// Configuration loader with hierarchical merging.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging.
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .vigil/config.yaml (project config)
    /// 3. .vigil/local.yaml (project local overrides, optional)
    /// 4. Environment variables (`VIGIL_*` prefix, highest priority)
    pub fn load() -> Result<VigilConfig> {
        let config: VigilConfig = Figment::new()
            .merge(Serialized::defaults(VigilConfig::default()))
            .merge(Yaml::file(".vigil/config.yaml"))
            .merge(Yaml::file(".vigil/local.yaml"))
            .merge(Env::prefixed("VIGIL_").split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<VigilConfig> {
        let config: VigilConfig = Figment::new()
            .merge(Serialized::defaults(VigilConfig::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .context(format!(
                "Failed to load config from {}",
                path.as_ref().display()
            ))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading.
    pub fn validate(config: &VigilConfig) -> Result<(), ConfigError> {
        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        let feedback = &config.feedback;
        for (name, value) in [
            ("warning", feedback.warning_threshold),
            ("critical", feedback.critical_threshold),
            ("min_export_confidence", feedback.min_export_confidence),
        ] {
            if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::InvalidThreshold { name, value });
            }
        }

        if feedback.critical_threshold > feedback.warning_threshold {
            return Err(ConfigError::ThresholdOrder {
                warning: feedback.warning_threshold,
                critical: feedback.critical_threshold,
            });
        }

        if feedback.every_n_steps == 0 {
            return Err(ConfigError::InvalidCadence);
        }

        if feedback.queue_depth == 0 {
            return Err(ConfigError::InvalidQueueDepth);
        }

        if feedback.dispatch_timeout_ms == 0 {
            return Err(ConfigError::InvalidTimeout("dispatch_timeout_ms"));
        }
        if feedback.shutdown_timeout_ms == 0 {
            return Err(ConfigError::InvalidTimeout("shutdown_timeout_ms"));
        }

        Ok(())
    }
}

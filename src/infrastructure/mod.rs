//! Infrastructure layer: configuration loading and logger setup.

pub mod config;
pub mod logging;

pub use config::{ConfigError, ConfigLoader};

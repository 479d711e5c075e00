//! Domain layer: pure models, matching algorithms, errors, and ports.

pub mod errors;
pub mod matching;
pub mod models;
pub mod ports;

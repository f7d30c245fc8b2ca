//! RatingScope Core: rating samples, their on-disk store, the solved.ac
//! collector and the statistics computed over a sample set.
//!
//! This crate holds everything that does not need a long-lived service:
//! - Configuration (TOML, every key defaulted)
//! - `RatingStore`, an atomically replaced single-column CSV
//! - `RankingCollector`, the paginated, rate-limit aware fetch loop
//! - Percentile rank, Gaussian KDE and density histogram
//! - `ShutdownSignal` for cancelling long sleeps

pub mod config;
pub mod data;
pub mod sample;
pub mod shutdown;
pub mod stats;

pub use config::{AppConfig, ConfigError};
pub use sample::{SampleOrigin, SampleSet};
pub use shutdown::ShutdownSignal;

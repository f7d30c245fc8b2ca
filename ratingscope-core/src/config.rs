//! TOML configuration with a default for every knob.
//!
//! ```toml
//! [store]
//! dataset_path = "data/ratings.csv"
//!
//! [collector]
//! pages_per_cycle = 300
//! cycle_cooldown_secs = 900
//!
//! [schedule]
//! failed_run_policy = "wait_full_interval"
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Top-level configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub store: StoreConfig,
    pub collector: CollectorConfig,
    pub schedule: ScheduleConfig,
    pub query: QueryConfig,
}

impl AppConfig {
    /// Load and validate a config file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate a TOML string. Missing tables and keys take defaults.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.collector.validate()?;
        if self.store.dataset_path == self.store.checkpoint_path {
            return Err(ConfigError::Invalid(
                "store.checkpoint_path must differ from store.dataset_path".into(),
            ));
        }
        Ok(())
    }
}

/// Where the dataset lives on disk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StoreConfig {
    /// Canonical dataset file read by the distribution cache.
    pub dataset_path: PathBuf,
    /// Destination of partial checkpoints taken during rate-limit pauses.
    pub checkpoint_path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            dataset_path: PathBuf::from("data/ratings.csv"),
            checkpoint_path: PathBuf::from("data/ratings.partial.csv"),
        }
    }
}

/// Pagination and rate-limit knobs for the ranking collector.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CollectorConfig {
    pub ranking_url: String,
    pub search_url: String,
    /// Rough count of ranked users; only bounds the page loop.
    pub total_entries_estimate: u64,
    /// Entries the API returns per page.
    pub page_size: u64,
    /// Pause (and checkpoint) after this many pages.
    pub pages_per_cycle: u32,
    pub cycle_cooldown_secs: u64,
    /// Sleep after a 429 before retrying the same page.
    pub rate_limit_cooldown_secs: u64,
    /// Consecutive 429s on one page before it is skipped.
    pub max_rate_limit_retries: u32,
    /// Sleep after any other page failure.
    pub error_delay_secs: u64,
    pub request_timeout_secs: u64,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            ranking_url: "https://solved.ac/api/v3/ranking/tier".into(),
            search_url: "https://solved.ac/api/v3/search/user".into(),
            total_entries_estimate: 175_000,
            page_size: 50,
            pages_per_cycle: 300,
            cycle_cooldown_secs: 15 * 60,
            rate_limit_cooldown_secs: 60,
            max_rate_limit_retries: 30,
            error_delay_secs: 5,
            request_timeout_secs: 10,
        }
    }
}

impl CollectorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.page_size == 0 {
            return Err(ConfigError::Invalid("collector.page_size must be > 0".into()));
        }
        if self.pages_per_cycle == 0 {
            return Err(ConfigError::Invalid(
                "collector.pages_per_cycle must be > 0".into(),
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "collector.request_timeout_secs must be > 0".into(),
            ));
        }
        Ok(())
    }

    /// Ceiling of `total_entries_estimate / page_size`, never below one page.
    pub fn expected_pages(&self) -> u32 {
        let page_size = self.page_size.max(1);
        let pages = self.total_entries_estimate.div_ceil(page_size).max(1);
        u32::try_from(pages).unwrap_or(u32::MAX)
    }

    pub fn cycle_cooldown(&self) -> Duration {
        Duration::from_secs(self.cycle_cooldown_secs)
    }

    pub fn rate_limit_cooldown(&self) -> Duration {
        Duration::from_secs(self.rate_limit_cooldown_secs)
    }

    pub fn error_delay(&self) -> Duration {
        Duration::from_secs(self.error_delay_secs)
    }
}

/// What the scheduler does after a run that produced no dataset.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FailedRunPolicy {
    /// Sleep the shorter fallback interval and try again.
    #[default]
    RetrySooner,
    /// Treat the empty run like a normal cycle.
    WaitFullInterval,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScheduleConfig {
    pub interval_secs: u64,
    pub fallback_interval_secs: u64,
    pub failed_run_policy: FailedRunPolicy,
    /// Start the first collection immediately instead of after one interval.
    pub run_on_start: bool,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            interval_secs: 60 * 60 * 24,
            fallback_interval_secs: 60 * 60,
            failed_run_policy: FailedRunPolicy::RetrySooner,
            run_on_start: true,
        }
    }
}

impl ScheduleConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn fallback_interval(&self) -> Duration {
        Duration::from_secs(self.fallback_interval_secs)
    }

    /// Sleep after a run that collected nothing, per `failed_run_policy`.
    /// Errors and panics always use `fallback_interval`.
    pub fn after_empty_run(&self) -> Duration {
        match self.failed_run_policy {
            FailedRunPolicy::RetrySooner => self.fallback_interval(),
            FailedRunPolicy::WaitFullInterval => self.interval(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct QueryConfig {
    /// Rating substituted when the lookup fails or the user is unknown.
    pub unknown_rating: u32,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self { unknown_rating: 0 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_is_all_defaults() {
        let config = AppConfig::from_toml("").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.schedule.interval_secs, 86_400);
        assert_eq!(config.collector.page_size, 50);
    }

    #[test]
    fn partial_tables_override_only_named_keys() {
        let config = AppConfig::from_toml(
            r#"
[collector]
cycle_cooldown_secs = 3600
rate_limit_cooldown_secs = 60

[schedule]
failed_run_policy = "wait_full_interval"
"#,
        )
        .unwrap();
        assert_eq!(config.collector.cycle_cooldown(), Duration::from_secs(3600));
        assert_eq!(config.collector.pages_per_cycle, 300);
        assert_eq!(config.schedule.after_empty_run(), config.schedule.interval());
        assert_eq!(config.schedule.fallback_interval(), Duration::from_secs(3600));
    }

    #[test]
    fn expected_pages_is_ceiling_division() {
        let mut c = CollectorConfig::default();
        c.total_entries_estimate = 175_000;
        c.page_size = 50;
        assert_eq!(c.expected_pages(), 3500);
        c.total_entries_estimate = 175_001;
        assert_eq!(c.expected_pages(), 3501);
        c.total_entries_estimate = 0;
        assert_eq!(c.expected_pages(), 1);
    }

    #[test]
    fn zero_page_size_rejected() {
        let err = AppConfig::from_toml("[collector]\npage_size = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn checkpoint_must_not_alias_dataset() {
        let err = AppConfig::from_toml(
            "[store]\ndataset_path = \"a.csv\"\ncheckpoint_path = \"a.csv\"\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("checkpoint_path"));
    }

    #[test]
    fn retry_sooner_uses_fallback() {
        let s = ScheduleConfig::default();
        assert_eq!(s.after_empty_run(), Duration::from_secs(3600));
    }

    #[test]
    fn unknown_policy_is_parse_error() {
        let err = AppConfig::from_toml("[schedule]\nfailed_run_policy = \"never\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}

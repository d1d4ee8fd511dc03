//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (HOUSESTATS_*)
//! 2. TOML config file (if HOUSESTATS_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::freshness::FreshnessPolicy;

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (HOUSESTATS_*)
/// 2. TOML config file (if HOUSESTATS_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the SQLite statistics cache.
    ///
    /// Set via HOUSESTATS_CACHE_DB_PATH environment variable.
    #[serde(default = "default_cache_db_path")]
    pub cache_db_path: PathBuf,

    /// Path to the SQLite sale record store.
    ///
    /// Set via HOUSESTATS_SALES_DB_PATH environment variable.
    #[serde(default = "default_sales_db_path")]
    pub sales_db_path: PathBuf,

    /// Whether prices far above the partition mean are dropped from the
    /// average price series.
    ///
    /// Set via HOUSESTATS_TRIM_OUTLIERS environment variable.
    #[serde(default = "default_true")]
    pub trim_outliers: bool,

    /// Standard deviations above the mean at which a sale counts as an outlier.
    ///
    /// Set via HOUSESTATS_OUTLIER_STD_FACTOR environment variable.
    #[serde(default = "default_outlier_std_factor")]
    pub outlier_std_factor: f64,

    /// Cache a zeroed entry when an area has no sales.
    ///
    /// Set via HOUSESTATS_CACHE_EMPTY_RESULTS environment variable.
    #[serde(default)]
    pub cache_empty_results: bool,

    /// Markers newer than this many days are considered incomplete.
    ///
    /// Set via HOUSESTATS_FRESHNESS_WINDOW_DAYS environment variable.
    #[serde(default = "default_freshness_window_days")]
    pub freshness_window_days: i64,

    /// Months the effective marker is backdated from the current month start
    /// when the raw marker falls inside the freshness window.
    ///
    /// Set via HOUSESTATS_FRESHNESS_BACKDATE_MONTHS environment variable.
    #[serde(default = "default_freshness_backdate_months")]
    pub freshness_backdate_months: u32,

    /// Maximum number of area jobs running at once during fan-out.
    ///
    /// Set via HOUSESTATS_MAX_CONCURRENCY environment variable.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Per-area job timeout in milliseconds.
    ///
    /// Set via HOUSESTATS_JOB_TIMEOUT_MS environment variable.
    #[serde(default = "default_job_timeout_ms")]
    pub job_timeout_ms: u64,

    /// Attempts made against the sale store before giving up.
    ///
    /// Set via HOUSESTATS_SOURCE_RETRY_ATTEMPTS environment variable.
    #[serde(default = "default_source_retry_attempts")]
    pub source_retry_attempts: u32,

    /// Initial backoff between sale store attempts in milliseconds.
    ///
    /// Set via HOUSESTATS_SOURCE_RETRY_BACKOFF_MS environment variable.
    #[serde(default = "default_source_retry_backoff_ms")]
    pub source_retry_backoff_ms: u64,
}

fn default_cache_db_path() -> PathBuf {
    PathBuf::from("./housestats-cache.sqlite")
}

fn default_sales_db_path() -> PathBuf {
    PathBuf::from("./house_data.sqlite")
}

fn default_true() -> bool {
    true
}

fn default_outlier_std_factor() -> f64 {
    3.0
}

fn default_freshness_window_days() -> i64 {
    60
}

fn default_freshness_backdate_months() -> u32 {
    2
}

fn default_max_concurrency() -> usize {
    4
}

fn default_job_timeout_ms() -> u64 {
    120_000
}

fn default_source_retry_attempts() -> u32 {
    3
}

fn default_source_retry_backoff_ms() -> u64 {
    200
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            cache_db_path: default_cache_db_path(),
            sales_db_path: default_sales_db_path(),
            trim_outliers: true,
            outlier_std_factor: default_outlier_std_factor(),
            cache_empty_results: false,
            freshness_window_days: default_freshness_window_days(),
            freshness_backdate_months: default_freshness_backdate_months(),
            max_concurrency: default_max_concurrency(),
            job_timeout_ms: default_job_timeout_ms(),
            source_retry_attempts: default_source_retry_attempts(),
            source_retry_backoff_ms: default_source_retry_backoff_ms(),
        }
    }
}

impl AppConfig {
    /// Per-area job timeout as Duration for use with tokio.
    pub fn job_timeout(&self) -> Duration {
        Duration::from_millis(self.job_timeout_ms)
    }

    /// Initial retry backoff as Duration.
    pub fn source_retry_backoff(&self) -> Duration {
        Duration::from_millis(self.source_retry_backoff_ms)
    }

    /// The outlier factor handed to the stats engine, `None` when trimming is off.
    pub fn outlier_factor(&self) -> Option<f64> {
        self.trim_outliers.then_some(self.outlier_std_factor)
    }

    pub fn freshness(&self) -> FreshnessPolicy {
        FreshnessPolicy { window_days: self.freshness_window_days, backdate_months: self.freshness_backdate_months }
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `HOUSESTATS_`
    /// 2. TOML file from `HOUSESTATS_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("HOUSESTATS_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("HOUSESTATS_")
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.cache_db_path, PathBuf::from("./housestats-cache.sqlite"));
        assert_eq!(config.sales_db_path, PathBuf::from("./house_data.sqlite"));
        assert!(config.trim_outliers);
        assert_eq!(config.outlier_std_factor, 3.0);
        assert!(!config.cache_empty_results);
        assert_eq!(config.freshness_window_days, 60);
        assert_eq!(config.freshness_backdate_months, 2);
        assert_eq!(config.max_concurrency, 4);
        assert_eq!(config.source_retry_attempts, 3);
    }

    #[test]
    fn test_durations() {
        let config = AppConfig::default();
        assert_eq!(config.job_timeout(), Duration::from_millis(120_000));
        assert_eq!(config.source_retry_backoff(), Duration::from_millis(200));
    }

    #[test]
    fn test_outlier_factor_disabled() {
        let config = AppConfig { trim_outliers: false, ..Default::default() };
        assert_eq!(config.outlier_factor(), None);

        let config = AppConfig { outlier_std_factor: 2.0, ..Default::default() };
        assert_eq!(config.outlier_factor(), Some(2.0));
    }

    #[test]
    fn test_load_from_toml_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("housestats.toml", "outlier_std_factor = 2.0\ncache_empty_results = true\n")?;
            jail.set_env("HOUSESTATS_CONFIG_FILE", "housestats.toml");
            jail.set_env("HOUSESTATS_MAX_CONCURRENCY", "8");

            let config = AppConfig::load().map_err(|e| e.to_string())?;
            assert_eq!(config.outlier_std_factor, 2.0);
            assert!(config.cache_empty_results);
            assert_eq!(config.max_concurrency, 8);
            Ok(())
        });
    }
}

//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use thiserror::Error;

/// Upper bound on the freshness window, one hundred years.
const MAX_FRESHNESS_WINDOW_DAYS: i64 = 36_500;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `outlier_std_factor` is not a positive finite number
    /// - `freshness_window_days` is negative or exceeds 36500
    /// - `max_concurrency` is 0 or exceeds 64
    /// - `job_timeout_ms` is less than 100ms
    /// - `source_retry_attempts` is 0
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.outlier_std_factor.is_finite() || self.outlier_std_factor <= 0.0 {
            return Err(ConfigError::Invalid {
                field: "outlier_std_factor".into(),
                reason: "must be a positive number".into(),
            });
        }

        if self.freshness_window_days < 0 {
            return Err(ConfigError::Invalid {
                field: "freshness_window_days".into(),
                reason: "must not be negative".into(),
            });
        }
        if self.freshness_window_days > MAX_FRESHNESS_WINDOW_DAYS {
            return Err(ConfigError::Invalid {
                field: "freshness_window_days".into(),
                reason: format!("must not exceed {MAX_FRESHNESS_WINDOW_DAYS}"),
            });
        }

        if self.max_concurrency == 0 {
            return Err(ConfigError::Invalid { field: "max_concurrency".into(), reason: "must be at least 1".into() });
        }
        if self.max_concurrency > 64 {
            return Err(ConfigError::Invalid { field: "max_concurrency".into(), reason: "must not exceed 64".into() });
        }

        if self.job_timeout_ms < 100 {
            return Err(ConfigError::Invalid {
                field: "job_timeout_ms".into(),
                reason: "must be at least 100ms".into(),
            });
        }

        if self.source_retry_attempts == 0 {
            return Err(ConfigError::Invalid {
                field: "source_retry_attempts".into(),
                reason: "must be at least 1".into(),
            });
        }

        if self.cache_db_path == self.sales_db_path {
            tracing::warn!(
                path = %self.cache_db_path.display(),
                "cache_db_path and sales_db_path point at the same file; \
                 cache tables will share the sale store"
            );
        }

        Ok(())
    }
}

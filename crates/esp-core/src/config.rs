//! Pipeline configuration

use crate::error::ConfigError;
use esp_enhancer::EnhancerConfig;
use esp_safety::ValidationConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Upper bound for any configured span of time (10 years)
const MAX_SECS: u64 = 10 * 365 * 24 * 60 * 60;

/// Runtime configuration for the enhancement service
///
/// ```toml
/// preview_ttl_secs = 1800
/// rollback_retention_days = 30
///
/// [validation]
/// require_front_matter = true
/// required_front_matter_fields = ["title"]
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Pending/approved previews expire after this long
    pub preview_ttl_secs: u64,
    /// Terminal previews are purged after this long
    pub preview_retention_secs: u64,
    /// Rollback points are kept this many days
    pub rollback_retention_days: u32,
    /// Expiration sweeper tick
    pub sweep_interval_secs: u64,
    pub generation_timeout_ms: u64,
    pub storage_timeout_ms: u64,
    /// Wait for the per-document lock
    pub lock_timeout_ms: u64,
    pub max_concurrent_generations: usize,
    /// Recommendations below this confidence are skipped
    pub min_confidence: f64,
    pub validation: ValidationConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            preview_ttl_secs: 30 * 60,
            preview_retention_secs: 24 * 60 * 60,
            rollback_retention_days: 30,
            sweep_interval_secs: 60,
            generation_timeout_ms: 10_000,
            storage_timeout_ms: 5_000,
            lock_timeout_ms: 30_000,
            max_concurrent_generations: 4,
            min_confidence: 0.0,
            validation: ValidationConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and validate TOML
    ///
    /// # Errors
    /// Returns error on malformed TOML or out-of-range values
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges
    ///
    /// # Errors
    /// Returns [`ConfigError::Invalid`] naming the offending field
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("preview_ttl_secs", self.preview_ttl_secs),
            ("sweep_interval_secs", self.sweep_interval_secs),
            ("generation_timeout_ms", self.generation_timeout_ms),
            ("storage_timeout_ms", self.storage_timeout_ms),
            ("lock_timeout_ms", self.lock_timeout_ms),
        ];
        if let Some((name, _)) = positive.iter().find(|(_, v)| *v == 0) {
            return Err(ConfigError::Invalid(format!("{name} must be greater than zero")));
        }
        if self.preview_ttl_secs > MAX_SECS || self.preview_retention_secs > MAX_SECS {
            return Err(ConfigError::Invalid("preview durations exceed 10 years".to_string()));
        }
        if u64::from(self.rollback_retention_days) * 86_400 > MAX_SECS {
            return Err(ConfigError::Invalid("rollback_retention_days exceeds 10 years".to_string()));
        }
        if self.max_concurrent_generations == 0 {
            return Err(ConfigError::Invalid(
                "max_concurrent_generations must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(ConfigError::Invalid("min_confidence must be within 0.0..=1.0".to_string()));
        }
        if self.validation.min_document_bytes > self.validation.max_document_bytes {
            return Err(ConfigError::Invalid(
                "validation.min_document_bytes exceeds max_document_bytes".to_string(),
            ));
        }
        Ok(())
    }

    /// With preview TTL
    #[inline]
    #[must_use]
    pub fn with_preview_ttl(mut self, ttl: Duration) -> Self {
        self.preview_ttl_secs = ttl.as_secs();
        self
    }

    /// With preview retention after a terminal state
    #[inline]
    #[must_use]
    pub fn with_preview_retention(mut self, retention: Duration) -> Self {
        self.preview_retention_secs = retention.as_secs();
        self
    }

    /// With rollback retention
    #[inline]
    #[must_use]
    pub fn with_rollback_retention_days(mut self, days: u32) -> Self {
        self.rollback_retention_days = days;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval_secs = interval.as_secs().max(1);
        self
    }

    #[inline]
    #[must_use]
    pub fn with_generation_timeout(mut self, timeout: Duration) -> Self {
        self.generation_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// With the wait for a per-document lock
    #[inline]
    #[must_use]
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX).max(1);
        self
    }

    #[inline]
    #[must_use]
    pub fn with_min_confidence(mut self, min_confidence: f64) -> Self {
        self.min_confidence = min_confidence;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_validation(mut self, validation: ValidationConfig) -> Self {
        self.validation = validation;
        self
    }

    #[must_use]
    pub fn preview_ttl(&self) -> chrono::Duration {
        secs(self.preview_ttl_secs)
    }

    #[must_use]
    pub fn preview_retention(&self) -> chrono::Duration {
        secs(self.preview_retention_secs)
    }

    #[must_use]
    pub fn rollback_retention(&self) -> chrono::Duration {
        secs(u64::from(self.rollback_retention_days) * 86_400)
    }

    #[must_use]
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }

    #[must_use]
    pub fn storage_timeout(&self) -> Duration {
        Duration::from_millis(self.storage_timeout_ms)
    }

    #[must_use]
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    /// Enhancer settings derived from this config
    #[must_use]
    pub fn enhancer_config(&self) -> EnhancerConfig {
        EnhancerConfig {
            generation_timeout: Duration::from_millis(self.generation_timeout_ms),
            max_concurrent_generations: self.max_concurrent_generations.max(1),
            min_confidence: self.min_confidence,
        }
    }
}

#[allow(clippy::cast_possible_wrap)]
fn secs(value: u64) -> chrono::Duration {
    chrono::Duration::seconds(value.min(MAX_SECS) as i64)
}

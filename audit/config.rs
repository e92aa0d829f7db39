use serde::{Deserialize, Serialize};
use std::fs;
use std::ops::RangeInclusive;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

const ALPHA_RANGE: RangeInclusive<f64> = 0.001..=0.5;
const BIAS_THRESHOLD_RANGE: RangeInclusive<f64> = 0.0..=10.0;
const MAX_ATTEMPTS_RANGE: RangeInclusive<u32> = 1..=10;

/// Custom error type for configuration loading and validation.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read or write configuration file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse TOML configuration file: {0}")]
    TomlParseError(#[from] toml::de::Error),
    #[error("Failed to serialize configuration to TOML format: {0}")]
    TomlSerializeError(#[from] toml::ser::Error),
    #[error("Configuration value '{key}' = {value} is outside the allowed range {allowed}.")]
    OutOfRange {
        key: &'static str,
        value: String,
        allowed: String,
    },
}

/// How the candidate proposer retries a failing source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
        }
    }
}

impl RetryPolicy {
    /// Delay before retrying after the given (1-based) failed attempt:
    /// `base_delay_ms * 2^(attempt - 1)`.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 1u64
            .checked_shl(attempt.saturating_sub(1))
            .unwrap_or(u64::MAX);
        Duration::from_millis(self.base_delay_ms.saturating_mul(factor))
    }
}

/// Every tunable of an audit run. Passed explicitly to each entry point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Significance level for both confounding criteria.
    pub alpha: f64,
    /// Fraction of the adjusted effect above which bias is problematic.
    pub bias_threshold: f64,
    /// Smallest sample size the data-quality gate accepts.
    pub min_samples: usize,
    pub retry: RetryPolicy,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            alpha: 0.05,
            bias_threshold: 0.10,
            min_samples: 100,
            retry: RetryPolicy::default(),
        }
    }
}

impl AuditConfig {
    /// Loads and validates a configuration file. Missing keys take their defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let toml_string = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&toml_string)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        fn out_of_range<T: std::fmt::Debug>(
            key: &'static str,
            value: T,
            allowed: &RangeInclusive<T>,
        ) -> ConfigError {
            ConfigError::OutOfRange {
                key,
                value: format!("{value:?}"),
                allowed: format!("{allowed:?}"),
            }
        }

        if !ALPHA_RANGE.contains(&self.alpha) {
            return Err(out_of_range("alpha", self.alpha, &ALPHA_RANGE));
        }
        if !BIAS_THRESHOLD_RANGE.contains(&self.bias_threshold) {
            return Err(out_of_range(
                "bias_threshold",
                self.bias_threshold,
                &BIAS_THRESHOLD_RANGE,
            ));
        }
        if self.min_samples == 0 {
            return Err(out_of_range("min_samples", 0, &(1..=usize::MAX)));
        }
        if !MAX_ATTEMPTS_RANGE.contains(&self.retry.max_attempts) {
            return Err(out_of_range(
                "retry.max_attempts",
                self.retry.max_attempts,
                &MAX_ATTEMPTS_RANGE,
            ));
        }
        Ok(())
    }
}

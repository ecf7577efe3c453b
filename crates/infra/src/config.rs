//! Configuration loading from the process environment.

use thiserror::Error;

use stockerp_analytic_purchase::AnalyticTiming;
use stockerp_observability::LogFormat;

pub const ANALYTIC_TIMING_VAR: &str = "STOCKERP_ANALYTIC_TIMING";
pub const LOG_FORMAT_VAR: &str = "STOCKERP_LOG_FORMAT";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: {message}")]
    Invalid { key: &'static str, message: String },
}

/// Runtime settings. Every field has a default, so an empty environment is a
/// valid configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Config {
    pub analytic_timing: AnalyticTiming,
    pub log_format: LogFormat,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset or blank keys fall back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Config::default();

        if let Some(raw) = non_blank(lookup(ANALYTIC_TIMING_VAR)) {
            config.analytic_timing = raw.parse().map_err(|e: stockerp_core::DomainError| {
                ConfigError::Invalid {
                    key: ANALYTIC_TIMING_VAR,
                    message: e.to_string(),
                }
            })?;
        }
        if let Some(raw) = non_blank(lookup(LOG_FORMAT_VAR)) {
            config.log_format = raw.parse().map_err(|e: stockerp_observability::UnknownLogFormat| {
                ConfigError::Invalid {
                    key: LOG_FORMAT_VAR,
                    message: e.to_string(),
                }
            })?;
        }

        Ok(config)
    }

    /// Install the tracing subscriber in the configured format.
    pub fn init_observability(&self) {
        stockerp_observability::init_with(self.log_format);
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

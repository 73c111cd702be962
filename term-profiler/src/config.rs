//! Profiler configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ProfileError, Result};

/// Default cap for rendered min/max/sample values, in characters.
pub const DEFAULT_MAX_VALUE_LENGTH: usize = 4000;

/// Upper bound for the default worker count.
const DEFAULT_CONCURRENCY_CAP: usize = 8;

/// How a failure in one column affects the rest of the run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Cancel outstanding columns and return the first column error.
    #[default]
    AbortRun,
    /// Record an error marker on the failed column and keep going.
    MarkAndContinue,
}

/// Configuration for a profiling run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProfilerConfig {
    /// Maximum number of column aggregations in flight at once
    pub max_concurrency: usize,
    /// Per-column timeout in milliseconds (None disables it)
    pub column_timeout_ms: Option<u64>,
    /// Truncation limit for rendered values, in characters
    pub max_value_length: usize,
    /// Behaviour on per-column failures
    pub failure_policy: FailurePolicy,
}

impl Default for ProfilerConfig {
    fn default() -> Self {
        Self {
            max_concurrency: num_cpus::get().clamp(1, DEFAULT_CONCURRENCY_CAP),
            column_timeout_ms: None,
            max_value_length: DEFAULT_MAX_VALUE_LENGTH,
            failure_policy: FailurePolicy::default(),
        }
    }
}

impl ProfilerConfig {
    /// Per-column timeout as a [`Duration`].
    pub fn column_timeout(&self) -> Option<Duration> {
        self.column_timeout_ms.map(Duration::from_millis)
    }

    /// Checks that the configuration can drive a run.
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrency == 0 {
            return Err(ProfileError::Configuration(
                "max_concurrency must be at least 1".to_string(),
            ));
        }
        if self.max_value_length == 0 {
            return Err(ProfileError::Configuration(
                "max_value_length must be at least 1".to_string(),
            ));
        }
        if self.column_timeout_ms == Some(0) {
            return Err(ProfileError::Configuration(
                "column_timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

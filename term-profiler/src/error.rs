//! Error types for the profiling engine.
//!
//! Run-level failures are represented by [`ProfileError`]. Failures scoped to a
//! single column are represented by [`ColumnError`], which is either promoted to
//! a [`ProfileError::AggregationExecution`] or recorded on the column's report
//! row, depending on the configured [`FailurePolicy`](crate::config::FailurePolicy).

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The main error type for the profiler.
#[derive(Error, Debug)]
pub enum ProfileError {
    /// The target table does not resolve in the executor's catalog.
    #[error("Table '{table}' not found")]
    TableNotFound { table: String },

    /// The catalog lookup itself failed.
    #[error("Failed to discover columns of '{table}': {message}")]
    ColumnDiscovery {
        table: String,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Statistics for a single column could not be computed.
    #[error("Aggregation failed for column '{column}' (ordinal {ordinal}) of '{table}': {message}")]
    AggregationExecution {
        table: String,
        column: String,
        ordinal: usize,
        message: String,
    },

    /// A declared type has no rendering rule. The normalizer falls back to a
    /// generic rendering instead of surfacing this during a run.
    #[error("No rendering rule for declared type '{declared_type}'")]
    UnsupportedType { declared_type: String },

    /// A caller-selected column is not part of the discovered schema.
    #[error("Column '{column}' not found in '{table}'")]
    ColumnNotFound { table: String, column: String },

    /// Invalid profiler configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Identifier validation failed.
    #[error("Security error: {0}")]
    SecurityError(String),

    /// The run was cancelled before it completed.
    #[error("Profiling of '{table}' was cancelled")]
    Cancelled { table: String },

    /// The executor returned a result with an unexpected shape.
    #[error("Invalid executor result: {0}")]
    InvalidResult(String),

    /// Error from DataFusion operations.
    #[error("DataFusion error: {0}")]
    DataFusion(#[from] datafusion::error::DataFusionError),

    /// Error from Arrow operations.
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),
}

/// A type alias for `Result<T, ProfileError>`.
pub type Result<T> = std::result::Result<T, ProfileError>;

impl ProfileError {
    /// Creates a table-not-found error.
    pub fn table_not_found(table: impl fmt::Display) -> Self {
        Self::TableNotFound {
            table: table.to_string(),
        }
    }

    /// Creates a column discovery error wrapping the catalog failure.
    pub fn column_discovery(
        table: impl fmt::Display,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        Self::ColumnDiscovery {
            table: table.to_string(),
            message: source.to_string(),
            source: Some(source),
        }
    }

    /// Creates an aggregation error for one column.
    pub fn aggregation(
        table: impl fmt::Display,
        column: impl Into<String>,
        ordinal: usize,
        message: impl Into<String>,
    ) -> Self {
        Self::AggregationExecution {
            table: table.to_string(),
            column: column.into(),
            ordinal,
            message: message.into(),
        }
    }

    /// Creates an invalid-result error.
    pub fn invalid_result(msg: impl Into<String>) -> Self {
        Self::InvalidResult(msg.into())
    }

    /// Returns true for errors raised before any column work started.
    pub fn is_catalog_error(&self) -> bool {
        matches!(
            self,
            Self::TableNotFound { .. } | Self::ColumnDiscovery { .. }
        )
    }
}

/// What went wrong while computing one column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnErrorKind {
    /// The executor rejected or failed the column's queries.
    Execution,
    /// The per-column timeout elapsed.
    Timeout,
    /// The executor answered with something that could not be decoded.
    InvalidResult,
}

/// Error marker attached to a column whose statistics could not be computed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnError {
    pub kind: ColumnErrorKind,
    pub message: String,
}

impl ColumnError {
    pub fn execution(message: impl Into<String>) -> Self {
        Self {
            kind: ColumnErrorKind::Execution,
            message: message.into(),
        }
    }

    pub fn timeout(after: std::time::Duration) -> Self {
        Self {
            kind: ColumnErrorKind::Timeout,
            message: format!("timed out after {} ms", after.as_millis()),
        }
    }

    pub fn invalid_result(message: impl Into<String>) -> Self {
        Self {
            kind: ColumnErrorKind::InvalidResult,
            message: message.into(),
        }
    }
}

impl fmt::Display for ColumnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl From<ProfileError> for ColumnError {
    fn from(err: ProfileError) -> Self {
        match err {
            ProfileError::InvalidResult(message) => Self::invalid_result(message),
            ProfileError::Arrow(e) => Self::invalid_result(e.to_string()),
            other => Self::execution(other.to_string()),
        }
    }
}

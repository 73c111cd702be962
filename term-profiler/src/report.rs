//! Report model: one uniform record per column, ordered by column ordinal.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ColumnError;
use crate::schema::ColumnDescriptor;

/// Note attached to a column record when the statistics were produced in a
/// degraded way.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// The declared type had no dedicated rendering rule; values were coerced
    /// to text and min/max follow string ordering.
    RenderingFallback { declared_type: String },
    /// The executor reported counts larger than the snapshot row count (the
    /// table changed mid-run); they were clamped to `totalRows`.
    CountsClamped {
        reported_null_count: u64,
        reported_distinct_count: u64,
    },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RenderingFallback { declared_type } => {
                write!(f, "no rendering rule for {declared_type}; used text fallback")
            }
            Self::CountsClamped {
                reported_null_count,
                reported_distinct_count,
            } => write!(
                f,
                "counts clamped to row snapshot (reported nulls={reported_null_count}, distinct={reported_distinct_count})"
            ),
        }
    }
}

/// Statistics for one column.
///
/// Count fields are `None` only when the column carries an `error`; a computed
/// zero is always `Some(0)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnStatistics {
    pub column_ordinal: usize,
    pub column_name: String,
    pub declared_type: String,
    pub declared_max_length: Option<u32>,
    pub total_rows: u64,
    pub null_count: Option<u64>,
    pub percent_null: Option<f64>,
    pub distinct_count: Option<u64>,
    pub min_value: Option<String>,
    pub max_value: Option<String>,
    pub min_length: Option<u64>,
    pub max_length: Option<u64>,
    pub sample_value: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<Diagnostic>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ColumnError>,
}

impl ColumnStatistics {
    /// Record for a column whose non-null population is empty because the
    /// table has no rows.
    pub fn for_empty_table(column: &ColumnDescriptor) -> Self {
        Self {
            null_count: Some(0),
            percent_null: Some(0.0),
            distinct_count: Some(0),
            ..Self::blank(column, 0)
        }
    }

    /// Record carrying an error marker instead of statistics.
    pub fn failed(column: &ColumnDescriptor, total_rows: u64, error: ColumnError) -> Self {
        Self {
            error: Some(error),
            ..Self::blank(column, total_rows)
        }
    }

    pub(crate) fn blank(column: &ColumnDescriptor, total_rows: u64) -> Self {
        Self {
            column_ordinal: column.ordinal,
            column_name: column.name.clone(),
            declared_type: column.declared_type.clone(),
            declared_max_length: column.declared_max_length,
            total_rows,
            null_count: None,
            percent_null: None,
            distinct_count: None,
            min_value: None,
            max_value: None,
            min_length: None,
            max_length: None,
            sample_value: None,
            diagnostics: Vec::new(),
            error: None,
        }
    }

    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }
}

/// Ordered profiling result for one table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileReport {
    pub table: String,
    pub total_rows: u64,
    pub columns: Vec<ColumnStatistics>,
}

impl ProfileReport {
    /// Builds a report, ordering records by column ordinal.
    pub fn new(
        table: impl Into<String>,
        total_rows: u64,
        mut columns: Vec<ColumnStatistics>,
    ) -> Self {
        columns.sort_by_key(|c| c.column_ordinal);
        Self {
            table: table.into(),
            total_rows,
            columns,
        }
    }

    pub fn column(&self, name: &str) -> Option<&ColumnStatistics> {
        self.columns.iter().find(|c| c.column_name == name)
    }

    pub fn failed_columns(&self) -> impl Iterator<Item = &ColumnStatistics> {
        self.columns.iter().filter(|c| c.is_failed())
    }

    /// True when every column was computed.
    pub fn is_complete(&self) -> bool {
        self.failed_columns().next().is_none()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Percentage of nulls rounded half-up to two decimals.
///
/// Computed on integer basis points so equal inputs always give equal outputs.
/// An empty table yields 0.
pub fn percent_null(null_count: u64, total_rows: u64) -> f64 {
    if total_rows == 0 {
        return 0.0;
    }

    let nulls = u128::from(null_count.min(total_rows));
    let total = u128::from(total_rows);
    let basis_points = (nulls * 10_000 * 2 + total) / (total * 2);
    basis_points as f64 / 100.0
}

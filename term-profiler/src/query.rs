//! SQL generation for aggregation requests.
//!
//! The builder is the only place SQL text is produced. Its inputs are a
//! resolved [`TableIdentifier`] and a [`ColumnDescriptor`] taken from the
//! discovered schema; both are quoted before they are embedded, and no other
//! caller text reaches a query.
//!
//! [`ColumnDescriptor`]: crate::schema::ColumnDescriptor

use crate::error::Result;
use crate::normalizer::{LengthMeasure, RenderRule, TypeCategory};
use crate::planner::{AggregationRequest, StatisticKind};
use crate::schema::TableIdentifier;
use crate::security::SqlSecurity;

/// Output column of the row-count query.
pub const TOTAL_ROWS: &str = "total_rows";

/// Output column of the value scan.
pub const SCANNED_VALUE: &str = "scanned_value";

/// Fixed, parameterized query builder.
pub struct QueryBuilder;

impl QueryBuilder {
    /// `SELECT COUNT(*)` over the whole table.
    pub fn row_count(table: &TableIdentifier) -> Result<String> {
        Ok(format!(
            "SELECT COUNT(*) AS \"{TOTAL_ROWS}\" FROM {}",
            table.to_sql()?
        ))
    }

    /// Single-pass aggregate for every requested statistic except the sample.
    /// Returns `None` when the request has nothing to aggregate.
    pub fn aggregate(request: &AggregationRequest) -> Result<Option<String>> {
        let column = SqlSecurity::quote_identifier(&request.column.name)?;

        let projections: Vec<String> = request
            .aggregate_statistics()
            .filter_map(|kind| {
                let expr = match kind {
                    StatisticKind::NullCount => {
                        format!("SUM(CASE WHEN {column} IS NULL THEN 1 ELSE 0 END)")
                    }
                    StatisticKind::DistinctCount => format!("COUNT(DISTINCT {column})"),
                    StatisticKind::MinValue => format!("MIN({column})"),
                    StatisticKind::MaxValue => format!("MAX({column})"),
                    StatisticKind::MinLength => {
                        format!("MIN({})", length_expr(&column, &request.rule)?)
                    }
                    StatisticKind::MaxLength => {
                        format!("MAX({})", length_expr(&column, &request.rule)?)
                    }
                    StatisticKind::Sample => return None,
                };
                Some(format!("{expr} AS \"{}\"", kind.alias()))
            })
            .collect();

        if projections.is_empty() {
            return Ok(None);
        }

        Ok(Some(format!(
            "SELECT {} FROM {}",
            projections.join(", "),
            request.table.to_sql()?
        )))
    }

    /// Query returning one occurring non-null value.
    ///
    /// Rows are ordered by the md5 digest of the value, which picks the same
    /// value on every run without favouring either end of the value range.
    pub fn sample(request: &AggregationRequest) -> Result<Option<String>> {
        if !request.requests(StatisticKind::Sample) || request.scans(StatisticKind::Sample) {
            return Ok(None);
        }

        let column = SqlSecurity::quote_identifier(&request.column.name)?;
        let key = match request.rule.category {
            TypeCategory::Binary => format!("md5(CAST({column} AS BYTEA))"),
            _ => format!("md5(CAST({column} AS VARCHAR))"),
        };

        Ok(Some(format!(
            "SELECT {column} AS \"{}\" FROM {} WHERE {column} IS NOT NULL ORDER BY {key} LIMIT 1",
            StatisticKind::Sample.alias(),
            request.table.to_sql()?
        )))
    }

    /// Non-null values of a column whose statistics are computed on the
    /// client. Returns `None` when nothing is taken from the scan.
    pub fn values(request: &AggregationRequest) -> Result<Option<String>> {
        if request.scanned_statistics().next().is_none() {
            return Ok(None);
        }

        let column = SqlSecurity::quote_identifier(&request.column.name)?;
        Ok(Some(format!(
            "SELECT {column} AS \"{SCANNED_VALUE}\" FROM {} WHERE {column} IS NOT NULL",
            request.table.to_sql()?
        )))
    }
}

fn length_expr(column: &str, rule: &RenderRule) -> Option<String> {
    match rule.length {
        LengthMeasure::Characters => Some(format!("character_length({column})")),
        LengthMeasure::CastCharacters => Some(format!(
            "character_length(CAST({column} AS VARCHAR))"
        )),
        // Byte length of the hex encoding halved; string length functions do
        // not accept binary arguments.
        LengthMeasure::Bytes => Some(format!(
            "character_length(encode(CAST({column} AS BYTEA), 'hex')) / 2"
        )),
        LengthMeasure::Rendered => None,
    }
}

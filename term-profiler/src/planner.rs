//! Per-column aggregation planning.
//!
//! A plan is a declarative [`AggregationRequest`]: what to compute for one
//! column and under which rendering rule. Turning it into SQL is the job of
//! [`QueryBuilder`](crate::query::QueryBuilder).

use serde::{Deserialize, Serialize};

use crate::normalizer::{RenderRule, ValueNormalizer};
use crate::report::Diagnostic;
use crate::schema::{ColumnDescriptor, TableIdentifier};

/// A statistic a request can ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatisticKind {
    NullCount,
    DistinctCount,
    MinValue,
    MaxValue,
    MinLength,
    MaxLength,
    Sample,
}

impl StatisticKind {
    pub const ALL: [StatisticKind; 7] = [
        StatisticKind::NullCount,
        StatisticKind::DistinctCount,
        StatisticKind::MinValue,
        StatisticKind::MaxValue,
        StatisticKind::MinLength,
        StatisticKind::MaxLength,
        StatisticKind::Sample,
    ];

    /// Output column name used in generated queries.
    pub fn alias(&self) -> &'static str {
        match self {
            Self::NullCount => "null_count",
            Self::DistinctCount => "distinct_count",
            Self::MinValue => "min_value",
            Self::MaxValue => "max_value",
            Self::MinLength => "min_length",
            Self::MaxLength => "max_length",
            Self::Sample => "sample_value",
        }
    }

    /// Whether the statistic is computed by the single-pass aggregate (as
    /// opposed to the sample query).
    pub fn is_aggregate(&self) -> bool {
        !matches!(self, Self::Sample)
    }
}

/// Column-scoped description of the statistics to compute.
#[derive(Debug, Clone)]
pub struct AggregationRequest {
    pub table: TableIdentifier,
    pub column: ColumnDescriptor,
    pub rule: RenderRule,
    /// Snapshot row count shared by every column of the run
    pub total_rows: u64,
    pub max_value_length: usize,
    pub statistics: Vec<StatisticKind>,
    /// Notes produced while planning, carried onto the column's record
    pub diagnostics: Vec<Diagnostic>,
}

impl AggregationRequest {
    /// An empty table has an empty non-null population for every column, so
    /// nothing needs to be scanned.
    pub fn skip_scan(&self) -> bool {
        self.total_rows == 0
    }

    pub fn requests(&self, kind: StatisticKind) -> bool {
        self.statistics.contains(&kind)
    }

    /// Whether `kind` is taken from the client-side value scan rather than
    /// from SQL. Only null counts stay in SQL for scanned columns.
    pub fn scans(&self, kind: StatisticKind) -> bool {
        self.rule.scans_values() && kind != StatisticKind::NullCount && self.requests(kind)
    }

    /// Whether `kind` is a column of the single-pass aggregate.
    pub fn aggregates(&self, kind: StatisticKind) -> bool {
        kind.is_aggregate() && self.requests(kind) && !self.scans(kind)
    }

    pub fn aggregate_statistics(&self) -> impl Iterator<Item = StatisticKind> + '_ {
        self.statistics
            .iter()
            .copied()
            .filter(move |s| self.aggregates(*s))
    }

    pub fn scanned_statistics(&self) -> impl Iterator<Item = StatisticKind> + '_ {
        self.statistics.iter().copied().filter(move |s| self.scans(*s))
    }
}

/// Builds aggregation requests for the columns of one table.
#[derive(Debug, Clone)]
pub struct ColumnStatisticsPlanner {
    table: TableIdentifier,
    normalizer: ValueNormalizer,
}

impl ColumnStatisticsPlanner {
    pub fn new(table: TableIdentifier, normalizer: ValueNormalizer) -> Self {
        Self { table, normalizer }
    }

    /// Plans every statistic for `column`.
    pub fn plan(&self, column: &ColumnDescriptor, total_rows: u64) -> AggregationRequest {
        let (rule, diagnostic) = self.normalizer.resolve(&column.data_type);

        AggregationRequest {
            table: self.table.clone(),
            column: column.clone(),
            rule,
            total_rows,
            max_value_length: self.normalizer.max_value_length(),
            statistics: StatisticKind::ALL.to_vec(),
            diagnostics: diagnostic.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalizer::{OrderingBasis, TypeCategory};
    use arrow::datatypes::{DataType, Field};
    use std::sync::Arc;

    fn planner() -> ColumnStatisticsPlanner {
        ColumnStatisticsPlanner::new(
            TableIdentifier::parse("public.t").unwrap(),
            ValueNormalizer::new(100),
        )
    }

    #[test]
    fn test_plan_numeric_column() {
        let column = ColumnDescriptor::new(3, "score", DataType::Decimal128(5, 1), true);
        let request = planner().plan(&column, 5);

        assert_eq!(request.total_rows, 5);
        assert_eq!(request.max_value_length, 100);
        assert_eq!(request.rule.category, TypeCategory::Numeric);
        assert_eq!(request.rule.ordering, OrderingBasis::Native);
        assert!(request.diagnostics.is_empty());
        assert!(!request.skip_scan());
        for kind in StatisticKind::ALL {
            assert!(request.requests(kind));
        }
        assert_eq!(request.aggregate_statistics().count(), 6);
        assert_eq!(request.scanned_statistics().count(), 0);
    }

    #[test]
    fn test_plan_empty_table_skips_scan() {
        let column = ColumnDescriptor::new(1, "name", DataType::Utf8, true);
        let request = planner().plan(&column, 0);
        assert!(request.skip_scan());
    }

    #[test]
    fn test_plan_unsupported_type_carries_diagnostic() {
        let data_type = DataType::List(Arc::new(Field::new("item", DataType::Utf8, true)));
        let column = ColumnDescriptor::new(2, "tags", data_type, true);
        let request = planner().plan(&column, 10);

        assert_eq!(request.rule, RenderRule::FALLBACK);
        assert_eq!(
            request.aggregate_statistics().collect::<Vec<_>>(),
            vec![StatisticKind::NullCount]
        );
        assert_eq!(request.scanned_statistics().count(), 6);
        assert!(request.scans(StatisticKind::Sample));
        assert_eq!(request.diagnostics.len(), 1);
        assert!(matches!(
            request.diagnostics[0],
            Diagnostic::RenderingFallback { .. }
        ));
    }

    #[test]
    fn test_aliases_are_unique() {
        let mut aliases: Vec<_> = StatisticKind::ALL.iter().map(|k| k.alias()).collect();
        aliases.sort_unstable();
        aliases.dedup();
        assert_eq!(aliases.len(), StatisticKind::ALL.len());
    }
}

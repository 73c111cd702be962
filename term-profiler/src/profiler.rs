//! Table profiling orchestration.
//!
//! [`TableProfiler`] drives a run end to end:
//!
//! 1. discover the columns (this also proves the table exists),
//! 2. take one `COUNT(*)` snapshot that every column reports against,
//! 3. plan and execute one aggregation per column on a bounded worker pool,
//! 4. merge the results back into declared column order.
//!
//! Column tasks may finish in any order; the report is always emitted by
//! ordinal. A column failure either aborts the run or is recorded on that
//! column's row, depending on the [`FailurePolicy`].
//!
//! # Example
//!
//! ```rust
//! use term_profiler::profiler::TableProfiler;
//! use term_profiler::config::FailurePolicy;
//! use datafusion::prelude::*;
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let ctx = SessionContext::new();
//! ctx.sql("CREATE TABLE t AS VALUES (1, 'a'), (2, NULL)")
//!     .await
//!     .unwrap()
//!     .collect()
//!     .await
//!     .unwrap();
//!
//! let profiler = TableProfiler::builder()
//!     .max_concurrency(4)
//!     .failure_policy(FailurePolicy::MarkAndContinue)
//!     .build();
//!
//! let report = profiler.profile_session(&ctx, "t").await.unwrap();
//! assert_eq!(report.total_rows, 2);
//! assert_eq!(report.columns[1].null_count, Some(1));
//! # })
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use arrow::array::{Array, ArrayRef, AsArray};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Int64Type};
use arrow::record_batch::RecordBatch;
use datafusion::prelude::SessionContext;
use tokio::sync::{watch, Semaphore};
use tokio::task::{Id as TaskId, JoinSet};
use tracing::{debug, info, instrument, warn};

use crate::config::{FailurePolicy, ProfilerConfig};
use crate::error::{ColumnError, ProfileError, Result};
use crate::executor::{DataFusionExecutor, ProfileExecutor};
use crate::logging::{truncate_field, LogConfig};
use crate::normalizer::{RenderedSummary, RenderedValues, ValueNormalizer};
use crate::planner::{AggregationRequest, ColumnStatisticsPlanner, StatisticKind};
use crate::query::{QueryBuilder, SCANNED_VALUE, TOTAL_ROWS};
use crate::report::{percent_null, ColumnStatistics, Diagnostic, ProfileReport};
use crate::schema::{ColumnDescriptor, SchemaInspector, TableIdentifier};

/// Progress callback for profiling runs
pub type ProgressCallback = Arc<dyn Fn(ProfilerProgress) + Send + Sync>;

/// Progress information emitted after each column completes
#[derive(Debug, Clone)]
pub struct ProfilerProgress {
    pub column_name: String,
    pub column_ordinal: usize,
    pub completed: usize,
    pub total: usize,
    pub failed: bool,
}

/// Cooperative cancellation for a profiling run.
///
/// Clones share the same signal. Cancelling aborts every in-flight column task
/// and the run returns [`ProfileError::Cancelled`] without a partial report.
#[derive(Debug, Clone)]
pub struct CancellationHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for CancellationHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl CancellationHandle {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once [`cancel`](Self::cancel) has been called.
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives as long as `self`, so the wait cannot fail.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

/// Builder for [`TableProfiler`]
#[derive(Default)]
pub struct TableProfilerBuilder {
    config: ProfilerConfig,
    log_config: LogConfig,
    progress_callback: Option<ProgressCallback>,
}

impl TableProfilerBuilder {
    /// Maximum number of column aggregations in flight
    pub fn max_concurrency(mut self, workers: usize) -> Self {
        self.config.max_concurrency = workers;
        self
    }

    /// Per-column timeout
    pub fn column_timeout(mut self, timeout: Duration) -> Self {
        self.config.column_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    /// Truncation limit for min, max and sample values, in characters
    pub fn max_value_length(mut self, length: usize) -> Self {
        self.config.max_value_length = length;
        self
    }

    pub fn failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.config.failure_policy = policy;
        self
    }

    /// Replaces the whole configuration
    pub fn config(mut self, config: ProfilerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn log_config(mut self, log_config: LogConfig) -> Self {
        self.log_config = log_config;
        self
    }

    /// Set progress callback
    pub fn progress_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(ProfilerProgress) + Send + Sync + 'static,
    {
        self.progress_callback = Some(Arc::new(callback));
        self
    }

    pub fn build(self) -> TableProfiler {
        TableProfiler {
            config: self.config,
            log_config: self.log_config,
            progress_callback: self.progress_callback,
        }
    }
}

/// Profiles every column of a table against one row-count snapshot.
#[derive(Clone, Default)]
pub struct TableProfiler {
    config: ProfilerConfig,
    log_config: LogConfig,
    progress_callback: Option<ProgressCallback>,
}

impl std::fmt::Debug for TableProfiler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableProfiler")
            .field("config", &self.config)
            .field("log_config", &self.log_config)
            .field("has_progress_callback", &self.progress_callback.is_some())
            .finish()
    }
}

impl TableProfiler {
    pub fn builder() -> TableProfilerBuilder {
        TableProfilerBuilder::default()
    }

    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn config(&self) -> &ProfilerConfig {
        &self.config
    }

    /// Profiles all columns of `table`.
    pub async fn profile(
        &self,
        executor: Arc<dyn ProfileExecutor>,
        table: &TableIdentifier,
    ) -> Result<ProfileReport> {
        self.run(executor, table, None, &CancellationHandle::new())
            .await
    }

    /// Profiles all columns of `table`, stopping early when `cancel` fires.
    pub async fn profile_with_cancellation(
        &self,
        executor: Arc<dyn ProfileExecutor>,
        table: &TableIdentifier,
        cancel: &CancellationHandle,
    ) -> Result<ProfileReport> {
        self.run(executor, table, None, cancel).await
    }

    /// Profiles a subset of columns. Unknown names fail with
    /// [`ProfileError::ColumnNotFound`]; the report keeps declared order.
    pub async fn profile_columns<S: AsRef<str>>(
        &self,
        executor: Arc<dyn ProfileExecutor>,
        table: &TableIdentifier,
        columns: &[S],
    ) -> Result<ProfileReport> {
        let selection = columns.iter().map(|c| c.as_ref().to_string()).collect();
        self.run(executor, table, Some(selection), &CancellationHandle::new())
            .await
    }

    /// Profiles a table registered in a DataFusion session, given as
    /// `table`, `schema.table` or `catalog.schema.table`.
    pub async fn profile_session(
        &self,
        ctx: &SessionContext,
        table: &str,
    ) -> Result<ProfileReport> {
        let table = TableIdentifier::parse(table)?;
        self.profile(DataFusionExecutor::shared(ctx.clone()), &table)
            .await
    }

    #[instrument(skip(self, executor, table, selection, cancel), fields(table = %table))]
    async fn run(
        &self,
        executor: Arc<dyn ProfileExecutor>,
        table: &TableIdentifier,
        selection: Option<Vec<String>>,
        cancel: &CancellationHandle,
    ) -> Result<ProfileReport> {
        self.config.validate()?;

        if cancel.is_cancelled() {
            return Err(ProfileError::Cancelled {
                table: table.to_string(),
            });
        }

        // Dropping the in-flight run drops its JoinSet, which aborts every
        // column task.
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                warn!(table = %table, "Profiling cancelled");
                Err(ProfileError::Cancelled { table: table.to_string() })
            }
            result = self.run_columns(executor, table, selection) => result,
        }
    }

    async fn run_columns(
        &self,
        executor: Arc<dyn ProfileExecutor>,
        table: &TableIdentifier,
        selection: Option<Vec<String>>,
    ) -> Result<ProfileReport> {
        let start_time = Instant::now();

        let columns = SchemaInspector::new(executor.as_ref())
            .list_columns(table)
            .await?;
        let columns = select_columns(table, columns, selection)?;
        let total_rows = self.count_rows(executor.as_ref(), table).await?;
        debug!(table = %table, total_rows, "Took row count snapshot");

        info!(
            table = %table,
            columns = columns.len(),
            total_rows,
            max_concurrency = self.config.max_concurrency,
            policy = ?self.config.failure_policy,
            "Starting table profiling"
        );

        let planner = ColumnStatisticsPlanner::new(
            table.clone(),
            ValueNormalizer::new(self.config.max_value_length),
        );
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrency));
        let mut tasks = JoinSet::new();
        let mut pending: HashMap<TaskId, ColumnDescriptor> = HashMap::new();

        for column in &columns {
            let task = ColumnTask {
                executor: Arc::clone(&executor),
                request: planner.plan(column, total_rows),
                timeout: self.config.column_timeout(),
                log_config: self.log_config.clone(),
            };
            let semaphore = Arc::clone(&semaphore);

            let handle = tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await;
                task.run().await
            });
            pending.insert(handle.id(), column.clone());
        }

        let total = columns.len();
        let mut results = Vec::with_capacity(total);

        while let Some(joined) = tasks.join_next_with_id().await {
            let (column, outcome) = match joined {
                Ok((id, outcome)) => (pending.remove(&id), outcome),
                Err(e) => (
                    pending.remove(&e.id()),
                    ColumnOutcome::failed(ColumnError::execution(format!(
                        "Column task failed: {e}"
                    ))),
                ),
            };
            let Some(column) = column else {
                return Err(ProfileError::invalid_result(
                    "Column task finished with an unknown id",
                ));
            };

            let stats = match outcome.result {
                Ok(stats) => stats,
                Err(error) => match self.config.failure_policy {
                    FailurePolicy::AbortRun => {
                        warn!(
                            table = %table,
                            column = %column.name,
                            ordinal = column.ordinal,
                            error = %error,
                            "Column failed, aborting run"
                        );
                        tasks.abort_all();
                        return Err(ProfileError::aggregation(
                            table,
                            &column.name,
                            column.ordinal,
                            error.to_string(),
                        ));
                    }
                    FailurePolicy::MarkAndContinue => {
                        warn!(
                            table = %table,
                            column = %column.name,
                            ordinal = column.ordinal,
                            error = %error,
                            "Column failed, recording error marker"
                        );
                        let mut failed = ColumnStatistics::failed(&column, total_rows, error);
                        failed.diagnostics = outcome.diagnostics;
                        failed
                    }
                },
            };

            self.report_progress(&stats, results.len() + 1, total);
            results.push(stats);
        }

        let report = ProfileReport::new(table.to_string(), total_rows, results);

        info!(
            table = %table,
            columns = report.columns.len(),
            failed = report.failed_columns().count(),
            time_ms = start_time.elapsed().as_millis() as u64,
            "Completed table profiling"
        );

        Ok(report)
    }

    /// Takes the row-count snapshot shared by every column.
    async fn count_rows(
        &self,
        executor: &dyn ProfileExecutor,
        table: &TableIdentifier,
    ) -> Result<u64> {
        let sql = QueryBuilder::row_count(table)?;
        crate::log_query!(
            self.log_config,
            sql = %truncate_field(&sql, self.log_config.max_field_length),
            "Counting rows"
        );

        let batches = executor.query(&sql).await?;
        let row = ResultRow::single(&batches)?
            .ok_or_else(|| ProfileError::invalid_result("Row count query returned no rows"))?;
        row.count(TOTAL_ROWS)?
            .ok_or_else(|| ProfileError::invalid_result("Row count query returned NULL"))
    }

    fn report_progress(&self, stats: &ColumnStatistics, completed: usize, total: usize) {
        if let Some(callback) = &self.progress_callback {
            callback(ProfilerProgress {
                column_name: stats.column_name.clone(),
                column_ordinal: stats.column_ordinal,
                completed,
                total,
                failed: stats.is_failed(),
            });
        }
    }
}

/// Narrows the discovered columns to a caller selection, keeping declared order.
fn select_columns(
    table: &TableIdentifier,
    columns: Vec<ColumnDescriptor>,
    selection: Option<Vec<String>>,
) -> Result<Vec<ColumnDescriptor>> {
    let Some(selection) = selection else {
        return Ok(columns);
    };

    if let Some(missing) = selection
        .iter()
        .find(|name| !columns.iter().any(|c| &c.name == *name))
    {
        return Err(ProfileError::ColumnNotFound {
            table: table.to_string(),
            column: missing.clone(),
        });
    }

    Ok(columns
        .into_iter()
        .filter(|c| selection.contains(&c.name))
        .collect())
}

/// What a column task hands back to the collector.
struct ColumnOutcome {
    result: std::result::Result<ColumnStatistics, ColumnError>,
    diagnostics: Vec<Diagnostic>,
}

impl ColumnOutcome {
    fn failed(error: ColumnError) -> Self {
        Self {
            result: Err(error),
            diagnostics: Vec::new(),
        }
    }
}

/// One column's unit of work on the pool.
struct ColumnTask {
    executor: Arc<dyn ProfileExecutor>,
    request: AggregationRequest,
    timeout: Option<Duration>,
    log_config: LogConfig,
}

impl ColumnTask {
    async fn run(self) -> ColumnOutcome {
        let start_time = Instant::now();
        let column = &self.request.column;

        let result = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, self.execute()).await {
                Ok(result) => result.map_err(ColumnError::from),
                Err(_) => Err(ColumnError::timeout(limit)),
            },
            None => self.execute().await.map_err(ColumnError::from),
        };

        crate::perf_debug!(
            self.log_config,
            column = %column.name,
            ordinal = column.ordinal,
            ok = result.is_ok(),
            time_ms = start_time.elapsed().as_millis() as u64,
            "Column finished"
        );

        ColumnOutcome {
            result,
            diagnostics: self.request.diagnostics.clone(),
        }
    }

    async fn execute(&self) -> Result<ColumnStatistics> {
        let request = &self.request;

        if request.skip_scan() {
            let mut stats = ColumnStatistics::for_empty_table(&request.column);
            stats.diagnostics = request.diagnostics.clone();
            return Ok(stats);
        }

        let normalizer = ValueNormalizer::new(request.max_value_length);
        let mut stats = ColumnStatistics::blank(&request.column, request.total_rows);
        stats.diagnostics = request.diagnostics.clone();
        let mut nulls = None;
        let mut distinct = None;

        if let Some(sql) = QueryBuilder::aggregate(request)? {
            crate::log_query!(
                self.log_config,
                column = %request.column.name,
                sql = %truncate_field(&sql, self.log_config.max_field_length),
                "Executing column aggregate"
            );

            let batches = self.executor.query(&sql).await?;
            let row = ResultRow::single(&batches)?.ok_or_else(|| {
                ProfileError::invalid_result(format!(
                    "Aggregate for column '{}' returned no rows",
                    request.column.name
                ))
            })?;

            // SUM over a column of zeros is never NULL once the table has
            // rows, but an executor may still answer NULL for it.
            if request.aggregates(StatisticKind::NullCount) {
                nulls = Some(row.count(StatisticKind::NullCount.alias())?.unwrap_or(0));
            }
            if request.aggregates(StatisticKind::DistinctCount) {
                distinct = Some(row.count(StatisticKind::DistinctCount.alias())?.unwrap_or(0));
            }

            if request.aggregates(StatisticKind::MinValue) {
                stats.min_value = row.render(&normalizer, request, StatisticKind::MinValue)?;
            }
            if request.aggregates(StatisticKind::MaxValue) {
                stats.max_value = row.render(&normalizer, request, StatisticKind::MaxValue)?;
            }
            if request.aggregates(StatisticKind::MinLength) {
                stats.min_length = row
                    .count(StatisticKind::MinLength.alias())?
                    .map(|len| normalizer.bound_length(len, &request.rule));
            }
            if request.aggregates(StatisticKind::MaxLength) {
                stats.max_length = row
                    .count(StatisticKind::MaxLength.alias())?
                    .map(|len| normalizer.bound_length(len, &request.rule));
            }
        }

        if let Some(summary) = self.scan_values(&normalizer).await? {
            if request.scans(StatisticKind::DistinctCount) {
                distinct = Some(summary.distinct_count);
            }
            if request.scans(StatisticKind::MinValue) {
                stats.min_value = summary.min_value;
            }
            if request.scans(StatisticKind::MaxValue) {
                stats.max_value = summary.max_value;
            }
            if request.scans(StatisticKind::MinLength) {
                stats.min_length = summary.min_length;
            }
            if request.scans(StatisticKind::MaxLength) {
                stats.max_length = summary.max_length;
            }
            if request.scans(StatisticKind::Sample) {
                stats.sample_value = summary.sample_value;
            }
        }

        self.apply_counts(nulls, distinct, &mut stats);

        if !request.scans(StatisticKind::Sample) && stats.distinct_count.unwrap_or(1) > 0 {
            stats.sample_value = self.sample(&normalizer).await?;
        }

        crate::log_column!(
            self.log_config,
            column = %request.column.name,
            nulls = ?stats.null_count,
            distinct = ?stats.distinct_count,
            "Computed column statistics"
        );

        Ok(stats)
    }

    /// Records null and distinct counts, clamping them to the row snapshot.
    fn apply_counts(
        &self,
        nulls: Option<u64>,
        distinct: Option<u64>,
        stats: &mut ColumnStatistics,
    ) {
        let request = &self.request;
        let total_rows = request.total_rows;

        let over = |n: Option<u64>| n.is_some_and(|n| n > total_rows);
        if over(nulls) || over(distinct) {
            warn!(
                column = %request.column.name,
                total_rows,
                null_count = ?nulls,
                distinct_count = ?distinct,
                "Counts exceed the row snapshot; clamping"
            );
            stats.diagnostics.push(Diagnostic::CountsClamped {
                reported_null_count: nulls.unwrap_or(0),
                reported_distinct_count: distinct.unwrap_or(0),
            });
        }

        stats.null_count = nulls.map(|n| n.min(total_rows));
        stats.distinct_count = distinct.map(|n| n.min(total_rows));
        stats.percent_null = stats.null_count.map(|n| percent_null(n, total_rows));
    }

    /// Scans and renders the values of a column the engine cannot order or
    /// measure. Returns `None` when nothing is taken from the scan.
    async fn scan_values(&self, normalizer: &ValueNormalizer) -> Result<Option<RenderedSummary>> {
        let Some(sql) = QueryBuilder::values(&self.request)? else {
            return Ok(None);
        };
        crate::log_query!(
            self.log_config,
            column = %self.request.column.name,
            sql = %truncate_field(&sql, self.log_config.max_field_length),
            "Scanning column values"
        );

        let batches = self.executor.query(&sql).await?;
        let mut values = RenderedValues::default();
        for batch in &batches {
            let array = batch.column_by_name(SCANNED_VALUE).ok_or_else(|| {
                ProfileError::invalid_result(format!(
                    "Result is missing column '{SCANNED_VALUE}'"
                ))
            })?;
            values.observe(array.as_ref())?;
        }

        Ok(Some(values.summarize(normalizer)))
    }

    async fn sample(&self, normalizer: &ValueNormalizer) -> Result<Option<String>> {
        let Some(sql) = QueryBuilder::sample(&self.request)? else {
            return Ok(None);
        };
        crate::log_query!(
            self.log_config,
            column = %self.request.column.name,
            sql = %truncate_field(&sql, self.log_config.max_field_length),
            "Sampling column"
        );

        let batches = self.executor.query(&sql).await?;
        match ResultRow::single(&batches)? {
            Some(row) => row.render(normalizer, &self.request, StatisticKind::Sample),
            None => Ok(None),
        }
    }
}

/// The single row of an aggregate or sample result.
struct ResultRow<'a> {
    batch: &'a RecordBatch,
}

impl<'a> ResultRow<'a> {
    /// Returns the only row across `batches`, or `None` when there is none.
    fn single(batches: &'a [RecordBatch]) -> Result<Option<Self>> {
        let rows: usize = batches.iter().map(|b| b.num_rows()).sum();
        if rows > 1 {
            return Err(ProfileError::invalid_result(format!(
                "Expected at most one result row, got {rows}"
            )));
        }
        Ok(batches
            .iter()
            .find(|b| b.num_rows() == 1)
            .map(|batch| Self { batch }))
    }

    fn column(&self, name: &str) -> Result<&'a ArrayRef> {
        self.batch.column_by_name(name).ok_or_else(|| {
            ProfileError::invalid_result(format!("Result is missing column '{name}'"))
        })
    }

    /// Reads a non-negative integer cell; `None` for NULL.
    fn count(&self, name: &str) -> Result<Option<u64>> {
        let array = cast(self.column(name)?, &DataType::Int64)?;
        let values = array.as_primitive::<Int64Type>();
        if values.is_null(0) {
            return Ok(None);
        }

        let value = values.value(0);
        u64::try_from(value).map(Some).map_err(|_| {
            ProfileError::invalid_result(format!("Column '{name}' holds negative count {value}"))
        })
    }

    fn render(
        &self,
        normalizer: &ValueNormalizer,
        request: &AggregationRequest,
        kind: StatisticKind,
    ) -> Result<Option<String>> {
        let array = self.column(kind.alias())?;
        normalizer.render(array.as_ref(), 0, &request.rule)
    }
}

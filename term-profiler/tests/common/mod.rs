//! Executors that wrap a DataFusion session to inject latency and failures.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use arrow::array::Int64Array;
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use datafusion::error::{DataFusionError, Result as DFResult};
use datafusion::prelude::SessionContext;
use term_profiler::executor::{DataFusionExecutor, ProfileExecutor};
use term_profiler::schema::TableIdentifier;

/// Sleeps before running any query whose SQL contains a configured pattern.
pub struct DelayedExecutor {
    inner: DataFusionExecutor,
    delays: Vec<(String, Duration)>,
}

impl DelayedExecutor {
    pub fn new(ctx: SessionContext) -> Self {
        Self {
            inner: DataFusionExecutor::new(ctx),
            delays: Vec::new(),
        }
    }

    pub fn delay(mut self, pattern: impl Into<String>, delay: Duration) -> Self {
        self.delays.push((pattern.into(), delay));
        self
    }

    pub fn shared(self) -> Arc<dyn ProfileExecutor> {
        Arc::new(self)
    }
}

#[async_trait]
impl ProfileExecutor for DelayedExecutor {
    async fn lookup_table(&self, table: &TableIdentifier) -> DFResult<Option<SchemaRef>> {
        self.inner.lookup_table(table).await
    }

    async fn query(&self, sql: &str) -> DFResult<Vec<RecordBatch>> {
        if let Some((_, delay)) = self.delays.iter().find(|(p, _)| sql.contains(p.as_str())) {
            tokio::time::sleep(*delay).await;
        }
        self.inner.query(sql).await
    }
}

/// Fails catalog lookups or queries on demand.
pub struct FaultyExecutor {
    inner: DataFusionExecutor,
    fail_queries_matching: Option<String>,
    fail_lookup: bool,
}

impl FaultyExecutor {
    pub fn failing_queries(ctx: SessionContext, pattern: impl Into<String>) -> Self {
        Self {
            inner: DataFusionExecutor::new(ctx),
            fail_queries_matching: Some(pattern.into()),
            fail_lookup: false,
        }
    }

    pub fn failing_lookup(ctx: SessionContext) -> Self {
        Self {
            inner: DataFusionExecutor::new(ctx),
            fail_queries_matching: None,
            fail_lookup: true,
        }
    }

    pub fn shared(self) -> Arc<dyn ProfileExecutor> {
        Arc::new(self)
    }
}

#[async_trait]
impl ProfileExecutor for FaultyExecutor {
    async fn lookup_table(&self, table: &TableIdentifier) -> DFResult<Option<SchemaRef>> {
        if self.fail_lookup {
            return Err(DataFusionError::Execution(
                "catalog unavailable".to_string(),
            ));
        }
        self.inner.lookup_table(table).await
    }

    async fn query(&self, sql: &str) -> DFResult<Vec<RecordBatch>> {
        if let Some(pattern) = &self.fail_queries_matching {
            if sql.contains(pattern.as_str()) {
                return Err(DataFusionError::Execution(
                    "injected failure".to_string(),
                ));
            }
        }
        self.inner.query(sql).await
    }
}

/// Reports a fixed row count, as if the table shrank after the snapshot.
pub struct StaleCountExecutor {
    inner: DataFusionExecutor,
    total_rows: i64,
}

impl StaleCountExecutor {
    pub fn new(ctx: SessionContext, total_rows: i64) -> Self {
        Self {
            inner: DataFusionExecutor::new(ctx),
            total_rows,
        }
    }

    pub fn shared(self) -> Arc<dyn ProfileExecutor> {
        Arc::new(self)
    }
}

#[async_trait]
impl ProfileExecutor for StaleCountExecutor {
    async fn lookup_table(&self, table: &TableIdentifier) -> DFResult<Option<SchemaRef>> {
        self.inner.lookup_table(table).await
    }

    async fn query(&self, sql: &str) -> DFResult<Vec<RecordBatch>> {
        if !sql.starts_with("SELECT COUNT(*)") {
            return self.inner.query(sql).await;
        }

        let schema = Arc::new(Schema::new(vec![Field::new(
            "total_rows",
            DataType::Int64,
            false,
        )]));
        let batch = RecordBatch::try_new(
            schema,
            vec![Arc::new(Int64Array::from(vec![self.total_rows]))],
        )?;
        Ok(vec![batch])
    }
}

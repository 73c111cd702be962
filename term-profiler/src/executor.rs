//! Query execution seam.
//!
//! The profiler treats the data source as a black box that can resolve a table
//! in its catalog and run read-only SQL. [`DataFusionExecutor`] provides both
//! over a DataFusion [`SessionContext`], so anything registered there (memory
//! tables, CSV, Parquet, database table providers) can be profiled.

use std::sync::Arc;

use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use datafusion::error::Result as DFResult;
use datafusion::execution::context::SQLOptions;
use datafusion::prelude::SessionContext;

use crate::schema::TableIdentifier;

/// Catalog lookups and read-only query execution against one data source.
#[async_trait]
pub trait ProfileExecutor: Send + Sync {
    /// Resolves a table in the catalog. `Ok(None)` means the table does not
    /// exist; `Err` means the catalog could not be read.
    async fn lookup_table(&self, table: &TableIdentifier) -> DFResult<Option<SchemaRef>>;

    /// Runs a read-only query and collects its output.
    async fn query(&self, sql: &str) -> DFResult<Vec<RecordBatch>>;
}

/// [`ProfileExecutor`] backed by a DataFusion session.
#[derive(Clone)]
pub struct DataFusionExecutor {
    ctx: SessionContext,
}

impl std::fmt::Debug for DataFusionExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataFusionExecutor")
            .field("session_id", &self.ctx.session_id())
            .finish()
    }
}

impl DataFusionExecutor {
    /// Wraps a session. DDL, DML and statements are rejected so profiling can
    /// never mutate the source.
    pub fn new(ctx: SessionContext) -> Self {
        Self { ctx }
    }

    /// Convenience for handing the executor to a profiler.
    pub fn shared(ctx: SessionContext) -> Arc<dyn ProfileExecutor> {
        Arc::new(Self::new(ctx))
    }

    pub fn session(&self) -> &SessionContext {
        &self.ctx
    }
}

#[async_trait]
impl ProfileExecutor for DataFusionExecutor {
    async fn lookup_table(&self, table: &TableIdentifier) -> DFResult<Option<SchemaRef>> {
        let config = self.ctx.copied_config();
        let defaults = &config.options().catalog;
        let catalog_name = table.catalog().unwrap_or(&defaults.default_catalog);
        let schema_name = table.schema().unwrap_or(&defaults.default_schema);

        let Some(catalog) = self.ctx.catalog(catalog_name) else {
            return Ok(None);
        };
        let Some(schema) = catalog.schema(schema_name) else {
            return Ok(None);
        };

        Ok(schema
            .table(table.table())
            .await?
            .map(|provider| provider.schema()))
    }

    async fn query(&self, sql: &str) -> DFResult<Vec<RecordBatch>> {
        self.ctx
            .sql_with_options(sql, read_only())
            .await?
            .collect()
            .await
    }
}

fn read_only() -> SQLOptions {
    SQLOptions::new()
        .with_allow_ddl(false)
        .with_allow_dml(false)
        .with_allow_statements(false)
}

impl From<SessionContext> for DataFusionExecutor {
    fn from(ctx: SessionContext) -> Self {
        Self::new(ctx)
    }
}

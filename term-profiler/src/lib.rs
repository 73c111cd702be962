//! # Term Profiler - Column Profiling for Rust
//!
//! Term Profiler computes a uniform statistics record for every column of a
//! table: row count, null count and percentage, distinct count, normalized
//! min/max values, min/max rendered length and one sample value. Queries run
//! through DataFusion, so anything that can be registered in a
//! `SessionContext` can be profiled.
//!
//! ## Quick Start
//!
//! ```rust
//! use term_profiler::prelude::*;
//! use datafusion::prelude::*;
//!
//! # async fn example() -> std::result::Result<(), Box<dyn std::error::Error>> {
//! let ctx = SessionContext::new();
//! // ... register your tables ...
//! # ctx.sql("CREATE TABLE orders AS VALUES (1, 'open'), (2, NULL)").await?.collect().await?;
//!
//! let profiler = TableProfiler::builder()
//!     .max_concurrency(4)
//!     .column_timeout(std::time::Duration::from_secs(30))
//!     .failure_policy(FailurePolicy::MarkAndContinue)
//!     .build();
//!
//! let report = profiler.profile_session(&ctx, "orders").await?;
//! for column in &report.columns {
//!     println!(
//!         "{} {}: {:?} nulls ({:?}%)",
//!         column.column_ordinal, column.column_name, column.null_count, column.percent_null
//!     );
//! }
//! println!("{}", report.to_json_pretty()?);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! A run flows through these modules:
//!
//! - [`schema`]: resolves the table and lists its columns in declared order
//! - [`normalizer`]: maps each declared type to a rendering rule
//! - [`planner`]: builds one aggregation request per column
//! - [`query`]: turns a request into quoted, read-only SQL
//! - [`profiler`]: runs the requests on a bounded worker pool and merges the
//!   results by ordinal
//! - [`report`]: the serializable output records
//!
//! Per-column failures follow the configured [`config::FailurePolicy`]:
//! either the run aborts with [`error::ProfileError::AggregationExecution`],
//! or the column's record carries an error marker and the run continues.
//!
//! ## Logging
//!
//! All components log through `tracing`. Use
//! [`logging::setup::init_logging`] to install a subscriber, and
//! [`logging::LogConfig`] to opt into per-query and per-column events.

pub mod config;
pub mod error;
pub mod executor;
pub mod logging;
pub mod normalizer;
pub mod planner;
pub mod prelude;
pub mod profiler;
pub mod query;
pub mod report;
pub mod schema;
pub mod security;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_fixtures;

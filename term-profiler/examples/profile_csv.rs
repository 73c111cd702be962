//! Example profiling a CSV file and printing the report as JSON.
//!
//! ```text
//! cargo run --example profile_csv -- path/to/data.csv
//! ```
//!
//! Without an argument a small in-memory table is profiled instead.

use std::sync::Arc;
use std::time::Duration;

use datafusion::arrow::array::{Float64Array, Int64Array, StringArray};
use datafusion::arrow::datatypes::{DataType, Field, Schema};
use datafusion::arrow::record_batch::RecordBatch;
use datafusion::prelude::*;
use term_profiler::logging::setup::{init_logging, LoggingConfig};
use term_profiler::prelude::*;

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    init_logging(LoggingConfig::default())?;

    let ctx = SessionContext::new();
    match std::env::args().nth(1) {
        Some(path) => {
            ctx.register_csv("data", &path, CsvReadOptions::new()).await?;
        }
        None => {
            let schema = Arc::new(Schema::new(vec![
                Field::new("customer_id", DataType::Int64, false),
                Field::new("email", DataType::Utf8, true),
                Field::new("lifetime_value", DataType::Float64, true),
            ]));
            let batch = RecordBatch::try_new(
                schema,
                vec![
                    Arc::new(Int64Array::from(vec![1, 2, 3, 4])),
                    Arc::new(StringArray::from(vec![
                        Some("ann@example.com"),
                        None,
                        Some("cy@example.com"),
                        Some("ann@example.com"),
                    ])),
                    Arc::new(Float64Array::from(vec![Some(120.5), Some(0.0), None, Some(87.25)])),
                ],
            )?;
            ctx.register_batch("data", batch)?;
        }
    }

    let profiler = TableProfiler::builder()
        .column_timeout(Duration::from_secs(60))
        .failure_policy(FailurePolicy::MarkAndContinue)
        .log_config(LogConfig::verbose())
        .progress_callback(|p| {
            println!(
                "[{}/{}] {}{}",
                p.completed,
                p.total,
                p.column_name,
                if p.failed { " (failed)" } else { "" }
            );
        })
        .build();

    let report = profiler.profile_session(&ctx, "data").await?;
    println!("{}", report.to_json_pretty()?);

    Ok(())
}

//! Common test fixtures for profiling scenarios.
//!
//! Every fixture registers its tables in a fresh [`SessionContext`] under the
//! default catalog and schema (`datafusion.public`).

use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, BinaryArray, BooleanArray, Date32Array, Decimal128Array, Int32Array,
    Int64Array, ListArray, StringArray, TimestampMillisecondArray,
};
use arrow::datatypes::{DataType, Field, Int64Type, Schema, TimeUnit};
use arrow::record_batch::RecordBatch;
use datafusion::datasource::MemTable;
use datafusion::prelude::*;

use crate::error::Result;

/// Creates a context with a small table `t` covering nulls, duplicates and
/// decimals:
///
/// | id | name | score |
/// |----|------|-------|
/// | 1  | a    | 10.5  |
/// | 2  | b    | NULL  |
/// | 3  | a    | 10.5  |
/// | 4  | NULL | NULL  |
/// | 5  | c    | 20.0  |
pub async fn create_scenario_context() -> Result<SessionContext> {
    let ctx = SessionContext::new();

    let schema = Arc::new(Schema::new(vec![
        Field::new("id", DataType::Int32, false),
        Field::new("name", DataType::Utf8, true),
        Field::new("score", DataType::Decimal128(5, 1), true),
    ]));

    let scores = Decimal128Array::from(vec![Some(105), None, Some(105), None, Some(200)])
        .with_precision_and_scale(5, 1)?;

    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(Int32Array::from(vec![1, 2, 3, 4, 5])),
            Arc::new(StringArray::from(vec![
                Some("a"),
                Some("b"),
                Some("a"),
                None,
                Some("c"),
            ])),
            Arc::new(scores),
        ],
    )?;

    let table = MemTable::try_new(schema, vec![vec![batch]])?;
    ctx.register_table("t", Arc::new(table))?;

    Ok(ctx)
}

/// Creates a context with a zero-row table `empty` of three columns.
pub async fn create_empty_context() -> Result<SessionContext> {
    let ctx = SessionContext::new();

    let schema = Arc::new(Schema::new(vec![
        Field::new("id", DataType::Int64, false),
        Field::new("label", DataType::Utf8, true),
        Field::new("payload", DataType::Binary, true),
    ]));

    let table = MemTable::try_new(schema, vec![vec![]])?;
    ctx.register_table("empty", Arc::new(table))?;

    Ok(ctx)
}

/// Creates a context with a table `mixed` holding one column per type
/// category, plus a list column that has no dedicated rendering rule.
pub async fn create_mixed_types_context() -> Result<SessionContext> {
    let ctx = SessionContext::new();

    let tags = ListArray::from_iter_primitive::<Int64Type, _, _>(vec![
        Some(vec![Some(1), Some(2)]),
        None,
        Some(vec![Some(3)]),
        Some(vec![Some(1), Some(2)]),
    ]);

    let schema = Arc::new(Schema::new(vec![
        Field::new("flag", DataType::Boolean, true),
        Field::new("day", DataType::Date32, true),
        Field::new(
            "seen_at",
            DataType::Timestamp(TimeUnit::Millisecond, None),
            true,
        ),
        Field::new("blob", DataType::Binary, true),
        Field::new("note", DataType::Utf8, true),
        Field::new("tags", tags.data_type().clone(), true),
    ]));

    // 2024-01-01 and 2024-01-31
    let days = Date32Array::from(vec![Some(19723), Some(19753), None, Some(19723)]);
    let seen_at = TimestampMillisecondArray::from(vec![
        Some(1_704_067_200_000),
        None,
        Some(1_704_153_600_000),
        Some(1_704_067_200_000),
    ]);
    let blobs = BinaryArray::from(vec![
        Some(b"\x00\x01".as_ref()),
        Some(b"\xff".as_ref()),
        None,
        Some(b"\xca\xfe\xba\xbe".as_ref()),
    ]);
    let notes = StringArray::from(vec![
        Some("héllo wörld"),
        Some("short"),
        None,
        Some("ünïcödé text that runs on for a while"),
    ]);

    let columns: Vec<ArrayRef> = vec![
        Arc::new(BooleanArray::from(vec![Some(true), Some(false), None, Some(true)])),
        Arc::new(days),
        Arc::new(seen_at),
        Arc::new(blobs),
        Arc::new(notes),
        Arc::new(tags),
    ];

    let batch = RecordBatch::try_new(schema.clone(), columns)?;
    let table = MemTable::try_new(schema, vec![vec![batch]])?;
    ctx.register_table("mixed", Arc::new(table))?;

    Ok(ctx)
}

/// Creates a context with a table `wide` of `columns` Int64 columns
/// (`c1`..`cN`) and `rows` rows. Every fifth value of each column is NULL.
pub async fn create_wide_context(columns: usize, rows: usize) -> Result<SessionContext> {
    let ctx = SessionContext::new();

    let fields: Vec<Field> = (1..=columns)
        .map(|i| Field::new(format!("c{i}"), DataType::Int64, true))
        .collect();
    let schema = Arc::new(Schema::new(fields));

    let arrays: Vec<ArrayRef> = (1..=columns)
        .map(|i| {
            let values: Vec<Option<i64>> = (0..rows)
                .map(|row| (row % 5 != 0).then_some((row * i) as i64 % 97))
                .collect();
            Arc::new(Int64Array::from(values)) as ArrayRef
        })
        .collect();

    let batch = RecordBatch::try_new(schema.clone(), arrays)?;
    let table = MemTable::try_new(schema, vec![vec![batch]])?;
    ctx.register_table("wide", Arc::new(table))?;

    Ok(ctx)
}

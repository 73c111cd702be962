//! Table identifiers and column discovery.

use std::fmt;
use std::str::FromStr;

use arrow::datatypes::{DataType, Schema};
use tracing::{debug, instrument};

use crate::error::{ProfileError, Result};
use crate::executor::ProfileExecutor;
use crate::normalizer::TypeCategory;
use crate::security::SqlSecurity;

/// A possibly qualified table name.
///
/// Missing parts resolve to the executor's default catalog and schema.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableIdentifier {
    catalog: Option<String>,
    schema: Option<String>,
    table: String,
}

impl TableIdentifier {
    /// Creates a `schema.table` identifier. Segments may contain any
    /// characters accepted by [`SqlSecurity::validate_identifier`].
    pub fn new(schema: impl Into<String>, table: impl Into<String>) -> Result<Self> {
        let schema = schema.into();
        let table = table.into();
        SqlSecurity::validate_identifier(&schema)?;
        SqlSecurity::validate_identifier(&table)?;
        Ok(Self {
            catalog: None,
            schema: Some(schema),
            table,
        })
    }

    /// Creates an identifier resolved against the default schema.
    pub fn bare(table: impl Into<String>) -> Result<Self> {
        let table = table.into();
        SqlSecurity::validate_identifier(&table)?;
        Ok(Self {
            catalog: None,
            schema: None,
            table,
        })
    }

    /// Qualifies the identifier with a catalog.
    pub fn with_catalog(mut self, catalog: impl Into<String>) -> Result<Self> {
        let catalog = catalog.into();
        SqlSecurity::validate_identifier(&catalog)?;
        self.catalog = Some(catalog);
        Ok(self)
    }

    /// Parses `table`, `schema.table` or `catalog.schema.table`.
    pub fn parse(path: &str) -> Result<Self> {
        let segments: Vec<&str> = path.split('.').collect();
        for segment in &segments {
            SqlSecurity::validate_path_segment(segment)?;
        }

        match segments.as_slice() {
            [table] => Self::bare(*table),
            [schema, table] => Self::new(*schema, *table),
            [catalog, schema, table] => Self::new(*schema, *table)?.with_catalog(*catalog),
            _ => Err(ProfileError::SecurityError(format!(
                "Table path '{path}' has too many segments"
            ))),
        }
    }

    pub fn catalog(&self) -> Option<&str> {
        self.catalog.as_deref()
    }

    pub fn schema(&self) -> Option<&str> {
        self.schema.as_deref()
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Quoted form for embedding in generated SQL.
    pub fn to_sql(&self) -> Result<String> {
        let parts = [self.catalog.as_deref(), self.schema.as_deref()]
            .into_iter()
            .flatten()
            .chain(std::iter::once(self.table.as_str()))
            .map(SqlSecurity::quote_identifier)
            .collect::<Result<Vec<_>>>()?;
        Ok(parts.join("."))
    }
}

impl fmt::Display for TableIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(catalog) = &self.catalog {
            write!(f, "{catalog}.")?;
        }
        if let Some(schema) = &self.schema {
            write!(f, "{schema}.")?;
        }
        write!(f, "{}", self.table)
    }
}

impl FromStr for TableIdentifier {
    type Err = ProfileError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Metadata of one discovered column.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDescriptor {
    /// 1-based position in the table's declared column order
    pub ordinal: usize,
    pub name: String,
    pub declared_type: String,
    /// Fixed storage width in bytes; `None` for variable-length types
    pub declared_max_length: Option<u32>,
    pub data_type: DataType,
    pub category: TypeCategory,
    pub nullable: bool,
}

impl ColumnDescriptor {
    pub fn new(
        ordinal: usize,
        name: impl Into<String>,
        data_type: DataType,
        nullable: bool,
    ) -> Self {
        Self {
            ordinal,
            name: name.into(),
            declared_type: data_type.to_string(),
            declared_max_length: declared_max_length(&data_type),
            category: TypeCategory::of(&data_type),
            data_type,
            nullable,
        }
    }
}

/// Storage width of fixed-width types, in bytes.
pub fn declared_max_length(data_type: &DataType) -> Option<u32> {
    match data_type {
        DataType::Boolean | DataType::Int8 | DataType::UInt8 => Some(1),
        DataType::Int16 | DataType::UInt16 | DataType::Float16 => Some(2),
        DataType::Int32
        | DataType::UInt32
        | DataType::Float32
        | DataType::Date32
        | DataType::Time32(_) => Some(4),
        DataType::Int64
        | DataType::UInt64
        | DataType::Float64
        | DataType::Date64
        | DataType::Time64(_)
        | DataType::Timestamp(_, _)
        | DataType::Duration(_) => Some(8),
        DataType::Decimal128(_, _) => Some(16),
        DataType::Decimal256(_, _) => Some(32),
        DataType::FixedSizeBinary(width) => u32::try_from(*width).ok(),
        DataType::Dictionary(_, value_type) => declared_max_length(value_type),
        _ => None,
    }
}

/// Reads column metadata from the executor's catalog.
pub struct SchemaInspector<'a> {
    executor: &'a dyn ProfileExecutor,
}

impl<'a> SchemaInspector<'a> {
    pub fn new(executor: &'a dyn ProfileExecutor) -> Self {
        Self { executor }
    }

    /// Lists the table's columns in declared order.
    ///
    /// Fails with [`ProfileError::TableNotFound`] when the identifier does not
    /// resolve and with [`ProfileError::ColumnDiscovery`] when the catalog read
    /// itself fails.
    #[instrument(skip(self, table), fields(table = %table))]
    pub async fn list_columns(&self, table: &TableIdentifier) -> Result<Vec<ColumnDescriptor>> {
        let schema = self
            .executor
            .lookup_table(table)
            .await
            .map_err(|e| ProfileError::column_discovery(table, Box::new(e)))?
            .ok_or_else(|| ProfileError::table_not_found(table))?;

        let columns = describe(&schema);
        debug!(columns = columns.len(), "Discovered columns");
        Ok(columns)
    }
}

/// Converts an Arrow schema into ordered descriptors.
pub fn describe(schema: &Schema) -> Vec<ColumnDescriptor> {
    schema
        .fields()
        .iter()
        .enumerate()
        .map(|(idx, field)| {
            ColumnDescriptor::new(
                idx + 1,
                field.name(),
                field.data_type().clone(),
                field.is_nullable(),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::datatypes::{Field, TimeUnit};

    #[test]
    fn test_parse_identifiers() {
        let id = TableIdentifier::parse("orders").unwrap();
        assert_eq!(id.schema(), None);
        assert_eq!(id.table(), "orders");
        assert_eq!(id.to_sql().unwrap(), "\"orders\"");

        let id: TableIdentifier = "public.orders".parse().unwrap();
        assert_eq!(id.schema(), Some("public"));
        assert_eq!(id.to_string(), "public.orders");
        assert_eq!(id.to_sql().unwrap(), "\"public\".\"orders\"");

        let id = TableIdentifier::parse("datafusion.public.orders").unwrap();
        assert_eq!(id.catalog(), Some("datafusion"));
        assert_eq!(
            id.to_sql().unwrap(),
            "\"datafusion\".\"public\".\"orders\""
        );

        assert!(TableIdentifier::parse("a.b.c.d").is_err());
        assert!(TableIdentifier::parse("public.").is_err());
        assert!(TableIdentifier::parse("orders; DROP TABLE x").is_err());
    }

    #[test]
    fn test_new_allows_quoted_names() {
        let id = TableIdentifier::new("Sales Data", "Q1 \"final\"").unwrap();
        assert_eq!(
            id.to_sql().unwrap(),
            "\"Sales Data\".\"Q1 \"\"final\"\"\""
        );
        assert!(TableIdentifier::new("public", "").is_err());
    }

    #[test]
    fn test_declared_max_length() {
        assert_eq!(declared_max_length(&DataType::Int32), Some(4));
        assert_eq!(declared_max_length(&DataType::Int64), Some(8));
        assert_eq!(declared_max_length(&DataType::Decimal128(5, 1)), Some(16));
        assert_eq!(
            declared_max_length(&DataType::Timestamp(TimeUnit::Nanosecond, None)),
            Some(8)
        );
        assert_eq!(declared_max_length(&DataType::FixedSizeBinary(20)), Some(20));
        assert_eq!(declared_max_length(&DataType::Utf8), None);
        assert_eq!(declared_max_length(&DataType::Binary), None);
    }

    #[test]
    fn test_describe_keeps_declared_order() {
        let schema = Schema::new(vec![
            Field::new("zeta", DataType::Utf8, true),
            Field::new("alpha", DataType::Int32, false),
            Field::new("mid", DataType::Boolean, true),
        ]);

        let columns = describe(&schema);
        let names: Vec<_> = columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["zeta", "alpha", "mid"]);
        assert_eq!(columns[0].ordinal, 1);
        assert_eq!(columns[2].ordinal, 3);
        assert_eq!(columns[1].category, TypeCategory::Numeric);
        assert!(!columns[1].nullable);
        assert_eq!(columns[1].declared_type, "Int32");
    }
}

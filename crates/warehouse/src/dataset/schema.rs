//! Catalog type to Arrow type mapping and schema construction.

use std::fmt;

use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
use serde::{Deserialize, Serialize};

/// Column type families understood by the writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnType {
    BigInt,
    Double,
    Boolean,
    Timestamp,
    String,
}

impl ColumnType {
    /// Map a catalog type string onto a writer type family.
    ///
    /// Catalog types are documented at:
    /// <https://docs.aws.amazon.com/athena/latest/ug/data-types.html>
    pub fn parse(catalog_type: &str) -> Self {
        let normalized = catalog_type.trim().to_lowercase();
        // Parameters such as the precision in `decimal(10,2)` do not change the family.
        let base = normalized
            .split_once('(')
            .map_or(normalized.as_str(), |(base, _)| base.trim_end());

        match base {
            // Integer family
            "tinyint" | "smallint" | "int" | "integer" | "bigint" | "long" => ColumnType::BigInt,

            // Floating-point family
            "float" | "real" | "double" | "decimal" => ColumnType::Double,

            "boolean" | "bool" => ColumnType::Boolean,

            "timestamp" | "timestamp with time zone" => ColumnType::Timestamp,

            // Dates stay text ("2025-01-15"); so do varchar, char, string
            // and nested types.
            _ => ColumnType::String,
        }
    }

    pub fn to_arrow(self) -> DataType {
        match self {
            ColumnType::BigInt => DataType::Int64,
            ColumnType::Double => DataType::Float64,
            ColumnType::Boolean => DataType::Boolean,
            ColumnType::Timestamp => DataType::Timestamp(TimeUnit::Millisecond, Some("UTC".into())),
            ColumnType::String => DataType::Utf8,
        }
    }

    /// Catalog type name written for this family.
    pub fn catalog_name(self) -> &'static str {
        match self {
            ColumnType::BigInt => "bigint",
            ColumnType::Double => "double",
            ColumnType::Boolean => "boolean",
            ColumnType::Timestamp => "timestamp",
            ColumnType::String => "string",
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.catalog_name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    pub column_type: ColumnType,
}

/// Explicit column layout for records written to a table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    pub columns: Vec<ColumnSpec>,
}

impl TableSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a column, parsing its catalog type string.
    pub fn column(mut self, name: impl Into<String>, catalog_type: &str) -> Self {
        self.columns.push(ColumnSpec {
            name: name.into(),
            column_type: ColumnType::parse(catalog_type),
        });
        self
    }

    /// Parse `name:type,name:type` (the CLI's `--schema` flag). A column
    /// without a type is a string column.
    pub fn parse_list(spec: &str) -> Self {
        spec.split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .fold(Self::new(), |schema, part| match part.split_once(':') {
                Some((name, ty)) => schema.column(name.trim(), ty),
                None => schema.column(part, "string"),
            })
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Arrow schema with every column nullable.
    pub fn to_arrow(&self) -> Schema {
        let fields: Vec<Field> = self
            .columns
            .iter()
            .map(|col| Field::new(&col.name, col.column_type.to_arrow(), true))
            .collect();
        Schema::new(fields)
    }
}

//! Columnar source catalogs.
//!
//! A catalog is an ordered set of rows under a fixed schema of named, typed
//! columns. Rows carry no identity beyond their position.

use crate::error::RegistryError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;

pub const CATALOG_SCHEMA: u32 = 1;

/// Storage type of a catalog column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dtype {
    Float64,
    Float32,
    Int64,
    Bool,
    String,
}

impl Dtype {
    /// Floating columns are the ones eligible for tolerance comparison.
    pub fn is_floating(self) -> bool {
        matches!(self, Self::Float64 | Self::Float32)
    }
}

impl std::fmt::Display for Dtype {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Float64 => "float64",
            Self::Float32 => "float32",
            Self::Int64 => "int64",
            Self::Bool => "bool",
            Self::String => "string",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    Float64(Vec<f64>),
    Float32(Vec<f32>),
    Int64(Vec<i64>),
    Bool(Vec<bool>),
    String(Vec<String>),
}

impl ColumnData {
    pub fn dtype(&self) -> Dtype {
        match self {
            Self::Float64(_) => Dtype::Float64,
            Self::Float32(_) => Dtype::Float32,
            Self::Int64(_) => Dtype::Int64,
            Self::Bool(_) => Dtype::Bool,
            Self::String(_) => Dtype::String,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Float64(v) => v.len(),
            Self::Float32(v) => v.len(),
            Self::Int64(v) => v.len(),
            Self::Bool(v) => v.len(),
            Self::String(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One named catalog column.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub data: ColumnData,
}

impl Column {
    pub fn float64(name: impl Into<String>, values: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            data: ColumnData::Float64(values),
        }
    }

    pub fn float32(name: impl Into<String>, values: Vec<f32>) -> Self {
        Self {
            name: name.into(),
            data: ColumnData::Float32(values),
        }
    }

    pub fn int64(name: impl Into<String>, values: Vec<i64>) -> Self {
        Self {
            name: name.into(),
            data: ColumnData::Int64(values),
        }
    }

    pub fn flag(name: impl Into<String>, values: Vec<bool>) -> Self {
        Self {
            name: name.into(),
            data: ColumnData::Bool(values),
        }
    }

    pub fn string(name: impl Into<String>, values: Vec<String>) -> Self {
        Self {
            name: name.into(),
            data: ColumnData::String(values),
        }
    }

    pub fn dtype(&self) -> Dtype {
        self.data.dtype()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Value at `row` widened to `f64`; `None` for non-floating columns or
    /// out-of-range rows.
    pub fn float_at(&self, row: usize) -> Option<f64> {
        match &self.data {
            ColumnData::Float64(v) => v.get(row).copied(),
            ColumnData::Float32(v) => v.get(row).map(|value| f64::from(*value)),
            _ => None,
        }
    }
}

/// An immutable, column-oriented source catalog.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Catalog {
    columns: Vec<Column>,
    rows: usize,
}

impl Catalog {
    /// Build a catalog, rejecting ragged or duplicate columns.
    pub fn new(columns: Vec<Column>) -> Result<Self, RegistryError> {
        let rows = columns.first().map(Column::len).unwrap_or(0);
        let mut seen = BTreeSet::new();
        for column in &columns {
            if !seen.insert(column.name.as_str()) {
                return Err(RegistryError::InvalidCatalog(format!(
                    "duplicate column `{}`",
                    column.name
                )));
            }
            if column.len() != rows {
                return Err(RegistryError::InvalidCatalog(format!(
                    "column `{}` has {} rows, expected {rows}",
                    column.name,
                    column.len()
                )));
            }
        }
        Ok(Self { columns, rows })
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|column| column.name == name)
    }

    /// Names of floating columns, in schema order.
    pub fn float_column_names(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|column| column.dtype().is_floating())
            .map(|column| column.name.as_str())
            .collect()
    }

    /// Parse the on-disk JSON representation.
    pub fn from_json_str(text: &str) -> Result<Self, RegistryError> {
        let document: CatalogDocument =
            serde_json::from_str(text).map_err(|e| RegistryError::InvalidCatalog(e.to_string()))?;
        if document.schema != CATALOG_SCHEMA {
            return Err(RegistryError::InvalidCatalog(format!(
                "unsupported catalog schema {} (expected {CATALOG_SCHEMA})",
                document.schema
            )));
        }
        let columns = document
            .columns
            .into_iter()
            .map(ColumnRecord::into_column)
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(columns)
    }

    /// Render the on-disk JSON representation. NaN floats become `null`.
    pub fn to_json_value(&self) -> Value {
        let columns: Vec<Value> = self
            .columns
            .iter()
            .map(|column| {
                let values: Vec<Value> = match &column.data {
                    ColumnData::Float64(v) => v.iter().map(|x| float_json(*x)).collect(),
                    ColumnData::Float32(v) => v.iter().map(|x| float_json(f64::from(*x))).collect(),
                    ColumnData::Int64(v) => v.iter().map(|x| Value::from(*x)).collect(),
                    ColumnData::Bool(v) => v.iter().map(|x| Value::from(*x)).collect(),
                    ColumnData::String(v) => v.iter().map(|x| Value::from(x.as_str())).collect(),
                };
                serde_json::json!({
                    "name": column.name,
                    "dtype": column.dtype(),
                    "values": values,
                })
            })
            .collect();
        serde_json::json!({ "schema": CATALOG_SCHEMA, "columns": columns })
    }
}

fn float_json(value: f64) -> Value {
    serde_json::Number::from_f64(value)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CatalogDocument {
    schema: u32,
    columns: Vec<ColumnRecord>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ColumnRecord {
    name: String,
    dtype: Dtype,
    values: Vec<Value>,
}

impl ColumnRecord {
    fn into_column(self) -> Result<Column, RegistryError> {
        let name = self.name;
        let bad = |row: usize, value: &Value| {
            RegistryError::InvalidCatalog(format!(
                "column `{name}` row {row}: {value} is not a valid {} value",
                self.dtype
            ))
        };
        let data = match self.dtype {
            Dtype::Float64 => ColumnData::Float64(
                self.values
                    .iter()
                    .enumerate()
                    .map(|(row, value)| parse_float(value).ok_or_else(|| bad(row, value)))
                    .collect::<Result<_, _>>()?,
            ),
            Dtype::Float32 => ColumnData::Float32(
                self.values
                    .iter()
                    .enumerate()
                    .map(|(row, value)| {
                        parse_float(value)
                            .map(|x| x as f32)
                            .ok_or_else(|| bad(row, value))
                    })
                    .collect::<Result<_, _>>()?,
            ),
            Dtype::Int64 => ColumnData::Int64(
                self.values
                    .iter()
                    .enumerate()
                    .map(|(row, value)| value.as_i64().ok_or_else(|| bad(row, value)))
                    .collect::<Result<_, _>>()?,
            ),
            Dtype::Bool => ColumnData::Bool(
                self.values
                    .iter()
                    .enumerate()
                    .map(|(row, value)| value.as_bool().ok_or_else(|| bad(row, value)))
                    .collect::<Result<_, _>>()?,
            ),
            Dtype::String => ColumnData::String(
                self.values
                    .iter()
                    .enumerate()
                    .map(|(row, value)| {
                        value
                            .as_str()
                            .map(ToOwned::to_owned)
                            .ok_or_else(|| bad(row, value))
                    })
                    .collect::<Result<_, _>>()?,
            ),
        };
        Ok(Column { name, data })
    }
}

/// JSON has no NaN/inf literals: `null` and the strings `nan`, `inf`,
/// `-inf` stand in for them.
pub(crate) fn parse_float(value: &Value) -> Option<f64> {
    match value {
        Value::Null => Some(f64::NAN),
        Value::Number(n) => n.as_f64(),
        Value::String(s) => match s.to_ascii_lowercase().as_str() {
            "nan" => Some(f64::NAN),
            "inf" | "+inf" | "infinity" => Some(f64::INFINITY),
            "-inf" | "-infinity" => Some(f64::NEG_INFINITY),
            _ => None,
        },
        _ => None,
    }
}

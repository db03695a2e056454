//! Embedded relational catalog
//!
//! Tables of typed rows, either built in code or loaded from a JSON file:
//!
//! ```json
//! {"tables": [{
//!     "name": "users",
//!     "columns": [{"name": "id", "type": "int64"},
//!                 {"name": "born", "type": "date", "nullable": true}],
//!     "rows": [[1, "1990-05-17"], [2, null]]
//! }]}
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::api::{ConnectorError, ConnectorResult};
use crate::config::{ConfigError, ConfigResult};
use crate::conversion::Decimal;
use crate::observability::{Event, Logger};
use crate::paging::NativeValue;

/// Column type as stored in the catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NativeType {
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Float,
    Double,
    Text,
    Bytes,
    Date,
    Datetime,
    Timestamp,
    Decimal { precision: u8, scale: u8 },
}

impl NativeType {
    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            NativeType::Int8
                | NativeType::Int16
                | NativeType::Int32
                | NativeType::Int64
                | NativeType::Uint8
                | NativeType::Uint16
                | NativeType::Uint32
                | NativeType::Uint64
        )
    }

    /// Whether `value` is a non-null value of this type
    pub fn holds(&self, value: &NativeValue) -> bool {
        matches!(
            (self, value),
            (NativeType::Bool, NativeValue::Bool(_))
                | (NativeType::Int8, NativeValue::Int8(_))
                | (NativeType::Int16, NativeValue::Int16(_))
                | (NativeType::Int32, NativeValue::Int32(_))
                | (NativeType::Int64, NativeValue::Int64(_))
                | (NativeType::Uint8, NativeValue::Uint8(_))
                | (NativeType::Uint16, NativeValue::Uint16(_))
                | (NativeType::Uint32, NativeValue::Uint32(_))
                | (NativeType::Uint64, NativeValue::Uint64(_))
                | (NativeType::Float, NativeValue::Float(_))
                | (NativeType::Double, NativeValue::Double(_))
                | (NativeType::Text, NativeValue::Text(_))
                | (NativeType::Bytes, NativeValue::Bytes(_))
                | (NativeType::Date, NativeValue::Date(_))
                | (NativeType::Datetime, NativeValue::Datetime(_))
                | (NativeType::Timestamp, NativeValue::Timestamp(_))
                | (NativeType::Decimal { .. }, NativeValue::Decimal(_))
        )
    }

    /// Parses a JSON cell of this type
    pub fn parse_json(&self, value: &Value) -> ConnectorResult<NativeValue> {
        if value.is_null() {
            return Ok(NativeValue::Null);
        }
        let mismatch = || ConnectorError::DataTypeMismatch(format!("{} is not a {:?}", value, self));
        let text = || value.as_str().ok_or_else(mismatch);
        let int = || -> ConnectorResult<i128> {
            value
                .as_i64()
                .map(i128::from)
                .or_else(|| value.as_u64().map(i128::from))
                .ok_or_else(mismatch)
        };
        let narrow = |n: i128| -> ConnectorResult<NativeValue> {
            let out = |_| mismatch();
            Ok(match self {
                NativeType::Int8 => NativeValue::Int8(i8::try_from(n).map_err(out)?),
                NativeType::Int16 => NativeValue::Int16(i16::try_from(n).map_err(out)?),
                NativeType::Int32 => NativeValue::Int32(i32::try_from(n).map_err(out)?),
                NativeType::Int64 => NativeValue::Int64(i64::try_from(n).map_err(out)?),
                NativeType::Uint8 => NativeValue::Uint8(u8::try_from(n).map_err(out)?),
                NativeType::Uint16 => NativeValue::Uint16(u16::try_from(n).map_err(out)?),
                NativeType::Uint32 => NativeValue::Uint32(u32::try_from(n).map_err(out)?),
                _ => NativeValue::Uint64(u64::try_from(n).map_err(out)?),
            })
        };

        match self {
            NativeType::Bool => value.as_bool().map(NativeValue::Bool).ok_or_else(mismatch),
            t if t.is_integer() => narrow(int()?),
            NativeType::Float => value
                .as_f64()
                .map(|f| NativeValue::Float(f as f32))
                .ok_or_else(mismatch),
            NativeType::Double => value.as_f64().map(NativeValue::Double).ok_or_else(mismatch),
            NativeType::Text => Ok(NativeValue::Text(text()?.to_string())),
            NativeType::Bytes => STANDARD
                .decode(text()?)
                .map(NativeValue::Bytes)
                .map_err(|_| mismatch()),
            NativeType::Date => NaiveDate::parse_from_str(text()?, "%Y-%m-%d")
                .map(NativeValue::Date)
                .map_err(|_| mismatch()),
            NativeType::Datetime => {
                let s = text()?;
                NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S")
                    .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S"))
                    .map(NativeValue::Datetime)
                    .map_err(|_| mismatch())
            }
            NativeType::Timestamp => DateTime::parse_from_rfc3339(text()?)
                .map(|t| NativeValue::Timestamp(t.with_timezone(&Utc)))
                .map_err(|_| mismatch()),
            NativeType::Decimal { .. } => {
                let repr = match value {
                    Value::String(s) => s.clone(),
                    Value::Number(n) => n.to_string(),
                    _ => return Err(mismatch()),
                };
                repr.parse::<Decimal>().map(NativeValue::Decimal)
            }
            _ => Err(mismatch()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogColumn {
    pub name: String,
    #[serde(rename = "type")]
    pub native_type: NativeType,
    #[serde(default)]
    pub nullable: bool,
}

impl CatalogColumn {
    pub fn new(name: impl Into<String>, native_type: NativeType) -> Self {
        Self {
            name: name.into(),
            native_type,
            nullable: false,
        }
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub name: String,
    pub columns: Vec<CatalogColumn>,
    rows: Vec<Vec<NativeValue>>,
}

impl Table {
    pub fn new(name: impl Into<String>, columns: Vec<CatalogColumn>) -> Self {
        Self {
            name: name.into(),
            columns,
            rows: Vec::new(),
        }
    }

    /// Appends a row after checking arity, types and nullability
    pub fn push_row(&mut self, row: Vec<NativeValue>) -> ConnectorResult<()> {
        if row.len() != self.columns.len() {
            return Err(ConnectorError::invalid_request(format!(
                "table {}: row has {} values, expected {}",
                self.name,
                row.len(),
                self.columns.len()
            )));
        }
        for (column, value) in self.columns.iter().zip(&row) {
            let valid = if value.is_null() {
                column.nullable
            } else {
                column.native_type.holds(value)
            };
            if !valid {
                return Err(ConnectorError::DataTypeMismatch(format!(
                    "table {}: column {} of type {:?} cannot hold a {} value",
                    self.name,
                    column.name,
                    column.native_type,
                    value.type_name()
                )));
            }
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn with_rows(mut self, rows: Vec<Vec<NativeValue>>) -> ConnectorResult<Self> {
        for row in rows {
            self.push_row(row)?;
        }
        Ok(self)
    }

    pub fn rows(&self) -> &[Vec<NativeValue>] {
        &self.rows
    }

    pub fn row_count(&self) -> u64 {
        self.rows.len() as u64
    }

    pub fn position(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == column)
    }

    pub fn column(&self, column: &str) -> Option<&CatalogColumn> {
        self.columns.iter().find(|c| c.name == column)
    }
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    tables: Vec<TableFile>,
}

#[derive(Debug, Deserialize)]
struct TableFile {
    name: String,
    columns: Vec<CatalogColumn>,
    #[serde(default)]
    rows: Vec<Vec<Value>>,
}

/// All tables of the memory backend
#[derive(Debug, Clone, Default)]
pub struct MemoryCatalog {
    tables: HashMap<String, Table>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(mut self, table: Table) -> Self {
        self.add_table(table);
        self
    }

    pub fn add_table(&mut self, table: Table) {
        self.tables.insert(table.name.clone(), table);
    }

    pub fn table(&self, name: &str) -> ConnectorResult<&Table> {
        if name.is_empty() {
            return Err(ConnectorError::EmptyTableName);
        }
        self.tables
            .get(name)
            .ok_or_else(|| ConnectorError::TableNotFound(name.to_string()))
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Load a catalog from a JSON file
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let catalog = Self::from_json(&content)?;
        Logger::info(
            Event::CatalogLoaded.as_str(),
            &[
                ("path", &path.display().to_string()),
                ("tables", &catalog.len().to_string()),
            ],
        );
        Ok(catalog)
    }

    pub fn from_json(content: &str) -> ConfigResult<Self> {
        let file: CatalogFile =
            serde_json::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;

        let mut catalog = Self::new();
        for table_file in file.tables {
            let mut table = Table::new(table_file.name, table_file.columns);
            for (i, cells) in table_file.rows.iter().enumerate() {
                let row = parse_row(&table, cells).map_err(|e| {
                    ConfigError::invalid(format!("table {} row {}: {}", table.name, i, e))
                })?;
                table
                    .push_row(row)
                    .map_err(|e| ConfigError::invalid(e.to_string()))?;
            }
            catalog.add_table(table);
        }
        Ok(catalog)
    }
}

fn parse_row(table: &Table, cells: &[Value]) -> ConnectorResult<Vec<NativeValue>> {
    if cells.len() != table.columns.len() {
        return Err(ConnectorError::invalid_request(format!(
            "{} cells for {} columns",
            cells.len(),
            table.columns.len()
        )));
    }
    table
        .columns
        .iter()
        .zip(cells)
        .map(|(column, cell)| column.native_type.parse_json(cell))
        .collect()
}

//! Columnar Buffers
//!
//! A buffer accumulates converted rows of one page and serializes them into
//! a `PagePayload` when the page is sealed. Sealing resets the buffer so the
//! same instance serves every page of a split.

use std::io::Cursor;
use std::sync::Arc;

use arrow::array::{
    ArrayRef, BinaryBuilder, FixedSizeBinaryBuilder, Float32Builder, Float64Builder,
    Int16Builder, Int32Builder, Int64Builder, Int8Builder, StringBuilder, UInt16Builder,
    UInt32Builder, UInt64Builder, UInt8Builder,
};
use arrow::datatypes::{DataType, Field, Schema as ArrowSchema, SchemaRef};
use arrow::ipc::reader::StreamReader;
use arrow::ipc::writer::StreamWriter;
use arrow::record_batch::{RecordBatch, RecordBatchOptions};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde_json::{Number, Value};

use super::wire_value::WireValue;
use crate::api::{
    Column, ColumnSet, ColumnValues, ConnectorError, ConnectorResult, PagePayload, PrimitiveType,
    WireType,
};
use crate::conversion::Decimal;

/// Accumulates the rows of one page
pub trait ColumnarBuffer: Send {
    /// Appends one value to `column` of the current row
    fn append(&mut self, column: usize, value: WireValue<'_>) -> ConnectorResult<()>;

    /// Closes the current row
    fn end_row(&mut self);

    /// Rows appended since the last seal
    fn rows(&self) -> usize;

    /// Serializes the accumulated rows and resets the buffer
    fn seal(&mut self) -> ConnectorResult<PagePayload>;
}

// ==================
// Physical layout
// ==================

/// Physical representation of a wire type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhysicalType {
    Int8,
    Uint8,
    Int16,
    Uint16,
    Int32,
    Uint32,
    Int64,
    Uint64,
    Float,
    Double,
    Binary,
    Utf8,
    /// 16-byte mantissa at the given scale
    Decimal(u8),
}

impl PhysicalType {
    pub fn of(wire_type: &WireType) -> ConnectorResult<Self> {
        match wire_type.base() {
            WireType::Primitive(p) => Ok(match p {
                PrimitiveType::Bool | PrimitiveType::Uint8 => PhysicalType::Uint8,
                PrimitiveType::Int8 => PhysicalType::Int8,
                PrimitiveType::Int16 => PhysicalType::Int16,
                PrimitiveType::Uint16 | PrimitiveType::Date => PhysicalType::Uint16,
                PrimitiveType::Int32 => PhysicalType::Int32,
                PrimitiveType::Uint32 | PrimitiveType::Datetime => PhysicalType::Uint32,
                PrimitiveType::Int64 => PhysicalType::Int64,
                PrimitiveType::Uint64 | PrimitiveType::Timestamp => PhysicalType::Uint64,
                PrimitiveType::Float => PhysicalType::Float,
                PrimitiveType::Double => PhysicalType::Double,
                PrimitiveType::String => PhysicalType::Binary,
                PrimitiveType::Utf8 | PrimitiveType::Json => PhysicalType::Utf8,
            }),
            WireType::Decimal { scale, .. } => Ok(PhysicalType::Decimal(*scale)),
            other => Err(ConnectorError::DataTypeNotSupported(other.to_string())),
        }
    }

    pub fn arrow_type(&self) -> DataType {
        match self {
            PhysicalType::Int8 => DataType::Int8,
            PhysicalType::Uint8 => DataType::UInt8,
            PhysicalType::Int16 => DataType::Int16,
            PhysicalType::Uint16 => DataType::UInt16,
            PhysicalType::Int32 => DataType::Int32,
            PhysicalType::Uint32 => DataType::UInt32,
            PhysicalType::Int64 => DataType::Int64,
            PhysicalType::Uint64 => DataType::UInt64,
            PhysicalType::Float => DataType::Float32,
            PhysicalType::Double => DataType::Float64,
            PhysicalType::Binary => DataType::Binary,
            PhysicalType::Utf8 => DataType::Utf8,
            PhysicalType::Decimal(_) => DataType::FixedSizeBinary(16),
        }
    }

    pub fn accepts(&self, value: &WireValue<'_>) -> bool {
        matches!(
            (self, value),
            (_, WireValue::Null)
                | (PhysicalType::Int8, WireValue::Int8(_))
                | (PhysicalType::Uint8, WireValue::Uint8(_))
                | (PhysicalType::Int16, WireValue::Int16(_))
                | (PhysicalType::Uint16, WireValue::Uint16(_))
                | (PhysicalType::Int32, WireValue::Int32(_))
                | (PhysicalType::Uint32, WireValue::Uint32(_))
                | (PhysicalType::Int64, WireValue::Int64(_))
                | (PhysicalType::Uint64, WireValue::Uint64(_))
                | (PhysicalType::Float, WireValue::Float(_))
                | (PhysicalType::Double, WireValue::Double(_))
                | (PhysicalType::Binary, WireValue::Bytes(_))
                | (PhysicalType::Binary, WireValue::Text(_))
                | (PhysicalType::Utf8, WireValue::Text(_))
                | (PhysicalType::Decimal(_), WireValue::Decimal(_))
        )
    }
}

fn mismatch(column: usize, expected: PhysicalType, value: &WireValue<'_>) -> ConnectorError {
    ConnectorError::invariant(format!(
        "column {} expects {:?}, got {} value",
        column,
        expected,
        value.kind()
    ))
}

fn column_out_of_range(column: usize, width: usize) -> ConnectorError {
    ConnectorError::invariant(format!("column {} outside of a {}-column page", column, width))
}

/// Arrow schema for a requested column list; every field is nullable
pub fn arrow_schema(columns: &[Column]) -> ConnectorResult<SchemaRef> {
    let fields = columns
        .iter()
        .map(|c| Ok(Field::new(c.name.clone(), PhysicalType::of(&c.wire_type)?.arrow_type(), true)))
        .collect::<ConnectorResult<Vec<_>>>()?;
    Ok(Arc::new(ArrowSchema::new(fields)))
}

/// Writes one batch as a self-contained Arrow IPC stream
pub fn write_ipc_stream(batch: &RecordBatch) -> ConnectorResult<Vec<u8>> {
    let mut writer = StreamWriter::try_new(Vec::new(), &batch.schema())?;
    writer.write(batch)?;
    writer.finish()?;
    Ok(writer.into_inner()?)
}

/// Reads every batch of an Arrow IPC stream
pub fn read_ipc_stream(bytes: &[u8]) -> ConnectorResult<Vec<RecordBatch>> {
    let reader = StreamReader::try_new(Cursor::new(bytes), None)?;
    let batches = reader.collect::<Result<Vec<_>, _>>()?;
    Ok(batches)
}

// ==================
// Arrow IPC streaming
// ==================

enum ColumnBuilder {
    Int8(Int8Builder),
    Uint8(UInt8Builder),
    Int16(Int16Builder),
    Uint16(UInt16Builder),
    Int32(Int32Builder),
    Uint32(UInt32Builder),
    Int64(Int64Builder),
    Uint64(UInt64Builder),
    Float(Float32Builder),
    Double(Float64Builder),
    Binary(BinaryBuilder),
    Utf8(StringBuilder),
    Decimal(FixedSizeBinaryBuilder),
}

impl ColumnBuilder {
    fn new(physical: PhysicalType) -> Self {
        match physical {
            PhysicalType::Int8 => ColumnBuilder::Int8(Int8Builder::new()),
            PhysicalType::Uint8 => ColumnBuilder::Uint8(UInt8Builder::new()),
            PhysicalType::Int16 => ColumnBuilder::Int16(Int16Builder::new()),
            PhysicalType::Uint16 => ColumnBuilder::Uint16(UInt16Builder::new()),
            PhysicalType::Int32 => ColumnBuilder::Int32(Int32Builder::new()),
            PhysicalType::Uint32 => ColumnBuilder::Uint32(UInt32Builder::new()),
            PhysicalType::Int64 => ColumnBuilder::Int64(Int64Builder::new()),
            PhysicalType::Uint64 => ColumnBuilder::Uint64(UInt64Builder::new()),
            PhysicalType::Float => ColumnBuilder::Float(Float32Builder::new()),
            PhysicalType::Double => ColumnBuilder::Double(Float64Builder::new()),
            PhysicalType::Binary => ColumnBuilder::Binary(BinaryBuilder::new()),
            PhysicalType::Utf8 => ColumnBuilder::Utf8(StringBuilder::new()),
            PhysicalType::Decimal(_) => ColumnBuilder::Decimal(FixedSizeBinaryBuilder::new(16)),
        }
    }

    fn append_null(&mut self) {
        match self {
            ColumnBuilder::Int8(b) => b.append_null(),
            ColumnBuilder::Uint8(b) => b.append_null(),
            ColumnBuilder::Int16(b) => b.append_null(),
            ColumnBuilder::Uint16(b) => b.append_null(),
            ColumnBuilder::Int32(b) => b.append_null(),
            ColumnBuilder::Uint32(b) => b.append_null(),
            ColumnBuilder::Int64(b) => b.append_null(),
            ColumnBuilder::Uint64(b) => b.append_null(),
            ColumnBuilder::Float(b) => b.append_null(),
            ColumnBuilder::Double(b) => b.append_null(),
            ColumnBuilder::Binary(b) => b.append_null(),
            ColumnBuilder::Utf8(b) => b.append_null(),
            ColumnBuilder::Decimal(b) => b.append_null(),
        }
    }

    /// Callers check `PhysicalType::accepts` first
    fn append(&mut self, value: WireValue<'_>) -> ConnectorResult<()> {
        match (self, value) {
            (builder, WireValue::Null) => builder.append_null(),
            (ColumnBuilder::Int8(b), WireValue::Int8(v)) => b.append_value(v),
            (ColumnBuilder::Uint8(b), WireValue::Uint8(v)) => b.append_value(v),
            (ColumnBuilder::Int16(b), WireValue::Int16(v)) => b.append_value(v),
            (ColumnBuilder::Uint16(b), WireValue::Uint16(v)) => b.append_value(v),
            (ColumnBuilder::Int32(b), WireValue::Int32(v)) => b.append_value(v),
            (ColumnBuilder::Uint32(b), WireValue::Uint32(v)) => b.append_value(v),
            (ColumnBuilder::Int64(b), WireValue::Int64(v)) => b.append_value(v),
            (ColumnBuilder::Uint64(b), WireValue::Uint64(v)) => b.append_value(v),
            (ColumnBuilder::Float(b), WireValue::Float(v)) => b.append_value(v),
            (ColumnBuilder::Double(b), WireValue::Double(v)) => b.append_value(v),
            (ColumnBuilder::Binary(b), WireValue::Bytes(v)) => b.append_value(v),
            (ColumnBuilder::Binary(b), WireValue::Text(v)) => b.append_value(v.as_bytes()),
            (ColumnBuilder::Utf8(b), WireValue::Text(v)) => b.append_value(v),
            (ColumnBuilder::Decimal(b), WireValue::Decimal(v)) => b.append_value(v)?,
            (_, value) => {
                return Err(ConnectorError::invariant(format!(
                    "no builder for {} value",
                    value.kind()
                )))
            }
        }
        Ok(())
    }

    fn finish(&mut self) -> ArrayRef {
        match self {
            ColumnBuilder::Int8(b) => Arc::new(b.finish()),
            ColumnBuilder::Uint8(b) => Arc::new(b.finish()),
            ColumnBuilder::Int16(b) => Arc::new(b.finish()),
            ColumnBuilder::Uint16(b) => Arc::new(b.finish()),
            ColumnBuilder::Int32(b) => Arc::new(b.finish()),
            ColumnBuilder::Uint32(b) => Arc::new(b.finish()),
            ColumnBuilder::Int64(b) => Arc::new(b.finish()),
            ColumnBuilder::Uint64(b) => Arc::new(b.finish()),
            ColumnBuilder::Float(b) => Arc::new(b.finish()),
            ColumnBuilder::Double(b) => Arc::new(b.finish()),
            ColumnBuilder::Binary(b) => Arc::new(b.finish()),
            ColumnBuilder::Utf8(b) => Arc::new(b.finish()),
            ColumnBuilder::Decimal(b) => Arc::new(b.finish()),
        }
    }
}

/// Arrow builders sealed into one IPC stream per page
pub struct ArrowBuffer {
    schema: SchemaRef,
    physical: Vec<PhysicalType>,
    builders: Vec<ColumnBuilder>,
    rows: usize,
}

impl ArrowBuffer {
    pub fn new(schema: SchemaRef, physical: Vec<PhysicalType>) -> Self {
        let builders = physical.iter().map(|p| ColumnBuilder::new(*p)).collect();
        Self {
            schema,
            physical,
            builders,
            rows: 0,
        }
    }
}

impl ColumnarBuffer for ArrowBuffer {
    fn append(&mut self, column: usize, value: WireValue<'_>) -> ConnectorResult<()> {
        let width = self.builders.len();
        let expected = *self
            .physical
            .get(column)
            .ok_or_else(|| column_out_of_range(column, width))?;
        if !expected.accepts(&value) {
            return Err(mismatch(column, expected, &value));
        }
        self.builders
            .get_mut(column)
            .ok_or_else(|| column_out_of_range(column, width))?
            .append(value)
    }

    fn end_row(&mut self) {
        self.rows += 1;
    }

    fn rows(&self) -> usize {
        self.rows
    }

    fn seal(&mut self) -> ConnectorResult<PagePayload> {
        let arrays: Vec<ArrayRef> = self.builders.iter_mut().map(|b| b.finish()).collect();
        self.rows = 0;
        let batch = RecordBatch::try_new(self.schema.clone(), arrays)?;
        Ok(PagePayload::ArrowIpc(write_ipc_stream(&batch)?))
    }
}

// ==================
// Zero requested columns
// ==================

/// Counts rows of a select without columns, e.g. `SELECT COUNT(*)`
#[derive(Debug, Default)]
pub struct EmptyColumnsBuffer {
    rows: usize,
}

impl EmptyColumnsBuffer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ColumnarBuffer for EmptyColumnsBuffer {
    fn append(&mut self, column: usize, _value: WireValue<'_>) -> ConnectorResult<()> {
        Err(column_out_of_range(column, 0))
    }

    fn end_row(&mut self) {
        self.rows += 1;
    }

    fn rows(&self) -> usize {
        self.rows
    }

    fn seal(&mut self) -> ConnectorResult<PagePayload> {
        let options = RecordBatchOptions::new().with_row_count(Some(self.rows));
        self.rows = 0;
        let batch =
            RecordBatch::try_new_with_options(Arc::new(ArrowSchema::empty()), vec![], &options)?;
        Ok(PagePayload::ArrowIpc(write_ipc_stream(&batch)?))
    }
}

// ==================
// JSON column set
// ==================

/// Per-column JSON arrays
pub struct ColumnSetBuffer {
    names: Vec<String>,
    physical: Vec<PhysicalType>,
    columns: Vec<Vec<Value>>,
    rows: usize,
}

impl ColumnSetBuffer {
    pub fn new(names: Vec<String>, physical: Vec<PhysicalType>) -> Self {
        let columns = vec![Vec::new(); names.len()];
        Self {
            names,
            physical,
            columns,
            rows: 0,
        }
    }

    fn to_json(physical: PhysicalType, value: WireValue<'_>) -> Value {
        match value {
            WireValue::Null => Value::Null,
            WireValue::Int8(v) => Value::from(v),
            WireValue::Uint8(v) => Value::from(v),
            WireValue::Int16(v) => Value::from(v),
            WireValue::Uint16(v) => Value::from(v),
            WireValue::Int32(v) => Value::from(v),
            WireValue::Uint32(v) => Value::from(v),
            WireValue::Int64(v) => Value::from(v),
            WireValue::Uint64(v) => Value::from(v),
            WireValue::Float(v) => Number::from_f64(f64::from(v))
                .map(Value::Number)
                .unwrap_or(Value::Null),
            WireValue::Double(v) => Number::from_f64(v).map(Value::Number).unwrap_or(Value::Null),
            WireValue::Bytes(v) => Value::String(STANDARD.encode(v.as_ref())),
            WireValue::Text(v) if physical == PhysicalType::Binary => {
                Value::String(STANDARD.encode(v.as_bytes()))
            }
            WireValue::Text(v) => Value::String(v.into_owned()),
            WireValue::Decimal(bytes) => {
                let scale = match physical {
                    PhysicalType::Decimal(scale) => scale,
                    _ => 0,
                };
                Value::String(Decimal::new(i128::from_le_bytes(bytes), scale).to_string())
            }
        }
    }
}

impl ColumnarBuffer for ColumnSetBuffer {
    fn append(&mut self, column: usize, value: WireValue<'_>) -> ConnectorResult<()> {
        let width = self.columns.len();
        let physical = *self
            .physical
            .get(column)
            .ok_or_else(|| column_out_of_range(column, width))?;
        if !physical.accepts(&value) {
            return Err(mismatch(column, physical, &value));
        }
        let values = self
            .columns
            .get_mut(column)
            .ok_or_else(|| column_out_of_range(column, width))?;
        values.push(Self::to_json(physical, value));
        Ok(())
    }

    fn end_row(&mut self) {
        self.rows += 1;
    }

    fn rows(&self) -> usize {
        self.rows
    }

    fn seal(&mut self) -> ConnectorResult<PagePayload> {
        let columns = self
            .names
            .iter()
            .zip(self.columns.iter_mut())
            .map(|(name, values)| ColumnValues {
                name: name.clone(),
                values: std::mem::take(values),
            })
            .collect();
        let set = ColumnSet {
            columns,
            row_count: self.rows as u64,
        };
        self.rows = 0;
        Ok(PagePayload::ColumnSet(set))
    }
}

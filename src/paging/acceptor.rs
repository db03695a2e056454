//! Per-row value holders filled in place by backend drivers

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use crate::conversion::Decimal;

/// Estimated in-memory size of one value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueSize {
    /// Same size for every row of the column
    Fixed(u64),
    /// Must be re-measured for every row
    Variable(u64),
}

impl ValueSize {
    pub fn bytes(&self) -> u64 {
        match self {
            ValueSize::Fixed(n) | ValueSize::Variable(n) => *n,
        }
    }
}

/// A reusable holder for one column of the row being scanned.
///
/// Acceptors are allocated once per split read and overwritten by the
/// driver for every row; appenders only read them.
pub trait Acceptor: Clone + Default + Send + Sync + 'static {
    fn size(&self) -> ValueSize;
}

/// Typed native value of relational backends
#[derive(Debug, Clone, Default, PartialEq)]
pub enum NativeValue {
    #[default]
    Null,
    Bool(bool),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Uint8(u8),
    Uint16(u16),
    Uint32(u32),
    Uint64(u64),
    Float(f32),
    Double(f64),
    Text(String),
    Bytes(Vec<u8>),
    Date(NaiveDate),
    Datetime(NaiveDateTime),
    Timestamp(DateTime<Utc>),
    Decimal(Decimal),
}

impl NativeValue {
    pub fn is_null(&self) -> bool {
        matches!(self, NativeValue::Null)
    }

    /// Variant name used in mismatch errors
    pub fn type_name(&self) -> &'static str {
        match self {
            NativeValue::Null => "null",
            NativeValue::Bool(_) => "bool",
            NativeValue::Int8(_) => "int8",
            NativeValue::Int16(_) => "int16",
            NativeValue::Int32(_) => "int32",
            NativeValue::Int64(_) => "int64",
            NativeValue::Uint8(_) => "uint8",
            NativeValue::Uint16(_) => "uint16",
            NativeValue::Uint32(_) => "uint32",
            NativeValue::Uint64(_) => "uint64",
            NativeValue::Float(_) => "float",
            NativeValue::Double(_) => "double",
            NativeValue::Text(_) => "text",
            NativeValue::Bytes(_) => "bytes",
            NativeValue::Date(_) => "date",
            NativeValue::Datetime(_) => "datetime",
            NativeValue::Timestamp(_) => "timestamp",
            NativeValue::Decimal(_) => "decimal",
        }
    }
}

impl Acceptor for NativeValue {
    fn size(&self) -> ValueSize {
        match self {
            NativeValue::Null => ValueSize::Variable(0),
            NativeValue::Bool(_) | NativeValue::Int8(_) | NativeValue::Uint8(_) => ValueSize::Fixed(1),
            NativeValue::Int16(_) | NativeValue::Uint16(_) => ValueSize::Fixed(2),
            NativeValue::Int32(_) | NativeValue::Uint32(_) | NativeValue::Float(_) => {
                ValueSize::Fixed(4)
            }
            NativeValue::Int64(_)
            | NativeValue::Uint64(_)
            | NativeValue::Double(_)
            | NativeValue::Datetime(_)
            | NativeValue::Timestamp(_) => ValueSize::Fixed(8),
            NativeValue::Date(_) => ValueSize::Fixed(4),
            NativeValue::Decimal(_) => ValueSize::Fixed(16),
            NativeValue::Text(s) => ValueSize::Variable(s.len() as u64),
            NativeValue::Bytes(b) => ValueSize::Variable(b.len() as u64),
        }
    }
}

/// Text-only backends (CSV) scan every column as a string
impl Acceptor for String {
    fn size(&self) -> ValueSize {
        ValueSize::Variable(self.len() as u64)
    }
}

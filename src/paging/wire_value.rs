//! Physical values handed to columnar buffers

use std::borrow::Cow;

/// One converted cell, in its physical wire representation.
///
/// Booleans arrive as `Uint8`, dates as `Uint16` days, datetimes as `Uint32`
/// seconds, timestamps as `Uint64` microseconds.
#[derive(Debug, Clone, PartialEq)]
pub enum WireValue<'a> {
    Null,
    Int8(i8),
    Uint8(u8),
    Int16(i16),
    Uint16(u16),
    Int32(i32),
    Uint32(u32),
    Int64(i64),
    Uint64(u64),
    Float(f32),
    Double(f64),
    Bytes(Cow<'a, [u8]>),
    Text(Cow<'a, str>),
    Decimal([u8; 16]),
}

impl<'a> WireValue<'a> {
    pub fn text(s: &'a str) -> Self {
        WireValue::Text(Cow::Borrowed(s))
    }

    pub fn owned_text(s: String) -> Self {
        WireValue::Text(Cow::Owned(s))
    }

    pub fn bytes(b: &'a [u8]) -> Self {
        WireValue::Bytes(Cow::Borrowed(b))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, WireValue::Null)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            WireValue::Null => "null",
            WireValue::Int8(_) => "int8",
            WireValue::Uint8(_) => "uint8",
            WireValue::Int16(_) => "int16",
            WireValue::Uint16(_) => "uint16",
            WireValue::Int32(_) => "int32",
            WireValue::Uint32(_) => "uint32",
            WireValue::Int64(_) => "int64",
            WireValue::Uint64(_) => "uint64",
            WireValue::Float(_) => "float",
            WireValue::Double(_) => "double",
            WireValue::Bytes(_) => "bytes",
            WireValue::Text(_) => "text",
            WireValue::Decimal(_) => "decimal",
        }
    }
}

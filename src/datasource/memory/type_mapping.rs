//! Catalog types to wire types, and the appenders converting between them

use crate::api::{
    ConnectorError, ConnectorResult, DateTimeFormat, PrimitiveType, TypeMappingSettings, WireType,
};
use crate::conversion::{
    BoolConverter, DateConverter, DateToStringConverter, DatetimeConverter,
    DatetimeToStringConverter, DecimalConverter, NarrowingConverter, TimestampConverter,
    TimestampToStringConverter, ValueConverter,
};
use crate::paging::{appender, Appender, NativeValue, WireValue};

use super::catalog::{CatalogColumn, NativeType};

/// Wire type announced by DescribeTable for a catalog column
pub fn wire_type(column: &CatalogColumn, settings: &TypeMappingSettings) -> WireType {
    let as_string = settings.date_time_format == DateTimeFormat::StringFormat;
    let base = match column.native_type {
        NativeType::Bool => WireType::primitive(PrimitiveType::Bool),
        NativeType::Int8 => WireType::primitive(PrimitiveType::Int8),
        NativeType::Int16 => WireType::primitive(PrimitiveType::Int16),
        NativeType::Int32 => WireType::primitive(PrimitiveType::Int32),
        NativeType::Int64 => WireType::primitive(PrimitiveType::Int64),
        NativeType::Uint8 => WireType::primitive(PrimitiveType::Uint8),
        NativeType::Uint16 => WireType::primitive(PrimitiveType::Uint16),
        NativeType::Uint32 => WireType::primitive(PrimitiveType::Uint32),
        NativeType::Uint64 => WireType::primitive(PrimitiveType::Uint64),
        NativeType::Float => WireType::primitive(PrimitiveType::Float),
        NativeType::Double => WireType::primitive(PrimitiveType::Double),
        NativeType::Text => WireType::primitive(PrimitiveType::Utf8),
        NativeType::Bytes => WireType::primitive(PrimitiveType::String),
        NativeType::Date if as_string => WireType::primitive(PrimitiveType::Utf8),
        NativeType::Date => WireType::primitive(PrimitiveType::Date),
        NativeType::Datetime if as_string => WireType::primitive(PrimitiveType::Utf8),
        NativeType::Datetime => WireType::primitive(PrimitiveType::Datetime),
        NativeType::Timestamp if as_string => WireType::primitive(PrimitiveType::Utf8),
        NativeType::Timestamp => WireType::primitive(PrimitiveType::Timestamp),
        NativeType::Decimal { precision, scale } => WireType::Decimal { precision, scale },
    };
    if column.nullable {
        WireType::optional(base)
    } else {
        base
    }
}

fn mismatch(value: &NativeValue, expected: NativeType) -> ConnectorError {
    ConnectorError::DataTypeMismatch(format!(
        "expected {:?}, got {} value",
        expected,
        value.type_name()
    ))
}

fn unsupported(native: NativeType, wire: &WireType) -> ConnectorError {
    ConnectorError::DataTypeNotSupported(format!("cannot read {:?} column as {}", native, wire))
}

fn integer(value: &NativeValue) -> Option<i128> {
    match value {
        NativeValue::Int8(v) => Some(i128::from(*v)),
        NativeValue::Int16(v) => Some(i128::from(*v)),
        NativeValue::Int32(v) => Some(i128::from(*v)),
        NativeValue::Int64(v) => Some(i128::from(*v)),
        NativeValue::Uint8(v) => Some(i128::from(*v)),
        NativeValue::Uint16(v) => Some(i128::from(*v)),
        NativeValue::Uint32(v) => Some(i128::from(*v)),
        NativeValue::Uint64(v) => Some(i128::from(*v)),
        _ => None,
    }
}

/// Any integer column to any integer wire type; out-of-range values are out of bounds
fn integer_appender<T>(native: NativeType, wrap: fn(T) -> WireValue<'static>) -> Appender<NativeValue>
where
    T: TryFrom<i128> + 'static,
{
    appender(move |value: &NativeValue| {
        if value.is_null() {
            return Ok(WireValue::Null);
        }
        let n = integer(value).ok_or_else(|| mismatch(value, native))?;
        NarrowingConverter::<i128, T>::new().convert(&n).map(wrap)
    })
}

/// Builds the appender reading a `native` column as `wire`
pub fn appender_for(native: NativeType, wire: &WireType) -> ConnectorResult<Appender<NativeValue>> {
    let base = wire.base();
    let primitive = match base {
        WireType::Decimal { precision, scale } => {
            if !matches!(native, NativeType::Decimal { .. }) {
                return Err(unsupported(native, wire));
            }
            let converter = DecimalConverter::new(*precision, *scale)?;
            return Ok(appender(move |value: &NativeValue| match value {
                NativeValue::Null => Ok(WireValue::Null),
                NativeValue::Decimal(d) => converter.convert(d).map(WireValue::Decimal),
                other => Err(mismatch(other, native)),
            }));
        }
        WireType::Primitive(p) => *p,
        _ => return Err(unsupported(native, wire)),
    };

    let built = match (native, primitive) {
        (n, PrimitiveType::Int8) if n.is_integer() => integer_appender(n, WireValue::Int8),
        (n, PrimitiveType::Int16) if n.is_integer() => integer_appender(n, WireValue::Int16),
        (n, PrimitiveType::Int32) if n.is_integer() => integer_appender(n, WireValue::Int32),
        (n, PrimitiveType::Int64) if n.is_integer() => integer_appender(n, WireValue::Int64),
        (n, PrimitiveType::Uint8) if n.is_integer() => integer_appender(n, WireValue::Uint8),
        (n, PrimitiveType::Uint16) if n.is_integer() => integer_appender(n, WireValue::Uint16),
        (n, PrimitiveType::Uint32) if n.is_integer() => integer_appender(n, WireValue::Uint32),
        (n, PrimitiveType::Uint64) if n.is_integer() => integer_appender(n, WireValue::Uint64),

        (NativeType::Bool, PrimitiveType::Bool) => appender(|value: &NativeValue| match value {
            NativeValue::Null => Ok(WireValue::Null),
            NativeValue::Bool(b) => BoolConverter.convert(b).map(WireValue::Uint8),
            other => Err(mismatch(other, NativeType::Bool)),
        }),

        (NativeType::Float, PrimitiveType::Float) => appender(|value: &NativeValue| match value {
            NativeValue::Null => Ok(WireValue::Null),
            NativeValue::Float(f) => Ok(WireValue::Float(*f)),
            other => Err(mismatch(other, NativeType::Float)),
        }),
        (NativeType::Float | NativeType::Double, PrimitiveType::Double) => {
            appender(move |value: &NativeValue| match value {
                NativeValue::Null => Ok(WireValue::Null),
                NativeValue::Float(f) => Ok(WireValue::Double(f64::from(*f))),
                NativeValue::Double(d) => Ok(WireValue::Double(*d)),
                other => Err(mismatch(other, native)),
            })
        }

        (NativeType::Text, PrimitiveType::Utf8 | PrimitiveType::String | PrimitiveType::Json) => {
            appender(|value: &NativeValue| match value {
                NativeValue::Null => Ok(WireValue::Null),
                NativeValue::Text(s) => Ok(WireValue::text(s)),
                other => Err(mismatch(other, NativeType::Text)),
            })
        }
        (NativeType::Bytes, PrimitiveType::String) => appender(|value: &NativeValue| match value {
            NativeValue::Null => Ok(WireValue::Null),
            NativeValue::Bytes(b) => Ok(WireValue::bytes(b)),
            other => Err(mismatch(other, NativeType::Bytes)),
        }),

        (NativeType::Date, PrimitiveType::Date) => appender(|value: &NativeValue| match value {
            NativeValue::Null => Ok(WireValue::Null),
            NativeValue::Date(d) => DateConverter.convert(d).map(WireValue::Uint16),
            other => Err(mismatch(other, NativeType::Date)),
        }),
        (NativeType::Date, PrimitiveType::Utf8) => appender(|value: &NativeValue| match value {
            NativeValue::Null => Ok(WireValue::Null),
            NativeValue::Date(d) => DateToStringConverter.convert(d).map(WireValue::owned_text),
            other => Err(mismatch(other, NativeType::Date)),
        }),

        (NativeType::Datetime, PrimitiveType::Datetime) => {
            appender(|value: &NativeValue| match value {
                NativeValue::Null => Ok(WireValue::Null),
                NativeValue::Datetime(d) => DatetimeConverter.convert(d).map(WireValue::Uint32),
                other => Err(mismatch(other, NativeType::Datetime)),
            })
        }
        (NativeType::Datetime, PrimitiveType::Utf8) => {
            appender(|value: &NativeValue| match value {
                NativeValue::Null => Ok(WireValue::Null),
                NativeValue::Datetime(d) => DatetimeToStringConverter
                    .convert(d)
                    .map(WireValue::owned_text),
                other => Err(mismatch(other, NativeType::Datetime)),
            })
        }

        (NativeType::Timestamp, PrimitiveType::Timestamp) => {
            appender(|value: &NativeValue| match value {
                NativeValue::Null => Ok(WireValue::Null),
                NativeValue::Timestamp(t) => TimestampConverter.convert(t).map(WireValue::Uint64),
                other => Err(mismatch(other, NativeType::Timestamp)),
            })
        }
        (NativeType::Timestamp, PrimitiveType::Utf8) => {
            appender(|value: &NativeValue| match value {
                NativeValue::Null => Ok(WireValue::Null),
                NativeValue::Timestamp(t) => TimestampToStringConverter
                    .convert(t)
                    .map(WireValue::owned_text),
                other => Err(mismatch(other, NativeType::Timestamp)),
            })
        }

        _ => return Err(unsupported(native, wire)),
    };

    Ok(built)
}

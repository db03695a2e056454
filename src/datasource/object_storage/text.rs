//! Appenders reading CSV cells into wire values

use crate::api::{ConnectorError, ConnectorResult, PrimitiveType, WireType};
use crate::conversion::{
    TextToBoolConverter, TextToDateConverter, TextToDatetimeConverter, TextToDecimalConverter,
    TextToFloatConverter, TextToIntConverter, TextToTimestampConverter, ValueConverter,
};
use crate::paging::{appender, Appender, WireValue};

fn parsed<C>(
    converter: C,
    optional: bool,
    wrap: fn(C::Output) -> WireValue<'static>,
) -> Appender<String>
where
    C: ValueConverter<Input = str> + 'static,
{
    appender(move |cell: &String| {
        if optional && cell.is_empty() {
            return Ok(WireValue::Null);
        }
        converter.convert(cell).map(wrap)
    })
}

/// Builds the appender parsing a text cell as `wire`.
///
/// An empty cell is NULL in an optional column; otherwise it is parsed like
/// any other value.
pub fn text_appender(wire: &WireType) -> ConnectorResult<Appender<String>> {
    let optional = wire.is_optional();
    let primitive = match wire.base() {
        WireType::Primitive(p) => *p,
        WireType::Decimal { precision, scale } => {
            return Ok(parsed(
                TextToDecimalConverter::new(*precision, *scale)?,
                optional,
                WireValue::Decimal,
            ));
        }
        other => return Err(ConnectorError::DataTypeNotSupported(other.to_string())),
    };

    Ok(match primitive {
        PrimitiveType::Bool => parsed(TextToBoolConverter, optional, WireValue::Uint8),
        PrimitiveType::Int8 => parsed(TextToIntConverter::<i8>::new(), optional, WireValue::Int8),
        PrimitiveType::Int16 => {
            parsed(TextToIntConverter::<i16>::new(), optional, WireValue::Int16)
        }
        PrimitiveType::Int32 => {
            parsed(TextToIntConverter::<i32>::new(), optional, WireValue::Int32)
        }
        PrimitiveType::Int64 => {
            parsed(TextToIntConverter::<i64>::new(), optional, WireValue::Int64)
        }
        PrimitiveType::Uint8 => parsed(TextToIntConverter::<u8>::new(), optional, WireValue::Uint8),
        PrimitiveType::Uint16 => {
            parsed(TextToIntConverter::<u16>::new(), optional, WireValue::Uint16)
        }
        PrimitiveType::Uint32 => {
            parsed(TextToIntConverter::<u32>::new(), optional, WireValue::Uint32)
        }
        PrimitiveType::Uint64 => {
            parsed(TextToIntConverter::<u64>::new(), optional, WireValue::Uint64)
        }
        PrimitiveType::Float => {
            parsed(TextToFloatConverter::<f32>::new(), optional, WireValue::Float)
        }
        PrimitiveType::Double => {
            parsed(TextToFloatConverter::<f64>::new(), optional, WireValue::Double)
        }
        PrimitiveType::Date => parsed(TextToDateConverter, optional, WireValue::Uint16),
        PrimitiveType::Datetime => parsed(TextToDatetimeConverter, optional, WireValue::Uint32),
        PrimitiveType::Timestamp => parsed(TextToTimestampConverter, optional, WireValue::Uint64),
        PrimitiveType::Utf8 | PrimitiveType::String | PrimitiveType::Json => {
            appender(move |cell: &String| {
                if optional && cell.is_empty() {
                    Ok(WireValue::Null)
                } else {
                    Ok(WireValue::text(cell))
                }
            })
        }
    })
}

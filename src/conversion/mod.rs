//! Type Conversion Layer
//!
//! Per-column conversion of backend-native scalars into wire primitives.
//!
//! - `converters`: one `ValueConverter` per (native type, wire type) pair
//! - `time`: epoch-relative encodings of dates, datetimes and timestamps
//! - `decimal`: fixed-point decimal values and rescaling
//!
//! A converter fails with `ValueOutOfTypeBounds` when a value cannot be
//! represented by the wire type; appenders turn that into a NULL. Every other
//! failure aborts the split read.

mod converters;
mod decimal;
pub mod time;

pub use converters::{
    BoolConverter, DateConverter, DateToStringConverter, DatetimeConverter,
    DatetimeToStringConverter, DecimalConverter, NarrowingConverter, TextToBoolConverter,
    TextToDateConverter, TextToDatetimeConverter, TextToDecimalConverter, TextToFloatConverter,
    TextToIntConverter, TextToTimestampConverter, TimestampConverter,
    TimestampToStringConverter, ValueConverter,
};
pub use decimal::{Decimal, MAX_DECIMAL_PRECISION};

//! Scalar converters from native values to wire primitives
//!
//! Each converter handles one (native type, wire type) pair. Converters are
//! zero-sized or carry only the target parameters, so appenders can own
//! them without per-row cost.

use std::fmt::Display;
use std::marker::PhantomData;
use std::num::{IntErrorKind, ParseFloatError, ParseIntError};
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use super::decimal::{Decimal, MAX_DECIMAL_PRECISION};
use super::time;
use crate::api::{ConnectorError, ConnectorResult};

/// Converts one native value into one wire value
pub trait ValueConverter: Send + Sync {
    type Input: ?Sized;
    type Output;

    /// Fails with `ValueOutOfTypeBounds` when the value cannot be represented
    fn convert(&self, input: &Self::Input) -> ConnectorResult<Self::Output>;
}

// ==================
// Booleans and narrowing
// ==================

/// Wire booleans are `u8` 0/1
#[derive(Debug, Clone, Copy, Default)]
pub struct BoolConverter;

impl ValueConverter for BoolConverter {
    type Input = bool;
    type Output = u8;

    fn convert(&self, input: &bool) -> ConnectorResult<u8> {
        Ok(u8::from(*input))
    }
}

/// Integer narrowing with a range check
#[derive(Debug, Clone, Copy, Default)]
pub struct NarrowingConverter<From, To>(PhantomData<fn(From) -> To>);

impl<From, To> NarrowingConverter<From, To> {
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<From, To> ValueConverter for NarrowingConverter<From, To>
where
    From: Copy + Display,
    To: TryFrom<From>,
{
    type Input = From;
    type Output = To;

    fn convert(&self, input: &From) -> ConnectorResult<To> {
        To::try_from(*input).map_err(|_| {
            ConnectorError::ValueOutOfTypeBounds(format!(
                "{} does not fit into {}",
                input,
                std::any::type_name::<To>()
            ))
        })
    }
}

// ==================
// Temporal
// ==================

#[derive(Debug, Clone, Copy, Default)]
pub struct DateConverter;

impl ValueConverter for DateConverter {
    type Input = NaiveDate;
    type Output = u16;

    fn convert(&self, input: &NaiveDate) -> ConnectorResult<u16> {
        time::date_to_days(input)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DateToStringConverter;

impl ValueConverter for DateToStringConverter {
    type Input = NaiveDate;
    type Output = String;

    fn convert(&self, input: &NaiveDate) -> ConnectorResult<String> {
        Ok(time::date_to_string(input))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DatetimeConverter;

impl ValueConverter for DatetimeConverter {
    type Input = NaiveDateTime;
    type Output = u32;

    fn convert(&self, input: &NaiveDateTime) -> ConnectorResult<u32> {
        time::datetime_to_seconds(input)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DatetimeToStringConverter;

impl ValueConverter for DatetimeToStringConverter {
    type Input = NaiveDateTime;
    type Output = String;

    fn convert(&self, input: &NaiveDateTime) -> ConnectorResult<String> {
        Ok(time::datetime_to_string(input))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TimestampConverter;

impl ValueConverter for TimestampConverter {
    type Input = DateTime<Utc>;
    type Output = u64;

    fn convert(&self, input: &DateTime<Utc>) -> ConnectorResult<u64> {
        time::timestamp_to_micros(input)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TimestampToStringConverter;

impl ValueConverter for TimestampToStringConverter {
    type Input = DateTime<Utc>;
    type Output = String;

    fn convert(&self, input: &DateTime<Utc>) -> ConnectorResult<String> {
        Ok(time::timestamp_to_string(input))
    }
}

// ==================
// Decimal
// ==================

/// Rescales to the column's scale and checks the column's precision
#[derive(Debug, Clone, Copy)]
pub struct DecimalConverter {
    precision: u8,
    scale: u8,
}

impl DecimalConverter {
    pub fn new(precision: u8, scale: u8) -> ConnectorResult<Self> {
        if precision == 0 || precision > MAX_DECIMAL_PRECISION || scale > precision {
            return Err(ConnectorError::DataTypeNotSupported(format!(
                "decimal({}, {})",
                precision, scale
            )));
        }
        Ok(Self { precision, scale })
    }
}

impl ValueConverter for DecimalConverter {
    type Input = Decimal;
    type Output = [u8; 16];

    fn convert(&self, input: &Decimal) -> ConnectorResult<[u8; 16]> {
        let out_of_bounds = || {
            ConnectorError::ValueOutOfTypeBounds(format!(
                "{} does not fit into decimal({}, {})",
                input, self.precision, self.scale
            ))
        };
        let rescaled = input.rescale(self.scale).ok_or_else(out_of_bounds)?;
        if rescaled.digits() > u32::from(self.precision) {
            return Err(out_of_bounds());
        }
        Ok(rescaled.to_le_bytes())
    }
}

// ==================
// Text parsing
// ==================

/// Parses text into an integer; overflow is out of bounds, garbage is an error
#[derive(Debug, Clone, Copy, Default)]
pub struct TextToIntConverter<T>(PhantomData<fn() -> T>);

impl<T> TextToIntConverter<T> {
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T> ValueConverter for TextToIntConverter<T>
where
    T: FromStr<Err = ParseIntError>,
{
    type Input = str;
    type Output = T;

    fn convert(&self, input: &str) -> ConnectorResult<T> {
        input.trim().parse::<T>().map_err(|e| match e.kind() {
            IntErrorKind::PosOverflow | IntErrorKind::NegOverflow => {
                ConnectorError::ValueOutOfTypeBounds(format!(
                    "'{}' does not fit into {}",
                    input,
                    std::any::type_name::<T>()
                ))
            }
            _ => ConnectorError::Conversion(format!("parse '{}' as integer: {}", input, e)),
        })
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TextToFloatConverter<T>(PhantomData<fn() -> T>);

impl<T> TextToFloatConverter<T> {
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T> ValueConverter for TextToFloatConverter<T>
where
    T: FromStr<Err = ParseFloatError>,
{
    type Input = str;
    type Output = T;

    fn convert(&self, input: &str) -> ConnectorResult<T> {
        input
            .trim()
            .parse::<T>()
            .map_err(|e| ConnectorError::Conversion(format!("parse '{}' as float: {}", input, e)))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TextToBoolConverter;

impl ValueConverter for TextToBoolConverter {
    type Input = str;
    type Output = u8;

    fn convert(&self, input: &str) -> ConnectorResult<u8> {
        match input.trim().to_ascii_lowercase().as_str() {
            "true" | "t" | "1" => Ok(1),
            "false" | "f" | "0" => Ok(0),
            _ => Err(ConnectorError::Conversion(format!(
                "parse '{}' as bool",
                input
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TextToDateConverter;

impl ValueConverter for TextToDateConverter {
    type Input = str;
    type Output = u16;

    fn convert(&self, input: &str) -> ConnectorResult<u16> {
        let date = NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d")
            .map_err(|e| ConnectorError::Conversion(format!("parse '{}' as date: {}", input, e)))?;
        time::date_to_days(&date)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TextToDatetimeConverter;

impl ValueConverter for TextToDatetimeConverter {
    type Input = str;
    type Output = u32;

    fn convert(&self, input: &str) -> ConnectorResult<u32> {
        let trimmed = input.trim();
        let datetime = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%SZ")
            .or_else(|_| NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S"))
            .map_err(|e| {
                ConnectorError::Conversion(format!("parse '{}' as datetime: {}", input, e))
            })?;
        time::datetime_to_seconds(&datetime)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TextToTimestampConverter;

impl ValueConverter for TextToTimestampConverter {
    type Input = str;
    type Output = u64;

    fn convert(&self, input: &str) -> ConnectorResult<u64> {
        let timestamp = DateTime::parse_from_rfc3339(input.trim())
            .map_err(|e| {
                ConnectorError::Conversion(format!("parse '{}' as timestamp: {}", input, e))
            })?
            .with_timezone(&Utc);
        time::timestamp_to_micros(&timestamp)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TextToDecimalConverter {
    inner: DecimalConverter,
}

impl TextToDecimalConverter {
    pub fn new(precision: u8, scale: u8) -> ConnectorResult<Self> {
        Ok(Self {
            inner: DecimalConverter::new(precision, scale)?,
        })
    }
}

impl ValueConverter for TextToDecimalConverter {
    type Input = str;
    type Output = [u8; 16];

    fn convert(&self, input: &str) -> ConnectorResult<[u8; 16]> {
        let decimal: Decimal = input.parse()?;
        self.inner.convert(&decimal)
    }
}

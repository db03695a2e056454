//! Epoch-relative date and time encodings
//!
//! Wire temporal types are unsigned offsets from the Unix epoch. Values are
//! valid in [1970-01-01T00:00:00Z, 2106-01-01T00:00:00Z); anything outside is
//! reported as out of bounds and never wrapped.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, TimeZone, Timelike, Utc};

use crate::api::{ConnectorError, ConnectorResult};

/// `num_days_from_ce` of 1970-01-01
const UNIX_EPOCH_DAYS_FROM_CE: i64 = 719_163;

/// Days from 1970-01-01 to 2106-01-01
pub const MAX_EPOCH_DAYS: i64 = 49_673;

pub const MAX_EPOCH_SECONDS: i64 = MAX_EPOCH_DAYS * 86_400;

pub const MAX_EPOCH_MICROS: i64 = MAX_EPOCH_SECONDS * 1_000_000;

fn out_of_bounds(what: &str, value: impl std::fmt::Display) -> ConnectorError {
    ConnectorError::ValueOutOfTypeBounds(format!("{} {} outside [1970-01-01, 2106-01-01)", what, value))
}

/// Days since the epoch
pub fn date_to_days(date: &NaiveDate) -> ConnectorResult<u16> {
    let days = i64::from(date.num_days_from_ce()) - UNIX_EPOCH_DAYS_FROM_CE;
    if !(0..MAX_EPOCH_DAYS).contains(&days) {
        return Err(out_of_bounds("date", date));
    }
    u16::try_from(days).map_err(|_| out_of_bounds("date", date))
}

/// Seconds since the epoch
pub fn datetime_to_seconds(datetime: &NaiveDateTime) -> ConnectorResult<u32> {
    let seconds = Utc.from_utc_datetime(datetime).timestamp();
    if !(0..MAX_EPOCH_SECONDS).contains(&seconds) {
        return Err(out_of_bounds("datetime", datetime));
    }
    u32::try_from(seconds).map_err(|_| out_of_bounds("datetime", datetime))
}

/// Microseconds since the epoch
pub fn timestamp_to_micros(timestamp: &DateTime<Utc>) -> ConnectorResult<u64> {
    let micros = timestamp.timestamp_micros();
    if !(0..MAX_EPOCH_MICROS).contains(&micros) {
        return Err(out_of_bounds("timestamp", timestamp));
    }
    u64::try_from(micros).map_err(|_| out_of_bounds("timestamp", timestamp))
}

pub fn date_to_string(date: &NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

pub fn datetime_to_string(datetime: &NaiveDateTime) -> String {
    datetime.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// RFC 3339 in UTC with up to nine fractional digits, trailing zeros dropped
pub fn timestamp_to_string(timestamp: &DateTime<Utc>) -> String {
    let mut out = timestamp.format("%Y-%m-%dT%H:%M:%S").to_string();
    let nanos = timestamp.nanosecond() % 1_000_000_000;
    if nanos != 0 {
        let fraction = format!("{:09}", nanos);
        out.push('.');
        out.push_str(fraction.trim_end_matches('0'));
    }
    out.push('Z');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_date_bounds() {
        assert_eq!(date_to_days(&date(1970, 1, 1)).unwrap(), 0);
        assert_eq!(date_to_days(&date(1970, 1, 2)).unwrap(), 1);
        assert_eq!(date_to_days(&date(2105, 12, 31)).unwrap(), 49_672);
        assert!(date_to_days(&date(2106, 1, 1)).unwrap_err().is_out_of_bounds());
        assert!(date_to_days(&date(1969, 12, 31)).unwrap_err().is_out_of_bounds());
    }

    #[test]
    fn test_datetime_bounds() {
        let epoch = date(1970, 1, 1).and_hms_opt(0, 0, 0).unwrap();
        assert_eq!(datetime_to_seconds(&epoch).unwrap(), 0);

        let later = date(2024, 1, 1).and_hms_opt(12, 0, 0).unwrap();
        assert_eq!(datetime_to_seconds(&later).unwrap(), 1_704_110_400);

        let before = date(1969, 12, 31).and_hms_opt(23, 59, 59).unwrap();
        assert!(datetime_to_seconds(&before).is_err());

        let upper = date(2106, 1, 1).and_hms_opt(0, 0, 0).unwrap();
        assert!(datetime_to_seconds(&upper).is_err());
    }

    #[test]
    fn test_timestamp_micros() {
        let ts = Utc.with_ymd_and_hms(1970, 1, 1, 0, 0, 1).unwrap();
        assert_eq!(timestamp_to_micros(&ts).unwrap(), 1_000_000);

        let early = Utc.with_ymd_and_hms(1950, 6, 1, 0, 0, 0).unwrap();
        assert!(timestamp_to_micros(&early).unwrap_err().is_out_of_bounds());
    }

    #[test]
    fn test_string_forms() {
        assert_eq!(date_to_string(&date(2024, 3, 9)), "2024-03-09");

        let dt = date(2024, 3, 9).and_hms_opt(8, 5, 0).unwrap();
        assert_eq!(datetime_to_string(&dt), "2024-03-09T08:05:00Z");

        let whole = Utc.with_ymd_and_hms(2024, 3, 9, 8, 5, 0).unwrap();
        assert_eq!(timestamp_to_string(&whole), "2024-03-09T08:05:00Z");

        let fractional = whole + chrono::Duration::microseconds(120);
        assert_eq!(timestamp_to_string(&fractional), "2024-03-09T08:05:00.00012Z");
    }

    #[test]
    fn test_string_forms_ignore_bounds() {
        assert_eq!(date_to_string(&date(1900, 1, 1)), "1900-01-01");
    }
}

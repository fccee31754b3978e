//! Row transformation
//!
//! Turns one raw CSV record into a validated [`Measurement`]. Pure and
//! deterministic: the same record always yields the same outcome, regardless
//! of which rows came before it.
//!
//! Input conventions:
//!
//! - `Date` is `DD/MM/YYYY`, `Time` is `HH.MM.SS`, both wall-clock without a
//!   zone and interpreted as UTC
//! - readings may use a decimal comma (`"12,5"`)
//! - `-200` marks a missing reading

use airq_common::{Measurement, Parameter};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use csv_async::StringRecord;
use thiserror::Error;

pub const DATE_COLUMN: &str = "Date";
pub const TIME_COLUMN: &str = "Time";

/// Sentinel the source dataset uses for "no reading"
pub const MISSING_SENTINEL: f64 = -200.0;

/// Why a record was not turned into a measurement
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RowRejected {
    #[error("Missing date or time")]
    MissingDateTime,

    #[error("Invalid date/time format")]
    InvalidFormat,

    #[error("Invalid date: {date} {time}")]
    InvalidDate { date: String, time: String },

    #[error("Malformed reading in column {column}: {value}")]
    MalformedReading { column: String, value: String },
}

/// Borrowed view of one record, addressed by header name
#[derive(Debug, Clone, Copy)]
pub struct RawRecord<'a> {
    headers: &'a StringRecord,
    record: &'a StringRecord,
}

impl<'a> RawRecord<'a> {
    pub fn new(headers: &'a StringRecord, record: &'a StringRecord) -> Self {
        Self { headers, record }
    }

    /// Value of `column`, or `None` when the header is absent or the record
    /// is shorter than the header row
    pub fn get(&self, column: &str) -> Option<&'a str> {
        let index = self.headers.iter().position(|h| h == column)?;
        self.record.get(index)
    }
}

/// Transform a raw record into a measurement
pub fn transform_record(raw: &RawRecord<'_>) -> Result<Measurement, RowRejected> {
    let date = non_blank(raw.get(DATE_COLUMN));
    let time = non_blank(raw.get(TIME_COLUMN));

    let (date, time) = match (date, time) {
        (Some(date), Some(time)) => (date, time),
        _ => return Err(RowRejected::MissingDateTime),
    };

    let mut measurement = Measurement::new(parse_timestamp(date, time)?);

    for parameter in Parameter::ALL {
        let column = parameter.source_column();
        let value = parse_reading(column, raw.get(column))?;
        measurement.set_reading(parameter, value);
    }

    Ok(measurement)
}

/// Parse a `DD/MM/YYYY` date and `HH.MM.SS` time into a UTC timestamp
pub fn parse_timestamp(date: &str, time: &str) -> Result<DateTime<Utc>, RowRejected> {
    let date_parts: Vec<&str> = date.trim().split('/').collect();
    let time_parts: Vec<&str> = time.trim().split('.').collect();

    if date_parts.len() != 3 || time_parts.len() != 3 {
        return Err(RowRejected::InvalidFormat);
    }

    let invalid = || RowRejected::InvalidDate {
        date: date.to_string(),
        time: time.to_string(),
    };

    let day: u32 = date_parts[0].parse().map_err(|_| invalid())?;
    let month: u32 = date_parts[1].parse().map_err(|_| invalid())?;
    let year: i32 = date_parts[2].parse().map_err(|_| invalid())?;
    let hour: u32 = time_parts[0].parse().map_err(|_| invalid())?;
    let minute: u32 = time_parts[1].parse().map_err(|_| invalid())?;
    let second: u32 = time_parts[2].parse().map_err(|_| invalid())?;

    let date = NaiveDate::from_ymd_opt(year, month, day).ok_or_else(invalid)?;
    let time = NaiveTime::from_hms_opt(hour, minute, second).ok_or_else(invalid)?;

    Ok(Utc.from_utc_datetime(&NaiveDateTime::new(date, time)))
}

/// Parse one reading
///
/// Blank, non-numeric, `NaN` and the `-200` sentinel all map to `None`.
/// Only an infinite value rejects the row.
pub fn parse_reading(column: &str, value: Option<&str>) -> Result<Option<f64>, RowRejected> {
    let Some(raw) = non_blank(value) else {
        return Ok(None);
    };

    let normalized = raw.replacen(',', ".", 1);
    let parsed = match normalized.parse::<f64>() {
        Ok(v) => v,
        Err(_) => return Ok(None),
    };

    if parsed.is_nan() || parsed == MISSING_SENTINEL {
        return Ok(None);
    }

    if parsed.is_infinite() {
        return Err(RowRejected::MalformedReading {
            column: column.to_string(),
            value: raw.to_string(),
        });
    }

    Ok(Some(parsed))
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

//! Read queries over stored measurements
//!
//! Each query validates its raw request values (parameter name, dates) before
//! touching the [`MeasurementRepository`](crate::measurements::MeasurementRepository).

pub mod date_range;
pub mod statistics;
pub mod summary;
pub mod time_series;

use airq_common::Parameter;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};

use crate::measurements::{DateRange, QueryError};

pub use date_range::{DateRangeQuery, DateRangeResponse};
pub use statistics::StatisticsQuery;
pub use summary::SummaryResponse;
pub use time_series::{TimeSeriesQuery, TimeSeriesResponse};

#[derive(Debug, thiserror::Error)]
pub enum AirQualityQueryError {
    #[error("Invalid date: {0}")]
    InvalidDate(String),

    #[error("start_date and end_date must be provided together")]
    IncompleteRange,

    #[error("Both start_date and end_date are required")]
    MissingRange,

    #[error("Date range cannot exceed 1 year")]
    RangeTooLong,

    #[error(transparent)]
    Query(#[from] QueryError),
}

/// Parse a parameter name against the closed set of readings
pub fn parse_parameter(name: &str) -> Result<Parameter, AirQualityQueryError> {
    name.trim()
        .parse()
        .map_err(|_| QueryError::InvalidParameter(name.to_string()).into())
}

/// Which end of a window a bare date stands for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bound {
    Start,
    End,
}

/// RFC 3339 instant, or `YYYY-MM-DD` expanded to the start or end of that day
pub fn parse_date(value: &str, bound: Bound) -> Result<DateTime<Utc>, AirQualityQueryError> {
    let value = value.trim();

    if let Ok(instant) = DateTime::parse_from_rfc3339(value) {
        return Ok(instant.with_timezone(&Utc));
    }

    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| AirQualityQueryError::InvalidDate(value.to_string()))?;

    let time = match bound {
        Bound::Start => NaiveTime::MIN,
        Bound::End => NaiveTime::from_hms_milli_opt(23, 59, 59, 999)
            .ok_or_else(|| AirQualityQueryError::InvalidDate(value.to_string()))?,
    };

    Ok(date.and_time(time).and_utc())
}

/// Optional window from optional query values; both or neither
pub fn resolve_range(
    start: Option<&str>,
    end: Option<&str>,
) -> Result<Option<DateRange>, AirQualityQueryError> {
    let start = start.filter(|s| !s.trim().is_empty());
    let end = end.filter(|s| !s.trim().is_empty());

    match (start, end) {
        (None, None) => Ok(None),
        (Some(start), Some(end)) => {
            let range = DateRange::new(parse_date(start, Bound::Start)?, parse_date(end, Bound::End)?)?;
            Ok(Some(range))
        },
        _ => Err(AirQualityQueryError::IncompleteRange),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_parameter() {
        assert_eq!(parse_parameter("co").unwrap(), Parameter::Co);
        assert_eq!(parse_parameter(" no2 ").unwrap(), Parameter::No2);

        let err = parse_parameter("ozone").unwrap_err();
        assert_eq!(err.to_string(), "Invalid parameter: ozone");
    }

    #[test]
    fn test_parse_parameter_rejects_sql() {
        assert!(parse_parameter("co; DROP TABLE air_quality_measurements").is_err());
    }

    #[test]
    fn test_parse_date_formats() {
        assert_eq!(
            parse_date("2004-03-10T18:00:00Z", Bound::Start).unwrap(),
            Utc.with_ymd_and_hms(2004, 3, 10, 18, 0, 0).unwrap()
        );
        assert_eq!(
            parse_date("2004-03-10T20:00:00+02:00", Bound::End).unwrap(),
            Utc.with_ymd_and_hms(2004, 3, 10, 18, 0, 0).unwrap()
        );
        assert_eq!(
            parse_date("2004-03-10", Bound::Start).unwrap(),
            Utc.with_ymd_and_hms(2004, 3, 10, 0, 0, 0).unwrap()
        );

        let end = parse_date("2004-03-10", Bound::End).unwrap();
        assert!(end > Utc.with_ymd_and_hms(2004, 3, 10, 23, 59, 59).unwrap());
        assert!(end < Utc.with_ymd_and_hms(2004, 3, 11, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_parse_date_invalid() {
        let err = parse_date("10/03/2004", Bound::Start).unwrap_err();
        assert_eq!(err.to_string(), "Invalid date: 10/03/2004");
    }

    #[test]
    fn test_resolve_range() {
        assert!(resolve_range(None, None).unwrap().is_none());
        assert!(resolve_range(Some(""), Some("  ")).unwrap().is_none());

        let range = resolve_range(Some("2004-03-10"), Some("2004-03-11")).unwrap().unwrap();
        assert!(range.contains(Utc.with_ymd_and_hms(2004, 3, 11, 23, 0, 0).unwrap()));

        assert!(matches!(
            resolve_range(Some("2004-03-10"), None),
            Err(AirQualityQueryError::IncompleteRange)
        ));
        assert!(matches!(
            resolve_range(Some("2004-03-12"), Some("2004-03-11")),
            Err(AirQualityQueryError::Query(QueryError::InvalidRange { .. }))
        ));
    }
}

//! Full measurements inside a required window

use airq_common::Measurement;
use chrono::Duration;
use serde::{Deserialize, Serialize};

use super::{parse_date, AirQualityQueryError, Bound};
use crate::measurements::{DateRange, MeasurementRepository};

/// Longest window a single request may cover
pub const MAX_RANGE_DAYS: i64 = 365;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DateRangeQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DateRangeResponse {
    pub data: Vec<Measurement>,
    pub count: usize,
    pub date_range: DateRange,
}

#[tracing::instrument(skip(repository))]
pub async fn handle(
    repository: &dyn MeasurementRepository,
    query: DateRangeQuery,
) -> Result<DateRangeResponse, AirQualityQueryError> {
    let start = query.start_date.as_deref().filter(|s| !s.trim().is_empty());
    let end = query.end_date.as_deref().filter(|s| !s.trim().is_empty());

    let (Some(start), Some(end)) = (start, end) else {
        return Err(AirQualityQueryError::MissingRange);
    };

    let range = DateRange::new(parse_date(start, Bound::Start)?, parse_date(end, Bound::End)?)?;
    if range.end - range.start > Duration::days(MAX_RANGE_DAYS) {
        return Err(AirQualityQueryError::RangeTooLong);
    }

    let data = repository.get_by_date_range(range.start, range.end).await?;

    Ok(DateRangeResponse {
        count: data.len(),
        data,
        date_range: range,
    })
}

//! Time series of one parameter

use airq_common::Parameter;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{parse_parameter, resolve_range, AirQualityQueryError};
use crate::measurements::{MeasurementRepository, TimeSeriesPoint};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TimeSeriesQuery {
    #[serde(default)]
    pub parameter: String,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSeriesResponse {
    pub parameter: Parameter,
    pub unit: Option<&'static str>,
    pub data: Vec<TimeSeriesPoint>,
    pub data_points: usize,
    pub first_timestamp: Option<DateTime<Utc>>,
    pub last_timestamp: Option<DateTime<Utc>>,
}

#[tracing::instrument(skip(repository))]
pub async fn handle(
    repository: &dyn MeasurementRepository,
    query: TimeSeriesQuery,
) -> Result<TimeSeriesResponse, AirQualityQueryError> {
    let parameter = parse_parameter(&query.parameter)?;
    let range = resolve_range(query.start_date.as_deref(), query.end_date.as_deref())?;

    let data = repository.time_series(parameter, range).await?;

    Ok(TimeSeriesResponse {
        parameter,
        unit: parameter.unit(),
        data_points: data.len(),
        first_timestamp: data.first().map(|p| p.timestamp),
        last_timestamp: data.last().map(|p| p.timestamp),
        data,
    })
}

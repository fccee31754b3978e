//! Stored measurement count and coverage

use serde::Serialize;

use super::AirQualityQueryError;
use crate::measurements::{DateRange, MeasurementRepository};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryResponse {
    pub total_measurements: i64,
    pub date_range: Option<DateRange>,
}

pub async fn handle(
    repository: &dyn MeasurementRepository,
) -> Result<SummaryResponse, AirQualityQueryError> {
    let total_measurements = repository.count().await?;
    let date_range = repository.date_range().await?;

    Ok(SummaryResponse {
        total_measurements,
        date_range,
    })
}

//! Summary statistics of one parameter

use serde::Deserialize;

use super::{parse_parameter, resolve_range, AirQualityQueryError};
use crate::measurements::{MeasurementRepository, ParameterStatistics};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatisticsQuery {
    #[serde(default)]
    pub parameter: String,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

#[tracing::instrument(skip(repository))]
pub async fn handle(
    repository: &dyn MeasurementRepository,
    query: StatisticsQuery,
) -> Result<ParameterStatistics, AirQualityQueryError> {
    let parameter = parse_parameter(&query.parameter)?;
    let range = resolve_range(query.start_date.as_deref(), query.end_date.as_deref())?;

    Ok(repository.statistics(parameter, range).await?)
}

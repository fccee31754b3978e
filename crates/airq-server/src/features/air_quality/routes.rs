//! Air quality read routes

use std::sync::Arc;

use airq_common::Measurement;
use axum::{
    extract::{Query, State},
    routing::get,
    Router,
};
use serde_json::json;

use super::queries::{
    date_range::handle as handle_date_range, statistics::handle as handle_statistics,
    summary::handle as handle_summary, time_series::handle as handle_time_series, DateRangeQuery,
    StatisticsQuery, SummaryResponse, TimeSeriesQuery,
};
use crate::api::response::ApiResponse;
use crate::error::AppError;
use crate::measurements::{MeasurementRepository, ParameterStatistics, TimeSeriesPoint};

pub type AirQualityState = Arc<dyn MeasurementRepository>;

pub fn air_quality_routes() -> Router<AirQualityState> {
    Router::new()
        .route("/timeseries", get(get_time_series))
        .route("/statistics", get(get_statistics))
        .route("/range", get(get_date_range))
        .route("/summary", get(get_summary))
}

/// GET /air-quality/timeseries?parameter=co&start_date=2004-03-10&end_date=2004-03-31
async fn get_time_series(
    State(repository): State<AirQualityState>,
    Query(query): Query<TimeSeriesQuery>,
) -> Result<ApiResponse<Vec<TimeSeriesPoint>>, AppError> {
    let response = handle_time_series(repository.as_ref(), query).await?;

    let meta = json!({
        "parameter": response.parameter,
        "unit": response.unit,
        "dataPoints": response.data_points,
        "dateRange": {
            "start": response.first_timestamp,
            "end": response.last_timestamp,
        },
    });

    Ok(ApiResponse::success_with_meta(response.data, meta))
}

/// GET /air-quality/statistics?parameter=co
async fn get_statistics(
    State(repository): State<AirQualityState>,
    Query(query): Query<StatisticsQuery>,
) -> Result<ApiResponse<ParameterStatistics>, AppError> {
    let stats = handle_statistics(repository.as_ref(), query).await?;
    Ok(ApiResponse::success(stats))
}

/// GET /air-quality/range?start_date=2004-03-10&end_date=2004-03-11
async fn get_date_range(
    State(repository): State<AirQualityState>,
    Query(query): Query<DateRangeQuery>,
) -> Result<ApiResponse<Vec<Measurement>>, AppError> {
    let response = handle_date_range(repository.as_ref(), query).await?;

    let meta = json!({
        "count": response.count,
        "dateRange": response.date_range,
    });

    Ok(ApiResponse::success_with_meta(response.data, meta))
}

/// GET /air-quality/summary
async fn get_summary(
    State(repository): State<AirQualityState>,
) -> Result<ApiResponse<SummaryResponse>, AppError> {
    let summary = handle_summary(repository.as_ref()).await?;
    Ok(ApiResponse::success(summary))
}

//! Read-side measurement queries

use airq_common::{Measurement, Parameter};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Invalid date range: {start} is after {end}")]
    InvalidRange {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Inclusive time window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, QueryError> {
        if start > end {
            return Err(QueryError::InvalidRange { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn contains(&self, timestamp: DateTime<Utc>) -> bool {
        self.start <= timestamp && timestamp <= self.end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesPoint {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

/// Summary statistics of one parameter; all zeros when there is no data
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterStatistics {
    pub parameter: Parameter,
    pub unit: Option<&'static str>,
    pub average: f64,
    pub minimum: f64,
    pub maximum: f64,
    /// Sample standard deviation
    pub std_dev: f64,
    pub median: f64,
    pub p95: f64,
    pub data_points: i64,
    pub date_range: Option<DateRange>,
}

impl ParameterStatistics {
    pub fn empty(parameter: Parameter) -> Self {
        Self {
            parameter,
            unit: parameter.unit(),
            average: 0.0,
            minimum: 0.0,
            maximum: 0.0,
            std_dev: 0.0,
            median: 0.0,
            p95: 0.0,
            data_points: 0,
            date_range: None,
        }
    }
}

#[async_trait]
pub trait MeasurementRepository: Send + Sync {
    /// Measurements with `start <= timestamp <= end`, oldest first
    async fn get_by_date_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Measurement>, QueryError>;

    /// Non-absent readings of `parameter`, oldest first
    async fn time_series(
        &self,
        parameter: Parameter,
        range: Option<DateRange>,
    ) -> Result<Vec<TimeSeriesPoint>, QueryError>;

    async fn statistics(
        &self,
        parameter: Parameter,
        range: Option<DateRange>,
    ) -> Result<ParameterStatistics, QueryError>;

    async fn count(&self) -> Result<i64, QueryError>;

    /// First and last stored timestamp
    async fn date_range(&self) -> Result<Option<DateRange>, QueryError>;
}

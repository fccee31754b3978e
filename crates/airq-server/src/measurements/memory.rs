//! In-process measurement store keyed by timestamp
//!
//! Same upsert semantics as the database table, which makes it a drop-in
//! writer and repository for tests and for running without PostgreSQL.

use std::collections::BTreeMap;

use airq_common::{Measurement, Parameter};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::repository::{
    DateRange, MeasurementRepository, ParameterStatistics, QueryError, TimeSeriesPoint,
};
use super::statistics::summarize;
use crate::ingest::{BulkWriter, WriteError};

#[derive(Default)]
pub struct MemoryMeasurementStore {
    rows: RwLock<BTreeMap<DateTime<Utc>, Measurement>>,
}

impl MemoryMeasurementStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.read().await.is_empty()
    }

    pub async fn get(&self, timestamp: DateTime<Utc>) -> Option<Measurement> {
        self.rows.read().await.get(&timestamp).cloned()
    }

    async fn readings(
        &self,
        parameter: Parameter,
        range: Option<DateRange>,
    ) -> Vec<TimeSeriesPoint> {
        self.rows
            .read()
            .await
            .values()
            .filter(|m| range.map_or(true, |r| r.contains(m.timestamp)))
            .filter_map(|m| {
                m.reading(parameter).map(|value| TimeSeriesPoint {
                    timestamp: m.timestamp,
                    value,
                })
            })
            .collect()
    }
}

#[async_trait]
impl BulkWriter for MemoryMeasurementStore {
    async fn bulk_insert(&self, measurements: &[Measurement]) -> Result<(), WriteError> {
        let mut rows = self.rows.write().await;
        for measurement in measurements {
            rows.insert(measurement.timestamp, measurement.clone());
        }
        Ok(())
    }
}

#[async_trait]
impl MeasurementRepository for MemoryMeasurementStore {
    async fn get_by_date_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Measurement>, QueryError> {
        let range = DateRange::new(start, end)?;
        Ok(self
            .rows
            .read()
            .await
            .range(range.start..=range.end)
            .map(|(_, m)| m.clone())
            .collect())
    }

    async fn time_series(
        &self,
        parameter: Parameter,
        range: Option<DateRange>,
    ) -> Result<Vec<TimeSeriesPoint>, QueryError> {
        Ok(self.readings(parameter, range).await)
    }

    async fn statistics(
        &self,
        parameter: Parameter,
        range: Option<DateRange>,
    ) -> Result<ParameterStatistics, QueryError> {
        let points = self.readings(parameter, range).await;

        let date_range = match (points.first(), points.last()) {
            (Some(first), Some(last)) => Some(DateRange {
                start: first.timestamp,
                end: last.timestamp,
            }),
            _ => None,
        };

        let Some(summary) = summarize(points.iter().map(|p| p.value).collect()) else {
            return Ok(ParameterStatistics::empty(parameter));
        };

        Ok(ParameterStatistics {
            parameter,
            unit: parameter.unit(),
            average: summary.average,
            minimum: summary.minimum,
            maximum: summary.maximum,
            std_dev: summary.std_dev,
            median: summary.median,
            p95: summary.p95,
            data_points: summary.count as i64,
            date_range,
        })
    }

    async fn count(&self) -> Result<i64, QueryError> {
        Ok(self.rows.read().await.len() as i64)
    }

    async fn date_range(&self) -> Result<Option<DateRange>, QueryError> {
        let rows = self.rows.read().await;
        Ok(match (rows.keys().next(), rows.keys().next_back()) {
            (Some(&start), Some(&end)) => Some(DateRange { start, end }),
            _ => None,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2004, 3, 10, hour, 0, 0).unwrap()
    }

    async fn seeded() -> MemoryMeasurementStore {
        let store = MemoryMeasurementStore::new();
        store
            .bulk_insert(&[
                Measurement::new(at(18)).with_reading(Parameter::Co, 2.6),
                Measurement::new(at(19)).with_reading(Parameter::Co, 2.0),
                Measurement::new(at(20)),
                Measurement::new(at(21)).with_reading(Parameter::Co, 2.2),
            ])
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_upsert_replaces_by_timestamp() {
        let store = seeded().await;
        store
            .bulk_insert(&[Measurement::new(at(18)).with_reading(Parameter::Co, 9.9)])
            .await
            .unwrap();

        assert_eq!(store.len().await, 4);
        assert_eq!(store.get(at(18)).await.unwrap().co, Some(9.9));
    }

    #[tokio::test]
    async fn test_time_series_skips_absent_readings() {
        let store = seeded().await;
        let points = store.time_series(Parameter::Co, None).await.unwrap();

        let hours: Vec<DateTime<Utc>> = points.iter().map(|p| p.timestamp).collect();
        assert_eq!(hours, vec![at(18), at(19), at(21)]);
    }

    #[tokio::test]
    async fn test_statistics_with_range() {
        let store = seeded().await;
        let range = DateRange::new(at(19), at(21)).unwrap();
        let stats = store.statistics(Parameter::Co, Some(range)).await.unwrap();

        assert_eq!(stats.data_points, 2);
        assert_eq!(stats.minimum, 2.0);
        assert_eq!(stats.maximum, 2.2);
        assert_eq!(stats.date_range, Some(DateRange { start: at(19), end: at(21) }));
        assert_eq!(stats.unit, Some("mg/m³"));
    }

    #[tokio::test]
    async fn test_statistics_empty_is_zeroed() {
        let store = seeded().await;
        let stats = store.statistics(Parameter::Benzene, None).await.unwrap();

        assert_eq!(stats, ParameterStatistics::empty(Parameter::Benzene));
    }

    #[tokio::test]
    async fn test_count_and_date_range() {
        let store = seeded().await;
        assert_eq!(store.count().await.unwrap(), 4);
        assert_eq!(
            store.date_range().await.unwrap(),
            Some(DateRange { start: at(18), end: at(21) })
        );

        let by_range = store.get_by_date_range(at(19), at(20)).await.unwrap();
        assert_eq!(by_range.len(), 2);
        assert!(store.get_by_date_range(at(21), at(18)).await.is_err());
    }
}

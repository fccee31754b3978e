//! PostgreSQL measurement repository (`air_quality_measurements` table)
//!
//! Column names in generated SQL always come from [`Parameter::column`], never
//! from caller input.

use std::collections::HashMap;

use airq_common::{Measurement, Parameter};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};

use super::repository::{
    DateRange, MeasurementRepository, ParameterStatistics, QueryError, TimeSeriesPoint,
};
use crate::ingest::{BulkWriter, WriteError};

/// PostgreSQL caps bind parameters per statement at 65535
const MAX_BIND_PARAMS: usize = 65_535;
const BINDS_PER_ROW: usize = 1 + Parameter::ALL.len();
const MAX_ROWS_PER_STATEMENT: usize = MAX_BIND_PARAMS / BINDS_PER_ROW;

#[derive(Debug, sqlx::FromRow)]
struct MeasurementRow {
    timestamp: DateTime<Utc>,
    co: Option<f64>,
    nmhc: Option<f64>,
    benzene: Option<f64>,
    nox: Option<f64>,
    no2: Option<f64>,
    pt08_s1_co: Option<f64>,
    pt08_s2_nmhc: Option<f64>,
    pt08_s3_nox: Option<f64>,
    pt08_s4_no2: Option<f64>,
    pt08_s5_o3: Option<f64>,
    temperature: Option<f64>,
    relative_humidity: Option<f64>,
    absolute_humidity: Option<f64>,
}

impl From<MeasurementRow> for Measurement {
    fn from(row: MeasurementRow) -> Self {
        Measurement {
            timestamp: row.timestamp,
            co: row.co,
            nmhc: row.nmhc,
            benzene: row.benzene,
            nox: row.nox,
            no2: row.no2,
            pt08_s1_co: row.pt08_s1_co,
            pt08_s2_nmhc: row.pt08_s2_nmhc,
            pt08_s3_nox: row.pt08_s3_nox,
            pt08_s4_no2: row.pt08_s4_no2,
            pt08_s5_o3: row.pt08_s5_o3,
            temperature: row.temperature,
            relative_humidity: row.relative_humidity,
            absolute_humidity: row.absolute_humidity,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct StatisticsRow {
    average: Option<f64>,
    minimum: Option<f64>,
    maximum: Option<f64>,
    std_dev: Option<f64>,
    median: Option<f64>,
    p95: Option<f64>,
    data_points: i64,
    first_timestamp: Option<DateTime<Utc>>,
    last_timestamp: Option<DateTime<Utc>>,
}

fn reading_columns() -> String {
    Parameter::ALL
        .iter()
        .map(|p| p.column())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Keep the last measurement per timestamp; one statement may not touch the
/// same conflict key twice
fn dedup_by_timestamp(measurements: &[Measurement]) -> Vec<&Measurement> {
    let mut last_index: HashMap<DateTime<Utc>, usize> = HashMap::with_capacity(measurements.len());
    for (index, m) in measurements.iter().enumerate() {
        last_index.insert(m.timestamp, index);
    }

    measurements
        .iter()
        .enumerate()
        .filter(|(index, m)| last_index.get(&m.timestamp) == Some(index))
        .map(|(_, m)| m)
        .collect()
}

#[derive(Clone)]
pub struct PgMeasurementRepository {
    pool: PgPool,
}

impl PgMeasurementRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn push_range_filter(builder: &mut QueryBuilder<'_, Postgres>, range: Option<DateRange>) {
        if let Some(range) = range {
            builder.push(" AND timestamp >= ");
            builder.push_bind(range.start);
            builder.push(" AND timestamp <= ");
            builder.push_bind(range.end);
        }
    }
}

#[async_trait]
impl BulkWriter for PgMeasurementRepository {
    async fn bulk_insert(&self, measurements: &[Measurement]) -> Result<(), WriteError> {
        let rows = dedup_by_timestamp(measurements);
        if rows.is_empty() {
            return Ok(());
        }

        let updates = Parameter::ALL
            .iter()
            .map(|p| format!("{0} = EXCLUDED.{0}", p.column()))
            .collect::<Vec<_>>()
            .join(", ");

        let mut tx = self.pool.begin().await?;

        for chunk in rows.chunks(MAX_ROWS_PER_STATEMENT) {
            let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(format!(
                "INSERT INTO air_quality_measurements (timestamp, {}) ",
                reading_columns()
            ));

            builder.push_values(chunk, |mut row, m| {
                row.push_bind(m.timestamp);
                for parameter in Parameter::ALL {
                    row.push_bind(m.reading(parameter));
                }
            });

            builder.push(format!(
                " ON CONFLICT (timestamp) DO UPDATE SET {}, updated_at = NOW()",
                updates
            ));

            builder.build().execute(&mut *tx).await?;
        }

        tx.commit().await?;

        Ok(())
    }
}

#[async_trait]
impl MeasurementRepository for PgMeasurementRepository {
    async fn get_by_date_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Measurement>, QueryError> {
        let range = DateRange::new(start, end)?;
        let sql = format!(
            r#"
            SELECT timestamp, {}
            FROM air_quality_measurements
            WHERE timestamp BETWEEN $1 AND $2
            ORDER BY timestamp
            "#,
            reading_columns()
        );

        let rows = sqlx::query_as::<_, MeasurementRow>(&sql)
            .bind(range.start)
            .bind(range.end)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(Measurement::from).collect())
    }

    async fn time_series(
        &self,
        parameter: Parameter,
        range: Option<DateRange>,
    ) -> Result<Vec<TimeSeriesPoint>, QueryError> {
        let column = parameter.column();
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "SELECT timestamp, {0} AS value FROM air_quality_measurements WHERE {0} IS NOT NULL",
            column
        ));
        Self::push_range_filter(&mut builder, range);
        builder.push(" ORDER BY timestamp");

        let rows: Vec<(DateTime<Utc>, f64)> =
            builder.build_query_as().fetch_all(&self.pool).await?;

        Ok(rows
            .into_iter()
            .map(|(timestamp, value)| TimeSeriesPoint { timestamp, value })
            .collect())
    }

    async fn statistics(
        &self,
        parameter: Parameter,
        range: Option<DateRange>,
    ) -> Result<ParameterStatistics, QueryError> {
        let column = parameter.column();
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            r#"
            SELECT
                AVG({0}) AS average,
                MIN({0}) AS minimum,
                MAX({0}) AS maximum,
                STDDEV({0}) AS std_dev,
                PERCENTILE_CONT(0.5) WITHIN GROUP (ORDER BY {0}) AS median,
                PERCENTILE_CONT(0.95) WITHIN GROUP (ORDER BY {0}) AS p95,
                COUNT({0}) AS data_points,
                MIN(timestamp) AS first_timestamp,
                MAX(timestamp) AS last_timestamp
            FROM air_quality_measurements
            WHERE {0} IS NOT NULL
            "#,
            column
        ));
        Self::push_range_filter(&mut builder, range);

        let row: StatisticsRow = builder.build_query_as().fetch_one(&self.pool).await?;

        if row.data_points == 0 {
            return Ok(ParameterStatistics::empty(parameter));
        }

        let date_range = match (row.first_timestamp, row.last_timestamp) {
            (Some(start), Some(end)) => Some(DateRange { start, end }),
            _ => None,
        };

        Ok(ParameterStatistics {
            parameter,
            unit: parameter.unit(),
            average: row.average.unwrap_or(0.0),
            minimum: row.minimum.unwrap_or(0.0),
            maximum: row.maximum.unwrap_or(0.0),
            std_dev: row.std_dev.unwrap_or(0.0),
            median: row.median.unwrap_or(0.0),
            p95: row.p95.unwrap_or(0.0),
            data_points: row.data_points,
            date_range,
        })
    }

    async fn count(&self) -> Result<i64, QueryError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM air_quality_measurements")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn date_range(&self) -> Result<Option<DateRange>, QueryError> {
        let (start, end): (Option<DateTime<Utc>>, Option<DateTime<Utc>>) =
            sqlx::query_as("SELECT MIN(timestamp), MAX(timestamp) FROM air_quality_measurements")
                .fetch_one(&self.pool)
                .await?;

        Ok(match (start, end) {
            (Some(start), Some(end)) => Some(DateRange { start, end }),
            _ => None,
        })
    }
}

//! Common test utilities for AirQ server integration tests
//!
//! - CSV fixtures in the semicolon separated, comma decimal layout of the
//!   hourly air quality dataset
//! - Scripted [`BulkWriter`]s for failure, latency and overlap checks
//! - A PostgreSQL container with migrations applied (requires Docker)

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use airq_common::Measurement;
use airq_server::ingest::{BulkWriter, WriteError};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use testcontainers::{core::IntoContainerPort, runners::AsyncRunner, ContainerAsync, ImageExt};
use testcontainers_modules::postgres::Postgres;
use tracing::{debug, info};

// ============================================================================
// CSV Fixtures
// ============================================================================

pub const HEADER: &str = "Date;Time;CO(GT);PT08.S1(CO);NMHC(GT);C6H6(GT);PT08.S2(NMHC);NOx(GT);PT08.S3(NOx);NO2(GT);PT08.S4(NO2);PT08.S5(O3);T;RH;AH;;";

/// Timestamp of data row `index` (0-based) in generated fixtures
pub fn row_timestamp(index: usize) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2004, 3, 10, 18, 0, 0).unwrap() + chrono::Duration::hours(index as i64)
}

/// One valid data row for `index`
pub fn valid_row(index: usize) -> String {
    let ts = row_timestamp(index);
    format!(
        "{};{};2,6;1360;150;11,9;1046;166;1056;113;1692;1268;13,6;48,9;0,7578;;",
        ts.format("%d/%m/%Y"),
        ts.format("%H.%M.%S"),
    )
}

/// Row with the sentinel in every reading column
pub fn sentinel_row(index: usize) -> String {
    let ts = row_timestamp(index);
    format!(
        "{};{};-200;-200;-200;-200;-200;-200;-200;-200;-200;-200;-200;-200;-200;;",
        ts.format("%d/%m/%Y"),
        ts.format("%H.%M.%S"),
    )
}

pub fn missing_date_row() -> String {
    ";18.00.00;2,6;1360;150;11,9;1046;166;1056;113;1692;1268;13,6;48,9;0,7578;;".to_string()
}

/// Header plus `rows`, newline terminated
pub fn csv(rows: impl IntoIterator<Item = String>) -> String {
    let mut out = String::from(HEADER);
    out.push('\n');
    for row in rows {
        out.push_str(&row);
        out.push('\n');
    }
    out
}

/// Header plus `n` valid rows
pub fn valid_csv(n: usize) -> String {
    csv((0..n).map(valid_row))
}

pub fn write_csv(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path
}

// ============================================================================
// Scripted Writers
// ============================================================================

/// Records every call; optionally fails chosen calls (1-based)
#[derive(Default)]
pub struct RecordingWriter {
    calls: Mutex<Vec<usize>>,
    stored: Mutex<Vec<Measurement>>,
    fail_on: HashSet<usize>,
    in_flight: AtomicBool,
    overlapped: AtomicBool,
    delay: Option<Duration>,
}

impl RecordingWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(calls: impl IntoIterator<Item = usize>) -> Self {
        Self {
            fail_on: calls.into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Batch sizes in call order
    pub fn calls(&self) -> Vec<usize> {
        self.calls.lock().unwrap().clone()
    }

    pub fn stored(&self) -> Vec<Measurement> {
        self.stored.lock().unwrap().clone()
    }

    /// Whether two calls were ever in flight at once
    pub fn overlapped(&self) -> bool {
        self.overlapped.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BulkWriter for RecordingWriter {
    async fn bulk_insert(&self, measurements: &[Measurement]) -> Result<(), WriteError> {
        if self.in_flight.swap(true, Ordering::SeqCst) {
            self.overlapped.store(true, Ordering::SeqCst);
        }

        let call = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(measurements.len());
            calls.len()
        };

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let outcome = if self.fail_on.contains(&call) {
            Err(WriteError::Rejected(format!("write {} rejected", call)))
        } else {
            self.stored.lock().unwrap().extend_from_slice(measurements);
            Ok(())
        };

        self.in_flight.store(false, Ordering::SeqCst);
        outcome
    }
}

/// Counts calls and sleeps on each one
pub struct SlowWriter {
    pub delay: Duration,
    pub calls: AtomicUsize,
}

impl SlowWriter {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl BulkWriter for SlowWriter {
    async fn bulk_insert(&self, _measurements: &[Measurement]) -> Result<(), WriteError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        Ok(())
    }
}

// ============================================================================
// PostgreSQL Test Container
// ============================================================================

/// PostgreSQL container with migrations applied
pub struct TestPostgres {
    container: ContainerAsync<Postgres>,
    pool: PgPool,
}

impl TestPostgres {
    pub async fn start() -> Result<Self> {
        info!("Starting PostgreSQL test container...");

        let container = Postgres::default()
            .with_tag("16-alpine")
            .start()
            .await
            .context("Failed to start PostgreSQL container")?;

        let host = container
            .get_host()
            .await
            .context("Failed to get container host")?;
        let port = container
            .get_host_port_ipv4(5432.tcp())
            .await
            .context("Failed to get container port")?;

        let connection_string =
            format!("postgresql://postgres:postgres@{}:{}/postgres", host, port);
        debug!("PostgreSQL connection: {}", connection_string);

        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(30))
            .connect(&connection_string)
            .await
            .context("Failed to connect to PostgreSQL")?;

        sqlx::migrate!("../../migrations")
            .run(&pool)
            .await
            .context("Failed to run migrations")?;

        Ok(Self { container, pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn pool_clone(&self) -> PgPool {
        self.pool.clone()
    }
}

// ============================================================================
// Tracing
// ============================================================================

/// Initialize tracing for tests
pub fn init_test_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let _ = fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("info,airq_server=debug,sqlx=warn,testcontainers=info")
        }))
        .with_test_writer()
        .try_init();
}

//! Ingestion orchestrator
//!
//! Drives one file end to end: pulls batches from the [`MeasurementBatcher`],
//! hands each to the [`BulkWriter`], keeps the running counts and reports
//! progress after every batch that was stored.
//!
//! Failure handling:
//!
//! - a rejected row is counted and logged, the stream continues
//! - a failed batch write marks every row of that batch as failed, the stream
//!   continues with the next batch
//! - a parse or I/O failure of the stream itself aborts the run with
//!   [`IngestError`] and produces no partial result

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tokio::io::AsyncRead;
use tracing::{debug, info, warn};

use super::batcher::{IngestError, MeasurementBatcher, DEFAULT_BATCH_SIZE};
use super::result::{ErrorLog, IngestionResult, DEFAULT_ERROR_LIMIT};
use super::writer::BulkWriter;

/// Receives the running processed count after each stored batch
///
/// Reporting is best effort: errors are logged and otherwise ignored.
#[async_trait]
pub trait ProgressReporter: Send + Sync {
    async fn report(&self, processed: u64) -> anyhow::Result<()>;
}

/// Reporter that discards progress
pub struct NoProgress;

#[async_trait]
impl ProgressReporter for NoProgress {
    async fn report(&self, _processed: u64) -> anyhow::Result<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct IngestionSettings {
    pub batch_size: usize,
    pub error_limit: usize,
}

impl Default for IngestionSettings {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            error_limit: DEFAULT_ERROR_LIMIT,
        }
    }
}

#[derive(Clone)]
pub struct IngestionOrchestrator {
    writer: Arc<dyn BulkWriter>,
    settings: IngestionSettings,
}

impl IngestionOrchestrator {
    pub fn new(writer: Arc<dyn BulkWriter>) -> Self {
        Self::with_settings(writer, IngestionSettings::default())
    }

    pub fn with_settings(writer: Arc<dyn BulkWriter>, settings: IngestionSettings) -> Self {
        Self { writer, settings }
    }

    /// Ingest the file at `file_path`
    #[tracing::instrument(skip(self, file_path, progress), fields(file = %file_path.display()))]
    pub async fn run(
        &self,
        file_path: &Path,
        progress: &dyn ProgressReporter,
    ) -> Result<IngestionResult, IngestError> {
        let started = Instant::now();
        let batcher = MeasurementBatcher::open(file_path, self.settings.batch_size).await?;
        self.drive(batcher, progress, started).await
    }

    /// Ingest from an already opened source
    pub async fn run_reader<R>(
        &self,
        reader: R,
        progress: &dyn ProgressReporter,
    ) -> Result<IngestionResult, IngestError>
    where
        R: AsyncRead + Unpin + Send,
    {
        let started = Instant::now();
        let batcher = MeasurementBatcher::from_reader(reader, self.settings.batch_size).await?;
        self.drive(batcher, progress, started).await
    }

    async fn drive<R>(
        &self,
        mut batcher: MeasurementBatcher<R>,
        progress: &dyn ProgressReporter,
        started: Instant,
    ) -> Result<IngestionResult, IngestError>
    where
        R: AsyncRead + Unpin + Send,
    {
        let mut errors = ErrorLog::new(self.settings.error_limit);
        let mut processed = 0u64;
        let mut batch_number = 0u64;

        while let Some(batch) = batcher.next_batch(&mut errors).await? {
            batch_number += 1;

            match self.writer.bulk_insert(batch.measurements()).await {
                Ok(()) => {
                    processed += batch.len() as u64;
                    debug!(batch = batch_number, rows = batch.len(), processed, "Batch stored");

                    if let Err(e) = progress.report(processed).await {
                        warn!(processed, error = %e, "Failed to report progress");
                    }
                },
                Err(e) => {
                    warn!(batch = batch_number, rows = batch.len(), error = %e, "Batch write failed");
                    let message = e.to_string();
                    for &row in batch.rows() {
                        errors.record(row, message.as_str());
                    }
                },
            }
        }

        let failed = errors.failed();
        let duration = started.elapsed().as_millis() as u64;

        info!(
            processed,
            failed,
            rows = batcher.rows_read(),
            batches = batch_number,
            duration_ms = duration,
            "Ingestion finished"
        );

        Ok(IngestionResult {
            processed,
            failed,
            duration,
            errors: errors.into_entries(),
        })
    }
}

//! Streaming CSV reader that yields bounded batches of measurements
//!
//! The batcher is pull-based: nothing is read from the file until the caller
//! asks for the next batch, and reading stops as soon as that batch is full.
//! While the caller is writing a batch, the source is idle, so at most one
//! batch plus the reader buffer is ever held in memory.

use std::path::Path;

use airq_common::Measurement;
use csv_async::{AsyncReader, AsyncReaderBuilder, ByteRecord, StringRecord, Trim};
use thiserror::Error;
use tokio::io::AsyncRead;

use super::result::ErrorLog;
use super::transform::{transform_record, RawRecord};

/// Default number of measurements per batch
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Field delimiter of the input files
pub const DELIMITER: u8 = b';';

/// Stream-level failure; aborts the ingestion attempt
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("CSV parsing failed: {0}")]
    Parse(String),

    #[error("Failed to open {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl From<csv_async::Error> for IngestError {
    fn from(err: csv_async::Error) -> Self {
        IngestError::Parse(err.to_string())
    }
}

/// Measurements ready to be written, with the data row each came from
#[derive(Debug, Default)]
pub struct Batch {
    measurements: Vec<Measurement>,
    rows: Vec<u64>,
}

impl Batch {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            measurements: Vec::with_capacity(capacity),
            rows: Vec::with_capacity(capacity),
        }
    }

    fn push(&mut self, row: u64, measurement: Measurement) {
        self.rows.push(row);
        self.measurements.push(measurement);
    }

    pub fn len(&self) -> usize {
        self.measurements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.measurements.is_empty()
    }

    pub fn measurements(&self) -> &[Measurement] {
        &self.measurements
    }

    /// Source row numbers, parallel to [`Batch::measurements`]
    pub fn rows(&self) -> &[u64] {
        &self.rows
    }
}

fn reader_builder() -> AsyncReaderBuilder {
    let mut builder = AsyncReaderBuilder::new();
    builder
        .delimiter(DELIMITER)
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All);
    builder
}

async fn open_file(path: &Path) -> Result<tokio::fs::File, IngestError> {
    tokio::fs::File::open(path)
        .await
        .map_err(|source| IngestError::Io {
            path: path.display().to_string(),
            source,
        })
}

/// Count the data records in `path` using the same reader settings as the
/// batcher. Used to compute progress totals before ingestion starts.
pub async fn count_rows(path: &Path) -> Result<u64, IngestError> {
    let file = open_file(path).await?;
    let mut reader = reader_builder().create_reader(file);
    let mut record = ByteRecord::new();
    let mut count = 0u64;

    while reader.read_byte_record(&mut record).await? {
        count += 1;
    }

    Ok(count)
}

/// Pull-based batcher over a semicolon-delimited measurement file
pub struct MeasurementBatcher<R> {
    reader: AsyncReader<R>,
    headers: StringRecord,
    record: StringRecord,
    batch_size: usize,
    rows_read: u64,
    exhausted: bool,
}

impl MeasurementBatcher<tokio::fs::File> {
    pub async fn open(path: &Path, batch_size: usize) -> Result<Self, IngestError> {
        let file = open_file(path).await?;
        Self::from_reader(file, batch_size).await
    }
}

impl<R> MeasurementBatcher<R>
where
    R: AsyncRead + Unpin + Send,
{
    pub async fn from_reader(reader: R, batch_size: usize) -> Result<Self, IngestError> {
        let mut reader = reader_builder().create_reader(reader);
        let headers = reader.headers().await?.clone();

        Ok(Self {
            reader,
            headers,
            record: StringRecord::new(),
            batch_size: batch_size.max(1),
            rows_read: 0,
            exhausted: false,
        })
    }

    /// Read until the next batch is full or the stream ends
    ///
    /// Rejected rows go to `errors`. Returns `Ok(None)` once the stream is
    /// exhausted and no measurements remain.
    pub async fn next_batch(&mut self, errors: &mut ErrorLog) -> Result<Option<Batch>, IngestError> {
        if self.exhausted {
            return Ok(None);
        }

        let mut batch = Batch::with_capacity(self.batch_size);

        while batch.len() < self.batch_size {
            if !self.reader.read_record(&mut self.record).await? {
                self.exhausted = true;
                break;
            }
            self.rows_read += 1;

            let raw = RawRecord::new(&self.headers, &self.record);
            match transform_record(&raw) {
                Ok(measurement) => batch.push(self.rows_read, measurement),
                Err(rejected) => {
                    tracing::trace!(row = self.rows_read, reason = %rejected, "Row rejected");
                    errors.record(self.rows_read, rejected.to_string());
                },
            }
        }

        if batch.is_empty() {
            Ok(None)
        } else {
            Ok(Some(batch))
        }
    }

    /// Data records consumed so far, accepted or not
    pub fn rows_read(&self) -> u64 {
        self.rows_read
    }
}

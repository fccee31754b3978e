//! Measurement file ingestion pipeline
//!
//! ```text
//! file ──► MeasurementBatcher ──► Batch (≤ batch_size) ──► BulkWriter
//!              │  transform_record                            │
//!              ▼                                              ▼
//!          ErrorLog ◄──────────── failed batch rows ── IngestionOrchestrator
//!                                                             │
//!                                                   ProgressReporter
//! ```
//!
//! The orchestrator pulls one batch at a time and does not ask for the next
//! one until the current write has finished, which is the only backpressure
//! mechanism needed.

pub mod batcher;
pub mod orchestrator;
pub mod result;
pub mod transform;
pub mod writer;

pub use batcher::{count_rows, Batch, IngestError, MeasurementBatcher, DEFAULT_BATCH_SIZE};
pub use orchestrator::{IngestionOrchestrator, IngestionSettings, NoProgress, ProgressReporter};
pub use result::{ErrorLog, IngestionResult, RowError, DEFAULT_ERROR_LIMIT};
pub use transform::{transform_record, RawRecord, RowRejected};
pub use writer::{BulkWriter, WriteError};

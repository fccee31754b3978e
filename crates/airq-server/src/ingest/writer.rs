//! Bulk writer seam between the ingestion pipeline and storage

use std::sync::Arc;

use airq_common::Measurement;
use async_trait::async_trait;
use thiserror::Error;

/// Batch write failure
///
/// The display text becomes the per-row error message for every row of the
/// failed batch.
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("{0}")]
    Rejected(String),
}

/// Persists batches of measurements
///
/// Implementations must upsert on `timestamp`: writing a measurement whose
/// timestamp already exists replaces the stored readings.
#[async_trait]
pub trait BulkWriter: Send + Sync {
    async fn bulk_insert(&self, measurements: &[Measurement]) -> Result<(), WriteError>;
}

#[async_trait]
impl<T: BulkWriter + ?Sized> BulkWriter for Arc<T> {
    async fn bulk_insert(&self, measurements: &[Measurement]) -> Result<(), WriteError> {
        (**self).bulk_insert(measurements).await
    }
}

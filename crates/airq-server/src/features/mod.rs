//! Feature modules implementing the AirQ API
//!
//! Each feature is a vertical slice with its own commands, queries, and
//! routes.
//!
//! # Features
//!
//! - **ingestion**: CSV upload and job status polling
//! - **air_quality**: time series, statistics and raw rows of stored measurements
//!
//! # Architecture
//!
//! Each feature module follows the structure:
//! - `commands/` - Write operations
//! - `queries/` - Read operations
//! - `routes.rs` - HTTP route definitions
//!
//! Handlers are plain async functions taking their collaborators by
//! reference, so they can be tested without the HTTP layer.

pub mod air_quality;
pub mod ingestion;

use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;

use crate::measurements::MeasurementRepository;
use crate::queue::JobQueue;

/// Shared state for all feature routes
#[derive(Clone)]
pub struct FeatureState {
    pub queue: JobQueue,
    pub measurements: Arc<dyn MeasurementRepository>,
    /// Where uploads are stored until their job finishes
    pub upload_dir: PathBuf,
}

/// Creates the API router with all feature routes mounted
///
/// - `/ingest` - Upload and job status
/// - `/air-quality` - Measurement queries
pub fn router(state: FeatureState) -> Router<()> {
    let ingestion_state = ingestion::IngestionState {
        queue: state.queue,
        upload_dir: state.upload_dir,
    };

    Router::new()
        .nest("/ingest", ingestion::ingestion_routes().with_state(ingestion_state))
        .nest("/air-quality", air_quality::air_quality_routes().with_state(state.measurements))
}

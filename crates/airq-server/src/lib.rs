//! AirQ Server Library
//!
//! Ingestion service for hourly air quality sensor data.
//!
//! # Overview
//!
//! - **Ingestion pipeline** ([`ingest`]): streaming CSV parsing, row
//!   validation, bounded batches, bulk upserts
//! - **Job queue** ([`queue`]): durable background jobs with retries,
//!   progress and a worker pool
//! - **Measurements** ([`measurements`]): PostgreSQL and in-memory storage
//!   behind one write trait and one read trait
//! - **API** ([`api`], [`features`]): upload, job status, and read queries
//!
//! # Architecture
//!
//! Features are vertical slices (`commands/`, `queries/`, `routes.rs`). The
//! HTTP layer only submits jobs; ingestion itself runs on the worker pool.
//!
//! ```text
//! POST /api/v1/ingest ──▶ JobQueue ──▶ WorkerPool ──▶ IngestionOrchestrator
//!                             ▲                          │
//! GET /ingest/status/:id ─────┘                MeasurementBatcher ──▶ BulkWriter
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use airq_server::ingest::{IngestionOrchestrator, NoProgress};
//! use airq_server::measurements::MemoryMeasurementStore;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let orchestrator = IngestionOrchestrator::new(Arc::new(MemoryMeasurementStore::new()));
//! let result = orchestrator
//!     .run(std::path::Path::new("AirQualityUCI.csv"), &NoProgress)
//!     .await?;
//! tracing::info!(processed = result.processed, failed = result.failed, "Ingested");
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod features;
pub mod ingest;
pub mod measurements;
pub mod middleware;
pub mod queue;

// Re-export commonly used types
pub use error::AppError;

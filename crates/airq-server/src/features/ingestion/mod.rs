//! Ingestion feature module
//!
//! File upload and job status polling. Uploads are written to the upload
//! directory and handed to the [`JobQueue`]; the worker that runs the job
//! removes the file once the job reaches a terminal state.

pub mod commands;
pub mod queries;
pub mod routes;

#[cfg(test)]
mod routes_test;

use std::path::PathBuf;

use crate::queue::JobQueue;

pub use routes::ingestion_routes;

#[derive(Clone)]
pub struct IngestionState {
    pub queue: JobQueue,
    pub upload_dir: PathBuf,
}

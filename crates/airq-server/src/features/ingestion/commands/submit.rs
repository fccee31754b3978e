//! Submit an uploaded file for ingestion

use std::path::PathBuf;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::queue::{JobData, JobId, JobQueue, QueueError};

/// MIME types accepted for uploads
pub const CSV_CONTENT_TYPES: [&str; 3] = ["text/csv", "application/csv", "application/vnd.ms-excel"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitIngestionCommand {
    /// Where the upload was stored; owned by the job from here on
    pub file_path: PathBuf,
    pub original_file_name: String,
    pub submitted_by: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitIngestionResponse {
    pub job_id: JobId,
    pub status: String,
    pub tracking_url: String,
}

#[derive(Debug, thiserror::Error)]
pub enum SubmitIngestionError {
    #[error("No file uploaded")]
    NoFile,
    #[error("Invalid file type. Only CSV files are allowed")]
    InvalidFileType,
    #[error("Uploaded file is empty")]
    EmptyFile,
    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),
}

/// Whether an upload looks like a CSV file
///
/// The declared content type wins; generic or missing types fall back to the
/// file extension.
pub fn is_csv_upload(file_name: &str, content_type: Option<&str>) -> bool {
    let declared = content_type
        .map(|ct| ct.split(';').next().unwrap_or(ct).trim().to_ascii_lowercase());

    match declared.as_deref() {
        Some(ct) if CSV_CONTENT_TYPES.contains(&ct) => true,
        Some("application/octet-stream") | Some("text/plain") | None => {
            file_name.to_ascii_lowercase().ends_with(".csv")
        },
        Some(_) => false,
    }
}

pub fn tracking_url(job_id: JobId) -> String {
    format!("/api/v1/ingest/status/{}", job_id)
}

#[tracing::instrument(skip(queue, command), fields(file = %command.original_file_name))]
pub async fn handle(
    queue: &JobQueue,
    command: SubmitIngestionCommand,
) -> Result<SubmitIngestionResponse, SubmitIngestionError> {
    let job_id = queue
        .submit(JobData {
            file_path: command.file_path,
            original_file_name: command.original_file_name,
            uploaded_at: Utc::now(),
            submitted_by: command.submitted_by,
        })
        .await?;

    Ok(SubmitIngestionResponse {
        job_id,
        status: "processing".to_string(),
        tracking_url: tracking_url(job_id),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_csv_upload() {
        assert!(is_csv_upload("data.csv", Some("text/csv")));
        assert!(is_csv_upload("data.txt", Some("text/csv; charset=utf-8")));
        assert!(is_csv_upload("AirQualityUCI.CSV", Some("application/octet-stream")));
        assert!(is_csv_upload("data.csv", None));
        assert!(!is_csv_upload("data.json", None));
        assert!(!is_csv_upload("data.csv", Some("image/png")));
    }

    #[test]
    fn test_tracking_url() {
        let id = uuid::Uuid::nil();
        assert_eq!(
            tracking_url(id),
            "/api/v1/ingest/status/00000000-0000-0000-0000-000000000000"
        );
    }
}

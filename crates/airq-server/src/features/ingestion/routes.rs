//! Ingestion routes
//!
//! - `POST /` multipart upload (field `file`), answers 202 with the job id
//! - `GET /status/:job_id` job state, progress and result

use std::net::SocketAddr;
use std::path::{Path as FsPath, PathBuf};

use axum::{
    extract::{multipart::Field, ConnectInfo, Multipart, Path, State},
    http::{HeaderMap, StatusCode},
    response::Response,
    routing::{get, post},
    Router,
};
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use super::commands::submit::{handle as handle_submit, is_csv_upload};
use super::commands::{SubmitIngestionCommand, SubmitIngestionError};
use super::queries::{get_status::handle as handle_get_status, GetIngestionStatusQuery};
use super::IngestionState;
use crate::api::response::ApiResponse;
use crate::error::AppError;

pub fn ingestion_routes() -> Router<IngestionState> {
    Router::new()
        .route("/", post(submit_ingestion))
        .route("/status/:job_id", get(get_ingestion_status))
}

/// POST /ingest
async fn submit_ingestion(
    State(state): State<IngestionState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Response, AppError> {
    let mut stored: Option<(PathBuf, String)> = None;

    // a later field can still fail the request once the file is on disk
    if let Err(e) = receive_upload(&state.upload_dir, &mut multipart, &mut stored).await {
        if let Some((path, _)) = &stored {
            remove_quietly(path).await;
        }
        return Err(e);
    }

    let (file_path, original_file_name) = stored.ok_or(SubmitIngestionError::NoFile)?;

    let command = SubmitIngestionCommand {
        file_path: file_path.clone(),
        original_file_name,
        submitted_by: client_address(&headers, connect_info),
    };

    match handle_submit(&state.queue, command).await {
        Ok(response) => {
            tracing::info!(job_id = %response.job_id, "Ingestion job submitted via API");
            Ok(ApiResponse::success(response)
                .with_message("Data ingestion started")
                .with_status(StatusCode::ACCEPTED))
        },
        Err(e) => {
            remove_quietly(&file_path).await;
            Err(e.into())
        },
    }
}

/// GET /ingest/status/:job_id
async fn get_ingestion_status(
    State(state): State<IngestionState>,
    Path(job_id): Path<String>,
) -> Result<ApiResponse<crate::queue::JobStatus>, AppError> {
    let status = handle_get_status(&state.queue, GetIngestionStatusQuery { job_id }).await?;
    Ok(ApiResponse::success(status))
}

/// Store the first `file` field under `upload_dir`, draining the rest
async fn receive_upload(
    upload_dir: &FsPath,
    multipart: &mut Multipart,
    stored: &mut Option<(PathBuf, String)>,
) -> Result<(), AppError> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("file") || stored.is_some() {
            continue;
        }

        let original_file_name = field.file_name().unwrap_or("upload.csv").to_string();
        if !is_csv_upload(&original_file_name, field.content_type()) {
            return Err(SubmitIngestionError::InvalidFileType.into());
        }

        let path = upload_dir.join(format!("{}.csv", Uuid::new_v4()));
        let written = match persist_field(field, &path).await {
            Ok(written) => written,
            Err(e) => {
                remove_quietly(&path).await;
                return Err(e);
            },
        };

        if written == 0 {
            remove_quietly(&path).await;
            return Err(SubmitIngestionError::EmptyFile.into());
        }

        tracing::debug!(file = %original_file_name, bytes = written, "Upload stored");
        *stored = Some((path, original_file_name));
    }

    Ok(())
}

/// Stream one multipart field to disk; returns the bytes written
async fn persist_field(mut field: Field<'_>, path: &FsPath) -> Result<u64, AppError> {
    let mut file = tokio::fs::File::create(path).await?;
    let mut written = 0u64;

    while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }

    file.flush().await?;
    Ok(written)
}

fn multipart_error(err: axum::extract::multipart::MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(err.body_text())
    } else {
        AppError::BadRequest(format!("Failed to read multipart data: {}", err.body_text()))
    }
}

async fn remove_quietly(path: &FsPath) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(file = %path.display(), error = %e, "Failed to remove rejected upload");
        }
    }
}

fn client_address(headers: &HeaderMap, connect_info: Option<ConnectInfo<SocketAddr>>) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .or_else(|| connect_info.map(|ConnectInfo(addr)| addr.ip().to_string()))
        .unwrap_or_else(|| "anonymous".to_string())
}

//! PostgreSQL job store (`ingestion_jobs` table)
//!
//! Claiming uses `FOR UPDATE SKIP LOCKED` so several workers, in one process
//! or many, never pick up the same job. State guards live in the `WHERE`
//! clauses, which makes every transition a single atomic statement.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::job::{Job, JobData, JobId, JobProgress, JobState};
use super::store::{JobStore, QueueError, RetentionPolicy};
use crate::ingest::IngestionResult;

const JOB_COLUMNS: &str = r#"
    id, file_path, original_file_name, uploaded_at, submitted_by, state,
    attempts, max_attempts, processed, total, percentage, result, error,
    created_at, started_at, finished_at
"#;

#[derive(Debug, sqlx::FromRow)]
struct JobRow {
    id: Uuid,
    file_path: String,
    original_file_name: String,
    uploaded_at: DateTime<Utc>,
    submitted_by: String,
    state: String,
    attempts: i32,
    max_attempts: i32,
    processed: i64,
    total: i64,
    percentage: i32,
    result: Option<serde_json::Value>,
    error: Option<String>,
    created_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
}

impl TryFrom<JobRow> for Job {
    type Error = QueueError;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        let state: JobState = row.state.parse().map_err(|reason| QueueError::Corrupt {
            id: row.id,
            reason,
        })?;

        let result = row
            .result
            .map(serde_json::from_value::<IngestionResult>)
            .transpose()?;

        Ok(Job {
            id: row.id,
            data: JobData {
                file_path: PathBuf::from(row.file_path),
                original_file_name: row.original_file_name,
                uploaded_at: row.uploaded_at,
                submitted_by: row.submitted_by,
            },
            state,
            attempts: row.attempts.max(0) as u32,
            max_attempts: row.max_attempts.max(1) as u32,
            progress: JobProgress {
                processed: row.processed.max(0) as u64,
                total: row.total.max(0) as u64,
                percentage: row.percentage.max(0) as u32,
            },
            result,
            error: row.error,
            created_at: row.created_at,
            started_at: row.started_at,
            finished_at: row.finished_at,
        })
    }
}

#[derive(Clone)]
pub struct PgJobStore {
    pool: PgPool,
}

impl PgJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn insert(&self, job: &Job) -> Result<(), QueueError> {
        sqlx::query(
            r#"
            INSERT INTO ingestion_jobs (
                id, file_path, original_file_name, uploaded_at, submitted_by,
                state, attempts, max_attempts, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(job.id)
        .bind(job.data.file_path.to_string_lossy().into_owned())
        .bind(&job.data.original_file_name)
        .bind(job.data.uploaded_at)
        .bind(&job.data.submitted_by)
        .bind(job.state.as_str())
        .bind(job.attempts as i32)
        .bind(job.max_attempts as i32)
        .bind(job.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn claim_next(&self) -> Result<Option<Job>, QueueError> {
        let sql = format!(
            r#"
            UPDATE ingestion_jobs
            SET state = 'active', started_at = NOW(), attempts = 1
            WHERE id = (
                SELECT id FROM ingestion_jobs
                WHERE state = 'queued'
                ORDER BY created_at, id
                LIMIT 1
                FOR UPDATE SKIP LOCKED
            )
            RETURNING {}
            "#,
            JOB_COLUMNS
        );

        let row = sqlx::query_as::<_, JobRow>(&sql)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Job::try_from).transpose()
    }

    async fn record_attempt(&self, id: JobId, attempt: u32, error: &str) -> Result<bool, QueueError> {
        let result = sqlx::query(
            r#"
            UPDATE ingestion_jobs
            SET attempts = $2, error = $3
            WHERE id = $1 AND state = 'active'
            "#,
        )
        .bind(id)
        .bind(attempt as i32)
        .bind(error)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn update_progress(&self, id: JobId, progress: JobProgress) -> Result<bool, QueueError> {
        let result = sqlx::query(
            r#"
            UPDATE ingestion_jobs
            SET processed = $2, total = $3, percentage = $4
            WHERE id = $1 AND state = 'active'
            "#,
        )
        .bind(id)
        .bind(progress.processed as i64)
        .bind(progress.total as i64)
        .bind(progress.percentage as i32)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn complete(&self, id: JobId, result: &IngestionResult) -> Result<bool, QueueError> {
        let payload = serde_json::to_value(result)?;

        let outcome = sqlx::query(
            r#"
            UPDATE ingestion_jobs
            SET state = 'completed', result = $2, finished_at = NOW()
            WHERE id = $1 AND state = 'active'
            "#,
        )
        .bind(id)
        .bind(payload)
        .execute(&self.pool)
        .await?;

        Ok(outcome.rows_affected() == 1)
    }

    async fn fail(&self, id: JobId, error: &str) -> Result<bool, QueueError> {
        let outcome = sqlx::query(
            r#"
            UPDATE ingestion_jobs
            SET state = 'failed', error = $2, finished_at = NOW()
            WHERE id = $1 AND state = 'active'
            "#,
        )
        .bind(id)
        .bind(error)
        .execute(&self.pool)
        .await?;

        Ok(outcome.rows_affected() == 1)
    }

    async fn get(&self, id: JobId) -> Result<Option<Job>, QueueError> {
        let sql = format!("SELECT {} FROM ingestion_jobs WHERE id = $1", JOB_COLUMNS);

        let row = sqlx::query_as::<_, JobRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Job::try_from).transpose()
    }

    async fn fail_stalled(
        &self,
        started_before: DateTime<Utc>,
        reason: &str,
    ) -> Result<Vec<Job>, QueueError> {
        let sql = format!(
            r#"
            UPDATE ingestion_jobs
            SET state = 'failed', error = $2, finished_at = NOW()
            WHERE state = 'active' AND started_at < $1
            RETURNING {}
            "#,
            JOB_COLUMNS
        );

        let rows = sqlx::query_as::<_, JobRow>(&sql)
            .bind(started_before)
            .bind(reason)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Job::try_from).collect()
    }

    async fn evict_terminal(&self, policy: RetentionPolicy) -> Result<u64, QueueError> {
        let result = sqlx::query(
            r#"
            DELETE FROM ingestion_jobs
            WHERE id IN (
                SELECT id FROM (
                    SELECT id, state,
                           ROW_NUMBER() OVER (
                               PARTITION BY state
                               ORDER BY finished_at DESC, id DESC
                           ) AS rank
                    FROM ingestion_jobs
                    WHERE state IN ('completed', 'failed')
                ) ranked
                WHERE (state = 'completed' AND rank > $1)
                   OR (state = 'failed' AND rank > $2)
            )
            "#,
        )
        .bind(policy.keep_completed as i64)
        .bind(policy.keep_failed as i64)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn ping(&self) -> Result<(), QueueError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

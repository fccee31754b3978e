//! Job lifecycle events
//!
//! Workers publish [`JobEvent`]s on a broadcast channel. Nobody has to listen;
//! the server subscribes a logging task, tests subscribe to observe ordering.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::job::{JobId, JobProgress};

/// Default broadcast buffer
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq)]
pub enum JobEvent {
    Queued {
        job_id: JobId,
        file_name: String,
    },
    Started {
        job_id: JobId,
        attempt: u32,
    },
    Progress {
        job_id: JobId,
        progress: JobProgress,
    },
    Retrying {
        job_id: JobId,
        attempt: u32,
        delay: Duration,
        error: String,
    },
    Completed {
        job_id: JobId,
        processed: u64,
        failed: u64,
        duration_ms: u64,
    },
    Failed {
        job_id: JobId,
        error: String,
    },
    Stalled {
        job_id: JobId,
    },
}

impl JobEvent {
    pub fn job_id(&self) -> JobId {
        match self {
            JobEvent::Queued { job_id, .. }
            | JobEvent::Started { job_id, .. }
            | JobEvent::Progress { job_id, .. }
            | JobEvent::Retrying { job_id, .. }
            | JobEvent::Completed { job_id, .. }
            | JobEvent::Failed { job_id, .. }
            | JobEvent::Stalled { job_id } => *job_id,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobEvent::Completed { .. } | JobEvent::Failed { .. } | JobEvent::Stalled { .. }
        )
    }
}

/// Log every event; progress only at each new 10% step
pub fn spawn_event_logger(mut events: broadcast::Receiver<JobEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut last_decile: HashMap<JobId, u32> = HashMap::new();

        loop {
            let event = match events.recv().await {
                Ok(event) => event,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Job event logger lagged behind");
                    continue;
                },
                Err(broadcast::error::RecvError::Closed) => break,
            };

            match &event {
                JobEvent::Queued { job_id, file_name } => {
                    info!(job_id = %job_id, file = %file_name, "Ingestion job queued");
                },
                JobEvent::Started { job_id, attempt } => {
                    info!(job_id = %job_id, attempt, "Ingestion job started");
                },
                JobEvent::Progress { job_id, progress } => {
                    let decile = progress.percentage / 10;
                    let last = last_decile.entry(*job_id).or_insert(0);
                    if decile > *last {
                        *last = decile;
                        info!(
                            job_id = %job_id,
                            processed = progress.processed,
                            total = progress.total,
                            percentage = progress.percentage,
                            "Ingestion progress"
                        );
                    }
                },
                JobEvent::Retrying {
                    job_id,
                    attempt,
                    delay,
                    error,
                } => {
                    warn!(
                        job_id = %job_id,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "Ingestion attempt failed, will retry"
                    );
                },
                JobEvent::Completed {
                    job_id,
                    processed,
                    failed,
                    duration_ms,
                } => {
                    info!(
                        job_id = %job_id,
                        processed,
                        failed,
                        duration_ms,
                        "Ingestion job completed"
                    );
                },
                JobEvent::Failed { job_id, error } => {
                    error!(job_id = %job_id, error = %error, "Ingestion job failed");
                },
                JobEvent::Stalled { job_id } => {
                    warn!(job_id = %job_id, "Stalled ingestion job marked as failed");
                },
            }

            if event.is_terminal() {
                last_decile.remove(&event.job_id());
            }
        }
    })
}

//! Queue workers
//!
//! Each worker is one task that claims a job, runs it to a terminal state and
//! claims the next. Idle workers wait for a submit notification or the poll
//! interval, whichever comes first.
//!
//! Per job:
//!
//! 1. count the data rows for progress totals
//! 2. run the orchestrator, retrying failed attempts with exponential backoff
//!    while the job stays `active`
//! 3. all of the above is bounded by the job timeout
//! 4. write the terminal state, then delete the uploaded file
//! 5. evict old terminal jobs
//!
//! Next to the workers, a sweeper fails `active` jobs that outlived twice the
//! job timeout. A job of this process is ended by its own worker at the
//! timeout, so anything older was orphaned by a process that died.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::events::JobEvent;
use super::job::{Job, JobId, JobProgress};
use super::store::JobStore;
use super::QueueShared;
use crate::ingest::{count_rows, IngestionResult, ProgressReporter};

/// `base * 2^(attempt - 1)` for the attempt that just failed
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(16);
    base.saturating_mul(1u32 << exponent)
}

/// Publishes orchestrator progress to the job store and the event channel
pub struct StoreProgressReporter {
    store: Arc<dyn JobStore>,
    events: tokio::sync::broadcast::Sender<JobEvent>,
    job_id: JobId,
    total: u64,
}

#[async_trait]
impl ProgressReporter for StoreProgressReporter {
    async fn report(&self, processed: u64) -> anyhow::Result<()> {
        let progress = JobProgress::new(processed, self.total);
        self.store.update_progress(self.job_id, progress).await?;
        let _ = self.events.send(JobEvent::Progress {
            job_id: self.job_id,
            progress,
        });
        Ok(())
    }
}

/// Delete the uploaded file of a job that reached a terminal state
pub(super) async fn remove_upload(job: &Job) {
    match tokio::fs::remove_file(&job.data.file_path).await {
        Ok(()) => debug!(job_id = %job.id, "Removed uploaded file"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {},
        Err(e) => warn!(
            job_id = %job.id,
            file = %job.data.file_path.display(),
            error = %e,
            "Failed to remove uploaded file"
        ),
    }
}

/// Handles to the running workers
pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
    sweeper: JoinHandle<()>,
    cancel: CancellationToken,
}

impl WorkerPool {
    pub(super) fn spawn(shared: Arc<QueueShared>) -> Self {
        let cancel = CancellationToken::new();
        let concurrency = shared.config.concurrency.max(1);

        let handles = (0..concurrency)
            .map(|worker| {
                let worker = Worker {
                    id: worker,
                    shared: shared.clone(),
                    cancel: cancel.clone(),
                };
                tokio::spawn(worker.run())
            })
            .collect();

        let sweeper = tokio::spawn(sweep_stalled(shared, cancel.clone()));

        info!(concurrency, "Ingestion workers started");

        Self {
            handles,
            sweeper,
            cancel,
        }
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Stop claiming new jobs and wait for in-flight jobs to finish
    pub async fn shutdown(self) {
        self.cancel.cancel();
        for outcome in join_all(self.handles).await {
            if let Err(e) = outcome {
                error!(error = %e, "Ingestion worker panicked");
            }
        }
        if let Err(e) = self.sweeper.await {
            error!(error = %e, "Stalled job sweeper panicked");
        }
        info!("Ingestion workers stopped");
    }
}

/// Periodically fail jobs left `active` by a dead process
async fn sweep_stalled(shared: Arc<QueueShared>, cancel: CancellationToken) {
    let timeout = shared.config.job_timeout;
    let period = timeout.max(shared.config.poll_interval);
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                match shared.fail_stalled(timeout.saturating_mul(2)).await {
                    Ok(stalled) if stalled.is_empty() => {},
                    Ok(stalled) => warn!(count = stalled.len(), "Failed orphaned ingestion jobs"),
                    Err(e) => error!(error = %e, "Stalled job sweep failed"),
                }
            },
        }
    }
}

struct Worker {
    id: usize,
    shared: Arc<QueueShared>,
    cancel: CancellationToken,
}

impl Worker {
    async fn run(self) {
        debug!(worker = self.id, "Worker started");

        while !self.cancel.is_cancelled() {
            match self.shared.store.claim_next().await {
                Ok(Some(job)) => {
                    self.process(job).await;
                    continue;
                },
                Ok(None) => {},
                Err(e) => {
                    error!(worker = self.id, error = %e, "Failed to claim ingestion job");
                },
            }

            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = self.shared.notify.notified() => {},
                _ = tokio::time::sleep(self.shared.config.poll_interval) => {},
            }
        }

        debug!(worker = self.id, "Worker stopped");
    }

    async fn process(&self, job: Job) {
        let job_id = job.id;
        let timeout = self.shared.config.job_timeout;
        self.emit(JobEvent::Started { job_id, attempt: 1 });

        info!(
            worker = self.id,
            job_id = %job_id,
            file = %job.data.original_file_name,
            "Processing ingestion job"
        );

        let outcome = tokio::time::timeout(timeout, self.execute(&job)).await;

        let store = &self.shared.store;
        let terminal = match outcome {
            Ok(Ok(result)) => {
                let event = JobEvent::Completed {
                    job_id,
                    processed: result.processed,
                    failed: result.failed,
                    duration_ms: result.duration,
                };
                store.complete(job_id, &result).await.map(|applied| (applied, event))
            },
            Ok(Err(error)) => {
                let event = JobEvent::Failed {
                    job_id,
                    error: error.clone(),
                };
                store.fail(job_id, &error).await.map(|applied| (applied, event))
            },
            Err(_) => {
                let error = format!("Job timed out after {}s", timeout.as_secs());
                warn!(job_id = %job_id, timeout_secs = timeout.as_secs(), "Ingestion job timed out");
                let event = JobEvent::Failed {
                    job_id,
                    error: error.clone(),
                };
                store.fail(job_id, &error).await.map(|applied| (applied, event))
            },
        };

        match terminal {
            Ok((true, event)) => self.emit(event),
            Ok((false, _)) => {
                warn!(job_id = %job_id, "Job was no longer active; terminal state not recorded");
            },
            Err(e) => {
                error!(job_id = %job_id, error = %e, "Failed to record terminal job state");
            },
        }

        remove_upload(&job).await;

        match store.evict_terminal(self.shared.config.retention).await {
            Ok(0) => {},
            Ok(evicted) => debug!(evicted, "Evicted old terminal jobs"),
            Err(e) => warn!(error = %e, "Failed to evict terminal jobs"),
        }
    }

    /// Every attempt of one job; `Err` carries the last failure reason
    async fn execute(&self, job: &Job) -> Result<IngestionResult, String> {
        let job_id = job.id;
        let path = job.data.file_path.as_path();

        let total = match count_rows(path).await {
            Ok(total) => total,
            Err(e) => {
                warn!(job_id = %job_id, error = %e, "Could not count rows; progress total unknown");
                0
            },
        };

        let reporter = StoreProgressReporter {
            store: self.shared.store.clone(),
            events: self.shared.events.clone(),
            job_id,
            total,
        };
        if let Err(e) = reporter.report(0).await {
            warn!(job_id = %job_id, error = %e, "Failed to report progress");
        }

        let mut attempt = job.attempts.max(1);
        loop {
            match self.shared.orchestrator.run(path, &reporter).await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    let error = e.to_string();
                    if attempt >= job.max_attempts {
                        return Err(error);
                    }

                    let delay = backoff_delay(self.shared.config.backoff_base, attempt);
                    self.emit(JobEvent::Retrying {
                        job_id,
                        attempt,
                        delay,
                        error: error.clone(),
                    });

                    attempt += 1;
                    if let Err(e) = self.shared.store.record_attempt(job_id, attempt, &error).await {
                        warn!(job_id = %job_id, error = %e, "Failed to record retry attempt");
                    }

                    tokio::time::sleep(delay).await;
                    self.emit(JobEvent::Started { job_id, attempt });
                },
            }
        }
    }

    fn emit(&self, event: JobEvent) {
        let _ = self.shared.events.send(event);
    }
}

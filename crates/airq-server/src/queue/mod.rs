//! Background ingestion job queue
//!
//! Decouples file submission from the long-running ingestion. A submitted job
//! is recorded as `queued` in the [`JobStore`], a worker from the
//! [`WorkerPool`] claims it and drives the [`IngestionOrchestrator`], and the
//! client polls [`JobQueue::status`] by id.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use airq_server::ingest::IngestionOrchestrator;
//! use airq_server::measurements::MemoryMeasurementStore;
//! use airq_server::queue::{JobData, JobQueue, MemoryJobStore, QueueConfig};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let orchestrator = IngestionOrchestrator::new(Arc::new(MemoryMeasurementStore::new()));
//! let queue = JobQueue::new(Arc::new(MemoryJobStore::new()), orchestrator, QueueConfig::default());
//! let workers = queue.start();
//!
//! let job_id = queue
//!     .submit(JobData {
//!         file_path: "/tmp/airq-uploads/upload.csv".into(),
//!         original_file_name: "AirQualityUCI.csv".to_string(),
//!         uploaded_at: chrono::Utc::now(),
//!         submitted_by: "anonymous".to_string(),
//!     })
//!     .await?;
//!
//! let status = queue.status(job_id).await?;
//! workers.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod events;
pub mod job;
pub mod memory;
pub mod postgres;
pub mod store;
pub mod worker;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{broadcast, Notify};

use crate::ingest::IngestionOrchestrator;

pub use events::{spawn_event_logger, JobEvent, DEFAULT_EVENT_CAPACITY};
pub use job::{completion_percentage, Job, JobData, JobId, JobProgress, JobState, JobStatus};
pub use memory::MemoryJobStore;
pub use postgres::PgJobStore;
pub use store::{JobStore, QueueError, RetentionPolicy};
pub use worker::{backoff_delay, StoreProgressReporter, WorkerPool};

pub const DEFAULT_CONCURRENCY: usize = 2;
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_BACKOFF_BASE: Duration = Duration::from_millis(5000);
pub const DEFAULT_JOB_TIMEOUT: Duration = Duration::from_secs(300);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1000);

/// Reason recorded on jobs failed by stall recovery
pub const STALLED_REASON: &str = "Job stalled";

#[derive(Debug, Clone, Copy)]
pub struct QueueConfig {
    pub concurrency: usize,
    pub max_attempts: u32,
    pub backoff_base: Duration,
    /// Wall-clock limit for a job, all attempts included
    pub job_timeout: Duration,
    pub poll_interval: Duration,
    pub retention: RetentionPolicy,
    pub event_capacity: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff_base: DEFAULT_BACKOFF_BASE,
            job_timeout: DEFAULT_JOB_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            retention: RetentionPolicy::default(),
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

pub(crate) struct QueueShared {
    store: Arc<dyn JobStore>,
    orchestrator: IngestionOrchestrator,
    events: broadcast::Sender<JobEvent>,
    notify: Notify,
    config: QueueConfig,
}

impl QueueShared {
    /// Fail `active` jobs started more than `age` ago, then delete their
    /// uploads and announce them
    pub(crate) async fn fail_stalled(&self, age: Duration) -> Result<Vec<JobId>, QueueError> {
        let age = chrono::Duration::from_std(age)
            .unwrap_or_else(|_| chrono::Duration::seconds(i64::from(u32::MAX)));

        let stalled = self.store.fail_stalled(Utc::now() - age, STALLED_REASON).await?;

        let mut ids = Vec::with_capacity(stalled.len());
        for job in stalled {
            worker::remove_upload(&job).await;
            let _ = self.events.send(JobEvent::Stalled { job_id: job.id });
            ids.push(job.id);
        }

        Ok(ids)
    }
}

/// Cheap to clone handle to the queue
#[derive(Clone)]
pub struct JobQueue {
    shared: Arc<QueueShared>,
}

impl JobQueue {
    pub fn new(
        store: Arc<dyn JobStore>,
        orchestrator: IngestionOrchestrator,
        config: QueueConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));

        Self {
            shared: Arc::new(QueueShared {
                store,
                orchestrator,
                events,
                notify: Notify::new(),
                config,
            }),
        }
    }

    pub fn config(&self) -> &QueueConfig {
        &self.shared.config
    }

    /// Record a `queued` job and wake an idle worker
    #[tracing::instrument(skip(self, data), fields(file = %data.original_file_name))]
    pub async fn submit(&self, data: JobData) -> Result<JobId, QueueError> {
        let job = Job::new(data, self.shared.config.max_attempts);
        self.shared.store.insert(&job).await?;

        let _ = self.shared.events.send(JobEvent::Queued {
            job_id: job.id,
            file_name: job.data.original_file_name.clone(),
        });
        self.shared.notify.notify_one();

        Ok(job.id)
    }

    /// Current status; `None` for an unknown or evicted id
    pub async fn status(&self, id: JobId) -> Result<Option<JobStatus>, QueueError> {
        Ok(self.shared.store.get(id).await?.map(|job| job.status()))
    }

    /// Fail `active` jobs older than the job timeout and remove their uploads
    ///
    /// Run once at startup, before workers claim anything: such jobs belonged
    /// to a process that died mid-run. Jobs orphaned more recently are picked
    /// up by the sweep the [`WorkerPool`] runs.
    pub async fn recover_stalled(&self) -> Result<Vec<JobId>, QueueError> {
        self.shared.fail_stalled(self.shared.config.job_timeout).await
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.shared.events.subscribe()
    }

    /// Spawn `concurrency` workers
    pub fn start(&self) -> WorkerPool {
        WorkerPool::spawn(self.shared.clone())
    }

    pub async fn ping(&self) -> Result<(), QueueError> {
        self.shared.store.ping().await
    }
}

//! Configuration management

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::ingest::{IngestionSettings, DEFAULT_BATCH_SIZE, DEFAULT_ERROR_LIMIT};
use crate::queue::{
    QueueConfig, RetentionPolicy, DEFAULT_BACKOFF_BASE, DEFAULT_CONCURRENCY,
    DEFAULT_EVENT_CAPACITY, DEFAULT_JOB_TIMEOUT, DEFAULT_MAX_ATTEMPTS, DEFAULT_POLL_INTERVAL,
};
use crate::queue::store::{DEFAULT_KEEP_COMPLETED, DEFAULT_KEEP_FAILED};

// ============================================================================
// Server Configuration Constants
// ============================================================================

/// Default server host binding.
pub const DEFAULT_SERVER_HOST: &str = "127.0.0.1";

/// Default server port.
pub const DEFAULT_SERVER_PORT: u16 = 8000;

/// Default shutdown timeout in seconds.
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 30;

/// Default database URL for local development.
pub const DEFAULT_DATABASE_URL: &str = "postgresql://localhost/airq";

/// Default maximum database connections in the pool.
pub const DEFAULT_DATABASE_MAX_CONNECTIONS: u32 = 10;

/// Default minimum database connections in the pool.
pub const DEFAULT_DATABASE_MIN_CONNECTIONS: u32 = 2;

/// Default database connection timeout in seconds.
pub const DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default database idle timeout in seconds (10 minutes).
pub const DEFAULT_DATABASE_IDLE_TIMEOUT_SECS: u64 = 600;

/// Default upload size limit (10 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Name of the upload directory under the system temp dir.
pub const DEFAULT_UPLOAD_DIR_NAME: &str = "airq-uploads";

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub upload: UploadConfig,
    pub job_store: JobStoreKind,
    pub ingest: IngestConfig,
}

/// Server-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub shutdown_timeout_secs: u64,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_secs: u64,
    pub idle_timeout_secs: u64,
}

/// Upload handling
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    pub dir: PathBuf,
    pub max_bytes: usize,
}

/// Backing store for job state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStoreKind {
    Postgres,
    /// Process-local; jobs do not survive a restart
    Memory,
}

impl FromStr for JobStoreKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(JobStoreKind::Postgres),
            "memory" => Ok(JobStoreKind::Memory),
            other => anyhow::bail!("Unknown job store: {} (expected postgres or memory)", other),
        }
    }
}

/// Ingestion pipeline and worker settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    pub batch_size: usize,
    pub error_limit: usize,
    pub worker_concurrency: usize,
    pub max_attempts: u32,
    pub backoff_base_ms: u64,
    pub job_timeout_secs: u64,
    pub poll_interval_ms: u64,
    pub keep_completed: usize,
    pub keep_failed: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            error_limit: DEFAULT_ERROR_LIMIT,
            worker_concurrency: DEFAULT_CONCURRENCY,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff_base_ms: DEFAULT_BACKOFF_BASE.as_millis() as u64,
            job_timeout_secs: DEFAULT_JOB_TIMEOUT.as_secs(),
            poll_interval_ms: DEFAULT_POLL_INTERVAL.as_millis() as u64,
            keep_completed: DEFAULT_KEEP_COMPLETED,
            keep_failed: DEFAULT_KEEP_FAILED,
        }
    }
}

impl IngestConfig {
    pub fn to_ingestion_settings(&self) -> IngestionSettings {
        IngestionSettings {
            batch_size: self.batch_size,
            error_limit: self.error_limit,
        }
    }

    pub fn to_queue_config(&self) -> QueueConfig {
        QueueConfig {
            concurrency: self.worker_concurrency,
            max_attempts: self.max_attempts,
            backoff_base: Duration::from_millis(self.backoff_base_ms),
            job_timeout: Duration::from_secs(self.job_timeout_secs),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            retention: RetentionPolicy {
                keep_completed: self.keep_completed,
                keep_failed: self.keep_failed,
            },
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

fn default_upload_dir() -> PathBuf {
    std::env::temp_dir().join(DEFAULT_UPLOAD_DIR_NAME)
}

impl Config {
    /// Load configuration from environment and defaults
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self::from_env()?;
        config.validate()?;

        Ok(config)
    }

    /// Read the environment without consulting `.env`
    pub fn from_env() -> anyhow::Result<Self> {
        let job_store = match std::env::var("AIRQ_JOB_STORE") {
            Ok(value) => value.parse()?,
            Err(_) => JobStoreKind::Postgres,
        };

        let defaults = IngestConfig::default();

        Ok(Config {
            server: ServerConfig {
                host: std::env::var("AIRQ_HOST").unwrap_or_else(|_| DEFAULT_SERVER_HOST.to_string()),
                port: env_or("AIRQ_PORT", DEFAULT_SERVER_PORT),
                shutdown_timeout_secs: env_or("AIRQ_SHUTDOWN_TIMEOUT", DEFAULT_SHUTDOWN_TIMEOUT_SECS),
            },
            database: DatabaseConfig {
                url: std::env::var("DATABASE_URL")
                    .unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string()),
                max_connections: env_or("DATABASE_MAX_CONNECTIONS", DEFAULT_DATABASE_MAX_CONNECTIONS),
                min_connections: env_or("DATABASE_MIN_CONNECTIONS", DEFAULT_DATABASE_MIN_CONNECTIONS),
                connect_timeout_secs: env_or(
                    "DATABASE_CONNECT_TIMEOUT",
                    DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS,
                ),
                idle_timeout_secs: env_or("DATABASE_IDLE_TIMEOUT", DEFAULT_DATABASE_IDLE_TIMEOUT_SECS),
            },
            upload: UploadConfig {
                dir: std::env::var("AIRQ_UPLOAD_DIR")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| default_upload_dir()),
                max_bytes: env_or("AIRQ_MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES),
            },
            job_store,
            ingest: IngestConfig {
                batch_size: env_or("INGEST_BATCH_SIZE", defaults.batch_size),
                error_limit: env_or("INGEST_ERROR_LIMIT", defaults.error_limit),
                worker_concurrency: env_or("INGEST_WORKER_CONCURRENCY", defaults.worker_concurrency),
                max_attempts: env_or("INGEST_MAX_ATTEMPTS", defaults.max_attempts),
                backoff_base_ms: env_or("INGEST_BACKOFF_BASE_MS", defaults.backoff_base_ms),
                job_timeout_secs: env_or("INGEST_JOB_TIMEOUT_SECS", defaults.job_timeout_secs),
                poll_interval_ms: env_or("INGEST_POLL_INTERVAL_MS", defaults.poll_interval_ms),
                keep_completed: env_or("INGEST_KEEP_COMPLETED", defaults.keep_completed),
                keep_failed: env_or("INGEST_KEEP_FAILED", defaults.keep_failed),
            },
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.server.port == 0 {
            anyhow::bail!("Server port must be greater than 0");
        }

        if self.database.url.is_empty() {
            anyhow::bail!("Database URL cannot be empty");
        }

        if self.database.max_connections == 0 {
            anyhow::bail!("Database max_connections must be greater than 0");
        }

        if self.database.min_connections > self.database.max_connections {
            anyhow::bail!(
                "Database min_connections ({}) cannot be greater than max_connections ({})",
                self.database.min_connections,
                self.database.max_connections
            );
        }

        if self.upload.max_bytes == 0 {
            anyhow::bail!("Upload size limit must be greater than 0");
        }

        if self.ingest.batch_size == 0 {
            anyhow::bail!("Ingestion batch_size must be greater than 0");
        }

        if self.ingest.worker_concurrency == 0 {
            anyhow::bail!("Ingestion worker_concurrency must be greater than 0");
        }

        if self.ingest.max_attempts == 0 {
            anyhow::bail!("Ingestion max_attempts must be greater than 0");
        }

        if self.ingest.job_timeout_secs == 0 {
            anyhow::bail!("Ingestion job_timeout_secs must be greater than 0");
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: DEFAULT_SERVER_HOST.to_string(),
                port: DEFAULT_SERVER_PORT,
                shutdown_timeout_secs: DEFAULT_SHUTDOWN_TIMEOUT_SECS,
            },
            database: DatabaseConfig {
                url: DEFAULT_DATABASE_URL.to_string(),
                max_connections: DEFAULT_DATABASE_MAX_CONNECTIONS,
                min_connections: DEFAULT_DATABASE_MIN_CONNECTIONS,
                connect_timeout_secs: DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS,
                idle_timeout_secs: DEFAULT_DATABASE_IDLE_TIMEOUT_SECS,
            },
            upload: UploadConfig {
                dir: default_upload_dir(),
                max_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            },
            job_store: JobStoreKind::Postgres,
            ingest: IngestConfig::default(),
        }
    }
}

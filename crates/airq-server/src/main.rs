//! AirQ Server - Main entry point

use std::{net::SocketAddr, sync::Arc, time::Duration};

use airq_common::logging::{init_logging, LogConfig};
use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use tokio::signal;
use tracing::{info, warn};

use airq_server::{
    api::{self, AppState},
    config::{Config, JobStoreKind},
    ingest::IngestionOrchestrator,
    measurements::PgMeasurementRepository,
    queue::{spawn_event_logger, JobQueue, JobStore, MemoryJobStore, PgJobStore},
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging; LOG_* variables take precedence over these defaults
    let log_config = LogConfig::builder()
        .log_file_prefix("airq-server")
        .filter_directives("airq_server=debug,tower_http=debug,sqlx=warn")
        .build()
        .merge_env()?;

    let _log_guard = init_logging(&log_config)?;

    info!("Starting AirQ Server");

    let config = Config::load()?;
    info!(
        "Configuration loaded - server will bind to {}:{}",
        config.server.host, config.server.port
    );

    let db_pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .acquire_timeout(Duration::from_secs(config.database.connect_timeout_secs))
        .idle_timeout(Duration::from_secs(config.database.idle_timeout_secs))
        .connect(&config.database.url)
        .await
        .context("Failed to connect to database")?;

    info!("Database connection pool established");

    sqlx::migrate!("../../migrations")
        .run(&db_pool)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to run migrations: {}", e))?;

    info!("Database migrations completed");

    tokio::fs::create_dir_all(&config.upload.dir)
        .await
        .with_context(|| format!("Failed to create upload dir {}", config.upload.dir.display()))?;

    let measurements = Arc::new(PgMeasurementRepository::new(db_pool.clone()));

    let job_store: Arc<dyn JobStore> = match config.job_store {
        JobStoreKind::Postgres => Arc::new(PgJobStore::new(db_pool.clone())),
        JobStoreKind::Memory => {
            warn!("Using in-memory job store; queued jobs are lost on restart");
            Arc::new(MemoryJobStore::new())
        },
    };

    let orchestrator = IngestionOrchestrator::with_settings(
        measurements.clone(),
        config.ingest.to_ingestion_settings(),
    );
    let queue = JobQueue::new(job_store, orchestrator, config.ingest.to_queue_config());

    let stalled = queue.recover_stalled().await?;
    if !stalled.is_empty() {
        warn!(count = stalled.len(), "Failed jobs left active by a previous run");
    }

    let event_logger = spawn_event_logger(queue.subscribe());
    let workers = queue.start();

    let state = AppState {
        queue: queue.clone(),
        measurements,
        upload_dir: config.upload.dir.clone(),
    };
    let app = api::create_router(state, config.upload.max_bytes);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal(config.server.shutdown_timeout_secs))
        .await?;

    // Let running jobs finish within the shutdown window
    let shutdown_timeout = Duration::from_secs(config.server.shutdown_timeout_secs);
    if tokio::time::timeout(shutdown_timeout, workers.shutdown()).await.is_err() {
        warn!("Workers did not stop within {}s", config.server.shutdown_timeout_secs);
    }

    drop(queue);
    event_logger.abort();
    db_pool.close().await;

    info!("Server shut down gracefully");

    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal(timeout_secs: u64) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        },
        _ = terminate => {
            info!("Received terminate signal, starting graceful shutdown");
        },
    }

    info!("Waiting up to {} seconds for connections to close", timeout_secs);
}

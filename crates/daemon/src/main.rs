//! Backstop - Main Entry Point
//! Reads job requests from stdin, drains them on a timer, reports unfinished work on exit

mod config;
mod handlers;
mod intake;

use anyhow::Result;
use config::{DaemonConfig, LogFormat};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::BufReader;
use tokio::runtime::Runtime;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use backstop_core::application::{shutdown_channel, JobQueue, QueueDrainer};
use backstop_core::domain::{DeadLetterEntry, Job};
use backstop_core::port::{SystemTimeProvider, TokioSleeper, UuidProvider};
use backstop_infra_memory::TtlCache;

const VERSION: &str = env!("CARGO_PKG_VERSION");
const CACHE_CLEANUP_INTERVAL: Duration = Duration::from_secs(60);
// The stdin reader sits on a blocking thread until the next line arrives
const RUNTIME_SHUTDOWN_TIMEOUT: Duration = Duration::from_millis(500);

/// Printed to stdout on exit
#[derive(Debug, Serialize)]
struct ExitReport {
    pending: Vec<Job>,
    dead_letters: Vec<DeadLetterEntry>,
}

fn main() -> Result<()> {
    let runtime = build_runtime()?;
    let result = runtime.block_on(run());
    shutdown_runtime(runtime);
    result
}

fn build_runtime() -> Result<Runtime> {
    Ok(tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?)
}

fn shutdown_runtime(runtime: Runtime) {
    runtime.shutdown_timeout(RUNTIME_SHUTDOWN_TIMEOUT);
}

async fn run() -> Result<()> {
    // 1. Load configuration
    let config = DaemonConfig::from_env()?;

    // 2. Initialize logging
    init_logging(config.log_format);
    info!("Backstop v{} starting...", VERSION);
    info!(
        drain_interval_ms = config.drain_interval.as_millis() as u64,
        max_retries = config.queue.default_max_retries,
        retry_delay_ms = config.queue.default_retry_delay_ms,
        job_timeout_ms = config.queue.execution_timeout.map(|t| t.as_millis() as u64),
        "Configuration loaded"
    );

    // 3. Setup dependencies (DI wiring)
    let time_provider = Arc::new(SystemTimeProvider);
    let queue = Arc::new(JobQueue::new(
        config.queue.clone(),
        Arc::new(TokioSleeper),
        time_provider.clone(),
        Arc::new(UuidProvider),
    ));
    let cache = Arc::new(TtlCache::new(time_provider));
    let registry = handlers::default_registry(Arc::clone(&cache));
    info!(job_types = ?registry.job_types(), "Handlers registered");

    let (shutdown_tx, shutdown_rx) = shutdown_channel();

    // 4. Start drainer and cache cleanup
    let drainer = QueueDrainer::new(Arc::clone(&queue), config.drain_interval);
    let drainer_token = shutdown_rx.clone();
    let mut drainer_handle = tokio::spawn(async move { drainer.run(drainer_token).await });
    let cleanup = cache.spawn_cleanup(CACHE_CLEANUP_INTERVAL, shutdown_tx.token());

    // 5. Start intake
    let intake_queue = Arc::clone(&queue);
    let intake_token = shutdown_rx.clone();
    let mut intake_handle = tokio::spawn(async move {
        let stdin = BufReader::new(tokio::io::stdin());
        intake::run_intake(stdin, &intake_queue, &registry, intake_token).await
    });

    info!("System ready. Reading jobs from stdin, Ctrl+C to shutdown");

    // 6. Run until Ctrl+C, or until stdin closes and the queue is idle
    tokio::select! {
        res = &mut intake_handle => {
            match res {
                Ok(Ok(report)) => info!(accepted = report.accepted, rejected = report.rejected, "Input closed"),
                Ok(Err(e)) => warn!(error = ?e, "Intake failed"),
                Err(e) => warn!(error = ?e, "Intake task aborted"),
            }
            tokio::select! {
                _ = wait_until_idle(&queue, config.drain_interval) => info!("Queue idle"),
                res = tokio::signal::ctrl_c() => res?,
            }
        }
        res = tokio::signal::ctrl_c() => res?,
    }

    info!("Shutting down gracefully...");

    // 7. Graceful shutdown
    shutdown_tx.shutdown();
    if tokio::time::timeout(config.shutdown_grace, &mut drainer_handle)
        .await
        .is_err()
    {
        warn!(
            grace_ms = config.shutdown_grace.as_millis() as u64,
            "Drainer did not stop within grace period, aborting"
        );
        drainer_handle.abort();
        // Dropping the drain puts the running job back at the queue head
        let _ = drainer_handle.await;
    }
    intake_handle.abort();
    cleanup.stop().await;

    // 8. Report
    let stats = queue.stats();
    info!(
        total_jobs = stats.total_jobs,
        completed = stats.completed,
        dead_lettered = stats.dead_lettered,
        retried = stats.retried,
        pending = queue.len(),
        "Final queue stats"
    );
    let report = ExitReport {
        pending: queue.snapshot(),
        dead_letters: queue.get_dlq(),
    };
    println!("{}", serde_json::to_string_pretty(&report)?);

    info!("Shutdown complete.");
    Ok(())
}

fn init_logging(format: LogFormat) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("backstop=info"));

    // Logs go to stderr; stdout carries the exit report
    match format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init(),
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().pretty().with_writer(std::io::stderr))
            .init(),
    }
}

async fn wait_until_idle(queue: &JobQueue, poll: Duration) {
    while !queue.is_empty() || queue.is_processing() {
        tokio::time::sleep(poll).await;
    }
}

// Queue Drainer - host-side timer that triggers JobQueue::process

use crate::application::constants::{DEFAULT_DRAIN_INTERVAL, ERROR_RECOVERY_SLEEP_DURATION};
use crate::application::job_queue::JobQueue;
use crate::application::shutdown::ShutdownToken;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info};

/// Periodically drains a queue until shutdown.
///
/// The queue never schedules itself; this is the host loop that does.
pub struct QueueDrainer {
    queue: Arc<JobQueue>,
    interval: Duration,
}

impl QueueDrainer {
    pub fn new(queue: Arc<JobQueue>, interval: Duration) -> Self {
        Self { queue, interval }
    }

    pub fn with_default_interval(queue: Arc<JobQueue>) -> Self {
        Self::new(queue, DEFAULT_DRAIN_INTERVAL)
    }

    /// Run drain loop with graceful shutdown support
    pub async fn run(&self, mut shutdown: ShutdownToken) {
        info!(interval_ms = self.interval.as_millis() as u64, "Drainer started");
        loop {
            if shutdown.is_shutdown() {
                break;
            }

            let pause = match self.queue.process_until(&shutdown).await {
                Ok(_) => self.interval,
                Err(e) => {
                    error!(error = %e, "Drain failed");
                    ERROR_RECOVERY_SLEEP_DURATION
                }
            };

            tokio::select! {
                _ = sleep(pause) => {},
                _ = shutdown.wait() => {
                    info!("Drainer interrupted while idle");
                    break;
                }
            }
        }
        info!(remaining = self.queue.len(), "Drainer stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::job_queue::EnqueueRequest;
    use crate::application::shutdown::shutdown_channel;
    use crate::domain::QueueConfig;
    use crate::port::id_provider::mocks::SequentialIdProvider;
    use crate::port::job_handler::mocks::ScriptedHandler;
    use crate::port::time_provider::mocks::ManualTimeProvider;
    use crate::port::TokioSleeper;
    use serde_json::json;

    #[tokio::test(start_paused = true)]
    async fn test_drainer_picks_up_jobs_on_each_tick() {
        let queue = Arc::new(JobQueue::new(
            QueueConfig::default(),
            Arc::new(TokioSleeper),
            Arc::new(ManualTimeProvider::new(0)),
            Arc::new(SequentialIdProvider::new("tick")),
        ));
        let handler = Arc::new(ScriptedHandler::new_success());
        let (tx, token) = shutdown_channel();

        let drainer = QueueDrainer::new(Arc::clone(&queue), Duration::from_millis(500));
        let handle = tokio::spawn(async move { drainer.run(token).await });

        queue
            .enqueue(EnqueueRequest::new("a", json!({})), handler.clone())
            .expect("enqueue");
        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(handler.call_count(), 1);

        queue
            .enqueue(EnqueueRequest::new("b", json!({})), handler.clone())
            .expect("enqueue");
        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(handler.call_count(), 2);

        tx.shutdown();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("drainer should stop")
            .expect("drainer should not panic");
    }
}

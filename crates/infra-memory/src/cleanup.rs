// Periodic cache cleanup task
// The task is owned by whoever spawned it; nothing keeps it alive implicitly

use backstop_core::application::ShutdownToken;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

/// Handle to a running purge loop
pub struct CleanupHandle {
    handle: JoinHandle<()>,
}

impl CleanupHandle {
    /// Abort the loop and wait for it to unwind
    pub async fn stop(self) {
        self.handle.abort();
        // Cancelled is the expected outcome here
        let _ = self.handle.await;
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

/// Spawn a loop that calls `purge` every `period` until `shutdown` fires.
pub(crate) fn spawn<F>(period: Duration, mut shutdown: ShutdownToken, purge: F) -> CleanupHandle
where
    F: Fn() -> usize + Send + 'static,
{
    let handle = tokio::spawn(async move {
        info!(interval_ms = period.as_millis() as u64, "Cache cleanup started");

        let mut tick = interval(period);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // First tick completes immediately
        tick.tick().await;

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    let removed = purge();
                    if removed > 0 {
                        debug!(removed, "Purged expired cache entries");
                    }
                }
                _ = shutdown.wait() => break,
            }
        }

        info!("Cache cleanup stopped");
    });

    CleanupHandle { handle }
}

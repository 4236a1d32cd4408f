// Sleeper Port - every backoff wait goes through here

use async_trait::async_trait;
use std::time::Duration;

/// Suspends the current task for a backoff delay
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Tokio timer sleeper (production)
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use parking_lot::Mutex;

    /// Returns immediately and remembers every requested delay
    #[derive(Default)]
    pub struct RecordingSleeper {
        delays: Mutex<Vec<Duration>>,
    }

    impl RecordingSleeper {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn delays(&self) -> Vec<Duration> {
            self.delays.lock().clone()
        }

        pub fn total(&self) -> Duration {
            self.delays.lock().iter().sum()
        }
    }

    #[async_trait]
    impl Sleeper for RecordingSleeper {
        async fn sleep(&self, duration: Duration) {
            self.delays.lock().push(duration);
            tokio::task::yield_now().await;
        }
    }

    /// Records the delay and never wakes up (stands in for a very long backoff)
    #[derive(Default)]
    pub struct StalledSleeper {
        delays: Mutex<Vec<Duration>>,
    }

    impl StalledSleeper {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn delays(&self) -> Vec<Duration> {
            self.delays.lock().clone()
        }
    }

    #[async_trait]
    impl Sleeper for StalledSleeper {
        async fn sleep(&self, duration: Duration) {
            self.delays.lock().push(duration);
            std::future::pending::<()>().await;
        }
    }
}

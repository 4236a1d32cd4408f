// Queue configuration

use crate::application::constants::{DEFAULT_BASE_DELAY_MS, DEFAULT_MAX_RETRIES};
use std::time::Duration;

/// Per-queue defaults applied to jobs that do not override them
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueConfig {
    /// Maximum total attempts for a job (first attempt included)
    pub default_max_retries: u32,
    /// Base backoff delay for a job
    pub default_retry_delay_ms: u64,
    /// Optional bound on a single `execute` call. `None` keeps the
    /// "hung handler blocks the queue" behaviour.
    pub execution_timeout: Option<Duration>,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            default_max_retries: DEFAULT_MAX_RETRIES,
            default_retry_delay_ms: DEFAULT_BASE_DELAY_MS,
            execution_timeout: None,
        }
    }
}

impl QueueConfig {
    pub fn with_execution_timeout(mut self, timeout: Duration) -> Self {
        self.execution_timeout = Some(timeout);
        self
    }
}

// Retry executor: bounded attempts with exponential backoff
use crate::application::circuit::CircuitTracker;
use crate::application::constants::{DEFAULT_BASE_DELAY_MS, DEFAULT_MAX_RETRIES};
use crate::domain::{backoff_delay, OperationError};
use crate::port::Sleeper;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, warn};

/// Per-call retry options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryOptions {
    /// Maximum total attempts (first attempt included)
    pub max_retries: u32,
    /// Delay after the first failure; doubles after each further failure
    pub base_delay_ms: u64,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay_ms: DEFAULT_BASE_DELAY_MS,
        }
    }
}

impl RetryOptions {
    pub fn new(max_retries: u32, base_delay_ms: u64) -> Self {
        Self {
            max_retries,
            base_delay_ms,
        }
    }
}

/// Errors returned by [`RetryExecutor::run`]
#[derive(Error, Debug)]
pub enum RetryError {
    #[error("{context} failed after {attempts} attempts, all retries exhausted: {last_error}")]
    Exhausted {
        context: String,
        attempts: u32,
        last_error: OperationError,
    },

    #[error("Invalid retry options: {0}")]
    InvalidOptions(String),
}

impl RetryError {
    /// Underlying failure of the final attempt
    pub fn last_error(&self) -> Option<&OperationError> {
        match self {
            RetryError::Exhausted { last_error, .. } => Some(last_error),
            RetryError::InvalidOptions(_) => None,
        }
    }
}

/// Runs a single operation with bounded attempts.
///
/// Every failed attempt is recorded against `context` in the shared
/// [`CircuitTracker`], and a success clears it. The tracker is never consulted
/// to stop retrying; gating on it is the caller's call.
pub struct RetryExecutor {
    circuit: Arc<CircuitTracker>,
    sleeper: Arc<dyn Sleeper>,
}

impl RetryExecutor {
    pub fn new(circuit: Arc<CircuitTracker>, sleeper: Arc<dyn Sleeper>) -> Self {
        Self { circuit, sleeper }
    }

    pub fn circuit(&self) -> &Arc<CircuitTracker> {
        &self.circuit
    }

    /// Run with default options (3 attempts, 1s base delay)
    pub async fn run<T, F, Fut>(&self, operation: F, context: &str) -> Result<T, RetryError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, OperationError>>,
    {
        self.run_with(operation, context, RetryOptions::default())
            .await
    }

    /// Run with explicit options
    ///
    /// Invokes `operation` at most `options.max_retries` times. After failed
    /// attempt `n` (1-indexed) it waits `base_delay_ms * 2^(n-1)`.
    ///
    /// # Example
    /// ```text
    /// let tasks = executor
    ///     .run_with(|| client.fetch_tasks(), "todoist.fetch", RetryOptions::new(5, 200))
    ///     .await?;
    /// ```
    pub async fn run_with<T, F, Fut>(
        &self,
        mut operation: F,
        context: &str,
        options: RetryOptions,
    ) -> Result<T, RetryError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, OperationError>>,
    {
        if options.max_retries == 0 {
            return Err(RetryError::InvalidOptions(
                "max_retries must be at least 1".to_string(),
            ));
        }

        let mut attempt: u32 = 1;
        loop {
            match operation().await {
                Ok(value) => {
                    self.circuit.reset(context);
                    debug!(context = %context, attempt = attempt, "Operation succeeded");
                    return Ok(value);
                }
                Err(err) => {
                    self.circuit.record_failure(context);

                    if attempt >= options.max_retries {
                        error!(
                            context = %context,
                            attempts = attempt,
                            error = %err,
                            "Operation failed, retries exhausted"
                        );
                        return Err(RetryError::Exhausted {
                            context: context.to_string(),
                            attempts: attempt,
                            last_error: err,
                        });
                    }

                    let delay = backoff_delay(options.base_delay_ms, attempt);
                    warn!(
                        context = %context,
                        attempt = attempt,
                        max_retries = options.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Operation failed, retrying after backoff"
                    );
                    self.sleeper.sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::sleeper::mocks::RecordingSleeper;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn executor() -> (RetryExecutor, Arc<CircuitTracker>, Arc<RecordingSleeper>) {
        let circuit = Arc::new(CircuitTracker::new());
        let sleeper = Arc::new(RecordingSleeper::new());
        let executor = RetryExecutor::new(circuit.clone(), sleeper.clone());
        (executor, circuit, sleeper)
    }

    #[tokio::test]
    async fn test_success_on_first_attempt() {
        let (executor, circuit, sleeper) = executor();
        let result = executor
            .run(|| async { Ok::<_, OperationError>(42) }, "answer")
            .await;

        assert_eq!(tokio_test::assert_ok!(result), 42);
        assert!(sleeper.delays().is_empty());
        assert_eq!(circuit.failure_count("answer"), 0);
    }

    #[tokio::test]
    async fn test_always_failing_is_invoked_max_retries_times() {
        let (executor, circuit, sleeper) = executor();
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = executor
            .run_with(
                || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err(OperationError::new("connection reset")) }
                },
                "slack.post",
                RetryOptions::new(4, 100),
            )
            .await;

        let err = tokio_test::assert_err!(result);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert!(err.to_string().contains("slack.post"));
        assert!(err.to_string().contains("4 attempts"));
        assert!(err.to_string().contains("exhausted"));
        assert!(err.to_string().contains("connection reset"));
        assert_eq!(
            err.last_error().map(|e| e.message.as_str()),
            Some("connection reset")
        );

        // No sleep after the final attempt
        assert_eq!(
            sleeper.delays(),
            vec![
                Duration::from_millis(100),
                Duration::from_millis(200),
                Duration::from_millis(400)
            ]
        );
        assert_eq!(circuit.failure_count("slack.post"), 4);
    }

    #[tokio::test]
    async fn test_success_after_failures_clears_circuit() {
        let (executor, circuit, sleeper) = executor();
        let calls = AtomicU32::new(0);

        let result = executor
            .run(
                || {
                    let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                    async move {
                        if n < 3 {
                            Err(OperationError::new("flaky"))
                        } else {
                            Ok("done")
                        }
                    }
                },
                "flaky.op",
            )
            .await;

        assert_eq!(tokio_test::assert_ok!(result), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(circuit.failure_count("flaky.op"), 0);
        assert_eq!(sleeper.delays().len(), 2);
    }

    #[tokio::test]
    async fn test_zero_max_retries_is_rejected() {
        let (executor, _, _) = executor();
        let result = executor
            .run_with(
                || async { Ok::<_, OperationError>(()) },
                "noop",
                RetryOptions::new(0, 10),
            )
            .await;
        assert!(matches!(result, Err(RetryError::InvalidOptions(_))));
    }

    #[tokio::test]
    async fn test_open_circuit_does_not_stop_retries() {
        let (executor, circuit, _) = executor();
        for _ in 0..10 {
            circuit.record_failure("hot");
        }
        assert!(circuit.should_break("hot"));

        let calls = AtomicU32::new(0);
        let result: Result<(), _> = executor
            .run_with(
                || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err(OperationError::new("still down")) }
                },
                "hot",
                RetryOptions::new(2, 1),
            )
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(circuit.failure_count("hot"), 12);
    }
}

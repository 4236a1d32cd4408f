// Job Handler Port
// The capability a Job executes: payload in, result or typed failure out.

use crate::domain::{JobPayload, OperationError};
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;

/// Job handler trait
///
/// The queue never inspects the payload; it hands it to the handler as-is
/// and only looks at the `Result`.
#[async_trait]
pub trait JobHandler: Send + Sync {
    /// Execute one attempt of a job
    ///
    /// # Errors
    /// Any `OperationError`; the queue classifies it to decide whether to retry.
    async fn execute(&self, payload: &JobPayload) -> Result<serde_json::Value, OperationError>;
}

/// Adapter turning an async closure into a `JobHandler`
pub struct FnHandler<F> {
    f: F,
}

#[async_trait]
impl<F, Fut> JobHandler for FnHandler<F>
where
    F: Fn(JobPayload) -> Fut + Send + Sync,
    Fut: Future<Output = Result<serde_json::Value, OperationError>> + Send,
{
    async fn execute(&self, payload: &JobPayload) -> Result<serde_json::Value, OperationError> {
        (self.f)(payload.clone()).await
    }
}

/// Wrap an async closure as a shareable handler
///
/// # Example
/// ```text
/// let handler = handler_fn(|payload| async move { Ok(payload.as_value().clone()) });
/// queue.enqueue(EnqueueRequest::new("echo", json!({})), handler)?;
/// ```
pub fn handler_fn<F, Fut>(f: F) -> Arc<dyn JobHandler>
where
    F: Fn(JobPayload) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<serde_json::Value, OperationError>> + Send + 'static,
{
    Arc::new(FnHandler { f })
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use parking_lot::Mutex;

    /// Mock handler behavior
    #[derive(Debug, Clone)]
    pub enum MockBehavior {
        /// Always succeed, echoing the payload
        Success,
        /// Fail the first N calls with the error, then succeed
        FailTimes(usize, OperationError),
        /// Always fail with the error
        AlwaysFail(OperationError),
        /// Panic with message (for panic isolation testing)
        Panic(String),
    }

    /// Scripted handler that counts calls and records payloads
    pub struct ScriptedHandler {
        behavior: MockBehavior,
        calls: Mutex<Vec<JobPayload>>,
    }

    impl ScriptedHandler {
        pub fn new(behavior: MockBehavior) -> Self {
            Self {
                behavior,
                calls: Mutex::new(Vec::new()),
            }
        }

        pub fn new_success() -> Self {
            Self::new(MockBehavior::Success)
        }

        pub fn new_fail(error: OperationError) -> Self {
            Self::new(MockBehavior::AlwaysFail(error))
        }

        pub fn new_fail_times(times: usize, error: OperationError) -> Self {
            Self::new(MockBehavior::FailTimes(times, error))
        }

        pub fn new_panic_inducing(message: impl Into<String>) -> Self {
            Self::new(MockBehavior::Panic(message.into()))
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().len()
        }

        pub fn payloads(&self) -> Vec<JobPayload> {
            self.calls.lock().clone()
        }
    }

    #[async_trait]
    impl JobHandler for ScriptedHandler {
        async fn execute(&self, payload: &JobPayload) -> Result<serde_json::Value, OperationError> {
            let call_number = {
                let mut calls = self.calls.lock();
                calls.push(payload.clone());
                calls.len()
            };

            match &self.behavior {
                MockBehavior::Success => Ok(payload.as_value().clone()),
                MockBehavior::FailTimes(times, error) if call_number <= *times => {
                    Err(error.clone())
                }
                MockBehavior::FailTimes(..) => Ok(payload.as_value().clone()),
                MockBehavior::AlwaysFail(error) => Err(error.clone()),
                MockBehavior::Panic(msg) => {
                    panic!("{}", msg); // Actually panic for panic isolation testing
                }
            }
        }
    }
}

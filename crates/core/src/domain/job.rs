// Job Domain Model

use crate::domain::backoff::backoff_delay;
use crate::domain::error::{DomainError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Job ID (caller-assigned or UUID v4)
pub type JobId = String;

/// Job Status
///
/// `queued -> processing -> {completed | queued (retry) | failed (dead-lettered)}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Queued => write!(f, "queued"),
            JobStatus::Processing => write!(f, "processing"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Free-form job tag used for diagnostics and handler lookup
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobType(String);

impl JobType {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for JobType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque job payload handed to the handler as-is
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobPayload(serde_json::Value);

impl JobPayload {
    pub fn new(value: serde_json::Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &serde_json::Value {
        &self.0
    }

    /// Decode the payload into a handler-specific type
    pub fn decode<T: DeserializeOwned>(&self) -> std::result::Result<T, serde_json::Error> {
        T::deserialize(&self.0)
    }
}

/// A unit of deferred, retryable work.
///
/// `retries` counts attempts already made and never exceeds `max_retries`,
/// which is the maximum number of *total* attempts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    #[serde(rename = "type")]
    pub job_type: JobType,
    pub data: JobPayload,

    pub retries: u32,
    pub max_retries: u32,
    pub retry_delay_ms: u64,

    pub added_at: i64, // epoch ms
    pub status: JobStatus,
}

impl Job {
    /// Create a new queued Job
    ///
    /// # Arguments
    ///
    /// * `id` - Unique job ID (injected, not generated)
    /// * `added_at` - Enqueue timestamp in epoch ms (injected, not system time)
    /// * `job_type` - Job type
    /// * `data` - Payload passed to the handler
    /// * `max_retries` - Maximum total attempts
    /// * `retry_delay_ms` - Base backoff delay
    pub fn new(
        id: impl Into<String>,
        added_at: i64,
        job_type: JobType,
        data: JobPayload,
        max_retries: u32,
        retry_delay_ms: u64,
    ) -> Self {
        Self {
            id: id.into(),
            job_type,
            data,
            retries: 0,
            max_retries,
            retry_delay_ms,
            added_at,
            status: JobStatus::Queued,
        }
    }

    /// Transition to Processing
    pub fn start(&mut self) -> Result<()> {
        self.transition(JobStatus::Queued, JobStatus::Processing)
    }

    /// Transition to Completed
    pub fn complete(&mut self) -> Result<()> {
        self.transition(JobStatus::Processing, JobStatus::Completed)
    }

    /// Put a failed attempt back to Queued while it waits for its backoff
    pub fn requeue(&mut self) -> Result<()> {
        self.transition(JobStatus::Processing, JobStatus::Queued)
    }

    /// Mark as Failed (terminal, the job is headed to the dead-letter sink)
    pub fn fail(&mut self) {
        self.status = JobStatus::Failed;
    }

    /// Count one more attempt against the budget
    pub fn record_failed_attempt(&mut self) {
        self.retries = (self.retries + 1).min(self.max_retries);
    }

    pub fn is_exhausted(&self) -> bool {
        self.retries >= self.max_retries
    }

    /// Delay before the next attempt, based on attempts made so far
    pub fn next_backoff(&self) -> Duration {
        backoff_delay(self.retry_delay_ms, self.retries)
    }

    fn transition(&mut self, from: JobStatus, to: JobStatus) -> Result<()> {
        if self.status != from {
            return Err(DomainError::InvalidStateTransition {
                from: self.status.to_string(),
                to: to.to_string(),
            });
        }
        self.status = to;
        Ok(())
    }
}

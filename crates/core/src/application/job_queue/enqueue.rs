// Enqueue request and validation

use crate::application::constants::MAX_JOB_TYPE_LEN;
use crate::domain::{Job, JobPayload, JobType, QueueConfig};
use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};

/// Job submission
///
/// `max_retries` / `retry_delay_ms` fall back to the queue's `QueueConfig`.
/// `id` is generated when absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnqueueRequest {
    #[serde(rename = "type")]
    pub job_type: String,

    #[serde(default)]
    pub data: serde_json::Value,

    #[serde(default)]
    pub max_retries: Option<u32>,

    #[serde(default)]
    pub retry_delay_ms: Option<u64>,

    #[serde(default)]
    pub id: Option<String>,
}

impl EnqueueRequest {
    pub fn new(job_type: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            job_type: job_type.into(),
            data,
            max_retries: None,
            retry_delay_ms: None,
            id: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    pub fn with_retry_delay_ms(mut self, retry_delay_ms: u64) -> Self {
        self.retry_delay_ms = Some(retry_delay_ms);
        self
    }
}

/// Reject requests the queue cannot hold
pub fn validate_request(req: &EnqueueRequest) -> Result<()> {
    let job_type = req.job_type.trim();
    if job_type.is_empty() {
        return Err(AppError::Validation("job type must not be empty".to_string()));
    }
    if job_type.len() > MAX_JOB_TYPE_LEN {
        return Err(AppError::Validation(format!(
            "job type too long ({} > {} chars)",
            job_type.len(),
            MAX_JOB_TYPE_LEN
        )));
    }
    if req.max_retries == Some(0) {
        return Err(AppError::Validation(
            "max_retries must be at least 1 (it counts total attempts)".to_string(),
        ));
    }
    if let Some(id) = &req.id {
        if id.trim().is_empty() {
            return Err(AppError::Validation("job id must not be empty".to_string()));
        }
    }
    Ok(())
}

/// Build the queued Job (ID and timestamp injected for determinism)
pub(crate) fn build_job(
    req: EnqueueRequest,
    generated_id: impl FnOnce() -> String,
    added_at: i64,
    config: &QueueConfig,
) -> Job {
    let id = req.id.unwrap_or_else(generated_id);
    Job::new(
        id,
        added_at,
        JobType::new(req.job_type.trim()),
        JobPayload::new(req.data),
        req.max_retries.unwrap_or(config.default_max_retries).max(1),
        req.retry_delay_ms.unwrap_or(config.default_retry_delay_ms),
    )
}

// Dead-letter record

use crate::domain::failure::{ErrorCategory, OperationError};
use crate::domain::job::{Job, JobId, JobPayload, JobType};
use serde::{Deserialize, Serialize};

/// Terminal record for a job whose retries are exhausted (or that was not
/// retry-eligible). Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeadLetterEntry {
    pub id: JobId,
    #[serde(rename = "type")]
    pub job_type: JobType,
    pub data: JobPayload,
    pub retries: u32,
    /// Original failure message
    pub error: String,
    pub error_category: ErrorCategory,
    pub failed_at: i64, // epoch ms
}

impl DeadLetterEntry {
    pub fn from_job(
        job: &Job,
        error: &OperationError,
        error_category: ErrorCategory,
        failed_at: i64,
    ) -> Self {
        Self {
            id: job.id.clone(),
            job_type: job.job_type.clone(),
            data: job.data.clone(),
            retries: job.retries,
            error: error.message.clone(),
            error_category,
            failed_at,
        }
    }
}

// Domain Layer - Pure data and rules, no I/O

pub mod backoff;
pub mod dead_letter;
pub mod error;
pub mod failure;
pub mod job;
pub mod queue;

// Re-exports
pub use backoff::backoff_delay;
pub use dead_letter::DeadLetterEntry;
pub use error::DomainError;
pub use failure::{ErrorCategory, ErrorType, OperationError};
pub use job::{Job, JobId, JobPayload, JobStatus, JobType};
pub use queue::QueueConfig;

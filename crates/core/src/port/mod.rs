// Port Layer - Interfaces for external dependencies

pub mod id_provider; // For deterministic testing
pub mod job_handler;
pub mod sleeper;
pub mod time_provider;

// Re-exports
pub use id_provider::{IdProvider, UuidProvider};
pub use job_handler::{handler_fn, JobHandler};
pub use sleeper::{Sleeper, TokioSleeper};
pub use time_provider::{SystemTimeProvider, TimeProvider};

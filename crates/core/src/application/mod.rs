// Application Layer - Services built on the domain and ports

pub mod circuit;
pub mod classifier;
pub mod constants;
pub mod dead_letter;
pub mod drainer;
pub mod job_queue;
pub mod registry;
pub mod retry;
pub mod shutdown;

// Re-exports
pub use circuit::CircuitTracker;
pub use classifier::{DiagnosticRecord, ErrorClassifier};
pub use dead_letter::DeadLetterSink;
pub use drainer::QueueDrainer;
pub use job_queue::{DrainReport, EnqueueRequest, JobQueue, QueueStats};
pub use registry::HandlerRegistry;
pub use retry::{RetryError, RetryExecutor, RetryOptions};
pub use shutdown::{shutdown_channel, ShutdownSender, ShutdownToken};

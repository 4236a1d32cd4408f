// Backstop In-Memory Infrastructure
// Collaborators the core talks to but does not own (memoizing cache)

pub mod cache;
pub mod cleanup;

pub use cache::{CacheStats, TtlCache, DEFAULT_TTL};
pub use cleanup::CleanupHandle;

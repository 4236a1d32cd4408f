// Resilience constants (no magic values)
use std::time::Duration;

/// Default maximum total attempts for a job or retried operation
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default base backoff delay (1000ms = 1s)
pub const DEFAULT_BASE_DELAY_MS: u64 = 1000;

/// Consecutive failures after which a context's circuit is reported open
pub const CIRCUIT_FAILURE_THRESHOLD: u32 = 5;

/// How often the host-side drainer triggers `process()` (1s)
pub const DEFAULT_DRAIN_INTERVAL: Duration = Duration::from_secs(1);

/// Sleep duration after a drain error before the next trigger (1s)
pub const ERROR_RECOVERY_SLEEP_DURATION: Duration = Duration::from_secs(1);

/// Upper bound on job type length
pub const MAX_JOB_TYPE_LEN: usize = 128;

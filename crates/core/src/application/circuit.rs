// Advisory circuit tracker
use crate::application::constants::CIRCUIT_FAILURE_THRESHOLD;
use parking_lot::Mutex;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Consecutive-failure counter per logical context.
///
/// Purely advisory: nothing here blocks a call. Callers check
/// [`should_break`](Self::should_break) and short-circuit themselves.
/// Counts only go down through [`reset`](Self::reset); there is no decay.
pub struct CircuitTracker {
    failures: Mutex<HashMap<String, u32>>,
    threshold: u32,
}

impl Default for CircuitTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl CircuitTracker {
    pub fn new() -> Self {
        Self::with_threshold(CIRCUIT_FAILURE_THRESHOLD)
    }

    pub fn with_threshold(threshold: u32) -> Self {
        Self {
            failures: Mutex::new(HashMap::new()),
            threshold,
        }
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    /// Record one more failure; returns the new count
    pub fn record_failure(&self, context: &str) -> u32 {
        let count = {
            let mut failures = self.failures.lock();
            let count = failures.entry(context.to_string()).or_insert(0);
            *count = count.saturating_add(1);
            *count
        };

        if count == self.threshold {
            warn!(context = %context, failures = count, "Circuit opened");
        } else {
            debug!(context = %context, failures = count, "Failure recorded");
        }
        count
    }

    /// True once the context has reached the failure threshold
    pub fn should_break(&self, context: &str) -> bool {
        self.failure_count(context) >= self.threshold
    }

    /// Forget the context, restoring the closed state
    pub fn reset(&self, context: &str) {
        if self.failures.lock().remove(context).is_some() {
            debug!(context = %context, "Circuit reset");
        }
    }

    pub fn failure_count(&self, context: &str) -> u32 {
        self.failures.lock().get(context).copied().unwrap_or(0)
    }

    /// Contexts currently at or above the threshold, sorted
    pub fn open_contexts(&self) -> Vec<String> {
        let mut open: Vec<String> = self
            .failures
            .lock()
            .iter()
            .filter(|(_, count)| **count >= self.threshold)
            .map(|(context, _)| context.clone())
            .collect();
        open.sort();
        open
    }
}

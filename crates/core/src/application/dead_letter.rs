// Dead-letter sink: terminal store for permanently failed jobs
use crate::domain::{DeadLetterEntry, Job};
use crate::port::JobHandler;
use parking_lot::Mutex;
use std::sync::Arc;

struct DeadLetter {
    entry: DeadLetterEntry,
    // Original job and capability, kept for replay
    job: Job,
    handler: Arc<dyn JobHandler>,
}

/// In-memory, insertion-ordered dead-letter store.
///
/// Reads hand out copies; entries cannot be mutated once stored.
#[derive(Default)]
pub struct DeadLetterSink {
    entries: Mutex<Vec<DeadLetter>>,
}

impl DeadLetterSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&self, entry: DeadLetterEntry, job: Job, handler: Arc<dyn JobHandler>) {
        self.entries.lock().push(DeadLetter {
            entry,
            job,
            handler,
        });
    }

    /// Remove an entry (for replay), returning the original job and handler
    pub(crate) fn take(&self, id: &str) -> Option<(Job, Arc<dyn JobHandler>)> {
        let mut entries = self.entries.lock();
        let index = entries.iter().position(|d| d.entry.id == id)?;
        let dead = entries.remove(index);
        Some((dead.job, dead.handler))
    }

    /// Snapshot of every entry, oldest first
    pub fn entries(&self) -> Vec<DeadLetterEntry> {
        self.entries.lock().iter().map(|d| d.entry.clone()).collect()
    }

    pub fn get(&self, id: &str) -> Option<DeadLetterEntry> {
        self.entries
            .lock()
            .iter()
            .find(|d| d.entry.id == id)
            .map(|d| d.entry.clone())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.lock().iter().any(|d| d.entry.id == id)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Drop every entry; returns how many were removed
    pub fn clear(&self) -> usize {
        let mut entries = self.entries.lock();
        let removed = entries.len();
        entries.clear();
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ErrorCategory, ErrorType, JobPayload, JobType};
    use crate::port::job_handler::mocks::ScriptedHandler;
    use serde_json::json;

    fn job(id: &str) -> Job {
        Job::new(id, 0, JobType::new("NOTIFY"), JobPayload::new(json!({"id": id})), 3, 10)
    }

    fn entry(id: &str) -> DeadLetterEntry {
        DeadLetterEntry {
            id: id.to_string(),
            job_type: JobType::new("NOTIFY"),
            data: JobPayload::new(json!({"id": id})),
            retries: 3,
            error: "boom".to_string(),
            error_category: ErrorCategory::new(ErrorType::Unknown, true, "Unknown error"),
            failed_at: 42,
        }
    }

    #[test]
    fn test_entries_keep_insertion_order() {
        let sink = DeadLetterSink::new();
        let handler: Arc<dyn JobHandler> = Arc::new(ScriptedHandler::new_success());
        sink.push(entry("a"), job("a"), handler.clone());
        sink.push(entry("b"), job("b"), handler);

        let ids: Vec<_> = sink.entries().into_iter().map(|e| e.id).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(sink.len(), 2);
        assert!(sink.contains("b"));
    }

    #[test]
    fn test_take_removes_entry() {
        let sink = DeadLetterSink::new();
        sink.push(entry("a"), job("a"), Arc::new(ScriptedHandler::new_success()));

        let (taken, _handler) = sink.take("a").expect("entry present");
        assert_eq!(taken.id, "a");
        assert_eq!(taken.max_retries, 3);
        assert!(sink.is_empty());
        assert!(sink.take("a").is_none());
    }

    #[test]
    fn test_clear_reports_removed() {
        let sink = DeadLetterSink::new();
        sink.push(entry("a"), job("a"), Arc::new(ScriptedHandler::new_success()));
        sink.push(entry("b"), job("b"), Arc::new(ScriptedHandler::new_success()));

        assert_eq!(sink.clear(), 2);
        assert!(sink.entries().is_empty());
        assert_eq!(sink.clear(), 0);
    }
}

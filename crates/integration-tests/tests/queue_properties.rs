//! Job queue end-to-end properties
//!
//! Ordering, no-loss and dead-letter guarantees observed through the public API only.

use async_trait::async_trait;
use backstop_core::application::{shutdown_channel, EnqueueRequest, JobQueue, QueueDrainer};
use backstop_core::domain::{ErrorType, JobPayload, OperationError, QueueConfig};
use backstop_core::port::id_provider::mocks::SequentialIdProvider;
use backstop_core::port::job_handler::mocks::ScriptedHandler;
use backstop_core::port::sleeper::mocks::RecordingSleeper;
use backstop_core::port::time_provider::mocks::ManualTimeProvider;
use backstop_core::port::{handler_fn, JobHandler, TokioSleeper};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn queue(sleeper: Arc<RecordingSleeper>) -> JobQueue {
    JobQueue::new(
        QueueConfig::default(),
        sleeper,
        Arc::new(ManualTimeProvider::new(1_700_000_000_000)),
        Arc::new(SequentialIdProvider::new("job")),
    )
}

/// Appends `label` to a shared log on every attempt, failing the first `fail_first` attempts
struct Recorder {
    label: String,
    log: Arc<Mutex<Vec<String>>>,
    fail_first: usize,
    calls: AtomicUsize,
}

impl Recorder {
    fn new(label: &str, log: &Arc<Mutex<Vec<String>>>, fail_first: usize) -> Arc<Self> {
        Arc::new(Self {
            label: label.to_string(),
            log: Arc::clone(log),
            fail_first,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl JobHandler for Recorder {
    async fn execute(&self, _payload: &JobPayload) -> Result<Value, OperationError> {
        self.log.lock().push(self.label.clone());
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.fail_first {
            Err(OperationError::new("upstream 503").with_status(503))
        } else {
            Ok(Value::Null)
        }
    }
}

#[tokio::test]
async fn test_fifo_order_of_side_effects() {
    let queue = queue(Arc::new(RecordingSleeper::new()));
    let log = Arc::new(Mutex::new(Vec::new()));

    let labels: Vec<String> = (0..20).map(|i| format!("job-{:02}", i)).collect();
    for label in &labels {
        queue
            .enqueue(EnqueueRequest::new("noop", json!({})), Recorder::new(label, &log, 0))
            .unwrap();
    }

    queue.process().await.unwrap();

    assert_eq!(*log.lock(), labels);
}

#[tokio::test]
async fn test_retries_finish_before_next_job_starts() {
    let sleeper = Arc::new(RecordingSleeper::new());
    let queue = queue(sleeper.clone());
    let log = Arc::new(Mutex::new(Vec::new()));

    let request = || EnqueueRequest::new("sync", json!({})).with_retry_delay_ms(100);
    queue.enqueue(request(), Recorder::new("A", &log, 2)).unwrap();
    queue.enqueue(request(), Recorder::new("B", &log, 0)).unwrap();

    let report = queue.process().await.unwrap();

    assert_eq!(*log.lock(), vec!["A", "A", "A", "B"]);
    assert_eq!(report.completed, 2);
    assert_eq!(report.retried, 2);
    // Backoff never shrinks
    let delays = sleeper.delays();
    assert_eq!(delays, vec![Duration::from_millis(100), Duration::from_millis(200)]);
    assert!(delays.windows(2).all(|w| w[0] <= w[1]));
}

#[tokio::test]
async fn test_no_loss_for_1000_jobs() {
    const N: usize = 1000;
    let queue = queue(Arc::new(RecordingSleeper::new()));
    let seen = Arc::new(Mutex::new(Vec::with_capacity(N)));

    let handler = {
        let seen = Arc::clone(&seen);
        handler_fn(move |payload: JobPayload| {
            let seen = Arc::clone(&seen);
            async move {
                let n = payload.as_value()["n"].as_u64().unwrap_or(u64::MAX);
                seen.lock().push(n);
                Ok(Value::Null)
            }
        })
    };

    for n in 0..N {
        queue
            .enqueue(EnqueueRequest::new("count", json!({ "n": n })), Arc::clone(&handler))
            .unwrap();
    }
    assert_eq!(queue.stats().total_jobs, N as u64);

    let report = queue.process().await.unwrap();

    let seen = seen.lock();
    assert_eq!(report.completed, N);
    assert_eq!(seen.len(), N);
    let unique: HashSet<u64> = seen.iter().copied().collect();
    assert_eq!(unique.len(), N);
    assert!(seen.iter().all(|n| *n < N as u64));
    assert!(queue.is_empty());
    assert!(queue.get_dlq().is_empty());
}

#[tokio::test]
async fn test_exhausted_job_dead_lettered_exactly_once() {
    let queue = queue(Arc::new(RecordingSleeper::new()));
    let handler = Arc::new(ScriptedHandler::new_fail(
        OperationError::new("connect ECONNREFUSED 127.0.0.1:443").with_code("ECONNREFUSED"),
    ));

    let job_id = queue
        .enqueue(
            EnqueueRequest::new("fetch_tasks", json!({"project": "inbox"})).with_max_retries(3),
            handler.clone(),
        )
        .unwrap();
    queue
        .enqueue(
            EnqueueRequest::new("fetch_tasks", json!({})),
            Arc::new(ScriptedHandler::new_success()),
        )
        .unwrap();

    let report = queue.process().await.unwrap();

    // Draining continues past a dead-lettered job
    assert_eq!(report.dead_lettered, 1);
    assert_eq!(report.completed, 1);
    assert_eq!(handler.call_count(), 3);

    let dlq = queue.get_dlq();
    assert_eq!(dlq.len(), 1);
    let entry = &dlq[0];
    assert_eq!(entry.id, job_id);
    assert_eq!(entry.retries, 3);
    assert_eq!(entry.error_category.error_type, ErrorType::Network);
    assert!(ErrorType::ALL.contains(&entry.error_category.error_type));
    assert_eq!(entry.data.as_value(), &json!({"project": "inbox"}));

    // Another drain does not touch terminal entries
    queue.process().await.unwrap();
    assert_eq!(queue.get_dlq().len(), 1);

    assert_eq!(queue.clear_dlq(), 1);
    assert!(queue.get_dlq().is_empty());
}

#[tokio::test]
async fn test_dead_letter_entry_wire_shape() {
    let queue = queue(Arc::new(RecordingSleeper::new()));
    queue
        .enqueue(
            EnqueueRequest::new("sync", json!({"x": 1})).with_id("sync-1"),
            Arc::new(ScriptedHandler::new_fail(
                OperationError::new("bad token").with_status(401),
            )),
        )
        .unwrap();
    queue.process().await.unwrap();

    let wire = serde_json::to_value(&queue.get_dlq()[0]).unwrap();

    assert_eq!(wire["id"], "sync-1");
    assert_eq!(wire["type"], "sync");
    assert_eq!(wire["retries"], 1);
    assert_eq!(wire["error"], "bad token");
    assert_eq!(wire["error_category"]["type"], "AUTH");
    assert_eq!(wire["error_category"]["retry_eligible"], false);
}

#[tokio::test(start_paused = true)]
async fn test_drainer_shutdown_keeps_interrupted_job() {
    let queue = Arc::new(JobQueue::new(
        QueueConfig::default(),
        Arc::new(TokioSleeper),
        Arc::new(ManualTimeProvider::new(0)),
        Arc::new(SequentialIdProvider::new("job")),
    ));
    let handler = Arc::new(ScriptedHandler::new_fail(
        OperationError::new("503").with_status(503),
    ));
    let job_id = queue
        .enqueue(
            EnqueueRequest::new("sync", json!({}))
                .with_max_retries(5)
                .with_retry_delay_ms(60_000),
            handler.clone(),
        )
        .unwrap();

    let (tx, token) = shutdown_channel();
    let drainer = QueueDrainer::new(Arc::clone(&queue), Duration::from_millis(100));
    let handle = tokio::spawn(async move { drainer.run(token).await });

    // First attempt fails, job sits in a 60s backoff
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(handler.call_count(), 1);
    assert!(queue.is_processing());

    tx.shutdown();
    tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .unwrap()
        .unwrap();

    // Abandoned explicitly: back at the head, never dropped or dead-lettered
    let jobs = queue.snapshot();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].id, job_id);
    assert_eq!(jobs[0].retries, 1);
    assert!(queue.get_dlq().is_empty());
    assert!(queue.in_flight().is_none());
}

// Job Queue - strict FIFO drain with per-job retry and dead-lettering

pub mod enqueue;

pub use enqueue::{validate_request, EnqueueRequest};

use crate::application::classifier::ErrorClassifier;
use crate::application::dead_letter::DeadLetterSink;
use crate::application::registry::HandlerRegistry;
use crate::application::shutdown::ShutdownToken;
use crate::domain::{
    DeadLetterEntry, ErrorCategory, Job, JobId, JobStatus, OperationError, QueueConfig,
};
use crate::error::{AppError, Result};
use crate::port::{
    IdProvider, JobHandler, Sleeper, SystemTimeProvider, TimeProvider, TokioSleeper, UuidProvider,
};
use enqueue::build_job;
use parking_lot::Mutex;
use serde::Serialize;
use std::any::Any;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

#[derive(Clone)]
struct QueuedJob {
    job: Job,
    handler: Arc<dyn JobHandler>,
}

/// Running counters (observability only)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    /// Incremented on every successful enqueue (replays included)
    pub total_jobs: u64,
    pub completed: u64,
    pub dead_lettered: u64,
    /// Failed attempts that were followed by a backoff and another attempt
    pub retried: u64,
}

/// What a single `process()` call did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub completed: usize,
    pub dead_lettered: usize,
    pub retried: usize,
    /// Shutdown stopped the drain with jobs still queued
    pub interrupted: bool,
    /// Another drain was already running; nothing was done
    pub skipped: bool,
}

impl DrainReport {
    pub fn is_idle(&self) -> bool {
        self.completed == 0 && self.dead_lettered == 0 && self.retried == 0 && !self.interrupted
    }
}

enum AttemptFailure {
    Failed(OperationError),
    Panicked(OperationError),
}

enum JobOutcome {
    Completed,
    DeadLettered,
    Interrupted,
}

/// Runs however the drain ends. If the drain future was dropped mid-job the
/// in-flight job goes back to the queue head, then `processing` is cleared.
struct ProcessingGuard<'a>(&'a JobQueue);

impl Drop for ProcessingGuard<'_> {
    fn drop(&mut self) {
        self.0.restore_in_flight();
        self.0.processing.store(false, Ordering::Release);
    }
}

/// Aborts the attempt task if the awaiting drain is dropped
struct AttemptTask(JoinHandle<std::result::Result<serde_json::Value, OperationError>>);

impl Drop for AttemptTask {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// In-memory job queue.
///
/// Jobs are drained one at a time in enqueue order. A failing job is retried
/// in place (with backoff) until it succeeds, is classified non-retryable, or
/// runs out of attempts, and only then does the queue move on. Exhausted jobs
/// land in the dead-letter sink; a job is never in both places.
///
/// The queue does not schedule itself: the host calls [`process`](Self::process)
/// (see `QueueDrainer` for a timer-driven host).
pub struct JobQueue {
    config: QueueConfig,
    jobs: Mutex<VecDeque<QueuedJob>>,
    in_flight: Mutex<Option<QueuedJob>>,
    dead_letters: DeadLetterSink,
    classifier: ErrorClassifier,
    sleeper: Arc<dyn Sleeper>,
    time_provider: Arc<dyn TimeProvider>,
    id_provider: Arc<dyn IdProvider>,
    processing: AtomicBool,
    total_jobs: AtomicU64,
    completed: AtomicU64,
    dead_lettered: AtomicU64,
    retried: AtomicU64,
}

impl JobQueue {
    /// Create a new queue with injected ports
    pub fn new(
        config: QueueConfig,
        sleeper: Arc<dyn Sleeper>,
        time_provider: Arc<dyn TimeProvider>,
        id_provider: Arc<dyn IdProvider>,
    ) -> Self {
        Self {
            config,
            jobs: Mutex::new(VecDeque::new()),
            in_flight: Mutex::new(None),
            dead_letters: DeadLetterSink::new(),
            classifier: ErrorClassifier::new(),
            sleeper,
            time_provider,
            id_provider,
            processing: AtomicBool::new(false),
            total_jobs: AtomicU64::new(0),
            completed: AtomicU64::new(0),
            dead_lettered: AtomicU64::new(0),
            retried: AtomicU64::new(0),
        }
    }

    /// Queue with tokio timers, wall-clock time and UUID ids
    pub fn with_defaults(config: QueueConfig) -> Self {
        Self::new(
            config,
            Arc::new(TokioSleeper),
            Arc::new(SystemTimeProvider),
            Arc::new(UuidProvider),
        )
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    /// Append a job; does not start processing
    ///
    /// # Errors
    /// - `Validation` for malformed requests
    /// - `Conflict` if a caller-assigned id is already queued, running or dead-lettered
    pub fn enqueue(&self, request: EnqueueRequest, handler: Arc<dyn JobHandler>) -> Result<JobId> {
        validate_request(&request)?;

        let mut jobs = self.jobs.lock();
        if let Some(id) = &request.id {
            if self.is_known_id(&jobs, id) {
                return Err(AppError::Conflict(format!("job '{}' already exists", id)));
            }
        }

        let job = build_job(
            request,
            || self.id_provider.generate_id(),
            self.time_provider.now_millis(),
            &self.config,
        );
        let job_id = job.id.clone();

        debug!(
            job_id = %job.id,
            job_type = %job.job_type,
            max_retries = job.max_retries,
            retry_delay_ms = job.retry_delay_ms,
            "Job enqueued"
        );

        jobs.push_back(QueuedJob { job, handler });
        self.total_jobs.fetch_add(1, Ordering::Relaxed);
        Ok(job_id)
    }

    /// Enqueue using the handler registered for the request's job type
    pub fn enqueue_registered(
        &self,
        registry: &HandlerRegistry,
        request: EnqueueRequest,
    ) -> Result<JobId> {
        let handler = registry.get(request.job_type.trim()).ok_or_else(|| {
            AppError::NotFound(format!(
                "no handler registered for job type '{}'",
                request.job_type
            ))
        })?;
        self.enqueue(request, handler)
    }

    /// Drain the queue until it is empty
    pub async fn process(&self) -> Result<DrainReport> {
        self.process_until(&ShutdownToken::never()).await
    }

    /// Drain the queue until it is empty or `shutdown` fires.
    ///
    /// Shutdown is honoured between jobs and during backoff sleeps. A job
    /// interrupted in backoff goes back to the head of the queue with its
    /// attempt count intact. A running `execute` is always awaited.
    ///
    /// Returns immediately (with `skipped` set) if another drain is running.
    ///
    /// Dropping the returned future mid-job aborts the running attempt and
    /// puts the job back at the head of the queue.
    pub async fn process_until(&self, shutdown: &ShutdownToken) -> Result<DrainReport> {
        if self.processing.swap(true, Ordering::AcqRel) {
            debug!("Drain already in progress, skipping");
            return Ok(DrainReport {
                skipped: true,
                ..DrainReport::default()
            });
        }
        let _guard = ProcessingGuard(self);

        let mut shutdown = shutdown.clone();
        let mut report = DrainReport::default();

        loop {
            if shutdown.is_shutdown() {
                report.interrupted = !self.is_empty();
                break;
            }

            // Moved to in_flight under the jobs lock so the id is never unaccounted for
            let next = {
                let mut jobs = self.jobs.lock();
                let next = jobs.pop_front();
                if let Some(queued) = &next {
                    *self.in_flight.lock() = Some(queued.clone());
                }
                next
            };
            let Some(queued) = next else {
                break;
            };

            match self.run_job(queued, &mut shutdown, &mut report).await? {
                JobOutcome::Completed => report.completed += 1,
                JobOutcome::DeadLettered => report.dead_lettered += 1,
                JobOutcome::Interrupted => {
                    report.interrupted = true;
                    break;
                }
            }
        }

        if !report.is_idle() {
            info!(
                completed = report.completed,
                dead_lettered = report.dead_lettered,
                retried = report.retried,
                interrupted = report.interrupted,
                remaining = self.len(),
                "Drain finished"
            );
        }
        Ok(report)
    }

    /// Run one job to a terminal state (or until interrupted during backoff)
    async fn run_job(
        &self,
        queued: QueuedJob,
        shutdown: &mut ShutdownToken,
        report: &mut DrainReport,
    ) -> Result<JobOutcome> {
        let QueuedJob { mut job, handler } = queued;

        loop {
            job.start()?;
            self.set_in_flight(&job, &handler);

            debug!(
                job_id = %job.id,
                job_type = %job.job_type,
                attempt = job.retries + 1,
                max_retries = job.max_retries,
                "Executing job"
            );

            let err = match self.execute_attempt(&job, &handler).await {
                Ok(_) => {
                    job.complete()?;
                    self.clear_in_flight();
                    self.completed.fetch_add(1, Ordering::Relaxed);
                    info!(
                        job_id = %job.id,
                        job_type = %job.job_type,
                        attempts = job.retries + 1,
                        "Job completed"
                    );
                    return Ok(JobOutcome::Completed);
                }
                Err(AttemptFailure::Panicked(err)) => {
                    // Panics are never retried
                    job.record_failed_attempt();
                    self.dead_letter(job, handler, &err);
                    return Ok(JobOutcome::DeadLettered);
                }
                Err(AttemptFailure::Failed(err)) => err,
            };

            job.record_failed_attempt();
            let category = self.classifier.classify(&err);
            if !category.retry_eligible || job.is_exhausted() {
                self.dead_letter_classified(job, handler, &err, category);
                return Ok(JobOutcome::DeadLettered);
            }

            let delay = job.next_backoff();
            job.requeue()?;
            self.set_in_flight(&job, &handler);
            self.retried.fetch_add(1, Ordering::Relaxed);
            report.retried += 1;

            warn!(
                job_id = %job.id,
                job_type = %job.job_type,
                attempt = job.retries,
                max_retries = job.max_retries,
                delay_ms = delay.as_millis() as u64,
                error_type = %category.error_type,
                error = %err,
                "Job failed, retrying after backoff"
            );

            tokio::select! {
                biased;
                _ = shutdown.wait() => {
                    info!(
                        job_id = %job.id,
                        retries = job.retries,
                        "Backoff interrupted by shutdown, job returned to queue head"
                    );
                    let mut jobs = self.jobs.lock();
                    jobs.push_front(QueuedJob { job, handler });
                    *self.in_flight.lock() = None;
                    return Ok(JobOutcome::Interrupted);
                }
                _ = self.sleeper.sleep(delay) => {}
            }
        }
    }

    /// Execute one attempt on its own task so a panicking handler cannot take
    /// the queue down with it
    async fn execute_attempt(
        &self,
        job: &Job,
        handler: &Arc<dyn JobHandler>,
    ) -> std::result::Result<serde_json::Value, AttemptFailure> {
        let handler = Arc::clone(handler);
        let payload = job.data.clone();
        let timeout = self.config.execution_timeout;

        let mut task = AttemptTask(tokio::spawn(async move {
            match timeout {
                Some(limit) => tokio::time::timeout(limit, handler.execute(&payload))
                    .await
                    .unwrap_or_else(|_| Err(OperationError::timeout(limit))),
                None => handler.execute(&payload).await,
            }
        }));

        match (&mut task.0).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => Err(AttemptFailure::Failed(err)),
            Err(join_err) if join_err.is_panic() => {
                let message = panic_message(join_err.into_panic());
                error!(job_id = %job.id, panic_msg = %message, "Job handler panicked");
                Err(AttemptFailure::Panicked(OperationError::panic(message)))
            }
            Err(join_err) => Err(AttemptFailure::Failed(OperationError::new(format!(
                "Job task cancelled: {}",
                join_err
            )))),
        }
    }

    /// Move a queued job straight to the dead-letter sink without running it
    ///
    /// # Errors
    /// - `NotFound` if no queued job has this id
    pub fn handle_failed_job(&self, job_id: &str, error: OperationError) -> Result<()> {
        // Jobs lock held until the entry is in the sink
        let mut jobs = self.jobs.lock();
        let QueuedJob { job, handler } = jobs
            .iter()
            .position(|q| q.job.id == job_id)
            .and_then(|index| jobs.remove(index))
            .ok_or_else(|| AppError::NotFound(format!("job '{}' is not queued", job_id)))?;

        self.dead_letter(job, handler, &error);
        Ok(())
    }

    fn dead_letter(&self, job: Job, handler: Arc<dyn JobHandler>, error: &OperationError) {
        let category = self.classifier.classify(error);
        self.dead_letter_classified(job, handler, error, category);
    }

    fn dead_letter_classified(
        &self,
        mut job: Job,
        handler: Arc<dyn JobHandler>,
        error: &OperationError,
        category: ErrorCategory,
    ) {
        job.fail();
        let now = self.time_provider.now_millis();
        let diagnostic = self
            .classifier
            .format_diagnostic(error, job.job_type.as_str(), now);

        error!(
            job_id = %job.id,
            job_type = %job.job_type,
            retries = job.retries,
            error_type = %category.error_type,
            retry_eligible = category.retry_eligible,
            diagnostic = %serde_json::to_string(&diagnostic).unwrap_or_default(),
            "Job moved to dead-letter queue"
        );

        let entry = DeadLetterEntry::from_job(&job, error, category, now);
        let mut in_flight = self.in_flight.lock();
        if in_flight.as_ref().is_some_and(|current| current.job.id == job.id) {
            *in_flight = None;
        }
        self.dead_letters.push(entry, job, handler);
        self.dead_lettered.fetch_add(1, Ordering::Relaxed);
    }

    /// Take a dead-lettered job out of the sink and queue it again with a
    /// fresh attempt budget
    ///
    /// # Errors
    /// - `NotFound` if the sink holds no entry with this id
    pub fn replay_dead_letter(&self, job_id: &str) -> Result<JobId> {
        let mut jobs = self.jobs.lock();
        let (mut job, handler) = self.dead_letters.take(job_id).ok_or_else(|| {
            AppError::NotFound(format!("job '{}' is not in the dead-letter queue", job_id))
        })?;

        job.retries = 0;
        job.status = JobStatus::Queued;
        job.added_at = self.time_provider.now_millis();
        let id = job.id.clone();

        info!(job_id = %id, job_type = %job.job_type, "Replaying dead-lettered job");
        jobs.push_back(QueuedJob { job, handler });
        self.total_jobs.fetch_add(1, Ordering::Relaxed);
        Ok(id)
    }

    /// Snapshot of the dead-letter sink, oldest first
    pub fn get_dlq(&self) -> Vec<DeadLetterEntry> {
        self.dead_letters.entries()
    }

    /// Empty the dead-letter sink; returns how many entries were dropped
    pub fn clear_dlq(&self) -> usize {
        let removed = self.dead_letters.clear();
        info!(removed = removed, "Dead-letter queue cleared");
        removed
    }

    pub fn dead_letters(&self) -> &DeadLetterSink {
        &self.dead_letters
    }

    /// Discard every queued (not yet started) job; the dead-letter sink is untouched
    pub fn clear(&self) -> usize {
        let mut jobs = self.jobs.lock();
        let removed = jobs.len();
        jobs.clear();
        info!(removed = removed, "Job queue cleared");
        removed
    }

    /// Copies of the queued jobs, in drain order
    pub fn snapshot(&self) -> Vec<Job> {
        self.jobs.lock().iter().map(|q| q.job.clone()).collect()
    }

    /// Job currently executing or waiting out its backoff
    pub fn in_flight(&self) -> Option<Job> {
        self.in_flight.lock().as_ref().map(|q| q.job.clone())
    }

    pub fn len(&self) -> usize {
        self.jobs.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.lock().is_empty()
    }

    pub fn is_processing(&self) -> bool {
        self.processing.load(Ordering::Acquire)
    }

    pub fn stats(&self) -> QueueStats {
        QueueStats {
            total_jobs: self.total_jobs.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            dead_lettered: self.dead_lettered.load(Ordering::Relaxed),
            retried: self.retried.load(Ordering::Relaxed),
        }
    }

    fn set_in_flight(&self, job: &Job, handler: &Arc<dyn JobHandler>) {
        *self.in_flight.lock() = Some(QueuedJob {
            job: job.clone(),
            handler: Arc::clone(handler),
        });
    }

    fn clear_in_flight(&self) {
        *self.in_flight.lock() = None;
    }

    fn restore_in_flight(&self) {
        let mut jobs = self.jobs.lock();
        if let Some(mut queued) = self.in_flight.lock().take() {
            warn!(
                job_id = %queued.job.id,
                retries = queued.job.retries,
                "Drain dropped mid-job, job returned to queue head"
            );
            queued.job.status = JobStatus::Queued;
            jobs.push_front(queued);
        }
    }

    // Caller holds the jobs lock
    fn is_known_id(&self, jobs: &VecDeque<QueuedJob>, id: &str) -> bool {
        jobs.iter().any(|q| q.job.id == id)
            || self
                .in_flight
                .lock()
                .as_ref()
                .is_some_and(|current| current.job.id == id)
            || self.dead_letters.contains(id)
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}

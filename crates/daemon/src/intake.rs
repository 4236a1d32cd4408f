// NDJSON job intake: one EnqueueRequest per line
//
//   {"type":"echo","data":{"hello":"world"}}
//   {"type":"fail","data":{"status":503},"max_retries":2,"retry_delay_ms":100}

use anyhow::Result;
use backstop_core::application::{EnqueueRequest, HandlerRegistry, JobQueue, ShutdownToken};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{info, warn};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IntakeReport {
    pub accepted: usize,
    pub rejected: usize,
}

/// Read requests until EOF or shutdown. Bad lines are logged and skipped;
/// only I/O errors end the intake early.
pub async fn run_intake<R>(
    reader: R,
    queue: &JobQueue,
    registry: &HandlerRegistry,
    mut shutdown: ShutdownToken,
) -> Result<IntakeReport>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut report = IntakeReport::default();
    let mut line_no = 0usize;

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = shutdown.wait() => {
                info!("Intake interrupted by shutdown");
                break;
            }
        };
        let Some(line) = line else { break };
        line_no += 1;

        if line.trim().is_empty() {
            continue;
        }

        let request: EnqueueRequest = match serde_json::from_str(&line) {
            Ok(request) => request,
            Err(e) => {
                warn!(line = line_no, error = %e, "Rejected malformed job request");
                report.rejected += 1;
                continue;
            }
        };

        match queue.enqueue_registered(registry, request) {
            Ok(job_id) => {
                info!(line = line_no, job_id = %job_id, "Job accepted");
                report.accepted += 1;
            }
            Err(e) => {
                warn!(line = line_no, error = %e, "Rejected job request");
                report.rejected += 1;
            }
        }
    }

    Ok(report)
}

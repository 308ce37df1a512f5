//! Job execution span helpers.

use tracing::Span;

use crate::model::QueueId;

/// Start a span covering one dispatched job.
///
/// `job.seq` is the job's admission number within its queue.
pub fn start_job_span(queue: QueueId, seq: u64) -> Span {
    tracing::debug_span!("job.run", "queue.id" = %queue, "job.seq" = seq)
}

/// Record a drain on the queue's behalf.
pub fn record_drain(queue: QueueId, callbacks: usize, drains: u64) {
    tracing::debug!(queue = %queue, callbacks, drains, "queue drained");
}

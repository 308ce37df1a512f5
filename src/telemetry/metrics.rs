//! Metric instrument factories for workline.
//!
//! Uses the OTel Meter API with the globally-registered `MeterProvider`.
//! Without a provider these are no-ops. Each queue builds its instruments
//! once, at construction, and keeps them in a [`QueueMetrics`].

use opentelemetry::KeyValue;
use opentelemetry::metrics::{Counter, Histogram, Meter};

/// Returns the shared meter for workline instruments.
fn meter() -> Meter {
    opentelemetry::global::meter("workline")
}

/// Counter: jobs admitted through `perform` (or a DSL step).
/// Labels: `concurrency`.
pub fn jobs_admitted() -> Counter<u64> {
    meter()
        .u64_counter("workline.jobs.admitted")
        .with_description("Number of jobs admitted to a queue")
        .build()
}

/// Counter: completion signals observed.
/// Labels: `concurrency`.
pub fn jobs_completed() -> Counter<u64> {
    meter()
        .u64_counter("workline.jobs.completed")
        .with_description("Number of jobs that signalled completion")
        .build()
}

/// Counter: completion signals dropped without firing.
/// Labels: `concurrency`.
pub fn jobs_abandoned() -> Counter<u64> {
    meter()
        .u64_counter("workline.jobs.abandoned")
        .with_description("Number of jobs that dropped their completion signal")
        .build()
}

/// Counter: drain cycles.
/// Labels: `concurrency`.
pub fn queue_drains() -> Counter<u64> {
    meter()
        .u64_counter("workline.queue.drains")
        .with_description("Number of times a queue fully drained")
        .build()
}

/// Histogram: time from dispatch to completion signal, in milliseconds.
/// Labels: `concurrency`.
pub fn job_duration_ms() -> Histogram<f64> {
    meter()
        .f64_histogram("workline.job.duration_ms")
        .with_description("Job duration from dispatch to completion in milliseconds")
        .with_unit("ms")
        .build()
}

/// Instruments owned by one queue, pre-labelled with its concurrency.
pub(crate) struct QueueMetrics {
    labels: [KeyValue; 1],
    admitted: Counter<u64>,
    completed: Counter<u64>,
    abandoned: Counter<u64>,
    drains: Counter<u64>,
    duration: Histogram<f64>,
}

impl QueueMetrics {
    pub(crate) fn new(concurrency: usize) -> Self {
        Self {
            labels: [KeyValue::new("concurrency", concurrency as i64)],
            admitted: jobs_admitted(),
            completed: jobs_completed(),
            abandoned: jobs_abandoned(),
            drains: queue_drains(),
            duration: job_duration_ms(),
        }
    }

    pub(crate) fn admitted(&self) {
        self.admitted.add(1, &self.labels);
    }

    pub(crate) fn completed(&self, duration_ms: f64) {
        self.completed.add(1, &self.labels);
        self.duration.record(duration_ms, &self.labels);
    }

    pub(crate) fn abandoned(&self) {
        self.abandoned.add(1, &self.labels);
    }

    pub(crate) fn drained(&self) {
        self.drains.add(1, &self.labels);
    }
}

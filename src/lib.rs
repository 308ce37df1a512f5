//! # workline
//!
//! Bounded-concurrency job scheduling for single-threaded cooperative
//! tokio runtimes.
//!
//! Provides the scheduler core ([`WorkingQueue`]), a result-collecting
//! wrapper, a small sequencing DSL, env-based configuration and
//! tracing/OpenTelemetry setup.

pub mod config;
pub mod error;
pub mod model;
pub mod queue;
pub mod telemetry;

pub use error::{Error, Result};
pub use model::{Collected, QueueId, QueueStats};
pub use queue::{
    CollectDone, CollectingWorkingQueue, DEFAULT_CONCURRENCY, Done, SectionDone, WorkingQueue,
    concurrently, run_local, sequence, sequence_with,
};

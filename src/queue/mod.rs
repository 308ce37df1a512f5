//! Bounded-concurrency job queues for a single-threaded tokio runtime.
//!
//! A [`WorkingQueue`] admits jobs without limit and runs at most its
//! concurrency limit of them at once. A job owns a [`Done`] and is
//! running until it finishes it. [`CollectingWorkingQueue`] records what
//! each job reports; [`sequence`] and [`concurrently`] build queues for
//! the step/section DSL.

pub mod collecting;
pub mod job;
pub mod sequence;
pub mod working;

use std::future::Future;

pub use collecting::{CollectDone, CollectingWorkingQueue};
pub use job::Done;
pub use sequence::{SectionDone, concurrently, sequence, sequence_with};
pub use working::WorkingQueue;

/// Concurrency limit used when none (or 0) is given.
pub const DEFAULT_CONCURRENCY: usize = 64;

/// Drive `future` to completion inside a fresh `LocalSet`, so queues
/// created within it can spawn their jobs.
pub async fn run_local<F: Future>(future: F) -> F::Output {
    tokio::task::LocalSet::new().run_until(future).await
}

//! Sequencing DSL: steps, concurrent sections and delays.
//!
//! ```no_run
//! # use std::time::Duration;
//! # async fn demo() -> workline::Result<()> {
//! workline::run_local(async {
//!     let seq = workline::sequence();
//!     seq.perform(|done| done.finish())
//!         .wait(Duration::from_millis(50))
//!         .then_concurrently(4, |section, close| {
//!             for _ in 0..8 {
//!                 section.perform(|done| done.finish());
//!             }
//!             close.finish();
//!         })?
//!         .then(|done| done.finish())?
//!         .on_done(|| println!("all steps done"));
//!     Ok::<_, workline::Error>(())
//! })
//! .await
//! # }
//! ```

use std::time::Duration;

use tracing::trace;

use super::job::Done;
use super::working::WorkingQueue;
use crate::error::{Error, Result};

/// Handed to a concurrent-section builder. Finishing it declares the
/// section complete: the enclosing step finishes once the section drains.
pub struct SectionDone {
    section: WorkingQueue,
    outer: Done,
}

impl SectionDone {
    pub fn finish(self) {
        let SectionDone { section, outer } = self;
        let id = section.id();
        section.on_done(move || {
            trace!(section = %id, "section drained");
            outer.finish();
        });
        // Covers sections that were never given a job.
        section.done_adding_jobs();
    }
}

impl WorkingQueue {
    fn ensure_sequence(&self) -> Result<()> {
        if self.concurrency() > 1 {
            return Err(Error::ConcurrentSection {
                concurrency: self.concurrency(),
            });
        }
        Ok(())
    }

    /// Append a step to a sequence.
    ///
    /// # Errors
    ///
    /// [`Error::ConcurrentSection`] if this queue's concurrency exceeds 1.
    pub fn then<F>(&self, step: F) -> Result<&Self>
    where
        F: FnOnce(Done) + 'static,
    {
        self.ensure_sequence()?;
        Ok(self.perform(step))
    }

    /// Append a concurrent section to a sequence.
    ///
    /// When the step starts, a fresh queue with `concurrency` is built and
    /// handed to `builder` along with a [`SectionDone`]. The step completes
    /// once the builder has finished the `SectionDone` and the section has
    /// drained.
    ///
    /// # Errors
    ///
    /// [`Error::ConcurrentSection`] if this queue's concurrency exceeds 1.
    pub fn then_concurrently<B>(&self, concurrency: usize, builder: B) -> Result<&Self>
    where
        B: FnOnce(&WorkingQueue, SectionDone) + 'static,
    {
        self.ensure_sequence()?;
        Ok(self.perform(move |outer| {
            let section = WorkingQueue::new(concurrency);
            trace!(section = %section.id(), concurrency, "section started");
            let close = SectionDone {
                section: section.clone(),
                outer,
            };
            builder(&section, close);
        }))
    }

    /// Append a step that completes after `delay`.
    pub fn wait(&self, delay: Duration) -> &Self {
        self.perform_async(move |done| async move {
            tokio::time::sleep(delay).await;
            done.finish();
        })
    }

    /// Append a step that runs `job` after `delay`.
    pub fn wait_then<F>(&self, delay: Duration, job: F) -> &Self
    where
        F: FnOnce(Done) + 'static,
    {
        self.perform_async(move |done| async move {
            tokio::time::sleep(delay).await;
            job(done);
        })
    }
}

/// A queue with concurrency 1.
pub fn sequence() -> WorkingQueue {
    WorkingQueue::new(1)
}

/// A queue with concurrency 1, seeded with `job`.
pub fn sequence_with<F>(job: F) -> WorkingQueue
where
    F: FnOnce(Done) + 'static,
{
    let queue = sequence();
    queue.perform(job);
    queue
}

/// A queue running at most `concurrency` jobs at once.
pub fn concurrently(concurrency: usize) -> WorkingQueue {
    WorkingQueue::new(concurrency)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn then_is_rejected_on_concurrent_queue() {
        let queue = concurrently(4);
        let err = queue.then(|done| done.finish()).unwrap_err();
        assert!(matches!(err, Error::ConcurrentSection { concurrency: 4 }));
        assert_eq!(queue.stats().admitted, 0);
    }

    #[test]
    fn then_concurrently_is_rejected_on_concurrent_queue() {
        let queue = concurrently(2);
        let result = queue.then_concurrently(3, |_, close| close.finish());
        assert!(result.is_err());
        assert_eq!(queue.stats().admitted, 0);
    }

    #[test]
    fn factories_set_concurrency() {
        assert_eq!(sequence().concurrency(), 1);
        assert_eq!(concurrently(7).concurrency(), 7);
    }
}

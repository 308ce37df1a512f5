//! Jobs and their completion signal.
//!
//! A job is a closure that owns its bound state and receives a [`Done`]
//! when dispatched. Finishing the `Done` is what frees the job's slot;
//! returning from the closure does not.

use std::future::Future;
use std::pin::Pin;
use std::time::Instant;

use super::working::WorkingQueue;

pub(crate) type JobFuture = Pin<Box<dyn Future<Output = ()>>>;

/// Type-erased job as stored in a queue's pending buffer.
pub(crate) type BoxJob = Box<dyn FnOnce(Done) -> JobFuture>;

pub(crate) fn boxed<F>(job: F) -> BoxJob
where
    F: FnOnce(Done) + 'static,
{
    Box::new(move |done| {
        job(done);
        Box::pin(std::future::ready(()))
    })
}

pub(crate) fn boxed_async<F, Fut>(job: F) -> BoxJob
where
    F: FnOnce(Done) -> Fut + 'static,
    Fut: Future<Output = ()> + 'static,
{
    Box::new(move |done| Box::pin(job(done)))
}

/// Completion signal handed to every dispatched job.
///
/// Consuming methods make a second signal impossible. Dropping a `Done`
/// without finishing it logs an error and leaves the job's slot occupied,
/// so the owning queue never drains.
pub struct Done {
    queue: Option<WorkingQueue>,
    seq: u64,
    started: Instant,
}

impl Done {
    pub(crate) fn new(queue: WorkingQueue, seq: u64) -> Self {
        Self {
            queue: Some(queue),
            seq,
            started: Instant::now(),
        }
    }

    /// Admission number of the job within its queue, starting at 0.
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Signal that the job has finished.
    pub fn finish(mut self) {
        if let Some(queue) = self.queue.take() {
            queue.job_finished(self.seq, self.started.elapsed());
        }
    }

    /// Enqueue `job` on the owning queue, then finish this one.
    ///
    /// In a sequence this makes `job` the next step to run.
    pub fn then<F>(self, job: F)
    where
        F: FnOnce(Done) + 'static,
    {
        if let Some(queue) = self.queue.as_ref() {
            queue.perform(job);
        }
        self.finish();
    }

    /// Async counterpart of [`Done::then`].
    pub fn then_async<F, Fut>(self, job: F)
    where
        F: FnOnce(Done) -> Fut + 'static,
        Fut: Future<Output = ()> + 'static,
    {
        if let Some(queue) = self.queue.as_ref() {
            queue.perform_async(job);
        }
        self.finish();
    }
}

impl Drop for Done {
    fn drop(&mut self) {
        if let Some(queue) = self.queue.take() {
            queue.job_abandoned(self.seq);
        }
    }
}

impl std::fmt::Debug for Done {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Done")
            .field("seq", &self.seq)
            .field("finished", &self.queue.is_none())
            .finish()
    }
}

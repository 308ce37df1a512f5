//! Result-collecting wrapper around [`WorkingQueue`].

use std::cell::{Cell, RefCell};
use std::future::Future;
use std::rc::Rc;

use super::job::Done;
use super::working::WorkingQueue;
use crate::model::{Collected, QueueId, QueueStats};

type Results<T, E> = Rc<RefCell<Vec<Collected<T, E>>>>;

/// Completion signal for a collected job. Whatever is passed here is
/// recorded as-is, in completion order.
pub struct CollectDone<T, E> {
    id: u64,
    results: Results<T, E>,
    done: Done,
}

impl<T, E> CollectDone<T, E> {
    /// Identifier assigned at submission.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn finish(self, error: Option<E>, value: Option<T>) {
        self.results.borrow_mut().push(Collected {
            id: self.id,
            error,
            value,
        });
        self.done.finish();
    }

    pub fn ok(self, value: T) {
        self.finish(None, Some(value));
    }

    pub fn fail(self, error: E) {
        self.finish(Some(error), None);
    }
}

/// A [`WorkingQueue`] that tags every job with an identifier and records
/// what each job reports.
///
/// Errors are recorded, never acted on: every job runs regardless of how
/// its siblings ended.
pub struct CollectingWorkingQueue<T, E> {
    queue: WorkingQueue,
    results: Results<T, E>,
    next_id: Rc<Cell<u64>>,
}

impl<T, E> Clone for CollectingWorkingQueue<T, E> {
    fn clone(&self) -> Self {
        Self {
            queue: self.queue.clone(),
            results: Rc::clone(&self.results),
            next_id: Rc::clone(&self.next_id),
        }
    }
}

impl<T: 'static, E: 'static> CollectingWorkingQueue<T, E> {
    pub fn new(concurrency: usize) -> Self {
        Self {
            queue: WorkingQueue::new(concurrency),
            results: Rc::new(RefCell::new(Vec::new())),
            next_id: Rc::new(Cell::new(0)),
        }
    }

    pub fn id(&self) -> QueueId {
        self.queue.id()
    }

    pub fn stats(&self) -> QueueStats {
        self.queue.stats()
    }

    fn allocate_id(&self) -> u64 {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        id
    }

    pub fn perform<F>(&self, job: F) -> &Self
    where
        F: FnOnce(CollectDone<T, E>) + 'static,
    {
        let id = self.allocate_id();
        let results = Rc::clone(&self.results);
        self.queue
            .perform(move |done| job(CollectDone { id, results, done }));
        self
    }

    pub fn perform_async<F, Fut>(&self, job: F) -> &Self
    where
        F: FnOnce(CollectDone<T, E>) -> Fut + 'static,
        Fut: Future<Output = ()> + 'static,
    {
        let id = self.allocate_id();
        let results = Rc::clone(&self.results);
        self.queue
            .perform_async(move |done| job(CollectDone { id, results, done }));
        self
    }

    /// Register `callback` for the next drain; it receives every result
    /// recorded so far, in completion order. Sort by `id` for submission
    /// order.
    pub fn on_done<F>(&self, callback: F) -> &Self
    where
        F: FnOnce(&[Collected<T, E>]) + 'static,
    {
        let results = Rc::clone(&self.results);
        self.queue.on_done(move || callback(&results.borrow()));
        self
    }

    pub fn done_adding_jobs(&self) {
        self.queue.done_adding_jobs();
    }

    pub fn hold(&self) {
        self.queue.hold();
    }

    pub fn go(&self) {
        self.queue.go();
    }
}

//! The scheduler core: admission, dispatch, completion and drain.
//!
//! Every state change happens inside `perform`, a completion signal, or
//! one of the flow-control calls. All of them run to completion on the
//! single thread that owns the queue, so plain `RefCell` state is enough.
//! The only rule is that no borrow is held while user code runs: jobs are
//! spawned for the next turn, and drain callbacks run after the borrow is
//! released.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::future::Future;
use std::rc::Rc;
use std::time::Duration;

use tracing::{Instrument, debug, error, trace};

use super::DEFAULT_CONCURRENCY;
use super::job::{BoxJob, Done, boxed, boxed_async};
use crate::config::Config;
use crate::model::{QueueId, QueueStats};
use crate::telemetry::job::{record_drain, start_job_span};
use crate::telemetry::metrics::QueueMetrics;

type DrainCallback = Box<dyn FnOnce()>;

struct PendingJob {
    seq: u64,
    job: BoxJob,
}

#[derive(Default)]
struct QueueState {
    pending: VecDeque<PendingJob>,
    active: usize,
    peak_active: usize,
    held: bool,
    /// Set by the first admission; never cleared.
    has_received_job: bool,
    /// Set by `done_adding_jobs`.
    closed: bool,
    /// True while drain callbacks are running. Registrations made in that
    /// window wait for the next drain.
    draining: bool,
    drain_callbacks: Vec<DrainCallback>,
    admitted: u64,
    completed: u64,
    drains: u64,
}

/// Bounded-concurrency job queue.
///
/// Cloning yields another handle to the same queue. Any call that can
/// dispatch a job (`perform`, `go`, a completion signal) must run inside a
/// `tokio::task::LocalSet`; see [`crate::run_local`].
#[derive(Clone)]
pub struct WorkingQueue {
    id: QueueId,
    concurrency: usize,
    state: Rc<RefCell<QueueState>>,
    metrics: Rc<QueueMetrics>,
}

impl Default for WorkingQueue {
    fn default() -> Self {
        Self::new(DEFAULT_CONCURRENCY)
    }
}

impl WorkingQueue {
    /// Create a queue running at most `concurrency` jobs at once.
    ///
    /// A limit of 0 falls back to [`DEFAULT_CONCURRENCY`].
    pub fn new(concurrency: usize) -> Self {
        let concurrency = if concurrency == 0 {
            DEFAULT_CONCURRENCY
        } else {
            concurrency
        };
        let id = QueueId::new();
        trace!(queue = %id, concurrency, "queue created");
        Self {
            id,
            concurrency,
            state: Rc::new(RefCell::new(QueueState::default())),
            metrics: Rc::new(QueueMetrics::new(concurrency)),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.default_concurrency)
    }

    pub fn id(&self) -> QueueId {
        self.id
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub fn is_held(&self) -> bool {
        self.state.borrow().held
    }

    pub fn stats(&self) -> QueueStats {
        let s = self.state.borrow();
        QueueStats {
            concurrency: self.concurrency,
            pending: s.pending.len(),
            active: s.active,
            peak_active: s.peak_active,
            held: s.held,
            admitted: s.admitted,
            completed: s.completed,
            drains: s.drains,
        }
    }

    // -----------------------------------------------------------------------
    // Admission
    // -----------------------------------------------------------------------

    /// Admit a job. It starts on a later turn, once a slot is free and the
    /// queue is not held.
    pub fn perform<F>(&self, job: F) -> &Self
    where
        F: FnOnce(Done) + 'static,
    {
        self.admit(boxed(job))
    }

    /// Admit a job whose body is a future. The slot stays taken until the
    /// `Done` is finished, not until the future completes.
    pub fn perform_async<F, Fut>(&self, job: F) -> &Self
    where
        F: FnOnce(Done) -> Fut + 'static,
        Fut: Future<Output = ()> + 'static,
    {
        self.admit(boxed_async(job))
    }

    /// Admit `job(index, item, done)` for every item, in iteration order.
    pub fn process_list<I, F>(&self, items: I, job: F) -> &Self
    where
        I: IntoIterator,
        I::Item: 'static,
        F: Fn(usize, I::Item, Done) + 'static,
    {
        let job = Rc::new(job);
        for (index, item) in items.into_iter().enumerate() {
            let job = Rc::clone(&job);
            self.perform(move |done| job(index, item, done));
        }
        self
    }

    /// Admit `job(key, value, done)` for every entry, in iteration order.
    pub fn process_entries<I, K, V, F>(&self, entries: I, job: F) -> &Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: 'static,
        V: 'static,
        F: Fn(K, V, Done) + 'static,
    {
        let job = Rc::new(job);
        for (key, value) in entries {
            let job = Rc::clone(&job);
            self.perform(move |done| job(key, value, done));
        }
        self
    }

    fn admit(&self, job: BoxJob) -> &Self {
        let (seq, held) = {
            let mut s = self.state.borrow_mut();
            let seq = s.admitted;
            s.admitted += 1;
            s.has_received_job = true;
            s.pending.push_back(PendingJob { seq, job });
            (seq, s.held)
        };
        self.metrics.admitted();
        debug!(queue = %self.id, seq, held, "job admitted");

        if !held {
            self.dispatch();
        }
        self
    }

    // -----------------------------------------------------------------------
    // Dispatch and completion
    // -----------------------------------------------------------------------

    /// Start pending jobs until the limit is reached or the buffer is empty.
    /// Jobs are spawned, never called inline.
    fn dispatch(&self) {
        loop {
            let next = {
                let mut s = self.state.borrow_mut();
                if s.held || s.active >= self.concurrency {
                    return;
                }
                let Some(next) = s.pending.pop_front() else {
                    return;
                };
                s.active += 1;
                s.peak_active = s.peak_active.max(s.active);
                next
            };

            let PendingJob { seq, job } = next;
            trace!(queue = %self.id, seq, "job dispatched");
            let done = Done::new(self.clone(), seq);
            let span = start_job_span(self.id, seq);
            tokio::task::spawn_local(async move { job(done).await }.instrument(span));
        }
    }

    pub(crate) fn job_finished(&self, seq: u64, elapsed: Duration) {
        {
            let mut s = self.state.borrow_mut();
            debug_assert!(s.active > 0, "completion without an active job");
            s.active -= 1;
            s.completed += 1;
        }
        self.metrics.completed(elapsed.as_secs_f64() * 1000.0);
        debug!(
            queue = %self.id,
            seq,
            duration_ms = elapsed.as_millis() as u64,
            "job finished"
        );

        self.dispatch();
        self.check_drain(true);
    }

    pub(crate) fn job_abandoned(&self, seq: u64) {
        self.metrics.abandoned();
        error!(
            queue = %self.id,
            seq,
            "job dropped its completion signal; its slot stays occupied and the queue will not drain"
        );
    }

    /// Fire the registered callbacks if nothing is pending or active.
    ///
    /// The callback list is swapped out before any callback runs, so
    /// callbacks registered meanwhile belong to the next drain.
    fn check_drain(&self, after_completion: bool) {
        let (callbacks, drains) = {
            let mut s = self.state.borrow_mut();
            if s.draining || !s.pending.is_empty() || s.active > 0 {
                return;
            }
            if after_completion {
                s.drains += 1;
            }
            s.draining = true;
            (std::mem::take(&mut s.drain_callbacks), s.drains)
        };

        if after_completion {
            self.metrics.drained();
            record_drain(self.id, callbacks.len(), drains);
        }

        for callback in callbacks {
            callback();
        }

        self.state.borrow_mut().draining = false;
    }

    // -----------------------------------------------------------------------
    // Drain notification and flow control
    // -----------------------------------------------------------------------

    /// Register `callback` for the next drain.
    ///
    /// If the queue has already seen work (or was closed with
    /// [`done_adding_jobs`](Self::done_adding_jobs)) and is drained right
    /// now, the callback runs before this returns.
    pub fn on_done<F>(&self, callback: F) -> &Self
    where
        F: FnOnce() + 'static,
    {
        let check = {
            let mut s = self.state.borrow_mut();
            s.drain_callbacks.push(Box::new(callback));
            !s.draining && (s.has_received_job || s.closed)
        };
        if check {
            self.check_drain(false);
        }
        self
    }

    /// Declare that no more jobs are coming.
    ///
    /// Only matters for a queue that never received a job: it drains now,
    /// so its callbacks still fire. Otherwise a no-op.
    pub fn done_adding_jobs(&self) {
        let check = {
            let mut s = self.state.borrow_mut();
            s.closed = true;
            !s.has_received_job
        };
        if check {
            self.check_drain(false);
        }
    }

    /// Stop dispatching. Admission continues; nothing already running is
    /// affected.
    pub fn hold(&self) {
        self.state.borrow_mut().held = true;
        debug!(queue = %self.id, "queue held");
    }

    /// Resume dispatching and start as many pending jobs as the limit allows.
    pub fn go(&self) {
        let was_held = std::mem::replace(&mut self.state.borrow_mut().held, false);
        if was_held {
            debug!(queue = %self.id, "queue released");
            self.dispatch();
        }
    }
}

impl std::fmt::Debug for WorkingQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkingQueue")
            .field("id", &self.id)
            .field("stats", &self.stats())
            .finish()
    }
}

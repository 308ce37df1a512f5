//! Integration tests for the scheduler core.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::time::sleep;
use workline::{DEFAULT_CONCURRENCY, WorkingQueue, run_local};

const LAPSE: Duration = Duration::from_millis(50);

fn drained(queue: &WorkingQueue) -> oneshot::Receiver<()> {
    let (tx, rx) = oneshot::channel();
    queue.on_done(move || {
        let _ = tx.send(());
    });
    rx
}

/// Varied but deterministic latencies, so completion order differs from
/// submission order.
fn jitter(i: u64) -> Duration {
    Duration::from_millis((i * 37) % 50 + 1)
}

// ---------------------------------------------------------------------------
// Admission and completion
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn performs_job_and_fires_on_done() {
    run_local(async {
        let queue = WorkingQueue::new(1);
        let result = Rc::new(Cell::new(0));

        let r = Rc::clone(&result);
        queue.perform_async(move |done| async move {
            sleep(LAPSE).await;
            r.set(1);
            done.finish();
        });

        drained(&queue).await.unwrap();
        assert_eq!(result.get(), 1);
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn job_receives_its_bound_state() {
    run_local(async {
        let queue = WorkingQueue::new(1);
        let result = Rc::new(Cell::new(0));

        let (a, b) = (41, 1);
        let r = Rc::clone(&result);
        queue.perform_async(move |done| async move {
            sleep(LAPSE).await;
            r.set(a + b);
            done.finish();
        });

        drained(&queue).await.unwrap();
        assert_eq!(result.get(), 42);
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn jobs_never_run_inside_perform() {
    run_local(async {
        let queue = WorkingQueue::new(4);
        let ran = Rc::new(Cell::new(false));

        let r = Rc::clone(&ran);
        queue.perform(move |done| {
            r.set(true);
            done.finish();
        });
        assert!(!ran.get(), "job ran synchronously inside perform");

        drained(&queue).await.unwrap();
        assert!(ran.get());
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn processes_lists() {
    run_local(async {
        let queue = WorkingQueue::new(16);
        let result = Rc::new(Cell::new(0));

        let r = Rc::clone(&result);
        queue.process_list(vec![1, 1, 2, 3, 5, 8, 13], move |index, element, done| {
            if index % 2 == 0 {
                r.set(r.get() + element);
            }
            done.finish();
        });

        drained(&queue).await.unwrap();
        assert_eq!(result.get(), 21);
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn processes_entries() {
    run_local(async {
        let queue = WorkingQueue::new(16);
        let totals = Rc::new(RefCell::new((0.0_f64, 0_u32)));
        let ages = vec![("Nicolas", 30.0), ("Loïc", 3.0), ("Lachlan", 0.75)];

        let t = Rc::clone(&totals);
        queue.process_entries(ages, move |_name, age, done| {
            let mut t = t.borrow_mut();
            t.0 += age;
            t.1 += 1;
            done.finish();
        });

        drained(&queue).await.unwrap();
        let (total, count) = *totals.borrow();
        assert_eq!(total / f64::from(count), 11.25);
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn zero_concurrency_falls_back_to_default() {
    assert_eq!(WorkingQueue::new(0).concurrency(), DEFAULT_CONCURRENCY);
    assert_eq!(WorkingQueue::default().concurrency(), DEFAULT_CONCURRENCY);
}

// ---------------------------------------------------------------------------
// Drain notification
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn done_adding_jobs_fires_on_done_for_empty_queue() {
    run_local(async {
        let queue = WorkingQueue::new(1);
        let waited = Rc::new(Cell::new(0));

        let (tx, rx) = oneshot::channel();
        let w = Rc::clone(&waited);
        queue.on_done(move || {
            let _ = tx.send(w.get());
        });

        sleep(LAPSE).await;
        waited.set(1);
        queue.done_adding_jobs();

        assert_eq!(rx.await.unwrap(), 1);
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn on_done_after_drain_fires_immediately() {
    run_local(async {
        let queue = WorkingQueue::new(1);
        queue.done_adding_jobs();

        let fired = Rc::new(Cell::new(false));
        let f = Rc::clone(&fired);
        queue.on_done(move || f.set(true));
        assert!(fired.get());

        // Same once real work has drained.
        queue.perform(|done| done.finish());
        drained(&queue).await.unwrap();

        let late = Rc::new(Cell::new(false));
        let l = Rc::clone(&late);
        queue.on_done(move || l.set(true));
        assert!(late.get());
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn done_adding_jobs_after_work_does_not_refire() {
    run_local(async {
        let queue = WorkingQueue::new(1);
        let calls = Rc::new(Cell::new(0));

        queue.perform(|done| done.finish());
        let c = Rc::clone(&calls);
        queue.on_done(move || c.set(c.get() + 1));

        sleep(LAPSE).await;
        assert_eq!(calls.get(), 1);

        queue.done_adding_jobs();
        sleep(LAPSE * 2).await;
        assert_eq!(calls.get(), 1);
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn on_done_callbacks_fire_once_per_drain() {
    run_local(async {
        let queue = WorkingQueue::new(1);
        let result = Rc::new(Cell::new(0));
        let seen_by_second_job = Rc::new(Cell::new(-1));

        let r = Rc::clone(&result);
        queue.on_done(move || r.set(r.get() + 1));

        queue.perform(|done| done.finish());

        let (tx, rx) = oneshot::channel();
        let q = queue.clone();
        let r = Rc::clone(&result);
        let seen = Rc::clone(&seen_by_second_job);
        queue.on_done(move || {
            let r2 = Rc::clone(&r);
            q.perform(move |done| {
                seen.set(r2.get());
                done.finish();
            });
            q.on_done(move || {
                let _ = tx.send(r.get());
            });
        });

        assert_eq!(rx.await.unwrap(), 1);
        assert_eq!(seen_by_second_job.get(), 1);
        assert_eq!(queue.stats().drains, 2);
    })
    .await;
}

fn register_counter(queue: WorkingQueue, count: Rc<Cell<u32>>) {
    let again = queue.clone();
    queue.on_done(move || {
        count.set(count.get() + 1);
        register_counter(again, count);
    });
}

#[tokio::test(start_paused = true)]
async fn callbacks_registered_while_draining_wait_for_next_drain() {
    run_local(async {
        let queue = WorkingQueue::new(1);
        let count = Rc::new(Cell::new(0));

        register_counter(queue.clone(), Rc::clone(&count));
        queue.perform(|done| done.finish());

        let (tx, rx) = oneshot::channel();
        let q = queue.clone();
        let c = Rc::clone(&count);
        queue.on_done(move || {
            q.perform(|done| done.finish());
            q.on_done(move || {
                let _ = tx.send(c.get());
            });
        });

        assert_eq!(rx.await.unwrap(), 2);
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn callback_reregistered_from_a_job_fires_exactly_twice() {
    run_local(async {
        let queue = WorkingQueue::new(1);
        let count = Rc::new(Cell::new(0));

        let c = Rc::clone(&count);
        queue.on_done(move || c.set(c.get() + 1));
        queue.perform(|done| done.finish());
        drained(&queue).await.unwrap();
        assert_eq!(count.get(), 1);

        let q = queue.clone();
        let c = Rc::clone(&count);
        queue.perform(move |done| {
            q.on_done(move || c.set(c.get() + 1));
            done.finish();
        });
        drained(&queue).await.unwrap();

        sleep(LAPSE).await;
        assert_eq!(count.get(), 2);
    })
    .await;
}

// ---------------------------------------------------------------------------
// Flow control
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn holds_until_go() {
    run_local(async {
        let queue = WorkingQueue::new(1);
        let result = Rc::new(Cell::new(0));
        let result_at_done = Rc::new(Cell::new(-1));

        queue.hold();
        let r = Rc::clone(&result);
        queue.perform(move |done| {
            r.set(1);
            done.finish();
        });
        let (r, at_done) = (Rc::clone(&result), Rc::clone(&result_at_done));
        queue.on_done(move || at_done.set(r.get()));

        sleep(LAPSE).await;
        assert_eq!(result.get(), 0);
        assert_eq!(result_at_done.get(), -1);
        assert!(queue.is_held());
        assert_eq!(queue.stats().pending, 1);

        queue.go();
        sleep(LAPSE).await;
        assert_eq!(result.get(), 1);
        assert_eq!(result_at_done.get(), 1);
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn go_launches_up_to_the_limit() {
    run_local(async {
        let queue = WorkingQueue::new(3);
        queue.hold();
        for _ in 0..5 {
            queue.perform_async(|done| async move {
                sleep(LAPSE).await;
                done.finish();
            });
        }
        assert_eq!(queue.stats().active, 0);

        queue.go();
        let stats = queue.stats();
        assert_eq!(stats.active, 3);
        assert_eq!(stats.pending, 2);

        drained(&queue).await.unwrap();
        assert_eq!(queue.stats().completed, 5);
    })
    .await;
}

// ---------------------------------------------------------------------------
// Ordering and concurrency limits
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn runs_jobs_in_sequence_when_concurrency_is_one() {
    run_local(async {
        let queue = WorkingQueue::new(1);
        let order = Rc::new(RefCell::new(Vec::new()));
        let workers = Rc::new(Cell::new(0));
        let overlap = Rc::new(Cell::new(false));

        for i in 0..8_u64 {
            let (order, workers, overlap) =
                (Rc::clone(&order), Rc::clone(&workers), Rc::clone(&overlap));
            queue.perform_async(move |done| async move {
                workers.set(workers.get() + 1);
                if workers.get() > 1 {
                    overlap.set(true);
                }
                sleep(jitter(7 - i)).await;
                order.borrow_mut().push(i);
                workers.set(workers.get() - 1);
                done.finish();
            });
        }

        drained(&queue).await.unwrap();
        assert!(!overlap.get(), "more than one worker in a sequence");
        assert_eq!(*order.borrow(), (0..8).collect::<Vec<_>>());
        assert_eq!(queue.stats().peak_active, 1);
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn runs_jobs_in_parallel_up_to_the_limit() {
    run_local(async {
        let concurrency = 4;
        let queue = WorkingQueue::new(concurrency);
        let workers = Rc::new(Cell::new(0_usize));
        let max_seen = Rc::new(Cell::new(0_usize));
        let finished = Rc::new(Cell::new(0));

        for i in 0..12 {
            let (workers, max_seen, finished) =
                (Rc::clone(&workers), Rc::clone(&max_seen), Rc::clone(&finished));
            queue.perform_async(move |done| async move {
                workers.set(workers.get() + 1);
                max_seen.set(max_seen.get().max(workers.get()));
                sleep(jitter(i)).await;
                workers.set(workers.get() - 1);
                finished.set(finished.get() + 1);
                done.finish();
            });
        }

        let stats = queue.stats();
        assert_eq!(stats.active, concurrency);
        assert_eq!(stats.pending, 12 - concurrency);

        drained(&queue).await.unwrap();
        assert_eq!(finished.get(), 12);
        assert!(max_seen.get() <= concurrency, "concurrency level is not respected");
        assert!(max_seen.get() > 1, "no concurrency was observed");
        assert_eq!(queue.stats().peak_active, concurrency);
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn done_then_enqueues_the_next_job() {
    run_local(async {
        let queue = WorkingQueue::new(1);
        let result = Rc::new(Cell::new(0));

        let r = Rc::clone(&result);
        queue.perform(move |done| {
            r.set(r.get() + 2);
            let r2 = Rc::clone(&r);
            done.then(move |done| {
                r2.set(r2.get() + 3);
                done.finish();
            });
            r.set(r.get() * 10);
        });

        drained(&queue).await.unwrap();
        // The follow-up runs after the first job's body has returned.
        assert_eq!(result.get(), 23);
        assert_eq!(queue.stats().completed, 2);
    })
    .await;
}

// ---------------------------------------------------------------------------
// Protocol violations
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn dropped_completion_signal_keeps_slot_occupied() {
    run_local(async {
        let queue = WorkingQueue::new(2);
        let fired = Rc::new(Cell::new(false));

        queue.perform(|done| drop(done));
        queue.perform(|done| done.finish());
        let f = Rc::clone(&fired);
        queue.on_done(move || f.set(true));

        sleep(LAPSE * 2).await;
        assert!(!fired.get());
        let stats = queue.stats();
        assert_eq!(stats.active, 1);
        assert_eq!(stats.completed, 1);
    })
    .await;
}

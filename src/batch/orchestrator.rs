//! Sequential batch runner with pause / resume / cancel.
//!
//! Tasks run one at a time on the thread that calls `start()`. All mutable
//! state (queue, results, errors, phase) sits behind a single mutex; a condvar
//! parks the run loop while paused. Control calls (`pause`, `resume`,
//! `cancel`) may come from any thread holding a `BatchHandle`, or from a
//! subscriber callback, because callbacks are invoked with no lock held.
//!
//! Pause and cancel are only observed at task boundaries. A task that is
//! already running always finishes; after a cancel its result is dropped.

use std::collections::VecDeque;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};

use crate::batch::task::{BatchPhase, BatchStatus, Task, TaskFailure, TaskSuccess};
use crate::error::DeclineError;

/// Identifies a registered subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Subscriber<T> = Arc<dyn Fn(&BatchStatus<T>) + Send + Sync>;

struct State<T> {
    queue: VecDeque<Task<T>>,
    status: BatchStatus<T>,
}

struct Shared<T> {
    state: Mutex<State<T>>,
    wake: Condvar,
    subscribers: Mutex<Vec<(SubscriptionId, Subscriber<T>)>>,
    next_subscription: AtomicU64,
}

/// Cloneable control surface for a running (or idle) orchestrator.
pub struct BatchHandle<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for BatchHandle<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

/// Caller-owned batch orchestrator.
///
/// Lifecycle: `new` -> `add_to_queue` -> `start` (repeatable) -> drop.
pub struct BatchOrchestrator<T> {
    handle: BatchHandle<T>,
}

impl<T: Clone + Send + 'static> Default for BatchOrchestrator<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + 'static> BatchOrchestrator<T> {
    pub fn new() -> Self {
        let shared = Shared {
            state: Mutex::new(State {
                queue: VecDeque::new(),
                status: BatchStatus::default(),
            }),
            wake: Condvar::new(),
            subscribers: Mutex::new(Vec::new()),
            next_subscription: AtomicU64::new(1),
        };
        Self {
            handle: BatchHandle {
                shared: Arc::new(shared),
            },
        }
    }

    /// A control handle that can be moved to other threads or into callbacks.
    pub fn handle(&self) -> BatchHandle<T> {
        self.handle.clone()
    }

    pub fn add_to_queue(&self, tasks: Vec<Task<T>>) -> Result<(), DeclineError> {
        self.handle.add_to_queue(tasks)
    }

    pub fn pause(&self) -> bool {
        self.handle.pause()
    }

    pub fn resume(&self) -> bool {
        self.handle.resume()
    }

    pub fn cancel(&self) -> bool {
        self.handle.cancel()
    }

    pub fn status(&self) -> BatchStatus<T> {
        self.handle.status()
    }

    pub fn subscribe(&self, callback: impl Fn(&BatchStatus<T>) + Send + Sync + 'static) -> SubscriptionId {
        self.handle.subscribe(callback)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.handle.unsubscribe(id)
    }

    /// Run every queued task, strictly in order, on the calling thread.
    ///
    /// Results and errors from a previous run are discarded. Returns the final
    /// status once the queue drains, the batch is cancelled, or a task with
    /// `continue_on_error = false` fails.
    pub fn start(&self) -> Result<BatchStatus<T>, DeclineError> {
        let shared = &self.handle.shared;

        let snapshot = {
            let mut st = lock(&shared.state);
            if st.status.phase.is_active() {
                return Err(DeclineError::invalid_config("batch is already running"));
            }
            let pending: Vec<String> = st.queue.iter().map(|t| t.id.clone()).collect();
            st.status = BatchStatus {
                phase: BatchPhase::Running,
                is_processing: true,
                total: pending.len(),
                pending,
                ..BatchStatus::default()
            };
            st.status.clone()
        };
        tracing::info!(total = snapshot.total, "batch started");
        self.handle.notify(&snapshot);

        loop {
            // Task boundary: honour pause and cancel, then take the next task.
            let (task, snapshot) = {
                let mut st = lock(&shared.state);
                while st.status.phase == BatchPhase::Paused {
                    st = shared.wake.wait(st).unwrap_or_else(|e| e.into_inner());
                }
                if st.status.phase == BatchPhase::Cancelled {
                    return Ok(st.status.clone());
                }
                match st.queue.pop_front() {
                    None => {
                        st.status.phase = BatchPhase::Completed;
                        st.status.is_processing = false;
                        st.status.current_task.clear();
                        st.status.update_progress();
                        let done = st.status.clone();
                        drop(st);
                        tracing::info!(
                            succeeded = done.results.len(),
                            failed = done.errors.len(),
                            "batch completed"
                        );
                        self.handle.notify(&done);
                        return Ok(done);
                    }
                    Some(task) => {
                        st.status.pending.retain(|id| id != &task.id);
                        st.status.current_task = task.description.clone();
                        (task, st.status.clone())
                    }
                }
            };
            self.handle.notify(&snapshot);

            let Task {
                id,
                description,
                action,
                continue_on_error,
            } = task;
            tracing::debug!(task = %id, %description, "task started");

            let outcome = match catch_unwind(AssertUnwindSafe(action)) {
                Ok(result) => result,
                Err(_) => Err(DeclineError::data_access("task panicked")),
            };

            let (snapshot, halted) = {
                let mut st = lock(&shared.state);
                if st.status.phase == BatchPhase::Cancelled {
                    tracing::debug!(task = %id, "discarding result of task finished after cancel");
                    return Ok(st.status.clone());
                }

                st.status.processed += 1;
                st.status.update_progress();
                let mut halted = false;
                match outcome {
                    Ok(data) => st.status.results.push(TaskSuccess { id, data }),
                    Err(err) => {
                        tracing::warn!(task = %id, error = %err, "task failed");
                        st.status.errors.push(TaskFailure {
                            error: DeclineError::task_execution(id.clone(), err),
                            id,
                        });
                        if !continue_on_error {
                            // Remaining ids stay in `pending` so the halt is visible.
                            st.queue.clear();
                            st.status.phase = BatchPhase::Failed;
                            st.status.is_processing = false;
                            st.status.is_paused = false;
                            st.status.current_task.clear();
                            halted = true;
                        }
                    }
                }
                (st.status.clone(), halted)
            };
            self.handle.notify(&snapshot);

            if halted {
                tracing::warn!(unprocessed = snapshot.pending.len(), "batch halted by failing task");
                return Ok(snapshot);
            }

            std::thread::yield_now();
        }
    }
}

impl<T: Clone + Send + 'static> BatchHandle<T> {
    /// Append tasks; rejected while a run is in progress.
    pub fn add_to_queue(&self, tasks: Vec<Task<T>>) -> Result<(), DeclineError> {
        let mut st = lock(&self.shared.state);
        if st.status.phase.is_active() {
            return Err(DeclineError::invalid_config(
                "cannot add tasks while a batch is running; cancel it first",
            ));
        }
        st.queue.extend(tasks);
        Ok(())
    }

    /// Stop starting new tasks after the one in flight. Returns false if not running.
    pub fn pause(&self) -> bool {
        let snapshot = {
            let mut st = lock(&self.shared.state);
            if st.status.phase != BatchPhase::Running {
                return false;
            }
            st.status.phase = BatchPhase::Paused;
            st.status.is_paused = true;
            st.status.clone()
        };
        tracing::info!(progress = snapshot.progress, "batch paused");
        self.notify(&snapshot);
        true
    }

    /// Continue a paused batch. Returns false if not paused.
    pub fn resume(&self) -> bool {
        let snapshot = {
            let mut st = lock(&self.shared.state);
            if st.status.phase != BatchPhase::Paused {
                return false;
            }
            st.status.phase = BatchPhase::Running;
            st.status.is_paused = false;
            st.status.clone()
        };
        self.shared.wake.notify_all();
        tracing::info!(progress = snapshot.progress, "batch resumed");
        self.notify(&snapshot);
        true
    }

    /// Drop all queued tasks and end the run. Returns false if there was nothing to cancel.
    pub fn cancel(&self) -> bool {
        let snapshot = {
            let mut st = lock(&self.shared.state);
            if !st.status.phase.is_active() && st.queue.is_empty() {
                return false;
            }
            st.queue.clear();
            st.status.pending.clear();
            st.status.phase = BatchPhase::Cancelled;
            st.status.is_processing = false;
            st.status.is_paused = false;
            st.status.current_task.clear();
            st.status.clone()
        };
        self.shared.wake.notify_all();
        tracing::info!(processed = snapshot.processed, "batch cancelled");
        self.notify(&snapshot);
        true
    }

    pub fn status(&self) -> BatchStatus<T> {
        lock(&self.shared.state).status.clone()
    }

    /// Number of tasks waiting to run.
    pub fn queued(&self) -> usize {
        lock(&self.shared.state).queue.len()
    }

    pub fn subscribe(&self, callback: impl Fn(&BatchStatus<T>) + Send + Sync + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.shared.next_subscription.fetch_add(1, Ordering::Relaxed));
        lock(&self.shared.subscribers).push((id, Arc::new(callback)));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subs = lock(&self.shared.subscribers);
        let before = subs.len();
        subs.retain(|(sid, _)| *sid != id);
        subs.len() != before
    }

    fn notify(&self, status: &BatchStatus<T>) {
        let subscribers: Vec<Subscriber<T>> = lock(&self.shared.subscribers)
            .iter()
            .map(|(_, cb)| Arc::clone(cb))
            .collect();
        for cb in subscribers {
            if catch_unwind(AssertUnwindSafe(|| cb(status))).is_err() {
                tracing::warn!("batch subscriber panicked; ignoring");
            }
        }
    }
}

fn lock<S>(m: &Mutex<S>) -> MutexGuard<'_, S> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize};
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    fn counting_tasks(n: usize, fail_at: Option<usize>, counter: &Arc<AtomicUsize>) -> Vec<Task<usize>> {
        (0..n)
            .map(|i| {
                let counter = Arc::clone(counter);
                Task::new(format!("task-{i}"), format!("well {i}"), move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                    if Some(i) == fail_at {
                        Err(DeclineError::InsufficientData { found: 2, required: 5 })
                    } else {
                        Ok(i * 10)
                    }
                })
            })
            .collect()
    }

    #[test]
    fn partial_failure_continues_when_allowed() {
        let counter = Arc::new(AtomicUsize::new(0));
        let orch = BatchOrchestrator::new();
        orch.add_to_queue(counting_tasks(5, Some(2), &counter)).unwrap();

        let status = orch.start().unwrap();
        assert_eq!(status.phase, BatchPhase::Completed);
        assert_eq!(status.results.len() + status.errors.len(), 5);
        assert_eq!(status.errors.len(), 1);
        assert_eq!(status.errors[0].id, "task-2");
        match &status.errors[0].error {
            DeclineError::TaskExecution { task_id, source } => {
                assert_eq!(task_id, "task-2");
                assert_eq!(**source, DeclineError::InsufficientData { found: 2, required: 5 });
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(status.progress, 100.0);
        assert!(!status.is_processing);
        assert_eq!(counter.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn failure_halts_batch_when_not_allowed() {
        let counter = Arc::new(AtomicUsize::new(0));
        let tasks: Vec<Task<usize>> = counting_tasks(5, Some(2), &counter)
            .into_iter()
            .map(|t| t.with_continue_on_error(false))
            .collect();
        let orch = BatchOrchestrator::new();
        orch.add_to_queue(tasks).unwrap();

        let status = orch.start().unwrap();
        assert_eq!(status.phase, BatchPhase::Failed);
        assert_eq!(status.results.len(), 2);
        assert_eq!(status.errors.len(), 1);
        assert_eq!(status.errors[0].id, "task-2");
        assert_eq!(status.pending, vec!["task-3".to_string(), "task-4".to_string()]);
        assert_eq!(counter.load(Ordering::SeqCst), 3);
        assert!((status.progress - 60.0).abs() < 1e-9);
        assert_eq!(orch.handle().queued(), 0);
    }

    #[test]
    fn pause_freezes_progress_until_resume() {
        let counter = Arc::new(AtomicUsize::new(0));
        let orch = BatchOrchestrator::new();
        orch.add_to_queue(counting_tasks(4, None, &counter)).unwrap();
        let handle = orch.handle();

        let (tx, rx) = mpsc::channel();
        let paused_once = Arc::new(AtomicBool::new(false));
        {
            let handle = handle.clone();
            let paused_once = Arc::clone(&paused_once);
            orch.subscribe(move |s: &BatchStatus<usize>| {
                if s.processed == 1 && !paused_once.swap(true, Ordering::SeqCst) {
                    handle.pause();
                }
                let _ = tx.send(s.is_paused);
            });
        }

        let runner = thread::spawn(move || orch.start());

        // Wait until the pause has been broadcast.
        while !rx.recv().unwrap() {}

        let frozen = handle.status();
        assert!(frozen.is_paused);
        assert_eq!(frozen.phase, BatchPhase::Paused);
        thread::sleep(Duration::from_millis(50));
        let later = handle.status();
        assert_eq!(later.processed, 1);
        assert_eq!(later.progress, frozen.progress);
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        assert!(handle.resume());
        let status = runner.join().unwrap().unwrap();
        assert_eq!(status.phase, BatchPhase::Completed);
        assert_eq!(status.results.len(), 4);
        assert_eq!(counter.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn cancel_discards_in_flight_result_and_leaves_no_residue() {
        let orch: BatchOrchestrator<&'static str> = BatchOrchestrator::new();
        let handle = orch.handle();
        let old_runs = Arc::new(AtomicUsize::new(0));

        let mut tasks = Vec::new();
        {
            let handle = handle.clone();
            let old_runs = Arc::clone(&old_runs);
            tasks.push(Task::new("old-0", "first", move || {
                old_runs.fetch_add(1, Ordering::SeqCst);
                handle.cancel();
                Ok("old-0")
            }));
        }
        for i in 1..4 {
            let old_runs = Arc::clone(&old_runs);
            tasks.push(Task::new(format!("old-{i}"), "stale", move || {
                old_runs.fetch_add(1, Ordering::SeqCst);
                Ok("stale")
            }));
        }
        orch.add_to_queue(tasks).unwrap();

        let cancelled = orch.start().unwrap();
        assert_eq!(cancelled.phase, BatchPhase::Cancelled);
        assert!(cancelled.results.is_empty());
        assert_eq!(old_runs.load(Ordering::SeqCst), 1);
        assert_eq!(handle.queued(), 0);

        orch.add_to_queue(vec![
            Task::new("new-0", "fresh", || Ok("new-0")),
            Task::new("new-1", "fresh", || Ok("new-1")),
        ])
        .unwrap();
        let status = orch.start().unwrap();
        assert_eq!(status.phase, BatchPhase::Completed);
        let ids: Vec<&str> = status.results.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["new-0", "new-1"]);
        assert_eq!(status.total, 2);
        assert_eq!(old_runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn add_to_queue_is_rejected_while_running() {
        let orch: BatchOrchestrator<()> = BatchOrchestrator::new();
        let handle = orch.handle();
        let rejected = Arc::new(AtomicBool::new(false));
        {
            let handle = handle.clone();
            let rejected = Arc::clone(&rejected);
            orch.add_to_queue(vec![Task::new("a", "a", move || {
                let err = handle.add_to_queue(vec![Task::new("b", "b", || Ok(()))]);
                rejected.store(err.is_err(), Ordering::SeqCst);
                Ok(())
            })])
            .unwrap();
        }
        let status = orch.start().unwrap();
        assert!(rejected.load(Ordering::SeqCst));
        assert_eq!(status.total, 1);
        assert_eq!(handle.queued(), 0);
    }

    #[test]
    fn subscribers_see_transitions_and_can_unsubscribe() {
        let orch = BatchOrchestrator::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let id = {
            let seen = Arc::clone(&seen);
            orch.subscribe(move |s: &BatchStatus<usize>| {
                seen.lock().unwrap().push((s.phase, s.processed, s.current_task.clone()));
            })
        };
        let counter = Arc::new(AtomicUsize::new(0));
        orch.add_to_queue(counting_tasks(2, None, &counter)).unwrap();
        orch.start().unwrap();

        let events = seen.lock().unwrap().clone();
        // start, (task start, task done) x2, completion
        assert_eq!(events.len(), 6);
        assert_eq!(events[1], (BatchPhase::Running, 0, "well 0".to_string()));
        assert_eq!(events[5].0, BatchPhase::Completed);

        assert!(orch.unsubscribe(id));
        assert!(!orch.unsubscribe(id));
        orch.add_to_queue(counting_tasks(1, None, &counter)).unwrap();
        orch.start().unwrap();
        assert_eq!(seen.lock().unwrap().len(), 6);
    }

    #[test]
    fn panicking_subscriber_and_task_do_not_break_the_batch() {
        let orch = BatchOrchestrator::new();
        orch.subscribe(|_: &BatchStatus<u8>| panic!("observer bug"));
        orch.add_to_queue(vec![
            Task::new("boom", "panics", || panic!("task bug")),
            Task::new("ok", "fine", || Ok(7u8)),
        ])
        .unwrap();

        let status = orch.start().unwrap();
        assert_eq!(status.phase, BatchPhase::Completed);
        assert_eq!(status.errors.len(), 1);
        assert_eq!(status.errors[0].id, "boom");
        assert_eq!(status.results[0].data, 7);
    }

    #[test]
    fn subscribers_see_pause_resume_and_cancel() {
        let counter = Arc::new(AtomicUsize::new(0));
        let orch = BatchOrchestrator::new();
        orch.add_to_queue(counting_tasks(4, None, &counter)).unwrap();
        let handle = orch.handle();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let (tx, rx) = mpsc::channel();
        {
            let handle = handle.clone();
            let seen = Arc::clone(&seen);
            let paused_once = AtomicBool::new(false);
            let cancelled_once = AtomicBool::new(false);
            orch.subscribe(move |s: &BatchStatus<usize>| {
                seen.lock().unwrap().push((s.phase, s.processed, s.current_task.clone()));
                if s.processed == 1 && !paused_once.swap(true, Ordering::SeqCst) {
                    handle.pause();
                }
                if s.processed == 2 && s.phase == BatchPhase::Running && !cancelled_once.swap(true, Ordering::SeqCst) {
                    handle.cancel();
                }
                let _ = tx.send(s.is_paused);
            });
        }

        let runner = thread::spawn(move || orch.start());
        while !rx.recv().unwrap() {}
        assert!(handle.resume());

        let status = runner.join().unwrap().unwrap();
        assert_eq!(status.phase, BatchPhase::Cancelled);
        assert_eq!(counter.load(Ordering::SeqCst), 2);

        let events = seen.lock().unwrap().clone();
        let paused_at = events
            .iter()
            .position(|e| e.0 == BatchPhase::Paused)
            .expect("pause snapshot");
        assert_eq!(events[paused_at].1, 1);
        // The resume snapshot still names the last finished task.
        assert!(
            events[paused_at + 1..]
                .iter()
                .any(|e| *e == (BatchPhase::Running, 1, "well 0".to_string()))
        );
        assert!(events.contains(&(BatchPhase::Cancelled, 2, String::new())));
    }

    #[test]
    fn pause_and_resume_are_noops_when_idle() {
        let orch: BatchOrchestrator<()> = BatchOrchestrator::new();
        assert!(!orch.pause());
        assert!(!orch.resume());
        assert!(!orch.cancel());
        let status = orch.start().unwrap();
        assert_eq!(status.phase, BatchPhase::Completed);
        assert_eq!(status.progress, 100.0);
    }
}

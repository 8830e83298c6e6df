/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Work-stealing task scheduler.
//!
//! [`TaskScheduler`] owns a fixed pool of worker threads and exposes two
//! operations: [`dispatch`](TaskScheduler::dispatch) (fire-and-forget) and
//! [`wait_for_all`](TaskScheduler::wait_for_all) (block until every
//! previously-dispatched task has completed). It is the execution substrate
//! the Frame Graph drives layer by layer; it has no notion of frames, passes,
//! or dependencies — just tasks.
//!
//! # Design decisions
//!
//! | Topic | Choice |
//! |---|---|
//! | Task storage | `Box<dyn FnOnce() + Send + 'static>` — one heap allocation per dispatch rather than a hand-rolled inline vtable buffer |
//! | Queue | single mutex-protected `VecDeque`, per the "(a) simple, correct, contended" option; `wait_for_all` steals from the same queue workers pull from |
//! | Quiescence signal | two `AtomicUsize` counters (`active`, `queued`) plus a `Condvar` paired with a dedicated `done_lock`, woken on every completion and on every dispatch |
//! | Panics | left to unwind; `[profile.release] panic = "abort"` at the workspace level turns a task panic into a process abort, matching the "any panic aborts the process" contract without a hand-rolled catch_unwind wrapper |

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};

use tracing::{debug, info, warn};

type Job = Box<dyn FnOnce() + Send + 'static>;

struct Shared {
    queue: Mutex<VecDeque<Job>>,
    queue_cv: Condvar,
    done_lock: Mutex<()>,
    done_cv: Condvar,
    active_task_count: AtomicUsize,
    queued_task_count: AtomicUsize,
    running: AtomicBool,
}

impl Shared {
    fn is_quiescent(&self) -> bool {
        self.active_task_count.load(Ordering::Acquire) == 0
            && self.queued_task_count.load(Ordering::Acquire) == 0
    }

    fn try_steal(&self) -> Option<Job> {
        let job = self.queue.lock().unwrap().pop_front();
        if job.is_some() {
            self.queued_task_count.fetch_sub(1, Ordering::AcqRel);
        }
        job
    }

    fn run(&self, job: Job) {
        job();
        let prev = self.active_task_count.fetch_sub(1, Ordering::Release);
        if prev == 1 {
            let _guard = self.done_lock.lock().unwrap();
            self.done_cv.notify_all();
        }
    }
}

fn worker_loop(shared: Arc<Shared>) {
    loop {
        let job = {
            let mut queue = shared.queue.lock().unwrap();
            loop {
                if let Some(job) = queue.pop_front() {
                    shared.queued_task_count.fetch_sub(1, Ordering::AcqRel);
                    break Some(job);
                }
                if !shared.running.load(Ordering::Acquire) {
                    break None;
                }
                queue = shared.queue_cv.wait(queue).unwrap();
            }
        };
        match job {
            Some(job) => shared.run(job),
            None => return,
        }
    }
}

fn auto_thread_count() -> usize {
    thread::available_parallelism()
        .map(|n| n.get().saturating_sub(1).max(1))
        .unwrap_or(1)
}

struct Running {
    workers: Vec<JoinHandle<()>>,
    worker_count: usize,
}

/// A fixed pool of worker threads, plus a single shared task queue.
///
/// Construct with [`TaskScheduler::new`], call [`initialize`](Self::initialize)
/// once, `dispatch` tasks, call [`wait_for_all`](Self::wait_for_all) at layer
/// boundaries, and `shutdown` when the scheduler is no longer needed.
pub struct TaskScheduler {
    shared: Arc<Shared>,
    state: Mutex<Option<Running>>,
}

impl Default for TaskScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskScheduler {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                queue: Mutex::new(VecDeque::new()),
                queue_cv: Condvar::new(),
                done_lock: Mutex::new(()),
                done_cv: Condvar::new(),
                active_task_count: AtomicUsize::new(0),
                queued_task_count: AtomicUsize::new(0),
                running: AtomicBool::new(false),
            }),
            state: Mutex::new(None),
        }
    }

    /// Start `thread_count` workers (`None` or `Some(0)` ⇒ hardware
    /// concurrency − 1, minimum 1). Idempotent: a second call while already
    /// initialized is a no-op.
    pub fn initialize(&self, thread_count: Option<usize>) {
        let mut state = self.state.lock().unwrap();
        if state.is_some() {
            debug!("TaskScheduler::initialize() called twice; ignoring");
            return;
        }

        let worker_count = match thread_count {
            None | Some(0) => auto_thread_count(),
            Some(n) => n,
        };

        self.shared.running.store(true, Ordering::Release);
        let mut workers = Vec::with_capacity(worker_count);
        for id in 0..worker_count {
            let shared = Arc::clone(&self.shared);
            let handle = thread::Builder::new()
                .name(format!("task-worker-{id}"))
                .spawn(move || worker_loop(shared))
                .expect("failed to spawn task-scheduler worker thread");
            workers.push(handle);
        }

        info!(worker_count, "task scheduler workers started");
        *state = Some(Running {
            workers,
            worker_count,
        });
    }

    /// Signal every worker to stop, wake them, and join. Idempotent: calling
    /// `shutdown` when not initialized (or twice) is a no-op.
    pub fn shutdown(&self) {
        let mut state = self.state.lock().unwrap();
        let Some(running) = state.take() else {
            return;
        };

        self.shared.running.store(false, Ordering::Release);
        self.shared.queue_cv.notify_all();
        for handle in running.workers {
            let _ = handle.join();
        }
        info!("task scheduler shut down");
    }

    /// Enqueue `job` for execution by exactly one worker. A no-op (logged)
    /// if called before `initialize` or after `shutdown`.
    pub fn dispatch(&self, job: impl FnOnce() + Send + 'static) {
        if !self.shared.running.load(Ordering::Acquire) {
            warn!("dispatch() called while scheduler is not running; task dropped");
            return;
        }

        self.shared.active_task_count.fetch_add(1, Ordering::AcqRel);
        self.shared.queued_task_count.fetch_add(1, Ordering::AcqRel);
        self.shared
            .queue
            .lock()
            .unwrap()
            .push_back(Box::new(job));
        self.shared.queue_cv.notify_one();

        // Wake any thread blocked in `wait_for_all` so it re-checks for
        // stealable work, not just completion.
        let _guard = self.shared.done_lock.lock().unwrap();
        self.shared.done_cv.notify_all();
    }

    /// Block until `active_task_count` and `queued_task_count` are both
    /// zero. The calling thread may itself steal and run queued tasks while
    /// waiting, so `wait_for_all` called from a dispatching thread cannot
    /// deadlock against its own dispatched work.
    pub fn wait_for_all(&self) {
        loop {
            if let Some(job) = self.shared.try_steal() {
                self.shared.run(job);
                continue;
            }

            let guard = self.shared.done_lock.lock().unwrap();
            if self.shared.is_quiescent() {
                return;
            }
            let _guard = self.shared.done_cv.wait(guard).unwrap();
        }
    }

    pub fn active_task_count(&self) -> usize {
        self.shared.active_task_count.load(Ordering::Acquire)
    }

    pub fn queued_task_count(&self) -> usize {
        self.shared.queued_task_count.load(Ordering::Acquire)
    }

    /// Number of workers started by `initialize`; `0` if not initialized.
    pub fn worker_count(&self) -> usize {
        self.state
            .lock()
            .unwrap()
            .as_ref()
            .map(|r| r.worker_count)
            .unwrap_or(0)
    }
}

impl Drop for TaskScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize as Counter;
    use std::time::Duration;

    #[test]
    fn dispatch_before_initialize_is_a_silent_no_op() {
        let scheduler = TaskScheduler::new();
        scheduler.dispatch(|| panic!("should never run"));
        // No worker exists to pick this up; counters stay untouched.
        assert_eq!(scheduler.active_task_count(), 0);
        assert_eq!(scheduler.queued_task_count(), 0);
    }

    #[test]
    fn every_dispatched_task_runs_exactly_once() {
        let scheduler = TaskScheduler::new();
        scheduler.initialize(Some(4));

        let counter = Arc::new(Counter::new(0));
        for _ in 0..200 {
            let counter = Arc::clone(&counter);
            scheduler.dispatch(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }
        scheduler.wait_for_all();

        assert_eq!(counter.load(Ordering::SeqCst), 200);
        assert_eq!(scheduler.active_task_count(), 0);
        assert_eq!(scheduler.queued_task_count(), 0);

        scheduler.shutdown();
    }

    #[test]
    fn wait_for_all_helps_by_stealing_from_the_dispatching_thread() {
        // Single worker so the dispatching thread must steal to finish
        // promptly instead of just blocking on the worker.
        let scheduler = TaskScheduler::new();
        scheduler.initialize(Some(1));

        let counter = Arc::new(Counter::new(0));
        for _ in 0..50 {
            let counter = Arc::clone(&counter);
            scheduler.dispatch(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }
        scheduler.wait_for_all();
        assert_eq!(counter.load(Ordering::SeqCst), 50);

        scheduler.shutdown();
    }

    #[test]
    fn initialize_is_idempotent() {
        let scheduler = TaskScheduler::new();
        scheduler.initialize(Some(2));
        let first = scheduler.worker_count();
        scheduler.initialize(Some(8));
        assert_eq!(scheduler.worker_count(), first);
        scheduler.shutdown();
    }

    #[test]
    fn shutdown_is_idempotent_and_joins_workers() {
        let scheduler = TaskScheduler::new();
        scheduler.initialize(Some(2));
        scheduler.shutdown();
        scheduler.shutdown();
        assert_eq!(scheduler.worker_count(), 0);
    }

    #[test]
    fn zero_thread_count_falls_back_to_auto() {
        let scheduler = TaskScheduler::new();
        scheduler.initialize(Some(0));
        assert!(scheduler.worker_count() >= 1);
        scheduler.shutdown();
    }

    #[test]
    fn wait_for_all_on_idle_scheduler_returns_immediately() {
        let scheduler = TaskScheduler::new();
        scheduler.initialize(Some(2));
        scheduler.wait_for_all();
        scheduler.shutdown();
    }

    #[test]
    fn dispatch_after_shutdown_is_a_silent_no_op() {
        let scheduler = TaskScheduler::new();
        scheduler.initialize(Some(2));
        scheduler.shutdown();

        let ran = Arc::new(Counter::new(0));
        let ran_clone = Arc::clone(&ran);
        scheduler.dispatch(move || {
            ran_clone.fetch_add(1, Ordering::SeqCst);
        });
        thread::sleep(Duration::from_millis(20));
        assert_eq!(ran.load(Ordering::SeqCst), 0);
    }
}

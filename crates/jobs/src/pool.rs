//! Bounded worker thread pool with idle shutdown.
//!
//! Threads are spawned on demand and exit after sitting idle for the
//! configured keep-alive, core threads included. Tasks wait in an unbounded
//! queue, so `execute` never blocks on running work.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};

use crate::config::WorkerPoolConfig;

type Task = Box<dyn FnOnce() + Send + 'static>;

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("worker pool is shut down")]
    ShutDown,
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Point-in-time view of the pool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct PoolStats {
    pub live_threads: usize,
    pub idle_threads: usize,
    pub queued_tasks: usize,
    /// Threads spawned over the pool's lifetime
    pub spawned_threads: usize,
}

#[derive(Default)]
struct PoolState {
    tasks: VecDeque<Task>,
    live: usize,
    idle: usize,
    shutdown: bool,
}

struct Shared {
    config: WorkerPoolConfig,
    state: Mutex<PoolState>,
    /// Signalled when a task is queued or the pool shuts down.
    work: Condvar,
    /// Signalled when the last worker exits.
    drained: Condvar,
    spawned: AtomicUsize,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Account for a worker leaving. Must run under the same lock as the
    /// decision to leave, so `execute` never counts on a departing worker.
    fn retire(&self, state: &mut PoolState) {
        state.live -= 1;
        if state.live == 0 {
            self.drained.notify_all();
        }
    }
}

/// Thread pool executing boxed tasks.
pub struct WorkerPool {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("config", &self.shared.config)
            .field("stats", &self.stats())
            .finish()
    }
}

impl WorkerPool {
    /// Create a pool. No thread is started until the first task arrives.
    pub fn new(config: WorkerPoolConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                state: Mutex::new(PoolState::default()),
                work: Condvar::new(),
                drained: Condvar::new(),
                spawned: AtomicUsize::new(0),
            }),
        }
    }

    /// Queue a task for execution on a pool thread.
    ///
    /// A new thread is started while fewer than `core_threads` are live, or
    /// when no live thread is idle and fewer than `max_threads` are live.
    pub fn execute<F>(&self, task: F) -> Result<(), PoolError>
    where
        F: FnOnce() + Send + 'static,
    {
        let config = &self.shared.config;
        let mut state = self.shared.lock();
        if state.shutdown {
            return Err(PoolError::ShutDown);
        }

        state.tasks.push_back(Box::new(task));

        let grow = state.live < config.core_threads
            || (state.idle == 0 && state.live < config.max_threads);
        if !grow {
            self.shared.work.notify_one();
            return Ok(());
        }

        state.live += 1;
        drop(state);

        let worker_id = self.shared.spawned.fetch_add(1, Ordering::Relaxed);
        let shared = self.shared.clone();
        let spawned = thread::Builder::new()
            .name(format!("{}-{}", config.name, worker_id))
            .spawn(move || worker_loop(shared, worker_id));

        if let Err(e) = spawned {
            let mut state = self.shared.lock();
            self.shared.retire(&mut state);
            if state.live == 0 {
                // Nobody left to run it.
                state.tasks.pop_back();
                return Err(PoolError::Spawn(e));
            }
            warn!(pool = %config.name, error = %e, "failed to grow worker pool");
            self.shared.work.notify_one();
        }
        Ok(())
    }

    pub fn stats(&self) -> PoolStats {
        let state = self.shared.lock();
        PoolStats {
            live_threads: state.live,
            idle_threads: state.idle,
            queued_tasks: state.tasks.len(),
            spawned_threads: self.shared.spawned.load(Ordering::Relaxed),
        }
    }

    /// Stop accepting tasks, let queued tasks finish and wait for every
    /// worker to exit.
    pub fn shutdown(&self) {
        let mut state = self.shared.lock();
        state.shutdown = true;
        self.shared.work.notify_all();
        while state.live > 0 {
            state = self
                .shared
                .drained
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
        debug!(pool = %self.shared.config.name, "worker pool shut down");
    }

    /// Wait up to `timeout` for every worker to exit on its own.
    pub fn wait_idle_exit(&self, timeout: Duration) -> bool {
        let state = self.shared.lock();
        let (state, _) = self
            .shared
            .drained
            .wait_timeout_while(state, timeout, |state| state.live > 0)
            .unwrap_or_else(PoisonError::into_inner);
        state.live == 0
    }
}

/// Retires a worker that dies inside a task.
struct LiveGuard {
    shared: Arc<Shared>,
    retired: bool,
}

impl Drop for LiveGuard {
    fn drop(&mut self) {
        if !self.retired {
            let mut state = self.shared.lock();
            self.shared.retire(&mut state);
        }
    }
}

fn worker_loop(shared: Arc<Shared>, worker_id: usize) {
    let mut guard = LiveGuard {
        shared,
        retired: false,
    };
    let shared = guard.shared.clone();
    debug!(pool = %shared.config.name, worker_id, "worker started");

    while let Some(task) = next_task(&shared) {
        task();
    }
    guard.retired = true;

    debug!(pool = %shared.config.name, worker_id, "worker exiting");
}

/// Block for the next task. Returns `None` once the worker has retired.
fn next_task(shared: &Shared) -> Option<Task> {
    let mut state = shared.lock();
    loop {
        if let Some(task) = state.tasks.pop_front() {
            return Some(task);
        }
        if state.shutdown {
            shared.retire(&mut state);
            return None;
        }

        state.idle += 1;
        let (next, timeout) = shared
            .work
            .wait_timeout(state, shared.config.keep_alive)
            .unwrap_or_else(PoisonError::into_inner);
        state = next;
        state.idle -= 1;

        if timeout.timed_out() && state.tasks.is_empty() {
            shared.retire(&mut state);
            return None;
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Workers hold their own reference to the shared state; tell them to
        // finish the queue and exit instead of idling out.
        let mut state = self.shared.lock();
        state.shutdown = true;
        self.shared.work.notify_all();
    }
}

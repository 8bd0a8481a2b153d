//! Pending queue and drain activation.
//!
//! The queue and the "drain active" flag share one mutex. The drain loop
//! clears the flag in the same critical section in which it finds the queue
//! empty, so a job enqueued afterwards always sees the flag cleared.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use dirsync_core::JobId;

#[derive(Debug, Default)]
struct QueueState {
    pending: VecDeque<JobId>,
    active: bool,
}

/// FIFO of jobs awaiting execution.
#[derive(Debug, Default)]
pub struct PendingQueue {
    state: Mutex<QueueState>,
}

impl PendingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a job.
    pub fn enqueue(&self, id: JobId) {
        self.lock().pending.push_back(id);
    }

    /// Append several jobs, keeping their order.
    pub fn enqueue_all(&self, ids: impl IntoIterator<Item = JobId>) {
        self.lock().pending.extend(ids);
    }

    /// Set the active flag unless a drain is already running.
    ///
    /// Returns `true` when the caller has won activation and must schedule
    /// exactly one drain.
    pub fn try_activate(&self) -> bool {
        let mut state = self.lock();
        if state.active {
            false
        } else {
            state.active = true;
            true
        }
    }

    /// Clear the active flag after a drain could not be scheduled.
    pub fn deactivate(&self) {
        self.lock().active = false;
    }

    /// Pop the next job, or clear the active flag if there is none.
    ///
    /// Only the drain loop calls this.
    pub fn pop_or_deactivate(&self) -> Option<JobId> {
        let mut state = self.lock();
        let next = state.pending.pop_front();
        if next.is_none() {
            state.active = false;
        }
        next
    }

    pub fn is_active(&self) -> bool {
        self.lock().active
    }

    pub fn len(&self) -> usize {
        self.lock().pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;
    use std::thread;

    use super::*;

    fn id(n: u64) -> JobId {
        JobId::from_u64(n)
    }

    #[test]
    fn fifo_order() {
        let queue = PendingQueue::new();
        queue.enqueue(id(1));
        queue.enqueue_all([id(2), id(3)]);

        assert_eq!(queue.len(), 3);
        assert_eq!(queue.pop_or_deactivate(), Some(id(1)));
        assert_eq!(queue.pop_or_deactivate(), Some(id(2)));
        assert_eq!(queue.pop_or_deactivate(), Some(id(3)));
        assert_eq!(queue.pop_or_deactivate(), None);
    }

    #[test]
    fn activation_is_idempotent() {
        let queue = PendingQueue::new();
        assert!(!queue.is_active());

        assert!(queue.try_activate());
        assert!(!queue.try_activate());
        assert!(queue.is_active());
    }

    #[test]
    fn empty_pop_clears_flag_and_allows_reactivation() {
        let queue = PendingQueue::new();
        queue.enqueue(id(1));
        assert!(queue.try_activate());

        assert_eq!(queue.pop_or_deactivate(), Some(id(1)));
        assert!(queue.is_active());

        assert_eq!(queue.pop_or_deactivate(), None);
        assert!(!queue.is_active());

        queue.enqueue(id(2));
        assert!(queue.try_activate());
    }

    #[test]
    fn deactivate_resets_flag() {
        let queue = PendingQueue::new();
        assert!(queue.try_activate());
        queue.deactivate();
        assert!(queue.try_activate());
    }

    #[test]
    fn concurrent_activation_has_one_winner() {
        let queue = Arc::new(PendingQueue::new());
        let winners = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(Barrier::new(16));

        let handles: Vec<_> = (0..16)
            .map(|n| {
                let queue = queue.clone();
                let winners = winners.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    queue.enqueue(id(n));
                    barrier.wait();
                    if queue.try_activate() {
                        winners.fetch_add(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(winners.load(Ordering::SeqCst), 1);
        assert_eq!(queue.len(), 16);
    }
}

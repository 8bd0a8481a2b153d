//! The drain loop: runs queued jobs one at a time.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, error, info};

use dirsync_core::{JobId, SyncError, SyncRequests, SyncSummary};

use super::queue::PendingQueue;
use super::store::JobStore;
use super::synchronizer::DirectorySynchronizer;

/// Why a job ended in `Error`.
#[derive(Debug, Error)]
pub enum ExecutionFailure {
    #[error(transparent)]
    Sync(#[from] SyncError),
    #[error("synchronizer panicked: {0}")]
    Panic(String),
}

/// Drain loop runtime statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct DrainStats {
    /// Drain loops scheduled
    pub activations: u64,
    pub jobs_completed: u64,
    pub jobs_failed: u64,
    /// Jobs deleted before they were dequeued
    pub jobs_skipped: u64,
}

impl DrainStats {
    pub fn jobs_processed(&self) -> u64 {
        self.jobs_completed + self.jobs_failed
    }
}

#[derive(Debug, Default)]
pub(crate) struct DrainCounters {
    activations: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    skipped: AtomicU64,
}

impl DrainCounters {
    pub(crate) fn record_activation(&self) {
        self.activations.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> DrainStats {
        DrainStats {
            activations: self.activations.load(Ordering::Relaxed),
            jobs_completed: self.completed.load(Ordering::Relaxed),
            jobs_failed: self.failed.load(Ordering::Relaxed),
            jobs_skipped: self.skipped.load(Ordering::Relaxed),
        }
    }
}

/// State shared between the job service and its drain loop.
pub(crate) struct JobEngine {
    pub(crate) store: Arc<dyn JobStore>,
    pub(crate) queue: PendingQueue,
    pub(crate) synchronizer: Arc<dyn DirectorySynchronizer>,
    pub(crate) counters: DrainCounters,
}

impl JobEngine {
    /// Run queued jobs until the queue is empty.
    ///
    /// Must only be entered by whoever won [`PendingQueue::try_activate`].
    /// Exits with the active flag cleared.
    pub(crate) fn drain(&self) {
        debug!("drain loop started");
        let mut processed = 0u64;

        while let Some(id) = self.queue.pop_or_deactivate() {
            self.run_job(id);
            processed += 1;
        }

        debug!(processed, "drain loop idle");
    }

    fn run_job(&self, id: JobId) {
        let mut specs = None;
        self.store.update(id, &mut |job| {
            job.mark_running(now_ms());
            specs = Some(job.specs.clone());
        });

        let Some(specs) = specs else {
            self.counters.skipped.fetch_add(1, Ordering::Relaxed);
            debug!(job_id = %id, "job deleted before it ran; skipping");
            return;
        };

        info!(job_id = %id, specs = specs.len(), "running directory sync");
        let requests = SyncRequests::from_specs(&specs);

        let recorded = match self.execute(&requests) {
            Ok(summary) => {
                self.counters.completed.fetch_add(1, Ordering::Relaxed);
                info!(
                    job_id = %id,
                    users_created = summary.users.created,
                    groups_created = summary.groups.created,
                    memberships_created = summary.memberships.created,
                    "directory sync completed"
                );
                self.store
                    .update(id, &mut |job| job.mark_complete(summary, now_ms()))
            }
            Err(failure) => {
                self.counters.failed.fetch_add(1, Ordering::Relaxed);
                error!(job_id = %id, error = %failure, "directory sync failed");
                let cause = failure.to_string();
                self.store
                    .update(id, &mut |job| job.mark_failed(&cause, now_ms()))
            }
        };

        if !recorded {
            debug!(job_id = %id, "job deleted while running; result discarded");
        }
    }

    /// Invoke the synchronizer for a job's requests.
    ///
    /// A job without requests completes without calling it.
    fn execute(&self, requests: &SyncRequests) -> Result<SyncSummary, ExecutionFailure> {
        if requests.is_empty() {
            return Ok(SyncSummary::default());
        }

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            self.synchronizer
                .synchronize(requests.users.as_ref(), requests.groups.as_ref())
        }));

        match outcome {
            Ok(Ok(batch)) => Ok(batch.summary()),
            Ok(Err(e)) => Err(e.into()),
            Err(payload) => Err(ExecutionFailure::Panic(panic_message(payload.as_ref()))),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use dirsync_core::{PrincipalType, SyncBatch, SyncRequest, SyncSpec, SyncType};

    use super::*;
    use crate::store::InMemoryJobStore;
    use crate::types::{COMPLETE_DETAIL, JobStatus};

    type Calls = Vec<(Option<SyncRequest>, Option<SyncRequest>)>;

    /// Records every call and returns a fixed batch or error.
    struct RecordingSynchronizer {
        calls: Mutex<Calls>,
        result: Result<SyncBatch, SyncError>,
    }

    impl RecordingSynchronizer {
        fn returning(result: Result<SyncBatch, SyncError>) -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(Vec::new()),
                result,
            })
        }

        fn calls(&self) -> Calls {
            self.calls.lock().unwrap().clone()
        }
    }

    impl DirectorySynchronizer for RecordingSynchronizer {
        fn synchronize(
            &self,
            users: Option<&SyncRequest>,
            groups: Option<&SyncRequest>,
        ) -> Result<SyncBatch, SyncError> {
            self.calls
                .lock()
                .unwrap()
                .push((users.cloned(), groups.cloned()));
            self.result.clone()
        }
    }

    struct PanickingSynchronizer;

    impl DirectorySynchronizer for PanickingSynchronizer {
        fn synchronize(
            &self,
            _users: Option<&SyncRequest>,
            _groups: Option<&SyncRequest>,
        ) -> Result<SyncBatch, SyncError> {
            panic!("directory exploded")
        }
    }

    fn engine(synchronizer: Arc<dyn DirectorySynchronizer>) -> (JobEngine, Arc<InMemoryJobStore>) {
        let store = InMemoryJobStore::arc();
        let engine = JobEngine {
            store: store.clone(),
            queue: PendingQueue::new(),
            synchronizer,
            counters: DrainCounters::default(),
        };
        (engine, store)
    }

    fn submit(engine: &JobEngine, specs: Vec<SyncSpec>) -> JobId {
        let id = engine.store.insert(specs);
        engine.queue.enqueue(id);
        id
    }

    #[test]
    fn drains_queue_and_clears_flag() {
        let sync = RecordingSynchronizer::returning(Ok(SyncBatch {
            users_to_create: vec!["alice".into()],
            ..Default::default()
        }));
        let (engine, store) = engine(sync.clone());

        let a = submit(&engine, vec![SyncSpec::all(PrincipalType::Users)]);
        let b = submit(&engine, vec![SyncSpec::existing(PrincipalType::Groups)]);
        assert!(engine.queue.try_activate());

        engine.drain();

        assert!(!engine.queue.is_active());
        for id in [a, b] {
            let job = store.get(id).unwrap();
            assert_eq!(job.status, JobStatus::Complete);
            assert_eq!(job.status_detail, COMPLETE_DETAIL);
            assert_eq!(job.summary.users.created, 1);
            assert!(job.start_time.unwrap() <= job.end_time.unwrap());
        }
        assert_eq!(sync.calls().len(), 2);
        assert_eq!(engine.counters.snapshot().jobs_completed, 2);
    }

    #[test]
    fn aggregates_specs_into_one_call() {
        let sync = RecordingSynchronizer::returning(Ok(SyncBatch::default()));
        let (engine, _store) = engine(sync.clone());

        submit(
            &engine,
            vec![
                SyncSpec::from_properties([
                    ("principal_type", "users"),
                    ("sync_type", "specific"),
                    ("names", "alice, bob"),
                ])
                .unwrap(),
                SyncSpec::all(PrincipalType::Groups),
            ],
        );
        engine.queue.try_activate();
        engine.drain();

        let calls = sync.calls();
        assert_eq!(calls.len(), 1);
        let (users, groups) = &calls[0];
        assert_eq!(users.as_ref(), Some(&SyncRequest::specific(["alice", "bob"])));
        assert_eq!(groups.as_ref().map(SyncRequest::sync_type), Some(SyncType::All));
    }

    #[test]
    fn job_without_specs_completes_without_calling_synchronizer() {
        let sync = RecordingSynchronizer::returning(Ok(SyncBatch::default()));
        let (engine, store) = engine(sync.clone());

        let id = submit(&engine, Vec::new());
        engine.queue.try_activate();
        engine.drain();

        let job = store.get(id).unwrap();
        assert_eq!(job.status, JobStatus::Complete);
        assert!(job.summary.is_zero());
        assert!(sync.calls().is_empty());
    }

    #[test]
    fn failure_is_recorded_and_loop_continues() {
        let sync = RecordingSynchronizer::returning(Err(SyncError::unavailable("ldap://dc1 timed out")));
        let (engine, store) = engine(sync);

        let a = submit(&engine, vec![SyncSpec::all(PrincipalType::Users)]);
        let b = submit(&engine, vec![SyncSpec::all(PrincipalType::Groups)]);
        engine.queue.try_activate();
        engine.drain();

        for id in [a, b] {
            let job = store.get(id).unwrap();
            assert_eq!(job.status, JobStatus::Error);
            assert!(job.status_detail.contains("ldap://dc1 timed out"));
            assert!(job.end_time.is_some());
            assert!(job.summary.is_zero());
        }
        assert_eq!(engine.counters.snapshot().jobs_failed, 2);
    }

    #[test]
    fn panic_in_synchronizer_becomes_error() {
        let (engine, store) = engine(Arc::new(PanickingSynchronizer));

        let id = submit(&engine, vec![SyncSpec::all(PrincipalType::Users)]);
        engine.queue.try_activate();
        engine.drain();

        let job = store.get(id).unwrap();
        assert_eq!(job.status, JobStatus::Error);
        assert!(job.status_detail.contains("directory exploded"));
        assert!(!engine.queue.is_active());
    }

    #[test]
    fn job_deleted_while_pending_is_skipped() {
        let sync = RecordingSynchronizer::returning(Ok(SyncBatch::default()));
        let (engine, store) = engine(sync.clone());

        let id = submit(&engine, vec![SyncSpec::all(PrincipalType::Users)]);
        store.remove_matching(&|job| job.id == id);
        engine.queue.try_activate();
        engine.drain();

        assert!(sync.calls().is_empty());
        assert!(store.get(id).is_none());
        assert_eq!(engine.counters.snapshot().jobs_skipped, 1);
    }
}

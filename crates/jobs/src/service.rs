//! Job service: submit, list and delete sync jobs.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, error, info};

use dirsync_core::{JobId, SpecError, SyncSpec};

use super::context::ExecutionContext;
use super::executor::{DrainCounters, DrainStats, JobEngine};
use super::pool::PoolError;
use super::queue::PendingQueue;
use super::store::{InMemoryJobStore, JobStore};
use super::synchronizer::DirectorySynchronizer;
use super::types::SyncJob;

/// Raw spec properties: `principal_type`, `sync_type` and optional `names`.
pub type SpecProperties = BTreeMap<String, String>;

#[derive(Debug, Error)]
pub enum SubmitError {
    /// A spec of the job at `job` (0-based) was malformed. Nothing was queued.
    #[error("job {job}: {source}")]
    InvalidSpec {
        job: usize,
        #[source]
        source: SpecError,
    },
    /// Jobs `ids` were created and queued, but no drain loop could be
    /// scheduled. They run on the next successful submission.
    #[error("queued {} job(s) but could not schedule drain loop: {source}", .ids.len())]
    Schedule {
        ids: Vec<JobId>,
        #[source]
        source: PoolError,
    },
}

/// Accepts sync jobs and runs them, one at a time, on the context's pool.
#[derive(Clone)]
pub struct SyncJobService {
    context: Arc<ExecutionContext>,
    engine: Arc<JobEngine>,
}

impl SyncJobService {
    /// Service backed by an in-memory store.
    pub fn new<S>(context: Arc<ExecutionContext>, synchronizer: S) -> Self
    where
        S: DirectorySynchronizer,
    {
        Self::with_store(context, InMemoryJobStore::new(), synchronizer)
    }

    pub fn with_store<St, S>(context: Arc<ExecutionContext>, store: St, synchronizer: S) -> Self
    where
        St: JobStore + 'static,
        S: DirectorySynchronizer,
    {
        Self {
            context,
            engine: Arc::new(JobEngine {
                store: Arc::new(store),
                queue: PendingQueue::new(),
                synchronizer: Arc::new(synchronizer),
                counters: DrainCounters::default(),
            }),
        }
    }

    /// Create one job per entry and queue them in order.
    ///
    /// Every job is visible through [`list`](Self::list) as soon as this
    /// returns, whether or not it has run.
    pub fn submit(&self, jobs: Vec<Vec<SyncSpec>>) -> Result<Vec<JobId>, SubmitError> {
        let ids: Vec<JobId> = jobs
            .into_iter()
            .map(|specs| self.engine.store.insert(specs))
            .collect();

        self.engine.queue.enqueue_all(ids.iter().copied());
        debug!(jobs = ids.len(), "queued sync jobs");

        match self.ensure_draining() {
            Ok(()) => Ok(ids),
            Err(source) => Err(SubmitError::Schedule { ids, source }),
        }
    }

    /// Like [`submit`](Self::submit), with specs given as raw properties.
    ///
    /// All jobs are validated before any is created.
    pub fn submit_properties(
        &self,
        jobs: Vec<Vec<SpecProperties>>,
    ) -> Result<Vec<JobId>, SubmitError> {
        let parsed = jobs
            .iter()
            .enumerate()
            .map(|(job, specs)| {
                specs
                    .iter()
                    .map(SyncSpec::from_properties)
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(|source| SubmitError::InvalidSpec { job, source })
            })
            .collect::<Result<Vec<_>, _>>()?;

        self.submit(parsed)
    }

    /// Snapshot of every job, ordered by id.
    pub fn list(&self) -> Vec<SyncJob> {
        self.engine.store.list()
    }

    pub fn get(&self, id: JobId) -> Option<SyncJob> {
        self.engine.store.get(id)
    }

    /// Delete the jobs matching `predicate`, or every job if there is none.
    ///
    /// Running jobs are not interrupted; their results are discarded.
    pub fn delete(&self, predicate: Option<&dyn Fn(&SyncJob) -> bool>) -> usize {
        let removed = match predicate {
            Some(predicate) => self.engine.store.remove_matching(predicate),
            None => self.engine.store.remove_matching(&|_| true),
        };
        info!(removed = removed.len(), "deleted sync jobs");
        removed.len()
    }

    /// Whether a drain loop is currently scheduled or running.
    pub fn is_draining(&self) -> bool {
        self.engine.queue.is_active()
    }

    /// Jobs waiting to be picked up by the drain loop.
    pub fn pending(&self) -> usize {
        self.engine.queue.len()
    }

    pub fn stats(&self) -> DrainStats {
        self.engine.counters.snapshot()
    }

    /// Poll until the queue is empty and no drain loop is active.
    ///
    /// Returns `false` if that did not happen within `timeout`.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if !self.is_draining() && self.engine.queue.is_empty() {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(Duration::from_millis(5));
        }
    }

    /// Schedule a drain loop unless one is already active.
    fn ensure_draining(&self) -> Result<(), PoolError> {
        if !self.engine.queue.try_activate() {
            return Ok(());
        }

        self.engine.counters.record_activation();
        let engine = self.engine.clone();
        if let Err(e) = self.context.pool().execute(move || engine.drain()) {
            self.engine.queue.deactivate();
            error!(error = %e, "failed to schedule drain loop");
            return Err(e);
        }
        Ok(())
    }
}

impl std::fmt::Debug for SyncJobService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncJobService")
            .field("pending", &self.pending())
            .field("draining", &self.is_draining())
            .field("stats", &self.stats())
            .finish()
    }
}

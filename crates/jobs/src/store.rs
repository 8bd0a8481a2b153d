//! Job storage.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use dirsync_core::{JobId, JobIdGenerator, SyncSpec};

use super::types::SyncJob;

/// Job store abstraction.
///
/// The store owns the authoritative copy of every job. Callers only ever see
/// snapshots; mutation goes through [`JobStore::update`], which applies a
/// whole transition at once.
pub trait JobStore: Send + Sync {
    /// Create a pending job and return its freshly assigned id.
    fn insert(&self, specs: Vec<SyncSpec>) -> JobId;

    /// Snapshot of one job.
    fn get(&self, id: JobId) -> Option<SyncJob>;

    /// Snapshot of every job, ordered by id.
    fn list(&self) -> Vec<SyncJob>;

    /// Apply `apply` to the job, if it is still present.
    ///
    /// Returns `false` when the job has been removed; nothing is changed then.
    fn update(&self, id: JobId, apply: &mut dyn FnMut(&mut SyncJob)) -> bool;

    /// Remove every job the filter matches and return their ids.
    ///
    /// The filter sees snapshots and runs with no store lock held, so it may
    /// call back into the store. Jobs removed concurrently are not reported.
    fn remove_matching(&self, filter: &dyn Fn(&SyncJob) -> bool) -> Vec<JobId>;
}

impl<S> JobStore for Arc<S>
where
    S: JobStore + ?Sized,
{
    fn insert(&self, specs: Vec<SyncSpec>) -> JobId {
        (**self).insert(specs)
    }

    fn get(&self, id: JobId) -> Option<SyncJob> {
        (**self).get(id)
    }

    fn list(&self) -> Vec<SyncJob> {
        (**self).list()
    }

    fn update(&self, id: JobId, apply: &mut dyn FnMut(&mut SyncJob)) -> bool {
        (**self).update(id, apply)
    }

    fn remove_matching(&self, filter: &dyn Fn(&SyncJob) -> bool) -> Vec<JobId> {
        (**self).remove_matching(filter)
    }
}

type JobCell = Arc<RwLock<SyncJob>>;

/// In-memory job store.
///
/// The map lock is only taken exclusively to insert or remove jobs; updating
/// a job shares the map and locks just that job. Deletion filters run on a
/// snapshot, outside every lock. Locks are always taken map
/// first, then job.
#[derive(Debug, Default)]
pub struct InMemoryJobStore {
    ids: JobIdGenerator,
    jobs: RwLock<BTreeMap<JobId, JobCell>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    pub fn len(&self) -> usize {
        read(&self.jobs).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl JobStore for InMemoryJobStore {
    fn insert(&self, specs: Vec<SyncSpec>) -> JobId {
        let mut jobs = write(&self.jobs);
        let id = self.ids.next_id();
        jobs.insert(id, Arc::new(RwLock::new(SyncJob::new(id, specs))));
        id
    }

    fn get(&self, id: JobId) -> Option<SyncJob> {
        let jobs = read(&self.jobs);
        jobs.get(&id).map(|cell| read(cell).clone())
    }

    fn list(&self) -> Vec<SyncJob> {
        let jobs = read(&self.jobs);
        jobs.values().map(|cell| read(cell).clone()).collect()
    }

    fn update(&self, id: JobId, apply: &mut dyn FnMut(&mut SyncJob)) -> bool {
        let jobs = read(&self.jobs);
        match jobs.get(&id) {
            Some(cell) => {
                let mut job = write(cell);
                apply(&mut *job);
                true
            }
            None => false,
        }
    }

    fn remove_matching(&self, filter: &dyn Fn(&SyncJob) -> bool) -> Vec<JobId> {
        let matched: Vec<JobId> = self
            .list()
            .into_iter()
            .filter(|job| filter(job))
            .map(|job| job.id)
            .collect();

        let mut jobs = write(&self.jobs);
        matched
            .into_iter()
            .filter(|id| jobs.remove(id).is_some())
            .collect()
    }
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

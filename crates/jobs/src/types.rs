//! Sync job record and its lifecycle.

use serde::{Deserialize, Serialize};

use dirsync_core::{JobId, SyncSpec, SyncSummary};

pub const PENDING_DETAIL: &str = "Queued for directory sync.";
pub const RUNNING_DETAIL: &str = "Running directory sync.";
pub const COMPLETE_DETAIL: &str = "Completed directory sync.";
pub const ERROR_DETAIL_PREFIX: &str = "Directory sync failed:";

/// Job execution status.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JobStatus {
    /// Queued, waiting for the drain loop
    Pending,
    /// Synchronizer call in progress
    Running,
    /// Synchronizer returned a batch
    Complete,
    /// Synchronizer failed
    Error,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Complete | JobStatus::Error)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "PENDING",
            JobStatus::Running => "RUNNING",
            JobStatus::Complete => "COMPLETE",
            JobStatus::Error => "ERROR",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A directory sync job.
///
/// Timestamps are epoch milliseconds. `end_time` is set exactly when the job
/// has left `Running`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncJob {
    pub id: JobId,
    pub status: JobStatus,
    pub status_detail: String,
    pub start_time: Option<i64>,
    pub end_time: Option<i64>,
    pub specs: Vec<SyncSpec>,
    pub summary: SyncSummary,
}

impl SyncJob {
    /// Create a pending job.
    pub fn new(id: JobId, specs: Vec<SyncSpec>) -> Self {
        Self {
            id,
            status: JobStatus::Pending,
            status_detail: PENDING_DETAIL.to_string(),
            start_time: None,
            end_time: None,
            specs,
            summary: SyncSummary::default(),
        }
    }

    /// Mark job as running.
    pub fn mark_running(&mut self, now_ms: i64) {
        self.status = JobStatus::Running;
        self.status_detail = RUNNING_DETAIL.to_string();
        self.start_time = Some(now_ms);
    }

    /// Mark job as complete with the synchronizer's counts.
    pub fn mark_complete(&mut self, summary: SyncSummary, now_ms: i64) {
        self.summary = summary;
        self.status = JobStatus::Complete;
        self.status_detail = COMPLETE_DETAIL.to_string();
        self.end_time = Some(now_ms);
    }

    /// Mark job as failed. Counters are left untouched.
    pub fn mark_failed(&mut self, cause: &str, now_ms: i64) {
        self.status = JobStatus::Error;
        self.status_detail = format!("{ERROR_DETAIL_PREFIX} {cause}");
        self.end_time = Some(now_ms);
    }
}

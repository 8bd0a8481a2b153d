//! `dirsync` command: run sync jobs from a JSON file and print the results.
//!
//! The input is an array of jobs, each an array of spec property maps:
//!
//! ```json
//! [
//!   [{"principal_type": "users", "sync_type": "specific", "names": "alice,bob"}],
//!   [{"principal_type": "groups", "sync_type": "all"}]
//! ]
//! ```

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use tracing::info;

use dirsync_core::{SyncBatch, SyncError, SyncRequest, SyncType};
use dirsync_jobs::{DirectorySynchronizer, ExecutionContext, SpecProperties, SyncJob, SyncJobService};

/// How long to wait for submitted jobs to finish.
pub const WAIT_TIMEOUT: Duration = Duration::from_secs(60);

/// Synchronizer that talks to no directory.
///
/// Explicitly named principals are reported as to-create; `all` and
/// `existing` requests produce nothing. A `specific` request without names
/// is rejected.
#[derive(Debug, Default, Clone, Copy)]
pub struct DryRunSynchronizer;

fn named(kind: &str, request: Option<&SyncRequest>) -> Result<Vec<String>, SyncError> {
    match request {
        Some(request) if request.sync_type() == SyncType::Specific => {
            if request.principal_names().is_empty() {
                return Err(SyncError::invalid_request(format!(
                    "specific {kind} sync names no principals"
                )));
            }
            Ok(request.principal_names().iter().cloned().collect())
        }
        _ => Ok(Vec::new()),
    }
}

impl DirectorySynchronizer for DryRunSynchronizer {
    fn synchronize(
        &self,
        users: Option<&SyncRequest>,
        groups: Option<&SyncRequest>,
    ) -> Result<SyncBatch, SyncError> {
        Ok(SyncBatch {
            users_to_create: named("users", users)?,
            groups_to_create: named("groups", groups)?,
            ..Default::default()
        })
    }
}

pub fn parse_jobs(input: &str) -> anyhow::Result<Vec<Vec<SpecProperties>>> {
    serde_json::from_str(input).context("job file must be an array of arrays of spec objects")
}

/// Submit `jobs`, wait for them to finish and return the final listing.
pub fn run_jobs(
    context: Arc<ExecutionContext>,
    jobs: Vec<Vec<SpecProperties>>,
) -> anyhow::Result<Vec<SyncJob>> {
    let service = SyncJobService::new(context, DryRunSynchronizer);

    let ids = service.submit_properties(jobs).context("failed to submit jobs")?;
    info!(jobs = ids.len(), "submitted sync jobs");

    if !service.wait_idle(WAIT_TIMEOUT) {
        bail!("jobs did not finish within {}s", WAIT_TIMEOUT.as_secs());
    }
    Ok(service.list())
}

/// Read the job file at `path`, run it and return the listing as pretty JSON.
pub fn run_file(context: Arc<ExecutionContext>, path: &Path) -> anyhow::Result<String> {
    let input = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let jobs = parse_jobs(&input)?;
    let listing = run_jobs(context, jobs)?;
    Ok(serde_json::to_string_pretty(&listing)?)
}

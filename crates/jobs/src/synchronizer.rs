//! The directory synchronizer seam.

use std::sync::Arc;

use dirsync_core::{SyncBatch, SyncError, SyncRequest};

/// Computes and applies the changes needed to bring local users, groups and
/// memberships in line with the directory.
///
/// Called from the drain loop, one job at a time. Either request may be
/// absent, but never both.
pub trait DirectorySynchronizer: Send + Sync + 'static {
    fn synchronize(
        &self,
        users: Option<&SyncRequest>,
        groups: Option<&SyncRequest>,
    ) -> Result<SyncBatch, SyncError>;
}

impl<S> DirectorySynchronizer for Arc<S>
where
    S: DirectorySynchronizer + ?Sized,
{
    fn synchronize(
        &self,
        users: Option<&SyncRequest>,
        groups: Option<&SyncRequest>,
    ) -> Result<SyncBatch, SyncError> {
        (**self).synchronize(users, groups)
    }
}

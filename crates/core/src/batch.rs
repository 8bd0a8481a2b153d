//! Synchronizer output and the per-job summary derived from it.

use serde::{Deserialize, Serialize};

/// A user's membership in a group.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Membership {
    pub group: String,
    pub user: String,
}

impl Membership {
    pub fn new(group: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            user: user.into(),
        }
    }
}

/// Changes computed by one synchronization run.
///
/// Each collection is disjoint from the others of the same principal kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncBatch {
    pub users_to_create: Vec<String>,
    /// Local users that become directory-managed.
    pub users_to_become_managed: Vec<String>,
    pub users_to_remove: Vec<String>,
    pub groups_to_create: Vec<String>,
    pub groups_to_become_managed: Vec<String>,
    pub groups_to_remove: Vec<String>,
    pub memberships_to_add: Vec<Membership>,
    pub memberships_to_remove: Vec<Membership>,
}

impl SyncBatch {
    pub fn summary(&self) -> SyncSummary {
        SyncSummary {
            users: PrincipalCounts {
                created: self.users_to_create.len() as u64,
                updated: self.users_to_become_managed.len() as u64,
                removed: self.users_to_remove.len() as u64,
            },
            groups: PrincipalCounts {
                created: self.groups_to_create.len() as u64,
                updated: self.groups_to_become_managed.len() as u64,
                removed: self.groups_to_remove.len() as u64,
            },
            memberships: MembershipCounts {
                created: self.memberships_to_add.len() as u64,
                removed: self.memberships_to_remove.len() as u64,
            },
        }
    }
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrincipalCounts {
    pub created: u64,
    pub updated: u64,
    pub removed: u64,
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipCounts {
    pub created: u64,
    pub removed: u64,
}

/// Result counters recorded on a job. All zero until the job completes.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSummary {
    pub users: PrincipalCounts,
    pub groups: PrincipalCounts,
    pub memberships: MembershipCounts,
}

impl SyncSummary {
    pub fn is_zero(&self) -> bool {
        *self == Self::default()
    }
}

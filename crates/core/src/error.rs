//! Domain error model.

use thiserror::Error;

/// Result type used when constructing sync specifications.
pub type SpecResult<T> = Result<T, SpecError>;

/// A sync specification could not be constructed.
///
/// These are rejected synchronously, before a job is created or queued.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SpecError {
    /// A spec key other than `principal_type`, `sync_type` or `names`.
    #[error("unknown spec key {0}")]
    UnknownKey(String),

    /// The spec did not name both a principal type and a sync type.
    #[error("sync spec must include both sync_type and principal_type")]
    MissingField,

    #[error("invalid principal type: {0}")]
    InvalidPrincipalType(String),

    #[error("invalid sync type: {0}")]
    InvalidSyncType(String),
}

/// Failure reported by a directory synchronizer.
///
/// Always captured on the job record; never propagated to submitters.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// The directory could not be reached or queried.
    #[error("directory unavailable: {0}")]
    Unavailable(String),

    /// The request was rejected by the synchronizer.
    #[error("invalid sync request: {0}")]
    InvalidRequest(String),
}

impl SyncError {
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }
}

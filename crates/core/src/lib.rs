//! `dirsync-core`: directory sync domain types.
//!
//! This crate contains **pure domain** primitives: job ids, sync specs, the
//! requests they fold into and the batch results a synchronizer returns.

pub mod batch;
pub mod error;
pub mod id;
pub mod request;
pub mod spec;

pub use batch::{Membership, MembershipCounts, PrincipalCounts, SyncBatch, SyncSummary};
pub use error::{SpecError, SpecResult, SyncError};
pub use id::{JobId, JobIdGenerator};
pub use request::{SyncRequest, SyncRequests};
pub use spec::{PrincipalType, SyncSpec, SyncType};

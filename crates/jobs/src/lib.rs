//! Directory sync job queue.
//!
//! ## Design
//!
//! - Jobs are created `Pending` and queued in submission order
//! - A single drain loop runs them one at a time on a shared worker pool
//! - The drain loop is started on demand and stops when the queue is empty
//! - Failures are recorded on the job; they never reach the submitter
//!
//! ## Components
//!
//! - `JobStore`: authoritative job records (in-memory)
//! - `PendingQueue`: FIFO of queued jobs plus the drain activation flag
//! - `WorkerPool`: bounded threads with idle shutdown, owned by an `ExecutionContext`
//! - `SyncJobService`: submission, listing, deletion

pub mod config;
pub mod context;
pub mod executor;
pub mod pool;
pub mod queue;
pub mod service;
pub mod store;
pub mod synchronizer;
pub mod types;

pub use config::{ConfigError, WorkerPoolConfig};
pub use context::ExecutionContext;
pub use executor::{DrainStats, ExecutionFailure};
pub use pool::{PoolError, PoolStats, WorkerPool};
pub use queue::PendingQueue;
pub use service::{SpecProperties, SubmitError, SyncJobService};
pub use store::{InMemoryJobStore, JobStore};
pub use synchronizer::DirectorySynchronizer;
pub use types::{JobStatus, SyncJob};

//! Process-scoped execution context.

use std::sync::{Arc, OnceLock};

use tracing::info;

use crate::config::{ConfigError, WorkerPoolConfig};
use crate::pool::WorkerPool;

/// Owns the worker pool shared by every job service in the process.
///
/// Build one at startup and hand out `Arc` clones. The pool itself is only
/// created when the first task is scheduled, and never more than once.
#[derive(Debug)]
pub struct ExecutionContext {
    config: WorkerPoolConfig,
    pool: OnceLock<WorkerPool>,
}

impl ExecutionContext {
    pub fn new(config: WorkerPoolConfig) -> Result<Arc<Self>, ConfigError> {
        config.validate()?;
        Ok(Arc::new(Self {
            config,
            pool: OnceLock::new(),
        }))
    }

    pub fn from_env() -> Result<Arc<Self>, ConfigError> {
        Self::new(WorkerPoolConfig::from_env()?)
    }

    /// The worker pool, created on first call.
    pub fn pool(&self) -> &WorkerPool {
        self.pool.get_or_init(|| {
            info!(
                pool = %self.config.name,
                core_threads = self.config.core_threads,
                max_threads = self.config.max_threads,
                keep_alive_ms = self.config.keep_alive.as_millis() as u64,
                "creating worker pool"
            );
            WorkerPool::new(self.config.clone())
        })
    }

    /// Whether the pool has been created yet.
    pub fn pool_created(&self) -> bool {
        self.pool.get().is_some()
    }

    /// Shut down the pool if it was ever created.
    pub fn shutdown(&self) {
        if let Some(pool) = self.pool.get() {
            pool.shutdown();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    #[test]
    fn pool_is_created_lazily_and_once() {
        let context = ExecutionContext::new(WorkerPoolConfig::default()).unwrap();
        assert!(!context.pool_created());

        let pools: Vec<usize> = (0..8)
            .map(|_| {
                let context = context.clone();
                thread::spawn(move || context.pool() as *const WorkerPool as usize)
            })
            .collect::<Vec<_>>()
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .collect();

        assert!(context.pool_created());
        assert!(pools.windows(2).all(|w| w[0] == w[1]));
    }

    #[test]
    fn rejects_invalid_config() {
        let config = WorkerPoolConfig::default().with_core_threads(3).with_max_threads(1);
        assert!(matches!(
            ExecutionContext::new(config),
            Err(ConfigError::CoreExceedsMax { core: 3, max: 1 })
        ));
    }
}

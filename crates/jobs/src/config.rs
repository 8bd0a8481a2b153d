//! Worker pool configuration.

use std::time::Duration;

use thiserror::Error;

pub const CORE_THREADS_ENV: &str = "DIRSYNC_POOL_CORE_THREADS";
pub const MAX_THREADS_ENV: &str = "DIRSYNC_POOL_MAX_THREADS";
pub const KEEP_ALIVE_MS_ENV: &str = "DIRSYNC_POOL_KEEP_ALIVE_MS";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{key} must be an unsigned integer, got {value:?}")]
    InvalidNumber { key: &'static str, value: String },
    #[error("core thread count must be at least 1")]
    NoCoreThreads,
    #[error("core thread count ({core}) exceeds max thread count ({max})")]
    CoreExceedsMax { core: usize, max: usize },
}

/// Worker pool configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerPoolConfig {
    /// Threads the pool spawns before it starts reusing idle ones
    pub core_threads: usize,
    /// Upper bound on live threads
    pub max_threads: usize,
    /// How long an idle thread waits for work before exiting
    pub keep_alive: Duration,
    /// Thread name prefix for logging
    pub name: String,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            core_threads: 2,
            max_threads: 5,
            keep_alive: Duration::from_millis(1000),
            name: "dirsync-worker".to_string(),
        }
    }
}

impl WorkerPoolConfig {
    pub fn with_core_threads(mut self, core_threads: usize) -> Self {
        self.core_threads = core_threads;
        self
    }

    pub fn with_max_threads(mut self, max_threads: usize) -> Self {
        self.max_threads = max_threads;
        self
    }

    pub fn with_keep_alive(mut self, keep_alive: Duration) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Defaults overridden by `DIRSYNC_POOL_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each variable.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(core) = parse_var(&lookup, CORE_THREADS_ENV)? {
            config.core_threads = core as usize;
        }
        if let Some(max) = parse_var(&lookup, MAX_THREADS_ENV)? {
            config.max_threads = max as usize;
        }
        if let Some(ms) = parse_var(&lookup, KEEP_ALIVE_MS_ENV)? {
            config.keep_alive = Duration::from_millis(ms);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.core_threads == 0 {
            return Err(ConfigError::NoCoreThreads);
        }
        if self.core_threads > self.max_threads {
            return Err(ConfigError::CoreExceedsMax {
                core: self.core_threads,
                max: self.max_threads,
            });
        }
        Ok(())
    }
}

fn parse_var<F>(lookup: &F, key: &'static str) -> Result<Option<u64>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidNumber { key, value: raw }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_match_pool_sizing() {
        let config = WorkerPoolConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, WorkerPoolConfig::default());
        assert_eq!(config.core_threads, 2);
        assert_eq!(config.max_threads, 5);
        assert_eq!(config.keep_alive, Duration::from_millis(1000));
    }

    #[test]
    fn env_overrides_defaults() {
        let config = WorkerPoolConfig::from_lookup(lookup(&[
            (CORE_THREADS_ENV, "1"),
            (MAX_THREADS_ENV, " 3 "),
            (KEEP_ALIVE_MS_ENV, "250"),
        ]))
        .unwrap();

        assert_eq!(config.core_threads, 1);
        assert_eq!(config.max_threads, 3);
        assert_eq!(config.keep_alive, Duration::from_millis(250));
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(
            WorkerPoolConfig::from_lookup(lookup(&[(MAX_THREADS_ENV, "lots")])),
            Err(ConfigError::InvalidNumber { key: MAX_THREADS_ENV, .. })
        ));
        assert_eq!(
            WorkerPoolConfig::from_lookup(lookup(&[(CORE_THREADS_ENV, "0")])),
            Err(ConfigError::NoCoreThreads)
        );
        assert_eq!(
            WorkerPoolConfig::from_lookup(lookup(&[(CORE_THREADS_ENV, "6")])),
            Err(ConfigError::CoreExceedsMax { core: 6, max: 5 })
        );
    }
}

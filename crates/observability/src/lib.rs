//! Process-wide tracing setup shared by the dirsync binaries.

/// Initialize process-wide tracing with the default `info` filter.
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init(tracing::DEFAULT_FILTER);
}

/// Subscriber construction (filters, JSON layer).
pub mod tracing;

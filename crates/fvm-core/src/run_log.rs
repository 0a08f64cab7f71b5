//! Scoped message log for a single run.
//!
//! Replaces a process-wide logger: the driver owns one `RunLog`, every
//! error or warning it reports goes through it, and the post-run
//! error check reads the counters instead of global state.

use std::fmt::Display;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Debug, Default)]
struct Counters {
    errors: AtomicU64,
    warnings: AtomicU64,
}

/// Cheaply cloneable handle; clones share counters.
#[derive(Debug, Clone, Default)]
pub struct RunLog {
    counters: Arc<Counters>,
}

impl RunLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an error-level message.
    pub fn error(&self, message: impl Display) {
        self.counters.errors.fetch_add(1, Ordering::Relaxed);
        tracing::error!("{message}");
    }

    /// Record a warning-level message.
    pub fn warn(&self, message: impl Display) {
        self.counters.warnings.fetch_add(1, Ordering::Relaxed);
        tracing::warn!("{message}");
    }

    pub fn error_count(&self) -> u64 {
        self.counters.errors.load(Ordering::Relaxed)
    }

    pub fn warning_count(&self) -> u64 {
        self.counters.warnings.load(Ordering::Relaxed)
    }
}

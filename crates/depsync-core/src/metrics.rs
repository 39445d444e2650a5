//! Global atomic counters for deployment runs.
//!
//! Counters are incremented silently at the call site. Call
//! [`Metrics::flush`] to emit current values as a single
//! `tracing::info!` event (e.g. at the end of a run).

use std::sync::atomic::{AtomicU64, Ordering};

/// Global metrics singleton.
pub static METRICS: Metrics = Metrics::new();

/// Lightweight atomic counters, no allocations, no locking.
pub struct Metrics {
    deploy_attempts: AtomicU64,
    artifacts_deployed: AtomicU64,
    artifacts_failed: AtomicU64,
    passes_completed: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            deploy_attempts: AtomicU64::new(0),
            artifacts_deployed: AtomicU64::new(0),
            artifacts_failed: AtomicU64::new(0),
            passes_completed: AtomicU64::new(0),
        }
    }

    pub fn inc_deploy_attempts(&self) {
        self.deploy_attempts.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "deploy_attempts", "counter incremented");
    }

    pub fn inc_deployed(&self) {
        self.artifacts_deployed.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "artifacts_deployed", "counter incremented");
    }

    pub fn inc_failed(&self) {
        self.artifacts_failed.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "artifacts_failed", "counter incremented");
    }

    pub fn inc_passes(&self) {
        self.passes_completed.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "passes_completed", "counter incremented");
    }

    /// Emit all current counter values as a single `info!` event.
    ///
    /// Call this at natural boundaries (end of a run) rather than on every
    /// increment.
    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            deploy_attempts = self.deploy_attempts(),
            artifacts_deployed = self.artifacts_deployed(),
            artifacts_failed = self.artifacts_failed(),
            passes_completed = self.passes_completed(),
        );
    }

    pub fn deploy_attempts(&self) -> u64 {
        self.deploy_attempts.load(Ordering::Relaxed)
    }

    pub fn artifacts_deployed(&self) -> u64 {
        self.artifacts_deployed.load(Ordering::Relaxed)
    }

    pub fn artifacts_failed(&self) -> u64 {
        self.artifacts_failed.load(Ordering::Relaxed)
    }

    pub fn passes_completed(&self) -> u64 {
        self.passes_completed.load(Ordering::Relaxed)
    }

    /// Reset all counters to zero (useful in tests).
    pub fn reset(&self) {
        self.deploy_attempts.store(0, Ordering::Relaxed);
        self.artifacts_deployed.store(0, Ordering::Relaxed);
        self.artifacts_failed.store(0, Ordering::Relaxed);
        self.passes_completed.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_increment() {
        let m = Metrics::new();
        assert_eq!(m.deploy_attempts(), 0);
        m.inc_deploy_attempts();
        m.inc_deploy_attempts();
        assert_eq!(m.deploy_attempts(), 2);

        m.inc_deployed();
        assert_eq!(m.artifacts_deployed(), 1);

        m.inc_failed();
        m.inc_passes();
        m.inc_passes();
        assert_eq!(m.artifacts_failed(), 1);
        assert_eq!(m.passes_completed(), 2);
    }

    #[test]
    fn reset_zeroes_all() {
        let m = Metrics::new();
        m.inc_deploy_attempts();
        m.inc_deployed();
        m.inc_failed();
        m.inc_passes();
        m.reset();
        assert_eq!(m.deploy_attempts(), 0);
        assert_eq!(m.artifacts_deployed(), 0);
        assert_eq!(m.artifacts_failed(), 0);
        assert_eq!(m.passes_completed(), 0);
    }
}

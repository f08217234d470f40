use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters describing gateway activity.
#[derive(Default)]
pub struct GatewayMetrics {
    queries_submitted: AtomicU64,
    queries_completed: AtomicU64,
    queries_failed: AtomicU64,
    files_processed: AtomicU64,
}

impl GatewayMetrics {
    /// Create an empty metrics accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an accepted submission.
    pub fn record_submission(&self) {
        self.queries_submitted.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a job that reached the COMPLETED state, with the number of files it touched.
    pub fn record_completion(&self, file_count: u64) {
        self.queries_completed.fetch_add(1, Ordering::Relaxed);
        self.files_processed.fetch_add(file_count, Ordering::Relaxed);
    }

    /// Record a job that reached the ERROR state.
    pub fn record_failure(&self) {
        self.queries_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Return a snapshot of the current counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            queries_submitted: self.queries_submitted.load(Ordering::Relaxed),
            queries_completed: self.queries_completed.load(Ordering::Relaxed),
            queries_failed: self.queries_failed.load(Ordering::Relaxed),
            files_processed: self.files_processed.load(Ordering::Relaxed),
        }
    }
}

/// Immutable view of gateway counters used for reporting.
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct MetricsSnapshot {
    /// Number of submissions accepted since startup.
    pub queries_submitted: u64,
    /// Number of jobs that completed successfully since startup.
    pub queries_completed: u64,
    /// Number of jobs that ended in the error state since startup.
    pub queries_failed: u64,
    /// Total files carried by completed jobs.
    pub files_processed: u64,
}

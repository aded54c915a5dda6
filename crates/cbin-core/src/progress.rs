use crate::dispatch::BatchReport;
use crate::recycler::RecycleOutcome;

/// Trait for reporting recycle batch progress.
///
/// Called from worker threads, so implementations must be thread safe.
/// All methods have default no-op implementations.
pub trait RecycleReporter: Send + Sync {
    fn on_batch_start(&self, _total_targets: usize) {}
    fn on_item_complete(&self, _outcome: &RecycleOutcome) {}
    fn on_batch_complete(&self, _report: &BatchReport, _duration_secs: f64) {}
}

/// No-op progress reporter for silent operation.
pub struct SilentReporter;

impl RecycleReporter for SilentReporter {}

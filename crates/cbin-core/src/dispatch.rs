use crate::error::Error;
use crate::progress::RecycleReporter;
use crate::recycler::{RecycleOutcome, Recycler};
use rayon::prelude::*;
use std::io;
use std::time::Instant;
use tracing::{debug, info};

/// Outcomes of one recycle batch, in the order the targets were given.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub outcomes: Vec<RecycleOutcome>,
}

impl BatchReport {
    pub fn recycled(&self) -> usize {
        self.count(|o| matches!(o, RecycleOutcome::Recycled(_)))
    }

    pub fn partial(&self) -> usize {
        self.count(|o| matches!(o, RecycleOutcome::PartiallyRecycled { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, RecycleOutcome::Skipped { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(RecycleOutcome::is_failure)
    }

    pub fn has_failures(&self) -> bool {
        self.failed() > 0
    }

    fn count(&self, predicate: impl Fn(&RecycleOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|&o| predicate(o)).count()
    }
}

/// Never more threads than targets, never fewer than one.
fn pool_size(worker_count: usize, target_count: usize) -> usize {
    worker_count.clamp(1, target_count.max(1))
}

/// Fan `targets` out over a pool of `worker_count` threads (at least one)
/// and block until every target has been handled. Each target is processed
/// exactly once; one failure never stops the others.
pub fn dispatch(
    recycler: &Recycler,
    targets: &[String],
    worker_count: usize,
    reporter: &dyn RecycleReporter,
) -> Result<BatchReport, Error> {
    let workers = pool_size(worker_count, targets.len());
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|index| format!("cbin-worker-{}", index))
        .build()
        .map_err(|e| Error::Io(io::Error::new(io::ErrorKind::Other, e)))?;

    debug!("Dispatching {} targets over {} workers", targets.len(), workers);
    reporter.on_batch_start(targets.len());
    let start = Instant::now();

    let outcomes: Vec<RecycleOutcome> = pool.install(|| {
        targets
            .par_iter()
            .map(|target| {
                let outcome = recycler.recycle_one(target);
                reporter.on_item_complete(&outcome);
                outcome
            })
            .collect()
    });

    let report = BatchReport { outcomes };
    let duration = start.elapsed();
    info!(
        recycled = report.recycled(),
        partial = report.partial(),
        skipped = report.skipped(),
        failed = report.failed(),
        "All specified files have been processed in {:.2}s",
        duration.as_secs_f64()
    );
    reporter.on_batch_complete(&report, duration.as_secs_f64());

    Ok(report)
}

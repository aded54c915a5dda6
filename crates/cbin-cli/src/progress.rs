use cbin_core::{BatchReport, RecycleOutcome, RecycleReporter};
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Mutex;
use std::time::Duration;

/// CLI progress reporter: one bar over the batch, filled as workers finish
/// their targets.
pub struct CliReporter {
    bar: Mutex<Option<ProgressBar>>,
}

impl CliReporter {
    pub fn new() -> Self {
        Self {
            bar: Mutex::new(None),
        }
    }

    fn finish_bar(&self) {
        if let Ok(mut guard) = self.bar.lock() {
            if let Some(pb) = guard.take() {
                pb.finish_and_clear();
            }
        }
    }
}

impl RecycleReporter for CliReporter {
    fn on_batch_start(&self, total_targets: usize) {
        let pb = ProgressBar::new(total_targets as u64);
        if let Ok(style) = ProgressStyle::with_template(
            "  {spinner:.cyan} Recycling [{bar:30.cyan/dim}] {pos}/{len} items",
        ) {
            pb.set_style(
                style
                    .progress_chars("━╸─")
                    .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
            );
        }
        pb.enable_steady_tick(Duration::from_millis(80));
        if let Ok(mut guard) = self.bar.lock() {
            if let Some(old) = guard.replace(pb) {
                old.finish_and_clear();
            }
        }
    }

    fn on_item_complete(&self, _outcome: &RecycleOutcome) {
        if let Ok(guard) = self.bar.lock() {
            if let Some(pb) = guard.as_ref() {
                pb.inc(1);
            }
        }
    }

    fn on_batch_complete(&self, report: &BatchReport, duration_secs: f64) {
        self.finish_bar();
        eprintln!(
            "  \x1b[32m✓\x1b[0m Recycle complete: {} of {} items in {:.2}s",
            report.recycled() + report.partial(),
            report.outcomes.len(),
            duration_secs
        );
    }
}

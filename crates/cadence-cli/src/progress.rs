//! Progress reporting for pipeline runs.

use std::sync::atomic::{AtomicUsize, Ordering};

use cadence_core::{NodeStatus, ProcessorId, RunObserver, RunReport, SourceInfo};
use indicatif::{ProgressBar, ProgressStyle};

/// [`RunObserver`] drawing an indicatif progress bar over decoded frames.
///
/// Failed processors are counted in the bar's message; the failures
/// themselves are logged by the scheduler.
pub struct ProgressObserver {
    bar: ProgressBar,
    failed: AtomicUsize,
}

impl ProgressObserver {
    /// Creates an observer; a hidden one draws nothing.
    pub fn new(visible: bool) -> Self {
        let bar = if visible {
            ProgressBar::new(0)
        } else {
            ProgressBar::hidden()
        };
        Self {
            bar,
            failed: AtomicUsize::new(0),
        }
    }

    /// Leaves the bar where it is after a fatal error.
    pub fn abandon(&self) {
        self.bar.abandon();
    }
}

impl RunObserver for ProgressObserver {
    fn run_started(&self, _run_id: &str, source: &SourceInfo) {
        let style = match source.total_frames {
            Some(total) => {
                self.bar.set_length(total);
                ProgressStyle::default_bar()
                    .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} frames ({eta}) {msg}")
                    .map(|s| s.progress_chars("##-"))
            }
            None => ProgressStyle::default_spinner()
                .template("[{elapsed_precise}] {spinner} {pos} frames {msg}"),
        };
        if let Ok(style) = style {
            self.bar.set_style(style);
        }
    }

    fn frame_decoded(&self, end_offset: u64, _total_frames: Option<u64>) {
        self.bar.set_position(end_offset);
    }

    fn node_failed(&self, _id: &ProcessorId, _status: &NodeStatus) {
        let failed = self.failed.fetch_add(1, Ordering::Relaxed) + 1;
        self.bar.set_message(format!("{failed} failed"));
    }

    fn run_finished(&self, report: &RunReport) {
        self.bar.finish_with_message(report.outcome().to_string());
    }
}

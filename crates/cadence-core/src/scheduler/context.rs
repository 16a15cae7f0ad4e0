//! Per-run context: identity, cancellation, execution mode, observer.

use core::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};

use crate::format::SourceInfo;
use crate::lifecycle::NodeStatus;
use crate::processor::ProcessorId;

use super::report::RunReport;

/// Run-level cancellation flag, checked at every frame boundary.
///
/// Clones share the flag, so a token handed to a signal handler cancels the
/// run it was created for.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Creates an unset token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Returns true once [`cancel`](Self::cancel) was called.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// How branches are executed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Everything on the calling thread. The reference mode.
    #[default]
    Sequential,
    /// One worker thread per branch, fed over bounded channels.
    Parallel {
        /// Frames buffered per branch before the decoder blocks.
        queue_depth: usize,
    },
}

impl ExecutionMode {
    /// Parallel mode; a depth of zero is raised to one.
    pub fn parallel(queue_depth: usize) -> Self {
        ExecutionMode::Parallel {
            queue_depth: queue_depth.max(1),
        }
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionMode::Sequential => f.write_str("sequential"),
            ExecutionMode::Parallel { queue_depth } => write!(f, "parallel (depth {queue_depth})"),
        }
    }
}

/// Hooks for progress reporting.
///
/// Called from the decoding thread, except [`node_failed`](Self::node_failed)
/// which runs on the failing branch's worker in parallel mode.
pub trait RunObserver: Send + Sync {
    /// The source was opened.
    fn run_started(&self, _run_id: &str, _source: &SourceInfo) {}

    /// A frame ending at `end_offset` was decoded.
    fn frame_decoded(&self, _end_offset: u64, _total_frames: Option<u64>) {}

    /// A processor failed or was rejected at negotiation.
    fn node_failed(&self, _id: &ProcessorId, _status: &NodeStatus) {}

    /// The run finished and its report is ready.
    fn run_finished(&self, _report: &RunReport) {}
}

/// Observer that ignores every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl RunObserver for NoopObserver {}

/// Everything a run needs besides the graph.
#[derive(Clone)]
pub struct RunContext {
    run_id: String,
    cancel: CancelToken,
    mode: ExecutionMode,
    observer: Arc<dyn RunObserver>,
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new("run")
    }
}

impl fmt::Debug for RunContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunContext")
            .field("run_id", &self.run_id)
            .field("cancelled", &self.cancel.is_cancelled())
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

impl RunContext {
    /// Sequential context with a fresh cancel token and no observer.
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            cancel: CancelToken::new(),
            mode: ExecutionMode::Sequential,
            observer: Arc::new(NoopObserver),
        }
    }

    /// Sets the execution mode.
    pub fn with_mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = mode;
        self
    }

    /// Uses an externally owned cancel token.
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    /// Installs an observer.
    pub fn with_observer(mut self, observer: Arc<dyn RunObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Run identifier used in logs.
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Execution mode.
    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    /// The run's cancel token.
    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Returns true if cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Installed observer.
    pub fn observer(&self) -> &Arc<dyn RunObserver> {
        &self.observer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_token_is_shared() {
        let token = CancelToken::new();
        let ctx = RunContext::new("t").with_cancel_token(token.clone());
        assert!(!ctx.is_cancelled());
        token.cancel();
        assert!(ctx.is_cancelled());
    }

    #[test]
    fn parallel_depth_is_at_least_one() {
        assert_eq!(
            ExecutionMode::parallel(0),
            ExecutionMode::Parallel { queue_depth: 1 }
        );
        assert_eq!(ExecutionMode::parallel(8).to_string(), "parallel (depth 8)");
    }
}

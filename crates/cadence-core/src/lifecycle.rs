//! Processor lifecycle tracking and per-node run status.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::error::LifecycleError;
use crate::processor::ProcessorId;
use crate::results::ContainerStatus;

/// Lifecycle state of one processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcessorState {
    /// Constructed, not yet negotiated.
    Created,
    /// `setup` succeeded; no frame processed yet.
    Configured,
    /// At least one frame processed.
    Running,
    /// `finalize` returned.
    Finalized,
    /// An error or panic removed the processor from the active set.
    Failed,
}

impl fmt::Display for ProcessorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ProcessorState::Created => "created",
            ProcessorState::Configured => "configured",
            ProcessorState::Running => "running",
            ProcessorState::Finalized => "finalized",
            ProcessorState::Failed => "failed",
        })
    }
}

/// Enforces the legal state transitions.
///
/// ```text
/// Created ─setup─► Configured ─process─► Running ─finalize─► Finalized
///    │                 │ └──────────finalize──────────────────────▲
///    └─────────────────┴──────── error / panic ──► Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lifecycle {
    state: ProcessorState,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    /// Starts in [`ProcessorState::Created`].
    pub fn new() -> Self {
        Self {
            state: ProcessorState::Created,
        }
    }

    /// Current state.
    pub fn state(&self) -> ProcessorState {
        self.state
    }

    /// Returns true while the processor accepts frames or a finalize call.
    pub fn is_live(&self) -> bool {
        matches!(
            self.state,
            ProcessorState::Configured | ProcessorState::Running
        )
    }

    /// `Created → Configured`.
    pub fn configure(&mut self) -> Result<(), LifecycleError> {
        self.transition("configure", &[ProcessorState::Created], ProcessorState::Configured)
    }

    /// `Configured | Running → Running`.
    pub fn start(&mut self) -> Result<(), LifecycleError> {
        self.transition(
            "process",
            &[ProcessorState::Configured, ProcessorState::Running],
            ProcessorState::Running,
        )
    }

    /// `Configured | Running → Finalized`.
    pub fn finish(&mut self) -> Result<(), LifecycleError> {
        self.transition(
            "finalize",
            &[ProcessorState::Configured, ProcessorState::Running],
            ProcessorState::Finalized,
        )
    }

    /// Any non-terminal state → `Failed`.
    pub fn fail(&mut self) -> Result<(), LifecycleError> {
        self.transition(
            "fail",
            &[
                ProcessorState::Created,
                ProcessorState::Configured,
                ProcessorState::Running,
            ],
            ProcessorState::Failed,
        )
    }

    fn transition(
        &mut self,
        action: &'static str,
        from: &[ProcessorState],
        to: ProcessorState,
    ) -> Result<(), LifecycleError> {
        if !from.contains(&self.state) {
            return Err(LifecycleError {
                action,
                state: self.state,
            });
        }
        self.state = to;
        Ok(())
    }
}

/// Call in which a processor failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Inside `setup`.
    Setup,
    /// Inside `process`.
    Process,
    /// Inside `finalize`.
    Finalize,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Setup => "setup",
            Stage::Process => "process",
            Stage::Finalize => "finalize",
        })
    }
}

/// Per-node outcome reported in the run report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum NodeStatus {
    /// Saw the whole stream and finalized.
    Complete,
    /// Finalized early because the run was cancelled.
    Cancelled,
    /// Finalized early, or never set up, because an ancestor failed.
    UpstreamFailed {
        /// The failed ancestor.
        upstream: ProcessorId,
    },
    /// Rejected the offered stream format.
    NegotiationFailed {
        /// Negotiation error message.
        error: String,
    },
    /// Returned an error or panicked.
    Failed {
        /// Call that failed.
        stage: Stage,
        /// Error message.
        error: String,
        /// Start offset of the frame being processed, if any.
        offset: Option<u64>,
    },
}

impl NodeStatus {
    /// Returns true for [`NodeStatus::Complete`].
    pub fn is_complete(&self) -> bool {
        matches!(self, NodeStatus::Complete)
    }

    /// Returns true if this node itself or one of its ancestors failed.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            NodeStatus::UpstreamFailed { .. }
                | NodeStatus::NegotiationFailed { .. }
                | NodeStatus::Failed { .. }
        )
    }

    /// Maps the node status onto its result container status.
    pub fn container_status(&self) -> ContainerStatus {
        match self {
            NodeStatus::Complete => ContainerStatus::Complete,
            NodeStatus::Cancelled => ContainerStatus::Incomplete {
                reason: "cancelled".to_string(),
            },
            NodeStatus::UpstreamFailed { upstream } => ContainerStatus::Incomplete {
                reason: format!("upstream '{upstream}' failed"),
            },
            NodeStatus::NegotiationFailed { error } => ContainerStatus::Failed {
                error: error.clone(),
                offset: None,
            },
            NodeStatus::Failed { error, offset, .. } => ContainerStatus::Failed {
                error: error.clone(),
                offset: *offset,
            },
        }
    }
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeStatus::Complete => f.write_str("complete"),
            NodeStatus::Cancelled => f.write_str("cancelled"),
            NodeStatus::UpstreamFailed { upstream } => write!(f, "upstream '{upstream}' failed"),
            NodeStatus::NegotiationFailed { error } => write!(f, "negotiation failed: {error}"),
            NodeStatus::Failed {
                stage,
                error,
                offset: Some(offset),
            } => write!(f, "failed in {stage} at offset {offset}: {error}"),
            NodeStatus::Failed { stage, error, .. } => write!(f, "failed in {stage}: {error}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path() {
        let mut lc = Lifecycle::new();
        lc.configure().unwrap();
        assert!(lc.is_live());
        lc.start().unwrap();
        lc.start().unwrap();
        lc.finish().unwrap();
        assert_eq!(lc.state(), ProcessorState::Finalized);
        assert!(!lc.is_live());
    }

    #[test]
    fn finalize_without_frames() {
        let mut lc = Lifecycle::new();
        lc.configure().unwrap();
        lc.finish().unwrap();
        assert_eq!(lc.state(), ProcessorState::Finalized);
    }

    #[test]
    fn finalize_twice_is_illegal() {
        let mut lc = Lifecycle::new();
        lc.configure().unwrap();
        lc.finish().unwrap();
        let err = lc.finish().unwrap_err();
        assert_eq!(err.state, ProcessorState::Finalized);
        assert_eq!(
            err.to_string(),
            "cannot finalize a processor in state finalized"
        );
    }

    #[test]
    fn process_before_setup_is_illegal() {
        let mut lc = Lifecycle::new();
        assert!(lc.start().is_err());
        assert!(lc.finish().is_err());
    }

    #[test]
    fn failed_is_terminal() {
        let mut lc = Lifecycle::new();
        lc.configure().unwrap();
        lc.fail().unwrap();
        assert!(lc.start().is_err());
        assert!(lc.finish().is_err());
        assert!(lc.fail().is_err());
    }

    #[test]
    fn status_maps_to_container_status() {
        assert!(NodeStatus::Complete.container_status().is_complete());
        let failed = NodeStatus::Failed {
            stage: Stage::Process,
            error: "boom".into(),
            offset: Some(4096),
        };
        assert_eq!(
            failed.container_status(),
            ContainerStatus::Failed {
                error: "boom".into(),
                offset: Some(4096)
            }
        );
        assert!(failed.is_failure());
        assert!(!NodeStatus::Cancelled.is_failure());
        assert_eq!(failed.to_string(), "failed in process at offset 4096: boom");
    }
}

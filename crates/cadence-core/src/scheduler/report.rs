//! Run reports.

use core::fmt;
use std::collections::BTreeMap;

use crate::codec::Artifact;
use crate::format::SourceInfo;
use crate::lifecycle::NodeStatus;
use crate::processor::ProcessorId;
use crate::results::ResultSet;

/// Overall classification of a finished run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunOutcome {
    /// Every processor saw the whole stream and finalized.
    Complete,
    /// The run was cancelled; no processor failed.
    Cancelled,
    /// Some processors failed, others produced output.
    Partial,
    /// Every processor failed.
    Failed,
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RunOutcome::Complete => "complete",
            RunOutcome::Cancelled => "cancelled",
            RunOutcome::Partial => "partial",
            RunOutcome::Failed => "failed",
        })
    }
}

/// Everything a finished run produced.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub(crate) run_id: String,
    pub(crate) source: SourceInfo,
    pub(crate) frames_decoded: u64,
    pub(crate) cancelled: bool,
    pub(crate) order: Vec<ProcessorId>,
    pub(crate) results: ResultSet,
    pub(crate) statuses: BTreeMap<ProcessorId, NodeStatus>,
    pub(crate) artifacts: BTreeMap<ProcessorId, Artifact>,
}

impl RunReport {
    /// Run identifier.
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// What the decoder reported at open.
    pub fn source(&self) -> &SourceInfo {
        &self.source
    }

    /// Sample frames pulled from the decoder.
    pub fn frames_decoded(&self) -> u64 {
        self.frames_decoded
    }

    /// Returns true if the run stopped on its cancel token.
    pub fn cancelled(&self) -> bool {
        self.cancelled
    }

    /// Processor ids in execution order.
    pub fn order(&self) -> &[ProcessorId] {
        &self.order
    }

    /// Merged result containers.
    pub fn results(&self) -> &ResultSet {
        &self.results
    }

    /// Consumes the report, returning the result set.
    pub fn into_results(self) -> ResultSet {
        self.results
    }

    /// Per-processor status.
    pub fn statuses(&self) -> &BTreeMap<ProcessorId, NodeStatus> {
        &self.statuses
    }

    /// Status of one processor.
    pub fn status(&self, id: &str) -> Option<&NodeStatus> {
        self.statuses.get(id)
    }

    /// Artifacts committed by transcoders.
    pub fn artifacts(&self) -> &BTreeMap<ProcessorId, Artifact> {
        &self.artifacts
    }

    /// Ids of processors that failed or sit behind a failure.
    pub fn failures(&self) -> Vec<&ProcessorId> {
        self.statuses
            .iter()
            .filter(|(_, s)| s.is_failure())
            .map(|(id, _)| id)
            .collect()
    }

    /// Classifies the run.
    pub fn outcome(&self) -> RunOutcome {
        let failed = self.statuses.values().filter(|s| s.is_failure()).count();
        if failed == 0 {
            if self.cancelled {
                RunOutcome::Cancelled
            } else {
                RunOutcome::Complete
            }
        } else if failed == self.statuses.len() {
            RunOutcome::Failed
        } else {
            RunOutcome::Partial
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::StreamFormat;
    use crate::lifecycle::Stage;

    fn report(statuses: &[(&str, NodeStatus)], cancelled: bool) -> RunReport {
        RunReport {
            run_id: "t".into(),
            source: SourceInfo {
                format: StreamFormat::mono(44100),
                total_frames: Some(0),
                block_size: 1024,
            },
            frames_decoded: 0,
            cancelled,
            order: Vec::new(),
            results: ResultSet::new(),
            statuses: statuses
                .iter()
                .map(|(id, s)| (ProcessorId::from(*id), s.clone()))
                .collect(),
            artifacts: BTreeMap::new(),
        }
    }

    fn failed() -> NodeStatus {
        NodeStatus::Failed {
            stage: Stage::Process,
            error: "boom".into(),
            offset: None,
        }
    }

    #[test]
    fn classification() {
        assert_eq!(
            report(&[("a", NodeStatus::Complete)], false).outcome(),
            RunOutcome::Complete
        );
        assert_eq!(
            report(&[("a", NodeStatus::Cancelled)], true).outcome(),
            RunOutcome::Cancelled
        );
        assert_eq!(
            report(&[("a", NodeStatus::Complete), ("b", failed())], false).outcome(),
            RunOutcome::Partial
        );
        assert_eq!(report(&[("a", failed())], false).outcome(), RunOutcome::Failed);
    }

    #[test]
    fn failures_lists_ids() {
        let r = report(&[("a", NodeStatus::Complete), ("b", failed())], false);
        assert_eq!(r.failures(), vec![&ProcessorId::new("b")]);
    }
}

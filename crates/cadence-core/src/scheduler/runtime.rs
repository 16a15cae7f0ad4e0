//! Execution of one branch.
//!
//! A [`BranchRuntime`] owns the processors of one branch (a direct child of
//! the source and its descendants) together with their per-edge
//! re-blockers, lifecycles and result containers. It is driven the same way
//! in both execution modes: `setup`, then `deliver` per source frame, then
//! `finish`. Branches share nothing, so running them on separate threads
//! cannot change what any of them observes.
//!
//! Every call into processor code goes through [`guarded`], which turns
//! both `Err` returns and panics into a failure of that node alone.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::codec::{Artifact, Decoder};
use crate::error::{GraphError, ProcessorError};
use crate::format::SetupParams;
use crate::frame::Frame;
use crate::graph::{CompiledPlan, GraphParts, NodeId, NodeKind};
use crate::lifecycle::{Lifecycle, NodeStatus, Stage};
use crate::processor::{Emitter, FinalizeReason, Processor, ProcessorId};
use crate::reblock::Reblocker;
use crate::results::{ResultContainer, ResultRecord, ResultValue};

use super::context::RunObserver;

/// How a node's input ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Ending {
    EndOfStream,
    Cancelled,
    Upstream(ProcessorId),
}

impl Ending {
    fn reason(&self) -> FinalizeReason {
        match self {
            Ending::EndOfStream => FinalizeReason::EndOfStream,
            Ending::Cancelled => FinalizeReason::Cancelled,
            Ending::Upstream(_) => FinalizeReason::UpstreamFailed,
        }
    }

    fn status(&self) -> NodeStatus {
        match self {
            Ending::EndOfStream => NodeStatus::Complete,
            Ending::Cancelled => NodeStatus::Cancelled,
            Ending::Upstream(upstream) => NodeStatus::UpstreamFailed {
                upstream: upstream.clone(),
            },
        }
    }
}

/// Runs processor code, converting errors and panics into a message.
fn guarded<T, E: fmt::Display>(f: impl FnOnce() -> Result<T, E>) -> Result<T, String> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(err.to_string()),
        Err(payload) => Err(ProcessorError::Panicked(panic_message(payload.as_ref())).to_string()),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Maps offsets of a resampled input back onto the source timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Timeline {
    rate: u32,
    source_rate: u32,
}

impl Timeline {
    fn map(self, offset: u64) -> u64 {
        let scaled = u128::from(offset) * u128::from(self.source_rate) / u128::from(self.rate);
        u64::try_from(scaled).unwrap_or(u64::MAX)
    }

    fn record(self, record: ResultRecord) -> ResultRecord {
        let offset = self.map(record.offset);
        let value = match record.value {
            ResultValue::Segment { duration, label } => ResultValue::Segment {
                duration: self.map(record.offset + duration) - offset,
                label,
            },
            other => other,
        };
        ResultRecord { offset, value }
    }
}

struct Slot {
    id: ProcessorId,
    processor: Box<dyn Processor>,
    lifecycle: Lifecycle,
    parent: Option<usize>,
    children: Vec<usize>,
    reblocker: Option<Reblocker>,
    /// Offset the next frame must start at.
    expected: Option<u64>,
    /// An `is_last` frame was processed.
    ended: bool,
    /// What this node offers its children after setup.
    output: Option<SetupParams>,
    container: Option<ResultContainer>,
    /// Set when the node's input rate differs from the source's.
    timeline: Option<Timeline>,
    status: Option<NodeStatus>,
    artifact: Option<Artifact>,
}

impl Slot {
    fn new(id: ProcessorId, processor: Box<dyn Processor>, parent: Option<usize>) -> Self {
        let role = processor.role();
        let container = role
            .owns_results()
            .then(|| ResultContainer::new(id.clone(), processor.kind(), role, &processor.params()));
        let reblocker = processor.block_size().filter(|&n| n > 0).map(Reblocker::new);
        Self {
            id,
            processor,
            lifecycle: Lifecycle::new(),
            parent,
            children: Vec::new(),
            reblocker,
            expected: None,
            ended: false,
            output: None,
            container,
            timeline: None,
            status: None,
            artifact: None,
        }
    }

    /// Moves emitted records and metadata into the container and returns
    /// the emitted frames.
    ///
    /// Record offsets are stamped in source frames. The records of one call
    /// are stored together or not at all.
    fn absorb(&mut self, out: &mut Emitter) -> Result<Vec<Frame>, String> {
        let mut records = out.take_records();
        let metadata = out.take_metadata();
        if let Some(timeline) = self.timeline {
            records = records.into_iter().map(|r| timeline.record(r)).collect();
        }
        match self.container.as_mut() {
            Some(container) => {
                container
                    .extend(records)
                    .map_err(|e| ProcessorError::from(e).to_string())?;
                for (key, value) in metadata {
                    container
                        .set_metadata(key, value)
                        .map_err(|e| ProcessorError::from(e).to_string())?;
                }
            }
            None if !records.is_empty() => {
                tracing::debug!(
                    processor = %self.id,
                    dropped = records.len(),
                    "results emitted by a processor without a container"
                );
            }
            None => {}
        }
        Ok(out.take_frames())
    }
}

/// Final state of one branch.
pub(crate) struct BranchOutcome {
    pub containers: Vec<ResultContainer>,
    pub statuses: Vec<(ProcessorId, NodeStatus)>,
    pub artifacts: Vec<(ProcessorId, Artifact)>,
}

/// The processors of one branch and their per-node run state.
pub(crate) struct BranchRuntime {
    name: ProcessorId,
    slots: Vec<Slot>,
    observer: Arc<dyn RunObserver>,
}

/// Splits a graph into its decoder and one runtime per plan branch.
pub(crate) fn build(
    parts: GraphParts,
    plan: &CompiledPlan,
    observer: &Arc<dyn RunObserver>,
) -> Result<(Box<dyn Decoder>, Vec<BranchRuntime>), GraphError> {
    let GraphParts {
        nodes,
        edges,
        source,
    } = parts;
    let mut parents = HashMap::new();
    for edge in &edges {
        parents.insert(edge.to, edge.from);
    }

    let mut decoder = None;
    let mut processors = HashMap::new();
    for (index, node) in nodes.into_iter().enumerate() {
        match node.kind {
            NodeKind::Source(d) => decoder = Some(d),
            NodeKind::Processor(p) => {
                processors.insert(index as u32, (node.id, p));
            }
        }
    }
    let decoder = decoder.ok_or(GraphError::MissingSource)?;

    let mut runtimes = Vec::with_capacity(plan.branches().len());
    for branch in plan.branches() {
        let mut index_of: HashMap<NodeId, usize> = HashMap::new();
        let mut slots: Vec<Slot> = Vec::with_capacity(branch.nodes().len());
        for &node in branch.nodes() {
            let (id, processor) = processors
                .remove(&node.index())
                .ok_or(GraphError::NodeNotFound(node))?;
            let parent = match parents.get(&node) {
                Some(&p) if p == source => None,
                Some(p) => Some(*index_of.get(p).ok_or(GraphError::NodeNotFound(*p))?),
                None => return Err(GraphError::Unreachable(id)),
            };
            let index = slots.len();
            if let Some(p) = parent {
                slots[p].children.push(index);
            }
            index_of.insert(node, index);
            slots.push(Slot::new(id, processor, parent));
        }
        runtimes.push(BranchRuntime {
            name: branch.name().clone(),
            slots,
            observer: Arc::clone(observer),
        });
    }
    Ok((decoder, runtimes))
}

impl BranchRuntime {
    /// Id of the branch root.
    pub fn name(&self) -> &ProcessorId {
        &self.name
    }

    /// Negotiates every node, parents first.
    ///
    /// A node whose parent could not be set up is left unconfigured and
    /// reported as upstream-failed.
    pub fn setup(&mut self, source: SetupParams) {
        for idx in 0..self.slots.len() {
            let offered = match self.slots[idx].parent {
                None => Some(source),
                Some(p) => self.slots[p].output,
            };
            let Some(offered) = offered else {
                let upstream = self.upstream_of(idx);
                self.slots[idx].status = Some(NodeStatus::UpstreamFailed { upstream });
                continue;
            };

            let slot = &mut self.slots[idx];
            let accepts = slot.processor.accepts();
            let result = if accepts.admits(offered.format) {
                let processor = &mut slot.processor;
                guarded(|| processor.setup(&offered))
            } else {
                Err(format!("requires {accepts}, offered {}", offered.format))
            };

            match result {
                Ok(output) => {
                    let configured = slot.lifecycle.configure();
                    debug_assert!(configured.is_ok());
                    let rate = offered.format.sample_rate;
                    let source_rate = source.format.sample_rate;
                    if rate != source_rate
                        && let Some(container) = slot.container.as_mut()
                    {
                        slot.timeline = Some(Timeline { rate, source_rate });
                        container.set_metadata("input_rate", rate.to_string()).ok();
                    }
                    tracing::debug!(
                        processor = %slot.id,
                        input = %offered.format,
                        output = %output.format,
                        "processor configured"
                    );
                    slot.output = Some(output);
                }
                Err(error) => {
                    let failed = slot.lifecycle.fail();
                    debug_assert!(failed.is_ok());
                    let status = NodeStatus::NegotiationFailed { error };
                    tracing::warn!(processor = %slot.id, %status, "negotiation failed");
                    self.observer.node_failed(&slot.id, &status);
                    slot.status = Some(status);
                }
            }
        }
    }

    /// Delivers one source frame to the branch.
    pub fn deliver(&mut self, frame: &Frame) {
        if !self.slots.is_empty() {
            self.feed(0, frame);
        }
    }

    /// Finalizes every live node, parents before children.
    pub fn finish(&mut self, ending: &Ending) {
        if !self.slots.is_empty() {
            self.finish_node(0, ending);
        }
    }

    /// Seals containers and collects statuses.
    pub fn into_outcome(self) -> BranchOutcome {
        let mut outcome = BranchOutcome {
            containers: Vec::new(),
            statuses: Vec::with_capacity(self.slots.len()),
            artifacts: Vec::new(),
        };
        for slot in self.slots {
            let status = slot.status.unwrap_or(NodeStatus::Cancelled);
            if let Some(mut container) = slot.container {
                container.seal(status.container_status());
                outcome.containers.push(container);
            }
            if let Some(artifact) = slot.artifact {
                outcome.artifacts.push((slot.id.clone(), artifact));
            }
            outcome.statuses.push((slot.id, status));
        }
        outcome
    }

    fn upstream_of(&self, idx: usize) -> ProcessorId {
        let Some(parent) = self.slots[idx].parent else {
            return self.slots[idx].id.clone();
        };
        match &self.slots[parent].status {
            Some(NodeStatus::UpstreamFailed { upstream }) => upstream.clone(),
            _ => self.slots[parent].id.clone(),
        }
    }

    /// Re-blocks `frame` for node `idx` and processes the resulting frames.
    fn feed(&mut self, idx: usize, frame: &Frame) {
        if !self.slots[idx].lifecycle.is_live() {
            return;
        }
        let frames = match self.slots[idx].reblocker.as_mut() {
            Some(reblocker) => match reblocker.push(frame) {
                Ok(frames) => frames,
                Err(err) => {
                    let offset = Some(frame.start_offset());
                    self.fail(idx, Stage::Process, ProcessorError::from(err).to_string(), offset);
                    return;
                }
            },
            None => vec![frame.clone()],
        };
        for frame in &frames {
            if !self.slots[idx].lifecycle.is_live() {
                break;
            }
            self.process_one(idx, frame);
        }
    }

    fn process_one(&mut self, idx: usize, frame: &Frame) {
        let slot = &mut self.slots[idx];
        let offset = frame.start_offset();

        let order_error = if slot.ended {
            Some(ProcessorError::AfterEndOfStream(offset))
        } else {
            match slot.expected {
                Some(expected) if expected != offset => Some(ProcessorError::OutOfOrderFrame {
                    expected,
                    actual: offset,
                }),
                _ => None,
            }
        };
        if let Some(err) = order_error {
            self.fail(idx, Stage::Process, err.to_string(), Some(offset));
            return;
        }
        if let Err(err) = slot.lifecycle.start() {
            self.fail(idx, Stage::Process, ProcessorError::from(err).to_string(), Some(offset));
            return;
        }
        slot.expected = Some(frame.end_offset());
        slot.ended = frame.is_last();

        tracing::trace!(processor = %slot.id, offset, len = frame.len(), "process");
        let mut out = Emitter::new(offset);
        let processor = &mut slot.processor;
        let result = guarded(|| processor.process(frame, &mut out)).and_then(|()| slot.absorb(&mut out));

        match result {
            Ok(frames) => self.forward(idx, &frames),
            Err(error) => self.fail(idx, Stage::Process, error, Some(offset)),
        }
    }

    fn forward(&mut self, idx: usize, frames: &[Frame]) {
        if frames.is_empty() {
            return;
        }
        for child in self.slots[idx].children.clone() {
            for frame in frames {
                self.feed(child, frame);
            }
        }
    }

    /// Removes node `idx` from the active set and finalizes its descendants
    /// as upstream-failed.
    fn fail(&mut self, idx: usize, stage: Stage, error: String, offset: Option<u64>) {
        let slot = &mut self.slots[idx];
        if slot.lifecycle.fail().is_err() {
            return;
        }
        let status = NodeStatus::Failed {
            stage,
            error,
            offset,
        };
        tracing::warn!(processor = %slot.id, %status, "processor failed");
        self.observer.node_failed(&slot.id, &status);
        slot.status = Some(status);

        let ending = Ending::Upstream(slot.id.clone());
        for child in slot.children.clone() {
            self.finish_node(child, &ending);
        }
    }

    /// Flushes and finalizes node `idx`, delivers what its finalize emitted,
    /// then finishes its children.
    fn finish_node(&mut self, idx: usize, ending: &Ending) {
        if self.slots[idx].lifecycle.is_live() {
            let tail = match self.slots[idx].reblocker.as_mut().map(Reblocker::finish) {
                Some(Ok(tail)) => tail,
                Some(Err(err)) => {
                    self.fail(idx, Stage::Finalize, ProcessorError::from(err).to_string(), None);
                    None
                }
                None => None,
            };
            if let Some(tail) = tail {
                self.process_one(idx, &tail);
            }
        }

        if self.slots[idx].lifecycle.is_live() {
            let slot = &mut self.slots[idx];
            let mut out = Emitter::new(slot.expected.unwrap_or(0));
            let reason = ending.reason();
            let processor = &mut slot.processor;
            let result =
                guarded(|| processor.finalize(reason, &mut out)).and_then(|()| slot.absorb(&mut out));

            match result {
                Ok(frames) => {
                    let finished = slot.lifecycle.finish();
                    debug_assert!(finished.is_ok());
                    slot.artifact = slot.processor.artifact();
                    let status = ending.status();
                    tracing::debug!(processor = %slot.id, %status, "processor finalized");
                    slot.status = Some(status);
                    self.forward(idx, &frames);
                }
                Err(error) => {
                    self.fail(idx, Stage::Finalize, error, None);
                    return;
                }
            }
        }

        for child in self.slots[idx].children.clone() {
            self.finish_node(child, ending);
        }
    }
}

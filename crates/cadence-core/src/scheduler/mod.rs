//! Frame scheduling.
//!
//! The [`Scheduler`] pulls frames from the source decoder in its native
//! block size and hands each one to every branch of the compiled plan:
//!
//! - **Sequential**: branches are visited in plan order on the calling thread.
//! - **Parallel**: each branch runs on its own scoped worker thread, fed over
//!   a bounded `crossbeam-channel`. A full queue blocks the decoder, so a slow
//!   branch throttles the whole run instead of buffering without bound.
//!
//! Either way, each branch sees the same frames in the same order and
//! produces the same results.
//!
//! Decoder output is validated as it is pulled: offsets must be contiguous
//! and the format must match what `open` reported. A violation is a fatal
//! [`DecodeError`], as is any error the decoder itself returns. On a fatal
//! error live processors are still finalized (as cancelled) before the
//! error is returned.

mod context;
mod report;
mod runtime;

use std::collections::BTreeMap;
use std::thread;

use crossbeam_channel::{Receiver, bounded};

use crate::codec::Decoder;
use crate::error::{DecodeError, PipelineError};
use crate::format::{SetupParams, SourceInfo};
use crate::frame::Frame;
use crate::graph::{PipelineGraph, SOURCE_ID};
use crate::processor::ProcessorId;
use crate::results::ResultSet;

pub use context::{CancelToken, ExecutionMode, NoopObserver, RunContext, RunObserver};
pub use report::{RunOutcome, RunReport};

use runtime::{BranchOutcome, BranchRuntime, Ending};

/// Message sent to a branch worker.
enum BranchMsg {
    Setup(SetupParams),
    Frame(Frame),
    End(Ending),
}

/// What the decoder loop produced.
struct Pumped {
    frames: u64,
    cancelled: bool,
}

/// Drives a [`PipelineGraph`] to completion.
#[derive(Debug, Clone, Default)]
pub struct Scheduler {
    ctx: RunContext,
}

impl Scheduler {
    /// Creates a scheduler for one run.
    pub fn new(ctx: RunContext) -> Self {
        Self { ctx }
    }

    /// The run context.
    pub fn context(&self) -> &RunContext {
        &self.ctx
    }

    /// Compiles and runs `graph`.
    ///
    /// Returns the run report unless a fatal error occurs: an invalid graph
    /// or a decode failure. Processor failures never surface here; they are
    /// recorded in the report's statuses and result containers.
    pub fn run(&self, graph: PipelineGraph) -> Result<RunReport, PipelineError> {
        let plan = graph.compile()?;
        let order = plan.ids().to_vec();
        let parts = graph.into_parts()?;
        let (mut decoder, mut branches) = runtime::build(parts, &plan, self.ctx.observer())?;

        tracing::info!(
            run = self.ctx.run_id(),
            source = %decoder.describe(),
            branches = branches.len(),
            mode = %self.ctx.mode(),
            "run started"
        );

        let info = match decoder.open() {
            Ok(info) => info,
            Err(err) => {
                decoder.close();
                return Err(err.into());
            }
        };
        if info.format.channels == 0 || info.format.sample_rate == 0 {
            decoder.close();
            return Err(DecodeError::MalformedHeader(format!(
                "invalid stream format {}",
                info.format
            ))
            .into());
        }
        self.ctx.observer().run_started(self.ctx.run_id(), &info);
        let offered = SetupParams {
            format: info.format,
            total_frames: info.total_frames,
        };

        let (pumped, outcomes) = match self.ctx.mode() {
            ExecutionMode::Sequential => {
                for branch in &mut branches {
                    branch.setup(offered);
                }
                let pumped = self.pump(decoder.as_mut(), &info, |frame| {
                    for branch in &mut branches {
                        branch.deliver(frame);
                    }
                });
                let ending = ending_for(&pumped);
                for branch in &mut branches {
                    branch.finish(&ending);
                }
                let outcomes: Vec<BranchOutcome> =
                    branches.into_iter().map(BranchRuntime::into_outcome).collect();
                (pumped, Ok(outcomes))
            }
            ExecutionMode::Parallel { queue_depth } => {
                self.run_parallel(decoder.as_mut(), &info, offered, branches, queue_depth)
            }
        };
        decoder.close();

        let pumped = pumped?;
        let outcomes = outcomes?;
        let report = self.assemble(info, pumped, order, outcomes)?;

        tracing::info!(
            run = self.ctx.run_id(),
            outcome = %report.outcome(),
            frames = report.frames_decoded(),
            containers = report.results().len(),
            "run finished"
        );
        self.ctx.observer().run_finished(&report);
        Ok(report)
    }

    fn run_parallel(
        &self,
        decoder: &mut dyn Decoder,
        info: &SourceInfo,
        offered: SetupParams,
        branches: Vec<BranchRuntime>,
        queue_depth: usize,
    ) -> (
        Result<Pumped, DecodeError>,
        Result<Vec<BranchOutcome>, PipelineError>,
    ) {
        thread::scope(|scope| {
            let mut senders = Vec::with_capacity(branches.len());
            let mut handles = Vec::with_capacity(branches.len());
            for branch in branches {
                let (tx, rx) = bounded(queue_depth.max(1));
                let name = branch.name().clone();
                handles.push((name, scope.spawn(move || branch_worker(branch, rx))));
                senders.push(tx);
            }

            // A send fails only if the worker is gone; its outcome surfaces at join.
            for tx in &senders {
                tx.send(BranchMsg::Setup(offered)).ok();
            }
            let pumped = self.pump(decoder, info, |frame| {
                for tx in &senders {
                    tx.send(BranchMsg::Frame(frame.clone())).ok();
                }
            });
            let ending = ending_for(&pumped);
            for tx in &senders {
                tx.send(BranchMsg::End(ending.clone())).ok();
            }
            drop(senders);

            let outcomes = handles
                .into_iter()
                .map(|(name, handle)| handle.join().map_err(|_| PipelineError::Worker(name)))
                .collect();
            (pumped, outcomes)
        })
    }

    /// Pulls frames until end of stream, cancellation, or a decode error.
    fn pump(
        &self,
        decoder: &mut dyn Decoder,
        info: &SourceInfo,
        mut deliver: impl FnMut(&Frame),
    ) -> Result<Pumped, DecodeError> {
        let mut expected: Option<u64> = None;
        let mut frames = 0u64;

        loop {
            if self.ctx.is_cancelled() {
                tracing::warn!(run = self.ctx.run_id(), offset = expected.unwrap_or(0), "run cancelled");
                return Ok(Pumped {
                    frames,
                    cancelled: true,
                });
            }

            let Some(frame) = decoder.next_frame()? else {
                // The decoder ran dry without flagging a last frame.
                deliver(&Frame::end_of_stream(info.format, expected.unwrap_or(0))?);
                return Ok(Pumped {
                    frames,
                    cancelled: false,
                });
            };

            if frame.format() != info.format {
                return Err(DecodeError::FormatChanged(format!(
                    "opened as {}, frame at offset {} is {}",
                    info.format,
                    frame.start_offset(),
                    frame.format()
                )));
            }
            if let Some(expected) = expected
                && frame.start_offset() != expected
            {
                return Err(DecodeError::Discontinuity {
                    expected,
                    actual: frame.start_offset(),
                });
            }
            expected = Some(frame.end_offset());
            frames += frame.len() as u64;

            tracing::trace!(offset = frame.start_offset(), len = frame.len(), "decoded frame");
            deliver(&frame);
            self.ctx
                .observer()
                .frame_decoded(frame.end_offset(), info.total_frames);

            if frame.is_last() {
                return Ok(Pumped {
                    frames,
                    cancelled: false,
                });
            }
        }
    }

    fn assemble(
        &self,
        source: SourceInfo,
        pumped: Pumped,
        order: Vec<ProcessorId>,
        outcomes: Vec<BranchOutcome>,
    ) -> Result<RunReport, PipelineError> {
        let mut results = ResultSet::new();
        let mut statuses = BTreeMap::new();
        let mut artifacts = BTreeMap::new();
        for outcome in outcomes {
            results = results.merge(ResultSet::from_containers(outcome.containers)?)?;
            statuses.extend(outcome.statuses);
            artifacts.extend(outcome.artifacts);
        }
        Ok(RunReport {
            run_id: self.ctx.run_id().to_string(),
            source,
            frames_decoded: pumped.frames,
            cancelled: pumped.cancelled,
            order: order
                .into_iter()
                .filter(|id| id.as_str() != SOURCE_ID)
                .collect(),
            results,
            statuses,
            artifacts,
        })
    }
}

fn ending_for(pumped: &Result<Pumped, DecodeError>) -> Ending {
    match pumped {
        Ok(p) if !p.cancelled => Ending::EndOfStream,
        _ => Ending::Cancelled,
    }
}

fn branch_worker(mut branch: BranchRuntime, rx: Receiver<BranchMsg>) -> BranchOutcome {
    let mut ended = false;
    for msg in rx {
        match msg {
            BranchMsg::Setup(params) => branch.setup(params),
            BranchMsg::Frame(frame) => branch.deliver(&frame),
            BranchMsg::End(ending) => {
                branch.finish(&ending);
                ended = true;
                break;
            }
        }
    }
    if !ended {
        branch.finish(&Ending::Cancelled);
    }
    branch.into_outcome()
}

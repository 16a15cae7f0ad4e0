//! Cadence Core - processing graph engine for offline audio pipelines
//!
//! This crate wires heterogeneous processors (decode, analyze, transcode,
//! visualize) into a pipeline, drives it frame by frame, and aggregates the
//! results into one timestamped, serializable [`ResultSet`].
//!
//! # Core Abstractions
//!
//! ## Data
//!
//! - [`Frame`] - Immutable, reference-counted block of interleaved samples
//! - [`StreamFormat`] / [`FormatConstraint`] - Concrete and partial formats
//! - [`Reblocker`] - Per-edge re-slicing to a consumer's block size
//!
//! ## Processors
//!
//! - [`Processor`] - Object-safe trait for every graph node
//! - [`Role`] - Decoder, Analyzer, Transcoder or Grapher
//! - [`Emitter`] - Output sink for results and frames
//! - [`Decoder`] / [`Encoder`] - Contracts for external codecs
//! - [`Transcode`] - Processor wrapping an encoder
//! - [`ChannelMixer`] / [`LinearResampler`] - Format adapters
//!
//! ## Graph & Scheduling
//!
//! - [`PipelineGraph`] - DAG construction with build-time validation
//! - [`CompiledPlan`] - Deterministic topological order and branches
//! - [`Scheduler`] - Sequential or parallel execution with failure isolation
//! - [`RunContext`] - Run id, cancel token, execution mode, observer
//!
//! ## Results
//!
//! - [`ResultContainer`] - One processor's append-only timestamped records
//! - [`ResultSet`] - All containers of a run, keyed by processor id
//! - [`RunReport`] - Result set plus per-node statuses and artifacts
//!
//! # Example
//!
//! ```rust,ignore
//! use cadence_core::{PipelineGraph, RunContext, Scheduler};
//!
//! let mut graph = PipelineGraph::new();
//! graph.add_source(Box::new(decoder))?;
//! graph.add_branch("level", Box::new(level_meter))?;
//! graph.add_branch("centroid", Box::new(centroid))?;
//!
//! let report = Scheduler::new(RunContext::new("scan")).run(graph)?;
//! for container in report.results() {
//!     println!("{}: {} records", container.processor(), container.len());
//! }
//! ```

pub mod adapters;
pub mod codec;
pub mod error;
pub mod format;
pub mod frame;
pub mod graph;
pub mod lifecycle;
pub mod processor;
pub mod reblock;
pub mod results;
pub mod scheduler;

pub use adapters::{ChannelMixer, LinearResampler};
pub use codec::{Artifact, Decoder, Encoder, Transcode};
pub use error::{
    DecodeError, EncodeError, FrameError, GraphError, LifecycleError, NegotiationError,
    PipelineError, ProcessorError, ResultError,
};
pub use format::{FormatConstraint, SetupParams, SourceInfo, StreamFormat};
pub use frame::Frame;
pub use graph::{Branch, CompiledPlan, NodeId, PipelineGraph, SOURCE_ID};
pub use lifecycle::{Lifecycle, NodeStatus, ProcessorState, Stage};
pub use processor::{Emitter, FinalizeReason, Processor, ProcessorId, Role};
pub use reblock::Reblocker;
pub use results::{ContainerStatus, ResultContainer, ResultRecord, ResultSet, ResultValue, fingerprint};
pub use scheduler::{
    CancelToken, ExecutionMode, NoopObserver, RunContext, RunObserver, RunOutcome, RunReport,
    Scheduler,
};

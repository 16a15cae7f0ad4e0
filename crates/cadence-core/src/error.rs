//! Error taxonomy for the processing graph engine.
//!
//! Errors split into two classes:
//!
//! - **Fatal**: [`GraphError`] and [`DecodeError`] abort the whole run and are
//!   surfaced to the caller as [`PipelineError`]. No result set is produced.
//! - **Branch-local**: [`NegotiationError`], [`ProcessorError`] and
//!   [`EncodeError`] are caught at the scheduler's delivery boundary and
//!   recorded in the failing node's status. They never unwind past the
//!   scheduler.

use std::path::PathBuf;

use thiserror::Error;

use crate::graph::NodeId;
use crate::processor::{ProcessorId, Role};

/// Errors produced when constructing a [`Frame`](crate::Frame).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    /// A frame with zero length must be the end-of-stream marker.
    #[error("empty frame at offset {offset} is not marked as last")]
    EmptyFrame {
        /// Start offset of the rejected frame.
        offset: u64,
    },

    /// The sample buffer does not hold `length * channels` samples.
    #[error("frame holds {actual} samples, expected {expected}")]
    LengthMismatch {
        /// `length * channels`.
        expected: usize,
        /// Actual buffer length.
        actual: usize,
    },

    /// Channel count or sample rate is zero.
    #[error("invalid frame format: {channels} channels at {sample_rate} Hz")]
    InvalidFormat {
        /// Channel count.
        channels: u16,
        /// Sample rate in Hz.
        sample_rate: u32,
    },
}

/// Static topology errors. Raised while the graph is built or compiled,
/// before any frame flows.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    /// The specified node was not found in the graph.
    #[error("node {0} not found")]
    NodeNotFound(NodeId),

    /// Adding this edge would create a cycle.
    #[error("connecting {from} to {to} would create a cycle")]
    CycleDetected {
        /// Parent node.
        from: NodeId,
        /// Child node.
        to: NodeId,
    },

    /// The graph has no source decoder.
    #[error("graph has no source decoder")]
    MissingSource,

    /// A second source was added.
    #[error("graph already has a source decoder ({0})")]
    MultipleSources(NodeId),

    /// Two processors share an identifier.
    #[error("duplicate processor id '{0}'")]
    DuplicateId(ProcessorId),

    /// The same edge was added twice.
    #[error("edge from {0} to {1} already exists")]
    DuplicateEdge(NodeId, NodeId),

    /// A node already has a parent; frames have a single upstream.
    #[error("node {0} already has an incoming edge")]
    MultipleParents(NodeId),

    /// Nothing may feed into the source.
    #[error("cannot connect into the source node {0}")]
    IntoSource(NodeId),

    /// A non-source node has no path from the source.
    #[error("processor '{0}' is not connected to the source")]
    Unreachable(ProcessorId),

    /// A processor sits somewhere its role forbids.
    #[error("processor '{id}' with role {role} cannot be placed here: {reason}")]
    RolePlacement {
        /// Offending processor.
        id: ProcessorId,
        /// Its declared role.
        role: Role,
        /// What rule was broken.
        reason: String,
    },

    /// Statically known formats on either side of an edge disagree.
    #[error("processor '{child}' requires {required} but '{parent}' produces {produced}")]
    IncompatibleFormat {
        /// Upstream processor.
        parent: ProcessorId,
        /// Downstream processor.
        child: ProcessorId,
        /// What the child accepts.
        required: String,
        /// What the parent emits.
        produced: String,
    },

    /// A processor declared an input block size of zero.
    #[error("processor '{0}' declared a zero block size")]
    ZeroBlockSize(ProcessorId),
}

/// Source unreadable or corrupt. Always fatal.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The container header could not be parsed.
    #[error("malformed source header: {0}")]
    MalformedHeader(String),

    /// Sample data could not be decoded.
    #[error("corrupt data at offset {offset}: {reason}")]
    CorruptData {
        /// Offset (in sample frames) where decoding failed.
        offset: u64,
        /// Decoder-specific description.
        reason: String,
    },

    /// The codec or sample format is not supported.
    #[error("unsupported source format: {0}")]
    Unsupported(String),

    /// The source could not be opened.
    #[error("failed to open source '{path}': {source}")]
    Open {
        /// Source location.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Decoder output skipped or repeated samples.
    #[error("decoder produced offset {actual}, expected {expected}")]
    Discontinuity {
        /// Offset that continues the previous frame.
        expected: u64,
        /// Offset actually produced.
        actual: u64,
    },

    /// Decoder output changed format mid-stream.
    #[error("decoder switched format mid-stream: {0}")]
    FormatChanged(String),

    /// The decoder produced an invalid frame.
    #[error("decoder produced an invalid frame: {0}")]
    InvalidFrame(#[from] FrameError),

    /// `next_frame` was called before `open`.
    #[error("decoder was not opened")]
    NotOpen,
}

impl DecodeError {
    /// Create an open error.
    pub fn open(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        DecodeError::Open {
            path: path.into(),
            source,
        }
    }
}

/// A processor rejected the stream format offered at setup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NegotiationError {
    /// The sample rate is not supported.
    #[error("unsupported sample rate {0} Hz")]
    SampleRate(u32),

    /// The channel count is not supported.
    #[error("unsupported channel count {0}")]
    Channels(u16),

    /// Some other precondition is missing (e.g. unknown stream length).
    #[error("{0}")]
    Unsupported(String),
}

/// Encoder collaborator failure. Fatal for its transcoder branch only.
#[derive(Debug, Error)]
pub enum EncodeError {
    /// The output target could not be created.
    #[error("failed to open encoder target '{path}': {reason}")]
    Open {
        /// Output location.
        path: PathBuf,
        /// Encoder-specific description.
        reason: String,
    },

    /// Writing a frame failed.
    #[error("failed to write frame at offset {offset}: {reason}")]
    Write {
        /// Offset of the rejected frame.
        offset: u64,
        /// Encoder-specific description.
        reason: String,
    },

    /// A frame did not match the block size negotiated with the encoder.
    #[error("encoder expects blocks of {expected} frames, got {actual}")]
    BlockSize {
        /// Negotiated block size.
        expected: usize,
        /// Length of the offending frame.
        actual: usize,
    },

    /// Closing the artifact failed.
    #[error("failed to commit artifact: {0}")]
    Close(String),

    /// Encoder used outside its open/write/close sequence.
    #[error("encoder is not open")]
    NotOpen,
}

/// Illegal processor lifecycle transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot {action} a processor in state {state}")]
pub struct LifecycleError {
    /// Attempted operation.
    pub action: &'static str,
    /// State the processor was in.
    pub state: crate::lifecycle::ProcessorState,
}

/// Errors appending to a [`ResultContainer`](crate::ResultContainer) or
/// merging a [`ResultSet`](crate::ResultSet).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResultError {
    /// A record's timestamp is earlier than the previous record's.
    #[error("record at offset {offset} precedes previous record at {previous}")]
    NonMonotonic {
        /// Rejected offset.
        offset: u64,
        /// Last accepted offset.
        previous: u64,
    },

    /// The container was already sealed by finalize.
    #[error("container for '{0}' is sealed")]
    Sealed(ProcessorId),

    /// Two result sets hold a container for the same processor.
    #[error("result set already contains '{0}'")]
    DuplicateContainer(ProcessorId),
}

/// Runtime failure inside `process` or `finalize`. Isolated to one branch.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProcessorError {
    /// Processor-specific failure.
    #[error("{0}")]
    Failed(String),

    /// The processor panicked.
    #[error("processor panicked: {0}")]
    Panicked(String),

    /// Encoder collaborator failure (message of the underlying [`EncodeError`]).
    #[error("encode error: {0}")]
    Encode(String),

    /// A frame arrived out of order. Indicates an engine or upstream bug.
    #[error("frame at offset {actual} delivered out of order (expected {expected})")]
    OutOfOrderFrame {
        /// Offset that continues the previous frame.
        expected: u64,
        /// Offset delivered.
        actual: u64,
    },

    /// A frame arrived after the end-of-stream frame.
    #[error("frame at offset {0} delivered after end of stream")]
    AfterEndOfStream(u64),

    /// An emitted frame was invalid.
    #[error("emitted an invalid frame: {0}")]
    InvalidFrame(#[from] FrameError),

    /// Emitting a result violated container invariants.
    #[error("result error: {0}")]
    Result(#[from] ResultError),

    /// Lifecycle violation.
    #[error("lifecycle error: {0}")]
    Lifecycle(#[from] LifecycleError),
}

impl ProcessorError {
    /// Convenience constructor for processor-specific failures.
    pub fn failed(msg: impl Into<String>) -> Self {
        ProcessorError::Failed(msg.into())
    }
}

impl From<EncodeError> for ProcessorError {
    fn from(err: EncodeError) -> Self {
        ProcessorError::Encode(err.to_string())
    }
}

/// Fatal errors that abort a run.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Static topology or configuration failure.
    #[error("graph invalid: {0}")]
    GraphInvalid(#[from] GraphError),

    /// The source could not be decoded.
    #[error("decode failed: {0}")]
    Decode(#[from] DecodeError),

    /// A branch worker thread could not be joined.
    #[error("worker for branch '{0}' terminated abnormally")]
    Worker(ProcessorId),

    /// Branch result sets could not be merged.
    #[error("result aggregation failed: {0}")]
    Results(#[from] ResultError),
}

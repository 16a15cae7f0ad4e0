//! The `Processor` trait and its supporting types.
//!
//! A processor is one node of the pipeline graph. It declares a [`Role`],
//! an optional input block size, and the formats it accepts and produces.
//! The scheduler drives it through a fixed lifecycle:
//!
//! ```text
//! setup(SetupParams) ─► process(frame)* ─► finalize(reason)
//! ```
//!
//! Everything a processor outputs goes through an [`Emitter`]: result values
//! end up in the processor's [`ResultContainer`](crate::ResultContainer),
//! frames are delivered to its children.
//!
//! # Example
//!
//! ```rust
//! use cadence_core::{
//!     Emitter, FinalizeReason, Frame, NegotiationError, Processor, ProcessorError,
//!     ResultValue, Role, SetupParams,
//! };
//!
//! struct FrameCounter(u64);
//!
//! impl Processor for FrameCounter {
//!     fn kind(&self) -> &'static str { "counter" }
//!     fn role(&self) -> Role { Role::Analyzer }
//!
//!     fn setup(&mut self, params: &SetupParams) -> Result<SetupParams, NegotiationError> {
//!         Ok(*params)
//!     }
//!
//!     fn process(&mut self, frame: &Frame, _out: &mut Emitter) -> Result<(), ProcessorError> {
//!         self.0 += frame.len() as u64;
//!         Ok(())
//!     }
//!
//!     fn finalize(&mut self, _: FinalizeReason, out: &mut Emitter) -> Result<(), ProcessorError> {
//!         out.emit_at(0, ResultValue::Scalar(self.0 as f64));
//!         Ok(())
//!     }
//! }
//! ```

use core::fmt;
use std::borrow::Borrow;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::codec::Artifact;
use crate::error::{NegotiationError, ProcessorError};
use crate::format::{FormatConstraint, SetupParams};
use crate::frame::Frame;
use crate::results::{ResultRecord, ResultValue};

/// Capability a processor declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Produces frames from an external source. Only the graph source has this role.
    Decoder,
    /// Consumes frames and emits timestamped results.
    Analyzer,
    /// Consumes frames and forwards (possibly transformed) frames.
    Transcoder,
    /// Consumes frames and emits a visualization.
    Grapher,
}

impl Role {
    /// Returns true for roles that own a result container.
    pub fn owns_results(self) -> bool {
        matches!(self, Role::Analyzer | Role::Grapher)
    }

    /// Returns true for roles that may feed other processors.
    pub fn can_feed(self) -> bool {
        matches!(self, Role::Decoder | Role::Transcoder)
    }

    /// Lowercase name.
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Decoder => "decoder",
            Role::Analyzer => "analyzer",
            Role::Transcoder => "transcoder",
            Role::Grapher => "grapher",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stable processor identity used for result attribution.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProcessorId(String);

impl ProcessorId {
    /// Creates an id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProcessorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for ProcessorId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ProcessorId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ProcessorId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Why `finalize` is being called.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FinalizeReason {
    /// The processor received the whole stream.
    EndOfStream,
    /// The run was cancelled; the processor saw a prefix of the stream.
    Cancelled,
    /// An ancestor failed; no more frames will arrive.
    UpstreamFailed,
}

impl fmt::Display for FinalizeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FinalizeReason::EndOfStream => "end of stream",
            FinalizeReason::Cancelled => "cancelled",
            FinalizeReason::UpstreamFailed => "upstream failed",
        })
    }
}

/// Output sink handed to `process` and `finalize`.
///
/// Values emitted with [`emit`](Self::emit) are stamped with the current
/// offset: the start offset of the frame being processed, or the end of the
/// processor's stream during finalize.
#[derive(Debug, Default)]
pub struct Emitter {
    offset: u64,
    records: Vec<ResultRecord>,
    metadata: Vec<(String, String)>,
    frames: Vec<Frame>,
}

impl Emitter {
    /// Creates an emitter stamping values with `offset`.
    pub fn new(offset: u64) -> Self {
        Self {
            offset,
            ..Self::default()
        }
    }

    /// Offset used by [`emit`](Self::emit).
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Emits a value at the current offset.
    pub fn emit(&mut self, value: ResultValue) {
        let offset = self.offset;
        self.emit_at(offset, value);
    }

    /// Emits a value at an explicit offset (windowed features, segments).
    pub fn emit_at(&mut self, offset: u64, value: ResultValue) {
        self.records.push(ResultRecord { offset, value });
    }

    /// Forwards a frame to this processor's children.
    pub fn emit_frame(&mut self, frame: Frame) {
        self.frames.push(frame);
    }

    /// Sets a metadata entry on the processor's container.
    pub fn set_metadata(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.metadata.push((key.into(), value.into()));
    }

    /// Emitted records, in emission order.
    pub fn records(&self) -> &[ResultRecord] {
        &self.records
    }

    /// Emitted frames, in emission order.
    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    /// Metadata entries, in emission order.
    pub fn metadata(&self) -> &[(String, String)] {
        &self.metadata
    }

    /// Takes the emitted records.
    pub fn take_records(&mut self) -> Vec<ResultRecord> {
        std::mem::take(&mut self.records)
    }

    /// Takes the emitted frames.
    pub fn take_frames(&mut self) -> Vec<Frame> {
        std::mem::take(&mut self.frames)
    }

    /// Takes the metadata entries.
    pub fn take_metadata(&mut self) -> Vec<(String, String)> {
        std::mem::take(&mut self.metadata)
    }
}

/// A node of the pipeline graph.
///
/// Implementations hold their own mutable state and serve exactly one run.
/// They never see another branch's state: frames are shared read-only and
/// each result container has a single writer.
pub trait Processor: Send {
    /// Stable kind tag (the registry id).
    fn kind(&self) -> &'static str;

    /// Declared role.
    fn role(&self) -> Role;

    /// Input block size in sample frames. The engine re-blocks to it.
    ///
    /// `None` receives upstream frames unchanged.
    fn block_size(&self) -> Option<usize> {
        None
    }

    /// Input format requirement, checked at build time when the upstream
    /// format is statically known and again at setup.
    fn accepts(&self) -> FormatConstraint {
        FormatConstraint::ANY
    }

    /// Output format, for processors that forward frames.
    ///
    /// Unfixed fields mean "same as input".
    fn produces(&self) -> FormatConstraint {
        FormatConstraint::ANY
    }

    /// Returns true for format adapters inserted by
    /// [`connect_adapted`](crate::PipelineGraph::connect_adapted).
    fn is_adapter(&self) -> bool {
        false
    }

    /// Parameter echo, recorded in metadata and hashed into the fingerprint.
    fn params(&self) -> BTreeMap<String, String> {
        BTreeMap::new()
    }

    /// Negotiates the input stream.
    ///
    /// Returns the parameters this processor offers its children: its output
    /// format and stream length. Processors that do not forward frames
    /// return `params` unchanged.
    fn setup(&mut self, params: &SetupParams) -> Result<SetupParams, NegotiationError>;

    /// Handles one frame. Frames arrive in contiguous offset order.
    fn process(&mut self, frame: &Frame, out: &mut Emitter) -> Result<(), ProcessorError>;

    /// Flushes buffered state. Called at most once.
    fn finalize(&mut self, reason: FinalizeReason, out: &mut Emitter)
    -> Result<(), ProcessorError>;

    /// Artifact committed during finalize (transcoders).
    fn artifact(&self) -> Option<Artifact> {
        None
    }
}

//! Test processors and decoders shared by the integration and property tests.
#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use cadence_core::{
    Artifact, DecodeError, Decoder, Emitter, EncodeError, Encoder, FinalizeReason,
    FormatConstraint, Frame, NegotiationError, Processor, ProcessorError, ResultValue, Role,
    SetupParams, SourceInfo, StreamFormat,
};

/// Deterministic test signal value for sample frame `i`.
pub fn ramp_value(i: u64) -> f32 {
    (i % 1000) as f32 / 1000.0 - 0.5
}

/// Decoder producing a deterministic ramp, with optional faults.
pub struct RampDecoder {
    format: StreamFormat,
    total: u64,
    block: usize,
    pos: u64,
    broken_header: bool,
    fail_at: Option<u64>,
    skip_at: Option<u64>,
    announce_length: bool,
    closed: Arc<AtomicUsize>,
}

impl RampDecoder {
    pub fn new(format: StreamFormat, total: u64, block: usize) -> Self {
        Self {
            format,
            total,
            block,
            pos: 0,
            broken_header: false,
            fail_at: None,
            skip_at: None,
            announce_length: true,
            closed: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn mono(total: u64, block: usize) -> Self {
        Self::new(StreamFormat::mono(44100), total, block)
    }

    pub fn broken_header(mut self) -> Self {
        self.broken_header = true;
        self
    }

    /// Fails with corrupt data once `offset` is reached.
    pub fn fail_at(mut self, offset: u64) -> Self {
        self.fail_at = Some(offset);
        self
    }

    /// Jumps forward by one block at `offset`, producing a gap.
    pub fn skip_at(mut self, offset: u64) -> Self {
        self.skip_at = Some(offset);
        self
    }

    pub fn unknown_length(mut self) -> Self {
        self.announce_length = false;
        self
    }

    /// Counts calls to `close`.
    pub fn close_count(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.closed)
    }
}

impl Decoder for RampDecoder {
    fn open(&mut self) -> Result<SourceInfo, DecodeError> {
        if self.broken_header {
            return Err(DecodeError::MalformedHeader("missing RIFF tag".into()));
        }
        Ok(SourceInfo {
            format: self.format,
            total_frames: self.announce_length.then_some(self.total),
            block_size: self.block,
        })
    }

    fn next_frame(&mut self) -> Result<Option<Frame>, DecodeError> {
        if self.pos >= self.total {
            return Ok(None);
        }
        if let Some(at) = self.fail_at
            && self.pos >= at
        {
            return Err(DecodeError::CorruptData {
                offset: self.pos,
                reason: "bad packet".into(),
            });
        }
        if self.skip_at == Some(self.pos) {
            self.pos += self.block as u64;
            self.skip_at = None;
        }
        let len = (self.total - self.pos).min(self.block as u64) as usize;
        let channels = self.format.channels as usize;
        let samples: Vec<f32> = (0..len as u64)
            .flat_map(|i| std::iter::repeat_n(ramp_value(self.pos + i), channels))
            .collect();
        let is_last = self.pos + len as u64 >= self.total;
        let frame = Frame::new(samples, self.format, self.pos, len, is_last)?;
        self.pos += len as u64;
        Ok(Some(frame))
    }

    fn close(&mut self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }

    fn describe(&self) -> String {
        format!("ramp ({} frames)", self.total)
    }
}

/// What a [`Recorder`] observed.
#[derive(Debug, Default)]
pub struct Observed {
    /// `(start_offset, len, is_last)` per processed frame.
    pub frames: Mutex<Vec<(u64, usize, bool)>>,
    /// Every sample received (first channel).
    pub samples: Mutex<Vec<f32>>,
    pub finalize_calls: AtomicUsize,
    pub reasons: Mutex<Vec<FinalizeReason>>,
}

impl Observed {
    pub fn offsets(&self) -> Vec<u64> {
        self.frames.lock().unwrap().iter().map(|f| f.0).collect()
    }

    pub fn finalized(&self) -> usize {
        self.finalize_calls.load(Ordering::SeqCst)
    }
}

/// Analyzer emitting the mean of every frame it receives.
pub struct Recorder {
    block: Option<usize>,
    accepts: FormatConstraint,
    observed: Arc<Observed>,
}

impl Recorder {
    pub fn new(block: Option<usize>) -> (Self, Arc<Observed>) {
        let observed = Arc::new(Observed::default());
        (
            Self {
                block,
                accepts: FormatConstraint::ANY,
                observed: Arc::clone(&observed),
            },
            observed,
        )
    }

    pub fn accepting(mut self, accepts: FormatConstraint) -> Self {
        self.accepts = accepts;
        self
    }
}

impl Processor for Recorder {
    fn kind(&self) -> &'static str {
        "recorder"
    }

    fn role(&self) -> Role {
        Role::Analyzer
    }

    fn block_size(&self) -> Option<usize> {
        self.block
    }

    fn accepts(&self) -> FormatConstraint {
        self.accepts
    }

    fn params(&self) -> BTreeMap<String, String> {
        let mut params = BTreeMap::new();
        if let Some(block) = self.block {
            params.insert("block_size".to_string(), block.to_string());
        }
        params
    }

    fn setup(&mut self, params: &SetupParams) -> Result<SetupParams, NegotiationError> {
        Ok(*params)
    }

    fn process(&mut self, frame: &Frame, out: &mut Emitter) -> Result<(), ProcessorError> {
        self.observed
            .frames
            .lock()
            .unwrap()
            .push((frame.start_offset(), frame.len(), frame.is_last()));
        self.observed
            .samples
            .lock()
            .unwrap()
            .extend(frame.channel(0));
        if !frame.is_empty() {
            let mean = frame.samples().iter().map(|&s| f64::from(s)).sum::<f64>()
                / frame.samples().len() as f64;
            out.emit(ResultValue::Scalar(mean));
        }
        Ok(())
    }

    fn finalize(&mut self, reason: FinalizeReason, out: &mut Emitter) -> Result<(), ProcessorError> {
        self.observed.finalize_calls.fetch_add(1, Ordering::SeqCst);
        self.observed.reasons.lock().unwrap().push(reason);
        out.set_metadata("unit", "mean");
        Ok(())
    }
}

/// How a [`Faulty`] analyzer misbehaves.
#[derive(Debug, Clone, Copy)]
pub enum Fault {
    Error,
    Panic,
    FinalizeError,
    BackwardsTimestamp,
}

/// Analyzer that fails once it reaches `at`.
pub struct Faulty {
    fault: Fault,
    at: u64,
    finalized: Arc<AtomicUsize>,
}

impl Faulty {
    pub fn new(fault: Fault, at: u64) -> (Self, Arc<AtomicUsize>) {
        let finalized = Arc::new(AtomicUsize::new(0));
        (
            Self {
                fault,
                at,
                finalized: Arc::clone(&finalized),
            },
            finalized,
        )
    }
}

impl Processor for Faulty {
    fn kind(&self) -> &'static str {
        "faulty"
    }

    fn role(&self) -> Role {
        Role::Analyzer
    }

    fn block_size(&self) -> Option<usize> {
        Some(1024)
    }

    fn setup(&mut self, params: &SetupParams) -> Result<SetupParams, NegotiationError> {
        Ok(*params)
    }

    fn process(&mut self, frame: &Frame, out: &mut Emitter) -> Result<(), ProcessorError> {
        if frame.start_offset() >= self.at {
            match self.fault {
                Fault::Error => return Err(ProcessorError::failed("synthetic failure")),
                Fault::Panic => panic!("synthetic panic at {}", frame.start_offset()),
                Fault::BackwardsTimestamp => {
                    // The first record is fine on its own; the second goes back.
                    out.emit_at(frame.start_offset() + 100, ResultValue::Scalar(1.0));
                    out.emit_at(frame.start_offset(), ResultValue::Scalar(-1.0));
                    return Ok(());
                }
                Fault::FinalizeError => {}
            }
        }
        out.emit(ResultValue::Scalar(frame.len() as f64));
        Ok(())
    }

    fn finalize(&mut self, _reason: FinalizeReason, _out: &mut Emitter) -> Result<(), ProcessorError> {
        self.finalized.fetch_add(1, Ordering::SeqCst);
        match self.fault {
            Fault::FinalizeError => Err(ProcessorError::failed("flush failed")),
            _ => Ok(()),
        }
    }
}

/// In-memory encoder collecting every sample it is given.
pub struct CollectEncoder {
    format: Option<StreamFormat>,
    samples: Arc<Mutex<Vec<f32>>>,
    frames: u64,
    block: Option<usize>,
    fail_at: Option<u64>,
}

impl CollectEncoder {
    pub fn new() -> (Self, Arc<Mutex<Vec<f32>>>) {
        let samples = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                format: None,
                samples: Arc::clone(&samples),
                frames: 0,
                block: None,
                fail_at: None,
            },
            samples,
        )
    }

    pub fn with_block(mut self, block: usize) -> Self {
        self.block = Some(block);
        self
    }

    pub fn fail_at(mut self, offset: u64) -> Self {
        self.fail_at = Some(offset);
        self
    }
}

impl Encoder for CollectEncoder {
    fn kind(&self) -> &'static str {
        "collect"
    }

    fn block_size(&self) -> Option<usize> {
        self.block
    }

    fn open(&mut self, format: StreamFormat) -> Result<(), EncodeError> {
        self.format = Some(format);
        Ok(())
    }

    fn write(&mut self, frame: &Frame) -> Result<(), EncodeError> {
        if let Some(at) = self.fail_at
            && frame.start_offset() >= at
        {
            return Err(EncodeError::Write {
                offset: frame.start_offset(),
                reason: "device full".into(),
            });
        }
        if let Some(block) = self.block
            && frame.len() != block
            && !frame.is_last()
        {
            return Err(EncodeError::BlockSize {
                expected: block,
                actual: frame.len(),
            });
        }
        self.samples.lock().unwrap().extend_from_slice(frame.samples());
        self.frames += frame.len() as u64;
        Ok(())
    }

    fn close(&mut self) -> Result<Artifact, EncodeError> {
        Ok(Artifact {
            location: "memory".into(),
            format: self.format.ok_or(EncodeError::NotOpen)?,
            frames: self.frames,
        })
    }
}

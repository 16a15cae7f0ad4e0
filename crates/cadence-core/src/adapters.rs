//! Format adapters.
//!
//! Adapters are transcoders that convert the stream into the format a
//! downstream processor requires. [`PipelineGraph::connect_adapted`]
//! inserts them automatically; analyzers and graphers may sit behind a chain
//! of adapters as if they were direct children of the source.
//!
//! [`PipelineGraph::connect_adapted`]: crate::PipelineGraph::connect_adapted

use std::collections::BTreeMap;

use crate::error::{NegotiationError, ProcessorError};
use crate::format::{FormatConstraint, SetupParams, StreamFormat};
use crate::frame::Frame;
use crate::processor::{Emitter, FinalizeReason, Processor, Role};

/// Converts between channel layouts.
///
/// - N → 1: averages all channels
/// - 1 → M: duplicates the mono channel
/// - N → M otherwise: keeps the first M channels, zero-filling missing ones
///
/// Matching layouts pass frames through without copying.
#[derive(Debug, Clone)]
pub struct ChannelMixer {
    channels: u16,
}

impl ChannelMixer {
    /// Creates a mixer producing `channels` channels.
    pub fn new(channels: u16) -> Self {
        Self { channels }
    }
}

impl Processor for ChannelMixer {
    fn kind(&self) -> &'static str {
        "channel_mixer"
    }

    fn role(&self) -> Role {
        Role::Transcoder
    }

    fn produces(&self) -> FormatConstraint {
        FormatConstraint::channels(self.channels)
    }

    fn is_adapter(&self) -> bool {
        true
    }

    fn params(&self) -> BTreeMap<String, String> {
        BTreeMap::from([("channels".to_string(), self.channels.to_string())])
    }

    fn setup(&mut self, params: &SetupParams) -> Result<SetupParams, NegotiationError> {
        if self.channels == 0 {
            return Err(NegotiationError::Channels(0));
        }
        Ok(SetupParams {
            format: StreamFormat::new(params.format.sample_rate, self.channels),
            total_frames: params.total_frames,
        })
    }

    fn process(&mut self, frame: &Frame, out: &mut Emitter) -> Result<(), ProcessorError> {
        let in_ch = frame.channels() as usize;
        let out_ch = self.channels as usize;
        if in_ch == out_ch {
            out.emit_frame(frame.clone());
            return Ok(());
        }

        let samples: Vec<f32> = if out_ch == 1 {
            frame.mixdown()
        } else if in_ch == 1 {
            frame
                .samples()
                .iter()
                .flat_map(|&s| std::iter::repeat_n(s, out_ch))
                .collect()
        } else {
            frame
                .samples()
                .chunks_exact(in_ch)
                .flat_map(|chunk| (0..out_ch).map(move |c| chunk.get(c).copied().unwrap_or(0.0)))
                .collect()
        };

        let format = StreamFormat::new(frame.sample_rate(), self.channels);
        out.emit_frame(Frame::new(
            samples,
            format,
            frame.start_offset(),
            frame.len(),
            frame.is_last(),
        )?);
        Ok(())
    }

    fn finalize(&mut self, _reason: FinalizeReason, _out: &mut Emitter) -> Result<(), ProcessorError> {
        Ok(())
    }
}

/// Streaming sample-rate converter using linear interpolation.
///
/// Output offsets are contiguous in the new timeline. Output sample `k`
/// sits at input position `k * in_rate / out_rate`; the position is computed
/// in integers so long streams do not drift.
#[derive(Debug, Clone)]
pub struct LinearResampler {
    target_rate: u32,
    input_rate: u32,
    channels: usize,
    /// Interleaved input not yet consumed.
    buffer: Vec<f32>,
    /// Input index (relative to the first input frame) of `buffer[0]`.
    base: u64,
    /// Input frames received.
    received: u64,
    /// Next output index.
    next_out: u64,
    /// Output offset corresponding to output index 0.
    out_origin: Option<u64>,
}

impl LinearResampler {
    /// Creates a resampler producing `target_rate` Hz.
    pub fn new(target_rate: u32) -> Self {
        Self {
            target_rate,
            input_rate: 0,
            channels: 0,
            buffer: Vec::new(),
            base: 0,
            received: 0,
            next_out: 0,
            out_origin: None,
        }
    }

    fn passthrough(&self) -> bool {
        self.input_rate == self.target_rate
    }

    /// Produces every output sample computable from the buffered input.
    ///
    /// With `flush` set the final input sample is held for positions past
    /// the end of the stream.
    fn render(&mut self, flush: bool) -> Vec<f32> {
        let ch = self.channels;
        let in_rate = u64::from(self.input_rate);
        let out_rate = u64::from(self.target_rate);
        let mut out = Vec::new();

        loop {
            let num = self.next_out * in_rate;
            let i = num / out_rate;
            if i >= self.received {
                break;
            }
            let j = if i + 1 < self.received {
                i + 1
            } else if flush {
                i
            } else {
                break;
            };
            let frac = (num % out_rate) as f32 / out_rate as f32;
            let a = (i - self.base) as usize * ch;
            let b = (j - self.base) as usize * ch;
            for c in 0..ch {
                let x0 = self.buffer[a + c];
                let x1 = self.buffer[b + c];
                out.push(x0 + (x1 - x0) * frac);
            }
            self.next_out += 1;
        }

        let keep_from = ((self.next_out * in_rate) / out_rate).min(self.received);
        let drop = (keep_from - self.base) as usize * ch;
        self.buffer.drain(..drop);
        self.base = keep_from;
        out
    }
}

impl Processor for LinearResampler {
    fn kind(&self) -> &'static str {
        "resampler"
    }

    fn role(&self) -> Role {
        Role::Transcoder
    }

    fn produces(&self) -> FormatConstraint {
        FormatConstraint::sample_rate(self.target_rate)
    }

    fn is_adapter(&self) -> bool {
        true
    }

    fn params(&self) -> BTreeMap<String, String> {
        BTreeMap::from([("sample_rate".to_string(), self.target_rate.to_string())])
    }

    fn setup(&mut self, params: &SetupParams) -> Result<SetupParams, NegotiationError> {
        if self.target_rate == 0 {
            return Err(NegotiationError::SampleRate(0));
        }
        self.input_rate = params.format.sample_rate;
        self.channels = params.format.channels as usize;
        let in_rate = u64::from(self.input_rate);
        let out_rate = u64::from(self.target_rate);
        Ok(SetupParams {
            format: StreamFormat::new(self.target_rate, params.format.channels),
            total_frames: params
                .total_frames
                .map(|n| (n * out_rate).div_ceil(in_rate)),
        })
    }

    fn process(&mut self, frame: &Frame, out: &mut Emitter) -> Result<(), ProcessorError> {
        if self.passthrough() {
            out.emit_frame(frame.clone());
            return Ok(());
        }

        let (in_rate, out_rate) = (u64::from(self.input_rate), u64::from(self.target_rate));
        let origin = *self
            .out_origin
            .get_or_insert_with(|| frame.start_offset() * out_rate / in_rate);
        let start = origin + self.next_out;

        self.buffer.extend_from_slice(frame.samples());
        self.received += frame.len() as u64;
        let samples = self.render(frame.is_last());

        if samples.is_empty() && !frame.is_last() {
            return Ok(());
        }
        let format = StreamFormat::new(self.target_rate, frame.channels());
        out.emit_frame(Frame::from_interleaved(
            samples,
            format,
            start,
            frame.is_last(),
        )?);
        Ok(())
    }

    fn finalize(&mut self, _reason: FinalizeReason, _out: &mut Emitter) -> Result<(), ProcessorError> {
        Ok(())
    }
}

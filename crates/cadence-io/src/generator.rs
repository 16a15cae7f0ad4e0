//! Synthetic test sources.
//!
//! [`NoiseDecoder`] stands in for a real file in tests and demos. It can be
//! told to have a broken header, failing either at open or halfway through
//! the stream, which exercises the fatal decode path end to end.
//! [`Signal::render`] produces whole buffers for writing test WAV files.

use std::f32::consts::TAU;
use std::fmt;
use std::str::FromStr;

use cadence_core::{DecodeError, Decoder, Frame, SourceInfo, StreamFormat};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// How a [`NoiseDecoder`]'s header is broken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrokenHeader {
    /// `open` fails.
    AtOpen,
    /// Reading past half of the declared length fails.
    MidStream,
}

/// Decoder producing uniform white noise in `[-1, 1)`.
#[derive(Debug)]
pub struct NoiseDecoder {
    format: StreamFormat,
    total: u64,
    block_size: usize,
    seed: u64,
    broken: Option<BrokenHeader>,
    rng: Option<StdRng>,
    pos: u64,
}

impl NoiseDecoder {
    /// Default block size, in sample frames.
    pub const DEFAULT_BLOCK: usize = 1024;

    /// Mono 44.1 kHz noise of `total` sample frames.
    pub fn new(total: u64) -> Self {
        Self {
            format: StreamFormat::mono(44100),
            total,
            block_size: Self::DEFAULT_BLOCK,
            seed: 0,
            broken: None,
            rng: None,
            pos: 0,
        }
    }

    /// Sets the stream format.
    pub fn with_format(mut self, format: StreamFormat) -> Self {
        self.format = format;
        self
    }

    /// Sets the block size.
    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size.max(1);
        self
    }

    /// Sets the random seed; equal seeds produce equal streams.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Breaks the header.
    pub fn with_broken_header(mut self, broken: BrokenHeader) -> Self {
        self.broken = Some(broken);
        self
    }
}

impl Decoder for NoiseDecoder {
    fn open(&mut self) -> Result<SourceInfo, DecodeError> {
        if self.broken == Some(BrokenHeader::AtOpen) {
            return Err(DecodeError::MalformedHeader(
                "noise source has a broken header".to_string(),
            ));
        }
        self.rng = Some(StdRng::seed_from_u64(self.seed));
        self.pos = 0;
        Ok(SourceInfo {
            format: self.format,
            total_frames: Some(self.total),
            block_size: self.block_size,
        })
    }

    fn next_frame(&mut self) -> Result<Option<Frame>, DecodeError> {
        let rng = self.rng.as_mut().ok_or(DecodeError::NotOpen)?;
        if self.pos >= self.total {
            return Ok(None);
        }
        let len = (self.total - self.pos).min(self.block_size as u64);
        if self.broken == Some(BrokenHeader::MidStream) && self.pos + len > self.total / 2 {
            return Err(DecodeError::CorruptData {
                offset: self.pos,
                reason: "read past the end of a broken header".to_string(),
            });
        }
        let count = len as usize * self.format.channels as usize;
        let samples: Vec<f32> = (0..count).map(|_| rng.gen_range(-1.0..1.0)).collect();
        let frame = Frame::new(
            samples,
            self.format,
            self.pos,
            len as usize,
            self.pos + len == self.total,
        )?;
        self.pos += len;
        Ok(Some(frame))
    }

    fn describe(&self) -> String {
        format!("noise ({} frames, {})", self.total, self.format)
    }
}

/// Test signal shapes for generated files.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Signal {
    /// All zeros.
    Silence,
    /// Uniform white noise.
    Noise {
        /// Random seed.
        seed: u64,
    },
    /// Sine tone.
    Sine {
        /// Frequency in Hz.
        freq: f32,
    },
}

impl Signal {
    /// Renders `frames` sample frames at `amplitude`, identical on every channel.
    pub fn render(&self, format: StreamFormat, frames: usize, amplitude: f32) -> Vec<f32> {
        let channels = format.channels as usize;
        let mono: Vec<f32> = match *self {
            Signal::Silence => vec![0.0; frames],
            Signal::Noise { seed } => {
                let mut rng = StdRng::seed_from_u64(seed);
                (0..frames)
                    .map(|_| amplitude * rng.gen_range(-1.0..1.0))
                    .collect()
            }
            Signal::Sine { freq } => (0..frames)
                .map(|i| amplitude * (TAU * freq * i as f32 / format.sample_rate as f32).sin())
                .collect(),
        };
        mono.into_iter()
            .flat_map(|s| std::iter::repeat_n(s, channels))
            .collect()
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signal::Silence => f.write_str("silence"),
            Signal::Noise { .. } => f.write_str("noise"),
            Signal::Sine { freq } => write!(f, "sine {freq} Hz"),
        }
    }
}

impl FromStr for Signal {
    type Err = String;

    /// Parses `silence`, `noise`, `sine` (440 Hz) or `sine:<freq>`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "silence" => Ok(Signal::Silence),
            "noise" => Ok(Signal::Noise { seed: 0 }),
            "sine" => Ok(Signal::Sine { freq: 440.0 }),
            other => {
                let freq = other
                    .strip_prefix("sine:")
                    .ok_or_else(|| format!("unknown signal '{s}' (expected silence, noise or sine[:HZ])"))?;
                let freq: f32 = freq
                    .trim_end_matches("hz")
                    .trim()
                    .parse()
                    .map_err(|_| format!("invalid sine frequency '{freq}'"))?;
                if freq <= 0.0 || !freq.is_finite() {
                    return Err(format!("sine frequency must be positive, got {freq}"));
                }
                Ok(Signal::Sine { freq })
            }
        }
    }
}

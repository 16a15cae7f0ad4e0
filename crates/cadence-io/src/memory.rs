//! In-memory sources and sinks.

use std::sync::{Arc, Mutex, PoisonError};

use cadence_core::{
    Artifact, DecodeError, Decoder, EncodeError, Encoder, Frame, SourceInfo, StreamFormat,
};

/// [`Decoder`] over an interleaved sample buffer.
#[derive(Debug, Clone)]
pub struct MemoryDecoder {
    samples: Arc<[f32]>,
    format: StreamFormat,
    block_size: usize,
    pos: usize,
    opened: bool,
}

impl MemoryDecoder {
    /// Default block size, in sample frames.
    pub const DEFAULT_BLOCK: usize = 1024;

    /// Creates a decoder over `samples` (interleaved by `format.channels`).
    ///
    /// A trailing partial sample frame is ignored.
    pub fn new(samples: impl Into<Arc<[f32]>>, format: StreamFormat) -> Self {
        Self {
            samples: samples.into(),
            format,
            block_size: Self::DEFAULT_BLOCK,
            pos: 0,
            opened: false,
        }
    }

    /// Sets the block size.
    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size.max(1);
        self
    }

    fn total_frames(&self) -> usize {
        self.samples.len() / self.format.channels.max(1) as usize
    }
}

impl Decoder for MemoryDecoder {
    fn open(&mut self) -> Result<SourceInfo, DecodeError> {
        if self.format.channels == 0 || self.format.sample_rate == 0 {
            return Err(DecodeError::MalformedHeader(format!(
                "invalid in-memory format {}",
                self.format
            )));
        }
        self.opened = true;
        self.pos = 0;
        Ok(SourceInfo {
            format: self.format,
            total_frames: Some(self.total_frames() as u64),
            block_size: self.block_size,
        })
    }

    fn next_frame(&mut self) -> Result<Option<Frame>, DecodeError> {
        if !self.opened {
            return Err(DecodeError::NotOpen);
        }
        let total = self.total_frames();
        if self.pos >= total {
            return Ok(None);
        }
        let channels = self.format.channels as usize;
        let len = (total - self.pos).min(self.block_size);
        let samples = self.samples[self.pos * channels..(self.pos + len) * channels].to_vec();
        let frame = Frame::new(
            samples,
            self.format,
            self.pos as u64,
            len,
            self.pos + len == total,
        )?;
        self.pos += len;
        Ok(Some(frame))
    }

    fn describe(&self) -> String {
        format!("memory ({} frames, {})", self.total_frames(), self.format)
    }
}

/// Shared view of what a [`MemoryEncoder`] has written.
#[derive(Debug, Clone, Default)]
pub struct MemoryBuffer(Arc<Mutex<Vec<f32>>>);

impl MemoryBuffer {
    /// Copy of the interleaved samples written so far.
    pub fn samples(&self) -> Vec<f32> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Number of samples written so far (all channels).
    pub fn len(&self) -> usize {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Returns true if nothing was written.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn extend(&self, samples: &[f32]) {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(samples);
    }
}

/// [`Encoder`] collecting samples in memory.
#[derive(Debug, Default)]
pub struct MemoryEncoder {
    buffer: MemoryBuffer,
    block_size: Option<usize>,
    format: Option<StreamFormat>,
    frames: u64,
}

impl MemoryEncoder {
    /// Creates an encoder and the handle to read its output.
    pub fn new() -> (Self, MemoryBuffer) {
        let encoder = Self::default();
        let buffer = encoder.buffer.clone();
        (encoder, buffer)
    }

    /// Requires input in blocks of `block_size` frames.
    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = Some(block_size);
        self
    }
}

impl Encoder for MemoryEncoder {
    fn kind(&self) -> &'static str {
        "memory"
    }

    fn block_size(&self) -> Option<usize> {
        self.block_size
    }

    fn open(&mut self, format: StreamFormat) -> Result<(), EncodeError> {
        self.format = Some(format);
        Ok(())
    }

    fn write(&mut self, frame: &Frame) -> Result<(), EncodeError> {
        if self.format.is_none() {
            return Err(EncodeError::NotOpen);
        }
        if let Some(block) = self.block_size
            && frame.len() != block
            && !frame.is_last()
        {
            return Err(EncodeError::BlockSize {
                expected: block,
                actual: frame.len(),
            });
        }
        self.buffer.extend(frame.samples());
        self.frames += frame.len() as u64;
        Ok(())
    }

    fn close(&mut self) -> Result<Artifact, EncodeError> {
        Ok(Artifact {
            location: "memory".to_string(),
            format: self.format.ok_or(EncodeError::NotOpen)?,
            frames: self.frames,
        })
    }
}

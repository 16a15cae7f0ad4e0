//! Per-edge re-blocking.
//!
//! Producers and consumers disagree on block size: a decoder may deliver
//! 4096-frame packets while an analyzer wants 1024-frame windows. A
//! [`Reblocker`] sits on the edge between them, accumulates incoming frames,
//! and re-slices them into frames of exactly the consumer's size.
//!
//! Invariants:
//!
//! - Output offsets are contiguous and start at the first input offset.
//! - The concatenation of all output samples equals the concatenation of all
//!   input samples. Nothing is dropped, padded, or duplicated.
//! - `is_last` is forwarded only on the final block, which may be shorter
//!   than the requested size.
//! - A frame that already lines up with the block grid is forwarded as is,
//!   sharing its buffer.

use crate::error::FrameError;
use crate::format::StreamFormat;
use crate::frame::Frame;

/// Accumulates frames and re-emits them in fixed-size blocks.
#[derive(Debug)]
pub struct Reblocker {
    block_size: usize,
    format: Option<StreamFormat>,
    /// Interleaved samples not yet emitted.
    pending: Vec<f32>,
    /// Offset of `pending[0]`.
    next_offset: u64,
    started: bool,
    finished: bool,
}

impl Reblocker {
    /// Creates a re-blocker emitting frames of `block_size` sample frames.
    ///
    /// # Panics
    ///
    /// Panics if `block_size` is zero. The graph rejects zero block sizes at
    /// build time, so this only fires on direct misuse.
    pub fn new(block_size: usize) -> Self {
        assert!(block_size > 0, "block size must be non-zero");
        Self {
            block_size,
            format: None,
            pending: Vec::new(),
            next_offset: 0,
            started: false,
            finished: false,
        }
    }

    /// Requested output block size in sample frames.
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Number of buffered sample frames awaiting a full block.
    pub fn pending_frames(&self) -> usize {
        match self.format {
            Some(fmt) => self.pending.len() / fmt.channels as usize,
            None => 0,
        }
    }

    /// Returns true once the final block has been emitted.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Accepts one input frame and returns every complete output block.
    ///
    /// When `frame` is the last of its stream the remaining samples are
    /// flushed as a shorter final block carrying `is_last`. If the input ends
    /// exactly on a block boundary the last full block carries the flag
    /// instead, and if nothing at all is left an empty end-of-stream frame is
    /// returned so the consumer still observes the end.
    pub fn push(&mut self, frame: &Frame) -> Result<Vec<Frame>, FrameError> {
        if self.finished {
            return Ok(Vec::new());
        }
        if !self.started {
            self.started = true;
            self.next_offset = frame.start_offset();
            self.format = Some(frame.format());
        }
        // Aligned input passes through without copying the samples.
        if self.pending.is_empty()
            && frame.len() == self.block_size
            && frame.start_offset() == self.next_offset
        {
            self.next_offset += self.block_size as u64;
            self.finished = frame.is_last();
            return Ok(vec![frame.clone()]);
        }

        let format = self.format.unwrap_or(frame.format());
        let channels = format.channels as usize;
        let block_samples = self.block_size * channels;

        self.pending.extend_from_slice(frame.samples());

        let full_blocks = self.pending.len() / block_samples;
        let remainder = self.pending.len() % block_samples;
        let mut out = Vec::with_capacity(full_blocks + 1);
        let mut consumed = 0;

        for i in 0..full_blocks {
            let is_last = frame.is_last() && remainder == 0 && i + 1 == full_blocks;
            let block = self.pending[consumed..consumed + block_samples].to_vec();
            out.push(Frame::new(
                block,
                format,
                self.next_offset,
                self.block_size,
                is_last,
            )?);
            self.next_offset += self.block_size as u64;
            consumed += block_samples;
        }

        if frame.is_last() {
            if remainder > 0 {
                let tail = self.pending[consumed..].to_vec();
                let len = remainder / channels;
                out.push(Frame::new(tail, format, self.next_offset, len, true)?);
                self.next_offset += len as u64;
            } else if full_blocks == 0 {
                out.push(Frame::end_of_stream(format, self.next_offset)?);
            }
            self.pending.clear();
            self.finished = true;
        } else {
            self.pending.drain(..consumed);
        }

        Ok(out)
    }

    /// Flushes whatever is buffered as a final block.
    ///
    /// Used when the upstream ends without an `is_last` frame (cancellation,
    /// upstream failure). Returns `None` if nothing is pending.
    pub fn finish(&mut self) -> Result<Option<Frame>, FrameError> {
        if self.finished {
            return Ok(None);
        }
        self.finished = true;
        let Some(format) = self.format else {
            return Ok(None);
        };
        if self.pending.is_empty() {
            return Ok(None);
        }
        let samples = std::mem::take(&mut self.pending);
        let len = samples.len() / format.channels as usize;
        let frame = Frame::new(samples, format, self.next_offset, len, true)?;
        self.next_offset += len as u64;
        Ok(Some(frame))
    }
}

//! Immutable audio frames.
//!
//! A [`Frame`] is the unit of data flowing through the graph: a block of
//! interleaved `f32` samples plus its position in the stream. The sample
//! buffer is reference counted, so fanning a frame out to N branches costs N
//! pointer copies and no branch can mutate what another branch sees.

use std::sync::Arc;

use crate::error::FrameError;
use crate::format::StreamFormat;

/// Immutable block of interleaved audio samples.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    samples: Arc<[f32]>,
    format: StreamFormat,
    start_offset: u64,
    length: usize,
    is_last: bool,
}

impl Frame {
    /// Creates a frame after validating its shape.
    ///
    /// `length` counts sample frames (one sample per channel), so `samples`
    /// must hold exactly `length * channels` values.
    ///
    /// # Errors
    ///
    /// - [`FrameError::EmptyFrame`] if `length == 0` and the frame is not last
    /// - [`FrameError::LengthMismatch`] if the buffer size disagrees with `length`
    /// - [`FrameError::InvalidFormat`] if channels or sample rate is zero
    pub fn new(
        samples: impl Into<Arc<[f32]>>,
        format: StreamFormat,
        start_offset: u64,
        length: usize,
        is_last: bool,
    ) -> Result<Self, FrameError> {
        if format.channels == 0 || format.sample_rate == 0 {
            return Err(FrameError::InvalidFormat {
                channels: format.channels,
                sample_rate: format.sample_rate,
            });
        }
        if length == 0 && !is_last {
            return Err(FrameError::EmptyFrame {
                offset: start_offset,
            });
        }
        let samples = samples.into();
        let expected = length * format.channels as usize;
        if samples.len() != expected {
            return Err(FrameError::LengthMismatch {
                expected,
                actual: samples.len(),
            });
        }
        Ok(Self {
            samples,
            format,
            start_offset,
            length,
            is_last,
        })
    }

    /// Creates a frame whose length is derived from the buffer size.
    pub fn from_interleaved(
        samples: Vec<f32>,
        format: StreamFormat,
        start_offset: u64,
        is_last: bool,
    ) -> Result<Self, FrameError> {
        let channels = format.channels.max(1) as usize;
        let length = samples.len() / channels;
        Self::new(samples, format, start_offset, length, is_last)
    }

    /// Zero-filled frame; gaps in a stream must be made explicit with these.
    pub fn silence(
        format: StreamFormat,
        start_offset: u64,
        length: usize,
        is_last: bool,
    ) -> Result<Self, FrameError> {
        let samples = vec![0.0; length * format.channels as usize];
        Self::new(samples, format, start_offset, length, is_last)
    }

    /// Zero-length end-of-stream marker.
    pub fn end_of_stream(format: StreamFormat, start_offset: u64) -> Result<Self, FrameError> {
        Self::new(Vec::new(), format, start_offset, 0, true)
    }

    /// Interleaved samples.
    #[inline]
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Stream format.
    #[inline]
    pub fn format(&self) -> StreamFormat {
        self.format
    }

    /// Number of channels.
    #[inline]
    pub fn channels(&self) -> u16 {
        self.format.channels
    }

    /// Sample rate in Hz.
    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.format.sample_rate
    }

    /// Offset of the first sample frame in the stream.
    #[inline]
    pub fn start_offset(&self) -> u64 {
        self.start_offset
    }

    /// Offset one past the last sample frame.
    #[inline]
    pub fn end_offset(&self) -> u64 {
        self.start_offset + self.length as u64
    }

    /// Length in sample frames.
    #[inline]
    pub fn len(&self) -> usize {
        self.length
    }

    /// Returns true for zero-length frames (only valid as end-of-stream).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Returns true if this is the final frame of its stream.
    #[inline]
    pub fn is_last(&self) -> bool {
        self.is_last
    }

    /// Iterates over one channel's samples.
    pub fn channel(&self, index: usize) -> impl Iterator<Item = f32> + '_ {
        let channels = self.format.channels as usize;
        self.samples
            .iter()
            .skip(index)
            .step_by(channels.max(1))
            .take(if index < channels { self.length } else { 0 })
            .copied()
    }

    /// Averages all channels into a mono buffer.
    pub fn mixdown(&self) -> Vec<f32> {
        let channels = self.format.channels as usize;
        if channels == 1 {
            return self.samples.to_vec();
        }
        self.samples
            .chunks_exact(channels)
            .map(|chunk| chunk.iter().sum::<f32>() / channels as f32)
            .collect()
    }

    /// Returns true if both frames share the same sample buffer.
    pub fn shares_buffer(&self, other: &Frame) -> bool {
        Arc::ptr_eq(&self.samples, &other.samples)
    }

    /// Copy of this frame with a different end-of-stream flag.
    ///
    /// The sample buffer is shared, not copied.
    pub fn with_last(&self, is_last: bool) -> Result<Self, FrameError> {
        Self::new(
            Arc::clone(&self.samples),
            self.format,
            self.start_offset,
            self.length,
            is_last,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MONO: StreamFormat = StreamFormat::mono(44100);
    const STEREO: StreamFormat = StreamFormat::new(44100, 2);

    #[test]
    fn empty_frame_must_be_last() {
        let err = Frame::new(Vec::new(), MONO, 10, 0, false).unwrap_err();
        assert_eq!(err, FrameError::EmptyFrame { offset: 10 });
        assert!(Frame::new(Vec::new(), MONO, 10, 0, true).is_ok());
    }

    #[test]
    fn length_mismatch_rejected() {
        let err = Frame::new(vec![0.0; 5], STEREO, 0, 3, false).unwrap_err();
        assert_eq!(
            err,
            FrameError::LengthMismatch {
                expected: 6,
                actual: 5
            }
        );
    }

    #[test]
    fn zero_channels_rejected() {
        let err = Frame::new(Vec::new(), StreamFormat::new(44100, 0), 0, 0, true).unwrap_err();
        assert!(matches!(err, FrameError::InvalidFormat { .. }));
    }

    #[test]
    fn offsets() {
        let frame = Frame::new(vec![0.0; 8], STEREO, 100, 4, false).unwrap();
        assert_eq!(frame.start_offset(), 100);
        assert_eq!(frame.end_offset(), 104);
        assert_eq!(frame.len(), 4);
    }

    #[test]
    fn channel_iteration() {
        let frame = Frame::new(vec![1.0, -1.0, 2.0, -2.0, 3.0, -3.0], STEREO, 0, 3, false).unwrap();
        let left: Vec<f32> = frame.channel(0).collect();
        let right: Vec<f32> = frame.channel(1).collect();
        assert_eq!(left, vec![1.0, 2.0, 3.0]);
        assert_eq!(right, vec![-1.0, -2.0, -3.0]);
        assert_eq!(frame.channel(2).count(), 0);
    }

    #[test]
    fn mixdown_averages_channels() {
        let frame = Frame::new(vec![1.0, 0.0, 0.5, 0.5], STEREO, 0, 2, false).unwrap();
        assert_eq!(frame.mixdown(), vec![0.5, 0.5]);
    }

    #[test]
    fn silence_is_zero_filled() {
        let frame = Frame::silence(STEREO, 0, 16, false).unwrap();
        assert_eq!(frame.samples().len(), 32);
        assert!(frame.samples().iter().all(|&s| s == 0.0));
    }

    #[test]
    fn clones_share_buffer() {
        let frame = Frame::new(vec![0.25; 4], MONO, 0, 4, false).unwrap();
        let copy = frame.clone();
        assert!(frame.shares_buffer(&copy));
        let last = frame.with_last(true).unwrap();
        assert!(last.is_last());
        assert!(frame.shares_buffer(&last));
    }
}

//! Stream format descriptions and format constraints.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Sample rate and channel layout of a frame stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StreamFormat {
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Number of interleaved channels.
    pub channels: u16,
}

impl StreamFormat {
    /// Creates a new stream format.
    pub const fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            channels,
        }
    }

    /// Mono stream at the given rate.
    pub const fn mono(sample_rate: u32) -> Self {
        Self::new(sample_rate, 1)
    }

    /// Converts a frame count to seconds.
    pub fn seconds(&self, frames: u64) -> f64 {
        frames as f64 / f64::from(self.sample_rate)
    }
}

impl fmt::Display for StreamFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} Hz / {} ch", self.sample_rate, self.channels)
    }
}

/// Partial format requirement: `None` fields accept anything.
///
/// Processors declare what they accept; transcoders additionally declare
/// what they produce. When both ends of an edge are concrete the graph can
/// reject the edge at build time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct FormatConstraint {
    /// Required sample rate, if fixed.
    pub sample_rate: Option<u32>,
    /// Required channel count, if fixed.
    pub channels: Option<u16>,
}

impl FormatConstraint {
    /// Accepts any format.
    pub const ANY: Self = Self {
        sample_rate: None,
        channels: None,
    };

    /// Requires an exact format.
    pub const fn exact(format: StreamFormat) -> Self {
        Self {
            sample_rate: Some(format.sample_rate),
            channels: Some(format.channels),
        }
    }

    /// Requires a given channel count.
    pub const fn channels(channels: u16) -> Self {
        Self {
            sample_rate: None,
            channels: Some(channels),
        }
    }

    /// Requires a given sample rate.
    pub const fn sample_rate(sample_rate: u32) -> Self {
        Self {
            sample_rate: Some(sample_rate),
            channels: None,
        }
    }

    /// Returns true when no field is fixed.
    pub fn is_any(&self) -> bool {
        self.sample_rate.is_none() && self.channels.is_none()
    }

    /// Checks a concrete format against this constraint.
    pub fn admits(&self, format: StreamFormat) -> bool {
        self.sample_rate.is_none_or(|sr| sr == format.sample_rate)
            && self.channels.is_none_or(|ch| ch == format.channels)
    }

    /// Returns true if two constraints can both hold for some format.
    ///
    /// Only fields fixed on both sides can conflict.
    pub fn compatible_with(&self, other: &FormatConstraint) -> bool {
        let rate_ok = match (self.sample_rate, other.sample_rate) {
            (Some(a), Some(b)) => a == b,
            _ => true,
        };
        let channels_ok = match (self.channels, other.channels) {
            (Some(a), Some(b)) => a == b,
            _ => true,
        };
        rate_ok && channels_ok
    }

    /// Narrows `input` by the fixed fields of this constraint.
    pub fn apply(&self, input: StreamFormat) -> StreamFormat {
        StreamFormat {
            sample_rate: self.sample_rate.unwrap_or(input.sample_rate),
            channels: self.channels.unwrap_or(input.channels),
        }
    }
}

impl fmt::Display for FormatConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.sample_rate {
            Some(sr) => write!(f, "{sr} Hz")?,
            None => write!(f, "any rate")?,
        }
        match self.channels {
            Some(ch) => write!(f, " / {ch} ch"),
            None => write!(f, " / any channels"),
        }
    }
}

/// What a decoder reports when opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceInfo {
    /// Format of every frame the decoder will produce.
    pub format: StreamFormat,
    /// Total stream length in sample frames, when the container knows it.
    pub total_frames: Option<u64>,
    /// Native block size of the decoder's frames.
    pub block_size: usize,
}

/// Parameters offered to a processor at setup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetupParams {
    /// Format of the frames the processor will receive.
    pub format: StreamFormat,
    /// Stream length in sample frames of the processor's input timeline, if known.
    pub total_frames: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn any_admits_everything() {
        assert!(FormatConstraint::ANY.admits(StreamFormat::new(8000, 7)));
        assert!(FormatConstraint::ANY.is_any());
    }

    #[test]
    fn exact_admits_only_itself() {
        let fmt = StreamFormat::new(44100, 2);
        let c = FormatConstraint::exact(fmt);
        assert!(c.admits(fmt));
        assert!(!c.admits(StreamFormat::new(48000, 2)));
        assert!(!c.admits(StreamFormat::new(44100, 1)));
    }

    #[test]
    fn compatibility_only_checks_fixed_fields() {
        let mono = FormatConstraint::channels(1);
        let rate = FormatConstraint::sample_rate(48000);
        assert!(mono.compatible_with(&rate));
        assert!(!mono.compatible_with(&FormatConstraint::channels(2)));
    }

    #[test]
    fn apply_overrides_fixed_fields() {
        let out = FormatConstraint::channels(1).apply(StreamFormat::new(44100, 2));
        assert_eq!(out, StreamFormat::new(44100, 1));
    }

    #[test]
    fn display() {
        assert_eq!(StreamFormat::new(44100, 2).to_string(), "44100 Hz / 2 ch");
        assert_eq!(
            FormatConstraint::channels(1).to_string(),
            "any rate / 1 ch"
        );
    }
}

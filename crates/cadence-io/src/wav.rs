//! WAV file decoding and encoding.
//!
//! [`WavDecoder`] streams a file block by block instead of loading it, so
//! arbitrarily long recordings can be analyzed in constant memory. Integer
//! samples are normalized to `[-1.0, 1.0)`.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use cadence_core::{
    Artifact, DecodeError, Decoder, EncodeError, Encoder, Frame, SourceInfo, StreamFormat,
};
use hound::{SampleFormat, WavReader, WavWriter};

use crate::{Error, Result};

/// WAV audio encoding format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WavFormat {
    /// Linear PCM (integer samples).
    Pcm,
    /// IEEE 754 floating-point samples.
    IeeeFloat,
}

/// WAV file metadata extracted without loading sample data.
#[derive(Debug, Clone)]
pub struct WavInfo {
    /// Number of audio channels (1 = mono, 2 = stereo).
    pub channels: u16,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Bit depth per sample.
    pub bits_per_sample: u16,
    /// Total number of sample frames (samples per channel).
    pub num_frames: u64,
    /// Duration in seconds.
    pub duration_secs: f64,
    /// Audio encoding format.
    pub format: WavFormat,
}

/// Read WAV metadata without loading sample data.
pub fn read_wav_info<P: AsRef<Path>>(path: P) -> Result<WavInfo> {
    let reader = WavReader::open(path)?;
    let spec = reader.spec();
    let num_frames = u64::from(reader.duration());
    let duration_secs = num_frames as f64 / f64::from(spec.sample_rate);

    let format = match spec.sample_format {
        SampleFormat::Float => WavFormat::IeeeFloat,
        SampleFormat::Int => WavFormat::Pcm,
    };

    Ok(WavInfo {
        channels: spec.channels,
        sample_rate: spec.sample_rate,
        bits_per_sample: spec.bits_per_sample,
        num_frames,
        duration_secs,
        format,
    })
}

/// WAV file specification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavSpec {
    /// Number of audio channels (1 = mono, 2 = stereo).
    pub channels: u16,
    /// Sample rate in Hz (e.g., 44100, 48000).
    pub sample_rate: u32,
    /// Bit depth per sample: 16 or 24 (integer) or 32 (float).
    pub bits_per_sample: u16,
}

impl WavSpec {
    /// Stream format described by this spec.
    pub fn stream_format(&self) -> StreamFormat {
        StreamFormat::new(self.sample_rate, self.channels)
    }
}

impl Default for WavSpec {
    fn default() -> Self {
        Self {
            channels: 1,
            sample_rate: 48000,
            bits_per_sample: 32,
        }
    }
}

impl From<WavSpec> for hound::WavSpec {
    fn from(spec: WavSpec) -> Self {
        hound::WavSpec {
            channels: spec.channels,
            sample_rate: spec.sample_rate,
            bits_per_sample: spec.bits_per_sample,
            sample_format: if spec.bits_per_sample == 32 {
                SampleFormat::Float
            } else {
                SampleFormat::Int
            },
        }
    }
}

/// Scale factor for integer samples of the given bit depth.
fn int_scale(bits: u16) -> f32 {
    (1i64 << (bits - 1)) as f32
}

/// Quantizes a float sample for an integer WAV of `bits` depth.
fn quantize(sample: f32, bits: u16) -> i32 {
    let max_val = int_scale(bits);
    (sample * max_val).clamp(-max_val, max_val - 1.0) as i32
}

/// Write interleaved samples to a WAV file.
///
/// # Example
/// ```ignore
/// let samples = vec![0.0f32; 48000]; // 1 second of silence
/// let spec = WavSpec { sample_rate: 48000, ..Default::default() };
/// write_wav("output.wav", &samples, spec)?;
/// ```
pub fn write_wav<P: AsRef<Path>>(path: P, samples: &[f32], spec: WavSpec) -> Result<()> {
    if !matches!(spec.bits_per_sample, 16 | 24 | 32) {
        return Err(Error::UnsupportedFormat(format!(
            "{}-bit WAV (expected 16, 24 or 32)",
            spec.bits_per_sample
        )));
    }
    let mut writer = WavWriter::create(path, hound::WavSpec::from(spec))?;

    if spec.bits_per_sample == 32 {
        for &sample in samples {
            writer.write_sample(sample)?;
        }
    } else {
        for &sample in samples {
            writer.write_sample(quantize(sample, spec.bits_per_sample))?;
        }
    }

    writer.finalize()?;
    Ok(())
}

fn decode_error(path: &Path, err: hound::Error) -> DecodeError {
    match err {
        hound::Error::IoError(source) => DecodeError::open(path, source),
        hound::Error::FormatError(msg) => DecodeError::MalformedHeader(msg.to_string()),
        hound::Error::Unsupported => {
            DecodeError::Unsupported(format!("{}: unsupported WAV encoding", path.display()))
        }
        other => DecodeError::MalformedHeader(other.to_string()),
    }
}

/// Streaming WAV [`Decoder`].
pub struct WavDecoder {
    path: PathBuf,
    block_size: usize,
    reader: Option<WavReader<BufReader<File>>>,
    format: Option<StreamFormat>,
    sample_format: SampleFormat,
    bits: u16,
    total: u64,
    pos: u64,
}

impl WavDecoder {
    /// Default block size, in sample frames.
    pub const DEFAULT_BLOCK: usize = 4096;

    /// Creates a decoder for `path`. The file is opened by [`Decoder::open`].
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_block_size(path, Self::DEFAULT_BLOCK)
    }

    /// Creates a decoder producing frames of `block_size` sample frames.
    pub fn with_block_size(path: impl Into<PathBuf>, block_size: usize) -> Self {
        Self {
            path: path.into(),
            block_size: block_size.max(1),
            reader: None,
            format: None,
            sample_format: SampleFormat::Float,
            bits: 32,
            total: 0,
            pos: 0,
        }
    }

    fn read_block(&mut self, wanted: usize) -> std::result::Result<Vec<f32>, hound::Error> {
        let Some(reader) = self.reader.as_mut() else {
            return Ok(Vec::new());
        };
        match self.sample_format {
            SampleFormat::Float => reader.samples::<f32>().take(wanted).collect(),
            SampleFormat::Int => {
                let scale = int_scale(self.bits);
                reader
                    .samples::<i32>()
                    .take(wanted)
                    .map(|s| s.map(|v| v as f32 / scale))
                    .collect()
            }
        }
    }
}

impl Decoder for WavDecoder {
    fn open(&mut self) -> std::result::Result<SourceInfo, DecodeError> {
        let reader = WavReader::open(&self.path).map_err(|e| decode_error(&self.path, e))?;
        let spec = reader.spec();
        if spec.channels == 0 || spec.sample_rate == 0 {
            return Err(DecodeError::MalformedHeader(format!(
                "{} declares {} channels at {} Hz",
                self.path.display(),
                spec.channels,
                spec.sample_rate
            )));
        }
        let format = StreamFormat::new(spec.sample_rate, spec.channels);
        self.total = u64::from(reader.duration());
        self.sample_format = spec.sample_format;
        self.bits = spec.bits_per_sample;
        self.format = Some(format);
        self.reader = Some(reader);
        self.pos = 0;

        tracing::debug!(
            path = %self.path.display(),
            %format,
            frames = self.total,
            bits = self.bits,
            "opened WAV source"
        );
        Ok(SourceInfo {
            format,
            total_frames: Some(self.total),
            block_size: self.block_size,
        })
    }

    fn next_frame(&mut self) -> std::result::Result<Option<Frame>, DecodeError> {
        let format = self.format.ok_or(DecodeError::NotOpen)?;
        if self.pos >= self.total {
            return Ok(None);
        }
        let frames = (self.total - self.pos).min(self.block_size as u64) as usize;
        let channels = format.channels as usize;
        let samples = self
            .read_block(frames * channels)
            .map_err(|e| DecodeError::CorruptData {
                offset: self.pos,
                reason: e.to_string(),
            })?;
        if samples.len() != frames * channels {
            return Err(DecodeError::CorruptData {
                offset: self.pos + (samples.len() / channels) as u64,
                reason: format!(
                    "file ends early: expected {} frames, header declares {}",
                    frames,
                    self.total
                ),
            });
        }
        let is_last = self.pos + frames as u64 == self.total;
        let frame = Frame::new(samples, format, self.pos, frames, is_last)?;
        self.pos += frames as u64;
        Ok(Some(frame))
    }

    fn close(&mut self) {
        self.reader = None;
    }

    fn describe(&self) -> String {
        format!("wav:{}", self.path.display())
    }
}

/// WAV [`Encoder`] writing 16/24-bit integer or 32-bit float files.
pub struct WavEncoder {
    path: PathBuf,
    bits: u16,
    writer: Option<WavWriter<BufWriter<File>>>,
    format: Option<StreamFormat>,
    frames: u64,
}

impl WavEncoder {
    /// Creates an encoder for `path` with the given bit depth.
    pub fn new(path: impl Into<PathBuf>, bits: u16) -> Self {
        Self {
            path: path.into(),
            bits,
            writer: None,
            format: None,
            frames: 0,
        }
    }

    fn write_error(&self, offset: u64, err: hound::Error) -> EncodeError {
        EncodeError::Write {
            offset,
            reason: format!("{}: {err}", self.path.display()),
        }
    }
}

impl Encoder for WavEncoder {
    fn kind(&self) -> &'static str {
        "wav"
    }

    fn params(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            ("path".to_string(), self.path.display().to_string()),
            ("bits".to_string(), self.bits.to_string()),
        ])
    }

    fn open(&mut self, format: StreamFormat) -> std::result::Result<(), EncodeError> {
        if !matches!(self.bits, 16 | 24 | 32) {
            return Err(EncodeError::Open {
                path: self.path.clone(),
                reason: format!("unsupported bit depth {}", self.bits),
            });
        }
        let spec = WavSpec {
            channels: format.channels,
            sample_rate: format.sample_rate,
            bits_per_sample: self.bits,
        };
        let writer =
            WavWriter::create(&self.path, hound::WavSpec::from(spec)).map_err(|e| EncodeError::Open {
                path: self.path.clone(),
                reason: e.to_string(),
            })?;
        self.writer = Some(writer);
        self.format = Some(format);
        self.frames = 0;
        Ok(())
    }

    fn write(&mut self, frame: &Frame) -> std::result::Result<(), EncodeError> {
        let bits = self.bits;
        let writer = self.writer.as_mut().ok_or(EncodeError::NotOpen)?;
        let result = if bits == 32 {
            frame
                .samples()
                .iter()
                .try_for_each(|&s| writer.write_sample(s))
        } else {
            frame
                .samples()
                .iter()
                .try_for_each(|&s| writer.write_sample(quantize(s, bits)))
        };
        result.map_err(|e| self.write_error(frame.start_offset(), e))?;
        self.frames += frame.len() as u64;
        Ok(())
    }

    fn close(&mut self) -> std::result::Result<Artifact, EncodeError> {
        let writer = self.writer.take().ok_or(EncodeError::NotOpen)?;
        let format = self.format.ok_or(EncodeError::NotOpen)?;
        writer
            .finalize()
            .map_err(|e| EncodeError::Close(format!("{}: {e}", self.path.display())))?;
        tracing::debug!(path = %self.path.display(), frames = self.frames, "WAV written");
        Ok(Artifact {
            location: self.path.display().to_string(),
            format,
            frames: self.frames,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn drain(decoder: &mut WavDecoder) -> Vec<Frame> {
        let mut frames = Vec::new();
        while let Some(frame) = decoder.next_frame().unwrap() {
            frames.push(frame);
        }
        frames
    }

    #[test]
    fn test_decoder_streams_blocks() {
        let samples: Vec<f32> = (0..1000).map(|i| (i as f32 / 1000.0).sin()).collect();
        let file = NamedTempFile::new().unwrap();
        write_wav(file.path(), &samples, WavSpec::default()).unwrap();

        let mut decoder = WavDecoder::with_block_size(file.path(), 300);
        let info = decoder.open().unwrap();
        assert_eq!(info.total_frames, Some(1000));
        assert_eq!(info.format, StreamFormat::mono(48000));

        let frames = drain(&mut decoder);
        let lens: Vec<usize> = frames.iter().map(Frame::len).collect();
        assert_eq!(lens, vec![300, 300, 300, 100]);
        assert!(frames[3].is_last());
        assert_eq!(frames[2].start_offset(), 600);
        let decoded: Vec<f32> = frames.iter().flat_map(|f| f.samples().to_vec()).collect();
        assert_eq!(decoded, samples);
    }

    #[test]
    fn test_decoder_normalizes_int_samples() {
        let samples = vec![0.5, -0.5, 0.25, -1.0];
        let file = NamedTempFile::new().unwrap();
        let spec = WavSpec {
            channels: 2,
            sample_rate: 44100,
            bits_per_sample: 16,
        };
        write_wav(file.path(), &samples, spec).unwrap();

        let mut decoder = WavDecoder::new(file.path());
        let info = decoder.open().unwrap();
        assert_eq!(info.total_frames, Some(2));
        let frames = drain(&mut decoder);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].samples(), samples.as_slice());
    }

    #[test]
    fn test_next_frame_before_open() {
        let mut decoder = WavDecoder::new("/nonexistent.wav");
        assert!(matches!(decoder.next_frame(), Err(DecodeError::NotOpen)));
    }

    #[test]
    fn test_missing_file_is_open_error() {
        let mut decoder = WavDecoder::new("/nonexistent/cadence.wav");
        assert!(matches!(decoder.open(), Err(DecodeError::Open { .. })));
    }

    #[test]
    fn test_garbage_is_malformed_header() {
        let file = NamedTempFile::new().unwrap();
        std::fs::write(file.path(), b"this is not a wav file at all").unwrap();
        let mut decoder = WavDecoder::new(file.path());
        assert!(matches!(
            decoder.open(),
            Err(DecodeError::MalformedHeader(_))
        ));
    }

    #[test]
    fn test_encoder_round_trip_24_bit() {
        let file = NamedTempFile::new().unwrap();
        let format = StreamFormat::mono(48000);
        let mut encoder = WavEncoder::new(file.path(), 24);
        encoder.open(format).unwrap();
        let samples: Vec<f32> = (0..256).map(|i| (i as f32 / 256.0) - 0.5).collect();
        encoder
            .write(&Frame::from_interleaved(samples.clone(), format, 0, true).unwrap())
            .unwrap();
        let artifact = encoder.close().unwrap();
        assert_eq!(artifact.frames, 256);

        let info = read_wav_info(file.path()).unwrap();
        assert_eq!(info.bits_per_sample, 24);
        assert_eq!(info.format, WavFormat::Pcm);
        let mut decoder = WavDecoder::new(file.path());
        decoder.open().unwrap();
        let decoded = drain(&mut decoder);
        for (a, b) in samples.iter().zip(decoded[0].samples()) {
            assert!((a - b).abs() < 1e-6);
        }
    }

    #[test]
    fn test_encoder_rejects_odd_bit_depth() {
        let file = NamedTempFile::new().unwrap();
        let mut encoder = WavEncoder::new(file.path(), 12);
        assert!(matches!(
            encoder.open(StreamFormat::mono(8000)),
            Err(EncodeError::Open { .. })
        ));
    }

    #[test]
    fn test_write_before_open() {
        let mut encoder = WavEncoder::new("unused.wav", 16);
        let frame = Frame::silence(StreamFormat::mono(8000), 0, 4, false).unwrap();
        assert!(matches!(encoder.write(&frame), Err(EncodeError::NotOpen)));
    }
}

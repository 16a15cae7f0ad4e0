//! Decoder and encoder contracts.
//!
//! The engine never touches containers or codecs directly. A graph's source
//! is a [`Decoder`]; encoders are wrapped in a [`Transcode`] processor so
//! they can sit anywhere a transcoder may.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{DecodeError, EncodeError, NegotiationError, ProcessorError};
use crate::format::{SetupParams, SourceInfo, StreamFormat};
use crate::frame::Frame;
use crate::processor::{Emitter, FinalizeReason, Processor, Role};

/// Frame source at the root of every graph.
pub trait Decoder: Send {
    /// Opens the source and reports its format.
    fn open(&mut self) -> Result<SourceInfo, DecodeError>;

    /// Reads the next frame. `None` signals end of stream.
    ///
    /// Offsets must be contiguous, and every frame must carry the format
    /// reported by [`open`](Self::open).
    fn next_frame(&mut self) -> Result<Option<Frame>, DecodeError>;

    /// Releases the source.
    fn close(&mut self) {}

    /// Human-readable description used in logs.
    fn describe(&self) -> String {
        "decoder".to_string()
    }
}

/// Output sink wrapped by a [`Transcode`] processor.
pub trait Encoder: Send {
    /// Kind tag reported by the wrapping processor.
    fn kind(&self) -> &'static str;

    /// Block size the encoder wants, if any.
    fn block_size(&self) -> Option<usize> {
        None
    }

    /// Parameter echo.
    fn params(&self) -> BTreeMap<String, String> {
        BTreeMap::new()
    }

    /// Prepares the target for frames of `format`.
    fn open(&mut self, format: StreamFormat) -> Result<(), EncodeError>;

    /// Appends one frame.
    fn write(&mut self, frame: &Frame) -> Result<(), EncodeError>;

    /// Commits the output.
    fn close(&mut self) -> Result<Artifact, EncodeError>;
}

/// Description of a committed encoder output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    /// Where the output lives (path, or a label for in-memory targets).
    pub location: String,
    /// Format of the encoded stream.
    pub format: StreamFormat,
    /// Sample frames written.
    pub frames: u64,
}

/// Transcoder wrapping an [`Encoder`].
///
/// Frames are written to the encoder and forwarded unchanged, so transcoders
/// can be chained. The encoder is closed on every finalize path; a cancelled
/// run still commits what was written.
pub struct Transcode {
    encoder: Box<dyn Encoder>,
    artifact: Option<Artifact>,
}

impl Transcode {
    /// Wraps an encoder.
    pub fn new(encoder: Box<dyn Encoder>) -> Self {
        Self {
            encoder,
            artifact: None,
        }
    }
}

impl Processor for Transcode {
    fn kind(&self) -> &'static str {
        self.encoder.kind()
    }

    fn role(&self) -> Role {
        Role::Transcoder
    }

    fn block_size(&self) -> Option<usize> {
        self.encoder.block_size()
    }

    fn params(&self) -> BTreeMap<String, String> {
        self.encoder.params()
    }

    fn setup(&mut self, params: &SetupParams) -> Result<SetupParams, NegotiationError> {
        self.encoder
            .open(params.format)
            .map_err(|e| NegotiationError::Unsupported(e.to_string()))?;
        Ok(*params)
    }

    fn process(&mut self, frame: &Frame, out: &mut Emitter) -> Result<(), ProcessorError> {
        if !frame.is_empty() {
            self.encoder.write(frame)?;
        }
        out.emit_frame(frame.clone());
        Ok(())
    }

    fn finalize(&mut self, _reason: FinalizeReason, _out: &mut Emitter) -> Result<(), ProcessorError> {
        self.artifact = Some(self.encoder.close()?);
        Ok(())
    }

    fn artifact(&self) -> Option<Artifact> {
        self.artifact.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct CountingEncoder {
        format: Option<StreamFormat>,
        frames: u64,
        fail_write: bool,
    }

    impl Encoder for CountingEncoder {
        fn kind(&self) -> &'static str {
            "counting"
        }

        fn open(&mut self, format: StreamFormat) -> Result<(), EncodeError> {
            self.format = Some(format);
            Ok(())
        }

        fn write(&mut self, frame: &Frame) -> Result<(), EncodeError> {
            if self.fail_write {
                return Err(EncodeError::Write {
                    offset: frame.start_offset(),
                    reason: "disk full".into(),
                });
            }
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

    const MONO: StreamFormat = StreamFormat::mono(44100);

    #[test]
    fn forwards_frames_unchanged() {
        let mut t = Transcode::new(Box::new(CountingEncoder::default()));
        t.setup(&SetupParams {
            format: MONO,
            total_frames: None,
        })
        .unwrap();
        let frame = Frame::silence(MONO, 0, 64, false).unwrap();
        let mut out = Emitter::new(0);
        t.process(&frame, &mut out).unwrap();
        assert!(out.frames()[0].shares_buffer(&frame));
    }

    #[test]
    fn finalize_commits_artifact() {
        let mut t = Transcode::new(Box::new(CountingEncoder::default()));
        t.setup(&SetupParams {
            format: MONO,
            total_frames: None,
        })
        .unwrap();
        let mut out = Emitter::new(0);
        t.process(&Frame::silence(MONO, 0, 100, false).unwrap(), &mut out)
            .unwrap();
        t.process(&Frame::end_of_stream(MONO, 100).unwrap(), &mut out)
            .unwrap();
        t.finalize(FinalizeReason::EndOfStream, &mut out).unwrap();
        let artifact = t.artifact().unwrap();
        assert_eq!(artifact.frames, 100);
        assert_eq!(artifact.format, MONO);
    }

    #[test]
    fn encode_error_becomes_processor_error() {
        let mut t = Transcode::new(Box::new(CountingEncoder {
            fail_write: true,
            ..CountingEncoder::default()
        }));
        let mut out = Emitter::new(0);
        let err = t
            .process(&Frame::silence(MONO, 0, 8, false).unwrap(), &mut out)
            .unwrap_err();
        assert!(matches!(err, ProcessorError::Encode(_)));
        assert!(out.frames().is_empty());
    }
}

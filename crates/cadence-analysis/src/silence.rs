//! Sound/silence segmentation.

use std::collections::BTreeMap;

use cadence_core::{
    Emitter, FinalizeReason, Frame, NegotiationError, Processor, ProcessorError, ResultValue,
    Role, SetupParams,
};

use crate::dynamics::rms_db;

/// Label of segments above the threshold.
pub const SOUND: &str = "sound";
/// Label of segments below the threshold.
pub const SILENCE: &str = "silence";

/// Splits the stream into labeled `sound` / `silence` segments.
///
/// Each hop window is classified by its RMS level against `threshold_db`.
/// Consecutive windows with the same label are merged, and a segment is
/// emitted once it ends, stamped with its own start offset and carrying its
/// duration in sample frames.
pub struct SilenceSegmenter {
    threshold_db: f32,
    hop: usize,
    current: Option<(&'static str, u64)>,
    end: u64,
    segments: usize,
}

impl SilenceSegmenter {
    /// Default threshold in dBFS.
    pub const DEFAULT_THRESHOLD_DB: f32 = -60.0;
    /// Default hop window, in sample frames.
    pub const DEFAULT_HOP: usize = 1024;

    /// Creates a segmenter.
    pub fn new(threshold_db: f32, hop: usize) -> Self {
        Self {
            threshold_db,
            hop,
            current: None,
            end: 0,
            segments: 0,
        }
    }

    fn close_segment(&mut self, out: &mut Emitter) {
        if let Some((label, start)) = self.current.take()
            && self.end > start
        {
            out.emit_at(
                start,
                ResultValue::Segment {
                    duration: self.end - start,
                    label: label.to_string(),
                },
            );
            self.segments += 1;
        }
    }
}

impl Default for SilenceSegmenter {
    fn default() -> Self {
        Self::new(Self::DEFAULT_THRESHOLD_DB, Self::DEFAULT_HOP)
    }
}

impl Processor for SilenceSegmenter {
    fn kind(&self) -> &'static str {
        "silence"
    }

    fn role(&self) -> Role {
        Role::Analyzer
    }

    fn block_size(&self) -> Option<usize> {
        Some(self.hop)
    }

    fn params(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            ("hop".to_string(), self.hop.to_string()),
            ("threshold_db".to_string(), self.threshold_db.to_string()),
        ])
    }

    fn setup(&mut self, params: &SetupParams) -> Result<SetupParams, NegotiationError> {
        Ok(*params)
    }

    fn process(&mut self, frame: &Frame, out: &mut Emitter) -> Result<(), ProcessorError> {
        if frame.is_empty() {
            return Ok(());
        }
        let label = if rms_db(frame.samples()) < self.threshold_db {
            SILENCE
        } else {
            SOUND
        };
        match self.current {
            Some((current, _)) if current == label => {}
            _ => {
                self.close_segment(out);
                self.current = Some((label, frame.start_offset()));
            }
        }
        self.end = frame.end_offset();
        Ok(())
    }

    fn finalize(&mut self, _reason: FinalizeReason, out: &mut Emitter) -> Result<(), ProcessorError> {
        self.close_segment(out);
        out.set_metadata("unit", "frames");
        out.set_metadata("segments", self.segments.to_string());
        Ok(())
    }
}

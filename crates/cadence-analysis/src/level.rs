//! Block level meter.

use std::collections::BTreeMap;

use cadence_core::{
    Emitter, FinalizeReason, Frame, NegotiationError, Processor, ProcessorError, ResultValue,
    Role, SetupParams,
};

use crate::dynamics::{peak, rms, to_db};

/// Emits `[rms, peak]` for every block of the input.
///
/// Levels are linear and computed over all channels of the block. The
/// loudest block is summarized in the container metadata at finalize.
#[derive(Debug, Clone)]
pub struct LevelMeter {
    block_size: usize,
    max_rms: f32,
    max_peak: f32,
}

impl LevelMeter {
    /// Default analysis block, in sample frames.
    pub const DEFAULT_BLOCK: usize = 1024;

    /// Creates a meter over blocks of `block_size` frames.
    pub fn new(block_size: usize) -> Self {
        Self {
            block_size,
            max_rms: 0.0,
            max_peak: 0.0,
        }
    }
}

impl Default for LevelMeter {
    fn default() -> Self {
        Self::new(Self::DEFAULT_BLOCK)
    }
}

impl Processor for LevelMeter {
    fn kind(&self) -> &'static str {
        "level"
    }

    fn role(&self) -> Role {
        Role::Analyzer
    }

    fn block_size(&self) -> Option<usize> {
        Some(self.block_size)
    }

    fn params(&self) -> BTreeMap<String, String> {
        BTreeMap::from([("block_size".to_string(), self.block_size.to_string())])
    }

    fn setup(&mut self, params: &SetupParams) -> Result<SetupParams, NegotiationError> {
        Ok(*params)
    }

    fn process(&mut self, frame: &Frame, out: &mut Emitter) -> Result<(), ProcessorError> {
        if frame.is_empty() {
            return Ok(());
        }
        let r = rms(frame.samples());
        let p = peak(frame.samples());
        self.max_rms = self.max_rms.max(r);
        self.max_peak = self.max_peak.max(p);
        out.emit(ResultValue::Vector(vec![f64::from(r), f64::from(p)]));
        Ok(())
    }

    fn finalize(&mut self, _reason: FinalizeReason, out: &mut Emitter) -> Result<(), ProcessorError> {
        out.set_metadata("unit", "linear");
        out.set_metadata("fields", "rms,peak");
        out.set_metadata("max_rms_db", format!("{:.2}", to_db(self.max_rms)));
        out.set_metadata("max_peak_db", format!("{:.2}", to_db(self.max_peak)));
        Ok(())
    }
}

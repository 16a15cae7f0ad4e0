//! Spectral centroid analyzer.
//!
//! The centroid is the magnitude-weighted mean frequency of a windowed FFT
//! frame. Alongside the value in Hz each record carries a normalized
//! position: the centroid clipped to `[100 Hz, Nyquist]` and mapped
//! logarithmically onto `[0, 1]`, which is what the waveform grapher uses
//! to pick colours.

use std::collections::BTreeMap;

use cadence_core::{
    Emitter, FinalizeReason, Frame, NegotiationError, Processor, ProcessorError, ResultValue,
    Role, SetupParams,
};

use crate::fft::{Fft, Window};

/// Lowest frequency of the normalized centroid scale.
pub const CENTROID_FLOOR_HZ: f64 = 100.0;

/// Spectra with less total magnitude than this are treated as silent.
const ENERGY_FLOOR: f64 = 1e-20;

/// Magnitude-weighted mean frequency of a `DC..=Nyquist` magnitude spectrum.
///
/// Returns `None` for a silent spectrum.
pub fn centroid_hz(magnitudes: &[f32], sample_rate: u32) -> Option<f64> {
    if magnitudes.len() < 2 {
        return None;
    }
    let energy: f64 = magnitudes.iter().map(|&m| f64::from(m)).sum();
    if energy <= ENERGY_FLOOR {
        return None;
    }
    let weighted: f64 = magnitudes
        .iter()
        .enumerate()
        .map(|(i, &m)| i as f64 * f64::from(m))
        .sum();
    let bins = (magnitudes.len() - 1) as f64;
    Some(weighted / (energy * bins) * f64::from(sample_rate) * 0.5)
}

/// Maps a centroid onto `[0, 1]` on a log scale between 100 Hz and Nyquist.
pub fn normalized_centroid(hz: f64, sample_rate: u32) -> f64 {
    let nyquist = f64::from(sample_rate) * 0.5;
    if nyquist <= CENTROID_FLOOR_HZ {
        return 0.0;
    }
    let low = CENTROID_FLOOR_HZ.log10();
    let high = nyquist.log10();
    (hz.clamp(CENTROID_FLOOR_HZ, nyquist).log10() - low) / (high - low)
}

/// Per-window spectral centroid.
///
/// Emits `[centroid_hz, normalized]` per FFT window of the mono mixdown.
/// The final short window is zero-padded. Silent windows report `[0, 0]`.
pub struct SpectralCentroid {
    fft_size: usize,
    window: Window,
    fft: Option<Fft>,
    sample_rate: u32,
    windows: u64,
}

impl SpectralCentroid {
    /// Default FFT size.
    pub const DEFAULT_FFT_SIZE: usize = 2048;

    /// Creates an analyzer with a Hann window.
    pub fn new(fft_size: usize) -> Self {
        Self::with_window(fft_size, Window::Hann)
    }

    /// Creates an analyzer with an explicit window.
    pub fn with_window(fft_size: usize, window: Window) -> Self {
        Self {
            fft_size,
            window,
            fft: None,
            sample_rate: 0,
            windows: 0,
        }
    }
}

impl Default for SpectralCentroid {
    fn default() -> Self {
        Self::new(Self::DEFAULT_FFT_SIZE)
    }
}

impl Processor for SpectralCentroid {
    fn kind(&self) -> &'static str {
        "centroid"
    }

    fn role(&self) -> Role {
        Role::Analyzer
    }

    fn block_size(&self) -> Option<usize> {
        Some(self.fft_size)
    }

    fn params(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            ("fft_size".to_string(), self.fft_size.to_string()),
            ("window".to_string(), format!("{:?}", self.window).to_lowercase()),
        ])
    }

    fn setup(&mut self, params: &SetupParams) -> Result<SetupParams, NegotiationError> {
        if self.fft_size < 2 {
            return Err(NegotiationError::Unsupported(format!(
                "fft size {} is too small",
                self.fft_size
            )));
        }
        self.sample_rate = params.format.sample_rate;
        self.fft = Some(Fft::new(self.fft_size, self.window));
        Ok(*params)
    }

    fn process(&mut self, frame: &Frame, out: &mut Emitter) -> Result<(), ProcessorError> {
        if frame.is_empty() {
            return Ok(());
        }
        let fft = self
            .fft
            .as_mut()
            .ok_or_else(|| ProcessorError::failed("centroid used before setup"))?;
        let spectrum = fft.magnitudes(&frame.mixdown());
        let (hz, normalized) = match centroid_hz(&spectrum, self.sample_rate) {
            Some(hz) => (hz, normalized_centroid(hz, self.sample_rate)),
            None => (0.0, 0.0),
        };
        self.windows += 1;
        out.emit(ResultValue::Vector(vec![hz, normalized]));
        Ok(())
    }

    fn finalize(&mut self, _reason: FinalizeReason, out: &mut Emitter) -> Result<(), ProcessorError> {
        tracing::debug!(windows = self.windows, "spectral centroid finished");
        out.set_metadata("unit", "Hz");
        out.set_metadata("fields", "centroid_hz,normalized");
        Ok(())
    }
}

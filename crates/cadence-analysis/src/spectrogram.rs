//! Spectrogram grapher.
//!
//! One column per output pixel, one row per pixel of height. Each column is
//! the Hann-windowed magnitude spectrum of the `fft_size` samples starting at
//! the column's offset, converted to dB and scaled from
//! `[-range_db, 0]` onto `[0, 1]`. Rows are spaced logarithmically from
//! 100 Hz to Nyquist; a row between two FFT bins interpolates linearly.
//!
//! Columns are emitted as vector records of row intensities, lowest
//! frequency first, stamped with the column's start offset. Windows that
//! would run past the end of the stream are zero-padded and emitted at
//! finalize.

use std::collections::BTreeMap;
use std::path::PathBuf;

use cadence_core::{
    Emitter, FinalizeReason, Frame, NegotiationError, Processor, ProcessorError, ResultValue,
    Role, SetupParams,
};

use crate::fft::{Fft, Window};
use crate::palette::{Canvas, ColorScheme, Rgb, interpolate_colors};

const PALETTE_SIZE: usize = 256;
const MIN_FREQ: f64 = 100.0;

/// Configuration for [`SpectrogramGrapher`].
#[derive(Debug, Clone, PartialEq)]
pub struct SpectrogramConfig {
    /// Image width; one column per pixel.
    pub width: usize,
    /// Image height; one frequency row per pixel.
    pub height: usize,
    /// FFT size per column.
    pub fft_size: usize,
    /// Dynamic range in dB mapped onto the palette.
    pub range_db: f32,
    /// Colour scheme.
    pub scheme: ColorScheme,
    /// Where to write a PPM image at finalize, if anywhere.
    pub output: Option<PathBuf>,
}

impl Default for SpectrogramConfig {
    fn default() -> Self {
        Self {
            width: 500,
            height: 256,
            fft_size: 2048,
            range_db: 120.0,
            scheme: ColorScheme::Default,
            output: None,
        }
    }
}

/// Maps magnitude onto `[0, 1]` over a `range_db` window below full scale.
fn db_scale(magnitude: f32, range_db: f32) -> f32 {
    let db = 20.0 * (magnitude + 1e-30).log10();
    (db.clamp(-range_db, 0.0) + range_db) / range_db
}

/// For each image row, the FFT bin below it and the weight of the bin above.
///
/// Rows whose frequency lands on or beyond the last bin get no entry and are
/// drawn as silence.
fn row_bins(height: usize, fft_size: usize, sample_rate: u32) -> Vec<(usize, f32)> {
    let nyquist = f64::from(sample_rate) * 0.5;
    let (low, high) = (MIN_FREQ.log10(), nyquist.log10());
    let half = fft_size / 2;
    let steps = (height.max(2) - 1) as f64;
    (0..height)
        .map_while(|y| {
            let freq = 10f64.powf(low + y as f64 / steps * (high - low));
            let bin = freq / nyquist * (half + 1) as f64;
            (bin < half as f64).then(|| (bin as usize, bin.fract() as f32))
        })
        .collect()
}

/// Log-frequency spectrogram with an optional PPM render.
pub struct SpectrogramGrapher {
    config: SpectrogramConfig,
    palette: Vec<Rgb>,
    fft: Option<Fft>,
    rows: Vec<(usize, f32)>,
    samples_per_pixel: usize,
    origin: Option<u64>,
    /// Samples from the next column's start onwards.
    pending: Vec<f32>,
    /// Samples to discard before the next column starts.
    skip: usize,
    /// Palette indices per column, lowest row first.
    columns: Vec<Vec<u8>>,
}

impl SpectrogramGrapher {
    /// Creates a grapher.
    pub fn new(config: SpectrogramConfig) -> Self {
        let palette = interpolate_colors(config.scheme.spectrogram_colors(), PALETTE_SIZE);
        Self {
            config,
            palette,
            fft: None,
            rows: Vec::new(),
            samples_per_pixel: 0,
            origin: None,
            pending: Vec::new(),
            skip: 0,
            columns: Vec::new(),
        }
    }

    fn is_full(&self) -> bool {
        self.columns.len() == self.config.width
    }

    fn emit_column(&mut self, out: &mut Emitter) {
        let Some(fft) = self.fft.as_mut() else {
            return;
        };
        let range = self.config.range_db;
        let spectrum: Vec<f32> = fft
            .magnitudes(&self.pending)
            .into_iter()
            .map(|m| db_scale(m, range))
            .collect();

        let mut values: Vec<f32> = self
            .rows
            .iter()
            .map(|&(bin, alpha)| (1.0 - alpha) * spectrum[bin] + alpha * spectrum[bin + 1])
            .collect();
        values.resize(self.config.height, 0.0);

        let start = self.origin.unwrap_or(0)
            + (self.columns.len() * self.samples_per_pixel) as u64;
        out.emit_at(
            start,
            ResultValue::Vector(values.iter().map(|&v| f64::from(v)).collect()),
        );
        self.columns.push(
            values
                .iter()
                .map(|&v| ((v * 255.0) as usize).min(PALETTE_SIZE - 1) as u8)
                .collect(),
        );

        // Move the window to the next column's start.
        if self.samples_per_pixel >= self.pending.len() {
            self.skip = self.samples_per_pixel - self.pending.len();
            self.pending.clear();
        } else {
            self.pending.drain(..self.samples_per_pixel);
        }
    }

    fn render(&self) -> Canvas {
        let height = self.config.height;
        let mut canvas = Canvas::new(self.config.width, height, self.palette[0]);
        for (x, column) in self.columns.iter().enumerate() {
            for (y, &index) in column.iter().enumerate() {
                canvas.set(x as i64, (height - 1 - y) as i64, self.palette[usize::from(index)]);
            }
        }
        canvas
    }
}

impl Default for SpectrogramGrapher {
    fn default() -> Self {
        Self::new(SpectrogramConfig::default())
    }
}

impl Processor for SpectrogramGrapher {
    fn kind(&self) -> &'static str {
        "spectrogram"
    }

    fn role(&self) -> Role {
        Role::Grapher
    }

    fn params(&self) -> BTreeMap<String, String> {
        let mut params = BTreeMap::from([
            ("width".to_string(), self.config.width.to_string()),
            ("height".to_string(), self.config.height.to_string()),
            ("fft_size".to_string(), self.config.fft_size.to_string()),
            ("range".to_string(), self.config.range_db.to_string()),
            ("scheme".to_string(), self.config.scheme.to_string()),
        ]);
        if let Some(path) = &self.config.output {
            params.insert("output".to_string(), path.display().to_string());
        }
        params
    }

    fn setup(&mut self, params: &SetupParams) -> Result<SetupParams, NegotiationError> {
        let total = params.total_frames.ok_or_else(|| {
            NegotiationError::Unsupported("spectrogram grapher needs the total stream length".into())
        })?;
        if self.config.width == 0 || self.config.height < 2 || self.config.fft_size < 2 {
            return Err(NegotiationError::Unsupported(format!(
                "image size {}x{} with fft size {} is too small",
                self.config.width, self.config.height, self.config.fft_size
            )));
        }
        let rate = params.format.sample_rate;
        if f64::from(rate) * 0.5 <= MIN_FREQ {
            return Err(NegotiationError::SampleRate(rate));
        }

        self.samples_per_pixel = ((total / self.config.width as u64) as usize).max(1);
        self.rows = row_bins(self.config.height, self.config.fft_size, rate);
        self.fft = Some(Fft::new(self.config.fft_size, Window::Hann));
        self.pending.reserve(self.config.fft_size);
        tracing::debug!(
            total,
            samples_per_pixel = self.samples_per_pixel,
            rows = self.rows.len(),
            "spectrogram grapher configured"
        );
        Ok(*params)
    }

    fn process(&mut self, frame: &Frame, out: &mut Emitter) -> Result<(), ProcessorError> {
        self.origin.get_or_insert(frame.start_offset());
        for sample in frame.channel(0) {
            if self.is_full() {
                break;
            }
            if self.skip > 0 {
                self.skip -= 1;
                continue;
            }
            self.pending.push(sample);
            if self.pending.len() == self.config.fft_size {
                self.emit_column(out);
            }
        }
        Ok(())
    }

    fn finalize(&mut self, _reason: FinalizeReason, out: &mut Emitter) -> Result<(), ProcessorError> {
        // Columns whose window runs past the end are zero-padded.
        while self.fft.is_some() && !self.is_full() && !self.pending.is_empty() {
            self.emit_column(out);
        }

        out.set_metadata("columns", self.columns.len().to_string());
        out.set_metadata("rows", self.config.height.to_string());
        out.set_metadata("samples_per_pixel", self.samples_per_pixel.to_string());
        out.set_metadata("unit", "normalized dB");
        if let Some(path) = &self.config.output {
            self.render().save_ppm(path).map_err(|e| {
                ProcessorError::failed(format!("failed to write {}: {e}", path.display()))
            })?;
            out.set_metadata("image", path.display().to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_core::StreamFormat;
    use std::f32::consts::PI;

    const MONO: StreamFormat = StreamFormat::mono(8000);

    fn setup(grapher: &mut SpectrogramGrapher, format: StreamFormat, total: u64) {
        grapher
            .setup(&SetupParams {
                format,
                total_frames: Some(total),
            })
            .unwrap();
    }

    fn sine(freq: f32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| (2.0 * PI * freq * i as f32 / 8000.0).sin())
            .collect()
    }

    #[test]
    fn test_db_scale_bounds() {
        assert_eq!(db_scale(1.0, 120.0), 1.0);
        assert_eq!(db_scale(0.0, 120.0), 0.0);
        assert!((db_scale(1e-3, 120.0) - 0.5).abs() < 1e-4);
    }

    #[test]
    fn test_rows_are_log_spaced() {
        let rows = row_bins(64, 256, 8000);
        assert_eq!(rows[0].0, 3);
        assert!(rows.windows(2).all(|w| w[0].0 <= w[1].0));
        // The top rows sit at or beyond the last bin and are left empty.
        assert!(rows.len() < 64);
        assert!(rows.iter().all(|&(bin, _)| bin < 128));
    }

    #[test]
    fn test_sine_lights_its_row() {
        let mut grapher = SpectrogramGrapher::new(SpectrogramConfig {
            width: 4,
            height: 64,
            fft_size: 256,
            ..SpectrogramConfig::default()
        });
        setup(&mut grapher, MONO, 1024);

        let frame = Frame::from_interleaved(sine(1000.0, 1024), MONO, 0, true).unwrap();
        let mut out = Emitter::new(0);
        grapher.process(&frame, &mut out).unwrap();
        grapher.finalize(FinalizeReason::EndOfStream, &mut out).unwrap();

        let records = out.records();
        assert_eq!(records.len(), 4);
        let ResultValue::Vector(rows) = &records[0].value else {
            panic!("expected vector");
        };
        assert_eq!(rows.len(), 64);
        let loudest = rows
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i);
        assert!(loudest.is_some_and(|row| (37..=41).contains(&row)), "got {loudest:?}");
    }

    #[test]
    fn test_overlapping_windows_finish_at_finalize() {
        let mut grapher = SpectrogramGrapher::new(SpectrogramConfig {
            width: 10,
            height: 16,
            fft_size: 256,
            ..SpectrogramConfig::default()
        });
        setup(&mut grapher, MONO, 1000);

        let mut out = Emitter::new(0);
        for start in (0..1000).step_by(300) {
            let len = 300.min(1000 - start);
            let frame =
                Frame::new(sine(440.0, len), MONO, start as u64, len, start + len == 1000).unwrap();
            grapher.process(&frame, &mut out).unwrap();
        }
        // Windows starting past 744 need samples beyond the end.
        assert_eq!(out.records().len(), 8);

        grapher.finalize(FinalizeReason::EndOfStream, &mut out).unwrap();
        let offsets: Vec<u64> = out.records().iter().map(|r| r.offset).collect();
        assert_eq!(offsets, (0..1000).step_by(100).collect::<Vec<u64>>());
    }

    #[test]
    fn test_sparse_columns_skip_samples() {
        let mut grapher = SpectrogramGrapher::new(SpectrogramConfig {
            width: 3,
            height: 8,
            fft_size: 16,
            ..SpectrogramConfig::default()
        });
        setup(&mut grapher, MONO, 300);

        let frame = Frame::from_interleaved(sine(440.0, 300), MONO, 0, true).unwrap();
        let mut out = Emitter::new(0);
        grapher.process(&frame, &mut out).unwrap();
        let offsets: Vec<u64> = out.records().iter().map(|r| r.offset).collect();
        assert_eq!(offsets, vec![0, 100, 200]);
    }

    #[test]
    fn test_low_sample_rate_rejected() {
        let mut grapher = SpectrogramGrapher::default();
        let err = grapher
            .setup(&SetupParams {
                format: StreamFormat::mono(150),
                total_frames: Some(1000),
            })
            .unwrap_err();
        assert_eq!(err, NegotiationError::SampleRate(150));
    }

    #[test]
    fn test_finalize_writes_image() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("spec.ppm");
        let mut grapher = SpectrogramGrapher::new(SpectrogramConfig {
            width: 6,
            height: 12,
            fft_size: 64,
            scheme: ColorScheme::Iso,
            output: Some(path.clone()),
            ..SpectrogramConfig::default()
        });
        setup(&mut grapher, MONO, 600);

        let frame = Frame::from_interleaved(sine(2000.0, 600), MONO, 0, true).unwrap();
        let mut out = Emitter::new(0);
        grapher.process(&frame, &mut out).unwrap();
        grapher.finalize(FinalizeReason::EndOfStream, &mut out).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert!(bytes.starts_with(b"P6\n6 12\n255\n"));
        assert_eq!(bytes.len(), 12 + 6 * 12 * 3);
        assert!(out.metadata().iter().any(|(k, _)| k == "image"));
    }
}

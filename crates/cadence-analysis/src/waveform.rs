//! Waveform grapher.
//!
//! Divides the stream into one column per output pixel. For every column it
//! records the minimum and maximum sample (in the order they occur) and the
//! normalized spectral centroid, which selects the column's colour from the
//! interpolated palette. Columns are emitted as vector records
//! `[first_peak, second_peak, centroid, colour_index]` stamped with the
//! column's start offset.
//!
//! The column width depends on the total stream length, so negotiation fails
//! for sources that cannot report one.

use std::collections::BTreeMap;
use std::path::PathBuf;

use cadence_core::{
    Emitter, FinalizeReason, Frame, NegotiationError, Processor, ProcessorError, ResultValue,
    Role, SetupParams,
};

use crate::centroid::{centroid_hz, normalized_centroid};
use crate::dynamics::ordered_peaks;
use crate::fft::{Fft, Window};
use crate::palette::{Canvas, ColorScheme, Rgb, interpolate_colors};

const PALETTE_SIZE: usize = 256;
const BACKGROUND: Rgb = [0, 0, 0];
const CENTER_LINE_BOOST: u8 = 25;

/// One rendered pixel column.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Column {
    peaks: (f32, f32),
    centroid: f64,
}

/// Configuration for [`WaveformGrapher`].
#[derive(Debug, Clone, PartialEq)]
pub struct WaveformConfig {
    /// Image width; one column per pixel.
    pub width: usize,
    /// Image height in pixels.
    pub height: usize,
    /// FFT size used for the per-column centroid.
    pub fft_size: usize,
    /// Colour scheme.
    pub scheme: ColorScheme,
    /// Where to write a PPM image at finalize, if anywhere.
    pub output: Option<PathBuf>,
}

impl Default for WaveformConfig {
    fn default() -> Self {
        Self {
            width: 500,
            height: 101,
            fft_size: 2048,
            scheme: ColorScheme::Default,
            output: None,
        }
    }
}

/// Per-pixel waveform peaks coloured by spectral centroid.
pub struct WaveformGrapher {
    config: WaveformConfig,
    palette: Vec<Rgb>,
    fft: Option<Fft>,
    sample_rate: u32,
    samples_per_pixel: usize,
    origin: Option<u64>,
    pending: Vec<f32>,
    columns: Vec<Column>,
}

impl WaveformGrapher {
    /// Creates a grapher.
    pub fn new(config: WaveformConfig) -> Self {
        let palette = interpolate_colors(config.scheme.waveform_colors(), PALETTE_SIZE);
        Self {
            config,
            palette,
            fft: None,
            sample_rate: 0,
            samples_per_pixel: 0,
            origin: None,
            pending: Vec::new(),
            columns: Vec::new(),
        }
    }

    fn color_index(centroid: f64) -> usize {
        ((centroid * 255.0) as usize).min(PALETTE_SIZE - 1)
    }

    fn flush_column(&mut self, out: &mut Emitter) {
        let Some(peaks) = ordered_peaks(&self.pending) else {
            return;
        };
        let centroid = match self.fft.as_mut() {
            Some(fft) => {
                let spectrum = fft.magnitudes(&self.pending);
                centroid_hz(&spectrum, self.sample_rate)
                    .map_or(0.0, |hz| normalized_centroid(hz, self.sample_rate))
            }
            None => 0.0,
        };
        let start = self.origin.unwrap_or(0)
            + (self.columns.len() * self.samples_per_pixel) as u64;
        out.emit_at(
            start,
            ResultValue::Vector(vec![
                f64::from(peaks.0),
                f64::from(peaks.1),
                centroid,
                Self::color_index(centroid) as f64,
            ]),
        );
        self.columns.push(Column { peaks, centroid });
        self.pending.clear();
    }

    /// Renders the collected columns.
    fn render(&self) -> Canvas {
        let height = self.config.height;
        let mut canvas = Canvas::new(self.config.width, height, BACKGROUND);
        let half = height as f32 * 0.5;
        let scale = (height as f32 - 4.0).max(0.0) * 0.5;
        let mut previous: Option<(i64, i64)> = None;

        for (x, column) in self.columns.iter().enumerate() {
            let x = x as i64;
            let y1 = half - column.peaks.0 * scale;
            let y2 = half - column.peaks.1 * scale;
            let color = self.palette[Self::color_index(column.centroid)];

            let top = (x, y1 as i64);
            let bottom = (x, y2 as i64);
            if let Some(prev) = previous {
                canvas.line(prev, top, color);
            }
            canvas.line(top, bottom, color);
            previous = Some(bottom);

            // Vertical anti-aliasing at both ends of the column.
            let y_max = y1.max(y2);
            let alpha = y_max.fract();
            if alpha > 0.0 && alpha < 1.0 {
                canvas.blend(x, y_max as i64 + 1, color, alpha);
            }
            let y_min = y1.min(y2);
            let alpha = 1.0 - y_min.fract();
            if alpha > 0.0 && alpha < 1.0 {
                canvas.blend(x, y_min as i64 - 1, color, alpha);
            }
        }
        canvas.brighten_row(height / 2, CENTER_LINE_BOOST);
        canvas
    }
}

impl Default for WaveformGrapher {
    fn default() -> Self {
        Self::new(WaveformConfig::default())
    }
}

impl Processor for WaveformGrapher {
    fn kind(&self) -> &'static str {
        "waveform"
    }

    fn role(&self) -> Role {
        Role::Grapher
    }

    fn params(&self) -> BTreeMap<String, String> {
        let mut params = BTreeMap::from([
            ("width".to_string(), self.config.width.to_string()),
            ("height".to_string(), self.config.height.to_string()),
            ("fft_size".to_string(), self.config.fft_size.to_string()),
            ("scheme".to_string(), self.config.scheme.to_string()),
        ]);
        if let Some(path) = &self.config.output {
            params.insert("output".to_string(), path.display().to_string());
        }
        params
    }

    fn setup(&mut self, params: &SetupParams) -> Result<SetupParams, NegotiationError> {
        let total = params.total_frames.ok_or_else(|| {
            NegotiationError::Unsupported("waveform grapher needs the total stream length".into())
        })?;
        if self.config.width == 0 || self.config.height < 3 {
            return Err(NegotiationError::Unsupported(format!(
                "image size {}x{} is too small",
                self.config.width, self.config.height
            )));
        }
        self.sample_rate = params.format.sample_rate;
        self.samples_per_pixel = ((total / self.config.width as u64) as usize).max(1);
        if self.config.fft_size >= 2 {
            self.fft = Some(Fft::new(self.config.fft_size, Window::Hann));
        }
        self.pending.reserve(self.samples_per_pixel);
        tracing::debug!(
            total,
            samples_per_pixel = self.samples_per_pixel,
            "waveform grapher configured"
        );
        Ok(*params)
    }

    fn process(&mut self, frame: &Frame, out: &mut Emitter) -> Result<(), ProcessorError> {
        self.origin.get_or_insert(frame.start_offset());
        for sample in frame.channel(0) {
            if self.columns.len() == self.config.width {
                break;
            }
            self.pending.push(sample);
            if self.pending.len() == self.samples_per_pixel {
                self.flush_column(out);
            }
        }
        Ok(())
    }

    fn finalize(&mut self, _reason: FinalizeReason, out: &mut Emitter) -> Result<(), ProcessorError> {
        // A trailing partial column is dropped.
        self.pending.clear();

        out.set_metadata("columns", self.columns.len().to_string());
        out.set_metadata("samples_per_pixel", self.samples_per_pixel.to_string());
        out.set_metadata(
            "fields",
            "first_peak,second_peak,centroid,color_index",
        );
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

    const MONO: StreamFormat = StreamFormat::mono(8000);

    fn setup(grapher: &mut WaveformGrapher, total: u64) {
        grapher
            .setup(&SetupParams {
                format: MONO,
                total_frames: Some(total),
            })
            .unwrap();
    }

    #[test]
    fn requires_total_length() {
        let mut grapher = WaveformGrapher::default();
        let err = grapher
            .setup(&SetupParams {
                format: MONO,
                total_frames: None,
            })
            .unwrap_err();
        assert!(matches!(err, NegotiationError::Unsupported(_)));
    }

    #[test]
    fn one_record_per_column() {
        let mut grapher = WaveformGrapher::new(WaveformConfig {
            width: 10,
            height: 21,
            fft_size: 64,
            ..WaveformConfig::default()
        });
        setup(&mut grapher, 1005);

        let samples: Vec<f32> = (0..1005).map(|i| ((i % 100) as f32 / 50.0) - 1.0).collect();
        let frame = Frame::from_interleaved(samples, MONO, 0, true).unwrap();
        let mut out = Emitter::new(0);
        grapher.process(&frame, &mut out).unwrap();

        let records = out.records();
        assert_eq!(records.len(), 10);
        assert_eq!(records[3].offset, 300);
        let ResultValue::Vector(v) = &records[0].value else {
            panic!("expected vector");
        };
        assert_eq!(v[0], -1.0);
        assert!((v[1] - 0.98).abs() < 1e-6);
        assert!(v[3] >= 0.0 && v[3] <= 255.0);
    }

    #[test]
    fn columns_span_frames() {
        let mut grapher = WaveformGrapher::new(WaveformConfig {
            width: 4,
            fft_size: 16,
            ..WaveformConfig::default()
        });
        setup(&mut grapher, 40);

        let mut out = Emitter::new(0);
        for start in (0..40).step_by(7) {
            let len = 7.min(40 - start);
            let frame =
                Frame::new(vec![0.1; len], MONO, start as u64, len, start + len == 40).unwrap();
            grapher.process(&frame, &mut out).unwrap();
        }
        let offsets: Vec<u64> = out.records().iter().map(|r| r.offset).collect();
        assert_eq!(offsets, vec![0, 10, 20, 30]);
    }

    #[test]
    fn finalize_writes_image() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wave.ppm");
        let mut grapher = WaveformGrapher::new(WaveformConfig {
            width: 8,
            height: 9,
            fft_size: 16,
            scheme: ColorScheme::Purple,
            output: Some(path.clone()),
        });
        setup(&mut grapher, 80);

        let samples: Vec<f32> = (0..80).map(|i| (i as f32 * 0.3).sin() * 0.8).collect();
        let frame = Frame::from_interleaved(samples, MONO, 0, true).unwrap();
        let mut out = Emitter::new(0);
        grapher.process(&frame, &mut out).unwrap();
        grapher.finalize(FinalizeReason::EndOfStream, &mut out).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert!(bytes.starts_with(b"P6\n8 9\n255\n"));
        assert_eq!(bytes.len(), 11 + 8 * 9 * 3);
        assert!(out.metadata().iter().any(|(k, _)| k == "image"));
    }
}

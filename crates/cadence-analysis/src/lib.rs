//! Cadence Analysis - analyzers and graphers for cadence pipelines
//!
//! Every type here implements [`cadence_core::Processor`] and can be added to
//! a [`cadence_core::PipelineGraph`] as a branch of the source:
//!
//! - [`LevelMeter`] - Per-block RMS and peak levels
//! - [`SpectralCentroid`] - Per-window spectral centroid in Hz and on a log scale
//! - [`SilenceSegmenter`] - Labeled sound/silence segments
//! - [`WaveformGrapher`] - Per-pixel waveform peaks coloured by spectral centroid
//! - [`SpectrogramGrapher`] - Log-frequency spectrogram columns
//!
//! The signal helpers they are built on are public too:
//!
//! - [`fft`] - FFT wrapper with windowing functions
//! - [`dynamics`] - RMS, peak and dB conversions
//! - [`palette`] - Colour schemes and a PPM canvas
//!
//! ## Example
//!
//! ```rust,ignore
//! use cadence_analysis::{LevelMeter, SpectralCentroid};
//! use cadence_core::PipelineGraph;
//!
//! let mut graph = PipelineGraph::new();
//! graph.add_source(Box::new(decoder))?;
//! graph.add_branch("level", Box::new(LevelMeter::new(1024)))?;
//! graph.add_branch("centroid", Box::new(SpectralCentroid::new(2048)))?;
//! ```

pub mod centroid;
pub mod dynamics;
pub mod fft;
pub mod level;
pub mod palette;
pub mod silence;
pub mod spectrogram;
pub mod waveform;

pub use centroid::{SpectralCentroid, centroid_hz, normalized_centroid};
pub use dynamics::{peak, rms, rms_db, to_db};
pub use fft::{Fft, Window};
pub use level::LevelMeter;
pub use palette::{Canvas, ColorScheme, interpolate_colors};
pub use silence::SilenceSegmenter;
pub use spectrogram::{SpectrogramConfig, SpectrogramGrapher};
pub use waveform::{WaveformConfig, WaveformGrapher};

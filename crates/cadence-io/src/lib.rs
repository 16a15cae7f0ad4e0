//! Reference codecs and result exports for Cadence pipelines.
//!
//! This crate provides:
//!
//! - **WAV I/O**: [`WavDecoder`] streams a file block by block, [`WavEncoder`]
//!   writes 16/24-bit PCM or 32-bit float, [`write_wav`] and [`read_wav_info`]
//!   handle whole files
//! - **In-memory codecs**: [`MemoryDecoder`] and [`MemoryEncoder`] for tests
//!   and embedding
//! - **Synthetic sources**: [`NoiseDecoder`] (optionally with a broken
//!   header) and [`Signal`] for generating test material
//! - **Exports**: [`export_json`] and [`export_csv`] for finished result sets
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use cadence_core::{PipelineGraph, RunContext, Scheduler, Transcode};
//! use cadence_io::{WavDecoder, WavEncoder, export_json};
//!
//! let mut graph = PipelineGraph::new();
//! graph.add_source(Box::new(WavDecoder::new("input.wav")))?;
//! graph.add_branch("copy", Box::new(Transcode::new(Box::new(WavEncoder::new("copy.wav", 16)))))?;
//!
//! let report = Scheduler::new(RunContext::new("copy")).run(graph)?;
//! export_json(report.results(), "results.json")?;
//! ```

mod export;
mod generator;
mod memory;
mod wav;

pub use export::{CSV_HEADER, export_csv, export_json, import_json, write_csv, write_json};
pub use generator::{BrokenHeader, NoiseDecoder, Signal};
pub use memory::{MemoryBuffer, MemoryDecoder, MemoryEncoder};
pub use wav::{WavDecoder, WavEncoder, WavFormat, WavInfo, WavSpec, read_wav_info, write_wav};

/// Error types for file I/O and exports.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// WAV file read/write error.
    #[error("WAV file error: {0}")]
    Wav(#[from] hound::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The requested sample format is not supported.
    #[error("Unsupported sample format: {0}")]
    UnsupportedFormat(String),

    /// Standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type for I/O operations.
pub type Result<T> = std::result::Result<T, Error>;

//! Describe a WAV source as a pipeline will see it.

use std::path::PathBuf;

use anyhow::Context;
use cadence_core::StreamFormat;
use cadence_io::{WavDecoder, WavFormat, read_wav_info};
use clap::Args;

/// Show header details and the block layout a run would use.
#[derive(Args)]
pub struct InfoArgs {
    /// Path to the WAV file
    pub file: PathBuf,

    /// Decoder block size used to count blocks
    #[arg(long, default_value_t = WavDecoder::DEFAULT_BLOCK)]
    pub block_size: usize,
}

/// Run the info command.
pub fn run(args: InfoArgs) -> anyhow::Result<()> {
    let info = read_wav_info(&args.file)
        .with_context(|| format!("reading header of {}", args.file.display()))?;
    let size = std::fs::metadata(&args.file)?.len();

    let encoding = match info.format {
        WavFormat::Pcm => "PCM",
        WavFormat::IeeeFloat => "IEEE Float",
    };
    let format = StreamFormat::new(info.sample_rate, info.channels);
    let block_size = args.block_size.max(1) as u64;

    println!("Source:      {}", args.file.display());
    println!("Encoding:    {encoding} {}-bit", info.bits_per_sample);
    println!("Stream:      {format}");
    println!(
        "Length:      {} frames ({:.3}s)",
        info.num_frames, info.duration_secs
    );
    println!(
        "Blocks:      {} x {} frames",
        info.num_frames.div_ceil(block_size),
        block_size
    );
    println!("Size:        {}", human_size(size));

    Ok(())
}

fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 3] = ["KB", "MB", "GB"];
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit + 1 < UNITS.len() {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.1} {}", UNITS[unit])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_human_size() {
        assert_eq!(human_size(512), "512 B");
        assert_eq!(human_size(2048), "2.0 KB");
        assert_eq!(human_size(3 * 1024 * 1024), "3.0 MB");
    }
}

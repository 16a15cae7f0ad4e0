//! Test signal generation command.

use std::path::PathBuf;

use anyhow::Context;
use cadence_core::StreamFormat;
use cadence_io::{Signal, WavSpec, write_wav};
use cadence_registry::parse_param_value;
use clap::Args;

#[derive(Args)]
pub struct GenerateArgs {
    /// Output WAV file
    #[arg(value_name = "OUTPUT")]
    output: PathBuf,

    /// Signal: noise, silence, sine, or sine:<freq>
    #[arg(long, default_value = "noise")]
    signal: Signal,

    /// Duration (e.g., "10s", "500ms", "2.5")
    #[arg(long, default_value = "10s", value_parser = parse_duration)]
    duration: f64,

    /// Sample rate
    #[arg(long, default_value = "44100")]
    sample_rate: u32,

    /// Number of channels
    #[arg(long, default_value = "1")]
    channels: u16,

    /// Amplitude (0-1)
    #[arg(long, default_value = "0.5")]
    amplitude: f32,

    /// Random seed for noise
    #[arg(long, default_value = "0")]
    seed: u64,

    /// Bit depth (16, 24, or 32)
    #[arg(long, default_value = "16")]
    bits: u16,
}

fn parse_duration(s: &str) -> Result<f64, String> {
    parse_param_value(s)
        .filter(|d| d.is_finite() && *d >= 0.0)
        .ok_or_else(|| format!("invalid duration '{s}'"))
}

pub fn run(args: GenerateArgs) -> anyhow::Result<()> {
    if args.sample_rate == 0 || args.channels == 0 {
        anyhow::bail!("Sample rate and channel count must be positive");
    }
    let signal = match args.signal {
        Signal::Noise { .. } => Signal::Noise { seed: args.seed },
        other => other,
    };
    let format = StreamFormat::new(args.sample_rate, args.channels);
    let frames = (args.duration * f64::from(args.sample_rate)).round() as usize;
    let samples = signal.render(format, frames, args.amplitude.clamp(0.0, 1.0));

    let spec = WavSpec {
        channels: args.channels,
        sample_rate: args.sample_rate,
        bits_per_sample: args.bits,
    };
    write_wav(&args.output, &samples, spec)
        .with_context(|| format!("writing {}", args.output.display()))?;

    println!(
        "Generated {} ({}, {} frames, {})",
        args.output.display(),
        signal,
        frames,
        format
    );
    Ok(())
}

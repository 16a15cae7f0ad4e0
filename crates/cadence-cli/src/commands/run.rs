//! Pipeline run command.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use cadence_config::{PipelineConfig, ProcessorConfig, ProcessorRegistry};
use cadence_core::{CancelToken, ExecutionMode, RunContext, RunReport, Scheduler};
use cadence_io::{WavDecoder, export_csv, export_json};
use clap::Args;

use crate::exit;
use crate::progress::ProgressObserver;

#[derive(Args)]
pub struct RunArgs {
    /// Source WAV file
    #[arg(value_name = "SOURCE")]
    source: PathBuf,

    /// Processor spec, repeatable (e.g., "level@fine:block_size=512")
    #[arg(short, long = "processor", value_name = "SPEC")]
    processors: Vec<String>,

    /// Pipeline file (TOML); -p specs are appended to its processors
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write the result set as JSON
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Write the result set as CSV
    #[arg(long, value_name = "FILE")]
    csv: Option<PathBuf>,

    /// Transcode the source to a WAV file
    #[arg(long, value_name = "FILE")]
    transcode: Option<PathBuf>,

    /// Bit depth for --transcode (16, 24, or 32)
    #[arg(long, default_value = "16")]
    bits: u16,

    /// Run branches in parallel
    #[arg(long)]
    parallel: bool,

    /// Frames buffered per branch in parallel mode
    #[arg(long, value_name = "N")]
    queue_depth: Option<usize>,

    /// Source block size in frames
    #[arg(long)]
    block_size: Option<usize>,

    /// Hide the progress bar
    #[arg(long)]
    no_progress: bool,
}

/// Builds the pipeline description from the file and command-line specs.
fn pipeline_config(args: &RunArgs) -> anyhow::Result<PipelineConfig> {
    let mut config = match &args.config {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::new(
            args.source
                .file_stem()
                .map_or_else(|| "run".to_string(), |s| s.to_string_lossy().into_owned()),
        ),
    };

    for spec in &args.processors {
        config.processors.push(ProcessorConfig::parse_spec(spec)?);
    }
    if let Some(path) = &args.transcode {
        config.processors.push(
            ProcessorConfig::new("wav")
                .with_id("transcode")
                .with_param("path", path.to_string_lossy())
                .with_param("bits", args.bits.to_string()),
        );
    }
    if let Some(block_size) = args.block_size {
        config.block_size = Some(block_size);
    }
    if let Some(depth) = args.queue_depth {
        config.execution.queue_depth = depth;
    }
    if args.parallel {
        config.execution.mode = cadence_config::Mode::Parallel;
    }

    if config.is_empty() {
        anyhow::bail!("No processors specified. Use --processor, --config, or --transcode");
    }
    Ok(config)
}

pub fn run(args: RunArgs) -> anyhow::Result<ExitCode> {
    let config = pipeline_config(&args)?;
    let registry = ProcessorRegistry::new();

    let decoder = match config.block_size {
        Some(block_size) => WavDecoder::with_block_size(&args.source, block_size),
        None => WavDecoder::new(&args.source),
    };
    let graph = config
        .build_graph(&registry, Box::new(decoder))
        .context("building pipeline")?;

    let cancel = CancelToken::new();
    let token = cancel.clone();
    ctrlc::set_handler(move || {
        eprintln!("\nCancelling...");
        token.cancel();
    })?;

    let observer = Arc::new(ProgressObserver::new(!args.no_progress));
    let mode = config.execution_mode();
    let ctx = RunContext::new(&config.name)
        .with_mode(mode)
        .with_cancel_token(cancel)
        .with_observer(observer.clone());

    println!(
        "Running '{}' on {} ({} processor(s), {})",
        config.name,
        args.source.display(),
        config.len(),
        describe_mode(mode)
    );
    let report = match Scheduler::new(ctx).run(graph) {
        Ok(report) => report,
        Err(err) => {
            observer.abandon();
            return Err(err).context(format!("running {}", args.source.display()));
        }
    };

    print_summary(&report);

    if let Some(path) = &args.output {
        export_json(report.results(), path)
            .with_context(|| format!("writing {}", path.display()))?;
        println!("Results written to {}", path.display());
    }
    if let Some(path) = &args.csv {
        export_csv(report.results(), path)
            .with_context(|| format!("writing {}", path.display()))?;
        println!("CSV written to {}", path.display());
    }

    Ok(ExitCode::from(exit::code_for_outcome(report.outcome())))
}

fn describe_mode(mode: ExecutionMode) -> String {
    match mode {
        ExecutionMode::Sequential => "sequential".to_string(),
        ExecutionMode::Parallel { queue_depth } => format!("parallel, queue depth {queue_depth}"),
    }
}

fn print_summary(report: &RunReport) {
    let source = report.source();
    println!();
    println!(
        "Decoded {} frames ({:.2}s, {})",
        report.frames_decoded(),
        source.format.seconds(report.frames_decoded()),
        source.format
    );
    println!();
    println!("  {:20}  {:>8}  {}", "Processor", "Records", "Status");
    println!("  {:20}  {:>8}  {}", "---------", "-------", "------");
    for id in report.order() {
        let records = report
            .results()
            .get(id.as_str())
            .map_or_else(|| "-".to_string(), |c| c.len().to_string());
        let status = report
            .status(id.as_str())
            .map_or_else(|| "unknown".to_string(), ToString::to_string);
        println!("  {:20}  {:>8}  {}", id.as_str(), records, status);
    }
    for (id, artifact) in report.artifacts() {
        println!(
            "  {id} wrote {} ({} frames)",
            artifact.location, artifact.frames
        );
    }
    println!();
    println!("Outcome: {}", report.outcome());
}

//! Cadence CLI - Command-line interface for cadence audio pipelines.

mod commands;
mod exit;
mod progress;

use std::process::ExitCode;

use clap::{ArgAction, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "cadence")]
#[command(author, version, about = "Cadence audio pipeline CLI", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a processing pipeline over an audio file
    Run(commands::run::RunArgs),

    /// List available processors and their parameters
    Processors(commands::processors::ProcessorsArgs),

    /// Display WAV file information
    Info(commands::info::InfoArgs),

    /// Generate test signals
    Generate(commands::generate::GenerateArgs),
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    // RUST_LOG wins unless -v was given explicitly.
    let filter = if verbose == 0 {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
    } else {
        EnvFilter::new(default)
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Run(args) => commands::run::run(args),
        Commands::Processors(args) => commands::processors::run(args).map(|()| ExitCode::SUCCESS),
        Commands::Info(args) => commands::info::run(args).map(|()| ExitCode::SUCCESS),
        Commands::Generate(args) => commands::generate::run(args).map(|()| ExitCode::SUCCESS),
    };

    match result {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::from(exit::code_for_error(&err))
        }
    }
}

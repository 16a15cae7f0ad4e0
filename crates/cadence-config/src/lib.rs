//! Pipeline configuration for cadence.
//!
//! This crate turns declarative pipeline descriptions into
//! [`PipelineGraph`](cadence_core::PipelineGraph)s.
//!
//! # Features
//!
//! - **Pipeline Files**: Load and save pipelines as TOML
//! - **Processor Specs**: Parse `type[@id]:key=value,...` strings from the command line
//! - **Validation**: Unknown types, unknown parents, duplicate ids and bad parameters
//! - **Graph Building**: Instantiate processors through the registry and wire them
//!
//! # Example
//!
//! ```rust,no_run
//! use cadence_config::{PipelineConfig, ProcessorConfig, ProcessorRegistry};
//! use cadence_core::{RunContext, Scheduler};
//! use cadence_io::WavDecoder;
//!
//! let config = PipelineConfig::load("scan.toml")?
//!     .with_processor(ProcessorConfig::parse_spec("silence@gaps:threshold=-50")?);
//!
//! let registry = ProcessorRegistry::new();
//! let graph = config.build_graph(&registry, Box::new(WavDecoder::new("input.wav")))?;
//! let report = Scheduler::new(RunContext::new(&config.name).with_mode(config.execution_mode()))
//!     .run(graph)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod error;
mod pipeline;
mod processor_config;

pub use error::ConfigError;
pub use pipeline::{DEFAULT_QUEUE_DEPTH, ExecutionConfig, Mode, PipelineConfig};
pub use processor_config::ProcessorConfig;

/// Re-export commonly used types from cadence-registry
pub use cadence_registry::{ProcessorDescriptor, ProcessorRegistry, parse_param_value};

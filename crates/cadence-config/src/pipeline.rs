//! Pipeline file format and graph construction.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use cadence_core::{Decoder, ExecutionMode, NodeId, PipelineGraph, SOURCE_ID};
use cadence_registry::ProcessorRegistry;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::processor_config::ProcessorConfig;

/// Default frames buffered per branch in parallel mode.
pub const DEFAULT_QUEUE_DEPTH: usize = 8;

fn default_queue_depth() -> usize {
    DEFAULT_QUEUE_DEPTH
}

/// How branches are scheduled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// All branches on the calling thread.
    #[default]
    Sequential,
    /// One worker thread per branch.
    Parallel,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Sequential => f.write_str("sequential"),
            Mode::Parallel => f.write_str("parallel"),
        }
    }
}

/// The `[execution]` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Scheduling mode.
    #[serde(default)]
    pub mode: Mode,
    /// Frames buffered per branch in parallel mode.
    #[serde(default = "default_queue_depth")]
    pub queue_depth: usize,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            mode: Mode::Sequential,
            queue_depth: DEFAULT_QUEUE_DEPTH,
        }
    }
}

impl ExecutionConfig {
    /// The scheduler's execution mode.
    pub fn execution_mode(&self) -> ExecutionMode {
        match self.mode {
            Mode::Sequential => ExecutionMode::Sequential,
            Mode::Parallel => ExecutionMode::parallel(self.queue_depth),
        }
    }
}

/// Pipeline file format.
///
/// Processors form a tree under the source. Each names its parent, which
/// must be `"source"` or a processor declared earlier in the file.
///
/// # TOML Format
///
/// ```toml
/// name = "scan"
/// block_size = 1024
///
/// [execution]
/// mode = "parallel"
/// queue_depth = 8
///
/// [[processors]]
/// id = "level"
/// type = "level"
/// [processors.params]
/// block_size = "1024"
///
/// [[processors]]
/// id = "wav-out"
/// type = "wav"
/// [processors.params]
/// path = "out.wav"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Name of the pipeline, used as the run id.
    pub name: String,

    /// Block size requested from the source decoder.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_size: Option<usize>,

    /// Scheduling options.
    #[serde(default)]
    pub execution: ExecutionConfig,

    /// Processors in declaration order.
    #[serde(default)]
    pub processors: Vec<ProcessorConfig>,
}

impl PipelineConfig {
    /// Create a new empty pipeline.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            block_size: None,
            execution: ExecutionConfig::default(),
            processors: Vec::new(),
        }
    }

    /// Set the source block size.
    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = Some(block_size);
        self
    }

    /// Set the execution mode.
    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.execution.mode = mode;
        self
    }

    /// Add a processor.
    pub fn with_processor(mut self, processor: ProcessorConfig) -> Self {
        self.processors.push(processor);
        self
    }

    /// Add multiple processors.
    pub fn with_processors(mut self, processors: impl IntoIterator<Item = ProcessorConfig>) -> Self {
        self.processors.extend(processors);
        self
    }

    /// Load a pipeline from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;
        let config: PipelineConfig = toml::from_str(&content)?;
        tracing::debug!(
            path = %path.display(),
            processors = config.processors.len(),
            "loaded pipeline config"
        );
        Ok(config)
    }

    /// Load a pipeline from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Save the pipeline to a TOML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| ConfigError::write_file(path, e))?;
        Ok(())
    }

    /// Convert the pipeline to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// The scheduler's execution mode.
    pub fn execution_mode(&self) -> ExecutionMode {
        self.execution.execution_mode()
    }

    /// Get the number of processors.
    pub fn len(&self) -> usize {
        self.processors.len()
    }

    /// Check if the pipeline has no processors.
    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }

    /// Checks types, ids, parents and parameters against `registry`.
    ///
    /// Every processor is constructed once and discarded, so parameter
    /// errors surface here rather than halfway through graph construction.
    pub fn validate(&self, registry: &ProcessorRegistry) -> Result<(), ConfigError> {
        let mut seen: Vec<&str> = Vec::with_capacity(self.processors.len());
        for processor in &self.processors {
            let id = processor.id();
            if id == SOURCE_ID || seen.contains(&id) {
                return Err(ConfigError::DuplicateId(id.to_string()));
            }
            if !registry.contains(&processor.processor_type) {
                return Err(ConfigError::UnknownProcessor {
                    id: id.to_string(),
                    kind: processor.processor_type.clone(),
                });
            }
            if processor.parent != SOURCE_ID && !seen.contains(&processor.parent.as_str()) {
                return Err(ConfigError::UnknownParent {
                    id: id.to_string(),
                    parent: processor.parent.clone(),
                });
            }
            registry
                .create(&processor.processor_type, &processor.registry_params())
                .map_err(|source| ConfigError::Processor {
                    id: id.to_string(),
                    source,
                })?;
            seen.push(id);
        }
        Ok(())
    }

    /// Validates the pipeline and builds its graph on top of `decoder`.
    pub fn build_graph(
        &self,
        registry: &ProcessorRegistry,
        decoder: Box<dyn Decoder>,
    ) -> Result<PipelineGraph, ConfigError> {
        self.validate(registry)?;

        let mut graph = PipelineGraph::new();
        let source = graph.add_source(decoder)?;
        let mut nodes: HashMap<&str, NodeId> = HashMap::new();
        nodes.insert(SOURCE_ID, source);

        for processor in &self.processors {
            let id = processor.id();
            let instance = registry
                .create(&processor.processor_type, &processor.registry_params())
                .map_err(|source| ConfigError::Processor {
                    id: id.to_string(),
                    source,
                })?;
            let parent = nodes
                .get(processor.parent.as_str())
                .copied()
                .ok_or_else(|| ConfigError::UnknownParent {
                    id: id.to_string(),
                    parent: processor.parent.clone(),
                })?;
            let node = graph.add_chained(parent, id, instance)?;
            nodes.insert(id, node);
        }
        tracing::debug!(
            pipeline = %self.name,
            nodes = graph.node_count(),
            "built pipeline graph"
        );
        Ok(graph)
    }
}

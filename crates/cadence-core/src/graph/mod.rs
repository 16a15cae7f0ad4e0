//! Pipeline graph for the cadence engine.
//!
//! Edit the graph (add processors, connect them), then
//! [`compile()`](PipelineGraph::compile) it into a [`CompiledPlan`]: a
//! topological order plus one [`Branch`] per direct child of the source.
//! The [`Scheduler`](crate::Scheduler) consumes both.
//!
//! # Example
//!
//! ```rust,ignore
//! use cadence_core::{PipelineGraph, Transcode};
//!
//! let mut graph = PipelineGraph::new();
//! graph.add_source(Box::new(decoder))?;
//! graph.add_branch("level", Box::new(level_meter))?;
//! let wav = graph.add_branch("wav", Box::new(Transcode::new(Box::new(encoder))))?;
//! graph.add_chained(wav, "flac", Box::new(Transcode::new(Box::new(other))))?;
//! let plan = graph.compile()?;
//! ```

pub mod edge;
pub mod node;
mod pipeline;
mod plan;

pub use edge::EdgeId;
pub use node::{NodeId, NodeKind, SOURCE_ID};
pub(crate) use pipeline::GraphParts;
pub use pipeline::PipelineGraph;
pub use plan::{Branch, CompiledPlan};

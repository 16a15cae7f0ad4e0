//! Compiled execution plans.

use core::fmt;

use crate::processor::ProcessorId;

use super::node::NodeId;

/// One direct child of the source and everything downstream of it.
///
/// Branches share no state, so each may run on its own worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Branch {
    root: NodeId,
    name: ProcessorId,
    nodes: Vec<NodeId>,
}

impl Branch {
    pub(crate) fn new(root: NodeId, name: ProcessorId) -> Self {
        Self {
            root,
            name,
            nodes: Vec::new(),
        }
    }

    pub(crate) fn push(&mut self, node: NodeId) {
        self.nodes.push(node);
    }

    /// Direct child of the source.
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Processor id of the root.
    pub fn name(&self) -> &ProcessorId {
        &self.name
    }

    /// Nodes of this branch in topological order, root first.
    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    /// Returns true if `node` belongs to this branch.
    pub fn contains(&self, node: NodeId) -> bool {
        self.nodes.contains(&node)
    }
}

/// Deterministic execution plan produced by
/// [`PipelineGraph::compile`](crate::PipelineGraph::compile).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledPlan {
    order: Vec<NodeId>,
    ids: Vec<ProcessorId>,
    branches: Vec<Branch>,
}

impl CompiledPlan {
    pub(crate) fn new(order: Vec<NodeId>, ids: Vec<ProcessorId>, branches: Vec<Branch>) -> Self {
        Self {
            order,
            ids,
            branches,
        }
    }

    /// All nodes in topological order, source first.
    pub fn order(&self) -> &[NodeId] {
        &self.order
    }

    /// Processor ids in topological order, parallel to [`order`](Self::order).
    pub fn ids(&self) -> &[ProcessorId] {
        &self.ids
    }

    /// Branches in graph order.
    pub fn branches(&self) -> &[Branch] {
        &self.branches
    }

    /// Position of a node in the topological order.
    pub fn position(&self, node: NodeId) -> Option<usize> {
        self.order.iter().position(|&n| n == node)
    }
}

impl fmt::Display for CompiledPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, id) in self.ids.iter().enumerate() {
            if i > 0 {
                f.write_str(" → ")?;
            }
            write!(f, "{id}")?;
        }
        write!(f, " ({} branches)", self.branches.len())
    }
}

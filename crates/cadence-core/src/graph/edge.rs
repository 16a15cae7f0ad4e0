//! Graph edge types.
//!
//! An `Edge` is a frame-delivery relation: every frame the parent emits is
//! delivered to the child, re-blocked to the child's block size if it
//! declares one.

use core::fmt;

use super::node::NodeId;

/// Unique identifier for an edge in the pipeline graph.
///
/// Edge IDs are assigned sequentially and never reused within a graph instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct EdgeId(pub(crate) u32);

impl EdgeId {
    /// Returns the raw numeric identifier.
    #[inline]
    pub fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EdgeId({})", self.0)
    }
}

/// A directed connection between two nodes.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Edge {
    /// Parent node.
    pub from: NodeId,
    /// Child node.
    pub to: NodeId,
}

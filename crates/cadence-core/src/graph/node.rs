//! Graph node types.
//!
//! Each node has a [`NodeId`] and a [`NodeKind`]: the single source decoder
//! or a processor. `NodeData` bundles the kind with adjacency lists.

use core::fmt;

use crate::codec::Decoder;
use crate::processor::{Processor, ProcessorId};

use super::edge::EdgeId;

/// Processor id reserved for the source node.
pub const SOURCE_ID: &str = "source";

/// Unique identifier for a node in the pipeline graph.
///
/// Node IDs are assigned sequentially in insertion order and never reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    /// Returns the raw numeric identifier.
    #[inline]
    pub fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

/// What a node holds.
pub enum NodeKind {
    /// The source decoder. Exactly one per graph.
    Source(Box<dyn Decoder>),
    /// Any other processor.
    Processor(Box<dyn Processor>),
}

/// Internal bookkeeping for a node in the graph.
pub(crate) struct NodeData {
    pub id: ProcessorId,
    pub kind: NodeKind,
    /// Edges arriving at this node (at most one).
    pub incoming: Vec<EdgeId>,
    /// Edges leaving this node, in connection order.
    pub outgoing: Vec<EdgeId>,
}

impl NodeData {
    pub fn new(id: ProcessorId, kind: NodeKind) -> Self {
        Self {
            id,
            kind,
            incoming: Vec::new(),
            outgoing: Vec::new(),
        }
    }

    pub fn processor(&self) -> Option<&dyn Processor> {
        match &self.kind {
            NodeKind::Processor(p) => Some(p.as_ref()),
            NodeKind::Source(_) => None,
        }
    }

    pub fn is_source(&self) -> bool {
        matches!(self.kind, NodeKind::Source(_))
    }
}

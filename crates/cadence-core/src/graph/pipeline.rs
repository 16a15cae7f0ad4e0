//! Pipeline graph construction and compilation.

use std::collections::{HashMap, VecDeque};
use std::fmt;

use crate::adapters::{ChannelMixer, LinearResampler};
use crate::codec::Decoder;
use crate::error::GraphError;
use crate::format::FormatConstraint;
use crate::processor::{Processor, ProcessorId, Role};

use super::edge::{Edge, EdgeId};
use super::node::{NodeData, NodeId, NodeKind, SOURCE_ID};
use super::plan::{Branch, CompiledPlan};

/// Directed acyclic graph of processors fed by one decoder.
///
/// Structural rules are enforced as the graph is built, so most mistakes
/// surface at the offending `connect` call:
///
/// - exactly one source, nothing feeds into it
/// - every other node has exactly one parent
/// - no cycles, no duplicate edges, unique processor ids
/// - analyzers and graphers are leaves whose parent is the source or a
///   format adapter
/// - statically known formats on both ends of an edge agree
///
/// [`compile`](Self::compile) re-checks everything that depends on the
/// finished topology (reachability, placement behind adapter chains) and
/// produces a deterministic [`CompiledPlan`].
#[derive(Default)]
pub struct PipelineGraph {
    nodes: Vec<NodeData>,
    edges: Vec<Edge>,
    source: Option<NodeId>,
    ids: HashMap<ProcessorId, NodeId>,
}

impl fmt::Debug for PipelineGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let nodes: Vec<String> = self
            .nodes
            .iter()
            .map(|node| match node.processor() {
                Some(p) => format!("{} ({})", node.id, p.kind()),
                None => node.id.to_string(),
            })
            .collect();
        let edges: Vec<String> = self
            .edges
            .iter()
            .map(|edge| {
                let name = |id: NodeId| {
                    self.nodes
                        .get(id.0 as usize)
                        .map_or_else(|| id.to_string(), |n| n.id.to_string())
                };
                format!("{} -> {}", name(edge.from), name(edge.to))
            })
            .collect();
        f.debug_struct("PipelineGraph")
            .field("nodes", &nodes)
            .field("edges", &edges)
            .finish()
    }
}

/// Owned contents of a graph, consumed by the scheduler.
pub(crate) struct GraphParts {
    pub nodes: Vec<NodeData>,
    pub edges: Vec<Edge>,
    pub source: NodeId,
}

impl PipelineGraph {
    /// Creates an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the source decoder.
    ///
    /// The source always has processor id `"source"`.
    pub fn add_source(&mut self, decoder: Box<dyn Decoder>) -> Result<NodeId, GraphError> {
        if let Some(existing) = self.source {
            return Err(GraphError::MultipleSources(existing));
        }
        let description = decoder.describe();
        let id = self.add_node(ProcessorId::new(SOURCE_ID), NodeKind::Source(decoder));
        self.source = Some(id);
        tracing::debug!("graph_add: source {id} ({description})");
        Ok(id)
    }

    /// Adds an unconnected processor.
    pub fn add_processor(
        &mut self,
        id: impl Into<ProcessorId>,
        processor: Box<dyn Processor>,
    ) -> Result<NodeId, GraphError> {
        let id = id.into();
        if id.as_str() == SOURCE_ID || self.ids.contains_key(&id) {
            return Err(GraphError::DuplicateId(id));
        }
        if processor.role() == Role::Decoder {
            return Err(GraphError::RolePlacement {
                id,
                role: Role::Decoder,
                reason: "decoders can only be added as the graph source".to_string(),
            });
        }
        if processor.block_size() == Some(0) {
            return Err(GraphError::ZeroBlockSize(id));
        }
        let kind = processor.kind();
        let role = processor.role();
        let node = self.add_node(id.clone(), NodeKind::Processor(processor));
        tracing::debug!("graph_add: {role} '{id}' ({kind}) as {node}");
        Ok(node)
    }

    /// Adds a processor as a direct child of the source.
    pub fn add_branch(
        &mut self,
        id: impl Into<ProcessorId>,
        processor: Box<dyn Processor>,
    ) -> Result<NodeId, GraphError> {
        let source = self.source.ok_or(GraphError::MissingSource)?;
        self.add_chained(source, id, processor)
    }

    /// Adds a processor as a child of `parent`.
    pub fn add_chained(
        &mut self,
        parent: NodeId,
        id: impl Into<ProcessorId>,
        processor: Box<dyn Processor>,
    ) -> Result<NodeId, GraphError> {
        self.get_node(parent)?;
        let node = self.add_processor(id, processor)?;
        self.connect(parent, node)?;
        Ok(node)
    }

    /// Connects two nodes with a directed edge.
    ///
    /// Returns the new edge's ID, or an error if:
    /// - Either node doesn't exist
    /// - `to` is the source or already has a parent
    /// - The edge already exists or would create a cycle
    /// - Role placement or static formats forbid it
    pub fn connect(&mut self, from: NodeId, to: NodeId) -> Result<EdgeId, GraphError> {
        self.get_node(from)?;
        let to_node = self.get_node(to)?;

        if to_node.is_source() {
            return Err(GraphError::IntoSource(to));
        }
        if self.has_edge(from, to) {
            return Err(GraphError::DuplicateEdge(from, to));
        }
        if !to_node.incoming.is_empty() {
            return Err(GraphError::MultipleParents(to));
        }
        // A cycle exists if `to` can already reach `from` via existing edges.
        if from == to || self.can_reach(to, from) {
            return Err(GraphError::CycleDetected { from, to });
        }
        self.check_placement(from, to)?;
        self.check_formats(from, to)?;

        let edge_id = EdgeId(self.edges.len() as u32);
        self.edges.push(Edge { from, to });
        self.nodes[from.0 as usize].outgoing.push(edge_id);
        self.nodes[to.0 as usize].incoming.push(edge_id);

        tracing::debug!(
            "graph_connect: {} → {}",
            self.nodes[from.0 as usize].id,
            self.nodes[to.0 as usize].id
        );
        Ok(edge_id)
    }

    /// Connects `from` to `to`, inserting format adapters in between when
    /// `to` requires a channel count or sample rate that `from` is not
    /// statically known to produce.
    ///
    /// Adapters get ids `<to>.mix` and `<to>.resample`. Returns the inserted
    /// adapter nodes in stream order.
    pub fn connect_adapted(&mut self, from: NodeId, to: NodeId) -> Result<Vec<NodeId>, GraphError> {
        self.get_node(from)?;
        let to_node = self.get_node(to)?;
        let required = to_node
            .processor()
            .map_or(FormatConstraint::ANY, |p| p.accepts());
        let to_id = to_node.id.clone();
        let upstream = self.static_output(from);

        let mut adapters: Vec<(String, Box<dyn Processor>)> = Vec::new();
        if let Some(channels) = required.channels
            && upstream.channels != Some(channels)
        {
            adapters.push((format!("{to_id}.mix"), Box::new(ChannelMixer::new(channels))));
        }
        if let Some(rate) = required.sample_rate
            && upstream.sample_rate != Some(rate)
        {
            adapters.push((
                format!("{to_id}.resample"),
                Box::new(LinearResampler::new(rate)),
            ));
        }

        let mut parent = from;
        let mut inserted = Vec::with_capacity(adapters.len());
        for (id, adapter) in adapters {
            let node = self.add_chained(parent, id, adapter)?;
            inserted.push(node);
            parent = node;
        }
        self.connect(parent, to)?;
        Ok(inserted)
    }

    /// Source node, once added.
    pub fn source(&self) -> Option<NodeId> {
        self.source
    }

    /// Looks up a node by processor id.
    pub fn node_id(&self, id: &str) -> Option<NodeId> {
        self.ids.get(id).copied()
    }

    /// Processor id of a node.
    pub fn processor_id(&self, node: NodeId) -> Option<&ProcessorId> {
        self.nodes.get(node.0 as usize).map(|n| &n.id)
    }

    /// Processor held by a node (`None` for the source).
    pub fn processor(&self, node: NodeId) -> Option<&dyn Processor> {
        self.nodes.get(node.0 as usize)?.processor()
    }

    /// Parent of a node.
    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        let data = self.nodes.get(node.0 as usize)?;
        data.incoming
            .first()
            .map(|edge| self.edges[edge.0 as usize].from)
    }

    /// Children of a node, in connection order.
    pub fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.nodes.get(node.0 as usize).map_or_else(Vec::new, |data| {
            data.outgoing
                .iter()
                .map(|edge| self.edges[edge.0 as usize].to)
                .collect()
        })
    }

    /// Number of nodes, source included.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of edges.
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Statically known output format of a node.
    ///
    /// Fields a processor leaves unfixed are inherited from its parent; the
    /// source's format is unknown until it is opened.
    pub fn static_output(&self, node: NodeId) -> FormatConstraint {
        let mut constraint = FormatConstraint::ANY;
        let mut current = Some(node);
        while let Some(id) = current {
            let Some(processor) = self.processor(id) else {
                break;
            };
            let produced = processor.produces();
            constraint.sample_rate = constraint.sample_rate.or(produced.sample_rate);
            constraint.channels = constraint.channels.or(produced.channels);
            current = self.parent(id);
        }
        constraint
    }

    /// Validates the finished topology and computes the execution plan.
    ///
    /// The order is a topological sort (Kahn's algorithm, FIFO queue, ties
    /// broken by insertion order), so it is stable across runs.
    pub fn compile(&self) -> Result<CompiledPlan, GraphError> {
        let source = self.source.ok_or(GraphError::MissingSource)?;

        let reachable = self.reachable_from(source);
        if let Some(node) = self
            .nodes
            .iter()
            .zip(&reachable)
            .find_map(|(node, &ok)| (!ok).then_some(node))
        {
            return Err(GraphError::Unreachable(node.id.clone()));
        }

        for edge in &self.edges {
            self.check_placement(edge.from, edge.to)?;
            self.check_formats(edge.from, edge.to)?;
        }

        let order = self.kahn_sort()?;
        tracing::debug!("graph_sort: {} nodes in topo order", order.len());

        let mut branch_of: HashMap<NodeId, usize> = HashMap::new();
        let mut branches: Vec<Branch> = Vec::new();
        for &node in &order {
            if node == source {
                continue;
            }
            let index = match self.parent(node) {
                Some(parent) if parent == source => {
                    branches.push(Branch::new(node, self.nodes[node.0 as usize].id.clone()));
                    branches.len() - 1
                }
                Some(parent) => branch_of[&parent],
                None => return Err(GraphError::Unreachable(self.nodes[node.0 as usize].id.clone())),
            };
            branch_of.insert(node, index);
            branches[index].push(node);
        }

        let ids = order
            .iter()
            .map(|n| self.nodes[n.0 as usize].id.clone())
            .collect();
        let plan = CompiledPlan::new(order, ids, branches);
        tracing::debug!("graph_plan: {plan}");
        Ok(plan)
    }

    /// Hands the graph's contents to the scheduler.
    pub(crate) fn into_parts(self) -> Result<GraphParts, GraphError> {
        let source = self.source.ok_or(GraphError::MissingSource)?;
        Ok(GraphParts {
            nodes: self.nodes,
            edges: self.edges,
            source,
        })
    }

    // --- Internal helpers ---

    fn add_node(&mut self, id: ProcessorId, kind: NodeKind) -> NodeId {
        let node = NodeId(self.nodes.len() as u32);
        self.ids.insert(id.clone(), node);
        self.nodes.push(NodeData::new(id, kind));
        node
    }

    fn get_node(&self, id: NodeId) -> Result<&NodeData, GraphError> {
        self.nodes
            .get(id.0 as usize)
            .ok_or(GraphError::NodeNotFound(id))
    }

    /// DFS reachability check: can `from` reach `to` via existing edges?
    fn can_reach(&self, from: NodeId, to: NodeId) -> bool {
        let mut visited = vec![false; self.nodes.len()];
        let mut stack = vec![from];

        while let Some(current) = stack.pop() {
            if current == to {
                return true;
            }
            let idx = current.0 as usize;
            if idx >= visited.len() || visited[idx] {
                continue;
            }
            visited[idx] = true;
            stack.extend(self.children(current));
        }
        false
    }

    fn reachable_from(&self, root: NodeId) -> Vec<bool> {
        let mut visited = vec![false; self.nodes.len()];
        let mut stack = vec![root];
        while let Some(current) = stack.pop() {
            let idx = current.0 as usize;
            if visited[idx] {
                continue;
            }
            visited[idx] = true;
            stack.extend(self.children(current));
        }
        visited
    }

    fn has_edge(&self, from: NodeId, to: NodeId) -> bool {
        self.edges.iter().any(|e| e.from == from && e.to == to)
    }

    /// Returns true if every node between `node` and the source is a format
    /// adapter. A chain not yet attached to the source passes; `compile`
    /// rejects it as unreachable.
    fn is_adapter_chain(&self, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            match self.processor(id) {
                None => return true,
                Some(p) if !p.is_adapter() => return false,
                Some(_) => current = self.parent(id),
            }
        }
        true
    }

    fn check_placement(&self, from: NodeId, to: NodeId) -> Result<(), GraphError> {
        let from_node = &self.nodes[from.0 as usize];
        let to_node = &self.nodes[to.0 as usize];

        if let Some(parent) = from_node.processor()
            && !parent.role().can_feed()
        {
            return Err(GraphError::RolePlacement {
                id: from_node.id.clone(),
                role: parent.role(),
                reason: "analyzers and graphers cannot feed other processors".to_string(),
            });
        }
        if let Some(child) = to_node.processor()
            && child.role().owns_results()
            && !self.is_adapter_chain(from)
        {
            return Err(GraphError::RolePlacement {
                id: to_node.id.clone(),
                role: child.role(),
                reason: format!(
                    "parent '{}' is neither the source nor a format adapter",
                    from_node.id
                ),
            });
        }
        Ok(())
    }

    fn check_formats(&self, from: NodeId, to: NodeId) -> Result<(), GraphError> {
        let Some(child) = self.nodes[to.0 as usize].processor() else {
            return Ok(());
        };
        let required = child.accepts();
        let produced = self.static_output(from);
        if produced.compatible_with(&required) {
            return Ok(());
        }
        Err(GraphError::IncompatibleFormat {
            parent: self.nodes[from.0 as usize].id.clone(),
            child: self.nodes[to.0 as usize].id.clone(),
            required: required.to_string(),
            produced: produced.to_string(),
        })
    }

    /// Performs Kahn's algorithm for topological sorting.
    fn kahn_sort(&self) -> Result<Vec<NodeId>, GraphError> {
        let n = self.nodes.len();
        let mut in_degree: Vec<usize> = self.nodes.iter().map(|node| node.incoming.len()).collect();

        let mut queue: VecDeque<NodeId> = (0..n)
            .filter(|&i| in_degree[i] == 0)
            .map(|i| NodeId(i as u32))
            .collect();

        let mut sorted = Vec::with_capacity(n);
        while let Some(node) = queue.pop_front() {
            sorted.push(node);
            let mut ready: Vec<NodeId> = Vec::new();
            for child in self.children(node) {
                let idx = child.0 as usize;
                in_degree[idx] -= 1;
                if in_degree[idx] == 0 {
                    ready.push(child);
                }
            }
            ready.sort_unstable();
            queue.extend(ready);
        }

        if sorted.len() != n {
            let stuck = (0..n).find(|&i| in_degree[i] > 0).unwrap_or(0);
            let to = NodeId(stuck as u32);
            let from = self.parent(to).unwrap_or(to);
            return Err(GraphError::CycleDetected { from, to });
        }
        Ok(sorted)
    }
}

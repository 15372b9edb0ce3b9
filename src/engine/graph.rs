use super::record::{NodeId, Outcome};
use crate::{Error, Result};
use petgraph::Direction;
use petgraph::prelude::EdgeRef;
use petgraph::stable_graph::{EdgeIndex, NodeIndex, StableGraph};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Curvature given to self-loops so they render apart from their node
pub const SELF_LOOP_CURVATURE: f64 = 2.0;
pub const DEFAULT_CURVATURE: f64 = 0.1;

/// Width of a link carrying `count` transitions when the busiest carries `max`.
///
/// Linear in `count`, in `[1, 11]` for `count <= max`. A zero maximum is treated as 1.
pub fn normalized_width(count: u64, max: u64) -> f64 {
    let max = max.max(1) as f64;
    (count as f64 / max) * 10.0 + 1.0
}

/// A unique problem-solving state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub label: String,
    /// Mean step index at which the state was visited
    pub rank: f64,
    pub times_errored: u64,
    pub problem_id: Option<String>,
    /// Distinct incoming links
    pub edges_in: usize,
    /// Distinct outgoing links
    pub edges_out: usize,
    /// Transitions over incoming links
    pub cumulative_edges_in: u64,
    /// Transitions over outgoing links
    pub cumulative_edges_out: u64,
    pub self_loops: usize,
    pub cumulative_self_loops: u64,
    #[serde(default)]
    pub display: NodeDisplay,
}

/// Presentation hints owned by the renderer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeDisplay {
    pub color: Option<String>,
    pub shape: Option<NodeShape>,
    pub pinned: Option<Position>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeShape {
    Circle,
    Square,
    Triangle,
    Diamond,
    Star,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Node {
    pub fn new(id: NodeId, problem_id: Option<String>) -> Self {
        let label = id.default_label();
        Self {
            id,
            label,
            rank: 0.0,
            times_errored: 0,
            problem_id,
            edges_in: 0,
            edges_out: 0,
            cumulative_edges_in: 0,
            cumulative_edges_out: 0,
            self_loops: 0,
            cumulative_self_loops: 0,
            display: NodeDisplay::default(),
        }
    }

    pub fn with_rank(mut self, rank: f64) -> Self {
        self.rank = rank;
        self
    }

    pub fn with_times_errored(mut self, times_errored: u64) -> Self {
        self.times_errored = times_errored;
        self
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.display.color = Some(color.into());
        self
    }

    fn reset_degrees(&mut self) {
        self.edges_in = 0;
        self.edges_out = 0;
        self.cumulative_edges_in = 0;
        self.cumulative_edges_out = 0;
        self.self_loops = 0;
        self.cumulative_self_loops = 0;
    }
}

/// Qualitative color of a link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LinkColor {
    #[serde(rename = "green")]
    Success,
    #[serde(rename = "red")]
    Failure,
}

impl LinkColor {
    pub fn from_outcome(outcome: Outcome) -> Self {
        if outcome.is_success() {
            LinkColor::Success
        } else {
            LinkColor::Failure
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LinkColor::Success => "green",
            LinkColor::Failure => "red",
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, LinkColor::Failure)
    }
}

/// A unique observed transition between two states
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub source: NodeId,
    pub target: NodeId,
    pub num_of_transitions: u64,
    pub width: f64,
    pub color: LinkColor,
    pub curvature: f64,
}

impl Link {
    pub fn new(source: NodeId, target: NodeId, num_of_transitions: u64, max_count: u64) -> Self {
        let curvature = if source == target {
            SELF_LOOP_CURVATURE
        } else {
            DEFAULT_CURVATURE
        };
        Self {
            source,
            target,
            num_of_transitions,
            width: normalized_width(num_of_transitions, max_count),
            color: LinkColor::Success,
            curvature,
        }
    }

    pub fn with_color(mut self, color: LinkColor) -> Self {
        self.color = color;
        self
    }

    pub fn is_self_loop(&self) -> bool {
        self.source == self.target
    }
}

/// Serializable snapshot handed to renderers
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphData {
    pub nodes: Vec<Node>,
    pub links: Vec<Link>,
    pub max_transition_count: u64,
}

/// A directed graph of student paths through problem-solving states.
///
/// Nodes are unique states and edges are unique transitions between them, weighted
/// by how many times students made that move.
#[derive(Debug, Clone, Default)]
pub struct PathGraph {
    /// The underlying graph structure.
    pub graph: StableGraph<Node, Link>,

    /// Lookup from state identity to graph index.
    ///
    /// Keeps one node per state and lets links be attached by id.
    pub node_index: HashMap<NodeId, NodeIndex>,

    link_index: HashMap<(NodeId, NodeId), EdgeIndex>,

    /// Largest raw transition count observed when the graph was built
    pub max_transition_count: u64,
}

impl PathGraph {
    pub fn new(max_transition_count: u64) -> Self {
        Self {
            max_transition_count,
            ..Self::default()
        }
    }

    /// Build a graph from node and link lists, keeping node statistics as given.
    pub fn from_parts(
        nodes: impl IntoIterator<Item = Node>,
        links: impl IntoIterator<Item = Link>,
        max_transition_count: u64,
    ) -> Result<Self> {
        let mut graph = Self::new(max_transition_count);
        for node in nodes {
            graph.add_node(node);
        }
        for link in links {
            graph.add_link(link)?;
        }
        Ok(graph)
    }

    /// Adds a node unless one with the same id exists, returning its index.
    pub fn add_node(&mut self, node: Node) -> NodeIndex {
        if let Some(&idx) = self.node_index.get(&node.id) {
            return idx;
        }
        let id = node.id.clone();
        let idx = self.graph.add_node(node);
        self.node_index.insert(id, idx);
        idx
    }

    /// Adds a link between two existing nodes.
    ///
    /// An existing link for the same pair is kept and its index returned.
    pub fn add_link(&mut self, link: Link) -> Result<EdgeIndex> {
        let key = (link.source.clone(), link.target.clone());
        if let Some(&idx) = self.link_index.get(&key) {
            return Ok(idx);
        }

        match (
            self.node_index.get(&link.source),
            self.node_index.get(&link.target),
        ) {
            (Some(&from), Some(&to)) => {
                let idx = self.graph.add_edge(from, to, link);
                self.link_index.insert(key, idx);
                Ok(idx)
            }
            _ => Err(Error::inconsistent(format!(
                "link {} -> {} references a missing node",
                key.0, key.1
            ))),
        }
    }

    pub fn contains_node(&self, id: &NodeId) -> bool {
        self.node_index.contains_key(id)
    }

    pub fn contains_link(&self, source: &NodeId, target: &NodeId) -> bool {
        self.link_index.contains_key(&(source.clone(), target.clone()))
    }

    pub fn node(&self, id: &NodeId) -> Option<&Node> {
        self.node_index
            .get(id)
            .and_then(|&idx| self.graph.node_weight(idx))
    }

    pub fn node_mut(&mut self, id: &NodeId) -> Option<&mut Node> {
        self.node_index
            .get(id)
            .and_then(|&idx| self.graph.node_weight_mut(idx))
    }

    pub fn link(&self, source: &NodeId, target: &NodeId) -> Option<&Link> {
        self.link_index
            .get(&(source.clone(), target.clone()))
            .and_then(|&idx| self.graph.edge_weight(idx))
    }

    /// Nodes in insertion order
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.graph
            .node_indices()
            .filter_map(|idx| self.graph.node_weight(idx))
    }

    /// Links in insertion order
    pub fn links(&self) -> impl Iterator<Item = &Link> {
        self.graph
            .edge_indices()
            .filter_map(|idx| self.graph.edge_weight(idx))
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn link_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn node_ids(&self) -> HashSet<NodeId> {
        self.node_index.keys().cloned().collect()
    }

    /// Ids referenced as source or target by some link
    pub fn endpoint_ids(&self) -> HashSet<NodeId> {
        self.links()
            .flat_map(|link| [link.source.clone(), link.target.clone()])
            .collect()
    }

    /// Whether every link endpoint is a node of this graph and the index agrees
    /// with the stored nodes.
    pub fn is_consistent(&self) -> bool {
        let index_ok = self.node_index.iter().all(|(id, &idx)| {
            self.graph
                .node_weight(idx)
                .is_some_and(|node| &node.id == id)
        });
        index_ok
            && self.node_index.len() == self.graph.node_count()
            && self
                .links()
                .all(|l| self.contains_node(&l.source) && self.contains_node(&l.target))
    }

    /// Recompute in/out degrees, cumulative transition sums and self-loop counts
    /// from the current link set.
    pub fn recompute_degrees(&mut self) {
        let indices: Vec<NodeIndex> = self.graph.node_indices().collect();
        for idx in indices {
            let mut edges_out = 0;
            let mut cumulative_out = 0;
            let mut self_loops = 0;
            let mut cumulative_self_loops = 0;
            for edge in self.graph.edges_directed(idx, Direction::Outgoing) {
                edges_out += 1;
                cumulative_out += edge.weight().num_of_transitions;
                if edge.target() == idx {
                    self_loops += 1;
                    cumulative_self_loops += edge.weight().num_of_transitions;
                }
            }

            let mut edges_in = 0;
            let mut cumulative_in = 0;
            for edge in self.graph.edges_directed(idx, Direction::Incoming) {
                edges_in += 1;
                cumulative_in += edge.weight().num_of_transitions;
            }

            if let Some(node) = self.graph.node_weight_mut(idx) {
                node.reset_degrees();
                node.edges_out = edges_out;
                node.edges_in = edges_in;
                node.cumulative_edges_out = cumulative_out;
                node.cumulative_edges_in = cumulative_in;
                node.self_loops = self_loops;
                node.cumulative_self_loops = cumulative_self_loops;
            }
        }
    }

    /// Outgoing links of a node
    pub fn outgoing_links(&self, id: &NodeId) -> Vec<&Link> {
        self.directed_links(id, Direction::Outgoing)
    }

    /// Incoming links of a node
    pub fn incoming_links(&self, id: &NodeId) -> Vec<&Link> {
        self.directed_links(id, Direction::Incoming)
    }

    fn directed_links(&self, id: &NodeId, direction: Direction) -> Vec<&Link> {
        match self.node_index.get(id) {
            Some(&idx) => self
                .graph
                .edges_directed(idx, direction)
                .map(|edge| edge.weight())
                .collect(),
            None => Vec::new(),
        }
    }

    /// Nodes no other node links into (self-loops ignored)
    pub fn find_initial_nodes(&self) -> Vec<&Node> {
        self.nodes_without(Direction::Incoming)
    }

    /// Nodes that never link onwards (self-loops ignored)
    pub fn find_terminal_nodes(&self) -> Vec<&Node> {
        self.nodes_without(Direction::Outgoing)
    }

    fn nodes_without(&self, direction: Direction) -> Vec<&Node> {
        self.graph
            .node_indices()
            .filter(|&idx| {
                self.graph
                    .edges_directed(idx, direction)
                    .all(|edge| edge.source() == edge.target())
            })
            .filter_map(|idx| self.graph.node_weight(idx))
            .collect()
    }

    /// Serializable copy of the graph
    pub fn to_data(&self) -> GraphData {
        GraphData {
            nodes: self.nodes().cloned().collect(),
            links: self.links().cloned().collect(),
            max_transition_count: self.max_transition_count,
        }
    }

    /// Export to DOT format for Graphviz
    pub fn to_dot(&self) -> String {
        let mut dot = "digraph PathGraph {\n".to_string();
        dot.push_str("  rankdir=TB;\n");
        dot.push_str("  node [shape=box, style=filled];\n\n");

        for idx in self.graph.node_indices() {
            if let Some(node) = self.graph.node_weight(idx) {
                let color = node.display.color.as_deref().unwrap_or("lightgray");
                dot.push_str(&format!(
                    "  n{} [label=\"{}\", fillcolor=\"{}\"];\n",
                    idx.index(),
                    escape_dot(&node.label),
                    escape_dot(color)
                ));
            }
        }

        dot.push('\n');

        for edge_idx in self.graph.edge_indices() {
            if let Some((from_idx, to_idx)) = self.graph.edge_endpoints(edge_idx)
                && let Some(link) = self.graph.edge_weight(edge_idx)
            {
                dot.push_str(&format!(
                    "  n{} -> n{} [label=\"{}\", color=\"{}\", penwidth={:.2}];\n",
                    from_idx.index(),
                    to_idx.index(),
                    link.num_of_transitions,
                    link.color.as_str(),
                    link.width
                ));
            }
        }

        dot.push_str("}\n");
        dot
    }

    /// Get graph statistics
    pub fn stats(&self) -> GraphStats {
        GraphStats {
            total_nodes: self.node_count(),
            total_links: self.link_count(),
            self_loops: self.links().filter(|l| l.is_self_loop()).count(),
            error_links: self.links().filter(|l| l.color.is_error()).count(),
            initial_nodes: self.find_initial_nodes().len(),
            terminal_nodes: self.find_terminal_nodes().len(),
            total_transitions: self.links().map(|l| l.num_of_transitions).sum(),
            max_transition_count: self.max_transition_count,
        }
    }
}

impl TryFrom<GraphData> for PathGraph {
    type Error = Error;

    fn try_from(data: GraphData) -> Result<Self> {
        PathGraph::from_parts(data.nodes, data.links, data.max_transition_count)
    }
}

fn escape_dot(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphStats {
    pub total_nodes: usize,
    pub total_links: usize,
    pub self_loops: usize,
    pub error_links: usize,
    pub initial_nodes: usize,
    pub terminal_nodes: usize,
    pub total_transitions: u64,
    pub max_transition_count: u64,
}

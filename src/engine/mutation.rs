//! Set-based graph mutation helpers
//!
//! These work on node and link lists and never reconcile on their own; use
//! [`remove_unused_links`] or [`reconcile`] when a consistent graph is needed.

use super::graph::{Link, Node, PathGraph};
use super::record::NodeId;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Naming conventions that mark auxiliary and solver states
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeMarkers {
    #[serde(default = "default_aux")]
    pub aux: String,
    #[serde(default = "default_solver")]
    pub solver: String,
    /// Color given to auxiliary nodes
    #[serde(default = "default_aux_color")]
    pub aux_color: String,
}

fn default_aux() -> String {
    "aux".to_string()
}

fn default_solver() -> String {
    "solver".to_string()
}

fn default_aux_color() -> String {
    "orange".to_string()
}

impl Default for NodeMarkers {
    fn default() -> Self {
        Self {
            aux: default_aux(),
            solver: default_solver(),
            aux_color: default_aux_color(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ErrorLinkSplit {
    pub without_errors: Vec<Link>,
    pub error_links: Vec<Link>,
}

/// Partition links by whether they are error-colored.
pub fn remove_error_links_and_store(links: &[Link]) -> ErrorLinkSplit {
    let (error_links, without_errors): (Vec<Link>, Vec<Link>) =
        links.iter().cloned().partition(|l| l.color.is_error());
    ErrorLinkSplit {
        without_errors,
        error_links,
    }
}

#[derive(Debug, Clone, Default)]
pub struct SolverSplit {
    pub without_solver: Vec<Node>,
    pub solver_nodes: Vec<Node>,
}

/// Recolor auxiliary nodes and strip solver nodes.
///
/// Solver nodes are only stripped when the graph has at least one auxiliary node;
/// otherwise the nodes come back untouched. A node marked both ways is kept.
pub fn remove_solver_nodes(nodes: Vec<Node>, markers: &NodeMarkers) -> SolverSplit {
    if !nodes.iter().any(|n| n.id.contains(&markers.aux)) {
        return SolverSplit {
            without_solver: nodes,
            solver_nodes: Vec::new(),
        };
    }

    let mut split = SolverSplit::default();
    for mut node in nodes {
        let aux = node.id.contains(&markers.aux);
        if aux {
            node = node.with_color(markers.aux_color.clone());
        }
        if node.id.contains(&markers.solver) && !aux {
            split.solver_nodes.push(node);
        } else {
            split.without_solver.push(node);
        }
    }

    tracing::debug!(
        "Removed {} solver nodes, kept {}",
        split.solver_nodes.len(),
        split.without_solver.len()
    );
    split
}

#[derive(Debug, Clone, Default)]
pub struct LinkReconciliation {
    pub old_links: Vec<Link>,
    pub new_links: Vec<Link>,
}

/// Keep only links whose endpoints are both in `nodes`.
pub fn remove_unused_links(nodes: &[Node], links: Vec<Link>) -> LinkReconciliation {
    let ids: HashSet<&NodeId> = nodes.iter().map(|n| &n.id).collect();
    let new_links = links
        .iter()
        .filter(|l| ids.contains(&l.source) && ids.contains(&l.target))
        .cloned()
        .collect();
    LinkReconciliation {
        old_links: links,
        new_links,
    }
}

/// Turn a pruned node list back into a consistent graph.
pub fn reconcile(nodes: Vec<Node>, links: Vec<Link>, max_transition_count: u64) -> Result<PathGraph> {
    let links = remove_unused_links(&nodes, links).new_links;
    PathGraph::from_parts(nodes, links, max_transition_count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::graph::LinkColor;

    fn node(id: &str) -> Node {
        Node::new(NodeId::goal(id), None)
    }

    fn link(from: &str, to: &str, color: LinkColor) -> Link {
        Link::new(NodeId::goal(from), NodeId::goal(to), 1, 1).with_color(color)
    }

    #[test]
    fn test_error_link_split() {
        let links = vec![
            link("A", "B", LinkColor::Success),
            link("B", "C", LinkColor::Failure),
            link("C", "A", LinkColor::Success),
        ];

        let split = remove_error_links_and_store(&links);
        assert_eq!(split.without_errors.len(), 2);
        assert_eq!(split.error_links.len(), 1);
        assert_eq!(split.error_links[0].source, NodeId::goal("B"));
        // input untouched
        assert_eq!(links.len(), 3);
    }

    #[test]
    fn test_solver_nodes_removed_when_aux_present() {
        let nodes = vec![
            node("start"),
            node("solver-step"),
            node("aux-step"),
            node("aux-solver"),
        ];

        let split = remove_solver_nodes(nodes, &NodeMarkers::default());
        let kept: Vec<String> = split.without_solver.iter().map(|n| n.id.to_string()).collect();
        assert_eq!(kept, vec!["start", "aux-step", "aux-solver"]);
        assert_eq!(split.solver_nodes.len(), 1);
        assert_eq!(split.solver_nodes[0].id, NodeId::goal("solver-step"));

        let aux = &split.without_solver[1];
        assert_eq!(aux.display.color.as_deref(), Some("orange"));
        assert_eq!(split.without_solver[0].display.color, None);
    }

    #[test]
    fn test_solver_nodes_kept_without_aux() {
        let split = remove_solver_nodes(vec![node("solver-step"), node("start")], &NodeMarkers::default());
        assert_eq!(split.without_solver.len(), 2);
        assert!(split.solver_nodes.is_empty());
    }

    #[test]
    fn test_remove_unused_links_and_reconcile() {
        let nodes = vec![node("A"), node("B")];
        let links = vec![
            link("A", "B", LinkColor::Success),
            link("B", "C", LinkColor::Success),
        ];

        let reconciled = remove_unused_links(&nodes, links.clone());
        assert_eq!(reconciled.old_links.len(), 2);
        assert_eq!(reconciled.new_links.len(), 1);

        let graph = reconcile(nodes, links, 1).unwrap();
        assert!(graph.is_consistent());
        assert_eq!(graph.link_count(), 1);
    }
}

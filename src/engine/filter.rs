//! Edge-threshold filtering and node reconciliation
//!
//! The filter is re-run every time the user moves the threshold. It always
//! recomputes the surviving links from the full graph, then either prunes nodes
//! (threshold raised) or restores them (threshold lowered). Pruned nodes are kept
//! in the caller-owned [`FilterState`] so restoring them needs no re-aggregation
//! and keeps any renderer metadata they carried.

use super::graph::{Link, Node, PathGraph};
use super::record::NodeId;
use crate::{Error, Result};
use std::collections::{HashMap, HashSet};

/// Filter state carried between successive threshold changes
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterState {
    /// Threshold currently applied
    pub threshold: f64,
    /// Threshold applied before the last change
    pub previous_threshold: f64,
    /// Nodes pruned by earlier calls, available for restoration
    pub removed_nodes: Vec<Node>,
}

impl FilterState {
    pub fn new() -> Self {
        Self::default()
    }
}

/// The current view of the graph together with the state that produced it
#[derive(Debug, Clone)]
pub struct FilteredGraph {
    pub graph: PathGraph,
    pub state: FilterState,
}

/// Convert a slider percentage of the maximum transition count into an absolute threshold.
pub fn percent_to_absolute(percent: f64, max_transition_count: u64) -> f64 {
    (percent / 100.0) * max_transition_count as f64
}

/// First filtering of a freshly built graph.
pub fn start(full: &PathGraph, threshold: f64) -> Result<FilteredGraph> {
    apply_threshold(full, full, FilterState::new(), threshold)
}

/// Apply `threshold` to `full`, updating the `current` view.
///
/// Links with at least `threshold` transitions survive; a threshold of 0 keeps
/// every link. The returned view holds exactly the endpoints of the surviving
/// links, in the order of the full graph.
pub fn apply_threshold(
    full: &PathGraph,
    current: &PathGraph,
    state: FilterState,
    threshold: f64,
) -> Result<FilteredGraph> {
    if !threshold.is_finite() || threshold < 0.0 {
        return Err(Error::InvalidThreshold(threshold));
    }

    let previous = state.threshold;
    let mut removed_nodes = state.removed_nodes;
    let links = change_link_threshold(full.links(), threshold);
    let current_nodes: Vec<Node> = current.nodes().cloned().collect();

    let nodes = if threshold > previous {
        let split = remove_unused_nodes(current_nodes, &links);
        tracing::debug!(
            "Threshold raised {} -> {}: {} links, {} nodes pruned",
            previous,
            threshold,
            links.len(),
            split.removed_nodes.len()
        );
        remember(&mut removed_nodes, split.removed_nodes);
        // only does work when `current` was not reconciled on entry
        add_unused_nodes(split.new_nodes, &links, &mut removed_nodes, full)?
    } else {
        let before = current_nodes.len();
        let restored = add_unused_nodes(current_nodes, &links, &mut removed_nodes, full)?;
        tracing::debug!(
            "Threshold lowered {} -> {}: {} links, {} nodes restored",
            previous,
            threshold,
            links.len(),
            restored.len() - before
        );
        let split = remove_unused_nodes(restored, &links);
        remember(&mut removed_nodes, split.removed_nodes);
        split.new_nodes
    };

    let graph = assemble(full, nodes, links)?;
    Ok(FilteredGraph {
        graph,
        state: FilterState {
            threshold,
            previous_threshold: previous,
            removed_nodes,
        },
    })
}

/// Links carrying at least `threshold` transitions; 0 keeps them all.
pub fn change_link_threshold<'a>(
    links: impl IntoIterator<Item = &'a Link>,
    threshold: f64,
) -> Vec<Link> {
    links
        .into_iter()
        .filter(|link| threshold == 0.0 || link.num_of_transitions as f64 >= threshold)
        .cloned()
        .collect()
}

/// Result of pruning nodes against a link set
#[derive(Debug, Clone, Default)]
pub struct NodeSplit {
    pub new_nodes: Vec<Node>,
    pub removed_nodes: Vec<Node>,
}

/// Split `nodes` into those referenced by some link and the rest.
pub fn remove_unused_nodes(nodes: Vec<Node>, links: &[Link]) -> NodeSplit {
    let referenced = endpoints(links);
    let (new_nodes, removed_nodes): (Vec<Node>, Vec<Node>) = nodes
        .into_iter()
        .partition(|node| referenced.contains(&node.id));
    NodeSplit {
        new_nodes,
        removed_nodes,
    }
}

/// Add every link endpoint missing from `nodes`.
///
/// Missing nodes are taken out of `removed` when present, otherwise copied from
/// `full`. An endpoint found in neither is an error.
pub fn add_unused_nodes(
    mut nodes: Vec<Node>,
    links: &[Link],
    removed: &mut Vec<Node>,
    full: &PathGraph,
) -> Result<Vec<Node>> {
    let mut present: HashSet<NodeId> = nodes.iter().map(|n| n.id.clone()).collect();
    let stored = id_positions(removed);
    let mut taken = vec![false; removed.len()];

    for id in links.iter().flat_map(|l| [&l.source, &l.target]) {
        if present.contains(id) {
            continue;
        }
        let node = match stored.get(id) {
            Some(&pos) => {
                taken[pos] = true;
                removed[pos].clone()
            }
            None => full
                .node(id)
                .cloned()
                .ok_or_else(|| Error::inconsistent(format!("no node {} to restore", id)))?,
        };
        present.insert(id.clone());
        nodes.push(node);
    }

    let mut flags = taken.into_iter();
    removed.retain(|_| !flags.next().unwrap_or(false));
    Ok(nodes)
}

fn endpoints(links: &[Link]) -> HashSet<&NodeId> {
    links.iter().flat_map(|l| [&l.source, &l.target]).collect()
}

fn id_positions(nodes: &[Node]) -> HashMap<NodeId, usize> {
    nodes
        .iter()
        .enumerate()
        .map(|(pos, n)| (n.id.clone(), pos))
        .collect()
}

/// Add pruned nodes to the store, replacing older copies of the same node.
fn remember(store: &mut Vec<Node>, removed: Vec<Node>) {
    let mut positions = id_positions(store);
    for node in removed {
        match positions.get(&node.id) {
            Some(&pos) => store[pos] = node,
            None => {
                positions.insert(node.id.clone(), store.len());
                store.push(node);
            }
        }
    }
}

/// Build the view graph with nodes ordered as in `full`.
fn assemble(full: &PathGraph, nodes: Vec<Node>, links: Vec<Link>) -> Result<PathGraph> {
    let mut by_id: HashMap<NodeId, Node> = nodes.into_iter().map(|n| (n.id.clone(), n)).collect();
    let ordered: Vec<Node> = full
        .nodes()
        .filter_map(|n| by_id.remove(&n.id))
        .collect();
    PathGraph::from_parts(ordered, links, full.max_transition_count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::builder::{BuildOptions, build_graph};
    use crate::engine::graph::Position;
    use crate::engine::record::{EventRecord, Outcome};
    use proptest::prelude::*;

    fn goal(id: &str) -> NodeId {
        NodeId::goal(id)
    }

    fn sample_graph() -> PathGraph {
        let records = vec![
            EventRecord::new("s1", goal("A"), Some(goal("B")), Outcome::Correct),
            EventRecord::new("s1", goal("B"), Some(goal("C")), Outcome::Error),
            EventRecord::new("s1", goal("A"), Some(goal("B")), Outcome::Correct),
        ];
        build_graph(&records, &BuildOptions::default()).unwrap()
    }

    fn ids(graph: &PathGraph) -> Vec<NodeId> {
        graph.nodes().map(|n| n.id.clone()).collect()
    }

    #[test]
    fn test_thresholds_on_sample() {
        let full = sample_graph();

        let view = start(&full, 2.0).unwrap();
        assert_eq!(view.graph.link_count(), 1);
        assert!(view.graph.contains_link(&goal("A"), &goal("B")));
        assert_eq!(ids(&view.graph), vec![goal("A"), goal("B")]);
        assert_eq!(view.state.removed_nodes.len(), 1);
        assert_eq!(view.state.previous_threshold, 0.0);

        for threshold in [0.0, 1.0] {
            let view = start(&full, threshold).unwrap();
            assert_eq!(view.graph.link_count(), 2);
            assert_eq!(ids(&view.graph), vec![goal("A"), goal("B"), goal("C")]);
        }
    }

    #[test]
    fn test_raise_then_lower_restores_removed_nodes() {
        let full = sample_graph();
        let view = start(&full, 1.0).unwrap();

        let raised = apply_threshold(&full, &view.graph, view.state, 2.0).unwrap();
        assert_eq!(raised.graph.node_count(), 2);
        assert_eq!(raised.state.removed_nodes[0].id, goal("C"));

        let lowered = apply_threshold(&full, &raised.graph, raised.state, 1.0).unwrap();
        assert_eq!(ids(&lowered.graph), ids(&view.graph));
        assert_eq!(lowered.graph.to_data(), view.graph.to_data());
        assert!(lowered.state.removed_nodes.is_empty());
        assert_eq!(lowered.state.previous_threshold, 2.0);
        assert_eq!(lowered.state.threshold, 1.0);
    }

    #[test]
    fn test_restored_node_keeps_renderer_metadata() {
        let full = sample_graph();
        let mut view = start(&full, 1.0).unwrap();
        if let Some(c) = view.graph.node_mut(&goal("C")) {
            c.display.pinned = Some(Position { x: 4.0, y: 2.0 });
        }

        let raised = apply_threshold(&full, &view.graph, view.state, 5.0).unwrap();
        assert_eq!(raised.graph.node_count(), 0);
        assert_eq!(raised.state.removed_nodes.len(), 3);

        let lowered = apply_threshold(&full, &raised.graph, raised.state, 0.0).unwrap();
        let c = lowered.graph.node(&goal("C")).unwrap();
        assert_eq!(c.display.pinned, Some(Position { x: 4.0, y: 2.0 }));
    }

    #[test]
    fn test_zero_threshold_drops_isolated_nodes() {
        let records = vec![EventRecord::new("s1", goal("A"), Some(goal("A")), Outcome::Ok)];
        let full = build_graph(&records, &BuildOptions::default().ignore_self_loops(true)).unwrap();
        assert_eq!(full.node_count(), 1);

        let view = start(&full, 0.0).unwrap();
        assert_eq!(view.graph.node_count(), 0);
        assert_eq!(view.state.removed_nodes.len(), 1);
    }

    #[test]
    fn test_invalid_threshold() {
        let full = sample_graph();
        assert!(matches!(start(&full, -1.0), Err(Error::InvalidThreshold(_))));
        assert!(matches!(start(&full, f64::NAN), Err(Error::InvalidThreshold(_))));
    }

    #[test]
    fn test_edge_at_threshold_is_kept() {
        let full = sample_graph();
        let kept = change_link_threshold(full.links(), 1.0);
        assert_eq!(kept.len(), 2);
        let kept = change_link_threshold(full.links(), 1.5);
        assert_eq!(kept.len(), 1);
    }

    #[test]
    fn test_long_chain_prunes_and_restores() {
        let records: Vec<EventRecord> = (0..20_000)
            .map(|i| {
                EventRecord::new(
                    "s1",
                    goal(&format!("g{}", i)),
                    Some(goal(&format!("g{}", i + 1))),
                    Outcome::Correct,
                )
            })
            .collect();
        let full = build_graph(&records, &BuildOptions::default()).unwrap();
        let view = start(&full, 0.0).unwrap();
        assert_eq!(view.graph.node_count(), 20_001);

        let raised = apply_threshold(&full, &view.graph, view.state, 5.0).unwrap();
        assert_eq!(raised.graph.node_count(), 0);
        assert_eq!(raised.state.removed_nodes.len(), 20_001);

        let again = apply_threshold(&full, &raised.graph, raised.state, 6.0).unwrap();
        assert_eq!(again.state.removed_nodes.len(), 20_001);

        let lowered = apply_threshold(&full, &again.graph, again.state, 0.0).unwrap();
        assert_eq!(lowered.graph.node_count(), 20_001);
        assert!(lowered.state.removed_nodes.is_empty());
        assert_eq!(ids(&lowered.graph), ids(&view.graph));
    }

    #[test]
    fn test_percent_conversion() {
        assert_eq!(percent_to_absolute(10.0, 40), 4.0);
        assert_eq!(percent_to_absolute(0.0, 40), 0.0);
    }

    fn records_strategy() -> impl Strategy<Value = Vec<EventRecord>> {
        let state = 0u8..6;
        let next = prop::option::of(0u8..6);
        let outcome = prop::bool::ANY;
        prop::collection::vec((0u8..3, state, next, outcome), 0..60).prop_map(|rows| {
            rows.into_iter()
                .map(|(student, from, to, ok)| {
                    EventRecord::new(
                        format!("s{}", student),
                        NodeId::goal(format!("g{}", from)),
                        to.map(|t| NodeId::goal(format!("g{}", t))),
                        if ok { Outcome::Correct } else { Outcome::Error },
                    )
                })
                .collect()
        })
    }

    fn assert_reconciled(graph: &PathGraph) {
        let endpoints = graph.endpoint_ids();
        assert_eq!(graph.node_ids(), endpoints);
        assert!(graph.is_consistent());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(128))]

        #[test]
        fn node_set_matches_link_endpoints(
            records in records_strategy(),
            thresholds in prop::collection::vec(0u8..8, 1..10),
        ) {
            let full = build_graph(&records, &BuildOptions::default()).unwrap();
            let mut view = start(&full, 0.0).unwrap();
            assert_reconciled(&view.graph);

            for threshold in thresholds {
                view = apply_threshold(&full, &view.graph, view.state, threshold as f64).unwrap();
                assert_reconciled(&view.graph);
                for link in view.graph.links() {
                    prop_assert!(link.num_of_transitions as f64 >= threshold as f64 || threshold == 0);
                }
            }
        }

        #[test]
        fn link_counts_and_widths_follow_records(records in records_strategy()) {
            let full = build_graph(&records, &BuildOptions::default()).unwrap();

            for link in full.links() {
                let observed = records
                    .iter()
                    .filter(|r| r.state == link.source && r.next_state.as_ref() == Some(&link.target))
                    .count() as u64;
                prop_assert_eq!(observed, link.num_of_transitions);
                prop_assert!(link.width >= 1.0 && link.width <= 11.0);
            }

            let mut links: Vec<&Link> = full.links().collect();
            links.sort_by_key(|l| l.num_of_transitions);
            for pair in links.windows(2) {
                prop_assert!(pair[0].width <= pair[1].width);
            }

            let pairs: HashSet<(&NodeId, &NodeId)> = records
                .iter()
                .filter_map(|r| r.next_state.as_ref().map(|next| (&r.state, next)))
                .collect();
            prop_assert_eq!(pairs.len(), full.link_count());
        }

        #[test]
        fn raising_then_lowering_round_trips(
            records in records_strategy(),
            base in 0u8..4,
            raise in 1u8..6,
        ) {
            let full = build_graph(&records, &BuildOptions::default()).unwrap();
            let original = start(&full, base as f64).unwrap();

            let raised = apply_threshold(
                &full,
                &original.graph,
                original.state.clone(),
                (base + raise) as f64,
            )
            .unwrap();
            let back = apply_threshold(&full, &raised.graph, raised.state, base as f64).unwrap();

            prop_assert_eq!(back.graph.to_data(), original.graph.to_data());
        }
    }
}

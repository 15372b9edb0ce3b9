//! Graph construction from canonical event records

use super::counter::{OutcomeTally, TransitionCounts};
use super::graph::{Link, LinkColor, Node, PathGraph};
use super::record::{self, EventRecord, NodeId, TransitionKey};
use crate::source::models::RawRecord;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// How a link's color is chosen when its transition was observed with mixed outcomes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ColorPolicy {
    /// Outcome of the record that first produced the link
    #[default]
    FirstObserved,
    /// Most frequent outcome class; ties keep the first observed one
    Majority,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildOptions {
    /// Drop transitions from a state to itself
    pub ignore_self_loops: bool,
    pub color_policy: ColorPolicy,
}

impl BuildOptions {
    pub fn ignore_self_loops(mut self, ignore: bool) -> Self {
        self.ignore_self_loops = ignore;
        self
    }

    pub fn color_policy(mut self, policy: ColorPolicy) -> Self {
        self.color_policy = policy;
        self
    }
}

/// Normalize raw records and build their graph.
pub fn build_from_raw(records: &[RawRecord], options: &BuildOptions) -> Result<PathGraph> {
    let events = record::normalize(records)?;
    build_graph(&events, options)
}

/// Build a path graph from canonical records.
///
/// Counting happens first so each link is created once with its final count and
/// width. Nodes are created on first sight and never replaced.
pub fn build_graph(records: &[EventRecord], options: &BuildOptions) -> Result<PathGraph> {
    if records.is_empty() {
        return Ok(PathGraph::default());
    }

    let counts = TransitionCounts::count(records);
    let max_count = counts.max_count();
    let mut graph = PathGraph::new(max_count);

    for record in records {
        if !graph.contains_node(&record.state) {
            let tally = counts
                .state_tally(&record.state)
                .ok_or_else(|| Error::MissingState(record.state.to_string()))?;
            graph.add_node(
                Node::new(record.state.clone(), record.problem.clone())
                    .with_rank(tally.average_rank())
                    .with_times_errored(tally.times_errored),
            );
        }

        let Some(next) = &record.next_state else {
            continue;
        };
        if options.ignore_self_loops && *next == record.state {
            continue;
        }

        if !graph.contains_node(next) {
            graph.add_node(target_node(next, record, &counts));
        }
        if graph.contains_link(&record.state, next) {
            continue;
        }

        let key = TransitionKey::between(&record.state, next);
        let count = counts.transition_count(&key);
        if count == 0 {
            return Err(Error::inconsistent(format!(
                "transition {} -> {} was never counted",
                record.state, next
            )));
        }

        let observed = LinkColor::from_outcome(record.outcome);
        let color = match options.color_policy {
            ColorPolicy::FirstObserved => observed,
            ColorPolicy::Majority => counts
                .outcome_tally(&key)
                .and_then(OutcomeTally::majority)
                .unwrap_or(observed),
        };

        graph.add_link(Link::new(record.state.clone(), next.clone(), count, max_count).with_color(color))?;
    }

    graph.recompute_degrees();

    tracing::debug!(
        "Built graph with {} nodes and {} links from {} records",
        graph.node_count(),
        graph.link_count(),
        records.len()
    );
    Ok(graph)
}

/// Node for a state first seen as a transition target.
///
/// Such a state may never appear as a source, so missing aggregates mean zero.
fn target_node(id: &NodeId, record: &EventRecord, counts: &TransitionCounts) -> Node {
    let (rank, times_errored) = counts
        .state_tally(id)
        .map(|t| (t.average_rank(), t.times_errored))
        .unwrap_or((0.0, 0));
    Node::new(id.clone(), record.problem.clone())
        .with_rank(rank)
        .with_times_errored(times_errored)
}

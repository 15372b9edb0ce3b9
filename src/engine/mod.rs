//! Path graph engine - aggregate event records into a weighted state graph

use crate::{Result, source::models::RawRecord};

pub mod builder;
pub mod counter;
pub mod filter;
pub mod graph;
pub mod mutation;
pub mod record;

// Re-export key types
pub use builder::{BuildOptions, ColorPolicy, build_graph};
pub use counter::{StateTally, TransitionCounts};
pub use filter::{FilterState, FilteredGraph, apply_threshold};
pub use graph::{GraphData, GraphStats, Link, LinkColor, Node, PathGraph};
pub use mutation::NodeMarkers;
pub use record::{AttemptDetail, EventRecord, NodeId, Outcome};

/// Build a path graph from raw records of either supported shape
pub fn build_path_graph(records: &[RawRecord], options: &BuildOptions) -> Result<PathGraph> {
    builder::build_from_raw(records, options)
}

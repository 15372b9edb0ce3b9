//! Output formatting module
//!
//! This module handles formatting path graphs and their statistics for the
//! supported output formats.

use crate::Result;
use crate::engine::{GraphStats, NodeId, PathGraph};

/// Output the graph as a JSON nodes/links document
pub fn output_json(w: &mut impl std::io::Write, graph: &PathGraph) -> Result<()> {
    serde_json::to_writer_pretty(&mut *w, &graph.to_data())?;
    writeln!(w)?; // Add trailing newline
    Ok(())
}

/// Output the graph in Graphviz DOT format
pub fn output_dot(w: &mut impl std::io::Write, graph: &PathGraph) -> Result<()> {
    w.write_all(graph.to_dot().as_bytes())?;
    Ok(())
}

/// Output the graph as text tables
pub fn output_table(w: &mut impl std::io::Write, graph: &PathGraph) -> Result<()> {
    writeln!(w, "Student Path Graph")?;
    writeln!(w, "{}", "=".repeat(96))?;
    writeln!(w)?;

    write_stats(w, &graph.stats())?;

    if graph.node_count() > 0 {
        writeln!(w, "Nodes:")?;
        writeln!(w, "{:-<96}", "")?;
        writeln!(
            w,
            "{:<40} {:>6} {:>6} {:>5} {:>5} {:>8} {:>8} {:>6}",
            "State", "Rank", "Errors", "In", "Out", "CumIn", "CumOut", "Loops"
        )?;
        writeln!(w, "{:-<96}", "")?;

        for node in graph.nodes() {
            writeln!(
                w,
                "{:<40} {:>6.2} {:>6} {:>5} {:>5} {:>8} {:>8} {:>6}",
                shorten(&node.label, 40),
                node.rank,
                node.times_errored,
                node.edges_in,
                node.edges_out,
                node.cumulative_edges_in,
                node.cumulative_edges_out,
                node.self_loops
            )?;
        }
        writeln!(w)?;
    }

    if graph.link_count() > 0 {
        writeln!(w, "Links:")?;
        writeln!(w, "{:-<96}", "")?;
        writeln!(
            w,
            "{:<34} {:<34} {:>8} {:>7} {:>6}",
            "From", "To", "Count", "Width", "Color"
        )?;
        writeln!(w, "{:-<96}", "")?;

        for link in graph.links() {
            writeln!(
                w,
                "{:<34} {:<34} {:>8} {:>7.2} {:>6}",
                shorten(&label_of(graph, &link.source), 34),
                shorten(&label_of(graph, &link.target), 34),
                link.num_of_transitions,
                link.width,
                link.color.as_str()
            )?;
        }
        writeln!(w)?;
    }

    Ok(())
}

/// Output graph statistics as JSON
pub fn output_stats_json(w: &mut impl std::io::Write, stats: &GraphStats) -> Result<()> {
    serde_json::to_writer_pretty(&mut *w, stats)?;
    writeln!(w)?;
    Ok(())
}

/// Output graph statistics as text
pub fn output_stats_table(w: &mut impl std::io::Write, stats: &GraphStats) -> Result<()> {
    write_stats(w, stats)
}

fn write_stats(w: &mut impl std::io::Write, stats: &GraphStats) -> Result<()> {
    writeln!(w, "Summary:")?;
    writeln!(w, "  Nodes:                {}", stats.total_nodes)?;
    writeln!(w, "  Links:                {}", stats.total_links)?;
    writeln!(w, "  Self-loops:           {}", stats.self_loops)?;
    writeln!(w, "  Error links:          {}", stats.error_links)?;
    writeln!(w, "  Initial nodes:        {}", stats.initial_nodes)?;
    writeln!(w, "  Terminal nodes:       {}", stats.terminal_nodes)?;
    writeln!(w, "  Transitions:          {}", stats.total_transitions)?;
    writeln!(w, "  Max transition count: {}", stats.max_transition_count)?;
    writeln!(w)?;
    Ok(())
}

fn label_of(graph: &PathGraph, id: &NodeId) -> String {
    graph
        .node(id)
        .map(|n| n.label.clone())
        .unwrap_or_else(|| id.to_string())
}

fn shorten(s: &str, width: usize) -> String {
    if s.chars().count() > width {
        let head: String = s.chars().take(width - 3).collect();
        format!("{}...", head)
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{BuildOptions, EventRecord, Outcome, build_graph};

    fn sample_graph() -> PathGraph {
        let records = vec![
            EventRecord::new("s1", NodeId::goal("A"), Some(NodeId::goal("B")), Outcome::Correct),
            EventRecord::new("s1", NodeId::goal("B"), Some(NodeId::goal("C")), Outcome::Error),
        ];
        build_graph(&records, &BuildOptions::default()).unwrap()
    }

    #[test]
    fn test_output_json() {
        let mut output = Vec::new();
        output_json(&mut output, &sample_graph()).unwrap();

        let value: serde_json::Value = serde_json::from_slice(&output).unwrap();
        assert_eq!(value["nodes"].as_array().unwrap().len(), 3);
        assert_eq!(value["links"].as_array().unwrap().len(), 2);
        assert_eq!(value["max_transition_count"], 1);
    }

    #[test]
    fn test_output_table() {
        let mut output = Vec::new();
        output_table(&mut output, &sample_graph()).unwrap();

        let text = String::from_utf8(output).unwrap();
        assert!(text.contains("Nodes:                3"));
        assert!(text.contains("red"));
    }

    #[test]
    fn test_output_dot() {
        let mut output = Vec::new();
        output_dot(&mut output, &sample_graph()).unwrap();
        assert!(String::from_utf8(output).unwrap().starts_with("digraph PathGraph"));
    }

    #[test]
    fn test_shorten() {
        assert_eq!(shorten("abcdef", 10), "abcdef");
        assert_eq!(shorten("abcdefghijkl", 8), "abcde...");
    }
}

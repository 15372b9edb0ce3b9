//! CLI command implementations
//!
//! This module contains the implementation for each CLI command.

use crate::cli::InputArgs;
use crate::config::delimiter_byte;
use crate::engine::{self, PathGraph};
use crate::{Config, Result, cli::Cli, source};

/// Load records and build the full graph, with command-line flags taking
/// precedence over config values
fn load_graph(input: &InputArgs, config: &Config) -> Result<PathGraph> {
    let mut load = config.load_options()?;
    if let Some(shape) = input.shape {
        load.shape = shape;
    }
    if let Some(format) = input.format {
        load.format = format;
    }
    if let Some(delimiter) = input.delimiter {
        load.delimiter = Some(delimiter_byte(delimiter)?);
    }

    let mut options = config.build_options();
    if input.ignore_self_loops {
        options.ignore_self_loops = true;
    }
    if let Some(policy) = input.color_policy {
        options.color_policy = policy;
    }

    tracing::debug!("Load options: {:?}, build options: {:?}", load, options);
    let records = source::load_records(&input.input, load)?;
    let graph = engine::build_path_graph(&records, &options)?;

    tracing::info!(
        "Built graph with {} nodes and {} links (max transition count {})",
        graph.node_count(),
        graph.link_count(),
        graph.max_transition_count
    );
    Ok(graph)
}

/// Build command implementation
pub mod build {
    use super::*;
    use crate::cli::{Commands, OutputFormat, output};
    use crate::engine::{filter, mutation};

    /// Execute the build command
    pub fn execute(args: Cli, config: Config) -> Result<()> {
        let (input, threshold, threshold_percent, hide_errors, hide_solver, output_format) =
            match args.command {
                Commands::Build {
                    input,
                    threshold,
                    threshold_percent,
                    hide_errors,
                    hide_solver,
                    output,
                } => (
                    input,
                    threshold,
                    threshold_percent,
                    hide_errors,
                    hide_solver,
                    output,
                ),
                _ => unreachable!("build::execute called with wrong command"),
            };

        let percent = threshold_percent.or(config.graph.threshold_percent);
        if let Some(p) = percent {
            crate::ensure!(
                (0.0..=100.0).contains(&p),
                "Threshold percent must be between 0 and 100, got {}",
                p
            );
        }

        let full = load_graph(&input, &config)?;

        let threshold = threshold.or_else(|| {
            percent.map(|p| filter::percent_to_absolute(p, full.max_transition_count))
        });

        let mut view = match threshold {
            Some(threshold) => {
                tracing::info!("Applying threshold {}", threshold);
                filter::start(&full, threshold)?.graph
            }
            None => full.clone(),
        };

        if hide_errors {
            let links: Vec<_> = view.links().cloned().collect();
            let split = mutation::remove_error_links_and_store(&links);
            tracing::info!("Hiding {} error links", split.error_links.len());
            let nodes = filter::remove_unused_nodes(view.nodes().cloned().collect(), &split.without_errors);
            view = PathGraph::from_parts(nodes.new_nodes, split.without_errors, view.max_transition_count)?;
        }

        if hide_solver {
            let split = mutation::remove_solver_nodes(view.nodes().cloned().collect(), &config.markers);
            tracing::info!("Hiding {} solver nodes", split.solver_nodes.len());
            view = mutation::reconcile(
                split.without_solver,
                view.links().cloned().collect(),
                view.max_transition_count,
            )?;
        }

        let stdout = std::io::stdout();
        let mut w = stdout.lock();
        match output_format {
            OutputFormat::Json => output::output_json(&mut w, &view),
            OutputFormat::Dot => output::output_dot(&mut w, &view),
            OutputFormat::Table => output::output_table(&mut w, &view),
        }
    }
}

/// Stats command implementation
pub mod stats {
    use super::*;
    use crate::cli::{Commands, StatsFormat, output};

    /// Execute the stats command
    pub fn execute(args: Cli, config: Config) -> Result<()> {
        let (input, output_format) = match args.command {
            Commands::Stats { input, output } => (input, output),
            _ => unreachable!("stats::execute called with wrong command"),
        };

        let graph = load_graph(&input, &config)?;
        let stats = graph.stats();

        let stdout = std::io::stdout();
        let mut w = stdout.lock();
        match output_format {
            StatsFormat::Json => output::output_stats_json(&mut w, &stats),
            StatsFormat::Table => output::output_stats_table(&mut w, &stats),
        }
    }
}

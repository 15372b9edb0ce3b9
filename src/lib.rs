//! Student Path Graph Builder
//!
//! Aggregates intelligent-tutoring-system interaction logs into a weighted,
//! directed graph of the states students pass through.
//!
//! This library provides functionality for:
//! - Loading tutoring logs and path-analysis exports (TSV, CSV, JSON)
//! - Normalizing both record shapes into per-student event streams
//! - Counting transitions and building the full path graph
//! - Threshold filtering with incremental node restoration
//! - Hiding error links and solver-only states

pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod source;

pub use config::Config;
pub use error::{Error, Result};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Initialize logging with the given log level
///
/// Logs go to stderr so graph output on stdout stays machine-readable.
pub fn init_logging(level: &str) {
    use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

//! CLI commands implementation.
//!
//! This module contains the CLI parser and dispatches to command-specific modules.

mod admin;
mod fetch;
mod index;
mod queue;
mod status;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::{load_settings_with_options, LoadOptions};
use crate::models::ContentCategory;

#[derive(Parser)]
#[command(name = "listing-history")]
#[command(about = "Recover listing price histories from web-archive snapshots")]
#[command(version)]
pub struct Cli {
    /// Config file path (overrides auto-discovery)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Data directory holding the database and index pages
    #[arg(long, global = true)]
    data: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

/// Listing kind accepted by `fetch --type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum CategoryArg {
    Sale,
    Rental,
    Aggregate,
}

impl From<CategoryArg> for ContentCategory {
    fn from(arg: CategoryArg) -> Self {
        match arg {
            CategoryArg::Sale => ContentCategory::UnitSale,
            CategoryArg::Rental => ContentCategory::UnitRental,
            CategoryArg::Aggregate => ContentCategory::Aggregate,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Download snapshot index pages for every configured URL pattern
    Index {
        /// Index pages fetched at once
        #[arg(long)]
        concurrency: Option<usize>,
    },

    /// Build the work queue from downloaded index pages
    Queue,

    /// Fetch pending snapshots and extract their price history
    Fetch {
        /// Number of fetch workers
        #[arg(long)]
        concurrency: Option<usize>,
        /// Requests per second across all workers
        #[arg(long)]
        rate: Option<f64>,
        /// Process at most this many items (0 = all)
        #[arg(long, default_value = "0")]
        limit: usize,
        /// Only fetch one kind of page
        #[arg(long = "type", value_enum)]
        kind: Option<CategoryArg>,
    },

    /// Show queue, extraction and index statistics
    Status {
        /// Print machine-readable JSON
        #[arg(long)]
        json: bool,
    },

    /// Return failed items to the queue
    Retry {
        /// Only items with fewer attempts than this are retried
        #[arg(long)]
        max_attempts: Option<u32>,
    },

    /// Write price events joined with listing metadata to a CSV file
    Export {
        /// Output file path
        #[arg(short, long)]
        output: PathBuf,
    },
}

/// Run the CLI.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let options = LoadOptions {
        config_path: cli.config,
        data: cli.data,
    };
    let (settings, _config) = load_settings_with_options(options).await;

    match cli.command {
        Commands::Index { concurrency } => index::cmd_index(&settings, concurrency).await,
        Commands::Queue => queue::cmd_queue(&settings).await,
        Commands::Fetch {
            concurrency,
            rate,
            limit,
            kind,
        } => {
            let limit = if limit > 0 { Some(limit) } else { None };
            fetch::cmd_fetch(&settings, concurrency, rate, limit, kind.map(Into::into)).await
        }
        Commands::Status { json } => status::cmd_status(&settings, json).await,
        Commands::Retry { max_attempts } => admin::cmd_retry(&settings, max_attempts).await,
        Commands::Export { output } => admin::cmd_export(&settings, &output).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_fetch_flags() {
        let cli = Cli::try_parse_from([
            "listing-history",
            "--data",
            "/tmp/lh",
            "fetch",
            "--concurrency",
            "4",
            "--rate",
            "2.5",
            "--limit",
            "10",
            "--type",
            "rental",
        ])
        .unwrap();
        assert_eq!(cli.data, Some(PathBuf::from("/tmp/lh")));
        match cli.command {
            Commands::Fetch {
                concurrency,
                rate,
                limit,
                kind,
            } => {
                assert_eq!(concurrency, Some(4));
                assert_eq!(rate, Some(2.5));
                assert_eq!(limit, 10);
                assert_eq!(kind.map(ContentCategory::from), Some(ContentCategory::UnitRental));
            }
            _ => panic!("expected fetch"),
        }
    }

    #[test]
    fn test_export_requires_output() {
        assert!(Cli::try_parse_from(["listing-history", "export"]).is_err());
        assert!(Cli::try_parse_from(["listing-history", "-v", "export", "--output", "x.csv"]).is_ok());
    }
}

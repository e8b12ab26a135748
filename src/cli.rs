//! CLI definitions for FormScout.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// FormScout CLI.
#[derive(Parser)]
#[command(name = "formscout")]
#[command(about = "Browser-automation crawler that learns how web forms and surveys behave")]
#[command(version)]
pub(crate) struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config/default.toml", global = true)]
    pub config: PathBuf,

    /// Connect to a running Chrome (ws:// or http:// debugger endpoint) instead of launching one
    #[arg(long, env = "FORMSCOUT_CHROME", global = true)]
    pub connect: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Analyze a list of sites and write the run report
    Crawl {
        /// File with one URL per line (`#` starts a comment)
        sites: PathBuf,

        /// Analysis strategy (comprehensive, form_focused, pattern_detection, quick)
        #[arg(long)]
        strategy: Option<String>,

        /// Override scheduler concurrency
        #[arg(long)]
        concurrency: Option<usize>,

        /// Override batch size
        #[arg(long)]
        batch_size: Option<usize>,

        /// Tune settings from past runs
        #[arg(long)]
        adaptive: bool,

        /// Report output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Rebuild the knowledge graph and print a summary
    Graph {
        /// Relationship threshold override
        #[arg(long)]
        threshold: Option<f32>,
    },

    /// Recommend records for a situation
    Recommend {
        /// Free-text description of the situation
        query: String,

        /// Only records for this platform
        #[arg(long)]
        platform: Option<String>,

        /// Only records of this kind
        #[arg(long)]
        kind: Option<String>,

        #[arg(long, default_value_t = 10)]
        limit: usize,
    },

    /// Find records similar to a text
    Similar {
        query: String,

        /// Only records of this kind
        #[arg(long)]
        kind: Option<String>,

        #[arg(long, default_value_t = 10)]
        limit: usize,
    },

    /// Find records whose fields contain the given substrings
    Match {
        /// Field patterns as `field=value`
        #[arg(required = true)]
        patterns: Vec<String>,

        /// Only records of this kind
        #[arg(long)]
        kind: Option<String>,
    },

    /// Analyze one page, fill its main form and record the outcome
    Fill {
        url: String,

        /// Plan only, do not touch the page
        #[arg(long)]
        dry_run: bool,

        /// Do not submit the form
        #[arg(long)]
        no_submit: bool,
    },

    /// Show knowledge store statistics
    Stats {
        /// Output format (table, json)
        #[arg(long, default_value = "table")]
        format: String,
    },
}

//! CLI interface using clap
//!
//! Provides the command-line interface for docmaint

mod commands;

pub use commands::*;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// docmaint - Generate and review API docs for Python modules
#[derive(Parser, Debug)]
#[command(name = "docmaint")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the config file
    #[arg(short, long, global = true, default_value = crate::repo::CONFIG_FILE)]
    pub config: PathBuf,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json)
    #[arg(short = 'o', long, global = true, default_value = "text")]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Extract functions from the repository and build the search index
    Ingest(IngestArgs),

    /// Document one module: search, draft, judge and write Markdown
    Run(RunArgs),

    /// Query the search index
    Search(SearchArgs),

    /// Show or create the configuration file
    Config(ConfigArgs),
}

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Arguments for ingest command
#[derive(Parser, Debug)]
pub struct IngestArgs {
    /// Repository to ingest (overrides `paths.repo_dir`)
    #[arg(short, long)]
    pub repo: Option<PathBuf>,
}

/// Arguments for run command
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Module path relative to the repository root, e.g. `pkg/mod.py`
    pub module_path: String,

    /// Search query (defaults to one derived from the module path)
    #[arg(short, long)]
    pub query: Option<String>,
}

/// Arguments for search command
#[derive(Parser, Debug)]
pub struct SearchArgs {
    /// Free-text query
    pub query: String,

    /// Number of results (overrides `search.top_k`)
    #[arg(short = 'k', long)]
    pub top_k: Option<usize>,
}

/// Arguments for config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Show current configuration
    #[arg(long)]
    pub show: bool,

    /// Write a default config file
    #[arg(long)]
    pub init: bool,

    /// Overwrite an existing file with --init
    #[arg(long)]
    pub force: bool,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

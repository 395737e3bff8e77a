//! CLI module - Command-line interface definitions and handlers
//!
//! Uses clap v4 with derive macros for argument parsing.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use output::OutputFormat;

pub mod commands;
pub mod output;

/// hybrank - hybrid dense + lexical retrieval over a corpus snapshot
#[derive(Parser, Debug)]
#[command(name = "hybrank")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output format (human, json, tsv)
    #[arg(long, short = 'O', global = true, value_enum, default_value_t = OutputFormat::Human)]
    pub output_format: OutputFormat,

    /// Emit JSON log lines on stderr
    #[arg(long, global = true)]
    pub json: bool,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all logging
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Config file path (default: ~/.config/hybrank/config.toml)
    #[arg(long, global = true, env = "HYBRANK_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a query against a corpus snapshot
    Search(commands::search::SearchArgs),

    /// Score retrieval quality against a labelled query set
    Eval(commands::eval::EvalArgs),

    /// Show the effective configuration
    Config(commands::config::ConfigArgs),
}

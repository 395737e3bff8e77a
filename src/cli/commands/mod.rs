//! CLI command implementations
//!
//! Each subcommand has its own module with:
//! - Args struct for command-line arguments
//! - `run()` function to execute the command

use crate::cli::{Cli, Commands};
use crate::config::Config;
use crate::error::Result;

pub mod config;
pub mod eval;
pub mod search;

/// Load the effective configuration and dispatch to the subcommand.
pub fn run(cli: &Cli) -> Result<()> {
    let config = Config::load(cli.config.as_deref())?;
    match &cli.command {
        Commands::Search(args) => search::run(cli, config, args),
        Commands::Eval(args) => eval::run(cli, config, args),
        Commands::Config(args) => config::run(cli, &config, args),
    }
}

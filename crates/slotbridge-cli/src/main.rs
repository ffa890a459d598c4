//! slotbridge command-line runner
//!
//! Runs the built-in bridge scenarios against the demo native classes and
//! prints what they observed.

mod commands;
mod config;
mod logger;
mod scenarios;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "slotbridge")]
#[command(about = "Native object bridge scenario runner", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one scenario, or all of them
    Run {
        /// Scenario name (see `slotbridge list`)
        #[arg(short, long)]
        scenario: Option<String>,
        /// TOML file with bridge options
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Log bridge activity to stderr
        #[arg(short, long)]
        verbose: bool,
    },

    /// List the built-in scenarios
    List,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            scenario,
            config,
            verbose,
        } => commands::run::execute(commands::run::RunArgs {
            scenario,
            config,
            verbose,
        }),
        Commands::List => commands::list::execute(),
    }
}

//! CLI argument parsing for le

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "le")]
#[command(author, version, about = "Watch-based leader election over a coordination service", long_about = None)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run an in-memory election group and kill its leaders
    Simulate {
        /// Number of participants
        #[arg(short = 'n', long, default_value = "3")]
        participants: usize,

        /// How many times to expire the current leader's session
        #[arg(short, long, default_value = "1")]
        failovers: usize,

        /// Print per-participant metrics as YAML at the end
        #[arg(short, long)]
        metrics: bool,
    },

    /// Show the effective configuration
    Config {
        /// Write the configuration to this file instead of printing it
        #[arg(short, long)]
        write: Option<PathBuf>,
    },
}

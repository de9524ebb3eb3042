//! le - leader election CLI
//!
//! Runs election groups against the in-memory coordination service.

use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use tracing::{debug, info};

use leaderelect::cli::{Cli, Command};
use leaderelect::config::ElectionConfig;
use leaderelect::simulation::simulate;

fn parse_level(level: Option<&str>) -> tracing::Level {
    match level.map(str::to_uppercase).as_deref() {
        Some("TRACE") => tracing::Level::TRACE,
        Some("DEBUG") => tracing::Level::DEBUG,
        Some("INFO") | None => tracing::Level::INFO,
        Some("WARN") | Some("WARNING") => tracing::Level::WARN,
        Some("ERROR") => tracing::Level::ERROR,
        Some(other) => {
            eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", other);
            tracing::Level::INFO
        }
    }
}

fn setup_logging(level: Option<&str>) -> Result<()> {
    let level = parse_level(level);

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .try_init()
        .map_err(|e| eyre::eyre!("{}", e))?;

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.log_level.as_deref()).context("Failed to setup logging")?;

    let config = ElectionConfig::load(cli.config.as_ref()).context("Failed to load configuration")?;
    debug!(?config, "main: loaded config");

    match cli.command {
        Command::Simulate {
            participants,
            failovers,
            metrics,
        } => cmd_simulate(&config, participants, failovers, metrics).await,
        Command::Config { write } => cmd_config(&config, write.as_ref()),
    }
}

async fn cmd_simulate(config: &ElectionConfig, participants: usize, failovers: usize, metrics: bool) -> Result<()> {
    debug!(participants, failovers, "cmd_simulate: called");
    let report = simulate(config, participants, failovers).await?;

    for (idx, round) in report.rounds.iter().enumerate() {
        let title = if idx == 0 {
            "Initial election".to_string()
        } else {
            format!("After failover {}", idx)
        };
        println!("{}", title.bold());
        println!("  {} {}", "leader".green(), round.leader.cyan());
        for (marker, predecessor) in &round.followers {
            println!("  {} {} {} {}", "follower".yellow(), marker, "watching".dimmed(), predecessor);
        }
    }

    if metrics {
        for (marker, m) in &report.metrics {
            println!("{}", marker.cyan());
            print!("{}", serde_yaml::to_string(m)?);
        }
    }

    Ok(())
}

fn cmd_config(config: &ElectionConfig, write: Option<&std::path::PathBuf>) -> Result<()> {
    debug!(?write, "cmd_config: called");
    match write {
        Some(path) => {
            config
                .save(path)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("{} Wrote config to {}", "✓".green(), path.display());
        }
        None => print!("{}", serde_yaml::to_string(config)?),
    }
    Ok(())
}

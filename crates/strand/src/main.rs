//! Strand - session churn simulator.
//!
//! Stands in for the transport layer: drives a session manager with
//! synthetic connects, disconnects and resume attempts, then reports how
//! the detached pool behaved.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use strand_session::{EvictionPolicy, ManagerConfig};

mod sim;

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// Strand - simulate session churn against the detached-session manager
#[derive(Parser, Debug)]
#[command(name = "strand")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Output as JSON (for scripting)
    #[arg(long)]
    pub json: bool,

    /// TOML file with manager settings (flags override it)
    #[arg(long, env = "STRAND_CONFIG")]
    pub config: Option<PathBuf>,

    /// Number of simulated clients
    #[arg(long, default_value_t = 50)]
    pub clients: usize,

    /// Number of simulation rounds
    #[arg(long, default_value_t = 100)]
    pub rounds: usize,

    /// Detached pool capacity
    #[arg(long)]
    pub capacity: Option<usize>,

    /// Eviction policy: lru, oldest or random
    #[arg(long)]
    pub policy: Option<EvictionPolicy>,

    /// Detached TTL in milliseconds
    #[arg(long)]
    pub ttl_ms: Option<u64>,

    /// Cleanup interval in milliseconds
    #[arg(long)]
    pub interval_ms: Option<u64>,

    /// Simulated time between rounds in milliseconds
    #[arg(long, default_value_t = 5)]
    pub tick_ms: u64,

    /// Probability that a disconnected client tries to resume
    #[arg(long, default_value_t = 0.7)]
    pub resume_rate: f64,

    /// RNG seed for reproducible runs
    #[arg(long)]
    pub seed: Option<u64>,
}

impl Cli {
    /// Build the manager configuration from the settings file and flags.
    fn manager_config(&self) -> Result<ManagerConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                ManagerConfig::from_toml_str(&text)
                    .with_context(|| format!("Invalid settings in {}", path.display()))?
            }
            None => ManagerConfig::default(),
        };

        if let Some(capacity) = self.capacity {
            config = config.with_max_detached_sessions(capacity);
        }
        if let Some(policy) = self.policy {
            config = config.with_eviction_policy(policy);
        }
        if let Some(ms) = self.ttl_ms {
            config = config.with_detached_ttl(std::time::Duration::from_millis(ms));
        }
        if let Some(ms) = self.interval_ms {
            config = config.with_cleanup_interval(std::time::Duration::from_millis(ms));
        }

        config.validate()?;
        Ok(config)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "strand=debug,strand_session=debug,warn"
    } else {
        "strand=info,strand_session=info,warn"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));

    use tracing_subscriber::prelude::*;
    if cli.json {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_filter(filter),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_writer(std::io::stderr)
                    .with_filter(filter),
            )
            .init();
    }

    if !(0.0..=1.0).contains(&cli.resume_rate) {
        anyhow::bail!("--resume-rate must be between 0 and 1");
    }

    let config = cli.manager_config()?;
    let params = sim::SimParams {
        clients: cli.clients,
        rounds: cli.rounds,
        tick: std::time::Duration::from_millis(cli.tick_ms),
        resume_rate: cli.resume_rate,
        seed: cli.seed,
    };

    let report = sim::run(config, params).await?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        report.print();
    }

    Ok(())
}

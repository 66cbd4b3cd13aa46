//! wait-for-nodes: launch demo participants and check they all become discoverable.
//!
//! Mirrors a multi-process launch test: start N participants, wait (bounded)
//! until every expected name is visible, report what was missing.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use wait_cli::{CheckMode, LaunchConfig, ParticipantSpec, launch, run_check};
use wait_core::{LocalGraph, WaitError};

#[derive(Parser, Debug)]
#[command(name = "wait-for-nodes")]
#[command(about = "Wait until a set of participants is discoverable")]
struct Args {
    /// JSON config file (defaults to the built-in three-node demo)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Participant name that must become visible (repeatable; replaces the config list)
    #[arg(short, long = "expect")]
    expect: Vec<String>,

    /// Participant to launch, as NAME or NAME@DELAY_MS (repeatable; replaces the config list)
    #[arg(short, long = "spawn")]
    spawn: Vec<ParticipantSpec>,

    /// Timeout in seconds
    #[arg(short, long)]
    timeout: Option<f64>,

    /// Poll interval in seconds
    #[arg(long)]
    poll_interval: Option<f64>,

    /// Session API used for the check
    #[arg(long, value_enum, default_value_t = CheckMode::Plain)]
    mode: CheckMode,

    /// Enable verbose logging
    #[arg(long)]
    verbose: bool,
}

impl Args {
    /// Config file (or demo), then NODE_WAIT_* environment, then command line.
    fn resolve(&self) -> Result<LaunchConfig> {
        let mut config = LaunchConfig::load_or_default(self.config.as_deref())?;
        config.wait = config
            .wait
            .apply_env()
            .context("Invalid NODE_WAIT_* environment override")?;

        if let Some(timeout) = self.timeout {
            config.wait.timeout_secs = timeout;
        }
        if let Some(interval) = self.poll_interval {
            config.wait.poll_interval_secs = interval;
        }
        if !self.expect.is_empty() {
            config.expected = self.expect.clone();
        }
        if !self.spawn.is_empty() {
            config.participants = self.spawn.clone();
        }
        config.wait.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Respects RUST_LOG, defaults to info (or debug with --verbose)
    let default_filter = if args.verbose {
        "debug,wait_core=debug,wait_cli=debug"
    } else {
        "info,wait_core=info,wait_cli=info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = args.resolve()?;
    info!(
        "Launching {} participant(s), expecting {:?}",
        config.participants.len(),
        config.expected
    );

    let graph = LocalGraph::new();
    let launched = launch(&graph, &config.participants);

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, cancelling wait");
                cancel.cancel();
            }
        }
    });

    let result = run_check(&graph, &config.expected, &config.wait, args.mode, &cancel).await;
    launched.stop().await;

    match result {
        Ok(report) if report.success => {
            info!("All nodes were found: {:?}", report.found);
            Ok(())
        }
        Ok(report) => {
            error!("Did not find all nodes, missing: {:?}", report.missing);
            info!("Found: {:?}", report.found);
            std::process::exit(1);
        }
        Err(e) => {
            if let Some(wait_error @ WaitError::Timeout { .. }) = e.downcast_ref::<WaitError>() {
                error!("{}", wait_error);
                std::process::exit(1);
            }
            Err(e)
        }
    }
}

// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! CCNMP Home Agent
//!
//! Answers mobility commands and relays interests for mobile namespaces.
//!
//! # Usage
//!
//! ```bash
//! # Listen on everything routed to this host
//! ccnmp-home-agent --forwarder 127.0.0.1:9695
//!
//! # Only some prefixes, with parallel redirect flushes
//! ccnmp-home-agent --prefix /home/alice --prefix /home/bob --parallel-flush
//!
//! # Using configuration file
//! ccnmp-home-agent --config agent.json
//! ```

use anyhow::{Context, Result};
use ccnmp::agent::RelayStatsSnapshot;
use ccnmp::{FlushMode, HomeAgent, HomeAgentConfig, TcpFace};
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// CCNMP Home Agent
#[derive(Parser, Debug)]
#[command(name = "ccnmp-home-agent")]
#[command(about = "CCNMP home agent - buffers and relays interests for mobile namespaces")]
#[command(version)]
struct Args {
    /// Configuration file (JSON format)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Local forwarder address
    #[arg(short, long)]
    forwarder: Option<SocketAddr>,

    /// Prefix to listen on (can repeat)
    #[arg(short, long)]
    prefix: Vec<String>,

    /// Maximum concurrent relays
    #[arg(short, long)]
    workers: Option<usize>,

    /// Flush buffered interests in parallel on redirect
    #[arg(long)]
    parallel_flush: bool,

    /// Statistics reporting interval (seconds, 0 to disable)
    #[arg(long, default_value = "0")]
    stats_interval: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate example configuration file
    GenConfig {
        /// Output file path
        #[arg(short, long, default_value = "agent.json")]
        output: PathBuf,
    },

    /// Validate a configuration file
    Validate {
        /// Configuration file path
        #[arg(short, long)]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    if let Some(cmd) = &args.command {
        return match cmd {
            Commands::GenConfig { output } => cmd_gen_config(output),
            Commands::Validate { config } => cmd_validate(config),
        };
    }

    let config = build_config(&args)?;
    config.validate().context("invalid configuration")?;

    let face = TcpFace::connect(config.forwarder)
        .await
        .with_context(|| format!("cannot reach forwarder at {}", config.forwarder))?;
    let agent = HomeAgent::new(Arc::new(face), &config)?;

    println!("CCNMP Home Agent v{}", env!("CARGO_PKG_VERSION"));
    println!("=====================================");
    println!("Forwarder: {}", config.forwarder);
    for prefix in agent.prefixes() {
        println!("Prefix:    {}", prefix);
    }
    println!();
    println!("Press Ctrl+C to stop...");
    println!();

    let runner = tokio::spawn({
        let agent = agent.clone();
        async move { agent.run().await }
    });

    if args.stats_interval > 0 {
        let stats_agent = agent.clone();
        let period = Duration::from_secs(args.stats_interval);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                if !stats_agent.is_running() {
                    break;
                }
                print_stats(&stats_agent.relay_stats(), stats_agent.registry().len());
            }
        });
    }

    tokio::signal::ctrl_c().await?;
    println!("\nShutting down...");
    agent.shutdown();
    runner.await??;

    println!("\nFinal Statistics:");
    print_stats(&agent.relay_stats(), agent.registry().len());
    info!("Home agent exited");
    Ok(())
}

fn build_config(args: &Args) -> Result<HomeAgentConfig> {
    let mut config = match &args.config {
        Some(path) => HomeAgentConfig::from_file(path)
            .with_context(|| format!("cannot load {}", path.display()))?,
        None => HomeAgentConfig::default(),
    };

    // command line overrides the file
    if let Some(forwarder) = args.forwarder {
        config.forwarder = forwarder;
    }
    if !args.prefix.is_empty() {
        config.prefixes = args.prefix.clone();
    }
    if let Some(workers) = args.workers {
        config.relay_workers = workers;
    }
    if args.parallel_flush {
        config.flush_mode = FlushMode::Parallel;
    }
    Ok(config)
}

fn cmd_gen_config(output: &PathBuf) -> Result<()> {
    let config = HomeAgentConfig {
        prefixes: vec!["/home".into()],
        ..Default::default()
    };
    config.to_file(output)?;
    println!("Generated configuration file: {}", output.display());
    Ok(())
}

fn cmd_validate(path: &PathBuf) -> Result<()> {
    let config = HomeAgentConfig::from_file(path)?;
    config.validate()?;
    println!("Configuration valid!");
    println!();
    println!("Forwarder:  {}", config.forwarder);
    println!("Prefixes:   {}", config.prefixes.join(", "));
    println!("Workers:    {}", config.relay_workers);
    println!("Flush mode: {:?}", config.flush_mode);
    Ok(())
}

fn print_stats(stats: &RelayStatsSnapshot, namespaces: usize) {
    println!(
        "namespaces={} relays: started={} completed={} failed={} in_flight={} bytes={}",
        namespaces,
        stats.started,
        stats.completed,
        stats.failed,
        stats.in_flight(),
        stats.bytes
    );
}

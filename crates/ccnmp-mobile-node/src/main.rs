// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! CCNMP Mobile Node
//!
//! Serves a directory under a namespace that can change while running, and
//! keeps the home agent informed of where it currently is.
//!
//! # Usage
//!
//! ```bash
//! # Serve ./files for /home/alice, reachable under /cafe/alice, refresh every 30s
//! ccnmp-mobile-node ./files /home/alice 30 /cafe/alice
//! ```
//!
//! Commands on standard input:
//!
//! ```text
//! move /airport/alice
//! exit
//! ```
//!
//! Exits with status 1 if the home agent does not accept the registration.
//! On exit the node withdraws its registration, so it can be started again
//! against the same home agent.

use anyhow::{Context, Result};
use ccnmp::{MobileNode, MobileNodeConfig, Name, TcpFace};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// CCNMP Mobile Node
#[derive(Parser, Debug)]
#[command(name = "ccnmp-mobile-node")]
#[command(about = "CCNMP mobile node - serves files under a moving namespace")]
#[command(version)]
struct Args {
    /// Directory whose files are served
    root_directory: PathBuf,

    /// Home namespace registered with the home agent
    home_namespace: String,

    /// Seconds between redirect refreshes
    refresh_rate: u64,

    /// Namespace currently reachable under (default: home namespace)
    foreign_namespace: Option<String>,

    /// Local forwarder address
    #[arg(short, long, default_value = "127.0.0.1:9695")]
    forwarder: SocketAddr,

    /// Ask the home agent to relay new interests immediately
    #[arg(long)]
    forward_asap: bool,

    /// Milliseconds to wait for the registration acknowledgement
    #[arg(long, default_value = "5000")]
    register_timeout_ms: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

/// A line typed on standard input.
#[derive(Debug, PartialEq, Eq)]
enum Console {
    Move(Name),
    Exit,
}

fn parse_console(line: &str) -> Result<Option<Console>, String> {
    let mut tokens = line.split_whitespace();
    match (tokens.next(), tokens.next()) {
        (None, _) => Ok(None),
        (Some("exit"), _) => Ok(Some(Console::Exit)),
        (Some("move"), Some(ns)) => Name::parse(ns)
            .map(|name| Some(Console::Move(name)))
            .map_err(|e| format!("Invalid namespace {}: {}", ns, e)),
        _ => Err(format!("Invalid command {}", line.trim())),
    }
}

fn build_config(args: &Args) -> MobileNodeConfig {
    let mut config = MobileNodeConfig::new(&args.root_directory, args.home_namespace.clone());
    config.foreign_namespace = args.foreign_namespace.clone();
    config.refresh_rate_secs = args.refresh_rate;
    config.forward_asap = args.forward_asap;
    config.register_timeout_ms = args.register_timeout_ms;
    config.forwarder = args.forwarder;
    config
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let config = build_config(&args);
    config.validate().context("invalid configuration")?;

    let face = TcpFace::connect(config.forwarder)
        .await
        .with_context(|| format!("cannot reach forwarder at {}", config.forwarder))?;
    let node = MobileNode::new(Arc::new(face), &config)?;

    node.start()
        .await
        .with_context(|| format!("registration of {} failed", config.home_namespace))?;
    info!(
        "Mobile node for {} running under {}",
        node.home_namespace(),
        node.current_namespace().await
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match parse_console(&line) {
                    Ok(None) => {}
                    Ok(Some(Console::Exit)) => break,
                    Ok(Some(Console::Move(ns))) => {
                        if let Err(e) = node.move_to(ns).await {
                            warn!("Move failed: {}", e);
                        }
                    }
                    Err(e) => eprintln!("{}", e),
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    node.shutdown().await?;
    info!("Mobile node exited");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_console() {
        assert_eq!(parse_console("exit"), Ok(Some(Console::Exit)));
        assert_eq!(parse_console("   "), Ok(None));
        assert_eq!(
            parse_console("move /airport/alice"),
            Ok(Some(Console::Move(Name::parse("/airport/alice").unwrap())))
        );
        assert!(parse_console("move").is_err());
        assert!(parse_console("move airport").is_err());
        assert!(parse_console("fly /x").is_err());
    }

    #[test]
    fn test_positional_arguments() {
        let args = Args::parse_from(["ccnmp-mobile-node", "/srv", "/home/alice", "15"]);
        let config = build_config(&args);
        assert_eq!(config.refresh_rate_secs, 15);
        assert_eq!(config.foreign_name().unwrap(), config.home_name().unwrap());

        let args = Args::parse_from([
            "ccnmp-mobile-node",
            "/srv",
            "/home/alice",
            "15",
            "/cafe/alice",
            "--forward-asap",
        ]);
        let config = build_config(&args);
        assert_eq!(config.foreign_name().unwrap(), Name::parse("/cafe/alice").unwrap());
        assert!(config.forward_asap);
    }
}

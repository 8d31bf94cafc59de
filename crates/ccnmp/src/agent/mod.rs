// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Home agent.
//!
//! Stands in for mobile nodes while they are away from their home
//! namespace: it answers mobility commands, buffers interests for
//! registered namespaces and relays them once the node tells it where it
//! lives now.

use crate::config::{ConfigError, HomeAgentConfig};
use crate::face::{Face, FaceError, InterestHandler};
use crate::name::Name;
use crate::packet::Interest;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Notify;
use tracing::info;

pub mod dispatcher;
pub mod registry;
pub mod relay;

pub use dispatcher::{DispatchPolicy, Dispatcher, Disposition};
pub use registry::{NamespaceEntry, NamespaceRegistry, Route};
pub use relay::{PendingRelayMapping, RelayEngine, RelayError, RelayStats, RelayStatsSnapshot};

/// Home agent serving mobility commands on a set of prefixes.
#[derive(Clone)]
pub struct HomeAgent {
    face: Arc<dyn Face>,
    prefixes: Arc<Vec<Name>>,
    dispatcher: Arc<Dispatcher>,
    shutdown: Arc<Notify>,
    running: Arc<AtomicBool>,
}

impl HomeAgent {
    /// Create a home agent on `face`.
    pub fn new(face: Arc<dyn Face>, config: &HomeAgentConfig) -> Result<Self, AgentError> {
        config.validate()?;

        let registry = Arc::new(NamespaceRegistry::with_policy(
            config.storing_enabled,
            config.max_pending_per_namespace,
        ));
        let relay = RelayEngine::new(
            face.clone(),
            config.relay_workers,
            config.relay_chunk_size,
            config.open_timeout(),
        );
        let policy = DispatchPolicy {
            ack_duplicate_register: config.ack_duplicate_register,
            requeue_failed_relays: config.requeue_failed_relays,
            flush_mode: config.flush_mode,
        };

        Ok(Self {
            prefixes: Arc::new(config.prefix_names()?),
            dispatcher: Arc::new(Dispatcher::new(face.clone(), registry, relay, policy)),
            face,
            shutdown: Arc::new(Notify::new()),
            running: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Install the interest filters and start serving.
    pub async fn start(&self) -> Result<(), AgentError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(AgentError::AlreadyRunning);
        }

        for prefix in self.prefixes.iter() {
            if let Err(e) = self
                .face
                .register_filter(prefix, Arc::new(self.clone()))
                .await
            {
                self.running.store(false, Ordering::SeqCst);
                return Err(e.into());
            }
            info!("Home agent listening on {}", prefix);
        }
        Ok(())
    }

    /// Remove the interest filters.
    pub async fn stop(&self) -> Result<(), AgentError> {
        if !self.running.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        for prefix in self.prefixes.iter() {
            self.face.unregister_filter(prefix).await?;
        }
        info!("Home agent stopped");
        Ok(())
    }

    /// Serve until [`shutdown`](Self::shutdown) is called.
    pub async fn run(&self) -> Result<(), AgentError> {
        let notified = self.shutdown.notified();
        self.start().await?;
        notified.await;
        info!("Shutdown signal received");
        self.stop().await
    }

    /// Make [`run`](Self::run) return.
    pub fn shutdown(&self) {
        self.shutdown.notify_waiters();
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Handle one interest directly, bypassing the face.
    pub async fn handle(&self, interest: Interest) -> Disposition {
        self.dispatcher.dispatch(interest).await
    }

    pub fn registry(&self) -> &NamespaceRegistry {
        self.dispatcher.registry()
    }

    /// Relays currently in flight.
    pub fn in_flight(&self) -> &PendingRelayMapping {
        self.dispatcher.relay().mapping()
    }

    pub fn relay_stats(&self) -> RelayStatsSnapshot {
        self.dispatcher.relay().stats().snapshot()
    }

    /// Prefixes the agent listens on.
    pub fn prefixes(&self) -> &[Name] {
        &self.prefixes
    }
}

#[async_trait]
impl InterestHandler for HomeAgent {
    async fn handle_interest(&self, interest: Interest) -> bool {
        self.handle(interest).await.is_handled()
    }
}

/// Home agent errors.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Face error: {0}")]
    Face(#[from] FaceError),

    #[error("Home agent already running")]
    AlreadyRunning,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::face::MemoryFace;
    use crate::protocol::redirect_name;
    use std::time::SystemTime;

    fn n(uri: &str) -> Name {
        Name::parse(uri).unwrap()
    }

    fn agent(face: &MemoryFace, prefixes: &[&str]) -> HomeAgent {
        let config = HomeAgentConfig {
            prefixes: prefixes.iter().map(|p| p.to_string()).collect(),
            ..Default::default()
        };
        HomeAgent::new(Arc::new(face.clone()), &config).unwrap()
    }

    #[tokio::test]
    async fn test_start_installs_filters() {
        let face = MemoryFace::new();
        let agent = agent(&face, &["/a", "/c"]);

        agent.start().await.unwrap();
        assert!(agent.is_running());
        assert!(face.has_filter(&n("/a")));
        assert!(face.has_filter(&n("/c")));
        assert!(matches!(agent.start().await, Err(AgentError::AlreadyRunning)));

        agent.stop().await.unwrap();
        assert!(!agent.is_running());
        assert!(!face.has_filter(&n("/a")));
    }

    #[tokio::test]
    async fn test_run_until_shutdown() {
        let face = MemoryFace::new();
        let agent = agent(&face, &["/"]);

        let runner = tokio::spawn({
            let agent = agent.clone();
            async move { agent.run().await }
        });
        while !agent.is_running() {
            tokio::task::yield_now().await;
        }
        assert!(face.has_filter(&Name::root()));

        agent.shutdown();
        runner.await.unwrap().unwrap();
        assert!(!face.has_filter(&Name::root()));
    }

    #[tokio::test]
    async fn test_injected_interest_reaches_registry() {
        let face = MemoryFace::new();
        let agent = agent(&face, &["/"]);
        agent.registry().register(&n("/a"), false);
        agent.start().await.unwrap();

        assert!(face.inject_interest(Interest::new(n("/a/file1"))));
        while agent.registry().pending_count(&n("/a")) == 0 {
            tokio::task::yield_now().await;
        }
        assert_eq!(agent.registry().pending_count(&n("/a")), 1);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = HomeAgentConfig {
            relay_workers: 0,
            ..Default::default()
        };
        let result = HomeAgent::new(Arc::new(MemoryFace::new()), &config);
        assert!(matches!(result, Err(AgentError::Config(_))));
    }

    #[tokio::test]
    async fn test_redirect_home_does_not_rebuffer_own_relays() {
        let face = MemoryFace::new();
        let config = HomeAgentConfig {
            open_timeout_ms: 100,
            ..Default::default()
        };
        let agent = HomeAgent::new(Arc::new(face.clone()), &config).unwrap();
        agent.registry().register(&n("/a"), false);
        agent.start().await.unwrap();

        assert!(face.inject_interest(Interest::new(n("/a/x"))));
        while agent.registry().pending_count(&n("/a")) == 0 {
            tokio::task::yield_now().await;
        }

        // nobody serves /a, so the relay of /a/x reaches the agent itself
        let redirect = redirect_name(&n("/a"), &n("/a"), SystemTime::now());
        agent.handle(Interest::new(redirect)).await;

        assert_eq!(agent.registry().pending_count(&n("/a")), 0);
        assert!(face.expressed().iter().any(|i| i.name() == &n("/a/x")));
        let stats = agent.relay_stats();
        assert_eq!(stats.started, 1);
        assert_eq!(stats.failed, 1);
        assert!(agent.in_flight().is_empty());
    }

    #[tokio::test]
    async fn test_relayed_interest_passes_through() {
        let face = MemoryFace::new();
        let agent = agent(&face, &["/"]);
        agent.registry().register(&n("/a"), false);
        agent.in_flight().insert(&n("/a/x"), &n("/a/x"));

        assert_eq!(agent.handle(Interest::new(n("/a/x"))).await, Disposition::Unhandled);
        assert_eq!(agent.registry().pending_count(&n("/a")), 0);

        agent.in_flight().remove(&n("/a/x"), &n("/a/x"));
        assert_eq!(
            agent.handle(Interest::new(n("/a/x"))).await,
            Disposition::Buffered(n("/a"))
        );
    }
}

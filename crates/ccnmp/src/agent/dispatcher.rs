// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Inbound interest classification.
//!
//! Every interest reaching the home agent is either a mobility command
//! (its name carries the `ccnmp` root token) or ordinary traffic for some
//! namespace. Commands mutate the registry and are acknowledged under their
//! own name; traffic for a registered namespace is buffered or relayed.

use super::registry::{NamespaceRegistry, Route};
use super::relay::RelayEngine;
use crate::config::FlushMode;
use crate::face::Face;
use crate::name::Name;
use crate::packet::Interest;
use crate::protocol::{Ack, Command, CommandInterest};
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Behaviour switches of the dispatcher.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchPolicy {
    /// Answer duplicate registrations with `ACK` instead of silence.
    pub ack_duplicate_register: bool,

    /// Put interests whose relay failed during a flush back in the buffer.
    pub requeue_failed_relays: bool,

    pub flush_mode: FlushMode,
}

/// What the dispatcher did with an interest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// A command was executed.
    Command { command: Command, ack: Option<Ack> },

    /// Buffered under the given namespace.
    Buffered(Name),

    /// Relay to the given remote name started.
    Forwarded(Name),

    /// Covered by a registered namespace but could not be kept.
    Dropped(Name),

    /// Command interest that could not be decoded.
    Malformed,

    /// Not a command and no registered namespace covers it, or one of
    /// the home agent's own relays.
    Unhandled,
}

impl Disposition {
    /// True if the interest was consumed here.
    pub fn is_handled(&self) -> bool {
        !matches!(self, Self::Unhandled)
    }
}

/// Routes inbound interests to the command or data path.
pub struct Dispatcher {
    face: Arc<dyn Face>,
    registry: Arc<NamespaceRegistry>,
    relay: RelayEngine,
    policy: DispatchPolicy,
}

impl Dispatcher {
    pub fn new(
        face: Arc<dyn Face>,
        registry: Arc<NamespaceRegistry>,
        relay: RelayEngine,
        policy: DispatchPolicy,
    ) -> Self {
        Self {
            face,
            registry,
            relay,
            policy,
        }
    }

    /// Classify and handle one interest.
    ///
    /// Redirect flushes complete before this returns.
    pub async fn dispatch(&self, interest: Interest) -> Disposition {
        match CommandInterest::parse(interest.name()) {
            Ok(Some(command)) => self.handle_command(command, &interest).await,
            Ok(None) => self.handle_data(interest),
            Err(e) => {
                warn!("Dropping command interest: {}", e);
                Disposition::Malformed
            }
        }
    }

    async fn handle_command(&self, cmd: CommandInterest, interest: &Interest) -> Disposition {
        debug!(
            "Command {} for {} args {}",
            cmd.command.token(),
            cmd.namespace,
            cmd.arguments
        );

        let ack = match cmd.command {
            Command::Register => self.register(&cmd),
            Command::Redirect => self.redirect(&cmd.namespace, cmd.remote()).await,
            Command::RegisterRedirect => {
                if self.registry.register(&cmd.namespace, false) {
                    info!("Registered {} through register-redirect", cmd.namespace);
                }
                self.redirect(&cmd.namespace, cmd.remote()).await
            }
            Command::Remove => self.remove(&cmd.namespace),
        };

        if let Some(ack) = ack {
            self.respond(ack, interest).await;
        }
        Disposition::Command {
            command: cmd.command,
            ack,
        }
    }

    fn register(&self, cmd: &CommandInterest) -> Option<Ack> {
        let forward_asap = cmd.forward_asap();
        if self.registry.register(&cmd.namespace, forward_asap) {
            info!(
                "Registered {} (forward_asap={})",
                cmd.namespace, forward_asap
            );
            Some(Ack::Success)
        } else if self.policy.ack_duplicate_register {
            debug!("Duplicate registration of {}, acknowledging", cmd.namespace);
            Some(Ack::Success)
        } else {
            debug!("Duplicate registration of {}, ignored", cmd.namespace);
            None
        }
    }

    async fn redirect(&self, namespace: &Name, remote: &Name) -> Option<Ack> {
        let Some(pending) = self.registry.redirect(namespace, remote) else {
            warn!("Redirect for unregistered namespace {}", namespace);
            return Some(Ack::Failure);
        };
        info!(
            "Redirecting {} to {} ({} buffered)",
            namespace,
            remote,
            pending.len()
        );

        let jobs: Vec<(Interest, Interest)> = pending
            .into_iter()
            .filter_map(|original| {
                let redirected = redirected_interest(&original, namespace, remote)?;
                Some((redirected, original))
            })
            .collect();

        let failed = match self.policy.flush_mode {
            FlushMode::Sequential => self.flush_sequential(jobs).await,
            FlushMode::Parallel => self.flush_parallel(jobs).await,
        };

        if !failed.is_empty() {
            if self.policy.requeue_failed_relays {
                let count = failed.len();
                for original in failed {
                    self.registry.buffer_request(namespace, original);
                }
                info!("Re-buffered {} failed relays for {}", count, namespace);
            } else {
                warn!("Dropped {} failed relays for {}", failed.len(), namespace);
            }
        }
        Some(Ack::Success)
    }

    /// Relay one job at a time; returns the originals that failed.
    async fn flush_sequential(&self, jobs: Vec<(Interest, Interest)>) -> Vec<Interest> {
        let mut failed = Vec::new();
        for (redirected, original) in jobs {
            if self.relay.relay(&redirected, &original).await.is_err() {
                failed.push(original);
            }
        }
        failed
    }

    /// Relay every job concurrently, bounded by the relay pool.
    async fn flush_parallel(&self, jobs: Vec<(Interest, Interest)>) -> Vec<Interest> {
        let mut set = JoinSet::new();
        for (redirected, original) in jobs {
            let relay = self.relay.clone();
            set.spawn(async move {
                let ok = relay.relay(&redirected, &original).await.is_ok();
                (original, ok)
            });
        }

        let mut failed = Vec::new();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((_, true)) => {}
                Ok((original, false)) => failed.push(original),
                Err(e) => warn!("Relay task panicked: {}", e),
            }
        }
        failed
    }

    fn remove(&self, namespace: &Name) -> Option<Ack> {
        if self.registry.remove(namespace) {
            info!("Removed {}", namespace);
            Some(Ack::Success)
        } else {
            warn!("Remove for unregistered namespace {}", namespace);
            Some(Ack::Failure)
        }
    }

    fn handle_data(&self, interest: Interest) -> Disposition {
        // our own relays come back through our filters when the remote
        // namespace is covered by a served prefix
        if self.relay.mapping().contains(interest.name()) {
            let originals: Vec<String> = self
                .relay
                .mapping()
                .originals(interest.name())
                .iter()
                .map(Name::to_string)
                .collect();
            debug!(
                "Passing through relayed {} for {}",
                interest.name(),
                originals.join(", ")
            );
            return Disposition::Unhandled;
        }

        let Some(route) = self.registry.longest_match(interest.name()) else {
            return Disposition::Unhandled;
        };

        if let Some(remote) = route.immediate_target() {
            return self.forward(&route, remote.clone(), interest);
        }

        self.buffer(&route.namespace, interest)
    }

    fn buffer(&self, namespace: &Name, interest: Interest) -> Disposition {
        let name = interest.name().clone();
        if self.registry.buffer_request(namespace, interest) {
            debug!("Buffered {} under {}", name, namespace);
            Disposition::Buffered(namespace.clone())
        } else {
            warn!("Could not buffer {} under {}", name, namespace);
            Disposition::Dropped(namespace.clone())
        }
    }

    /// Relay in the background; falls back to buffering if the relay fails.
    fn forward(&self, route: &Route, remote: Name, original: Interest) -> Disposition {
        let Some(redirected) = redirected_interest(&original, &route.namespace, &remote) else {
            return Disposition::Dropped(route.namespace.clone());
        };
        debug!("Forwarding {} as {}", original.name(), redirected.name());

        let target = redirected.name().clone();
        let relay = self.relay.clone();
        let registry = self.registry.clone();
        let namespace = route.namespace.clone();
        tokio::spawn(async move {
            if relay.relay(&redirected, &original).await.is_err() {
                let name = original.name().clone();
                if registry.buffer_request(&namespace, original) {
                    debug!("Buffered {} after failed relay", name);
                }
            }
        });
        Disposition::Forwarded(target)
    }

    async fn respond(&self, ack: Ack, interest: &Interest) {
        if let Err(e) = self.face.put(ack.response_to(interest)).await {
            warn!("Failed to acknowledge {}: {}", interest.name(), e);
        }
    }

    pub fn registry(&self) -> &Arc<NamespaceRegistry> {
        &self.registry
    }

    pub fn relay(&self) -> &RelayEngine {
        &self.relay
    }
}

/// `remote + (original - namespace)`, keeping the original selectors.
fn redirected_interest(original: &Interest, namespace: &Name, remote: &Name) -> Option<Interest> {
    match original.name().strip_prefix(namespace) {
        Some(postfix) => Some(original.renamed(remote.append(&postfix))),
        None => {
            warn!("{} is not under {}", original.name(), namespace);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::face::MemoryFace;
    use crate::packet::{Data, ExcludeEntry, Selectors};
    use crate::protocol::{command_name, redirect_name, register_name, remove_name};
    use std::time::{Duration, SystemTime};

    fn n(uri: &str) -> Name {
        Name::parse(uri).unwrap()
    }

    fn dispatcher(face: &MemoryFace, policy: DispatchPolicy) -> Dispatcher {
        let face: Arc<dyn Face> = Arc::new(face.clone());
        let relay = RelayEngine::new(face.clone(), 4, 1024, Duration::from_millis(50));
        Dispatcher::new(face, Arc::new(NamespaceRegistry::new()), relay, policy)
    }

    fn later() -> SystemTime {
        SystemTime::now() + Duration::from_secs(1)
    }

    fn ack_for(face: &MemoryFace, name: &Name) -> Option<Ack> {
        face.published()
            .iter()
            .find(|d| d.name() == name)
            .and_then(|d| Ack::from_payload(d.payload()))
    }

    #[tokio::test]
    async fn test_register_acks_once() {
        let face = MemoryFace::new();
        let d = dispatcher(&face, DispatchPolicy::default());

        let first = register_name(&n("/a"), true, SystemTime::now());
        let second = register_name(&n("/a"), false, later());
        d.dispatch(Interest::new(first.clone())).await;
        let disp = d.dispatch(Interest::new(second.clone())).await;

        assert_eq!(ack_for(&face, &first), Some(Ack::Success));
        assert_eq!(ack_for(&face, &second), None);
        assert_eq!(
            disp,
            Disposition::Command {
                command: Command::Register,
                ack: None
            }
        );
        assert!(d.registry().entry(&n("/a")).unwrap().forward_asap);
    }

    #[tokio::test]
    async fn test_duplicate_register_acked_when_enabled() {
        let face = MemoryFace::new();
        let d = dispatcher(
            &face,
            DispatchPolicy {
                ack_duplicate_register: true,
                ..Default::default()
            },
        );
        d.registry().register(&n("/a"), false);

        let name = register_name(&n("/a"), true, SystemTime::now());
        d.dispatch(Interest::new(name.clone())).await;

        assert_eq!(ack_for(&face, &name), Some(Ack::Success));
        assert!(!d.registry().entry(&n("/a")).unwrap().forward_asap);
    }

    #[tokio::test]
    async fn test_data_buffered_then_redirected() {
        let face = MemoryFace::new();
        let d = dispatcher(&face, DispatchPolicy::default());
        d.registry().register(&n("/a"), false);

        let selectors = Selectors {
            exclude: vec![ExcludeEntry::Any],
            ..Default::default()
        };
        let disp = d
            .dispatch(Interest::with_selectors(n("/a/file1"), selectors.clone()))
            .await;
        assert_eq!(disp, Disposition::Buffered(n("/a")));

        face.publish(Data::new(n("/b/file1/v1"), b"moved".to_vec()));
        let cmd = redirect_name(&n("/a"), &n("/b"), SystemTime::now());
        d.dispatch(Interest::new(cmd.clone())).await;

        assert_eq!(ack_for(&face, &cmd), Some(Ack::Success));
        assert_eq!(d.registry().pending_count(&n("/a")), 0);
        assert_eq!(face.content(&n("/a/file1")).unwrap().payload(), b"moved");

        let relayed = face
            .expressed()
            .into_iter()
            .find(|i| i.name() == &n("/b/file1"))
            .unwrap();
        assert_eq!(relayed.selectors(), &selectors);
    }

    #[tokio::test]
    async fn test_redirect_unregistered_is_err() {
        let face = MemoryFace::new();
        let d = dispatcher(&face, DispatchPolicy::default());

        let cmd = redirect_name(&n("/a"), &n("/b"), SystemTime::now());
        d.dispatch(Interest::new(cmd.clone())).await;

        assert_eq!(ack_for(&face, &cmd), Some(Ack::Failure));
        assert!(d.registry().is_empty());
        assert_eq!(d.relay().stats().snapshot().started, 0);
    }

    #[tokio::test]
    async fn test_failed_relay_dropped_by_default() {
        let face = MemoryFace::new();
        let d = dispatcher(&face, DispatchPolicy::default());
        d.registry().register(&n("/a"), false);
        d.dispatch(Interest::new(n("/a/gone"))).await;

        let cmd = redirect_name(&n("/a"), &n("/b"), SystemTime::now());
        d.dispatch(Interest::new(cmd.clone())).await;

        assert_eq!(ack_for(&face, &cmd), Some(Ack::Success));
        assert_eq!(d.registry().pending_count(&n("/a")), 0);
        assert_eq!(d.relay().stats().snapshot().failed, 1);
    }

    #[tokio::test]
    async fn test_failed_relay_requeued_when_enabled() {
        let face = MemoryFace::new();
        let d = dispatcher(
            &face,
            DispatchPolicy {
                requeue_failed_relays: true,
                flush_mode: FlushMode::Parallel,
                ..Default::default()
            },
        );
        d.registry().register(&n("/a"), false);
        d.dispatch(Interest::new(n("/a/gone"))).await;
        d.dispatch(Interest::new(n("/a/here"))).await;
        face.publish(Data::new(n("/b/here/v1"), b"ok".to_vec()));

        d.dispatch(Interest::new(redirect_name(&n("/a"), &n("/b"), SystemTime::now())))
            .await;

        let entry = d.registry().entry(&n("/a")).unwrap();
        assert_eq!(entry.pending.len(), 1);
        assert_eq!(entry.pending[0].name(), &n("/a/gone"));
        assert_eq!(face.content(&n("/a/here")).unwrap().payload(), b"ok");
    }

    #[tokio::test]
    async fn test_register_redirect_registers_and_acks() {
        let face = MemoryFace::new();
        let d = dispatcher(&face, DispatchPolicy::default());

        let cmd = command_name(&n("/a"), Command::RegisterRedirect, &n("/b"), SystemTime::now());
        d.dispatch(Interest::new(cmd.clone())).await;

        assert_eq!(ack_for(&face, &cmd), Some(Ack::Success));
        assert_eq!(d.registry().remote_name(&n("/a")), Some(n("/b")));
    }

    #[tokio::test]
    async fn test_remove() {
        let face = MemoryFace::new();
        let d = dispatcher(&face, DispatchPolicy::default());
        d.registry().register(&n("/a"), false);

        let first = remove_name(&n("/a"), SystemTime::now());
        d.dispatch(Interest::new(first.clone())).await;
        let second = remove_name(&n("/a"), later());
        d.dispatch(Interest::new(second.clone())).await;

        assert_eq!(ack_for(&face, &first), Some(Ack::Success));
        assert_eq!(ack_for(&face, &second), Some(Ack::Failure));
        assert!(!d.registry().contains(&n("/a")));
    }

    #[tokio::test]
    async fn test_forward_asap_relays_immediately() {
        let face = MemoryFace::new();
        let d = dispatcher(&face, DispatchPolicy::default());
        d.registry().register(&n("/a"), true);
        d.registry().set_remote_name(&n("/a"), &n("/b"));
        face.publish(Data::new(n("/b/f/v1"), b"now".to_vec()));

        let disp = d.dispatch(Interest::new(n("/a/f"))).await;
        assert_eq!(disp, Disposition::Forwarded(n("/b/f")));

        let mut tries = 0;
        while face.content(&n("/a/f")).is_none() && tries < 100 {
            tokio::task::yield_now().await;
            tries += 1;
        }
        assert_eq!(face.content(&n("/a/f")).unwrap().payload(), b"now");
        assert_eq!(d.registry().pending_count(&n("/a")), 0);
    }

    #[tokio::test]
    async fn test_forward_asap_failure_buffers() {
        let face = MemoryFace::new();
        let d = dispatcher(&face, DispatchPolicy::default());
        d.registry().register(&n("/a"), true);
        d.registry().set_remote_name(&n("/a"), &n("/b"));

        d.dispatch(Interest::new(n("/a/missing"))).await;
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert_eq!(d.registry().pending_count(&n("/a")), 1);
    }

    #[tokio::test]
    async fn test_unregistered_data_unhandled() {
        let face = MemoryFace::new();
        let d = dispatcher(&face, DispatchPolicy::default());
        let disp = d.dispatch(Interest::new(n("/x/file"))).await;
        assert_eq!(disp, Disposition::Unhandled);
        assert!(!disp.is_handled());
        assert!(d.registry().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_and_unknown_commands() {
        let face = MemoryFace::new();
        let d = dispatcher(&face, DispatchPolicy::default());

        assert_eq!(
            d.dispatch(Interest::new(n("/a/ccnmp/rg"))).await,
            Disposition::Malformed
        );
        assert_eq!(
            d.dispatch(Interest::new(n("/a/ccnmp/zz/%FD%01"))).await,
            Disposition::Malformed
        );
        assert!(face.published().is_empty());
        assert!(d.registry().is_empty());
    }
}

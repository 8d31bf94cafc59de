// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Namespace registry for the home agent.
//!
//! One entry per registered mobile namespace, holding its buffering policy,
//! the namespace it currently lives under and the interests waiting for it.
//! Every operation takes the registry lock for the duration of the state
//! change only; nothing here performs I/O.

use crate::name::Name;
use crate::packet::Interest;
use parking_lot::Mutex;
use std::collections::HashMap;

/// Default cap on buffered interests per namespace.
pub const DEFAULT_MAX_PENDING: usize = 1024;

/// State kept for a registered namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceEntry {
    /// Interests may be buffered for this namespace.
    pub storing_enabled: bool,

    /// Relay new interests immediately once a remote name is known.
    pub forward_asap: bool,

    /// Namespace the mobile node is currently reachable under.
    pub remote_name: Option<Name>,

    /// Buffered interests, oldest first.
    pub pending: Vec<Interest>,
}

impl NamespaceEntry {
    fn new(forward_asap: bool, storing_enabled: bool) -> Self {
        Self {
            storing_enabled,
            forward_asap,
            remote_name: None,
            pending: Vec::new(),
        }
    }
}

/// Result of matching an interest name against the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    /// Most specific registered namespace covering the name.
    pub namespace: Name,

    pub forward_asap: bool,

    pub remote_name: Option<Name>,
}

impl Route {
    /// Remote name to relay to right away, if the policy allows it.
    pub fn immediate_target(&self) -> Option<&Name> {
        if self.forward_asap {
            self.remote_name.as_ref()
        } else {
            None
        }
    }
}

/// Registry of mobile namespaces.
#[derive(Debug)]
pub struct NamespaceRegistry {
    entries: Mutex<HashMap<Name, NamespaceEntry>>,
    storing_enabled: bool,
    max_pending: usize,
}

impl NamespaceRegistry {
    /// Create an empty registry with buffering enabled.
    pub fn new() -> Self {
        Self::with_policy(true, DEFAULT_MAX_PENDING)
    }

    /// Create an empty registry.
    ///
    /// `storing_enabled` applies to every namespace registered later;
    /// `max_pending` bounds each pending list (0 = unbounded).
    pub fn with_policy(storing_enabled: bool, max_pending: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            storing_enabled,
            max_pending,
        }
    }

    /// Register `namespace`. Returns `true` if it was not registered before.
    ///
    /// A duplicate registration changes nothing.
    pub fn register(&self, namespace: &Name, forward_asap: bool) -> bool {
        let mut entries = self.entries.lock();
        if entries.contains_key(namespace) {
            return false;
        }
        entries.insert(
            namespace.clone(),
            NamespaceEntry::new(forward_asap, self.storing_enabled),
        );
        true
    }

    /// Buffer `interest` under `namespace`.
    ///
    /// Fails if the namespace is unknown, does not store, or is full.
    pub fn buffer_request(&self, namespace: &Name, interest: Interest) -> bool {
        let mut entries = self.entries.lock();
        match entries.get_mut(namespace) {
            Some(entry) if entry.storing_enabled => {
                if self.max_pending > 0 && entry.pending.len() >= self.max_pending {
                    return false;
                }
                entry.pending.push(interest);
                true
            }
            _ => false,
        }
    }

    /// Point `namespace` at `remote`. Fails if not registered.
    pub fn set_remote_name(&self, namespace: &Name, remote: &Name) -> bool {
        match self.entries.lock().get_mut(namespace) {
            Some(entry) => {
                entry.remote_name = Some(remote.clone());
                true
            }
            None => false,
        }
    }

    /// Current remote name of `namespace`.
    pub fn remote_name(&self, namespace: &Name) -> Option<Name> {
        self.entries
            .lock()
            .get(namespace)
            .and_then(|e| e.remote_name.clone())
    }

    /// Take every buffered interest of `namespace`, leaving it empty.
    pub fn drain_pending(&self, namespace: &Name) -> Vec<Interest> {
        self.entries
            .lock()
            .get_mut(namespace)
            .map(|e| std::mem::take(&mut e.pending))
            .unwrap_or_default()
    }

    /// Set the remote name and drain the pending list in one step.
    ///
    /// Returns `None` if `namespace` is not registered.
    pub fn redirect(&self, namespace: &Name, remote: &Name) -> Option<Vec<Interest>> {
        let mut entries = self.entries.lock();
        let entry = entries.get_mut(namespace)?;
        entry.remote_name = Some(remote.clone());
        Some(std::mem::take(&mut entry.pending))
    }

    /// Unregister `namespace`, discarding its buffered interests.
    pub fn remove(&self, namespace: &Name) -> bool {
        self.entries.lock().remove(namespace).is_some()
    }

    /// Check if `namespace` is registered.
    pub fn contains(&self, namespace: &Name) -> bool {
        self.entries.lock().contains_key(namespace)
    }

    /// Most specific registered namespace that is a non-empty proper prefix
    /// of `name`.
    pub fn longest_match(&self, name: &Name) -> Option<Route> {
        let entries = self.entries.lock();
        (1..name.len()).rev().find_map(|len| {
            let prefix = name.cut(len);
            entries.get(&prefix).map(|entry| Route {
                forward_asap: entry.forward_asap,
                remote_name: entry.remote_name.clone(),
                namespace: prefix,
            })
        })
    }

    /// Snapshot of the entry for `namespace`.
    pub fn entry(&self, namespace: &Name) -> Option<NamespaceEntry> {
        self.entries.lock().get(namespace).cloned()
    }

    /// Number of buffered interests for `namespace`.
    pub fn pending_count(&self, namespace: &Name) -> usize {
        self.entries
            .lock()
            .get(namespace)
            .map(|e| e.pending.len())
            .unwrap_or(0)
    }

    /// Number of registered namespaces.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl Default for NamespaceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Interest and Data packets.

use crate::name::Name;
use serde::{Deserialize, Serialize};

/// Which child the responder should prefer when several match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChildSelector {
    Leftmost,
    Rightmost,
}

/// One element of an exclusion filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExcludeEntry {
    /// Exclude exactly this next component.
    Component(Vec<u8>),
    /// Exclude the range between the neighbouring components.
    Any,
}

/// Interest selectors.
///
/// Evaluated by the forwarder, carried here unchanged so a redirected
/// interest asks for the same thing the original did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selectors {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude: Vec<ExcludeEntry>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub child_selector: Option<ChildSelector>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_suffix_components: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_suffix_components: Option<u32>,
}

/// A request for content under a name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interest {
    name: Name,
    #[serde(default)]
    selectors: Selectors,
}

impl Interest {
    /// Interest for `name` with default selectors.
    pub fn new(name: Name) -> Self {
        Self {
            name,
            selectors: Selectors::default(),
        }
    }

    /// Interest for `name` carrying `selectors`.
    pub fn with_selectors(name: Name, selectors: Selectors) -> Self {
        Self { name, selectors }
    }

    pub fn name(&self) -> &Name {
        &self.name
    }

    pub fn selectors(&self) -> &Selectors {
        &self.selectors
    }

    /// Same selectors, different name.
    pub fn renamed(&self, name: Name) -> Interest {
        Self {
            name,
            selectors: self.selectors.clone(),
        }
    }

    /// Name-prefix and suffix-length match against `data`.
    pub fn matches(&self, data: &Data) -> bool {
        let Some(rest) = data.name().strip_prefix(&self.name) else {
            return false;
        };
        let suffix = rest.len() as u32;
        if let Some(min) = self.selectors.min_suffix_components {
            if suffix < min {
                return false;
            }
        }
        if let Some(max) = self.selectors.max_suffix_components {
            if suffix > max {
                return false;
            }
        }
        true
    }
}

/// A named content object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Data {
    name: Name,
    #[serde(default)]
    payload: Vec<u8>,
}

impl Data {
    pub fn new(name: Name, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            name,
            payload: payload.into(),
        }
    }

    pub fn name(&self) -> &Name {
        &self.name
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }
}

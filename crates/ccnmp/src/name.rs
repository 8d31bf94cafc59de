// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Content names.
//!
//! A [`Name`] is an ordered, immutable sequence of opaque binary components.
//! Every operation that "modifies" a name returns a new one.
//!
//! # URI form
//!
//! ```text
//! /parc.com/videos/file%00
//! ```
//!
//! Bytes outside the URI unreserved set are `%XX` escaped. A component made
//! only of periods is written with three extra periods so that the empty
//! component (`...`) and `.`/`..` survive a round trip.
//!
//! # Profiles
//!
//! Versions and segments are ordinary components tagged by a leading marker
//! byte. Segmentation and versioning are done by the face, but the protocol
//! layer needs to recognise them to strip or ignore them.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Leading byte of a version component.
pub const VERSION_MARKER: u8 = 0xFD;

/// Leading byte of a segment component.
pub const SEGMENT_MARKER: u8 = 0x00;

/// Metadata directory component preceding a header name.
pub const METADATA_MARKER: &[u8] = b"_meta_";

/// Header component inside the metadata directory.
pub const HEADER_NAME: &[u8] = b".header";

/// Width of the timestamp carried by a version component.
const VERSION_TICK_BYTES: usize = 6;

/// Name parsing errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NameError {
    #[error("name must be absolute: {0:?}")]
    NotAbsolute(String),

    #[error("invalid escape sequence in {0:?}")]
    BadEscape(String),

    #[error("invalid component {0:?}")]
    BadComponent(String),
}

/// A hierarchical content name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Name {
    components: Vec<Vec<u8>>,
}

impl Name {
    /// The root name `/`, with no components.
    pub fn root() -> Self {
        Self::default()
    }

    /// Build a name from raw components.
    pub fn from_components<I, C>(components: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Vec<u8>>,
    {
        Self {
            components: components.into_iter().map(Into::into).collect(),
        }
    }

    /// Parse a name from its URI form.
    pub fn parse(uri: &str) -> Result<Self, NameError> {
        let trimmed = uri.trim();
        let trimmed = trimmed.strip_prefix("ccnx:").unwrap_or(trimmed);
        let rest = trimmed
            .strip_prefix('/')
            .ok_or_else(|| NameError::NotAbsolute(uri.to_string()))?;

        let mut components = Vec::new();
        for raw in rest.split('/') {
            if raw.is_empty() {
                // "/a//b" and a trailing "/" carry no component
                continue;
            }
            components.push(unescape(raw)?);
        }
        Ok(Self { components })
    }

    /// Number of components.
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// True for the root name.
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// All components in order.
    pub fn components(&self) -> &[Vec<u8>] {
        &self.components
    }

    /// Component at `index`, if present.
    pub fn component(&self, index: usize) -> Option<&[u8]> {
        self.components.get(index).map(Vec::as_slice)
    }

    /// Last component, if any.
    pub fn last(&self) -> Option<&[u8]> {
        self.components.last().map(Vec::as_slice)
    }

    /// Position of the first component equal to `component`.
    pub fn position(&self, component: &[u8]) -> Option<usize> {
        self.components.iter().position(|c| c == component)
    }

    /// True if every component of `self` leads `other`.
    pub fn is_prefix_of(&self, other: &Name) -> bool {
        self.len() <= other.len() && self.components[..] == other.components[..self.len()]
    }

    /// The first `count` components.
    pub fn cut(&self, count: usize) -> Name {
        let count = count.min(self.len());
        Self {
            components: self.components[..count].to_vec(),
        }
    }

    /// Components from `index` to the end.
    pub fn suffix(&self, index: usize) -> Name {
        let index = index.min(self.len());
        Self {
            components: self.components[index..].to_vec(),
        }
    }

    /// What remains after removing `prefix`, or `None` if it is not a prefix.
    pub fn strip_prefix(&self, prefix: &Name) -> Option<Name> {
        prefix
            .is_prefix_of(self)
            .then(|| self.suffix(prefix.len()))
    }

    /// Concatenate `other` after `self`.
    pub fn append(&self, other: &Name) -> Name {
        let mut components = Vec::with_capacity(self.len() + other.len());
        components.extend_from_slice(&self.components);
        components.extend_from_slice(&other.components);
        Self { components }
    }

    /// Append a single component.
    pub fn child(&self, component: impl Into<Vec<u8>>) -> Name {
        let mut components = self.components.clone();
        components.push(component.into());
        Self { components }
    }

    /// Append a version component for `at`.
    pub fn versioned(&self, at: SystemTime) -> Name {
        self.child(version_component(at))
    }

    /// Append a version component for the current time.
    pub fn versioned_now(&self) -> Name {
        self.versioned(SystemTime::now())
    }

    /// Timestamp of the last component if it is a version.
    pub fn version(&self) -> Option<SystemTime> {
        self.last().and_then(parse_version)
    }

    /// True if the last component is a segment marker.
    pub fn is_segment(&self) -> bool {
        self.last().map(is_segment_component).unwrap_or(false)
    }

    /// Segment number of the last component.
    pub fn segment_number(&self) -> Option<u64> {
        self.last()
            .filter(|c| is_segment_component(c))
            .map(|c| be_number(&c[1..]))
    }

    /// True if the last component addresses segment 0.
    pub fn is_first_segment(&self) -> bool {
        self.segment_number() == Some(0)
    }

    /// True if the name addresses a stream header (`.../_meta_/.header...`).
    pub fn is_header(&self) -> bool {
        self.components
            .windows(2)
            .any(|w| w[0] == METADATA_MARKER && w[1] == HEADER_NAME)
    }

    /// Drop trailing version and segment components.
    pub fn trim_markers(&self) -> Name {
        let mut end = self.len();
        while end > 0 {
            let c = &self.components[end - 1];
            if is_segment_component(c) || is_version_component(c) {
                end -= 1;
            } else {
                break;
            }
        }
        self.cut(end)
    }
}

/// Build a version component for `at` (1/4096 second ticks, big-endian).
pub fn version_component(at: SystemTime) -> Vec<u8> {
    let millis = at
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    let ticks = (millis * 4096 / 1000) as u64;
    let bytes = ticks.to_be_bytes();
    let mut out = Vec::with_capacity(1 + VERSION_TICK_BYTES);
    out.push(VERSION_MARKER);
    out.extend_from_slice(&bytes[8 - VERSION_TICK_BYTES..]);
    out
}

/// Build a segment component for `number`.
pub fn segment_component(number: u64) -> Vec<u8> {
    let bytes = number.to_be_bytes();
    let skip = bytes.iter().take_while(|b| **b == 0).count();
    let mut out = Vec::with_capacity(1 + 8 - skip);
    out.push(SEGMENT_MARKER);
    out.extend_from_slice(&bytes[skip..]);
    out
}

fn is_version_component(c: &[u8]) -> bool {
    c.len() > 1 && c[0] == VERSION_MARKER
}

fn is_segment_component(c: &[u8]) -> bool {
    !c.is_empty() && c[0] == SEGMENT_MARKER && c.len() <= 9
}

fn parse_version(c: &[u8]) -> Option<SystemTime> {
    if !is_version_component(c) || c.len() > 9 {
        return None;
    }
    let ticks = be_number(&c[1..]);
    let millis = ticks.saturating_mul(1000) / 4096;
    Some(UNIX_EPOCH + std::time::Duration::from_millis(millis))
}

fn be_number(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b))
}

fn is_unreserved(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_' | b'~')
}

fn escape(component: &[u8], out: &mut String) {
    if component.iter().all(|b| *b == b'.') {
        out.push_str("...");
    }
    for b in component {
        if is_unreserved(*b) {
            out.push(*b as char);
        } else {
            out.push_str(&format!("%{:02X}", b));
        }
    }
}

fn unescape(raw: &str) -> Result<Vec<u8>, NameError> {
    let bytes = raw.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = raw
                .get(i + 1..i + 3)
                .ok_or_else(|| NameError::BadEscape(raw.to_string()))?;
            let value =
                u8::from_str_radix(hex, 16).map_err(|_| NameError::BadEscape(raw.to_string()))?;
            out.push(value);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }

    if out.iter().all(|b| *b == b'.') {
        if out.len() < 3 {
            return Err(NameError::BadComponent(raw.to_string()));
        }
        out.truncate(out.len() - 3);
    }
    Ok(out)
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.components.is_empty() {
            return f.write_str("/");
        }
        let mut out = String::new();
        for c in &self.components {
            out.push('/');
            escape(c, &mut out);
        }
        f.write_str(&out)
    }
}

impl FromStr for Name {
    type Err = NameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Name {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Name {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Name::parse(&s).map_err(serde::de::Error::custom)
    }
}

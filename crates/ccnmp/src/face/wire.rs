// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Forwarder face wire protocol.
//!
//! Simple length-prefixed JSON protocol between a CCNMP process and its
//! local forwarder.
//!
//! Wire format:
//! ```text
//! +----------------+-------------------+
//! | Length (4B BE) | JSON payload      |
//! +----------------+-------------------+
//! ```
//!
//! Names travel in URI form, payloads as byte arrays.

use crate::name::Name;
use crate::packet::{Data, Interest};
use serde::{Deserialize, Serialize};

/// Face protocol message types.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum FaceMessage {
    /// Interest, in either direction.
    #[serde(rename = "interest")]
    Interest(Interest),

    /// Content object, in either direction.
    #[serde(rename = "data")]
    Data(Data),

    /// Ask the forwarder to route interests under `prefix` to us.
    #[serde(rename = "register_prefix")]
    RegisterPrefix { prefix: Name },

    /// Withdraw a prefix registration.
    #[serde(rename = "unregister_prefix")]
    UnregisterPrefix { prefix: Name },

    /// Error report from the forwarder.
    #[serde(rename = "error")]
    Error { code: u32, message: String },
}

// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! CCNMP: mobility for content-centric networks
//!
//! Lets a publisher keep answering for its home namespace after it moves.
//! A stationary home agent intercepts interests for the home namespace,
//! buffers them (or relays them immediately), and once the mobile node
//! announces its current namespace, fetches the content from there and
//! republishes it under the name that was originally asked for.
//!
//! # Features
//!
//! - **Command codec**: mobility commands carried inside interest names
//! - **Namespace registry**: registration, buffering and current location
//! - **Relay engine**: bounded pool copying redirected content back
//! - **Mobile node**: registration, periodic redirects, file serving
//! - **Faces**: TCP face to a local forwarder, in-memory face for tests
//!
//! # Quick Start
//!
//! ```bash
//! # Home agent answering for everything routed to it
//! ccnmp-home-agent --forwarder 127.0.0.1:9695 --prefix /
//!
//! # Mobile node serving ./files for /home/alice, currently reachable under /cafe/alice
//! ccnmp-mobile-node ./files /home/alice 30 /cafe/alice
//! ```
//!
//! # Configuration File
//!
//! ```json
//! {
//!   "forwarder": "127.0.0.1:9695",
//!   "prefixes": ["/home"],
//!   "relay_workers": 8,
//!   "flush_mode": "parallel"
//! }
//! ```

pub mod agent;
pub mod config;
pub mod face;
pub mod mobile;
pub mod name;
pub mod packet;
pub mod protocol;

pub use agent::{AgentError, Disposition, HomeAgent, NamespaceRegistry, RelayEngine, RelayError};
pub use config::{ConfigError, FlushMode, HomeAgentConfig, MobileNodeConfig};
pub use face::{ContentHandler, Face, FaceError, InterestHandler, MemoryFace, TcpFace};
pub use mobile::{MobileError, MobileNode, Phase};
pub use name::{Name, NameError};
pub use packet::{Data, Interest, Selectors};
pub use protocol::{Ack, Command, CommandError, CommandInterest};

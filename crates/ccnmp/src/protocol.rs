// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! CCNMP command wire format.
//!
//! Commands travel as ordinary interests whose name embeds the command:
//!
//! ```text
//! <namespace>/ccnmp/<command>[/<argument components...>]/<timestamp>
//! ```
//!
//! | Token | Command           | Arguments                       |
//! |-------|-------------------|---------------------------------|
//! | `rg`  | register          | `true` / `false` (forward ASAP) |
//! | `rd`  | redirect          | remote namespace components     |
//! | `rr`  | register+redirect | remote namespace components     |
//! | `rm`  | remove            | none                            |
//!
//! The trailing timestamp keeps caches from answering a command; it is
//! dropped before the arguments are interpreted. Responses are published
//! under the exact name of the command interest with an `ACK` or `ERR`
//! payload.

use crate::name::Name;
use crate::packet::{Data, Interest};
use std::time::SystemTime;
use thiserror::Error;

/// Root token introducing a command.
pub const COMMAND_ROOT: &[u8] = b"ccnmp";

/// Payload of a successful acknowledgement.
pub const RESPONSE_SUCCESS: &[u8] = b"ACK";

/// Payload of a failed acknowledgement.
pub const RESPONSE_FAILURE: &[u8] = b"ERR";

/// Literal argument enabling forward-ASAP on register.
const ARG_TRUE: &[u8] = b"true";
const ARG_FALSE: &[u8] = b"false";

/// Command decoding errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("malformed command interest: {0}")]
    Malformed(Name),

    #[error("unknown command {token:?} for namespace {namespace}")]
    UnknownCommand { namespace: Name, token: String },
}

/// Mobility commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Register,
    Redirect,
    RegisterRedirect,
    Remove,
}

impl Command {
    /// Wire token.
    pub fn token(self) -> &'static str {
        match self {
            Self::Register => "rg",
            Self::Redirect => "rd",
            Self::RegisterRedirect => "rr",
            Self::Remove => "rm",
        }
    }

    /// Decode a wire token.
    pub fn from_token(token: &[u8]) -> Option<Self> {
        match token {
            b"rg" => Some(Self::Register),
            b"rd" => Some(Self::Redirect),
            b"rr" => Some(Self::RegisterRedirect),
            b"rm" => Some(Self::Remove),
            _ => None,
        }
    }
}

/// A decoded command interest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandInterest {
    /// Namespace the command applies to.
    pub namespace: Name,
    /// The command itself.
    pub command: Command,
    /// Argument components, timestamp removed.
    pub arguments: Name,
}

impl CommandInterest {
    /// Decode the command embedded in `name`.
    ///
    /// Returns `Ok(None)` when the name carries no root token, i.e. it is
    /// ordinary data traffic.
    pub fn parse(name: &Name) -> Result<Option<Self>, CommandError> {
        let Some(idx) = name.position(COMMAND_ROOT) else {
            return Ok(None);
        };

        // root token, command token and timestamp are all mandatory
        if name.len() < idx + 3 {
            return Err(CommandError::Malformed(name.clone()));
        }

        let namespace = name.cut(idx);
        let token = name.component(idx + 1).unwrap_or_default();
        let command = Command::from_token(token).ok_or_else(|| CommandError::UnknownCommand {
            namespace: namespace.clone(),
            token: String::from_utf8_lossy(token).into_owned(),
        })?;

        let arguments = name.cut(name.len() - 1).suffix(idx + 2);

        Ok(Some(Self {
            namespace,
            command,
            arguments,
        }))
    }

    /// Forward-ASAP flag of a register command. Anything but `true` is false.
    pub fn forward_asap(&self) -> bool {
        self.arguments.len() == 1 && self.arguments.component(0) == Some(ARG_TRUE)
    }

    /// Remote namespace of a redirect command.
    pub fn remote(&self) -> &Name {
        &self.arguments
    }
}

/// Build `<namespace>/ccnmp/<command>/<arguments...>/<timestamp>`.
pub fn command_name(namespace: &Name, command: Command, arguments: &Name, at: SystemTime) -> Name {
    namespace
        .child(COMMAND_ROOT)
        .child(command.token())
        .append(arguments)
        .versioned(at)
}

/// Register command for `home`.
pub fn register_name(home: &Name, forward_asap: bool, at: SystemTime) -> Name {
    let flag = if forward_asap { ARG_TRUE } else { ARG_FALSE };
    command_name(home, Command::Register, &Name::from_components([flag]), at)
}

/// Redirect command mapping `home` onto `remote`.
pub fn redirect_name(home: &Name, remote: &Name, at: SystemTime) -> Name {
    command_name(home, Command::Redirect, remote, at)
}

/// Remove command for `home`.
pub fn remove_name(home: &Name, at: SystemTime) -> Name {
    command_name(home, Command::Remove, &Name::root(), at)
}

/// Command acknowledgement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ack {
    Success,
    Failure,
}

impl Ack {
    pub fn payload(self) -> &'static [u8] {
        match self {
            Self::Success => RESPONSE_SUCCESS,
            Self::Failure => RESPONSE_FAILURE,
        }
    }

    /// Decode a response payload.
    pub fn from_payload(payload: &[u8]) -> Option<Self> {
        match payload {
            RESPONSE_SUCCESS => Some(Self::Success),
            RESPONSE_FAILURE => Some(Self::Failure),
            _ => None,
        }
    }

    /// Response named identically to `interest`, so it satisfies exactly it.
    pub fn response_to(self, interest: &Interest) -> Data {
        Data::new(interest.name().clone(), self.payload())
    }
}

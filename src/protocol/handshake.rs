//! Name-exchange handshake carried on management packets.
//!
//! The sub-protocol is two text commands:
//!
//! ```text
//! setup               ask the peer to report its name
//! setup_resp <name>   deliver a name; the receiver adopts it as its display name
//! ```
//!
//! Per session the handshake moves `Unnamed -> Named` when a `setup_resp`
//! arrives. `setup` never changes state; it only produces a reply when a
//! name is already known. There is no timeout: a peer that never answers
//! leaves the session unnamed.

use std::fmt;
use std::sync::{PoisonError, RwLock};

use tracing::{debug, instrument};

use crate::core::packet::{Packet, Payload};
use crate::error::{constants, ProtocolError, Result};

const SETUP: &str = "setup";
const SETUP_RESP: &str = "setup_resp";

/// A parsed management command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManagementCommand {
    Setup,
    SetupResp(String),
}

impl ManagementCommand {
    /// Parse a space-delimited command line.
    ///
    /// The name of `setup_resp` is everything after the first space, trimmed.
    ///
    /// # Errors
    /// Returns `ProtocolError::Handshake` for empty, unknown or incomplete commands.
    pub fn parse(line: &str) -> Result<Self> {
        let line = line.trim();
        let (verb, rest) = match line.split_once(' ') {
            Some((verb, rest)) => (verb, rest.trim()),
            None => (line, ""),
        };

        match verb {
            "" => Err(ProtocolError::Handshake(constants::ERR_EMPTY_COMMAND.into())),
            SETUP if rest.is_empty() => Ok(ManagementCommand::Setup),
            SETUP => Err(ProtocolError::Handshake(format!(
                "setup takes no arguments, got '{rest}'"
            ))),
            SETUP_RESP if rest.is_empty() => {
                Err(ProtocolError::Handshake(constants::ERR_MISSING_NAME.into()))
            }
            SETUP_RESP => Ok(ManagementCommand::SetupResp(rest.to_string())),
            other => Err(ProtocolError::Handshake(format!(
                "unknown management command '{other}'"
            ))),
        }
    }

    /// Parse the payload of a management packet.
    pub fn from_payload(payload: &Payload) -> Result<Self> {
        match payload {
            Payload::Text(line) => Self::parse(line),
            Payload::Binary(_) => Err(ProtocolError::Handshake(
                constants::ERR_BINARY_COMMAND.into(),
            )),
        }
    }

    /// Wrap the command in a management packet.
    pub fn into_packet(self) -> Packet {
        Packet::management(self.to_string())
    }
}

impl fmt::Display for ManagementCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ManagementCommand::Setup => f.write_str(SETUP),
            ManagementCommand::SetupResp(name) => write!(f, "{SETUP_RESP} {name}"),
        }
    }
}

/// Handshake progress of one session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeState {
    Unnamed,
    Named(String),
}

/// Per-session display name and the handler for management packets.
#[derive(Debug, Default)]
pub struct NameExchange {
    name: RwLock<Option<String>>,
}

impl NameExchange {
    /// Start with an optional locally configured name. Blank names count as unset.
    pub fn new(name: Option<String>) -> Self {
        Self {
            name: RwLock::new(name.filter(|n| !n.trim().is_empty())),
        }
    }

    pub fn name(&self) -> Option<String> {
        self.name
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Set the name locally. An empty string clears it.
    pub fn set_name(&self, name: impl Into<String>) {
        let name = name.into();
        let mut slot = self.name.write().unwrap_or_else(PoisonError::into_inner);
        *slot = if name.trim().is_empty() {
            None
        } else {
            Some(name)
        };
    }

    pub fn state(&self) -> HandshakeState {
        match self.name() {
            Some(name) => HandshakeState::Named(name),
            None => HandshakeState::Unnamed,
        }
    }

    /// The packet that asks the peer for its name.
    pub fn request() -> Packet {
        ManagementCommand::Setup.into_packet()
    }

    /// Handle one management packet, returning the reply to send, if any.
    ///
    /// # Errors
    /// Returns `ProtocolError::Handshake` when the payload is not a known command;
    /// the display name is left untouched in that case.
    #[instrument(skip(self, packet), level = "debug")]
    pub fn handle(&self, packet: &Packet) -> Result<Option<Packet>> {
        match ManagementCommand::from_payload(packet.payload())? {
            ManagementCommand::Setup => match self.name() {
                Some(name) => {
                    debug!(name = %name, "answering setup");
                    Ok(Some(ManagementCommand::SetupResp(name).into_packet()))
                }
                None => {
                    debug!("setup received but no display name is set");
                    Ok(None)
                }
            },
            ManagementCommand::SetupResp(name) => {
                debug!(name = %name, "display name learned from peer");
                self.set_name(name);
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn parses_commands() {
        assert_eq!(ManagementCommand::parse("setup").unwrap(), ManagementCommand::Setup);
        assert_eq!(
            ManagementCommand::parse("setup_resp Alice").unwrap(),
            ManagementCommand::SetupResp("Alice".into())
        );
        assert_eq!(
            ManagementCommand::parse("  setup_resp   Alice Smith ").unwrap(),
            ManagementCommand::SetupResp("Alice Smith".into())
        );
    }

    #[test]
    fn rejects_malformed_commands() {
        for line in ["", "   ", "setup_resp", "setup_resp   ", "hello", "setup now"] {
            assert!(
                matches!(ManagementCommand::parse(line), Err(ProtocolError::Handshake(_))),
                "{line:?} should be rejected"
            );
        }
        assert!(ManagementCommand::from_payload(&Payload::Binary(b"setup".to_vec())).is_err());
    }

    #[test]
    fn display_matches_wire_text() {
        assert_eq!(ManagementCommand::Setup.to_string(), "setup");
        assert_eq!(
            ManagementCommand::SetupResp("Bob".into()).to_string(),
            "setup_resp Bob"
        );
    }

    #[test]
    fn blank_names_are_unset() {
        let exchange = NameExchange::new(Some("  ".into()));
        assert_eq!(exchange.state(), HandshakeState::Unnamed);
        exchange.set_name("Carol");
        assert_eq!(exchange.state(), HandshakeState::Named("Carol".into()));
        exchange.set_name("");
        assert_eq!(exchange.name(), None);
    }
}

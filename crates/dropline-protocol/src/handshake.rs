//! The first message on a connection, validated.

use crate::{ClientEvent, ProtocolError};

/// What a connection asked for in its `init` message.
///
/// Decoding an `init` only checks the JSON shape. Converting it into a
/// `Handshake` enforces the rest: it must be `init`, and it may carry at
/// most one of the two tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Handshake {
    /// No token: create a new game and play as player one.
    Start,
    /// Join an existing game as player two.
    Join(String),
    /// Spectate an existing game.
    Watch(String),
}

impl TryFrom<ClientEvent> for Handshake {
    type Error = ProtocolError;

    fn try_from(event: ClientEvent) -> Result<Self, Self::Error> {
        match event {
            ClientEvent::Init {
                join: None,
                watch: None,
            } => Ok(Self::Start),
            ClientEvent::Init {
                join: Some(token),
                watch: None,
            } => Ok(Self::Join(token)),
            ClientEvent::Init {
                join: None,
                watch: Some(token),
            } => Ok(Self::Watch(token)),
            ClientEvent::Init {
                join: Some(_),
                watch: Some(_),
            } => Err(ProtocolError::InvalidMessage(
                "init may carry either join or watch, not both".into(),
            )),
            ClientEvent::Play { .. } => Err(ProtocolError::InvalidMessage(
                "first message must be init".into(),
            )),
        }
    }
}

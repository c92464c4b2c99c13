//! Core protocol types for Dropline's wire format.
//!
//! Every message on the wire is a flat JSON object with a `type`
//! discriminator:
//!
//! ```text
//! client → server   {"type":"init"}                         start a game
//!                   {"type":"init","join":"<token>"}        join as player 2
//!                   {"type":"init","watch":"<token>"}       spectate
//!                   {"type":"play","column":3}              drop a disc
//!
//! server → client   {"type":"init","join":"…","watch":"…"}  tokens for a new game
//!                   {"type":"play","player":1,"column":3,"row":0}
//!                   {"type":"win","winner":1}
//!                   {"type":"error","message":"…"}
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};

// ---------------------------------------------------------------------------
// Player
// ---------------------------------------------------------------------------

/// One of the two seats at the board.
///
/// `Serialize_repr` writes the discriminant, so `Player::One` is the
/// plain number `1` on the wire, not `"One"`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize_repr, Deserialize_repr,
)]
#[repr(u8)]
pub enum Player {
    /// Moves first. Bound to the connection that started the game.
    One = 1,
    /// Moves second. Bound to the connection that joined the game.
    Two = 2,
}

impl Player {
    /// Returns the opponent.
    pub fn other(self) -> Self {
        match self {
            Self::One => Self::Two,
            Self::Two => Self::One,
        }
    }
}

impl fmt::Display for Player {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}", *self as u8)
    }
}

// ---------------------------------------------------------------------------
// ClientEvent
// ---------------------------------------------------------------------------

/// Messages a client sends to the broker.
///
/// `#[serde(tag = "type")]` produces internally tagged JSON, and
/// `rename_all = "lowercase"` turns `Init` into `"init"`. Keys other than
/// `type` and the variant's own fields are rejected, so a misspelled
/// token key cannot decode as a bare `init`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase", deny_unknown_fields)]
pub enum ClientEvent {
    /// First message on every connection. Absent tokens mean "start a
    /// new game". Missing keys decode as `None`.
    Init {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        join: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        watch: Option<String>,
    },

    /// Drop a disc into `column`.
    ///
    /// Signed so that out-of-range columns like `-1` still decode and are
    /// rejected by the game engine with a readable reason.
    Play { column: i64 },
}

// ---------------------------------------------------------------------------
// ServerEvent
// ---------------------------------------------------------------------------

/// Messages the broker sends to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerEvent {
    /// Sent once to the connection that started a game. The client hands
    /// `join` to the opponent and `watch` to spectators.
    Init { join: String, watch: String },

    /// A move was applied. Broadcast to every participant, and replayed
    /// to late joiners in the original order.
    Play {
        player: Player,
        column: usize,
        row: usize,
    },

    /// The last move won the game. Broadcast to every participant.
    Win { winner: Player },

    /// A rejected move or an unknown token. Sent to one connection only.
    Error { message: String },
}

// =========================================================================
// Tests
// =========================================================================

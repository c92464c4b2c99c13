//! Participant roles.

use std::fmt;

use dropline_protocol::Player;

/// What a connection attached to a session may do.
///
/// Fixed by the handshake and carried explicitly by the connection's
/// task for its whole life.
///
/// ```text
/// init {}          → Starter   (player one, owns the session's lifetime)
/// init {join}      → Joiner    (player two)
/// init {watch}     → Spectator (receive-only)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Created the session. Its disconnect destroys the session.
    Starter,
    /// Joined with the join token.
    Joiner,
    /// Watching with the watch token.
    Spectator,
}

impl Role {
    /// The seat this role plays, or `None` for spectators.
    pub fn player(self) -> Option<Player> {
        match self {
            Self::Starter => Some(Player::One),
            Self::Joiner => Some(Player::Two),
            Self::Spectator => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Starter => "starter",
            Self::Joiner => "joiner",
            Self::Spectator => "spectator",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_player_binds_starter_and_joiner_only() {
        assert_eq!(Role::Starter.player(), Some(Player::One));
        assert_eq!(Role::Joiner.player(), Some(Player::Two));
        assert_eq!(Role::Spectator.player(), None);
    }

    #[test]
    fn test_display_is_lowercase() {
        assert_eq!(Role::Spectator.to_string(), "spectator");
    }
}

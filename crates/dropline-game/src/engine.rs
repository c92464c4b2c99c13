//! The `GameEngine` trait: the seam between the broker and the rules.

use dropline_protocol::Player;

use crate::GameError;

/// One successfully applied move.
///
/// The history of these, in application order, is enough to rebuild the
/// board on a client that attached late.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Move {
    /// Who moved.
    pub player: Player,
    /// The column the disc was dropped into.
    pub column: usize,
    /// The row the disc landed on (0 is the bottom).
    pub row: usize,
}

/// The rules of a two-player, turn-based, column-drop game.
///
/// The broker keeps one engine per session behind a lock and calls
/// [`play`](Self::play) for every move request. Engines are synchronous
/// and must not block.
///
/// `Default` creates a fresh game ready for player one's first move.
pub trait GameEngine: Default + Send + 'static {
    /// Applies a move and returns the row the disc landed on.
    ///
    /// # Errors
    /// Returns a [`GameError`] if the move is illegal. A rejected move
    /// leaves the engine unchanged.
    fn play(&mut self, player: Player, column: i64) -> Result<usize, GameError>;

    /// The winner, once someone has connected four. `None` until then.
    fn winner(&self) -> Option<Player>;

    /// Every applied move, oldest first.
    fn moves(&self) -> &[Move];

    /// Returns `true` when the board is full and nobody won.
    fn is_draw(&self) -> bool;

    /// Returns `true` once no further moves will be accepted.
    fn is_over(&self) -> bool {
        self.winner().is_some() || self.is_draw()
    }
}

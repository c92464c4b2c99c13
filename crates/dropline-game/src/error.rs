//! Error types for game engines.

/// Why an engine refused a move.
///
/// The `Display` text is sent verbatim to the player who made the move,
/// as the `message` of an `error` event.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GameError {
    /// Someone already won, or the board is full.
    #[error("The game is already over.")]
    GameOver,

    /// The submitting player moved last (or player two tried to open).
    #[error("It isn't your turn.")]
    NotYourTurn,

    /// The column index is outside the board.
    #[error("This column doesn't exist.")]
    InvalidColumn,

    /// The column has no empty row left.
    #[error("This slot is full.")]
    ColumnFull,
}

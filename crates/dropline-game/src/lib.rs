//! Game engines for Dropline.
//!
//! The broker never looks inside a board. It submits `(player, column)`
//! to a [`GameEngine`], gets back the landing row or a rejection reason,
//! and replays the engine's move history to late joiners.
//!
//! # Key types
//!
//! - [`GameEngine`]: the trait the broker is generic over
//! - [`Connect4`]: the seven-by-six gravity board
//! - [`Move`]: one applied move, as recorded in the history
//! - [`GameError`]: why a move was rejected

mod connect4;
mod engine;
mod error;

pub use connect4::{COLUMNS, Connect4, ROWS};
pub use engine::{GameEngine, Move};
pub use error::GameError;

//! Connect Four: seven columns, six rows, discs fall to the lowest free row.

use dropline_protocol::Player;

use crate::{GameEngine, GameError, Move};

/// Number of columns on the board.
pub const COLUMNS: usize = 7;

/// Number of rows on the board. Row 0 is the bottom.
pub const ROWS: usize = 6;

/// Discs in a line needed to win.
const CONNECT: usize = 4;

/// Directions checked through the last disc: horizontal, vertical and
/// both diagonals. Each is walked both ways.
const DIRECTIONS: [(isize, isize); 4] = [(1, 0), (0, 1), (1, 1), (1, -1)];

/// A Connect Four game.
///
/// Player one always opens; the players then strictly alternate.
#[derive(Debug, Clone, Default)]
pub struct Connect4 {
    /// `board[column][row]`, row 0 at the bottom.
    board: [[Option<Player>; ROWS]; COLUMNS],
    moves: Vec<Move>,
    winner: Option<Player>,
}

impl Connect4 {
    /// Creates an empty board.
    pub fn new() -> Self {
        Self::default()
    }

    /// The player whose turn it is.
    pub fn next_player(&self) -> Player {
        self.moves
            .last()
            .map_or(Player::One, |last| last.player.other())
    }

    /// The disc at `(column, row)`, if any. Out-of-range cells are empty.
    pub fn cell(&self, column: usize, row: usize) -> Option<Player> {
        self.board
            .get(column)
            .and_then(|col| col.get(row))
            .copied()
            .flatten()
    }

    /// Returns `true` if the disc just placed at `(column, row)` completes
    /// a line of [`CONNECT`] for `player`.
    fn connects(&self, column: usize, row: usize, player: Player) -> bool {
        DIRECTIONS.iter().any(|&(dc, dr)| {
            let line = 1
                + self.run(column, row, dc, dr, player)
                + self.run(column, row, -dc, -dr, player);
            line >= CONNECT
        })
    }

    /// Counts consecutive `player` discs starting next to `(column, row)`
    /// and stepping by `(dc, dr)`.
    fn run(
        &self,
        column: usize,
        row: usize,
        dc: isize,
        dr: isize,
        player: Player,
    ) -> usize {
        let mut count = 0;
        let (mut c, mut r) = (column as isize + dc, row as isize + dr);
        while c >= 0 && r >= 0 {
            if self.cell(c as usize, r as usize) != Some(player) {
                break;
            }
            count += 1;
            c += dc;
            r += dr;
        }
        count
    }
}

impl GameEngine for Connect4 {
    fn play(&mut self, player: Player, column: i64) -> Result<usize, GameError> {
        if self.is_over() {
            return Err(GameError::GameOver);
        }
        if player != self.next_player() {
            return Err(GameError::NotYourTurn);
        }
        let column = usize::try_from(column)
            .ok()
            .filter(|c| *c < COLUMNS)
            .ok_or(GameError::InvalidColumn)?;
        let row = self.board[column]
            .iter()
            .position(Option::is_none)
            .ok_or(GameError::ColumnFull)?;

        self.board[column][row] = Some(player);
        self.moves.push(Move {
            player,
            column,
            row,
        });
        if self.connects(column, row, player) {
            self.winner = Some(player);
        }
        Ok(row)
    }

    fn winner(&self) -> Option<Player> {
        self.winner
    }

    fn moves(&self) -> &[Move] {
        &self.moves
    }

    fn is_draw(&self) -> bool {
        self.winner.is_none() && self.moves.len() == COLUMNS * ROWS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Plays `columns` alternately starting with player one, panicking on
    /// any rejection. Returns the game.
    fn play_all(columns: &[i64]) -> Connect4 {
        let mut game = Connect4::new();
        for &column in columns {
            let player = game.next_player();
            game.play(player, column)
                .unwrap_or_else(|e| panic!("column {column} rejected: {e}"));
        }
        game
    }

    /// Move sequence that fills the board without anyone connecting four.
    const DRAW: [i64; 42] = [
        5, 4, 5, 0, 6, 2, 4, 5, 5, 0, 4, 1, 1, 0, 4, 5, 6, 5, 3, 1, 1, 2, 2,
        6, 2, 6, 6, 3, 6, 2, 0, 3, 0, 3, 3, 4, 3, 1, 4, 2, 1, 0,
    ];

    // =====================================================================
    // play()
    // =====================================================================

    #[test]
    fn test_play_first_disc_lands_on_bottom_row() {
        let mut game = Connect4::new();
        assert_eq!(game.play(Player::One, 3), Ok(0));
        assert_eq!(game.cell(3, 0), Some(Player::One));
    }

    #[test]
    fn test_play_discs_stack_in_a_column() {
        let mut game = Connect4::new();
        assert_eq!(game.play(Player::One, 2), Ok(0));
        assert_eq!(game.play(Player::Two, 2), Ok(1));
        assert_eq!(game.play(Player::One, 2), Ok(2));
    }

    #[test]
    fn test_play_player_two_cannot_open() {
        let mut game = Connect4::new();
        assert_eq!(game.play(Player::Two, 0), Err(GameError::NotYourTurn));
        assert!(game.moves().is_empty());
    }

    #[test]
    fn test_play_same_player_twice_is_rejected() {
        let mut game = Connect4::new();
        game.play(Player::One, 0).unwrap();
        assert_eq!(game.play(Player::One, 1), Err(GameError::NotYourTurn));
    }

    #[test]
    fn test_play_out_of_range_columns_are_rejected() {
        let mut game = Connect4::new();
        assert_eq!(game.play(Player::One, -1), Err(GameError::InvalidColumn));
        assert_eq!(game.play(Player::One, 7), Err(GameError::InvalidColumn));
        assert_eq!(
            game.play(Player::One, i64::MAX),
            Err(GameError::InvalidColumn)
        );
        assert!(game.moves().is_empty());
    }

    #[test]
    fn test_play_full_column_is_rejected_and_state_unchanged() {
        let mut game = play_all(&[0, 0, 0, 0, 0, 0]);
        assert_eq!(game.play(Player::One, 0), Err(GameError::ColumnFull));
        assert_eq!(game.moves().len(), 6);
        // The rejected move doesn't consume the turn.
        assert_eq!(game.next_player(), Player::One);
    }

    #[test]
    fn test_play_records_history_in_order() {
        let game = play_all(&[3, 3, 4]);
        assert_eq!(
            game.moves(),
            &[
                Move { player: Player::One, column: 3, row: 0 },
                Move { player: Player::Two, column: 3, row: 1 },
                Move { player: Player::One, column: 4, row: 0 },
            ]
        );
    }

    // =====================================================================
    // Win detection
    // =====================================================================

    #[test]
    fn test_horizontal_line_wins() {
        let game = play_all(&[0, 0, 1, 1, 2, 2, 3]);
        assert_eq!(game.winner(), Some(Player::One));
    }

    #[test]
    fn test_vertical_line_wins() {
        let game = play_all(&[0, 1, 0, 1, 0, 1, 0]);
        assert_eq!(game.winner(), Some(Player::One));
    }

    #[test]
    fn test_rising_diagonal_wins() {
        let game = play_all(&[0, 1, 1, 2, 2, 3, 2, 3, 3, 6, 3]);
        assert_eq!(game.winner(), Some(Player::One));
    }

    #[test]
    fn test_falling_diagonal_wins() {
        let game = play_all(&[6, 5, 5, 4, 4, 3, 4, 3, 3, 0, 3]);
        assert_eq!(game.winner(), Some(Player::One));
    }

    #[test]
    fn test_player_two_can_win() {
        let game = play_all(&[0, 1, 0, 1, 0, 1, 2, 1]);
        assert_eq!(game.winner(), Some(Player::Two));
    }

    #[test]
    fn test_three_in_a_row_is_not_a_win() {
        let game = play_all(&[0, 0, 1, 1, 2, 2]);
        assert_eq!(game.winner(), None);
        assert!(!game.is_over());
    }

    #[test]
    fn test_play_after_win_is_game_over() {
        let mut game = play_all(&[0, 1, 0, 1, 0, 1, 0]);
        assert_eq!(game.play(Player::Two, 1), Err(GameError::GameOver));
        assert_eq!(game.moves().len(), 7);
    }

    // =====================================================================
    // Draw
    // =====================================================================

    #[test]
    fn test_full_board_without_line_is_draw() {
        let mut game = play_all(&DRAW);
        assert_eq!(game.winner(), None);
        assert!(game.is_draw());
        assert!(game.is_over());
        assert_eq!(game.play(Player::One, 0), Err(GameError::GameOver));
    }

    #[test]
    fn test_error_messages_are_human_readable() {
        assert_eq!(GameError::NotYourTurn.to_string(), "It isn't your turn.");
        assert_eq!(GameError::ColumnFull.to_string(), "This slot is full.");
    }
}

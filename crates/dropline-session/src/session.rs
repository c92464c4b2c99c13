//! A single game session: one engine, the connections attached to it,
//! and the two tokens that address it.
//!
//! # Ordering
//!
//! Every operation that touches the engine or the connected set runs
//! inside one critical section on the session's mutex:
//!
//! ```text
//! play():    engine.play ─→ enqueue `play` (and `win`) to every outbox
//! attach():  snapshot history ─→ enqueue replay to new outbox ─→ insert
//! detach():  remove
//! ```
//!
//! Because each step is an enqueue onto an unbounded channel, nothing in
//! the critical section suspends. Two consequences:
//!
//! - every participant sees moves in the order the engine accepted them;
//! - a connection attaching while a move is being played either finds
//!   that move in its replay or receives it live, never both, never
//!   neither.

use std::collections::HashMap;

use dropline_game::{GameEngine, GameError};
use dropline_protocol::{Player, ServerEvent};
use dropline_transport::ConnectionId;
use parking_lot::Mutex;
use tokio::sync::mpsc;

/// The send half of a connection's outbound queue.
///
/// A writer task on the other end encodes each event and writes it to
/// the socket. Sending never blocks; it only fails once that writer has
/// gone away.
pub type Outbox = mpsc::UnboundedSender<ServerEvent>;

/// What happened when a move was accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayOutcome {
    /// Row the disc landed on.
    pub row: usize,
    /// Set when this move won the game.
    pub winner: Option<Player>,
    /// Set when this move filled the board without a winner.
    pub draw: bool,
}

/// The matchmaking and game-state unit.
///
/// Shared between connection tasks as `Arc<Session<G>>`. The registry
/// holds one strong reference for as long as the starter is connected;
/// joiners and spectators hold theirs only while their own flow runs.
pub struct Session<G: GameEngine> {
    join_token: String,
    watch_token: String,
    state: Mutex<SessionState<G>>,
}

struct SessionState<G> {
    game: G,
    /// Every attached connection's outbox, starter included.
    connected: HashMap<ConnectionId, Outbox>,
}

impl<G: GameEngine> Session<G> {
    /// Creates a session with a fresh engine and the starter attached.
    ///
    /// The starter's `init` event (carrying both tokens) is queued before
    /// the session is visible to anyone else.
    pub(crate) fn new(
        join_token: String,
        watch_token: String,
        starter: ConnectionId,
        outbox: Outbox,
    ) -> Self {
        let _ = outbox.send(ServerEvent::Init {
            join: join_token.clone(),
            watch: watch_token.clone(),
        });

        let mut connected = HashMap::new();
        connected.insert(starter, outbox);

        Self {
            join_token,
            watch_token,
            state: Mutex::new(SessionState {
                game: G::default(),
                connected,
            }),
        }
    }

    /// The token that admits player two.
    pub fn join_token(&self) -> &str {
        &self.join_token
    }

    /// The token that admits spectators.
    pub fn watch_token(&self) -> &str {
        &self.watch_token
    }

    /// Attaches a connection: replays the move history into its outbox,
    /// then registers it for live broadcasts. Returns how many moves were
    /// replayed.
    ///
    /// Attaching an already attached connection replaces its outbox and
    /// replays again.
    pub fn attach(&self, conn_id: ConnectionId, outbox: Outbox) -> usize {
        let mut state = self.state.lock();

        let history = state.game.moves();
        for mv in history {
            let _ = outbox.send(ServerEvent::Play {
                player: mv.player,
                column: mv.column,
                row: mv.row,
            });
        }
        let replayed = history.len();

        state.connected.insert(conn_id, outbox);
        tracing::debug!(
            %conn_id,
            replayed,
            connected = state.connected.len(),
            "connection attached"
        );
        replayed
    }

    /// Detaches a connection so it no longer receives broadcasts.
    ///
    /// Returns `false` if it wasn't attached.
    pub fn detach(&self, conn_id: ConnectionId) -> bool {
        let mut state = self.state.lock();
        let removed = state.connected.remove(&conn_id).is_some();
        if removed {
            tracing::debug!(
                %conn_id,
                connected = state.connected.len(),
                "connection detached"
            );
        }
        removed
    }

    /// Submits a move to the engine.
    ///
    /// On success the `play` event, and a `win` event if the move won,
    /// are queued to every attached connection before the lock is
    /// released.
    ///
    /// # Errors
    /// Returns the engine's [`GameError`] if the move is illegal. Nothing
    /// is broadcast and the engine is unchanged.
    pub fn play(
        &self,
        player: Player,
        column: i64,
    ) -> Result<PlayOutcome, GameError> {
        let mut state = self.state.lock();

        let row = state.game.play(player, column)?;
        // The engine accepted the column, so it is in range.
        let column = column as usize;

        let delivered = fan_out(
            &state.connected,
            &ServerEvent::Play {
                player,
                column,
                row,
            },
        );
        tracing::debug!(%player, column, row, delivered, "move applied");

        let winner = state.game.winner();
        if let Some(winner) = winner {
            fan_out(&state.connected, &ServerEvent::Win { winner });
        }

        Ok(PlayOutcome {
            row,
            winner,
            draw: state.game.is_draw(),
        })
    }

    /// Queues `event` to every attached connection. Returns how many
    /// outboxes accepted it.
    pub fn broadcast(&self, event: &ServerEvent) -> usize {
        fan_out(&self.state.lock().connected, event)
    }

    /// Number of attached connections.
    pub fn connected_count(&self) -> usize {
        self.state.lock().connected.len()
    }

    /// Returns `true` if `conn_id` is attached.
    pub fn is_attached(&self, conn_id: ConnectionId) -> bool {
        self.state.lock().connected.contains_key(&conn_id)
    }

    /// Number of moves applied so far.
    pub fn move_count(&self) -> usize {
        self.state.lock().game.moves().len()
    }
}

/// Delivers one event to every outbox in `connected`.
///
/// Each recipient is independent: a closed outbox (its connection is
/// on the way out) is skipped and the rest still receive the event.
fn fan_out(
    connected: &HashMap<ConnectionId, Outbox>,
    event: &ServerEvent,
) -> usize {
    let mut delivered = 0;
    for (conn_id, outbox) in connected {
        if outbox.send(event.clone()).is_ok() {
            delivered += 1;
        } else {
            tracing::debug!(%conn_id, "outbox closed, event dropped");
        }
    }
    delivered
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    //! These tests drive a `Session<Connect4>` directly through channels,
    //! with no sockets. `try_recv` drains whatever was queued.

    use super::*;
    use dropline_game::Connect4;
    use tokio::sync::mpsc::UnboundedReceiver;

    type Inbox = UnboundedReceiver<ServerEvent>;

    fn cid(id: u64) -> ConnectionId {
        ConnectionId::new(id)
    }

    fn channel() -> (Outbox, Inbox) {
        mpsc::unbounded_channel()
    }

    /// A session with the starter (conn 1) attached and its `init`
    /// already drained.
    fn session() -> (Session<Connect4>, Inbox) {
        let (tx, mut rx) = channel();
        let session =
            Session::new("join".into(), "watch".into(), cid(1), tx);
        assert!(matches!(rx.try_recv(), Ok(ServerEvent::Init { .. })));
        (session, rx)
    }

    fn drain(rx: &mut Inbox) -> Vec<ServerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn play_event(player: Player, column: usize, row: usize) -> ServerEvent {
        ServerEvent::Play {
            player,
            column,
            row,
        }
    }

    // =====================================================================
    // new()
    // =====================================================================

    #[test]
    fn test_new_queues_init_with_both_tokens() {
        let (tx, mut rx) = channel();
        let session: Session<Connect4> =
            Session::new("j".into(), "w".into(), cid(1), tx);

        assert_eq!(
            drain(&mut rx),
            vec![ServerEvent::Init {
                join: "j".into(),
                watch: "w".into()
            }]
        );
        assert_eq!(session.connected_count(), 1);
        assert!(session.is_attached(cid(1)));
    }

    // =====================================================================
    // play()
    // =====================================================================

    #[test]
    fn test_play_broadcasts_to_every_attached_connection() {
        let (session, mut starter) = session();
        let (tx, mut joiner) = channel();
        session.attach(cid(2), tx);

        let outcome = session.play(Player::One, 3).expect("legal move");

        assert_eq!(outcome.row, 0);
        assert_eq!(outcome.winner, None);
        assert_eq!(drain(&mut starter), vec![play_event(Player::One, 3, 0)]);
        assert_eq!(drain(&mut joiner), vec![play_event(Player::One, 3, 0)]);
    }

    #[test]
    fn test_play_illegal_move_broadcasts_nothing() {
        let (session, mut starter) = session();
        let (tx, mut joiner) = channel();
        session.attach(cid(2), tx);

        let result = session.play(Player::Two, 0);

        assert_eq!(result, Err(GameError::NotYourTurn));
        assert!(drain(&mut starter).is_empty());
        assert!(drain(&mut joiner).is_empty());
        assert_eq!(session.move_count(), 0);
    }

    #[test]
    fn test_play_winning_move_broadcasts_play_then_win() {
        let (session, mut starter) = session();
        let (tx, mut spectator) = channel();
        session.attach(cid(3), tx);

        for (player, column) in [
            (Player::One, 0),
            (Player::Two, 1),
            (Player::One, 0),
            (Player::Two, 1),
            (Player::One, 0),
            (Player::Two, 1),
        ] {
            session.play(player, column).unwrap();
        }
        drain(&mut starter);
        drain(&mut spectator);

        let outcome = session.play(Player::One, 0).unwrap();
        assert_eq!(outcome.winner, Some(Player::One));

        let expected = vec![
            play_event(Player::One, 0, 3),
            ServerEvent::Win {
                winner: Player::One,
            },
        ];
        assert_eq!(drain(&mut starter), expected);
        assert_eq!(drain(&mut spectator), expected);

        // Nothing more is accepted.
        assert_eq!(session.play(Player::Two, 1), Err(GameError::GameOver));
    }

    #[test]
    fn test_play_skips_closed_outbox_and_still_delivers_to_others() {
        let (session, mut starter) = session();
        let (tx, rx) = channel();
        session.attach(cid(2), tx);
        drop(rx); // the joiner's writer is gone

        let result = session.play(Player::One, 4);

        assert!(result.is_ok());
        assert_eq!(drain(&mut starter), vec![play_event(Player::One, 4, 0)]);
    }

    // =====================================================================
    // attach() / replay
    // =====================================================================

    #[test]
    fn test_attach_replays_history_in_order_then_goes_live() {
        let (session, _starter) = session();
        session.play(Player::One, 3).unwrap();
        session.play(Player::Two, 3).unwrap();
        session.play(Player::One, 5).unwrap();

        let (tx, mut late) = channel();
        let replayed = session.attach(cid(9), tx);

        assert_eq!(replayed, 3);
        assert_eq!(
            drain(&mut late),
            vec![
                play_event(Player::One, 3, 0),
                play_event(Player::Two, 3, 1),
                play_event(Player::One, 5, 0),
            ]
        );

        session.play(Player::Two, 6).unwrap();
        assert_eq!(drain(&mut late), vec![play_event(Player::Two, 6, 0)]);
    }

    #[test]
    fn test_attach_to_fresh_session_replays_nothing() {
        let (session, _starter) = session();
        let (tx, mut rx) = channel();

        assert_eq!(session.attach(cid(2), tx), 0);
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn test_attach_concurrent_with_moves_never_duplicates_or_skips() {
        // Moves and attaches race from different threads. Whatever the
        // interleaving, each late connection must see exactly the full
        // sequence once: replay prefix + live suffix.
        use std::sync::Arc;

        let (session, _starter) = session();
        let session = Arc::new(session);
        let columns: Vec<i64> = (0..20).map(|i| (i % 7) as i64).collect();

        let mover = {
            let session = Arc::clone(&session);
            let columns = columns.clone();
            std::thread::spawn(move || {
                let mut player = Player::One;
                for column in columns {
                    session.play(player, column).unwrap();
                    player = player.other();
                }
            })
        };

        let mut inboxes = Vec::new();
        for id in 10..30 {
            let (tx, rx) = channel();
            session.attach(cid(id), tx);
            inboxes.push(rx);
        }
        mover.join().unwrap();

        let (tx, mut reference) = channel();
        session.attach(cid(99), tx);
        let full = drain(&mut reference);
        assert_eq!(full.len(), 20);

        for mut rx in inboxes {
            assert_eq!(drain(&mut rx), full);
        }
    }

    // =====================================================================
    // detach() / broadcast()
    // =====================================================================

    #[test]
    fn test_detach_stops_broadcasts() {
        let (session, _starter) = session();
        let (tx, mut rx) = channel();
        session.attach(cid(2), tx);

        assert!(session.detach(cid(2)));
        assert!(!session.detach(cid(2)), "second detach is a no-op");

        session.play(Player::One, 0).unwrap();
        assert!(drain(&mut rx).is_empty());
        assert_eq!(session.connected_count(), 1);
    }

    #[test]
    fn test_broadcast_counts_live_recipients() {
        let (session, mut starter) = session();
        let (tx, rx) = channel();
        session.attach(cid(2), tx);
        drop(rx);

        let event = ServerEvent::Error {
            message: "hello".into(),
        };
        assert_eq!(session.broadcast(&event), 1);
        assert_eq!(drain(&mut starter), vec![event]);
    }
}

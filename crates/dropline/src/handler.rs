//! Per-connection handler: handshake, role dispatch, and the turn pipeline.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Receive `init` → classify as start / join / watch
//!   2. Start: create a session. Join/watch: look the token up, attach
//!      and replay the history.
//!   3. Players: loop over `play` messages until close. Spectators: wait
//!      for close.
//!   4. Detach (and destroy the session, for the starter), flush the
//!      outbox, close the socket.
//!
//! Outgoing events never go straight to the socket once a connection is
//! attached. They are queued on its [`Outbox`] and written by a separate
//! writer task, so a slow peer never stalls a broadcast.

use std::sync::Arc;

use dropline_game::GameEngine;
use dropline_protocol::{
    ClientEvent, Codec, Handshake, Player, ProtocolError, ServerEvent,
};
use dropline_session::{Outbox, Role, Session, SessionRegistry};
use dropline_transport::{Connection, ConnectionId, WebSocketConnection};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::server::ServerState;
use crate::DroplineError;

/// Drop guard that takes a connection out of its session when the
/// handler exits, whatever the cause. For the starter it also destroys
/// the session, so neither token resolves any more.
///
/// Cleanup only touches non-async locks, so it runs inline in `drop`.
struct AttachGuard<'a, G: GameEngine> {
    registry: &'a SessionRegistry<G>,
    session: &'a Session<G>,
    conn_id: ConnectionId,
    role: Role,
}

impl<G: GameEngine> Drop for AttachGuard<'_, G> {
    fn drop(&mut self) {
        if self.role == Role::Starter {
            self.registry.destroy(self.session);
        }
        self.session.detach(self.conn_id);
        tracing::info!(
            conn_id = %self.conn_id,
            role = %self.role,
            "left session"
        );
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<G, C>(
    conn: WebSocketConnection,
    state: Arc<ServerState<G, C>>,
) -> Result<(), DroplineError>
where
    G: GameEngine,
    C: Codec,
{
    let conn = Arc::new(conn);
    let conn_id = conn.id();
    tracing::debug!(%conn_id, "handling new connection");

    // --- Step 1: Handshake ---
    let handshake = match read_handshake(&conn, &state).await {
        Ok(handshake) => handshake,
        Err(e) => {
            let _ = conn.close().await;
            return Err(e);
        }
    };

    // --- Step 2: Resolve the session ---
    let (role, session, outbox, writer) = match handshake {
        Handshake::Start => {
            let (outbox, writer) = open_outbox(&conn, &state);
            let session = state.registry.create(conn_id, outbox.clone());
            (Role::Starter, session, outbox, writer)
        }
        Handshake::Join(token) => {
            let session =
                lookup(&conn, &state, Role::Joiner, &token).await?;
            let (outbox, writer) = open_outbox(&conn, &state);
            session.attach(conn_id, outbox.clone());
            (Role::Joiner, session, outbox, writer)
        }
        Handshake::Watch(token) => {
            let session =
                lookup(&conn, &state, Role::Spectator, &token).await?;
            let (outbox, writer) = open_outbox(&conn, &state);
            session.attach(conn_id, outbox.clone());
            (Role::Spectator, session, outbox, writer)
        }
    };

    let guard = AttachGuard {
        registry: &state.registry,
        session: &session,
        conn_id,
        role,
    };
    tracing::info!(%conn_id, %role, "joined session");

    // --- Step 3: Participate ---
    let result = match role.player() {
        Some(player) => {
            turn_pipeline(&conn, &state, &session, player, &outbox).await
        }
        None => {
            wait_for_close(&conn).await;
            Ok(())
        }
    };

    // --- Step 4: Leave ---
    drop(guard);
    drop(outbox);
    flush(&conn, writer, &state).await;
    let _ = conn.close().await;

    result
}

/// Receives the first message and classifies it.
async fn read_handshake<G, C>(
    conn: &WebSocketConnection,
    state: &ServerState<G, C>,
) -> Result<Handshake, DroplineError>
where
    G: GameEngine,
    C: Codec,
{
    let data = match tokio::time::timeout(
        state.config.handshake_timeout,
        conn.recv(),
    )
    .await
    {
        Ok(Ok(Some(data))) => data,
        Ok(Ok(None)) => {
            return Err(ProtocolError::InvalidMessage(
                "connection closed before init".into(),
            )
            .into());
        }
        Ok(Err(e)) => return Err(DroplineError::Transport(e)),
        Err(_) => {
            return Err(ProtocolError::InvalidMessage(
                "init timed out".into(),
            )
            .into());
        }
    };

    let event: ClientEvent = state.codec.decode(&data)?;
    Ok(Handshake::try_from(event)?)
}

/// Resolves a join or watch token.
///
/// An unknown token gets an `error` event written straight to the socket,
/// the connection is closed, and the lookup error is returned.
async fn lookup<G, C>(
    conn: &WebSocketConnection,
    state: &ServerState<G, C>,
    role: Role,
    token: &str,
) -> Result<Arc<Session<G>>, DroplineError>
where
    G: GameEngine,
    C: Codec,
{
    let found = match role {
        Role::Spectator => state.registry.lookup_by_watch(token),
        _ => state.registry.lookup_by_join(token),
    };

    match found {
        Ok(session) => Ok(session),
        Err(e) => {
            tracing::info!(conn_id = %conn.id(), %role, "unknown token");
            tracing::debug!(conn_id = %conn.id(), token, "rejected token");
            let bytes = state.codec.encode(&ServerEvent::Error {
                message: e.to_string(),
            })?;
            conn.send(&bytes).await?;
            let _ = conn.close().await;
            Err(e.into())
        }
    }
}

/// Creates the connection's outbox and spawns the writer task that
/// drains it into the socket.
///
/// The writer stops when every sender is gone or a write fails. After a
/// failed write the receiver is dropped, so later enqueues fail and the
/// session skips this connection.
fn open_outbox<G, C>(
    conn: &Arc<WebSocketConnection>,
    state: &Arc<ServerState<G, C>>,
) -> (Outbox, JoinHandle<()>)
where
    G: GameEngine,
    C: Codec,
{
    let (outbox, mut queue) = mpsc::unbounded_channel::<ServerEvent>();
    let conn = Arc::clone(conn);
    let state = Arc::clone(state);

    let writer = tokio::spawn(async move {
        let conn_id = conn.id();
        while let Some(event) = queue.recv().await {
            let bytes = match state.codec.encode(&event) {
                Ok(bytes) => bytes,
                Err(e) => {
                    tracing::warn!(
                        %conn_id,
                        error = %e,
                        "failed to encode event"
                    );
                    continue;
                }
            };
            if let Err(e) = conn.send(&bytes).await {
                tracing::debug!(
                    %conn_id,
                    error = %e,
                    "send failed, writer stopping"
                );
                break;
            }
        }
    });

    (outbox, writer)
}

/// Reads `play` messages and submits them to the engine until the
/// connection closes.
///
/// Accepted moves are broadcast by the session. A rejected move produces
/// an `error` event for this connection only. Anything other than a
/// well-formed `play` is a protocol error and ends the connection.
async fn turn_pipeline<G, C>(
    conn: &WebSocketConnection,
    state: &ServerState<G, C>,
    session: &Session<G>,
    player: Player,
    outbox: &Outbox,
) -> Result<(), DroplineError>
where
    G: GameEngine,
    C: Codec,
{
    let conn_id = conn.id();

    loop {
        let data = match conn.recv().await {
            Ok(Some(data)) => data,
            Ok(None) => {
                tracing::debug!(%conn_id, %player, "connection closed cleanly");
                return Ok(());
            }
            Err(e) => {
                tracing::debug!(%conn_id, %player, error = %e, "recv error");
                return Ok(());
            }
        };

        let column = match state.codec.decode::<ClientEvent>(&data)? {
            ClientEvent::Play { column } => column,
            ClientEvent::Init { .. } => {
                return Err(ProtocolError::InvalidMessage(
                    "expected play".into(),
                )
                .into());
            }
        };

        match session.play(player, column) {
            Ok(outcome) => {
                if let Some(winner) = outcome.winner {
                    tracing::info!(%conn_id, %winner, "game won");
                } else if outcome.draw {
                    tracing::info!(%conn_id, "game drawn");
                }
            }
            Err(e) => {
                tracing::debug!(
                    %conn_id,
                    %player,
                    column,
                    reason = %e,
                    "move rejected"
                );
                let _ = outbox.send(ServerEvent::Error {
                    message: e.to_string(),
                });
            }
        }
    }
}

/// Ignores everything a spectator sends until the connection closes.
async fn wait_for_close(conn: &WebSocketConnection) {
    loop {
        match conn.recv().await {
            Ok(Some(_)) => {
                tracing::debug!(
                    conn_id = %conn.id(),
                    "ignoring spectator message"
                );
            }
            Ok(None) => return,
            Err(e) => {
                tracing::debug!(conn_id = %conn.id(), error = %e, "recv error");
                return;
            }
        }
    }
}

/// Gives the writer `flush_timeout` to write what is still queued, then
/// stops it.
async fn flush<G, C>(
    conn: &WebSocketConnection,
    mut writer: JoinHandle<()>,
    state: &ServerState<G, C>,
) where
    G: GameEngine,
    C: Codec,
{
    if tokio::time::timeout(state.config.flush_timeout, &mut writer)
        .await
        .is_err()
    {
        tracing::debug!(conn_id = %conn.id(), "outbox not drained in time");
        writer.abort();
    }
}

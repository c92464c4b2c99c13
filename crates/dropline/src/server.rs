//! `DroplineServer` builder and server loop.
//!
//! This is the entry point for running the broker. It binds the
//! transport, owns the shared [`ServerState`], and spawns one handler
//! task per accepted connection.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use dropline_game::GameEngine;
use dropline_protocol::{Codec, JsonCodec};
use dropline_session::SessionRegistry;
use dropline_transport::{
    FrameKind, PendingWebSocket, Transport, Upgrade, WebSocketTransport,
};
use tokio::task::JoinSet;

use crate::handler::handle_connection;
use crate::{DroplineError, ServerConfig};

/// Delay after the first failed accept.
const ACCEPT_BACKOFF_INITIAL: Duration = Duration::from_millis(10);
/// Upper bound on the delay between failed accepts.
const ACCEPT_BACKOFF_MAX: Duration = Duration::from_secs(1);

/// Shared server state passed to each connection handler task.
///
/// Wrapped in `Arc` so it can be cheaply cloned across tasks. The
/// registry locks internally, so nothing here needs an outer lock.
pub(crate) struct ServerState<G: GameEngine, C: Codec> {
    pub(crate) registry: SessionRegistry<G>,
    pub(crate) codec: C,
    pub(crate) config: ServerConfig,
}

/// Builder for configuring and starting a Dropline server.
///
/// # Example
///
/// ```rust,ignore
/// use dropline::prelude::*;
///
/// let server = DroplineServerBuilder::new()
///     .bind("127.0.0.1:0")
///     .build::<Connect4>()
///     .await?;
/// server.run().await
/// ```
pub struct DroplineServerBuilder {
    config: ServerConfig,
    bind_addr: Option<String>,
    frame_kind: FrameKind,
}

impl DroplineServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
            bind_addr: None,
            frame_kind: FrameKind::default(),
        }
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Binds to `addr` instead of the configured `host:port`.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = Some(addr.to_string());
        self
    }

    /// Sets how long a new connection may take to finish the WebSocket
    /// upgrade, and then again to send `init`.
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.config.handshake_timeout = timeout;
        self
    }

    /// Sets how long shutdown waits for in-flight connections.
    pub fn shutdown_grace(mut self, grace: Duration) -> Self {
        self.config.shutdown_grace = grace;
        self
    }

    /// Sets the frame type outgoing events are written as.
    pub fn frame_kind(mut self, frame_kind: FrameKind) -> Self {
        self.frame_kind = frame_kind;
        self
    }

    /// Binds the listener and builds the server.
    ///
    /// Uses `JsonCodec` and `WebSocketTransport`.
    ///
    /// # Errors
    /// [`DroplineError::Transport`] if the address cannot be bound.
    pub async fn build<G: GameEngine>(
        self,
    ) -> Result<DroplineServer<G, JsonCodec>, DroplineError> {
        let addr = self
            .bind_addr
            .unwrap_or_else(|| self.config.bind_addr());
        let transport = WebSocketTransport::bind(&addr)
            .await?
            .with_frame_kind(self.frame_kind);

        let state = Arc::new(ServerState {
            registry: SessionRegistry::new(),
            codec: JsonCodec,
            config: self.config,
        });

        Ok(DroplineServer { transport, state })
    }
}

impl Default for DroplineServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Dropline server.
///
/// Call [`run()`](Self::run) or [`run_until()`](Self::run_until) to start
/// accepting connections.
pub struct DroplineServer<G: GameEngine, C: Codec> {
    transport: WebSocketTransport,
    state: Arc<ServerState<G, C>>,
}

impl<G, C> DroplineServer<G, C>
where
    G: GameEngine,
    C: Codec,
{
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.transport.local_addr()
    }

    /// Runs the accept loop until the process is terminated.
    pub async fn run(self) -> Result<(), DroplineError> {
        self.run_until(std::future::pending()).await
    }

    /// Runs the accept loop until `shutdown` resolves.
    ///
    /// On shutdown the listener is closed first, so no new connection is
    /// accepted. In-flight connections then get `shutdown_grace` to
    /// finish; whatever is left is aborted, and its session cleanup still
    /// runs before this returns.
    ///
    /// # Errors
    /// Returns an error only if closing the listener fails. Errors from
    /// individual connections are logged and never end the loop.
    pub async fn run_until<F>(
        mut self,
        shutdown: F,
    ) -> Result<(), DroplineError>
    where
        F: Future<Output = ()>,
    {
        tracing::info!(
            addr = ?self.local_addr().ok(),
            "Dropline server running"
        );

        let mut connections = JoinSet::new();
        tokio::pin!(shutdown);

        let mut backoff = AcceptBackoff::new();

        loop {
            tokio::select! {
                () = &mut shutdown => {
                    tracing::info!("shutdown requested");
                    break;
                }
                accepted = self.transport.accept() => match accepted {
                    Ok(pending) => {
                        backoff.reset();
                        let state = Arc::clone(&self.state);
                        connections.spawn(serve(pending, state));
                    }
                    Err(e) => {
                        let delay = backoff.next_delay();
                        tracing::error!(
                            error = %e,
                            ?delay,
                            "accept failed"
                        );
                        tokio::time::sleep(delay).await;
                    }
                },
            }

            // Reap finished handlers so the set doesn't grow unbounded.
            while connections.try_join_next().is_some() {}
        }

        self.transport.shutdown().await?;
        self.drain(connections).await;

        tracing::info!(
            sessions = self.state.registry.len(),
            "Dropline server stopped"
        );
        Ok(())
    }

    /// Waits out the shutdown grace, then aborts what is left.
    async fn drain(&self, mut connections: JoinSet<()>) {
        let in_flight = connections.len();
        if in_flight == 0 {
            return;
        }

        let grace = self.state.config.shutdown_grace;
        tracing::info!(in_flight, ?grace, "waiting for connections to close");

        let drained = tokio::time::timeout(grace, async {
            while connections.join_next().await.is_some() {}
        })
        .await;

        if drained.is_err() {
            tracing::warn!(
                remaining = connections.len(),
                "shutdown grace elapsed, aborting connections"
            );
            connections.abort_all();
            while connections.join_next().await.is_some() {}
        }
    }
}

/// Upgrades one accepted connection and runs its handler.
///
/// The WebSocket handshake counts against `handshake_timeout` here, on
/// the connection's own task, so a peer that never upgrades only ties up
/// itself.
async fn serve<G, C>(
    pending: PendingWebSocket,
    state: Arc<ServerState<G, C>>,
) where
    G: GameEngine,
    C: Codec,
{
    let conn_id = pending.id();
    let peer = pending.peer_addr();
    let conn = match tokio::time::timeout(
        state.config.handshake_timeout,
        pending.upgrade(),
    )
    .await
    {
        Ok(Ok(conn)) => conn,
        Ok(Err(e)) => {
            tracing::debug!(%conn_id, %peer, error = %e, "upgrade failed");
            return;
        }
        Err(_) => {
            tracing::debug!(%conn_id, %peer, "upgrade timed out");
            return;
        }
    };

    if let Err(e) = handle_connection(conn, state).await {
        tracing::debug!(%conn_id, error = %e, "connection ended with error");
    }
}

/// Exponential delay between consecutive failed accepts.
///
/// Accept errors such as `EMFILE` tend to repeat immediately, so the loop
/// backs off instead of spinning. Any successful accept resets it.
struct AcceptBackoff {
    current: Duration,
}

impl AcceptBackoff {
    fn new() -> Self {
        Self {
            current: ACCEPT_BACKOFF_INITIAL,
        }
    }

    /// Returns the delay to wait now and doubles the next one, up to
    /// [`ACCEPT_BACKOFF_MAX`].
    fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = (self.current * 2).min(ACCEPT_BACKOFF_MAX);
        delay
    }

    fn reset(&mut self) {
        self.current = ACCEPT_BACKOFF_INITIAL;
    }
}

//! Transport abstraction layer for Dropline.
//!
//! Provides the [`Transport`] and [`Connection`] traits that abstract over
//! the persistent, message-oriented connections the broker speaks over.
//! The broker only needs four primitives from a connection: send, receive,
//! close, and a stable identity.
//!
//! # Feature Flags
//!
//! - `websocket` (default): WebSocket transport via `tokio-tungstenite`

#![allow(async_fn_in_trait)]

mod error;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
#[cfg(feature = "websocket")]
pub use websocket::{
    FrameKind, PendingWebSocket, WebSocketConnection, WebSocketTransport,
};

use std::fmt;

/// Opaque identifier for a connection.
///
/// Unique for the lifetime of the process, so it can key the set of
/// participants attached to a game session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Accepts new incoming connections.
pub trait Transport: Send + Sync + 'static {
    /// The connection type produced by this transport.
    type Connection: Connection;
    /// An accepted connection that still has to be upgraded.
    type Pending: Upgrade<Connection = Self::Connection, Error = Self::Error>;
    /// The error type for transport operations.
    type Error: std::error::Error + Send + Sync;

    /// Waits for the next incoming connection.
    ///
    /// Only the raw accept happens here. The protocol handshake is left to
    /// [`Upgrade::upgrade`], so a peer that never completes it cannot hold
    /// up the next accept.
    async fn accept(&mut self) -> Result<Self::Pending, Self::Error>;

    /// Stops accepting new connections.
    ///
    /// Connections that were already accepted are unaffected.
    async fn shutdown(&mut self) -> Result<(), Self::Error>;
}

/// A connection that has been accepted but not yet upgraded.
pub trait Upgrade: Send + 'static {
    /// The connection produced once the handshake completes.
    type Connection: Connection;
    /// The error type for a failed handshake.
    type Error: std::error::Error + Send + Sync;

    /// Runs the protocol handshake.
    async fn upgrade(self) -> Result<Self::Connection, Self::Error>;

    /// Returns the identifier the upgraded connection will carry.
    fn id(&self) -> ConnectionId;
}

/// A single connection that can send and receive whole messages.
pub trait Connection: Send + Sync + 'static {
    /// The error type for connection operations.
    type Error: std::error::Error + Send + Sync;

    /// Sends one message to the remote peer.
    async fn send(&self, data: &[u8]) -> Result<(), Self::Error>;

    /// Receives the next message from the remote peer.
    ///
    /// Returns `Ok(None)` when the connection is cleanly closed.
    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error>;

    /// Closes the connection.
    async fn close(&self) -> Result<(), Self::Error>;

    /// Returns the unique identifier for this connection.
    fn id(&self) -> ConnectionId;
}

//! Unified error type for the broker.

use dropline_protocol::ProtocolError;
use dropline_session::SessionError;
use dropline_transport::TransportError;

use crate::ConfigError;

/// Top-level error that wraps every layer's error.
///
/// The `#[from]` attribute on each variant generates the `From` impls,
/// so `?` converts layer errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum DroplineError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, malformed handshake).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A session-level error (unknown token).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// The server configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

//! Error types for the protocol layer.
//!
//! A `ProtocolError` always means the bytes on the wire were wrong:
//! unparsable, the wrong shape, or the wrong message for this point in
//! the conversation. It is fatal to the connection that produced it.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust type into bytes).
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed (turning bytes into a Rust type).
    ///
    /// Common causes: malformed JSON, an unknown `type` tag, missing
    /// required fields, or wrong field types (e.g. a string `column`).
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The message decoded fine but is not allowed here.
    ///
    /// For example a `play` before the handshake, or an `init` that
    /// carries both a join and a watch token.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}

//! Error types for the session layer.

/// Errors that can occur when addressing a session.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// No live session answers to the given join or watch token.
    ///
    /// Covers tokens that never existed and tokens of sessions whose
    /// starter has since left. The `Display` text is what the client
    /// receives in its `error` event.
    #[error("Game not found")]
    NotFound,
}

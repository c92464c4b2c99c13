//! # Dropline
//!
//! Realtime session broker for two-player Connect Four with spectators.
//!
//! A browser opens a WebSocket and sends `{"type": "init"}`. The broker
//! creates a game session and answers with two capability tokens: one to
//! invite an opponent (`join`) and one to invite spectators (`watch`).
//! From then on every accepted move is broadcast to everyone attached to
//! the session, and late arrivals are replayed the history first.
//!
//! The crate ties the layers together:
//!
//! ```text
//! dropline-transport  → WebSocket accept / send / recv
//! dropline-protocol   → JSON events, handshake classification
//! dropline-game       → Connect Four rules
//! dropline-session    → sessions, tokens, replay, fan-out
//! dropline            → server loop and per-connection flows
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use dropline::prelude::*;
//!
//! # async fn start() -> Result<(), DroplineError> {
//! let server = DroplineServerBuilder::new()
//!     .config(ServerConfig::from_env()?)
//!     .build::<Connect4>()
//!     .await?;
//! server.run().await
//! # }
//! ```

mod config;
mod error;
mod handler;
mod server;

pub use config::{ConfigError, ServerConfig};
pub use error::DroplineError;
pub use server::{DroplineServer, DroplineServerBuilder};

/// Everything needed to run a server and talk to it.
pub mod prelude {
    pub use crate::{
        ConfigError, DroplineError, DroplineServer, DroplineServerBuilder,
        ServerConfig,
    };
    pub use dropline_game::{Connect4, GameEngine, GameError, Move};
    pub use dropline_protocol::{
        ClientEvent, Codec, Handshake, JsonCodec, Player, ProtocolError,
        ServerEvent,
    };
    pub use dropline_session::{Role, SessionError};
    pub use dropline_transport::{FrameKind, TransportError};
}

//! Wire protocol for Dropline.
//!
//! This crate defines the "language" that clients and the broker speak:
//!
//! - **Types** ([`ClientEvent`], [`ServerEvent`], [`Player`]): the
//!   messages that travel on the wire, each a JSON object tagged by `type`.
//! - **Handshake** ([`Handshake`]): the validated meaning of the first
//!   message on a connection: start, join, or watch.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how those messages
//!   are converted to/from bytes.
//! - **Errors** ([`ProtocolError`]): what can go wrong during
//!   encoding/decoding.
//!
//! # Architecture
//!
//! ```text
//! Transport (bytes) → Protocol (events) → Session (game + participants)
//! ```

mod codec;
mod error;
mod handshake;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use handshake::Handshake;
pub use types::{ClientEvent, Player, ServerEvent};

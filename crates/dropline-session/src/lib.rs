//! Game sessions for Dropline.
//!
//! This crate owns the shared state of every running game:
//!
//! 1. **Sessions**: one game engine plus the set of connections attached
//!    to it ([`Session`]), with replay for late joiners and best-effort
//!    broadcast to everyone attached.
//! 2. **Registry**: the two token tables that make a session reachable
//!    ([`SessionRegistry`]).
//! 3. **Roles**: what an attached connection is allowed to do ([`Role`]).
//!
//! # How it fits in the stack
//!
//! ```text
//! Server (above)  ← one task per connection, drives the flows
//!     ↕
//! Session Layer (this crate)  ← registry, sessions, fan-out
//!     ↕
//! Game + Protocol (below)  ← engine rules, ServerEvent, Player
//! ```
//!
//! # Locking
//!
//! All shared state sits behind short `parking_lot` mutexes that are
//! never held across an `.await`. Delivery to a connection is an enqueue
//! onto its unbounded [`Outbox`], which never suspends, so a move can be
//! applied and fanned out inside a single critical section.

mod error;
mod registry;
mod role;
mod session;
mod token;

pub use error::SessionError;
pub use registry::SessionRegistry;
pub use role::Role;
pub use session::{Outbox, PlayOutcome, Session};

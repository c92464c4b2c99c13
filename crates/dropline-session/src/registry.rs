//! The session registry: the two token tables that make sessions reachable.
//!
//! A session is reachable exactly while its starter is connected:
//!
//! ```text
//! create() ──→ [by_join + by_watch] ──→ lookup_by_join() / lookup_by_watch()
//!                      │
//!                      ▼  starter's flow ends (any cause)
//!                  destroy() ──→ both tokens resolve to NotFound forever
//! ```
//!
//! Each operation takes the registry lock once and releases it before
//! returning, so no two operations interleave and none can be observed
//! half-done.

use std::collections::HashMap;
use std::sync::Arc;

use dropline_game::GameEngine;
use dropline_transport::ConnectionId;
use parking_lot::Mutex;

use crate::token::generate_token;
use crate::{Outbox, Session, SessionError};

/// Process-wide index of live sessions, keyed by both capability tokens.
///
/// Created once at server start and shared by every connection task.
pub struct SessionRegistry<G: GameEngine> {
    tables: Mutex<Tables<G>>,
}

struct Tables<G: GameEngine> {
    /// Join token → session. Kept in sync with `by_watch`.
    by_join: HashMap<String, Arc<Session<G>>>,
    /// Watch token → session.
    by_watch: HashMap<String, Arc<Session<G>>>,
}

impl<G: GameEngine> Tables<G> {
    /// Returns `true` if `token` is live in either table.
    fn contains(&self, token: &str) -> bool {
        self.by_join.contains_key(token) || self.by_watch.contains_key(token)
    }

    /// Draws tokens until one is not live in either table.
    fn fresh_token(&self) -> String {
        loop {
            let token = generate_token();
            if !self.contains(&token) {
                return token;
            }
        }
    }
}

impl<G: GameEngine> SessionRegistry<G> {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            tables: Mutex::new(Tables {
                by_join: HashMap::new(),
                by_watch: HashMap::new(),
            }),
        }
    }

    /// Creates a session with two fresh tokens and a new engine, attaches
    /// the starter, and makes it reachable under both tokens.
    ///
    /// The starter's outbox receives the `init` event carrying the tokens
    /// before any other connection could look the session up.
    pub fn create(
        &self,
        starter: ConnectionId,
        outbox: Outbox,
    ) -> Arc<Session<G>> {
        let mut tables = self.tables.lock();

        let join_token = tables.fresh_token();
        let watch_token = loop {
            let token = tables.fresh_token();
            if token != join_token {
                break token;
            }
        };

        let session = Arc::new(Session::new(
            join_token.clone(),
            watch_token.clone(),
            starter,
            outbox,
        ));
        tables.by_join.insert(join_token, Arc::clone(&session));
        tables.by_watch.insert(watch_token, Arc::clone(&session));

        tracing::info!(
            %starter,
            sessions = tables.by_join.len(),
            "session created"
        );
        tracing::debug!(
            join = session.join_token(),
            watch = session.watch_token(),
            "session tokens issued"
        );
        session
    }

    /// Resolves a join token.
    ///
    /// # Errors
    /// [`SessionError::NotFound`] if no live session has this join token.
    pub fn lookup_by_join(
        &self,
        token: &str,
    ) -> Result<Arc<Session<G>>, SessionError> {
        self.tables
            .lock()
            .by_join
            .get(token)
            .cloned()
            .ok_or(SessionError::NotFound)
    }

    /// Resolves a watch token.
    ///
    /// # Errors
    /// [`SessionError::NotFound`] if no live session has this watch token.
    pub fn lookup_by_watch(
        &self,
        token: &str,
    ) -> Result<Arc<Session<G>>, SessionError> {
        self.tables
            .lock()
            .by_watch
            .get(token)
            .cloned()
            .ok_or(SessionError::NotFound)
    }

    /// Removes both of the session's token entries.
    ///
    /// Returns `false` if the session was already gone. Connections still
    /// holding the `Arc` keep their reference; they just can no longer be
    /// joined by anyone new.
    pub fn destroy(&self, session: &Session<G>) -> bool {
        let mut tables = self.tables.lock();
        let by_join = tables.by_join.remove(session.join_token()).is_some();
        let by_watch = tables.by_watch.remove(session.watch_token()).is_some();
        let removed = by_join || by_watch;
        if removed {
            tracing::info!(
                sessions = tables.by_join.len(),
                "session destroyed"
            );
        }
        removed
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.tables.lock().by_join.len()
    }

    /// Returns `true` if there are no live sessions.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<G: GameEngine> Default for SessionRegistry<G> {
    fn default() -> Self {
        Self::new()
    }
}

// =========================================================================
// Tests
// =========================================================================

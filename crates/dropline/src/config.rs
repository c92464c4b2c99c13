//! Server configuration.

use std::num::ParseIntError;
use std::time::Duration;

/// Errors raised while loading [`ServerConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// `PORT` was set but is not a valid port number.
    #[error("invalid PORT {value:?}: {source}")]
    InvalidPort {
        value: String,
        #[source]
        source: ParseIntError,
    },
}

/// Settings for a [`DroplineServer`](crate::DroplineServer).
///
/// Start from `ServerConfig::default()` and override the fields you care
/// about, or load the listen address from the environment with
/// [`from_env`](Self::from_env).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Interface to listen on. Default: `0.0.0.0`.
    pub host: String,

    /// Port to listen on. Default: `8001`.
    pub port: u16,

    /// How long a fresh connection has to finish the WebSocket upgrade,
    /// and then to send its `init` message, before it is closed.
    /// Default: 10 seconds.
    pub handshake_timeout: Duration,

    /// How long shutdown waits for in-flight connections once the
    /// listener has stopped. Remaining connections are aborted.
    /// Default: 5 seconds.
    pub shutdown_grace: Duration,

    /// How long a closing connection waits for its queued events to be
    /// written. Default: 1 second.
    pub flush_timeout: Duration,
}

impl ServerConfig {
    /// Port used when `PORT` is not set.
    pub const DEFAULT_PORT: u16 = 8001;

    /// Loads `HOST` and `PORT` from the process environment, keeping the
    /// defaults for anything unset.
    ///
    /// # Errors
    /// [`ConfigError::InvalidPort`] if `PORT` is set but not a `u16`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env), reading variables through
    /// `lookup` instead of the process environment.
    ///
    /// # Errors
    /// [`ConfigError::InvalidPort`] if `PORT` is set but not a `u16`.
    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(host) = lookup("HOST").filter(|h| !h.trim().is_empty()) {
            config.host = host.trim().to_string();
        }
        if let Some(value) = lookup("PORT") {
            config.port = value
                .trim()
                .parse::<u16>()
                .map_err(|source| ConfigError::InvalidPort { value, source })?;
        }

        Ok(config)
    }

    /// The `host:port` string the listener binds to.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: Self::DEFAULT_PORT,
            handshake_timeout: Duration::from_secs(10),
            shutdown_grace: Duration::from_secs(5),
            flush_timeout: Duration::from_secs(1),
        }
    }
}

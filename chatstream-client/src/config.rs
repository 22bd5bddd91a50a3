//! Configuration for [`ChatClient`](crate::ChatClient).

use std::time::Duration;

/// Environment variable holding the chat server base URL.
pub const BASE_URL_VAR: &str = "CHATSTREAM_BASE_URL";

/// Environment variable holding the connect timeout in whole seconds.
pub const CONNECT_TIMEOUT_VAR: &str = "CHATSTREAM_CONNECT_TIMEOUT_SECS";

const DEFAULT_BASE_URL: &str = "http://127.0.0.1:5000";
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Static configuration for a [`ChatClient`](crate::ChatClient).
///
/// Only connection establishment is bounded by a timeout. A streaming
/// response may legitimately stay open for a long time, so no
/// whole-response timeout is applied; callers that want one cancel the
/// request themselves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL of the chat server, without a trailing path.
    pub base_url: String,

    /// Maximum time to establish the TCP/TLS connection.
    pub connect_timeout: Duration,

    /// `User-Agent` header sent with every request.
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.into(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            user_agent: concat!("chatstream/", env!("CARGO_PKG_VERSION")).into(),
        }
    }
}

impl ClientConfig {
    /// Defaults overridden by [`BASE_URL_VAR`] and [`CONNECT_TIMEOUT_VAR`].
    ///
    /// Empty or unparseable values are ignored.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Like [`from_env`](Self::from_env), reading variables through `lookup`.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(url) = lookup(BASE_URL_VAR).map(|v| v.trim().to_string()) {
            if !url.is_empty() {
                config.base_url = url;
            }
        }

        match lookup(CONNECT_TIMEOUT_VAR).map(|v| v.trim().parse::<u64>()) {
            Some(Ok(secs)) => config.connect_timeout = Duration::from_secs(secs),
            Some(Err(e)) => {
                tracing::warn!(var = CONNECT_TIMEOUT_VAR, error = %e, "ignoring unparseable timeout");
            }
            None => {}
        }

        config
    }

    /// Override the base URL.
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Override the connect timeout.
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Join `path` onto the base URL.
    pub(crate) fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base_url.trim_end_matches('/'))
    }
}

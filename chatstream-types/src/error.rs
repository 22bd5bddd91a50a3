//! Error types for all chatstream crates.

/// Errors from chat requests.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    // Retryable errors
    /// Network-level error (connection refused, reset mid-stream, DNS failure, etc.).
    #[error("network error: {0}")]
    Network(String),
    /// Connecting to the server timed out.
    #[error("request timed out")]
    Timeout,
    /// Rate limited by the server or the upstream model provider.
    #[error("rate limited: {0}")]
    RateLimited(String),
    /// Server is temporarily unavailable.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    // Terminal errors
    /// Authentication/authorization failure.
    #[error("authentication failed: {0}")]
    Authentication(String),
    /// Malformed or rejected request.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    /// The server reported an error for this stream (the `error` payload field).
    #[error("{0}")]
    Server(String),
    /// The server's response could not be interpreted.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    /// The caller cancelled the request.
    #[error("cancelled")]
    Cancelled,
}

impl ClientError {
    /// Whether this error is likely transient and the request can be retried.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Network(_) | Self::Timeout | Self::RateLimited(_) | Self::ServiceUnavailable(_)
        )
    }

    /// Build an error from a message delivered through an error callback.
    ///
    /// Messages that look like credential problems become
    /// [`ClientError::Authentication`], rate limits become
    /// [`ClientError::RateLimited`], transport failures become
    /// [`ClientError::Network`]; anything else is [`ClientError::Server`].
    #[must_use]
    pub fn from_message(message: impl Into<String>) -> Self {
        let message = message.into();
        match ErrorClass::classify(&message) {
            ErrorClass::Authentication => Self::Authentication(message),
            ErrorClass::RateLimit => Self::RateLimited(message),
            ErrorClass::Network => Self::Network(message),
            ErrorClass::Other => Self::Server(message),
        }
    }

    /// The guidance category for this error.
    #[must_use]
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Authentication(_) => ErrorClass::Authentication,
            Self::RateLimited(_) => ErrorClass::RateLimit,
            Self::Network(_) | Self::Timeout | Self::ServiceUnavailable(_) => ErrorClass::Network,
            Self::Server(message) => ErrorClass::classify(message),
            Self::InvalidRequest(_) | Self::InvalidResponse(_) | Self::Cancelled => {
                ErrorClass::Other
            }
        }
    }
}

/// Coarse category of an error message, used to pick user-facing guidance.
///
/// Error callbacks only carry a display string, so the category is derived
/// from the message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// Missing, invalid, or unauthorized credentials.
    Authentication,
    /// Too many requests.
    RateLimit,
    /// Connectivity problems between the client, the server, or the upstream API.
    Network,
    /// Anything else.
    Other,
}

const AUTH_PATTERNS: &[&str] = &[
    "401",
    "403",
    "unauthorized",
    "unauthorised",
    "forbidden",
    "api key",
    "api_key",
    "auth credentials",
    "authentication",
    "invalid key",
];

const RATE_LIMIT_PATTERNS: &[&str] = &["429", "rate limit", "rate_limit", "too many requests"];

const NETWORK_PATTERNS: &[&str] = &[
    "network",
    "connect",
    "timed out",
    "timeout",
    "stream read error",
    "dns",
    "unreachable",
];

impl ErrorClass {
    /// Classify a human-readable error message.
    ///
    /// Credential patterns are checked first so that e.g. `"HTTP 401: network
    /// gateway rejected key"` is reported as an authentication problem.
    #[must_use]
    pub fn classify(message: &str) -> Self {
        let lower = message.to_lowercase();
        let matches_any = |patterns: &[&str]| patterns.iter().any(|p| lower.contains(p));

        if matches_any(AUTH_PATTERNS) {
            Self::Authentication
        } else if matches_any(RATE_LIMIT_PATTERNS) {
            Self::RateLimit
        } else if matches_any(NETWORK_PATTERNS) {
            Self::Network
        } else {
            Self::Other
        }
    }

    /// Actionable hint to display next to the error in a conversation view.
    #[must_use]
    pub fn guidance(self) -> &'static str {
        match self {
            Self::Authentication => {
                "Check that OPENROUTER_API_KEY (or OPENAI_API_KEY) is set on the server \
                 and that the key is valid for the selected model."
            }
            Self::RateLimit => "The model provider is rate limiting requests. Wait a moment and retry.",
            Self::Network => {
                "Could not reach the chat server. Check that it is running and that \
                 your network connection is up, then retry."
            }
            Self::Other => "The request failed. Retry, or try a different model.",
        }
    }
}

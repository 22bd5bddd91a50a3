//! Internal error helpers for mapping HTTP/reqwest errors to [`ClientError`].

use chatstream_types::ClientError;

/// Map a non-success HTTP status from the chat server to a [`ClientError`].
pub(crate) fn map_http_status(status: reqwest::StatusCode, body: &str) -> ClientError {
    match status.as_u16() {
        401 | 403 => ClientError::Authentication(body.to_string()),
        400 | 404 | 422 => ClientError::InvalidRequest(body.to_string()),
        429 => ClientError::RateLimited(body.to_string()),
        500..=599 => ClientError::ServiceUnavailable(body.to_string()),
        _ => ClientError::InvalidRequest(format!("HTTP {status}: {body}")),
    }
}

/// Map a [`reqwest::Error`] to a [`ClientError`].
pub(crate) fn map_reqwest_error(err: reqwest::Error) -> ClientError {
    if err.is_timeout() {
        ClientError::Timeout
    } else {
        ClientError::Network(err.to_string())
    }
}

//! Chat server client struct and request methods.

use chatstream_sse::{Session, StreamOutcome, drive, is_truthy, value_text};
use chatstream_types::{
    Accumulator, ChatRequest, ClientError, Completion, Health, StreamHandler,
};
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::config::ClientConfig;
use crate::error::{map_http_status, map_reqwest_error};

const STREAM_PATH: &str = "/chat/stream";
const CHAT_PATH: &str = "/chat";
const HEALTH_PATH: &str = "/health";

const EVENT_STREAM: &str = "text/event-stream";

/// Client for a streaming chat server.
///
/// # Example
///
/// ```no_run
/// use chatstream_client::{Callbacks, CancellationToken, ChatClient, ChatRequest};
///
/// # async fn run() -> Result<(), chatstream_client::ClientError> {
/// let client = ChatClient::from_env()?;
/// let handler = Callbacks::new()
///     .with_delta(|text| print!("{text}"))
///     .with_error(|message| eprintln!("error: {message}"));
/// client
///     .stream_chat(&ChatRequest::prompt("Hello"), handler, CancellationToken::new())
///     .await;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ChatClient {
    pub(crate) config: ClientConfig,
    /// Shared HTTP client.
    pub(crate) client: reqwest::Client,
}

impl ChatClient {
    /// Create a client from `config`.
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(map_reqwest_error)?;
        Ok(Self { config, client })
    }

    /// Create a client configured from the environment.
    ///
    /// See [`ClientConfig::from_env`].
    pub fn from_env() -> Result<Self, ClientError> {
        Self::new(ClientConfig::from_env())
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Stream a chat completion, reporting progress to `handler`.
    ///
    /// Every failure is delivered through `handler.on_error` rather than
    /// returned, and `handler.on_done` fires exactly once at the end no
    /// matter how the exchange ended. Cancelling `cancel` ends the exchange
    /// without an error callback.
    ///
    /// When the server answers with something other than an event stream,
    /// the body is read as a single JSON document: its `error` field is
    /// reported as an error and its `content` field as one delta.
    pub async fn stream_chat<H: StreamHandler>(
        &self,
        request: &ChatRequest,
        handler: H,
        cancel: CancellationToken,
    ) -> StreamOutcome {
        let url = self.config.endpoint(STREAM_PATH);

        tracing::debug!(
            url = %url,
            model = request.model.as_deref().unwrap_or("(server default)"),
            "sending streaming chat request"
        );

        let send = self
            .client
            .post(&url)
            .header(ACCEPT, EVENT_STREAM)
            .json(request)
            .send();

        let response = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                tracing::debug!("cancelled before response");
                return Session::new(handler).cancel();
            }
            result = send => result,
        };

        let response = match response {
            Ok(r) => r,
            Err(e) => {
                let err = map_reqwest_error(e);
                tracing::warn!(error = %err, "chat request failed");
                return Session::new(handler).fail(err.to_string());
            }
        };

        let status = response.status();
        if is_event_stream(response.headers()) {
            tracing::debug!(status = %status, "reading event stream");
            return drive(response.bytes_stream(), handler, cancel).await;
        }

        tracing::debug!(status = %status, "response is not an event stream; reading as JSON");

        let body = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                tracing::debug!("cancelled while reading response body");
                return Session::new(handler).cancel();
            }
            result = response.text() => result,
        };

        let mut session = Session::new(handler);
        match body {
            Ok(body) => {
                deliver_document(&mut session, status, &body);
                session.complete()
            }
            Err(e) => {
                let err = map_reqwest_error(e);
                tracing::warn!(error = %err, "failed to read response body");
                session.fail(err.to_string())
            }
        }
    }

    /// Stream a chat completion and return the concatenated text.
    ///
    /// This is [`stream_chat`](Self::stream_chat) with an [`Accumulator`]
    /// as the handler. The first reported error (server or transport) is
    /// returned as the error.
    pub async fn chat(&self, request: &ChatRequest) -> Result<Completion, ClientError> {
        if !request.has_input() {
            return Err(ClientError::InvalidRequest(
                "missing 'prompt' or 'messages'".into(),
            ));
        }

        let mut acc = Accumulator::new();
        let outcome = self
            .stream_chat(request, &mut acc, CancellationToken::new())
            .await;
        if outcome.is_cancelled() {
            return Err(ClientError::Cancelled);
        }
        acc.into_completion()
    }

    /// Request a complete (non-streaming) chat response from `POST /chat`.
    pub async fn complete(&self, request: &ChatRequest) -> Result<Completion, ClientError> {
        if !request.has_input() {
            return Err(ClientError::InvalidRequest(
                "missing 'prompt' or 'messages'".into(),
            ));
        }

        let url = self.config.endpoint(CHAT_PATH);

        tracing::debug!(
            url = %url,
            model = request.model.as_deref().unwrap_or("(server default)"),
            "sending chat request"
        );

        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        let body = response.text().await.map_err(map_reqwest_error)?;
        let json = serde_json::from_str::<Value>(&body).ok();

        if !status.is_success() {
            let message = json
                .as_ref()
                .and_then(|v| document_field(v, "error"))
                .unwrap_or_else(|| body.clone());
            return Err(map_http_status(status, &message));
        }

        let json = json.ok_or_else(|| {
            ClientError::InvalidResponse(format!("expected a JSON object, got: {body}"))
        })?;

        if let Some(message) = document_field(&json, "error") {
            return Err(ClientError::from_message(message));
        }

        let model = json
            .pointer("/raw/model")
            .or_else(|| json.get("model"))
            .and_then(Value::as_str)
            .map(str::to_string);

        Ok(Completion {
            text: document_field(&json, "content").unwrap_or_default(),
            model,
        })
    }

    /// Query `GET /health`.
    pub async fn health(&self) -> Result<Health, ClientError> {
        let url = self.config.endpoint(HEALTH_PATH);
        tracing::debug!(url = %url, "checking server health");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        let body = response.text().await.map_err(map_reqwest_error)?;
        if !status.is_success() {
            return Err(map_http_status(status, &body));
        }

        serde_json::from_str(&body)
            .map_err(|e| ClientError::InvalidResponse(format!("invalid health response: {e}")))
    }
}

/// Whether the response declares an event-stream body.
fn is_event_stream(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| {
            ct.trim_start()
                .to_ascii_lowercase()
                .starts_with(EVENT_STREAM)
        })
}

/// A present field of a JSON object, as display text.
fn document_field(json: &Value, name: &str) -> Option<String> {
    json.get(name)
        .filter(|v| is_truthy(v))
        .map(|v| value_text(v).into_owned())
}

/// Deliver a whole non-event-stream body through the session.
fn deliver_document<H: StreamHandler>(
    session: &mut Session<H>,
    status: reqwest::StatusCode,
    body: &str,
) {
    let json = serde_json::from_str::<Value>(body)
        .ok()
        .filter(Value::is_object);

    match json.as_ref().and_then(|v| document_field(v, "error")) {
        Some(message) => session.error(&message),
        None if !status.is_success() => {
            session.error(&format!("HTTP {}: {}", status.as_u16(), body.trim()));
        }
        None => {}
    }

    match json {
        Some(json) => {
            if let Some(content) = document_field(&json, "content") {
                session.delta(&content);
            }
        }
        None if status.is_success() && !body.trim().is_empty() => session.delta(body),
        None => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatstream_types::StartMetadata;
    use reqwest::StatusCode;
    use reqwest::header::HeaderValue;

    #[derive(Default)]
    struct Recorder(Vec<String>);

    impl StreamHandler for Recorder {
        fn on_start(&mut self, _metadata: &StartMetadata) {
            self.0.push("start".into());
        }
        fn on_delta(&mut self, text: &str) {
            self.0.push(format!("delta:{text}"));
        }
        fn on_error(&mut self, message: &str) {
            self.0.push(format!("error:{message}"));
        }
        fn on_done(&mut self) {
            self.0.push("done".into());
        }
    }

    fn deliver(status: StatusCode, body: &str) -> Vec<String> {
        let mut rec = Recorder::default();
        let mut session = Session::new(&mut rec);
        deliver_document(&mut session, status, body);
        session.complete();
        rec.0
    }

    #[test]
    fn content_becomes_single_delta() {
        assert_eq!(
            deliver(StatusCode::OK, r#"{"content":"Answer text"}"#),
            vec!["delta:Answer text", "done"]
        );
    }

    #[test]
    fn missing_content_is_only_done() {
        assert_eq!(deliver(StatusCode::OK, r#"{"ok":true}"#), vec!["done"]);
        assert_eq!(deliver(StatusCode::OK, r#"{"content":null}"#), vec!["done"]);
    }

    #[test]
    fn error_field_is_reported() {
        assert_eq!(
            deliver(StatusCode::BAD_REQUEST, r#"{"error":"Missing 'prompt' or 'messages'"}"#),
            vec!["error:Missing 'prompt' or 'messages'", "done"]
        );
    }

    #[test]
    fn failed_status_without_error_field() {
        assert_eq!(
            deliver(StatusCode::BAD_GATEWAY, "upstream down\n"),
            vec!["error:HTTP 502: upstream down", "done"]
        );
    }

    #[test]
    fn plain_text_success_body_is_delivered() {
        assert_eq!(deliver(StatusCode::OK, "hi"), vec!["delta:hi", "done"]);
        assert_eq!(deliver(StatusCode::OK, "  "), vec!["done"]);
    }

    #[test]
    fn content_type_detection() {
        let mut headers = HeaderMap::new();
        assert!(!is_event_stream(&headers));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        assert!(!is_event_stream(&headers));
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("Text/Event-Stream; charset=utf-8"),
        );
        assert!(is_event_stream(&headers));
    }

    #[test]
    fn new_client_keeps_config() {
        let config = ClientConfig::default().base_url("http://localhost:9999");
        let client = ChatClient::new(config.clone()).unwrap();
        assert_eq!(client.config(), &config);
    }
}

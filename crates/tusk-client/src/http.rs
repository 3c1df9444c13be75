//! HTTP + Server-Sent Events implementation of [`MastodonApi`].
//!
//! REST calls are plain `reqwest` requests with a bearer token. A stream is a
//! spawned task that owns the connection:
//!
//! ```text
//!        ┌────────── backoff sleep ◀──────────┐
//!        ▼                                    │
//!   connect ──2xx──▶ send Connect ──▶ read SSE chunks ──EOF / error──┘
//!        │                                    │
//!        └──non-2xx / transport error──▶ send Error
//! ```
//!
//! The task exits as soon as the [`StreamHandle`] is stopped or dropped.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde_json::Value;
use tracing::{debug, info, trace, warn};
use url::Url;

use crate::api::{ApiError, MastodonApi};
use crate::constants::{
    RECONNECT_INITIAL, RECONNECT_MAX, REQUEST_TIMEOUT, STREAM_CHANNEL_CAPACITY, USER_AGENT,
};
use crate::session::Session;
use crate::sse::{SseDecoder, SseItem, decode_frame};
use crate::subscriptions::{StreamEvent, StreamHandle, StreamSender};

/// Exponential reconnect delay bounds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Backoff {
    pub initial: Duration,
    pub max: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self { initial: RECONNECT_INITIAL, max: RECONNECT_MAX }
    }
}

impl Backoff {
    /// Delay to use after `current`: doubled, capped at `max`.
    pub fn next(&self, current: Duration) -> Duration {
        current.saturating_mul(2).min(self.max)
    }
}

/// [`MastodonApi`] over HTTPS.
#[derive(Clone)]
pub struct HttpApi {
    client: Client,
    base: Url,
    streaming_base: Url,
    token: Option<String>,
    backoff: Backoff,
}

impl HttpApi {
    pub fn new(session: &Session) -> Result<Self, ApiError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            base: session.instance.clone(),
            streaming_base: session.instance.clone(),
            token: session.access_token.clone(),
            backoff: Backoff::default(),
        })
    }

    /// Some servers serve the streaming API from a separate host.
    pub fn with_streaming_base(mut self, url: Url) -> Self {
        self.streaming_base = url;
        self
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    fn url(base: &Url, path: &str) -> Result<Url, ApiError> {
        base.join(path).map_err(|e| ApiError::Url(format!("{path}: {e}")))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

#[async_trait]
impl MastodonApi for HttpApi {
    async fn get(&self, path: &str, params: &[(&str, String)]) -> Result<Value, ApiError> {
        let url = Self::url(&self.base, path)?;
        trace!(%url, "GET");
        let request = self.client.get(url).query(params).timeout(REQUEST_TIMEOUT);
        let response = self.authorize(request).send().await.map_err(transport)?;
        read_json(path, response).await
    }

    async fn post(&self, path: &str, body: Option<Value>) -> Result<Value, ApiError> {
        let url = Self::url(&self.base, path)?;
        trace!(%url, "POST");
        let mut request = self.client.post(url).timeout(REQUEST_TIMEOUT);
        if let Some(body) = body {
            request = request.json(&body);
        }
        let response = self.authorize(request).send().await.map_err(transport)?;
        read_json(path, response).await
    }

    async fn stream(&self, path: &str) -> Result<StreamHandle, ApiError> {
        let url = Self::url(&self.streaming_base, path)?;
        let (tx, handle) = StreamHandle::channel(STREAM_CHANNEL_CAPACITY);
        tokio::spawn(run_stream(self.clone(), url, tx));
        Ok(handle)
    }
}

fn transport(e: reqwest::Error) -> ApiError {
    ApiError::Transport(e.to_string())
}

/// Map a response to JSON, turning Mastodon's `{"error": "..."}` bodies into
/// [`ApiError::Status`]. An empty success body decodes as `null`.
async fn read_json(endpoint: &str, response: Response) -> Result<Value, ApiError> {
    let status = response.status();
    let bytes = response.bytes().await.map_err(transport)?;

    if !status.is_success() {
        return Err(ApiError::Status {
            status: status.as_u16(),
            message: error_message(status, &bytes),
        });
    }
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    serde_json::from_slice(&bytes).map_err(|e| ApiError::Decode {
        endpoint: endpoint.to_string(),
        message: e.to_string(),
    })
}

fn error_message(status: StatusCode, body: &[u8]) -> String {
    serde_json::from_slice::<Value>(body)
        .ok()
        .and_then(|v| v.get("error").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| {
            status.canonical_reason().unwrap_or("request failed").to_string()
        })
}

// ============================================================================
// Stream task
// ============================================================================

async fn run_stream(api: HttpApi, url: Url, tx: StreamSender) {
    let mut delay = api.backoff.initial;
    info!(%url, "stream task started");

    loop {
        let mut connected = false;
        let outcome = connect_once(&api, &url, &tx, &mut connected).await;
        if connected {
            delay = api.backoff.initial;
        }
        match outcome {
            // Stopped from the other side; nothing more to do.
            Ok(true) => break,
            Ok(false) => debug!(%url, retry_in = ?delay, "stream closed by server"),
            Err(e) => {
                warn!(%url, error = %e, retry_in = ?delay, "stream failed");
                if !tx.send(StreamEvent::Error(e.to_string())).await {
                    break;
                }
            }
        }

        tokio::select! {
            _ = tx.stopped() => break,
            _ = tokio::time::sleep(delay) => {}
        }
        delay = api.backoff.next(delay);
    }

    info!(%url, "stream task stopped");
}

/// One connection attempt. `Ok(true)` means the subscriber went away,
/// `Ok(false)` that the server closed the stream cleanly. `connected` is set
/// once the server accepted the subscription.
async fn connect_once(
    api: &HttpApi,
    url: &Url,
    tx: &StreamSender,
    connected: &mut bool,
) -> Result<bool, ApiError> {
    let request = api
        .client
        .get(url.clone())
        .header(reqwest::header::ACCEPT, "text/event-stream");
    let response = tokio::select! {
        _ = tx.stopped() => return Ok(true),
        response = api.authorize(request).send() => response.map_err(transport)?,
    };

    let status = response.status();
    if !status.is_success() {
        let body = response.bytes().await.unwrap_or_default();
        return Err(ApiError::Status {
            status: status.as_u16(),
            message: error_message(status, &body),
        });
    }

    *connected = true;
    if !tx.send(StreamEvent::Connect).await {
        return Ok(true);
    }

    let mut decoder = SseDecoder::new();
    let mut body = response.bytes_stream();
    loop {
        let chunk = tokio::select! {
            _ = tx.stopped() => return Ok(true),
            chunk = body.next() => chunk,
        };
        let Some(chunk) = chunk else {
            return Ok(false);
        };
        let chunk = chunk.map_err(transport)?;

        for item in decoder.feed(&chunk) {
            let event = match item {
                SseItem::Comment(_) => Some(StreamEvent::Heartbeat),
                SseItem::Frame(frame) => decode_frame(&frame),
            };
            if let Some(event) = event {
                trace!(event = event.name(), "stream event");
                if !tx.send(event).await {
                    return Ok(true);
                }
            }
        }
    }
}

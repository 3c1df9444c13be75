//! The remote API collaborator and its typed endpoint layer.
//!
//! [`MastodonApi`] is the narrow, untyped contract the controller depends on:
//! `get`, `post`, and `stream`. [`HttpApi`](crate::HttpApi) implements it over
//! HTTP; tests implement it in memory.
//!
//! [`Api`] sits on top and validates every payload into the entity types of
//! `tusk-types`, so nothing downstream ever handles raw JSON.

use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tusk_types::{Account, Notification, NotificationId, Post, PostId, StatusDraft, TimelineKind};

use crate::subscriptions::StreamHandle;

// ============================================================================
// Error Type
// ============================================================================

/// Errors from remote calls.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    /// The server answered with a non-success status.
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },
    /// The request never got a response (DNS, TLS, timeout, reset).
    #[error("transport error: {0}")]
    Transport(String),
    /// The response didn't match the endpoint's schema.
    #[error("failed to decode {endpoint} response: {message}")]
    Decode { endpoint: String, message: String },
    #[error("invalid URL: {0}")]
    Url(String),
}

// ============================================================================
// Collaborator contract
// ============================================================================

/// Untyped remote API.
///
/// Paths are absolute (`/api/v1/...`) and may carry a query string.
#[async_trait]
pub trait MastodonApi: Send + Sync {
    async fn get(&self, path: &str, params: &[(&str, String)]) -> Result<Value, ApiError>;

    async fn post(&self, path: &str, body: Option<Value>) -> Result<Value, ApiError>;

    /// Open a streaming subscription. Connection, reconnect and backoff are
    /// the implementation's business; it reports them as `Connect`/`Error`
    /// events on the returned handle.
    async fn stream(&self, path: &str) -> Result<StreamHandle, ApiError>;
}

// ============================================================================
// Typed endpoints
// ============================================================================

/// Typed, cloneable front for a [`MastodonApi`].
#[derive(Clone)]
pub struct Api {
    inner: Arc<dyn MastodonApi>,
}

impl Api {
    pub fn new(inner: Arc<dyn MastodonApi>) -> Self {
        Self { inner }
    }

    pub fn from_impl(api: impl MastodonApi + 'static) -> Self {
        Self::new(Arc::new(api))
    }

    /// A page of `kind`, newest first, strictly older than `max_id` if given.
    pub async fn timeline(
        &self,
        kind: &TimelineKind,
        max_id: Option<&PostId>,
        limit: u32,
    ) -> Result<Vec<Post>, ApiError> {
        let path = kind.rest_path();
        let mut params = kind.rest_params();
        params.push(("limit", limit.to_string()));
        if let Some(max_id) = max_id {
            params.push(("max_id", max_id.to_string()));
        }
        let value = self.inner.get(&path, &params).await?;
        decode(&path, value)
    }

    pub async fn favourite(&self, id: &PostId) -> Result<Post, ApiError> {
        self.status_action(id, "favourite").await
    }

    pub async fn unfavourite(&self, id: &PostId) -> Result<Post, ApiError> {
        self.status_action(id, "unfavourite").await
    }

    /// Boost `id`. Returns the boosted post itself, not the new wrapper.
    pub async fn reblog(&self, id: &PostId) -> Result<Post, ApiError> {
        let wrapper = self.status_action(id, "reblog").await?;
        Ok(match wrapper.reblog {
            Some(inner) => *inner,
            None => wrapper,
        })
    }

    pub async fn unreblog(&self, id: &PostId) -> Result<Post, ApiError> {
        self.status_action(id, "unreblog").await
    }

    /// First page of notifications, or the page older than `max_id`.
    pub async fn notifications(
        &self,
        max_id: Option<&NotificationId>,
        limit: u32,
    ) -> Result<Vec<Notification>, ApiError> {
        let path = "/api/v1/notifications";
        let mut params = vec![("limit", limit.to_string())];
        if let Some(max_id) = max_id {
            params.push(("max_id", max_id.to_string()));
        }
        let value = self.inner.get(path, &params).await?;
        decode(path, value)
    }

    pub async fn dismiss_notification(&self, id: &NotificationId) -> Result<(), ApiError> {
        let path = format!("/api/v1/notifications/{id}/dismiss");
        self.inner.post(&path, None).await?;
        Ok(())
    }

    /// The account the access token belongs to.
    pub async fn verify_credentials(&self) -> Result<Account, ApiError> {
        let path = "/api/v1/accounts/verify_credentials";
        let value = self.inner.get(path, &[]).await?;
        decode(path, value)
    }

    /// Publish a new post.
    pub async fn publish(&self, draft: &StatusDraft) -> Result<Post, ApiError> {
        let path = "/api/v1/statuses";
        let body = serde_json::to_value(draft).map_err(|e| ApiError::Decode {
            endpoint: path.to_string(),
            message: e.to_string(),
        })?;
        let value = self.inner.post(path, Some(body)).await?;
        decode(path, value)
    }

    /// Open the streaming subscription for `kind`.
    pub async fn stream(&self, kind: &TimelineKind) -> Result<StreamHandle, ApiError> {
        self.inner.stream(&kind.stream_path()).await
    }

    async fn status_action(&self, id: &PostId, action: &str) -> Result<Post, ApiError> {
        let path = format!("/api/v1/statuses/{id}/{action}");
        let value = self.inner.post(&path, None).await?;
        decode(&path, value)
    }
}

/// Validate a payload against the endpoint's schema.
fn decode<T: DeserializeOwned>(endpoint: &str, value: Value) -> Result<T, ApiError> {
    serde_json::from_value(value).map_err(|e| ApiError::Decode {
        endpoint: endpoint.to_string(),
        message: e.to_string(),
    })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Records calls and answers with a canned value.
    struct Canned {
        answer: Value,
        calls: Mutex<Vec<(String, String, Vec<(String, String)>)>>,
    }

    impl Canned {
        fn new(answer: Value) -> Arc<Self> {
            Arc::new(Self { answer, calls: Mutex::new(Vec::new()) })
        }

        fn calls(&self) -> Vec<(String, String, Vec<(String, String)>)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl MastodonApi for Canned {
        async fn get(&self, path: &str, params: &[(&str, String)]) -> Result<Value, ApiError> {
            let params = params.iter().map(|(k, v)| (k.to_string(), v.clone())).collect();
            self.calls.lock().unwrap().push(("GET".into(), path.into(), params));
            Ok(self.answer.clone())
        }

        async fn post(&self, path: &str, _body: Option<Value>) -> Result<Value, ApiError> {
            self.calls.lock().unwrap().push(("POST".into(), path.into(), Vec::new()));
            Ok(self.answer.clone())
        }

        async fn stream(&self, _path: &str) -> Result<StreamHandle, ApiError> {
            Ok(StreamHandle::channel(1).1)
        }
    }

    fn status(id: &str) -> Value {
        serde_json::json!({
            "id": id,
            "created_at": "2024-01-01T00:00:00Z",
            "content": "",
            "account": {"id": "1", "username": "amy", "acct": "amy"}
        })
    }

    #[tokio::test]
    async fn test_timeline_params() {
        let canned = Canned::new(serde_json::json!([status("3"), status("2")]));
        let api = Api::new(canned.clone());

        let posts = api
            .timeline(&TimelineKind::Local, Some(&PostId::new("4")), 20)
            .await
            .unwrap();
        assert_eq!(posts.len(), 2);

        let calls = canned.calls();
        assert_eq!(calls[0].1, "/api/v1/timelines/public");
        assert_eq!(
            calls[0].2,
            vec![
                ("local".to_string(), "true".to_string()),
                ("limit".to_string(), "20".to_string()),
                ("max_id".to_string(), "4".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_reblog_unwraps_wrapper() {
        let mut wrapper = status("900");
        wrapper["reblog"] = status("5");
        let canned = Canned::new(wrapper);
        let api = Api::new(canned.clone());

        let post = api.reblog(&PostId::new("5")).await.unwrap();
        assert_eq!(post.id, "5");
        assert_eq!(canned.calls()[0].1, "/api/v1/statuses/5/reblog");
    }

    #[tokio::test]
    async fn test_decode_error_names_endpoint() {
        let api = Api::new(Canned::new(serde_json::json!({"unexpected": true})));
        let err = api.favourite(&PostId::new("1")).await.unwrap_err();
        match err {
            ApiError::Decode { endpoint, .. } => {
                assert_eq!(endpoint, "/api/v1/statuses/1/favourite")
            }
            other => panic!("expected decode error, got {other}"),
        }
    }

    #[tokio::test]
    async fn test_dismiss_ignores_body() {
        let canned = Canned::new(serde_json::json!({}));
        let api = Api::new(canned.clone());
        api.dismiss_notification(&NotificationId::new("8")).await.unwrap();
        assert_eq!(canned.calls()[0].1, "/api/v1/notifications/8/dismiss");
    }
}

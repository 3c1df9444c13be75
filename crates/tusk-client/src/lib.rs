//! tusk client library
//!
//! Follows a Mastodon-compatible timeline over the streaming API and keeps a
//! local view of it consistent: new posts are staged in a backlog, deletes
//! apply immediately, favourites and boosts are optimistic and rolled back
//! when the server refuses.
//!
//! Entry points: build an [`Api`] (usually via [`connect`]), then
//! [`spawn_timeline`] to get a [`TimelineHandle`].

pub mod actor;
pub mod api;
pub mod backlog;
pub mod config;
pub mod constants;
pub mod http;
pub mod notifications;
pub mod reconcile;
pub mod session;
pub mod sse;
pub mod subscriptions;
pub mod timeline;

pub use actor::{ActorError, TimelineHandle, ViewOptions, spawn_timeline};
pub use api::{Api, ApiError, MastodonApi};
pub use backlog::BacklogStager;
pub use config::{ClientConfig, ConfigError};
pub use http::{Backoff, HttpApi};
pub use notifications::NotificationFeed;
pub use reconcile::{
    DismissRequest, FetchRequest, MutationError, MutationRequest, NotificationRequest, Page,
    Reconciler, TimelineSnapshot, Toggle,
};
pub use session::Session;
pub use sse::{SseDecoder, SseFrame, SseItem, decode_frame};
pub use subscriptions::{
    LoadGeneration, Notice, NoticeKind, StreamEvent, StreamHandle, StreamSender, ViewEvent,
    ViewState,
};
pub use timeline::TimelineStore;

/// Build the session and HTTP API a config describes.
///
/// With `verify`, the token's account is looked up so the session knows who
/// it is; that is the first request the server sees.
pub async fn connect(config: &ClientConfig, verify: bool) -> Result<(Session, Api), ConnectError> {
    let mut session = config.session()?;
    let mut http = HttpApi::new(&session)?.with_backoff(config.backoff());
    if let Some(streaming) = config.streaming_url()? {
        http = http.with_streaming_base(streaming);
    }
    let api = Api::from_impl(http);
    if verify {
        session.verify(&api).await?;
    }
    Ok((session, api))
}

#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("API error: {0}")]
    Api(#[from] ApiError),
}

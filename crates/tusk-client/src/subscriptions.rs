//! Event types flowing into and out of a timeline view.
//!
//! ```text
//!   MastodonApi::stream()                        TimelineHandle::subscribe()
//!   ┌──────────────────┐   StreamEvent   ┌──────────────┐   ViewEvent   ┌────────┐
//!   │ transport task   │ ──────────────▶ │ TimelineActor│ ────────────▶ │   UI   │
//!   │ (SSE, reconnect) │      mpsc       │ (Reconciler) │   broadcast   │        │
//!   └──────────────────┘                 └──────────────┘               └────────┘
//! ```
//!
//! [`StreamEvent`] is what the server pushes, already decoded and validated.
//! [`ViewEvent`] is what a front-end needs to redraw: state transitions,
//! "something changed" ticks, forwarded notifications, and user-facing notices.

use std::fmt;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tusk_types::{Notification, Post, PostId};

// ============================================================================
// Stream events (collaborator → controller)
// ============================================================================

/// Events pushed by the server over a streaming subscription.
#[derive(Clone, Debug, PartialEq)]
pub enum StreamEvent {
    /// The transport (re)established its connection.
    Connect,
    /// A new post for this timeline.
    Update(Box<Post>),
    /// A post was deleted.
    Delete(PostId),
    /// A notification for the signed-in account.
    Notification(Box<Notification>),
    /// Transport or payload failure. The subscription stays alive; the
    /// transport decides whether and when to reconnect.
    Error(String),
    /// Keep-alive.
    Heartbeat,
}

impl StreamEvent {
    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Connect => "connect",
            Self::Update(_) => "update",
            Self::Delete(_) => "delete",
            Self::Notification(_) => "notification",
            Self::Error(_) => "error",
            Self::Heartbeat => "heartbeat",
        }
    }
}

/// Receiving end of a streaming subscription.
///
/// Dropping the handle or calling [`stop`](Self::stop) tears the
/// subscription down.
#[derive(Debug)]
pub struct StreamHandle {
    events: mpsc::Receiver<StreamEvent>,
    cancel: CancellationToken,
}

/// Sending end of a streaming subscription, held by the transport task.
#[derive(Clone, Debug)]
pub struct StreamSender {
    tx: mpsc::Sender<StreamEvent>,
    cancel: CancellationToken,
}

impl StreamHandle {
    /// Create a connected sender/handle pair.
    pub fn channel(capacity: usize) -> (StreamSender, StreamHandle) {
        let (tx, events) = mpsc::channel(capacity);
        let cancel = CancellationToken::new();
        (
            StreamSender { tx, cancel: cancel.clone() },
            StreamHandle { events, cancel },
        )
    }

    /// Next event in delivery order; `None` once the transport has gone away.
    pub async fn next_event(&mut self) -> Option<StreamEvent> {
        self.events.recv().await
    }

    /// Tear down the subscription.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Drop for StreamHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl StreamSender {
    /// Deliver an event. Returns `false` when the subscription was stopped
    /// or the handle dropped; the transport should exit.
    pub async fn send(&self, event: StreamEvent) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }
        tokio::select! {
            _ = self.cancel.cancelled() => false,
            sent = self.tx.send(event) => sent.is_ok(),
        }
    }

    /// Resolves once the subscription is stopped or the handle dropped.
    pub async fn stopped(&self) {
        tokio::select! {
            _ = self.cancel.cancelled() => {}
            _ = self.tx.closed() => {}
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled() || self.tx.is_closed()
    }
}

// ============================================================================
// View events (controller → subscribers)
// ============================================================================

/// Lifecycle of a timeline view.
///
/// ```text
/// Connecting ──connect──▶ Loading ──page ok──▶ Ready
///   ▲    │                   │                   │
///   └────┘           page err / stream error     stream error
/// stream error               ▼                   ▼
///  (notice only)          Errored ◀──────────────┘
///                            │
///                         refetch ──▶ Loading
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ViewState {
    #[default]
    Connecting,
    Loading,
    Ready,
    Errored,
}

impl fmt::Display for ViewState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Connecting => "connecting",
            Self::Loading => "loading",
            Self::Ready => "ready",
            Self::Errored => "errored",
        })
    }
}

/// Which kind of failure a notice reports.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NoticeKind {
    /// Stream-level error; shown as a banner, data kept.
    Connection,
    /// Initial load, re-fetch, or pagination failed.
    Fetch,
    /// Favourite/boost/dismiss was rolled back.
    Mutation,
}

/// A user-visible failure report.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
}

impl Notice {
    pub fn new(kind: NoticeKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self.kind {
            NoticeKind::Connection => "connection",
            NoticeKind::Fetch => "fetch",
            NoticeKind::Mutation => "action",
        };
        write!(f, "[{label}] {}", self.message)
    }
}

/// Events broadcast to view subscribers.
#[derive(Clone, Debug, PartialEq)]
pub enum ViewEvent {
    /// The view moved to a new lifecycle state.
    StateChanged(ViewState),
    /// The visible timeline changed; re-read it via a snapshot.
    TimelineChanged { len: usize },
    /// The backlog grew, shrank, or was flushed.
    BacklogChanged { len: usize },
    /// The notification feed changed.
    NotificationsChanged { len: usize },
    /// A pushed notification, forwarded unchanged.
    Notification(Box<Notification>),
    /// Stream keep-alive, forwarded unchanged.
    Heartbeat,
    /// Something failed and the user should know.
    Notice(Notice),
}

/// Monotonic load epoch, bumped on every initial load and re-fetch.
///
/// Fetch results tagged with an older generation are stale and dropped.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LoadGeneration(pub u64);

impl LoadGeneration {
    pub fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

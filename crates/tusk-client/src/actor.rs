//! Actor that owns one timeline view.
//!
//! A [`TimelineHandle`] is the `Send + Sync` front a UI talks to. The
//! [`TimelineActor`] runs in its own task and is the only thing that touches
//! the view's state, so stores need no locks. Remote calls run in spawned
//! tasks and come back as completions on a channel the actor also selects on.
//!
//! ```text
//!   TimelineHandle            mpsc           TimelineActor (tokio::spawn)
//!   ┌──────────────────┐  ───────────▶  ┌─────────────────────────────────┐
//!   │ .flush_backlog() │    commands    │ Reconciler                      │
//!   │ .toggle_*()      │  ◀───────────  │   ▲ stream events (StreamHandle)│
//!   │ .load_more()     │    oneshot     │   ▲ completions  ◀── api tasks  │
//!   │ .subscribe()     │  ◀═══════════  │   ═ view events (broadcast)     │
//!   └──────────────────┘                └─────────────────────────────────┘
//! ```
//!
//! Stopping (or dropping every handle) stops the stream, discards the backlog
//! and closes the completion channel: late results are dropped on the floor.

use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{Instrument, debug, info, info_span, warn};
use tusk_types::{NotificationId, PostId, TimelineKind};

use crate::api::{Api, ApiError};
use crate::constants::{DEFAULT_PAGE_SIZE, VIEW_EVENT_CAPACITY};
use crate::reconcile::{
    DismissRequest, FetchRequest, MutationError, MutationRequest, NotificationRequest, Reconciler,
    TimelineSnapshot, Toggle,
};
use crate::subscriptions::{StreamEvent, StreamHandle, ViewEvent};

// ============================================================================
// Error Type
// ============================================================================

/// Errors from the timeline actor.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ActorError {
    #[error("timeline view shut down")]
    Shutdown,
    #[error(transparent)]
    Mutation(#[from] MutationError),
}

// ============================================================================
// Commands and completions (internal)
// ============================================================================

enum ViewCommand {
    FlushBacklog {
        reply: oneshot::Sender<usize>,
    },
    Toggle {
        id: PostId,
        toggle: Toggle,
        reply: oneshot::Sender<Result<(), ActorError>>,
    },
    LoadMore {
        reply: oneshot::Sender<bool>,
    },
    Refetch {
        reply: oneshot::Sender<bool>,
    },
    LoadNotifications {
        reply: oneshot::Sender<bool>,
    },
    DismissNotification {
        id: NotificationId,
        reply: oneshot::Sender<Result<(), ActorError>>,
    },
    Snapshot {
        reply: oneshot::Sender<TimelineSnapshot>,
    },
    Stop {
        reply: oneshot::Sender<()>,
    },
}

/// Outcome of a spawned remote call.
enum Completion {
    Fetch(FetchRequest, Result<Vec<tusk_types::Post>, ApiError>),
    Mutation(MutationRequest, Result<tusk_types::Post, ApiError>),
    Notifications(NotificationRequest, Result<Vec<tusk_types::Notification>, ApiError>),
    Dismiss(DismissRequest, Result<(), ApiError>),
}

// ============================================================================
// TimelineHandle (public API)
// ============================================================================

/// Options for [`spawn_timeline`].
#[derive(Clone, Debug)]
pub struct ViewOptions {
    /// `limit` for timeline and notification pages.
    pub page_size: u32,
}

impl Default for ViewOptions {
    fn default() -> Self {
        Self { page_size: DEFAULT_PAGE_SIZE }
    }
}

/// Cloneable handle to a running timeline view.
#[derive(Clone)]
pub struct TimelineHandle {
    tx: mpsc::UnboundedSender<ViewCommand>,
    events: broadcast::Sender<ViewEvent>,
    kind: TimelineKind,
}

impl TimelineHandle {
    pub fn kind(&self) -> &TimelineKind {
        &self.kind
    }

    /// Receive view events from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<ViewEvent> {
        self.events.subscribe()
    }

    /// Whether the actor has exited.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Show staged posts. Returns how many were inserted.
    pub async fn flush_backlog(&self) -> Result<usize, ActorError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(ViewCommand::FlushBacklog { reply })
            .map_err(|_| ActorError::Shutdown)?;
        rx.await.map_err(|_| ActorError::Shutdown)
    }

    /// Optimistically favourite or unfavourite. Returns once the local flip
    /// is applied; the server's answer arrives as view events.
    pub async fn toggle_favourite(&self, id: &str) -> Result<(), ActorError> {
        self.toggle(id, Toggle::Favourite).await
    }

    /// Optimistically boost or unboost.
    pub async fn toggle_reblog(&self, id: &str) -> Result<(), ActorError> {
        self.toggle(id, Toggle::Reblog).await
    }

    async fn toggle(&self, id: &str, toggle: Toggle) -> Result<(), ActorError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(ViewCommand::Toggle { id: PostId::new(id), toggle, reply })
            .map_err(|_| ActorError::Shutdown)?;
        rx.await.map_err(|_| ActorError::Shutdown)?
    }

    /// Request older posts. `false` when a page is already on its way or
    /// there is nothing to page from.
    pub async fn load_more(&self) -> Result<bool, ActorError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(ViewCommand::LoadMore { reply })
            .map_err(|_| ActorError::Shutdown)?;
        rx.await.map_err(|_| ActorError::Shutdown)
    }

    /// Re-fetch the first page, replacing the view.
    pub async fn refetch(&self) -> Result<bool, ActorError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(ViewCommand::Refetch { reply })
            .map_err(|_| ActorError::Shutdown)?;
        rx.await.map_err(|_| ActorError::Shutdown)
    }

    /// Fetch the first page of notifications.
    pub async fn load_notifications(&self) -> Result<bool, ActorError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(ViewCommand::LoadNotifications { reply })
            .map_err(|_| ActorError::Shutdown)?;
        rx.await.map_err(|_| ActorError::Shutdown)
    }

    /// Optimistically dismiss a notification.
    pub async fn dismiss_notification(&self, id: &str) -> Result<(), ActorError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(ViewCommand::DismissNotification { id: NotificationId::new(id), reply })
            .map_err(|_| ActorError::Shutdown)?;
        rx.await.map_err(|_| ActorError::Shutdown)?
    }

    pub async fn snapshot(&self) -> Result<TimelineSnapshot, ActorError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(ViewCommand::Snapshot { reply })
            .map_err(|_| ActorError::Shutdown)?;
        rx.await.map_err(|_| ActorError::Shutdown)
    }

    /// Unmount the view. Safe to call more than once.
    pub async fn stop(&self) {
        let (reply, rx) = oneshot::channel();
        if self.tx.send(ViewCommand::Stop { reply }).is_ok() {
            let _ = rx.await;
        }
    }
}

// ============================================================================
// TimelineActor (internal)
// ============================================================================

struct TimelineActor {
    api: Api,
    kind: TimelineKind,
    reconciler: Reconciler,
    stream: StreamHandle,
    /// `false` once the transport's channel has closed.
    stream_open: bool,
    events: broadcast::Sender<ViewEvent>,
    done_tx: mpsc::UnboundedSender<Completion>,
}

impl TimelineActor {
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<ViewCommand>,
        mut done_rx: mpsc::UnboundedReceiver<Completion>,
    ) {
        info!("timeline view started");
        loop {
            tokio::select! {
                cmd = commands.recv() => {
                    let Some(cmd) = cmd else {
                        debug!("all handles dropped");
                        break;
                    };
                    if let Some(reply) = self.handle_command(cmd) {
                        self.shutdown();
                        let _ = reply.send(());
                        return;
                    }
                }
                event = self.stream.next_event(), if self.stream_open => {
                    match event {
                        Some(event) => self.handle_stream_event(event),
                        None => {
                            warn!("stream transport went away");
                            self.stream_open = false;
                            self.handle_stream_event(StreamEvent::Error("stream closed".to_string()));
                        }
                    }
                }
                Some(done) = done_rx.recv() => self.handle_completion(done),
            }
            self.publish();
        }
        self.shutdown();
    }

    /// Returns the reply channel when the command was `Stop`.
    fn handle_command(&mut self, cmd: ViewCommand) -> Option<oneshot::Sender<()>> {
        match cmd {
            ViewCommand::FlushBacklog { reply } => {
                let _ = reply.send(self.reconciler.flush_backlog());
            }
            ViewCommand::Toggle { id, toggle, reply } => {
                let result = self.reconciler.begin_toggle(&id, toggle);
                let _ = reply.send(match result {
                    Ok(request) => {
                        self.spawn_mutation(request);
                        Ok(())
                    }
                    Err(e) => Err(e.into()),
                });
            }
            ViewCommand::LoadMore { reply } => {
                let request = self.reconciler.load_more();
                let _ = reply.send(request.is_some());
                if let Some(request) = request {
                    self.spawn_fetch(request);
                }
            }
            ViewCommand::Refetch { reply } => {
                let request = self.reconciler.refetch();
                let _ = reply.send(request.is_some());
                if let Some(request) = request {
                    self.spawn_fetch(request);
                }
            }
            ViewCommand::LoadNotifications { reply } => {
                let request = self.reconciler.load_notifications();
                let _ = reply.send(request.is_some());
                if let Some(request) = request {
                    self.spawn_notifications(request);
                }
            }
            ViewCommand::DismissNotification { id, reply } => {
                let result = self.reconciler.begin_dismiss(&id);
                let _ = reply.send(match result {
                    Ok(request) => {
                        self.spawn_dismiss(request);
                        Ok(())
                    }
                    Err(e) => Err(e.into()),
                });
            }
            ViewCommand::Snapshot { reply } => {
                let _ = reply.send(self.reconciler.snapshot());
            }
            ViewCommand::Stop { reply } => return Some(reply),
        }
        None
    }

    fn handle_stream_event(&mut self, event: StreamEvent) {
        debug!(event = event.name(), "stream event");
        if let Some(request) = self.reconciler.apply_stream_event(event) {
            self.spawn_fetch(request);
        }
    }

    fn handle_completion(&mut self, done: Completion) {
        match done {
            Completion::Fetch(request, result) => self.reconciler.apply_fetch_result(request, result),
            Completion::Mutation(request, result) => {
                self.reconciler.apply_mutation_result(request, result)
            }
            Completion::Notifications(request, result) => {
                self.reconciler.apply_notifications_result(request, result)
            }
            Completion::Dismiss(request, result) => {
                self.reconciler.apply_dismiss_result(request, result)
            }
        }
    }

    fn publish(&mut self) {
        for event in self.reconciler.take_events() {
            // No subscribers is fine.
            let _ = self.events.send(event);
        }
    }

    fn shutdown(&mut self) {
        self.stream.stop();
        self.reconciler.dispose();
        info!("timeline view stopped");
    }

    // ── Remote calls ─────────────────────────────────────────────────────

    fn spawn_fetch(&self, request: FetchRequest) {
        let api = self.api.clone();
        let kind = self.kind.clone();
        let done = self.done_tx.clone();
        tokio::spawn(
            async move {
                let result = api.timeline(&kind, request.max_id(), request.limit).await;
                let _ = done.send(Completion::Fetch(request, result));
            }
            .in_current_span(),
        );
    }

    fn spawn_mutation(&self, request: MutationRequest) {
        let api = self.api.clone();
        let done = self.done_tx.clone();
        tokio::spawn(
            async move {
                let id = &request.target_id;
                let result = match (request.toggle, request.desired) {
                    (Toggle::Favourite, true) => api.favourite(id).await,
                    (Toggle::Favourite, false) => api.unfavourite(id).await,
                    (Toggle::Reblog, true) => api.reblog(id).await,
                    (Toggle::Reblog, false) => api.unreblog(id).await,
                };
                let _ = done.send(Completion::Mutation(request, result));
            }
            .in_current_span(),
        );
    }

    fn spawn_notifications(&self, request: NotificationRequest) {
        let api = self.api.clone();
        let done = self.done_tx.clone();
        tokio::spawn(
            async move {
                let result = api.notifications(None, request.limit).await;
                let _ = done.send(Completion::Notifications(request, result));
            }
            .in_current_span(),
        );
    }

    fn spawn_dismiss(&self, request: DismissRequest) {
        let api = self.api.clone();
        let done = self.done_tx.clone();
        tokio::spawn(
            async move {
                let result = api.dismiss_notification(&request.id).await;
                let _ = done.send(Completion::Dismiss(request, result));
            }
            .in_current_span(),
        );
    }
}

// ============================================================================
// Public spawn function
// ============================================================================

/// Open the stream for `kind` and spawn a view actor over it.
///
/// The view starts in `Connecting`; the first `connect` from the stream
/// triggers the initial page load. Must be called inside a Tokio runtime.
pub async fn spawn_timeline(
    api: Api,
    kind: TimelineKind,
    options: ViewOptions,
) -> Result<TimelineHandle, ApiError> {
    let stream = api.stream(&kind).await?;
    let (tx, commands) = mpsc::unbounded_channel();
    let (done_tx, done_rx) = mpsc::unbounded_channel();
    let (events, _) = broadcast::channel(VIEW_EVENT_CAPACITY);

    let actor = TimelineActor {
        api,
        kind: kind.clone(),
        reconciler: Reconciler::new(options.page_size),
        stream,
        stream_open: true,
        events: events.clone(),
        done_tx,
    };
    let span = info_span!("timeline", %kind);
    tokio::spawn(actor.run(commands, done_rx).instrument(span));

    Ok(TimelineHandle { tx, events, kind })
}

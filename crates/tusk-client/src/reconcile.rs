//! View reconciliation: stream events, fetch results and optimistic
//! mutations folded into one timeline view's state.
//!
//! [`Reconciler`] is synchronous and owns everything: the
//! [`TimelineStore`], the [`BacklogStager`], the [`NotificationFeed`] and the
//! lifecycle state. It never performs I/O. Operations that need the server
//! return a request describing the call; whoever performs it (the
//! [`TimelineActor`](crate::actor)) hands the outcome back through the
//! matching `apply_*` method. That keeps every decision here unit-testable.
//!
//! # Rules
//!
//! - `connect` while `Connecting` starts the initial load. Later reconnects
//!   only log; the view keeps what it has. A stream `error` before the
//!   first `connect` reports a notice and leaves the view `Connecting`.
//! - `update` is staged in the backlog, never shown directly.
//! - `delete` removes the post (and boosts of it) from both store and backlog.
//! - Every initial load / re-fetch bumps the [`LoadGeneration`]; results
//!   tagged with an older generation are dropped.
//! - At most one pagination request and one round-trip per (post, toggle).
//! - Failures become [`Notice`]s. Only `refetch` leaves `Errored`.

use std::collections::HashSet;
use std::fmt;

use tracing::{debug, info, trace, warn};
use tusk_types::{Notification, NotificationId, Post, PostId};

use crate::api::ApiError;
use crate::backlog::BacklogStager;
use crate::notifications::NotificationFeed;
use crate::subscriptions::{LoadGeneration, Notice, NoticeKind, StreamEvent, ViewEvent, ViewState};
use crate::timeline::TimelineStore;

// ============================================================================
// Requests and errors
// ============================================================================

/// Viewer flag that can be toggled optimistically.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Toggle {
    Favourite,
    Reblog,
}

impl Toggle {
    fn flag(self, post: &Post) -> bool {
        match self {
            Self::Favourite => post.target().favourited,
            Self::Reblog => post.target().reblogged,
        }
    }

    fn set(self, post: &Post, value: bool) -> Post {
        match self {
            Self::Favourite => post.with_favourited(value),
            Self::Reblog => post.with_reblogged(value),
        }
    }

    fn other(self) -> Self {
        match self {
            Self::Favourite => Self::Reblog,
            Self::Reblog => Self::Favourite,
        }
    }
}

impl fmt::Display for Toggle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Favourite => "favourite",
            Self::Reblog => "boost",
        })
    }
}

/// Which page a fetch asks for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Page {
    /// Newest page; replaces the store.
    First,
    /// Posts strictly older than the cursor; appended.
    Older(PostId),
}

/// A timeline fetch to perform.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchRequest {
    pub generation: LoadGeneration,
    pub page: Page,
    pub limit: u32,
}

impl FetchRequest {
    pub fn max_id(&self) -> Option<&PostId> {
        match &self.page {
            Page::First => None,
            Page::Older(cursor) => Some(cursor),
        }
    }
}

/// A favourite/boost round-trip to perform.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MutationRequest {
    /// The post acted on (the boosted post for a boost wrapper).
    pub target_id: PostId,
    pub toggle: Toggle,
    /// Flag value the server should end up with.
    pub desired: bool,
    /// Flag value before the optimistic flip; restored on failure.
    pub previous: bool,
}

/// A notification page fetch to perform.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NotificationRequest {
    pub generation: LoadGeneration,
    pub limit: u32,
}

/// A notification dismissal to perform.
#[derive(Clone, Debug, PartialEq)]
pub struct DismissRequest {
    pub id: NotificationId,
    /// Where it sat, for restoring on failure.
    pub index: usize,
    pub notification: Notification,
}

/// Why a local mutation could not start.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MutationError {
    #[error("no such entry: {0}")]
    NotFound(String),
    #[error("{action} already in progress for {id}")]
    InFlight { id: String, action: String },
}

/// Read-only copy of a view.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TimelineSnapshot {
    pub state: ViewState,
    pub generation: LoadGeneration,
    pub posts: Vec<Post>,
    pub backlog: Vec<Post>,
    pub notifications: Vec<Notification>,
    pub loading_more: bool,
}

// ============================================================================
// Reconciler
// ============================================================================

/// All state of one timeline view.
#[derive(Debug)]
pub struct Reconciler {
    state: ViewState,
    page_size: u32,
    store: TimelineStore,
    backlog: BacklogStager,
    notifications: NotificationFeed,
    generation: LoadGeneration,
    loading_more: bool,
    /// (target post, toggle) pairs with a round-trip outstanding.
    in_flight: HashSet<(PostId, Toggle)>,
    notifications_generation: LoadGeneration,
    notifications_loading: bool,
    /// Pushed while a notification page was in flight; re-applied on top of it.
    pushed_while_loading: Vec<Notification>,
    dismissing: HashSet<NotificationId>,
    events: Vec<ViewEvent>,
    disposed: bool,
}

impl Reconciler {
    pub fn new(page_size: u32) -> Self {
        Self {
            state: ViewState::Connecting,
            page_size,
            store: TimelineStore::new(),
            backlog: BacklogStager::new(),
            notifications: NotificationFeed::new(),
            generation: LoadGeneration::default(),
            loading_more: false,
            in_flight: HashSet::new(),
            notifications_generation: LoadGeneration::default(),
            notifications_loading: false,
            pushed_while_loading: Vec::new(),
            dismissing: HashSet::new(),
            events: Vec::new(),
            disposed: false,
        }
    }

    pub fn state(&self) -> ViewState {
        self.state
    }

    pub fn generation(&self) -> LoadGeneration {
        self.generation
    }

    pub fn store(&self) -> &TimelineStore {
        &self.store
    }

    pub fn backlog(&self) -> &BacklogStager {
        &self.backlog
    }

    pub fn notifications(&self) -> &NotificationFeed {
        &self.notifications
    }

    pub fn is_loading_more(&self) -> bool {
        self.loading_more
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Drain the view events produced since the last call.
    pub fn take_events(&mut self) -> Vec<ViewEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn snapshot(&self) -> TimelineSnapshot {
        TimelineSnapshot {
            state: self.state,
            generation: self.generation,
            posts: self.store.to_vec(),
            backlog: self.backlog.to_vec(),
            notifications: self.notifications.to_vec(),
            loading_more: self.loading_more,
        }
    }

    // ── Stream ───────────────────────────────────────────────────────────

    /// Fold one stream event into the view. Returns the initial fetch to
    /// perform when the event was the first `connect`.
    pub fn apply_stream_event(&mut self, event: StreamEvent) -> Option<FetchRequest> {
        if self.disposed {
            return None;
        }
        match event {
            StreamEvent::Connect => {
                if self.state == ViewState::Connecting {
                    info!("stream connected, loading first page");
                    return Some(self.begin_load());
                }
                debug!(state = %self.state, "stream reconnected");
            }
            StreamEvent::Update(post) => self.stage(*post),
            StreamEvent::Delete(id) => self.delete(&id),
            StreamEvent::Notification(notification) => self.push_notification(*notification),
            StreamEvent::Heartbeat => self.events.push(ViewEvent::Heartbeat),
            StreamEvent::Error(message) => {
                warn!(%message, state = %self.state, "stream error");
                // Nothing loaded yet; the first `connect` still has to start the load.
                if self.state != ViewState::Connecting {
                    self.set_state(ViewState::Errored);
                }
                self.notice(NoticeKind::Connection, message);
            }
        }
        None
    }

    fn stage(&mut self, post: Post) {
        if self.store.contains(&post.id) {
            debug!(id = %post.id, "update for a post already shown, not staging");
            return;
        }
        if self.backlog.contains(&post.id) {
            trace!(id = %post.id, "already staged");
            return;
        }
        let id = post.id.clone();
        if self.backlog.stage(post) {
            debug!(%id, backlog = self.backlog.len(), "staged post");
            self.events.push(ViewEvent::BacklogChanged { len: self.backlog.len() });
        }
    }

    fn delete(&mut self, id: &PostId) {
        let from_store = usize::from(self.store.remove_by_id(id).is_some())
            + self.store.remove_reblogs_of(id);
        let from_backlog = usize::from(self.backlog.remove_by_id(id).is_some())
            + self.backlog.remove_reblogs_of(id);
        debug!(%id, from_store, from_backlog, "delete");

        if from_store > 0 {
            self.events.push(ViewEvent::TimelineChanged { len: self.store.len() });
        }
        if from_backlog > 0 {
            self.events.push(ViewEvent::BacklogChanged { len: self.backlog.len() });
        }
    }

    fn push_notification(&mut self, notification: Notification) {
        if self.notifications_loading {
            self.pushed_while_loading.push(notification.clone());
        }
        if self.notifications.insert_at_head(notification.clone()) {
            self.events.push(ViewEvent::NotificationsChanged { len: self.notifications.len() });
        }
        self.events.push(ViewEvent::Notification(Box::new(notification)));
    }

    // ── Loading ──────────────────────────────────────────────────────────

    fn begin_load(&mut self) -> FetchRequest {
        self.generation = self.generation.next();
        // Any pagination in flight belongs to the old generation now.
        self.loading_more = false;
        self.set_state(ViewState::Loading);
        FetchRequest { generation: self.generation, page: Page::First, limit: self.page_size }
    }

    /// Explicit re-fetch of the first page. The only way out of `Errored`.
    pub fn refetch(&mut self) -> Option<FetchRequest> {
        if self.disposed {
            return None;
        }
        info!(state = %self.state, "re-fetching first page");
        Some(self.begin_load())
    }

    /// Request the page older than the last post, unless one is already
    /// outstanding, the view is still loading, or there is no cursor.
    pub fn load_more(&mut self) -> Option<FetchRequest> {
        if self.disposed || self.loading_more {
            return None;
        }
        if matches!(self.state, ViewState::Connecting | ViewState::Loading) {
            debug!(state = %self.state, "load_more before first page, ignoring");
            return None;
        }
        let cursor = self.store.last()?.id.clone();
        self.loading_more = true;
        debug!(%cursor, "loading older posts");
        Some(FetchRequest {
            generation: self.generation,
            page: Page::Older(cursor),
            limit: self.page_size,
        })
    }

    pub fn apply_fetch_result(&mut self, request: FetchRequest, result: Result<Vec<Post>, ApiError>) {
        if self.disposed {
            return;
        }
        if request.generation != self.generation {
            debug!(
                stale = request.generation.0,
                current = self.generation.0,
                "dropping stale fetch result"
            );
            return;
        }

        match (request.page, result) {
            (Page::First, Ok(posts)) => {
                self.store.replace_all(posts);
                let dropped = self.backlog.discard_shown(&self.store);
                info!(posts = self.store.len(), "first page loaded");
                self.events.push(ViewEvent::TimelineChanged { len: self.store.len() });
                if dropped > 0 {
                    self.events.push(ViewEvent::BacklogChanged { len: self.backlog.len() });
                }
                if self.state == ViewState::Loading {
                    self.set_state(ViewState::Ready);
                }
            }
            (Page::First, Err(e)) => {
                warn!(error = %e, "first page failed");
                self.set_state(ViewState::Errored);
                self.notice(NoticeKind::Fetch, format!("could not load timeline: {e}"));
            }
            (Page::Older(cursor), Ok(posts)) => {
                self.loading_more = false;
                let received = posts.len();
                let appended = self.store.append_page(posts);
                debug!(%cursor, received, appended, "older page loaded");
                if appended > 0 {
                    self.events.push(ViewEvent::TimelineChanged { len: self.store.len() });
                }
            }
            (Page::Older(cursor), Err(e)) => {
                self.loading_more = false;
                warn!(%cursor, error = %e, "older page failed");
                self.notice(NoticeKind::Fetch, format!("could not load older posts: {e}"));
            }
        }
    }

    // ── Backlog ──────────────────────────────────────────────────────────

    /// Show everything staged. Returns the number of posts inserted.
    pub fn flush_backlog(&mut self) -> usize {
        if self.disposed || self.backlog.is_empty() {
            return 0;
        }
        let inserted = self.backlog.flush_into(&mut self.store);
        info!(inserted, "backlog flushed");
        self.events.push(ViewEvent::BacklogChanged { len: 0 });
        if inserted > 0 {
            self.events.push(ViewEvent::TimelineChanged { len: self.store.len() });
        }
        inserted
    }

    // ── Optimistic toggles ───────────────────────────────────────────────

    /// Flip `toggle` on the entry `id` locally and describe the round-trip
    /// that confirms it.
    ///
    /// `id` may name a boost wrapper or the boosted post itself; either way
    /// the action applies to the boosted post.
    pub fn begin_toggle(&mut self, id: &str, toggle: Toggle) -> Result<MutationRequest, MutationError> {
        let entry = self
            .store
            .find_referring(id)
            .ok_or_else(|| MutationError::NotFound(id.to_string()))?;
        let target_id = entry.target().id.clone();
        let previous = toggle.flag(entry);
        let desired = !previous;

        if !self.in_flight.insert((target_id.clone(), toggle)) {
            return Err(MutationError::InFlight {
                id: target_id.to_string(),
                action: toggle.to_string(),
            });
        }

        self.set_flag_everywhere(&target_id, toggle, desired);
        debug!(post = %target_id, %toggle, desired, "optimistic toggle");
        Ok(MutationRequest { target_id, toggle, desired, previous })
    }

    /// Settle a toggle: keep the server's record, or roll the flag back.
    pub fn apply_mutation_result(&mut self, request: MutationRequest, result: Result<Post, ApiError>) {
        let MutationRequest { target_id, toggle, desired, previous } = request;
        self.in_flight.remove(&(target_id.clone(), toggle));
        if self.disposed {
            return;
        }

        match result {
            Ok(confirmed) if confirmed.id == target_id => {
                let confirmed = self.keep_pending_flags(&target_id, toggle, confirmed);
                self.store.update_referring(&target_id, |p| p.with_confirmed(confirmed.clone()));
                self.backlog.update_referring(&target_id, |p| p.with_confirmed(confirmed.clone()));
                debug!(post = %target_id, %toggle, desired, "toggle confirmed");
                self.events.push(ViewEvent::TimelineChanged { len: self.store.len() });
            }
            Ok(other) => {
                // Success, but not a record we can merge; the optimistic flag stands.
                warn!(post = %target_id, got = %other.id, %toggle, "confirmation for a different post");
            }
            Err(e) => {
                warn!(post = %target_id, %toggle, error = %e, "toggle failed, reverting");
                self.set_flag_everywhere(&target_id, toggle, previous);
                let verb = match (toggle, desired) {
                    (Toggle::Favourite, true) => "favourite",
                    (Toggle::Favourite, false) => "unfavourite",
                    (Toggle::Reblog, true) => "boost",
                    (Toggle::Reblog, false) => "unboost",
                };
                self.notice(NoticeKind::Mutation, format!("could not {verb} post: {e}"));
            }
        }
    }

    fn set_flag_everywhere(&mut self, target_id: &str, toggle: Toggle, value: bool) {
        let shown = self.store.update_referring(target_id, |p| toggle.set(p, value));
        self.backlog.update_referring(target_id, |p| toggle.set(p, value));
        if shown > 0 {
            self.events.push(ViewEvent::TimelineChanged { len: self.store.len() });
        }
    }

    /// The server's record doesn't know about the other toggle's optimistic
    /// flip yet; carry it over so confirming one doesn't undo the other.
    fn keep_pending_flags(&self, target_id: &PostId, toggle: Toggle, confirmed: Post) -> Post {
        let other = toggle.other();
        if !self.in_flight.contains(&(target_id.clone(), other)) {
            return confirmed;
        }
        match self.store.find_referring(target_id) {
            Some(local) => other.set(&confirmed, other.flag(local)),
            None => confirmed,
        }
    }

    // ── Notifications ────────────────────────────────────────────────────

    /// Request the first notification page, unless one is outstanding.
    pub fn load_notifications(&mut self) -> Option<NotificationRequest> {
        if self.disposed || self.notifications_loading {
            return None;
        }
        self.notifications_generation = self.notifications_generation.next();
        self.notifications_loading = true;
        self.pushed_while_loading.clear();
        Some(NotificationRequest {
            generation: self.notifications_generation,
            limit: self.page_size,
        })
    }

    pub fn apply_notifications_result(
        &mut self,
        request: NotificationRequest,
        result: Result<Vec<Notification>, ApiError>,
    ) {
        if self.disposed || request.generation != self.notifications_generation {
            return;
        }
        self.notifications_loading = false;
        let pushed = std::mem::take(&mut self.pushed_while_loading);

        match result {
            Ok(page) => {
                let page = page.into_iter().filter(|n| !self.dismissing.contains(&n.id));
                self.notifications.replace_all(page);
                for notification in pushed {
                    if !self.dismissing.contains(&notification.id) {
                        self.notifications.insert_at_head(notification);
                    }
                }
                info!(notifications = self.notifications.len(), "notifications loaded");
                self.events.push(ViewEvent::NotificationsChanged { len: self.notifications.len() });
            }
            Err(e) => {
                warn!(error = %e, "notifications failed");
                self.notice(NoticeKind::Fetch, format!("could not load notifications: {e}"));
            }
        }
    }

    /// Remove a notification locally and describe the dismissal call.
    pub fn begin_dismiss(&mut self, id: &str) -> Result<DismissRequest, MutationError> {
        let (index, notification) = self
            .notifications
            .remove_by_id(id)
            .ok_or_else(|| MutationError::NotFound(id.to_string()))?;
        self.dismissing.insert(notification.id.clone());
        self.pushed_while_loading.retain(|n| n.id != notification.id);
        self.events.push(ViewEvent::NotificationsChanged { len: self.notifications.len() });
        Ok(DismissRequest { id: notification.id.clone(), index, notification })
    }

    /// Settle a dismissal; on failure the notification returns to its slot.
    pub fn apply_dismiss_result(&mut self, request: DismissRequest, result: Result<(), ApiError>) {
        self.dismissing.remove(&request.id);
        if self.disposed {
            return;
        }
        if let Err(e) = result {
            warn!(id = %request.id, error = %e, "dismiss failed, restoring");
            self.notifications.restore(request.index, request.notification);
            self.events.push(ViewEvent::NotificationsChanged { len: self.notifications.len() });
            self.notice(NoticeKind::Mutation, format!("could not dismiss notification: {e}"));
        }
    }

    // ── Lifecycle ────────────────────────────────────────────────────────

    /// Unmount: discard the backlog and ignore everything that arrives later.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        self.backlog.clear();
        self.in_flight.clear();
        self.events.clear();
        info!(posts = self.store.len(), "view disposed");
    }

    fn set_state(&mut self, state: ViewState) {
        if self.state == state {
            return;
        }
        debug!(from = %self.state, to = %state, "view state");
        self.state = state;
        self.events.push(ViewEvent::StateChanged(state));
    }

    fn notice(&mut self, kind: NoticeKind, message: impl Into<String>) {
        self.events.push(ViewEvent::Notice(Notice::new(kind, message)));
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tusk_types::{Account, NotificationKind, PostBuilder};

    fn post(id: &str) -> Post {
        PostBuilder::new(id, Account::new("1", "amy")).build()
    }

    fn boost(id: &str, inner: Post) -> Post {
        PostBuilder::new(id, Account::new("2", "bob")).reblog_of(inner).build()
    }

    fn note(id: &str) -> Notification {
        Notification::new(id, NotificationKind::Mention, Account::new("3", "cat"))
    }

    fn ids(posts: &[Post]) -> Vec<String> {
        posts.iter().map(|p| p.id.to_string()).collect()
    }

    fn store_ids(r: &Reconciler) -> Vec<String> {
        r.store().ids().map(|id| id.to_string()).collect()
    }

    fn backlog_ids(r: &Reconciler) -> Vec<String> {
        r.backlog().iter().map(|p| p.id.to_string()).collect()
    }

    fn notices(events: &[ViewEvent]) -> Vec<&Notice> {
        events
            .iter()
            .filter_map(|e| match e {
                ViewEvent::Notice(n) => Some(n),
                _ => None,
            })
            .collect()
    }

    /// A reconciler that went through connect + first page `ids`.
    fn ready_with(ids: &[&str]) -> Reconciler {
        let mut r = Reconciler::new(20);
        let req = r.apply_stream_event(StreamEvent::Connect).unwrap();
        r.apply_fetch_result(req, Ok(ids.iter().map(|id| post(id)).collect()));
        assert_eq!(r.state(), ViewState::Ready);
        r.take_events();
        r
    }

    fn err() -> ApiError {
        ApiError::Status { status: 500, message: "boom".into() }
    }

    #[test]
    fn test_connect_load_stage_flush() {
        let mut r = Reconciler::new(20);
        assert_eq!(r.state(), ViewState::Connecting);

        let req = r.apply_stream_event(StreamEvent::Connect).unwrap();
        assert_eq!(r.state(), ViewState::Loading);
        assert_eq!(req.page, Page::First);
        assert_eq!(req.limit, 20);
        assert_eq!(req.max_id(), None);

        r.apply_fetch_result(req, Ok(vec![post("A"), post("B"), post("C")]));
        assert_eq!(r.state(), ViewState::Ready);
        assert_eq!(store_ids(&r), ["A", "B", "C"]);

        r.apply_stream_event(StreamEvent::Update(Box::new(post("D"))));
        assert_eq!(backlog_ids(&r), ["D"]);
        assert_eq!(store_ids(&r), ["A", "B", "C"]);

        assert_eq!(r.flush_backlog(), 1);
        assert_eq!(store_ids(&r), ["D", "A", "B", "C"]);
        assert!(r.backlog().is_empty());

        let events = r.take_events();
        assert!(events.contains(&ViewEvent::StateChanged(ViewState::Loading)));
        assert!(events.contains(&ViewEvent::StateChanged(ViewState::Ready)));
        assert!(events.contains(&ViewEvent::BacklogChanged { len: 1 }));
        assert!(events.contains(&ViewEvent::BacklogChanged { len: 0 }));
        assert!(events.contains(&ViewEvent::TimelineChanged { len: 4 }));
    }

    #[test]
    fn test_delete_from_store() {
        let mut r = ready_with(&["A", "B", "C"]);
        r.apply_stream_event(StreamEvent::Delete(PostId::new("B")));
        assert_eq!(store_ids(&r), ["A", "C"]);
        assert_eq!(r.take_events(), vec![ViewEvent::TimelineChanged { len: 2 }]);
    }

    #[test]
    fn test_delete_backlog_only_post() {
        let mut r = ready_with(&["A", "B"]);
        r.apply_stream_event(StreamEvent::Update(Box::new(post("D"))));
        r.take_events();

        r.apply_stream_event(StreamEvent::Delete(PostId::new("D")));
        assert!(r.backlog().is_empty());
        assert_eq!(store_ids(&r), ["A", "B"]);
        assert_eq!(r.take_events(), vec![ViewEvent::BacklogChanged { len: 0 }]);
    }

    #[test]
    fn test_delete_removes_boosts_of_post() {
        let mut r = ready_with(&[]);
        let req = r.refetch().unwrap();
        r.apply_fetch_result(req, Ok(vec![post("A"), boost("W", post("X")), post("B")]));
        r.apply_stream_event(StreamEvent::Update(Box::new(boost("V", post("X")))));

        r.apply_stream_event(StreamEvent::Delete(PostId::new("X")));
        assert_eq!(store_ids(&r), ["A", "B"]);
        assert!(r.backlog().is_empty());
    }

    #[test]
    fn test_delete_unknown_is_noop() {
        let mut r = ready_with(&["A"]);
        r.apply_stream_event(StreamEvent::Delete(PostId::new("Z")));
        assert_eq!(store_ids(&r), ["A"]);
        assert!(r.take_events().is_empty());
    }

    #[test]
    fn test_update_then_delete_then_update_is_delivery_order() {
        let mut r = ready_with(&["A"]);
        r.apply_stream_event(StreamEvent::Update(Box::new(post("D"))));
        r.apply_stream_event(StreamEvent::Delete(PostId::new("D")));
        assert!(r.backlog().is_empty());
        r.apply_stream_event(StreamEvent::Update(Box::new(post("D"))));
        assert_eq!(backlog_ids(&r), ["D"]);
    }

    #[test]
    fn test_update_for_shown_post_not_staged() {
        let mut r = ready_with(&["A"]);
        r.apply_stream_event(StreamEvent::Update(Box::new(post("A"))));
        assert!(r.backlog().is_empty());
    }

    #[test]
    fn test_updates_before_first_page_are_staged_and_deduped() {
        let mut r = Reconciler::new(20);
        let req = r.apply_stream_event(StreamEvent::Connect).unwrap();
        r.apply_stream_event(StreamEvent::Update(Box::new(post("B"))));
        r.apply_stream_event(StreamEvent::Update(Box::new(post("Z"))));

        // The first page already contains B
        r.apply_fetch_result(req, Ok(vec![post("B"), post("A")]));
        assert_eq!(backlog_ids(&r), ["Z"]);
        r.flush_backlog();
        assert_eq!(store_ids(&r), ["Z", "B", "A"]);
    }

    #[test]
    fn test_first_page_failure_errors_and_refetch_recovers() {
        let mut r = Reconciler::new(20);
        let req = r.apply_stream_event(StreamEvent::Connect).unwrap();
        r.apply_fetch_result(req, Err(err()));
        assert_eq!(r.state(), ViewState::Errored);
        let events = r.take_events();
        assert_eq!(notices(&events)[0].kind, NoticeKind::Fetch);

        // Reconnect doesn't leave Errored
        assert!(r.apply_stream_event(StreamEvent::Connect).is_none());
        assert_eq!(r.state(), ViewState::Errored);

        let req = r.refetch().unwrap();
        assert_eq!(r.state(), ViewState::Loading);
        r.apply_fetch_result(req, Ok(vec![post("A")]));
        assert_eq!(r.state(), ViewState::Ready);
    }

    #[test]
    fn test_stream_error_keeps_data() {
        let mut r = ready_with(&["A", "B"]);
        r.apply_stream_event(StreamEvent::Error("connection reset".into()));
        assert_eq!(r.state(), ViewState::Errored);
        assert_eq!(store_ids(&r), ["A", "B"]);

        let events = r.take_events();
        assert_eq!(events[0], ViewEvent::StateChanged(ViewState::Errored));
        assert_eq!(notices(&events)[0].kind, NoticeKind::Connection);

        // Still consuming events
        r.apply_stream_event(StreamEvent::Update(Box::new(post("C"))));
        assert_eq!(backlog_ids(&r), ["C"]);
    }

    #[test]
    fn test_error_before_connect_still_loads() {
        let mut r = Reconciler::new(20);
        assert!(r.apply_stream_event(StreamEvent::Error("connection refused".into())).is_none());
        assert_eq!(r.state(), ViewState::Connecting);
        let events = r.take_events();
        assert_eq!(notices(&events)[0].kind, NoticeKind::Connection);
        assert!(!events.iter().any(|e| matches!(e, ViewEvent::StateChanged(_))));

        let req = r.apply_stream_event(StreamEvent::Connect).unwrap();
        assert_eq!(r.state(), ViewState::Loading);
        r.apply_fetch_result(req, Ok(vec![post("A")]));
        assert_eq!(r.state(), ViewState::Ready);
        assert_eq!(store_ids(&r), ["A"]);
    }

    #[test]
    fn test_first_page_after_stream_error_keeps_errored() {
        let mut r = Reconciler::new(20);
        let req = r.apply_stream_event(StreamEvent::Connect).unwrap();
        r.apply_stream_event(StreamEvent::Error("dropped".into()));
        r.apply_fetch_result(req, Ok(vec![post("A")]));
        assert_eq!(r.state(), ViewState::Errored);
        assert_eq!(store_ids(&r), ["A"]);
    }

    #[test]
    fn test_stale_generation_dropped() {
        let mut r = Reconciler::new(20);
        let first = r.apply_stream_event(StreamEvent::Connect).unwrap();
        let second = r.refetch().unwrap();
        assert!(second.generation > first.generation);

        r.apply_fetch_result(second, Ok(vec![post("new")]));
        r.apply_fetch_result(first, Ok(vec![post("old")]));
        assert_eq!(store_ids(&r), ["new"]);
    }

    #[test]
    fn test_stale_page_after_refetch_dropped() {
        let mut r = ready_with(&["A", "B"]);
        let more = r.load_more().unwrap();
        let refetch = r.refetch().unwrap();
        assert!(!r.is_loading_more());

        r.apply_fetch_result(more, Ok(vec![post("C")]));
        assert!(!r.store().contains("C"));
        r.apply_fetch_result(refetch, Ok(vec![post("X"), post("Y")]));
        assert_eq!(store_ids(&r), ["X", "Y"]);
    }

    #[test]
    fn test_refetch_replaces_store() {
        let mut r = ready_with(&["A", "B"]);
        let req = r.refetch().unwrap();
        r.apply_fetch_result(req, Ok(vec![post("C"), post("A")]));
        assert_eq!(store_ids(&r), ["C", "A"]);
    }

    #[test]
    fn test_load_more_appends_unseen_only() {
        let mut r = ready_with(&["A", "B", "C"]);
        let req = r.load_more().unwrap();
        assert_eq!(req.max_id(), Some(&PostId::new("C")));
        assert!(r.is_loading_more());

        r.apply_fetch_result(req, Ok(vec![post("C"), post("D"), post("E")]));
        assert_eq!(store_ids(&r), ["A", "B", "C", "D", "E"]);
        assert!(!r.is_loading_more());
    }

    #[test]
    fn test_load_more_guard() {
        let mut r = ready_with(&["A"]);
        let first = r.load_more();
        assert!(first.is_some());
        assert!(r.load_more().is_none());

        r.apply_fetch_result(first.unwrap(), Ok(vec![]));
        assert!(r.load_more().is_some());
    }

    #[test]
    fn test_load_more_needs_loaded_view_and_cursor() {
        let mut r = Reconciler::new(20);
        assert!(r.load_more().is_none());
        r.apply_stream_event(StreamEvent::Connect);
        assert!(r.load_more().is_none());

        let mut r = ready_with(&[]);
        assert!(r.load_more().is_none());
    }

    #[test]
    fn test_load_more_failure_keeps_posts() {
        let mut r = ready_with(&["A", "B"]);
        let req = r.load_more().unwrap();
        r.apply_fetch_result(req, Err(err()));

        assert_eq!(store_ids(&r), ["A", "B"]);
        assert_eq!(r.state(), ViewState::Ready);
        assert!(!r.is_loading_more());
        let events = r.take_events();
        assert_eq!(notices(&events)[0].kind, NoticeKind::Fetch);
    }

    #[test]
    fn test_optimistic_favourite_reverts_on_failure() {
        let mut r = ready_with(&["A"]);
        assert!(!r.store().get("A").unwrap().favourited);

        let req = r.begin_toggle("A", Toggle::Favourite).unwrap();
        assert!(req.desired);
        assert!(!req.previous);
        assert!(r.store().get("A").unwrap().favourited);
        assert_eq!(r.store().get("A").unwrap().favourites_count, 1);

        r.apply_mutation_result(req, Err(err()));
        assert!(!r.store().get("A").unwrap().favourited);
        assert_eq!(r.store().get("A").unwrap().favourites_count, 0);
        let events = r.take_events();
        let notice = notices(&events)[0];
        assert_eq!(notice.kind, NoticeKind::Mutation);
        assert!(notice.message.contains("favourite"));
    }

    #[test]
    fn test_confirmed_record_replaces_optimistic() {
        let mut r = ready_with(&["A"]);
        let req = r.begin_toggle("A", Toggle::Favourite).unwrap();

        let confirmed = PostBuilder::new("A", Account::new("1", "amy"))
            .favourited(true)
            .favourites(42)
            .build();
        r.apply_mutation_result(req, Ok(confirmed));
        let shown = r.store().get("A").unwrap();
        assert!(shown.favourited);
        assert_eq!(shown.favourites_count, 42);
    }

    #[test]
    fn test_toggle_in_flight_rejected() {
        let mut r = ready_with(&["A"]);
        let req = r.begin_toggle("A", Toggle::Favourite).unwrap();
        assert!(matches!(
            r.begin_toggle("A", Toggle::Favourite),
            Err(MutationError::InFlight { .. })
        ));
        // A different toggle on the same post is independent
        assert!(r.begin_toggle("A", Toggle::Reblog).is_ok());

        r.apply_mutation_result(req, Err(err()));
        // Settled: a new favourite attempt may start
        assert!(r.begin_toggle("A", Toggle::Favourite).is_ok());
    }

    #[test]
    fn test_confirmation_keeps_other_pending_toggle() {
        let mut r = ready_with(&["A"]);
        let fav = r.begin_toggle("A", Toggle::Favourite).unwrap();
        let _boost = r.begin_toggle("A", Toggle::Reblog).unwrap();

        // Server's favourite response predates the boost
        let confirmed = PostBuilder::new("A", Account::new("1", "amy")).favourited(true).favourites(1).build();
        r.apply_mutation_result(fav, Ok(confirmed));

        let shown = r.store().get("A").unwrap();
        assert!(shown.favourited);
        assert!(shown.reblogged);
    }

    #[test]
    fn test_toggle_on_boost_acts_on_inner_post() {
        let mut r = ready_with(&[]);
        let req = r.refetch().unwrap();
        r.apply_fetch_result(req, Ok(vec![boost("W", post("X")), post("X")]));

        let req = r.begin_toggle("W", Toggle::Reblog).unwrap();
        assert_eq!(req.target_id, "X");
        assert!(r.store().get("W").unwrap().target().reblogged);
        assert!(r.store().get("X").unwrap().reblogged);

        let confirmed = PostBuilder::new("X", Account::new("1", "amy")).reblogged(true).reblogs(9).build();
        r.apply_mutation_result(req, Ok(confirmed));
        let wrapper = r.store().get("W").unwrap();
        assert_eq!(wrapper.id, "W");
        assert_eq!(wrapper.target().reblogs_count, 9);
        assert_eq!(r.store().get("X").unwrap().reblogs_count, 9);
    }

    #[test]
    fn test_toggle_unknown_post() {
        let mut r = ready_with(&["A"]);
        assert_eq!(
            r.begin_toggle("nope", Toggle::Favourite),
            Err(MutationError::NotFound("nope".into()))
        );
    }

    #[test]
    fn test_unfavourite_reverts_to_true() {
        let mut r = Reconciler::new(20);
        let req = r.apply_stream_event(StreamEvent::Connect).unwrap();
        let faved = PostBuilder::new("A", Account::new("1", "amy")).favourited(true).favourites(1).build();
        r.apply_fetch_result(req, Ok(vec![faved]));

        let req = r.begin_toggle("A", Toggle::Favourite).unwrap();
        assert!(!req.desired);
        assert!(!r.store().get("A").unwrap().favourited);
        r.apply_mutation_result(req, Err(err()));
        assert!(r.store().get("A").unwrap().favourited);
        assert_eq!(r.store().get("A").unwrap().favourites_count, 1);
    }

    #[test]
    fn test_notifications_forwarded_and_recorded() {
        let mut r = ready_with(&[]);
        let n1 = note("n1");
        r.apply_stream_event(StreamEvent::Notification(Box::new(n1.clone())));
        r.apply_stream_event(StreamEvent::Heartbeat);

        assert_eq!(r.notifications().len(), 1);
        let events = r.take_events();
        assert_eq!(
            events,
            vec![
                ViewEvent::NotificationsChanged { len: 1 },
                ViewEvent::Notification(Box::new(n1)),
                ViewEvent::Heartbeat,
            ]
        );
    }

    #[test]
    fn test_notification_page_keeps_pushed_during_request() {
        let mut r = ready_with(&[]);
        let req = r.load_notifications().unwrap();
        assert!(r.load_notifications().is_none());

        r.apply_stream_event(StreamEvent::Notification(Box::new(note("n9"))));
        r.apply_notifications_result(req, Ok(vec![note("n5"), note("n4")]));

        let shown: Vec<_> = r.notifications().iter().map(|n| n.id.to_string()).collect();
        assert_eq!(shown, ["n9", "n5", "n4"]);
        assert!(r.load_notifications().is_some());
    }

    #[test]
    fn test_dismissed_push_stays_gone_after_page() {
        let mut r = ready_with(&[]);
        let req = r.load_notifications().unwrap();
        r.apply_stream_event(StreamEvent::Notification(Box::new(note("n9"))));
        let dismiss = r.begin_dismiss("n9").unwrap();

        r.apply_notifications_result(req, Ok(vec![]));
        assert!(!r.notifications().contains("n9"));

        r.apply_dismiss_result(dismiss, Ok(()));
        assert!(!r.notifications().contains("n9"));
    }

    #[test]
    fn test_dismiss_restores_position_on_failure() {
        let mut r = ready_with(&[]);
        let req = r.load_notifications().unwrap();
        r.apply_notifications_result(req, Ok(vec![note("a"), note("b"), note("c")]));

        let dismiss = r.begin_dismiss("b").unwrap();
        assert_eq!(dismiss.index, 1);
        assert!(!r.notifications().contains("b"));

        r.apply_dismiss_result(dismiss, Err(err()));
        let shown: Vec<_> = r.notifications().iter().map(|n| n.id.to_string()).collect();
        assert_eq!(shown, ["a", "b", "c"]);
    }

    #[test]
    fn test_dismiss_success_stays_removed() {
        let mut r = ready_with(&[]);
        r.apply_stream_event(StreamEvent::Notification(Box::new(note("a"))));
        let dismiss = r.begin_dismiss("a").unwrap();
        r.apply_dismiss_result(dismiss, Ok(()));
        assert!(r.notifications().is_empty());
        assert!(matches!(r.begin_dismiss("a"), Err(MutationError::NotFound(_))));
    }

    #[test]
    fn test_dispose_ignores_everything_after() {
        let mut r = ready_with(&["A"]);
        r.apply_stream_event(StreamEvent::Update(Box::new(post("D"))));
        let more = r.load_more().unwrap();
        let fav = r.begin_toggle("A", Toggle::Favourite).unwrap();

        r.dispose();
        assert!(r.backlog().is_empty());
        assert!(r.take_events().is_empty());

        r.apply_fetch_result(more, Ok(vec![post("Z")]));
        r.apply_mutation_result(fav, Err(err()));
        r.apply_stream_event(StreamEvent::Update(Box::new(post("E"))));
        assert!(r.apply_stream_event(StreamEvent::Connect).is_none());
        assert!(r.refetch().is_none());

        assert_eq!(store_ids(&r), ["A"]);
        assert!(r.backlog().is_empty());
        assert!(r.take_events().is_empty());
    }

    #[test]
    fn test_snapshot() {
        let mut r = ready_with(&["A", "B"]);
        r.apply_stream_event(StreamEvent::Update(Box::new(post("C"))));
        let snap = r.snapshot();
        assert_eq!(snap.state, ViewState::Ready);
        assert_eq!(ids(&snap.posts), ["A", "B"]);
        assert_eq!(ids(&snap.backlog), ["C"]);
        assert!(!snap.loading_more);
    }
}

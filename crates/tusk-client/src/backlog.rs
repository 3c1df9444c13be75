//! Staging area for posts pushed while the user is reading.
//!
//! New posts from the stream land here instead of the visible timeline so the
//! user's scroll position doesn't jump. An explicit flush moves them all into
//! the [`TimelineStore`] in one step.
//!
//! ```text
//! stream "update"
//!       │
//!       ▼
//! BacklogStager.stage(post)        (newest first, unbounded)
//!       │
//! user: "show new posts"
//!       │
//!       ▼
//! BacklogStager.flush_into(store)  → store = backlog ++ store, backlog = []
//! ```
//!
//! Both collections are owned by the view's controller and `flush_into` takes
//! `&mut` to both, so a `stage` can only run entirely before or entirely after
//! a flush: nothing staged is lost or duplicated.

use indexmap::IndexMap;
use tusk_types::{Post, PostId};

use crate::timeline::TimelineStore;

/// Posts received via push but not yet shown, newest first.
#[derive(Debug, Clone, Default)]
pub struct BacklogStager {
    staged: IndexMap<PostId, Post>,
}

impl BacklogStager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage `post` at the front.
    ///
    /// No eviction: the backlog lives only as long as the view. A post whose
    /// id is already staged is not staged again. Returns whether it was added.
    pub fn stage(&mut self, post: Post) -> bool {
        if self.staged.contains_key(&post.id) {
            return false;
        }
        self.staged.shift_insert(0, post.id.clone(), post);
        true
    }

    /// Prepend everything staged onto `store`, preserving order, and empty
    /// the backlog.
    ///
    /// Posts whose id the store already holds (e.g. the initial fetch raced
    /// the stream) are dropped. Returns the number of posts inserted.
    pub fn flush_into(&mut self, store: &mut TimelineStore) -> usize {
        let staged = std::mem::take(&mut self.staged);
        let total = staged.len();
        // Oldest first, so the newest ends up at the head.
        let inserted = staged
            .into_values()
            .rev()
            .map(|post| store.insert_at_head(post))
            .filter(|inserted| *inserted)
            .count();
        if inserted < total {
            tracing::debug!(
                total,
                inserted,
                "backlog flush skipped posts already in the timeline"
            );
        }
        inserted
    }

    /// Remove a staged post, e.g. on a `delete` event.
    pub fn remove_by_id(&mut self, id: &str) -> Option<Post> {
        self.staged.shift_remove(id)
    }

    /// Remove staged boosts of `id`. Returns the number removed.
    pub fn remove_reblogs_of(&mut self, id: &str) -> usize {
        let before = self.staged.len();
        self.staged
            .retain(|_, post| !post.reblog.as_ref().is_some_and(|inner| inner.id == id));
        before - self.staged.len()
    }

    /// Apply `mutator` to every staged entry that is, or boosts, `id`.
    pub fn update_referring<F>(&mut self, id: &str, mut mutator: F) -> usize
    where
        F: FnMut(&Post) -> Post,
    {
        let mut updated = 0;
        for post in self.staged.values_mut().filter(|p| p.refers_to(id)) {
            let next = mutator(&*post);
            if next.id == post.id {
                *post = next;
                updated += 1;
            }
        }
        updated
    }

    /// Drop staged posts the store already shows (a fresh first page can
    /// overlap what the stream delivered). Returns the number dropped.
    pub fn discard_shown(&mut self, store: &TimelineStore) -> usize {
        let before = self.staged.len();
        self.staged.retain(|id, _| !store.contains(id));
        before - self.staged.len()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.staged.contains_key(id)
    }

    /// Discard everything (view unmount).
    pub fn clear(&mut self) {
        self.staged.clear();
    }

    pub fn len(&self) -> usize {
        self.staged.len()
    }

    pub fn is_empty(&self) -> bool {
        self.staged.is_empty()
    }

    /// Staged posts, newest first.
    pub fn iter(&self) -> impl Iterator<Item = &Post> {
        self.staged.values()
    }

    pub fn to_vec(&self) -> Vec<Post> {
        self.staged.values().cloned().collect()
    }
}

// ============================================================================
// Tests
// ============================================================================

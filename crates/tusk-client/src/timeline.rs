//! Ordered, id-deduplicated post storage for a single view.
//!
//! Order is newest-first *by insertion*, not by timestamp: a backlog flush
//! prepends in arrival order and pagination appends in server order. The
//! store never talks to the network; the controller feeds it.

use indexmap::IndexMap;
use tusk_types::{Post, PostId};

/// Posts of one timeline view, newest first.
#[derive(Debug, Clone, Default)]
pub struct TimelineStore {
    posts: IndexMap<PostId, Post>,
}

impl TimelineStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Put `post` at the front.
    ///
    /// A post whose id is already present is rejected and the existing order
    /// is left alone (duplicate stream delivery must not reorder the view).
    /// Returns whether the post was inserted.
    pub fn insert_at_head(&mut self, post: Post) -> bool {
        if self.posts.contains_key(&post.id) {
            return false;
        }
        self.posts.shift_insert(0, post.id.clone(), post);
        true
    }

    /// Remove the post with `id`, if present, keeping the order of the rest.
    pub fn remove_by_id(&mut self, id: &str) -> Option<Post> {
        self.posts.shift_remove(id)
    }

    /// Remove every boost wrapper whose boosted post is `id`.
    ///
    /// Returns the number of wrappers removed.
    pub fn remove_reblogs_of(&mut self, id: &str) -> usize {
        let before = self.posts.len();
        self.posts
            .retain(|_, post| !post.reblog.as_ref().is_some_and(|inner| inner.id == id));
        before - self.posts.len()
    }

    /// Append an older page at the tail, preserving the page's order and
    /// skipping ids already present (including repeats within the page).
    ///
    /// Returns the number of posts appended.
    pub fn append_page(&mut self, page: impl IntoIterator<Item = Post>) -> usize {
        let mut appended = 0;
        for post in page {
            if self.posts.contains_key(&post.id) {
                continue;
            }
            self.posts.insert(post.id.clone(), post);
            appended += 1;
        }
        appended
    }

    /// Replace the post with `id` by `mutator(old)`.
    ///
    /// The mutator must keep the id; a result with a different id is
    /// discarded. Returns whether a post was updated.
    pub fn update_post<F>(&mut self, id: &str, mutator: F) -> bool
    where
        F: FnOnce(&Post) -> Post,
    {
        let Some(slot) = self.posts.get_mut(id) else {
            return false;
        };
        let next = mutator(slot);
        if next.id != slot.id {
            tracing::warn!(id, new_id = %next.id, "update_post mutator changed the id, ignoring");
            return false;
        }
        *slot = next;
        true
    }

    /// Apply `mutator` to every entry that is, or boosts, the post `id`.
    ///
    /// A post can appear both on its own and inside boost wrappers; viewer
    /// flags must agree across all of them. Returns the number of entries
    /// updated.
    pub fn update_referring<F>(&mut self, id: &str, mut mutator: F) -> usize
    where
        F: FnMut(&Post) -> Post,
    {
        let mut updated = 0;
        for post in self.posts.values_mut().filter(|p| p.refers_to(id)) {
            let next = mutator(&*post);
            if next.id == post.id {
                *post = next;
                updated += 1;
            }
        }
        updated
    }

    /// Drop everything and load `posts` in their given order (explicit
    /// re-fetch). Duplicate ids within `posts` keep their first occurrence.
    pub fn replace_all(&mut self, posts: impl IntoIterator<Item = Post>) {
        self.posts.clear();
        self.append_page(posts);
    }

    pub fn get(&self, id: &str) -> Option<&Post> {
        self.posts.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.posts.contains_key(id)
    }

    /// Entry that is, or boosts, the post `id`: boosted posts are addressed
    /// by their inner id in server notifications and favourite responses.
    pub fn find_referring(&self, id: &str) -> Option<&Post> {
        self.posts.get(id).or_else(|| self.posts.values().find(|p| p.refers_to(id)))
    }

    /// Newest post.
    pub fn first(&self) -> Option<&Post> {
        self.posts.first().map(|(_, p)| p)
    }

    /// Oldest post: its id is the pagination cursor.
    pub fn last(&self) -> Option<&Post> {
        self.posts.last().map(|(_, p)| p)
    }

    pub fn len(&self) -> usize {
        self.posts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }

    /// Posts newest first.
    pub fn iter(&self) -> impl Iterator<Item = &Post> {
        self.posts.values()
    }

    /// Ids newest first.
    pub fn ids(&self) -> impl Iterator<Item = &PostId> {
        self.posts.keys()
    }

    /// Owned copy of the posts, newest first.
    pub fn to_vec(&self) -> Vec<Post> {
        self.posts.values().cloned().collect()
    }
}

// ============================================================================
// Tests
// ============================================================================

//! Ordered, id-deduplicated notification storage.
//!
//! Same ordering rules as [`TimelineStore`](crate::TimelineStore): pushes go to
//! the head, pages to the tail. Dismissal is optimistic, so removal hands back
//! the notification and its position for [`restore`](NotificationFeed::restore)
//! if the server refuses.

use indexmap::IndexMap;
use tusk_types::{Notification, NotificationId};

/// Notifications of one view, newest first.
#[derive(Debug, Clone, Default)]
pub struct NotificationFeed {
    items: IndexMap<NotificationId, Notification>,
}

impl NotificationFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Put `notification` at the front unless its id is already present.
    pub fn insert_at_head(&mut self, notification: Notification) -> bool {
        if self.items.contains_key(&notification.id) {
            return false;
        }
        self.items.shift_insert(0, notification.id.clone(), notification);
        true
    }

    /// Append an older page, skipping known ids. Returns the number appended.
    pub fn append_page(&mut self, page: impl IntoIterator<Item = Notification>) -> usize {
        let mut appended = 0;
        for n in page {
            if self.items.contains_key(&n.id) {
                continue;
            }
            self.items.insert(n.id.clone(), n);
            appended += 1;
        }
        appended
    }

    /// Replace the contents with a fresh first page.
    pub fn replace_all(&mut self, page: impl IntoIterator<Item = Notification>) {
        self.items.clear();
        self.append_page(page);
    }

    /// Remove by id, returning the notification and the index it occupied.
    pub fn remove_by_id(&mut self, id: &str) -> Option<(usize, Notification)> {
        self.items.shift_remove_full(id).map(|(index, _, n)| (index, n))
    }

    /// Put a removed notification back at (or as close as possible to) its
    /// old index. No-op if the id reappeared meanwhile.
    pub fn restore(&mut self, index: usize, notification: Notification) {
        if self.items.contains_key(&notification.id) {
            return;
        }
        let index = index.min(self.items.len());
        self.items.shift_insert(index, notification.id.clone(), notification);
    }

    pub fn get(&self, id: &str) -> Option<&Notification> {
        self.items.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.items.contains_key(id)
    }

    /// Oldest notification: its id is the pagination cursor.
    pub fn last(&self) -> Option<&Notification> {
        self.items.last().map(|(_, n)| n)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Notification> {
        self.items.values()
    }

    pub fn to_vec(&self) -> Vec<Notification> {
        self.items.values().cloned().collect()
    }
}

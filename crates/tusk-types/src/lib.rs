//! Typed Mastodon API entities for tusk.
//!
//! This crate is the leaf of the workspace: ids, accounts, posts,
//! notifications and timeline selectors, deserialised straight from the
//! server's JSON. It has **no internal tusk dependencies** and performs no I/O.
//!
//! # Key Types
//!
//! |----------------------|-------------------------------------------------|
//! | Type                 | Purpose                                         |
//! |----------------------|-------------------------------------------------|
//! | [`Post`]             | Timeline entry (status), possibly a boost       |
//! | [`Notification`]     | Follow / mention / boost / favourite / other    |
//! | [`Account`]          | Author or originating account                   |
//! | [`TimelineKind`]     | Which timeline a view follows                   |
//! | [`StatusDraft`]      | Outgoing post                                   |
//! | [`PostId`] & co.     | Opaque string identifiers                       |
//! |----------------------|-------------------------------------------------|

pub mod account;
pub mod draft;
pub mod ids;
pub mod notification;
pub mod post;
pub mod timeline;

// Re-export primary types at crate root for convenience.
pub use account::Account;
pub use draft::StatusDraft;
pub use ids::{AccountId, NotificationId, PostId};
pub use notification::{Notification, NotificationKind};
pub use post::{Attachment, MediaKind, Poll, PollOption, Post, PostBuilder, Visibility};
pub use timeline::{ParseTimelineError, TimelineKind};

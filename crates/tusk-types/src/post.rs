//! Posts (statuses) and their embedded media and polls.
//!
//! A [`Post`] may wrap another post when it is a boost: the wrapper carries
//! the booster as `account` and the boosted post in `reblog`. Viewer actions
//! (favourite, boost) always apply to the boosted post, see [`Post::target`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::account::Account;
use crate::ids::{AccountId, PostId};

/// Who can see a post.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize,
    strum::Display, strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Visibility {
    #[default]
    Public,
    Unlisted,
    Private,
    Direct,
}

/// Media attachment type.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
    Gifv,
    Audio,
    #[default]
    #[serde(other)]
    Unknown,
}

/// A media attachment on a post.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: MediaKind,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub preview_url: Option<String>,
    /// Alt text.
    #[serde(default)]
    pub description: Option<String>,
}

/// One choice in a poll.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollOption {
    pub title: String,
    /// Hidden (`null`) until the poll ends on some servers.
    #[serde(default)]
    pub votes_count: Option<u64>,
}

/// A poll attached to a post.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Poll {
    pub id: String,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub expired: bool,
    #[serde(default)]
    pub multiple: bool,
    #[serde(default)]
    pub votes_count: u64,
    pub options: Vec<PollOption>,
    #[serde(default, deserialize_with = "null_as_false")]
    pub voted: bool,
}

/// A single timeline entry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: PostId,
    /// Author, or booster when `reblog` is set.
    pub account: Account,
    /// Rich text body (HTML as delivered by the server).
    #[serde(default)]
    pub content: String,
    /// Content warning; empty when none.
    #[serde(default)]
    pub spoiler_text: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub visibility: Visibility,
    #[serde(default)]
    pub sensitive: bool,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub in_reply_to_id: Option<PostId>,
    #[serde(default)]
    pub in_reply_to_account_id: Option<AccountId>,
    #[serde(default)]
    pub replies_count: u64,
    #[serde(default)]
    pub reblogs_count: u64,
    #[serde(default)]
    pub favourites_count: u64,
    // Viewer flags are `null` or absent for unauthenticated requests.
    #[serde(default, deserialize_with = "null_as_false")]
    pub favourited: bool,
    #[serde(default, deserialize_with = "null_as_false")]
    pub reblogged: bool,
    #[serde(default, deserialize_with = "null_as_false")]
    pub bookmarked: bool,
    #[serde(default, deserialize_with = "null_as_false")]
    pub muted: bool,
    /// The boosted post, when this entry is a boost.
    #[serde(default)]
    pub reblog: Option<Box<Post>>,
    #[serde(default)]
    pub media_attachments: Vec<Attachment>,
    #[serde(default)]
    pub poll: Option<Poll>,
}

impl Post {
    /// Whether this entry is a boost wrapper.
    pub fn is_reblog(&self) -> bool {
        self.reblog.is_some()
    }

    /// The post viewer actions apply to: the boosted post for a boost
    /// wrapper, otherwise `self`.
    pub fn target(&self) -> &Post {
        self.reblog.as_deref().unwrap_or(self)
    }

    /// Mutable form of [`target`](Self::target).
    pub fn target_mut(&mut self) -> &mut Post {
        match self.reblog {
            Some(ref mut inner) => &mut **inner,
            None => self,
        }
    }

    /// Whether this entry is, or boosts, the post with `id`.
    pub fn refers_to(&self, id: &str) -> bool {
        self.id == id || self.reblog.as_ref().is_some_and(|r| r.id == id)
    }

    /// Copy of this entry with the target's favourite flag set, adjusting
    /// the counter when the flag actually changes.
    pub fn with_favourited(&self, favourited: bool) -> Post {
        let mut post = self.clone();
        let target = post.target_mut();
        if target.favourited != favourited {
            target.favourited = favourited;
            target.favourites_count = bump(target.favourites_count, favourited);
        }
        post
    }

    /// Copy of this entry with the target's boost flag set, adjusting the
    /// counter when the flag actually changes.
    pub fn with_reblogged(&self, reblogged: bool) -> Post {
        let mut post = self.clone();
        let target = post.target_mut();
        if target.reblogged != reblogged {
            target.reblogged = reblogged;
            target.reblogs_count = bump(target.reblogs_count, reblogged);
        }
        post
    }

    /// Copy of this entry with `confirmed` substituted for the target post.
    ///
    /// A boost wrapper keeps its own id and booster; only the inner post is
    /// replaced. Returns `self` unchanged when `confirmed` is a different post.
    pub fn with_confirmed(&self, confirmed: Post) -> Post {
        let mut post = self.clone();
        if post.target().id != confirmed.id {
            return post;
        }
        match post.reblog {
            Some(ref mut inner) => **inner = confirmed,
            None => post = confirmed,
        }
        post
    }
}

fn bump(count: u64, up: bool) -> u64 {
    if up { count.saturating_add(1) } else { count.saturating_sub(1) }
}

/// Deserialize `null`/absent booleans as `false`.
pub(crate) fn null_as_false<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
    Ok(Option::<bool>::deserialize(d)?.unwrap_or(false))
}

// ============================================================================
// Builder
// ============================================================================

/// Builder for [`Post`]; the struct has many optional fields.
///
/// ```
/// # use tusk_types::*;
/// let post = PostBuilder::new("101", Account::new("1", "amy"))
///     .content("<p>hello</p>")
///     .visibility(Visibility::Unlisted)
///     .favourites(3)
///     .build();
/// assert_eq!(post.favourites_count, 3);
/// ```
pub struct PostBuilder {
    post: Post,
}

impl PostBuilder {
    /// Start building a post with its id and author.
    pub fn new(id: impl Into<PostId>, account: Account) -> Self {
        Self {
            post: Post {
                id: id.into(),
                account,
                content: String::new(),
                spoiler_text: String::new(),
                created_at: Utc::now(),
                visibility: Visibility::Public,
                sensitive: false,
                url: None,
                language: None,
                in_reply_to_id: None,
                in_reply_to_account_id: None,
                replies_count: 0,
                reblogs_count: 0,
                favourites_count: 0,
                favourited: false,
                reblogged: false,
                bookmarked: false,
                muted: false,
                reblog: None,
                media_attachments: Vec::new(),
                poll: None,
            },
        }
    }

    pub fn content(mut self, content: impl Into<String>) -> Self {
        self.post.content = content.into();
        self
    }

    pub fn spoiler_text(mut self, spoiler: impl Into<String>) -> Self {
        self.post.spoiler_text = spoiler.into();
        self
    }

    pub fn created_at(mut self, at: DateTime<Utc>) -> Self {
        self.post.created_at = at;
        self
    }

    pub fn visibility(mut self, visibility: Visibility) -> Self {
        self.post.visibility = visibility;
        self
    }

    pub fn in_reply_to(mut self, post: impl Into<PostId>, account: impl Into<AccountId>) -> Self {
        self.post.in_reply_to_id = Some(post.into());
        self.post.in_reply_to_account_id = Some(account.into());
        self
    }

    pub fn favourited(mut self, favourited: bool) -> Self {
        self.post.favourited = favourited;
        self
    }

    pub fn reblogged(mut self, reblogged: bool) -> Self {
        self.post.reblogged = reblogged;
        self
    }

    pub fn favourites(mut self, count: u64) -> Self {
        self.post.favourites_count = count;
        self
    }

    pub fn reblogs(mut self, count: u64) -> Self {
        self.post.reblogs_count = count;
        self
    }

    pub fn replies(mut self, count: u64) -> Self {
        self.post.replies_count = count;
        self
    }

    /// Make this entry a boost of `inner`.
    pub fn reblog_of(mut self, inner: Post) -> Self {
        self.post.reblog = Some(Box::new(inner));
        self
    }

    pub fn attachment(mut self, attachment: Attachment) -> Self {
        self.post.media_attachments.push(attachment);
        self
    }

    pub fn poll(mut self, poll: Poll) -> Self {
        self.post.poll = Some(poll);
        self
    }

    pub fn build(self) -> Post {
        self.post
    }
}

// ============================================================================
// Tests
// ============================================================================

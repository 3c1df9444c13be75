//! Notifications pushed to (or fetched by) the signed-in account.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::account::Account;
use crate::ids::NotificationId;
use crate::post::Post;

/// What happened.
///
/// Servers keep adding kinds (`poll`, `status`, `update`, `follow_request`,
/// `admin.sign_up`, …). Anything not modelled explicitly lands in
/// [`Other`](Self::Other) with the raw string preserved.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NotificationKind {
    Follow,
    Mention,
    Reblog,
    Favourite,
    Other(String),
}

impl From<String> for NotificationKind {
    fn from(s: String) -> Self {
        match s.as_str() {
            "follow" => Self::Follow,
            "mention" => Self::Mention,
            "reblog" => Self::Reblog,
            "favourite" => Self::Favourite,
            _ => Self::Other(s),
        }
    }
}

impl From<NotificationKind> for String {
    fn from(kind: NotificationKind) -> Self {
        kind.as_str().to_string()
    }
}

impl NotificationKind {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Follow => "follow",
            Self::Mention => "mention",
            Self::Reblog => "reblog",
            Self::Favourite => "favourite",
            Self::Other(s) => s,
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A notification record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub created_at: DateTime<Utc>,
    /// The account that triggered it.
    pub account: Account,
    /// Associated post, for mentions, boosts, favourites and polls.
    #[serde(default)]
    pub status: Option<Post>,
}

impl Notification {
    pub fn new(id: impl Into<NotificationId>, kind: NotificationKind, account: Account) -> Self {
        Self {
            id: id.into(),
            kind,
            created_at: Utc::now(),
            account,
            status: None,
        }
    }

    pub fn with_status(mut self, post: Post) -> Self {
        self.status = Some(post);
        self
    }

    /// One-line human summary, e.g. `"@amy favourited your post"`.
    pub fn summary(&self) -> String {
        let who = self.account.display_name();
        match &self.kind {
            NotificationKind::Follow => format!("{who} followed you"),
            NotificationKind::Mention => format!("{who} mentioned you"),
            NotificationKind::Reblog => format!("{who} boosted your post"),
            NotificationKind::Favourite => format!("{who} favourited your post"),
            NotificationKind::Other(kind) => format!("{who}: {kind}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_favourite_with_status() {
        let json = r#"{
            "id": "34975861",
            "type": "favourite",
            "created_at": "2019-11-23T07:49:02.064Z",
            "account": {"id": "971724", "username": "zsc", "acct": "zsc"},
            "status": {
                "id": "103186126728896492",
                "created_at": "2019-11-23T07:49:01.940Z",
                "content": "<p>hi</p>",
                "account": {"id": "14715", "username": "trwnh", "acct": "trwnh"}
            }
        }"#;
        let n: Notification = serde_json::from_str(json).unwrap();
        assert_eq!(n.kind, NotificationKind::Favourite);
        assert_eq!(n.status.as_ref().map(|p| p.id.as_str()), Some("103186126728896492"));
        assert_eq!(n.summary(), "@zsc favourited your post");
    }

    #[test]
    fn test_unknown_kind_preserved() {
        let json = r#"{
            "id": "1",
            "type": "admin.sign_up",
            "created_at": "2022-01-01T00:00:00Z",
            "account": {"id": "2", "username": "new", "acct": "new"}
        }"#;
        let n: Notification = serde_json::from_str(json).unwrap();
        assert_eq!(n.kind, NotificationKind::Other("admin.sign_up".into()));
        assert!(n.status.is_none());

        let back = serde_json::to_value(&n).unwrap();
        assert_eq!(back["type"], "admin.sign_up");
    }

    #[test]
    fn test_kind_round_trips_known_names() {
        for name in ["follow", "mention", "reblog", "favourite"] {
            let kind = NotificationKind::from(name.to_string());
            assert!(!matches!(kind, NotificationKind::Other(_)), "{name}");
            assert_eq!(kind.to_string(), name);
        }
    }
}

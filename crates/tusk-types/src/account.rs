//! Account (author) records.

use serde::{Deserialize, Serialize};

use crate::ids::AccountId;

/// A user account as embedded in posts and notifications.
///
/// Only the fields a timeline needs are modelled; unknown fields are ignored
/// on deserialization.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    /// Local username (no domain).
    pub username: String,
    /// `user` for local accounts, `user@domain` for remote ones.
    pub acct: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub bot: bool,
}

impl Account {
    /// Minimal account: used by builders and tests.
    pub fn new(id: impl Into<AccountId>, acct: impl Into<String>) -> Self {
        let acct = acct.into();
        let username = acct.split('@').next().unwrap_or_default().to_string();
        Self {
            id: id.into(),
            username,
            acct,
            display_name: String::new(),
            url: None,
            avatar: None,
            bot: false,
        }
    }

    /// Display name if set, else `@acct`.
    pub fn display_name(&self) -> String {
        if self.display_name.trim().is_empty() {
            format!("@{}", self.acct)
        } else {
            self.display_name.clone()
        }
    }
}

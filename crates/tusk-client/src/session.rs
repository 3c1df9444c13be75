//! Who we are talking to, and as whom.

use std::fmt;

use tracing::info;
use tusk_types::Account;
use url::Url;

use crate::api::{Api, ApiError};

/// Connection identity for one instance.
///
/// Passed explicitly to everything that talks to the server; there is no
/// process-wide "current session".
#[derive(Clone)]
pub struct Session {
    /// Instance base URL, e.g. `https://mastodon.social/`.
    pub instance: Url,
    pub access_token: Option<String>,
    /// Filled in by [`verify`](Self::verify).
    pub account: Option<Account>,
}

impl Session {
    /// Build a session from a user-typed instance name.
    ///
    /// A bare host (`mastodon.social`) gets `https://` prepended.
    pub fn parse(instance: &str, access_token: Option<String>) -> Result<Self, ApiError> {
        let instance = instance.trim().trim_end_matches('/');
        if instance.is_empty() {
            return Err(ApiError::Url("empty instance".to_string()));
        }
        let full = if instance.contains("://") {
            format!("{instance}/")
        } else {
            format!("https://{instance}/")
        };
        let instance = Url::parse(&full).map_err(|e| ApiError::Url(format!("{full}: {e}")))?;
        if instance.cannot_be_a_base() || instance.host_str().is_none() {
            return Err(ApiError::Url(full));
        }
        Ok(Self { instance, access_token, account: None })
    }

    pub fn with_account(mut self, account: Account) -> Self {
        self.account = Some(account);
        self
    }

    pub fn is_authenticated(&self) -> bool {
        self.access_token.is_some()
    }

    /// Look up the token's account and remember it.
    pub async fn verify(&mut self, api: &Api) -> Result<&Account, ApiError> {
        let account = api.verify_credentials().await?;
        info!(acct = %account.acct, instance = %self.instance, "verified credentials");
        Ok(self.account.insert(account))
    }

    /// `@user@host` when verified, otherwise the host.
    pub fn label(&self) -> String {
        let host = self.instance.host_str().unwrap_or_default();
        match &self.account {
            Some(account) => format!("@{}@{host}", account.acct),
            None => host.to_string(),
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("instance", &self.instance.as_str())
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .field("account", &self.account.as_ref().map(|a| a.acct.as_str()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bare_host() {
        let session = Session::parse("mastodon.social", None).unwrap();
        assert_eq!(session.instance.as_str(), "https://mastodon.social/");
        assert!(!session.is_authenticated());
    }

    #[test]
    fn test_parse_keeps_scheme_and_strips_slash() {
        let session = Session::parse("http://localhost:3000/", Some("t".into())).unwrap();
        assert_eq!(session.instance.as_str(), "http://localhost:3000/");
        assert!(session.is_authenticated());
    }

    #[test]
    fn test_parse_rejects_empty() {
        assert!(matches!(Session::parse("  ", None), Err(ApiError::Url(_))));
    }

    #[test]
    fn test_debug_redacts_token() {
        let session = Session::parse("example.social", Some("sekrit".into())).unwrap();
        let debug = format!("{session:?}");
        assert!(!debug.contains("sekrit"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_label() {
        let session = Session::parse("example.social", None).unwrap();
        assert_eq!(session.label(), "example.social");
        let session = session.with_account(Account::new("1", "amy"));
        assert_eq!(session.label(), "@amy@example.social");
    }
}

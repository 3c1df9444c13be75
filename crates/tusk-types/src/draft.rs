//! Outgoing post drafts.

use serde::Serialize;

use crate::ids::PostId;
use crate::post::Visibility;

/// Body of a `POST /api/v1/statuses` request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StatusDraft {
    pub status: String,
    pub visibility: Visibility,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_reply_to_id: Option<PostId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spoiler_text: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub sensitive: bool,
}

impl StatusDraft {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            status: text.into(),
            visibility: Visibility::Public,
            in_reply_to_id: None,
            spoiler_text: None,
            sensitive: false,
        }
    }

    pub fn visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    pub fn reply_to(mut self, id: impl Into<PostId>) -> Self {
        self.in_reply_to_id = Some(id.into());
        self
    }

    /// Put the body behind a content warning.
    pub fn content_warning(mut self, text: impl Into<String>) -> Self {
        self.spoiler_text = Some(text.into());
        self.sensitive = true;
        self
    }

    /// Whether there is anything to send.
    pub fn is_empty(&self) -> bool {
        self.status.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_body_omits_optional_fields() {
        let body = serde_json::to_value(StatusDraft::new("hello")).unwrap();
        assert_eq!(body, serde_json::json!({"status": "hello", "visibility": "public"}));
    }

    #[test]
    fn test_reply_with_content_warning() {
        let draft = StatusDraft::new("spoilers")
            .visibility(Visibility::Unlisted)
            .reply_to("99")
            .content_warning("film");
        let body = serde_json::to_value(&draft).unwrap();
        assert_eq!(body["in_reply_to_id"], "99");
        assert_eq!(body["spoiler_text"], "film");
        assert_eq!(body["sensitive"], true);
        assert_eq!(body["visibility"], "unlisted");
    }

    #[test]
    fn test_is_empty() {
        assert!(StatusDraft::new("  \n").is_empty());
        assert!(!StatusDraft::new("x").is_empty());
    }
}

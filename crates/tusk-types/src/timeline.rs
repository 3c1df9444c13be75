//! Which timeline a view follows, and where that timeline lives on the server.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A followable timeline.
///
/// Parses from and displays as `home`, `local`, `public`, `tag:NAME`,
/// `list:ID`, `direct`: the form used in config files and on the command line.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TimelineKind {
    #[default]
    Home,
    Local,
    Public,
    Tag(String),
    List(String),
    Direct,
}

impl TimelineKind {
    /// REST path of the first page.
    pub fn rest_path(&self) -> String {
        match self {
            Self::Home => "/api/v1/timelines/home".to_string(),
            Self::Local | Self::Public => "/api/v1/timelines/public".to_string(),
            Self::Tag(tag) => format!("/api/v1/timelines/tag/{tag}"),
            Self::List(id) => format!("/api/v1/timelines/list/{id}"),
            Self::Direct => "/api/v1/timelines/direct".to_string(),
        }
    }

    /// Fixed query parameters of the REST endpoint (pagination params are
    /// added by the caller).
    pub fn rest_params(&self) -> Vec<(&'static str, String)> {
        match self {
            Self::Local => vec![("local", "true".to_string())],
            _ => Vec::new(),
        }
    }

    /// Streaming endpoint path, including its selector query.
    pub fn stream_path(&self) -> String {
        match self {
            Self::Home => "/api/v1/streaming/user".to_string(),
            Self::Local => "/api/v1/streaming/public/local".to_string(),
            Self::Public => "/api/v1/streaming/public".to_string(),
            Self::Tag(tag) => format!("/api/v1/streaming/hashtag?tag={tag}"),
            Self::List(id) => format!("/api/v1/streaming/list?list={id}"),
            Self::Direct => "/api/v1/streaming/direct".to_string(),
        }
    }

    /// Whether the stream for this timeline also carries notifications.
    pub fn carries_notifications(&self) -> bool {
        matches!(self, Self::Home)
    }
}

impl fmt::Display for TimelineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Home => f.write_str("home"),
            Self::Local => f.write_str("local"),
            Self::Public => f.write_str("public"),
            Self::Tag(tag) => write!(f, "tag:{tag}"),
            Self::List(id) => write!(f, "list:{id}"),
            Self::Direct => f.write_str("direct"),
        }
    }
}

/// Error parsing a [`TimelineKind`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseTimelineError {
    #[error("unknown timeline '{0}' (expected home, local, public, direct, tag:NAME or list:ID)")]
    Unknown(String),
    #[error("timeline '{0}' needs a non-empty argument")]
    MissingArgument(String),
    #[error("invalid characters in timeline argument '{0}'")]
    InvalidArgument(String),
}

impl FromStr for TimelineKind {
    type Err = ParseTimelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some((head, arg)) = s.split_once(':') {
            let arg = arg.trim().trim_start_matches('#');
            if arg.is_empty() {
                return Err(ParseTimelineError::MissingArgument(head.to_string()));
            }
            // Arguments are spliced into URL paths and queries.
            if !arg.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '-') {
                return Err(ParseTimelineError::InvalidArgument(arg.to_string()));
            }
            return match head {
                "tag" => Ok(Self::Tag(arg.to_string())),
                "list" => Ok(Self::List(arg.to_string())),
                _ => Err(ParseTimelineError::Unknown(s.to_string())),
            };
        }
        match s {
            "home" => Ok(Self::Home),
            "local" => Ok(Self::Local),
            "public" | "federated" => Ok(Self::Public),
            "direct" => Ok(Self::Direct),
            _ => Err(ParseTimelineError::Unknown(s.to_string())),
        }
    }
}

impl TryFrom<String> for TimelineKind {
    type Error = ParseTimelineError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<TimelineKind> for String {
    fn from(kind: TimelineKind) -> Self {
        kind.to_string()
    }
}

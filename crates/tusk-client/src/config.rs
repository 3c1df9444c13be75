//! Client configuration, stored as RON.
//!
//! Default location is `dirs::config_dir()/tusk/config.ron`:
//!
//! ```ron
//! (
//!     instance: "mastodon.social",
//!     access_token_env: Some("TUSK_TOKEN"),
//!     timeline: "home",
//!     page_size: 20,
//! )
//! ```
//!
//! Every field has a default, so a partial file (or none at all) is fine.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;
use tusk_types::TimelineKind;
use url::Url;

use crate::constants::{
    CONFIG_FILE_NAME, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE, RECONNECT_INITIAL, RECONNECT_MAX,
};
use crate::http::Backoff;
use crate::session::Session;

/// Standard env var consulted when no token is configured.
pub const DEFAULT_TOKEN_ENV: &str = "TUSK_ACCESS_TOKEN";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON parse error: {0}")]
    Ron(#[from] ron::error::SpannedError),
    #[error("RON serialize error: {0}")]
    Serialize(#[from] ron::Error),
    #[error("no instance configured")]
    MissingInstance,
    #[error("invalid URL {url:?}: {message}")]
    InvalidUrl { url: String, message: String },
    #[error("no config directory on this platform")]
    NoConfigDir,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Instance host or URL. Empty means "not configured".
    pub instance: String,

    /// Access token inline (prefer `access_token_env`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,

    /// Environment variable holding the access token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token_env: Option<String>,

    /// Separate streaming host, when the instance advertises one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub streaming_url: Option<String>,

    pub timeline: TimelineKind,
    pub page_size: u32,
    pub reconnect_initial_secs: u64,
    pub reconnect_max_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            instance: String::new(),
            access_token: None,
            access_token_env: None,
            streaming_url: None,
            timeline: TimelineKind::Home,
            page_size: DEFAULT_PAGE_SIZE,
            reconnect_initial_secs: RECONNECT_INITIAL.as_secs(),
            reconnect_max_secs: RECONNECT_MAX.as_secs(),
        }
    }
}

impl ClientConfig {
    pub fn new(instance: impl Into<String>) -> Self {
        Self { instance: instance.into(), ..Self::default() }
    }

    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    pub fn with_access_token_env(mut self, env_var: impl Into<String>) -> Self {
        self.access_token_env = Some(env_var.into());
        self
    }

    pub fn with_timeline(mut self, timeline: TimelineKind) -> Self {
        self.timeline = timeline;
        self
    }

    /// `dirs::config_dir()/tusk/config.ron`.
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        dirs::config_dir()
            .map(|dir| dir.join("tusk").join(CONFIG_FILE_NAME))
            .ok_or(ConfigError::NoConfigDir)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let config = ron::from_str(&text)?;
        debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    /// Like [`load`](Self::load), but a missing file yields the defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        match Self::load(path) {
            Err(ConfigError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no config file, using defaults");
                Ok(Self::default())
            }
            other => other,
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let text = ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())?;
        std::fs::write(path, text)?;
        Ok(())
    }

    /// Resolve the access token from config or environment.
    pub fn resolve_access_token(&self) -> Option<String> {
        // Inline token takes precedence
        if let Some(token) = &self.access_token {
            return Some(token.clone());
        }
        let env_var = self.access_token_env.as_deref().unwrap_or(DEFAULT_TOKEN_ENV);
        std::env::var(env_var).ok().filter(|t| !t.is_empty())
    }

    /// Page size clamped to what the server accepts.
    pub fn page_size(&self) -> u32 {
        self.page_size.clamp(1, MAX_PAGE_SIZE)
    }

    pub fn backoff(&self) -> Backoff {
        let initial = Duration::from_secs(self.reconnect_initial_secs.max(1));
        let max = Duration::from_secs(self.reconnect_max_secs).max(initial);
        Backoff { initial, max }
    }

    pub fn streaming_url(&self) -> Result<Option<Url>, ConfigError> {
        self.streaming_url
            .as_deref()
            .map(|raw| {
                Url::parse(raw).map_err(|e| ConfigError::InvalidUrl {
                    url: raw.to_string(),
                    message: e.to_string(),
                })
            })
            .transpose()
    }

    /// Build the session this config describes.
    pub fn session(&self) -> Result<Session, ConfigError> {
        if self.instance.trim().is_empty() {
            return Err(ConfigError::MissingInstance);
        }
        Session::parse(&self.instance, self.resolve_access_token()).map_err(|e| {
            ConfigError::InvalidUrl { url: self.instance.clone(), message: e.to_string() }
        })
    }
}

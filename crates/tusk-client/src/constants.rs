//! Client configuration constants.
//!
//! Centralizes hardcoded values for easier configuration and documentation.

use std::time::Duration;

/// Posts requested per page when the config doesn't say otherwise.
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Largest `limit` Mastodon accepts for timeline endpoints.
pub const MAX_PAGE_SIZE: u32 = 40;

/// First reconnect delay after a stream failure.
pub const RECONNECT_INITIAL: Duration = Duration::from_secs(1);

/// Reconnect delay ceiling (backoff doubles up to this).
pub const RECONNECT_MAX: Duration = Duration::from_secs(60);

/// Timeout for ordinary REST calls. Streams have no overall timeout.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Buffered stream events between the transport task and the controller.
pub const STREAM_CHANNEL_CAPACITY: usize = 256;

/// Buffered view events per subscriber before it starts lagging.
pub const VIEW_EVENT_CAPACITY: usize = 256;

/// Config file name under `dirs::config_dir()/tusk/`.
pub const CONFIG_FILE_NAME: &str = "config.ron";

/// User agent sent with every request.
pub const USER_AGENT: &str = concat!("tusk/", env!("CARGO_PKG_VERSION"));

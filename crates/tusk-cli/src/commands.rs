//! Line commands typed at the prompt.

use std::str::FromStr;

/// One parsed prompt line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Print the visible timeline.
    Show,
    /// Move staged posts into the timeline.
    Flush,
    /// Load older posts.
    More,
    Refresh,
    Favourite(String),
    Boost(String),
    /// Load the notification page.
    Notifications,
    Dismiss(String),
    /// Publish a new post.
    Post(String),
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("unknown command {0:?} (try 'help')")]
    Unknown(String),
    #[error("'{0}' needs an argument")]
    MissingArgument(&'static str),
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (word, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        let rest = rest.trim();
        let arg = |name: &'static str| {
            if rest.is_empty() {
                Err(CommandError::MissingArgument(name))
            } else {
                Ok(rest.to_string())
            }
        };

        match word {
            "" | "show" | "ls" => Ok(Self::Show),
            "flush" | "new" => Ok(Self::Flush),
            "more" => Ok(Self::More),
            "refresh" | "reload" => Ok(Self::Refresh),
            "fav" | "favourite" => arg("fav").map(Self::Favourite),
            "boost" => arg("boost").map(Self::Boost),
            "notifs" | "notifications" => Ok(Self::Notifications),
            "dismiss" => arg("dismiss").map(Self::Dismiss),
            "post" | "toot" => arg("post").map(Self::Post),
            "help" | "?" => Ok(Self::Help),
            "quit" | "q" | "exit" => Ok(Self::Quit),
            other => Err(CommandError::Unknown(other.to_string())),
        }
    }
}

pub const HELP: &str = "\
commands:
  show             print the timeline
  flush            show new posts
  more             load older posts
  refresh          re-fetch the first page
  fav <id>         favourite / unfavourite
  boost <id>       boost / unboost
  notifs           load notifications
  dismiss <id>     dismiss a notification
  post <text>      publish a post
  quit";

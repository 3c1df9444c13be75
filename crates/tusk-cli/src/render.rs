//! Plain-text rendering of posts and notifications for the terminal.

use tusk_types::{Notification, NotificationKind, Post};

/// Flatten server HTML to text: paragraph and line breaks become newlines,
/// other tags are dropped, the common entities are decoded.
pub fn plain_text(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut rest = html;
    while let Some(start) = rest.find('<') {
        out.push_str(&rest[..start]);
        let Some(end) = rest[start..].find('>') else {
            // Unterminated tag, keep it verbatim
            out.push_str(&rest[start..]);
            rest = "";
            break;
        };
        let tag = rest[start + 1..start + end].trim().to_ascii_lowercase();
        if tag.starts_with("br") || tag == "/p" {
            out.push('\n');
        }
        rest = &rest[start + end + 1..];
    }
    out.push_str(rest);

    decode_entities(out.trim_end())
}

fn decode_entities(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

pub fn render_post(post: &Post) -> String {
    let target = post.target();
    let header = if post.is_reblog() {
        format!("@{} boosted @{}", post.account.acct, target.account.acct)
    } else {
        format!("@{}", target.account.acct)
    };

    let mut flags = String::new();
    if target.favourited {
        flags.push_str(" ★");
    }
    if target.reblogged {
        flags.push_str(" ⟳");
    }

    let body = if target.spoiler_text.is_empty() {
        plain_text(&target.content)
    } else {
        format!("[CW: {}]", target.spoiler_text)
    };

    format!(
        "[{}] {header}  ♥{} ⟳{} ↩{}{flags}\n    {}",
        post.id,
        target.favourites_count,
        target.reblogs_count,
        target.replies_count,
        body.replace('\n', "\n    "),
    )
}

pub fn render_notification(n: &Notification) -> String {
    let who = format!("@{}", n.account.acct);
    let what = match &n.kind {
        NotificationKind::Follow => format!("{who} followed you"),
        NotificationKind::Mention => format!("{who} mentioned you"),
        NotificationKind::Reblog => format!("{who} boosted your post"),
        NotificationKind::Favourite => format!("{who} favourited your post"),
        NotificationKind::Other(kind) => format!("{who}: {kind}"),
    };
    match &n.status {
        Some(post) => format!("({}) {what}: {}", n.id, first_line(&plain_text(&post.content))),
        None => format!("({}) {what}", n.id),
    }
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tusk_types::{Account, PostBuilder};

    #[test]
    fn test_plain_text() {
        assert_eq!(plain_text("<p>hi &amp; bye</p><p>two<br/>three</p>"), "hi & bye\ntwo\nthree");
        assert_eq!(plain_text("<p>a <a href=\"x\">link</a></p>"), "a link");
        assert_eq!(plain_text("1 < 2"), "1 < 2");
    }

    #[test]
    fn test_render_boost() {
        let inner = PostBuilder::new("5", Account::new("2", "bob"))
            .content("<p>hello</p>")
            .favourited(true)
            .favourites(3)
            .build();
        let wrapper = PostBuilder::new("9", Account::new("1", "amy")).reblog_of(inner).build();

        let text = render_post(&wrapper);
        assert!(text.starts_with("[9] @amy boosted @bob  ♥3"));
        assert!(text.contains("★"));
        assert!(text.ends_with("\n    hello"));
    }

    #[test]
    fn test_render_content_warning_hides_body() {
        let post = PostBuilder::new("1", Account::new("1", "amy"))
            .content("<p>spoilers</p>")
            .spoiler_text("film")
            .build();
        let text = render_post(&post);
        assert!(text.contains("[CW: film]"));
        assert!(!text.contains("spoilers"));
    }

    #[test]
    fn test_render_notification() {
        let n = Notification::new("n1", NotificationKind::Follow, Account::new("3", "cat@x.example"));
        assert_eq!(render_notification(&n), "(n1) @cat@x.example followed you");
    }
}

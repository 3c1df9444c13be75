//! `text/event-stream` framing and Mastodon stream payload decoding.
//!
//! The decoder is push-based: feed it whatever byte chunks the transport
//! yields and it returns the items completed so far. Lines may be split at any
//! byte, including inside a multi-byte UTF-8 sequence; nothing is decoded
//! until a full line is buffered.
//!
//! Mastodon's framing:
//!
//! ```text
//! :)                          ← comment, sent as keep-alive
//!
//! event: update
//! data: {"id":"1",...}        ← JSON status
//!
//! event: delete
//! data: 109876543210          ← bare id
//! ```

use tracing::{debug, trace};
use tusk_types::{Notification, Post, PostId};

use crate::subscriptions::StreamEvent;

/// One dispatched event.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SseFrame {
    /// `event:` field; `None` means the default `message` type.
    pub event: Option<String>,
    /// `data:` lines joined with `\n`.
    pub data: String,
}

/// Decoder output.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SseItem {
    Frame(SseFrame),
    /// A `:` comment line (text after the colon).
    Comment(String),
}

/// Incremental `text/event-stream` decoder.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buf: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume a chunk, returning every item it completed.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseItem> {
        self.buf.extend_from_slice(chunk);
        let mut out = Vec::new();
        while let Some(line) = self.take_line() {
            self.process_line(&line, &mut out);
        }
        out
    }

    /// Bytes held back waiting for a line terminator.
    pub fn pending_bytes(&self) -> usize {
        self.buf.len()
    }

    fn take_line(&mut self) -> Option<String> {
        let end = self.buf.iter().position(|&b| b == b'\n')?;
        let mut line: Vec<u8> = self.buf.drain(..=end).collect();
        line.pop();
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        Some(String::from_utf8_lossy(&line).into_owned())
    }

    fn process_line(&mut self, line: &str, out: &mut Vec<SseItem>) {
        if line.is_empty() {
            self.dispatch(out);
            return;
        }
        if let Some(comment) = line.strip_prefix(':') {
            out.push(SseItem::Comment(comment.trim_start().to_string()));
            return;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            // `id` and `retry` only matter to browsers' EventSource.
            "id" | "retry" => {}
            other => trace!(field = other, "ignoring unknown SSE field"),
        }
    }

    fn dispatch(&mut self, out: &mut Vec<SseItem>) {
        let event = self.event.take();
        if self.data.is_empty() {
            return;
        }
        let data = std::mem::take(&mut self.data).join("\n");
        out.push(SseItem::Frame(SseFrame { event, data }));
    }
}

/// Map a Mastodon stream frame to a [`StreamEvent`].
///
/// Returns `None` for event types a timeline view doesn't consume
/// (`status.update`, `filters_changed`, `conversation`, …). Payloads that
/// fail validation become [`StreamEvent::Error`].
pub fn decode_frame(frame: &SseFrame) -> Option<StreamEvent> {
    let Some(event) = frame.event.as_deref() else {
        debug!("SSE frame without event type, ignoring");
        return None;
    };
    match event {
        "update" => Some(match serde_json::from_str::<Post>(&frame.data) {
            Ok(post) => StreamEvent::Update(Box::new(post)),
            Err(e) => StreamEvent::Error(format!("malformed update payload: {e}")),
        }),
        "delete" => {
            let id = frame.data.trim().trim_matches('"');
            if id.is_empty() {
                Some(StreamEvent::Error("delete event without an id".to_string()))
            } else {
                Some(StreamEvent::Delete(PostId::new(id)))
            }
        }
        "notification" => Some(match serde_json::from_str::<Notification>(&frame.data) {
            Ok(n) => StreamEvent::Notification(Box::new(n)),
            Err(e) => StreamEvent::Error(format!("malformed notification payload: {e}")),
        }),
        other => {
            debug!(event = other, "ignoring stream event type");
            None
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(event: &str, data: &str) -> SseItem {
        SseItem::Frame(SseFrame {
            event: Some(event.to_string()),
            data: data.to_string(),
        })
    }

    const UPDATE: &str = r#"{"id":"7","created_at":"2024-01-01T00:00:00Z","content":"<p>hi</p>","account":{"id":"1","username":"amy","acct":"amy"}}"#;

    #[test]
    fn test_single_frame() {
        let mut dec = SseDecoder::new();
        let items = dec.feed(b"event: delete\ndata: 42\n\n");
        assert_eq!(items, vec![frame("delete", "42")]);
        assert_eq!(dec.pending_bytes(), 0);
    }

    #[test]
    fn test_crlf_line_endings() {
        let mut dec = SseDecoder::new();
        let items = dec.feed(b"event: delete\r\ndata: 42\r\n\r\n");
        assert_eq!(items, vec![frame("delete", "42")]);
    }

    #[test]
    fn test_frame_split_across_chunks() {
        let mut dec = SseDecoder::new();
        assert!(dec.feed(b"event: del").is_empty());
        assert!(dec.feed(b"ete\ndata: 4").is_empty());
        assert!(dec.feed(b"2\n").is_empty());
        assert_eq!(dec.feed(b"\n"), vec![frame("delete", "42")]);
    }

    #[test]
    fn test_utf8_split_inside_character() {
        let payload = "event: x\ndata: café\n\n".as_bytes();
        // Split between the two bytes of 'é'
        let split = payload.iter().position(|&b| b == 0xC3).unwrap() + 1;
        let mut dec = SseDecoder::new();
        assert!(dec.feed(&payload[..split]).is_empty());
        assert_eq!(dec.feed(&payload[split..]), vec![frame("x", "café")]);
    }

    #[test]
    fn test_multiline_data_joined() {
        let mut dec = SseDecoder::new();
        let items = dec.feed(b"event: x\ndata: one\ndata:two\n\n");
        assert_eq!(items, vec![frame("x", "one\ntwo")]);
    }

    #[test]
    fn test_comments_and_unknown_fields() {
        let mut dec = SseDecoder::new();
        let items = dec.feed(b":)\nid: 5\nretry: 100\nfoo: bar\nevent: delete\ndata: 1\n\n");
        assert_eq!(items, vec![SseItem::Comment(")".to_string()), frame("delete", "1")]);
    }

    #[test]
    fn test_blank_lines_without_data_do_not_dispatch() {
        let mut dec = SseDecoder::new();
        assert!(dec.feed(b"\n\nevent: lonely\n\n").is_empty());
        // The dangling event name must not leak into the next frame
        let items = dec.feed(b"data: x\n\n");
        assert_eq!(items, vec![SseItem::Frame(SseFrame { event: None, data: "x".into() })]);
    }

    #[test]
    fn test_back_to_back_frames() {
        let mut dec = SseDecoder::new();
        let items = dec.feed(b"event: delete\ndata: 1\n\nevent: delete\ndata: 2\n\n");
        assert_eq!(items, vec![frame("delete", "1"), frame("delete", "2")]);
    }

    #[test]
    fn test_decode_update() {
        let f = SseFrame { event: Some("update".into()), data: UPDATE.into() };
        match decode_frame(&f) {
            Some(StreamEvent::Update(post)) => assert_eq!(post.id, "7"),
            other => panic!("expected update, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_delete_bare_and_quoted() {
        let bare = SseFrame { event: Some("delete".into()), data: "99".into() };
        let quoted = SseFrame { event: Some("delete".into()), data: "\"99\"".into() };
        assert_eq!(decode_frame(&bare), Some(StreamEvent::Delete(PostId::new("99"))));
        assert_eq!(decode_frame(&quoted), Some(StreamEvent::Delete(PostId::new("99"))));
    }

    #[test]
    fn test_decode_malformed_payload_is_error() {
        let f = SseFrame { event: Some("update".into()), data: "{not json".into() };
        assert!(matches!(decode_frame(&f), Some(StreamEvent::Error(_))));

        let f = SseFrame { event: Some("delete".into()), data: "  ".into() };
        assert!(matches!(decode_frame(&f), Some(StreamEvent::Error(_))));
    }

    #[test]
    fn test_decode_ignores_other_event_types() {
        let f = SseFrame { event: Some("filters_changed".into()), data: "x".into() };
        assert_eq!(decode_frame(&f), None);
        let f = SseFrame { event: None, data: "x".into() };
        assert_eq!(decode_frame(&f), None);
    }
}

//! Typed events in a recorded comment stream.
//!
//! Chat connections classify every inbound frame into a [`CommentEvent`].
//! Only comments and telops ever reach the rendered overlay; the remaining
//! kinds exist so the raw diagnostic log can observe the full stream.

use serde::{Deserialize, Serialize};

/// Classification of an inbound chat-stream item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommentKind {
    /// Viewer chat message.
    Comment,
    /// Broadcaster-originated announcement/caption.
    Telop,
    /// Gift or cumulative-gift report; diagnostic only, never rendered.
    GiftIgnored,
    /// The platform signalled end of broadcast.
    LifecycleEnd,
    /// Unrecognized message type, preserved verbatim for diagnostics.
    Other,
}

/// A single item of a session's comment stream.
///
/// Immutable once created; `received_at_ms` (wall-clock milliseconds at
/// receipt) is the ordering key. Sessions append in arrival order and sort
/// once at finalize time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentEvent {
    pub kind: CommentKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    pub received_at_ms: i64,
}

impl CommentEvent {
    /// Create a viewer chat event.
    pub fn comment(text: impl Into<String>, received_at_ms: i64) -> Self {
        Self {
            kind: CommentKind::Comment,
            text: Some(text.into()),
            received_at_ms,
        }
    }

    /// Create a telop event. The platform sends null telops; those carry no
    /// text and are never rendered.
    pub fn telop(text: Option<String>, received_at_ms: i64) -> Self {
        Self {
            kind: CommentKind::Telop,
            text,
            received_at_ms,
        }
    }

    /// Create a gift placeholder event.
    pub fn gift(received_at_ms: i64) -> Self {
        Self {
            kind: CommentKind::GiftIgnored,
            text: None,
            received_at_ms,
        }
    }

    /// Create an end-of-broadcast event.
    pub fn lifecycle_end(received_at_ms: i64) -> Self {
        Self {
            kind: CommentKind::LifecycleEnd,
            text: None,
            received_at_ms,
        }
    }

    /// Create an event for an unrecognized message, keeping the raw JSON.
    pub fn other(raw: impl Into<String>, received_at_ms: i64) -> Self {
        Self {
            kind: CommentKind::Other,
            text: Some(raw.into()),
            received_at_ms,
        }
    }

    /// Whether this is a viewer chat message.
    pub fn is_comment(&self) -> bool {
        self.kind == CommentKind::Comment
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors() {
        let c = CommentEvent::comment("hello", 42);
        assert_eq!(c.kind, CommentKind::Comment);
        assert_eq!(c.text.as_deref(), Some("hello"));
        assert_eq!(c.received_at_ms, 42);
        assert!(c.is_comment());

        let t = CommentEvent::telop(None, 43);
        assert_eq!(t.kind, CommentKind::Telop);
        assert!(t.text.is_none());
        assert!(!t.is_comment());

        let e = CommentEvent::lifecycle_end(44);
        assert_eq!(e.kind, CommentKind::LifecycleEnd);
    }

    #[test]
    fn test_serde_round_trip() {
        let event = CommentEvent::comment("こんにちは", 1_577_193_934_000);
        let json = serde_json::to_string(&event).unwrap();
        let back: CommentEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(event, back);
    }

    #[test]
    fn test_gift_serializes_without_text() {
        let json = serde_json::to_string(&CommentEvent::gift(7)).unwrap();
        assert_eq!(json, r#"{"kind":"gift_ignored","received_at_ms":7}"#);
    }
}

//! Raw event log rendering.
//!
//! The diagnostic `.log` companion of a recording is the full event stream,
//! one JSON object per line, including the kinds the overlay never shows
//! (gifts, unrecognized messages, the end-of-broadcast marker).

use crate::error::Result;
use crate::event::CommentEvent;

/// Render the event stream as newline-delimited JSON.
pub fn render_jsonl(events: &[CommentEvent]) -> Result<String> {
    let mut out = String::with_capacity(events.len() * 64);
    for event in events {
        out.push_str(&serde_json::to_string(event)?);
        out.push('\n');
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::CommentKind;

    #[test]
    fn test_one_line_per_event() {
        let events = vec![
            CommentEvent::comment("hi", 100),
            CommentEvent::gift(200),
            CommentEvent::lifecycle_end(300),
        ];
        let log = render_jsonl(&events).unwrap();
        assert_eq!(log.lines().count(), 3);
        assert!(log.ends_with('\n'));
    }

    #[test]
    fn test_lines_round_trip() {
        let events = vec![
            CommentEvent::telop(Some("notice".into()), 1),
            CommentEvent::other(r#"{"t":"99","x":1}"#, 2),
        ];
        let log = render_jsonl(&events).unwrap();
        let back: Vec<CommentEvent> = log
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(back, events);
        assert_eq!(back[1].kind, CommentKind::Other);
    }

    #[test]
    fn test_empty_stream() {
        assert_eq!(render_jsonl(&[]).unwrap(), "");
    }
}

//! SHOWROOM chat connection.
//!
//! One websocket per live room. A live-info lookup guards against stale
//! listing data before any socket is opened; after that a single task owns
//! the socket, decoding inbound frames into [`CommentEvent`]s and resending
//! the keep-alive token on a fixed cadence until the stream ends or the
//! connection is cancelled.

use std::time::Duration;

use chrono::Utc;
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async, tungstenite::protocol::Message,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use danmaku::{CommentEvent, CommentKind};

use crate::api::ShowroomApi;
use crate::error::{Result, ShowroomError};

/// Keep-alive cadence; the chat server drops connections that stay silent.
const KEEP_ALIVE_SECS: u64 = 60;

/// Capacity of the event channel between the socket task and the session.
const EVENT_CHANNEL_CAPACITY: usize = 256;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// An open chat connection for one live room.
///
/// Lifecycle: `Connecting -> Open -> Closed`. The connection is `Open` from
/// a successful [`ChatConnection::open`] until the peer closes the socket,
/// the platform signals end of broadcast, or [`shutdown`](Self::shutdown)
/// is called. `Closed` is terminal; a fresh live detection creates a fresh
/// connection instead of reconnecting.
pub struct ChatConnection {
    room_key: String,
    started_at_ms: i64,
    events: mpsc::Receiver<CommentEvent>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl ChatConnection {
    /// Look up the room's connection token and open the chat socket.
    ///
    /// The on-lives listing lags up to ~30 seconds behind reality when a
    /// room closes and reopens, so the token always comes from the live-info
    /// endpoint; an empty token means the room is not actually live and no
    /// socket is opened. Errors here are left to the caller's next poll
    /// cycle.
    pub async fn open(api: &ShowroomApi, room_key: &str, room_id: u64) -> Result<Self> {
        let info = api.fetch_live_info(room_id).await?;
        if info.bcsvr_key.is_empty() {
            debug!("{room_key}: not on live, no connection token");
            return Err(ShowroomError::NotLive);
        }

        let url = format!("ws://{}:{}", info.bcsvr_host, info.bcsvr_port);
        let (stream, _) = connect_async(&url)
            .await
            .map_err(|e| ShowroomError::connection(format!("websocket connect failed: {e}")))?;
        info!("{room_key}: chat socket open");

        let started_at_ms = Utc::now().timestamp_millis();
        let (event_tx, events) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let cancel = CancellationToken::new();
        let task = tokio::spawn(socket_loop(
            stream,
            format!("SUB\t{}", info.bcsvr_key),
            event_tx,
            cancel.clone(),
            room_key.to_string(),
        ));

        Ok(Self {
            room_key: room_key.to_string(),
            started_at_ms,
            events,
            cancel,
            task: Some(task),
        })
    }

    /// The room this connection belongs to.
    pub fn room_key(&self) -> &str {
        &self.room_key
    }

    /// Wall-clock milliseconds at which the socket opened; recordings are
    /// timed relative to this.
    pub fn started_at_ms(&self) -> i64 {
        self.started_at_ms
    }

    /// Receive the next event. `None` once the connection has closed and
    /// all buffered events are drained.
    pub async fn recv(&mut self) -> Option<CommentEvent> {
        self.events.recv().await
    }

    /// Close the socket and wait for the socket task to exit.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

/// The socket task: keep-alive resend, frame decode, cancellation. The
/// first keep-alive tick fires immediately, subscribing the connection to
/// the room's message stream.
async fn socket_loop(
    mut stream: WsStream,
    keep_alive: String,
    event_tx: mpsc::Sender<CommentEvent>,
    cancel: CancellationToken,
    room_key: String,
) {
    let mut keep_alive_timer = tokio::time::interval(Duration::from_secs(KEEP_ALIVE_SECS));
    keep_alive_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                let _ = stream.close(None).await;
                break;
            }

            _ = keep_alive_timer.tick() => {
                if let Err(e) = stream.send(Message::text(keep_alive.clone())).await {
                    error!("{room_key}: failed to send keep-alive: {e}");
                    break;
                }
                debug!("{room_key}: sent keep-alive");
            }

            frame = stream.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        let received_at_ms = Utc::now().timestamp_millis();
                        if let Some(event) = decode_frame(text.as_str(), received_at_ms, &room_key) {
                            let ended = event.kind == CommentKind::LifecycleEnd;
                            if event_tx.send(event).await.is_err() {
                                break;
                            }
                            if ended {
                                let _ = stream.close(None).await;
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        debug!("{room_key}: chat socket closed by peer");
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        error!("{room_key}: websocket error: {e}");
                        break;
                    }
                }
            }
        }
    }

    debug!("{room_key}: socket task stopped");
}

/// Decode one inbound frame into an event.
///
/// Frames carry a non-JSON routing prefix that is stripped up to the first
/// `{`. Frames that still fail to parse get one repair attempt (the server
/// truncates long comments mid-string) before being dropped.
fn decode_frame(raw: &str, received_at_ms: i64, room_key: &str) -> Option<CommentEvent> {
    let Some(start) = raw.find('{') else {
        error!("{room_key}: no JSON payload in frame: {raw}");
        return None;
    };
    let payload = &raw[start..];

    let value = match serde_json::from_str::<Value>(payload) {
        Ok(value) => value,
        Err(e) => {
            debug!("{room_key}: broken frame, JSON decode error: {e}");
            let repaired = format!("{payload}\",\"t\":\"1\"}}");
            match serde_json::from_str::<Value>(&repaired) {
                Ok(value) => {
                    debug!("{room_key}: frame repair passed");
                    value
                }
                Err(_) => {
                    error!("{room_key}: failed to repair broken frame: {payload}");
                    return None;
                }
            }
        }
    };

    Some(classify(&value, received_at_ms))
}

/// Map the platform's message-type tag onto the closed event model. The tag
/// arrives as either a number or a string.
fn classify(value: &Value, received_at_ms: i64) -> CommentEvent {
    let tag = match &value["t"] {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        _ => String::new(),
    };

    match tag.as_str() {
        // comment
        "1" => CommentEvent::comment(value["cm"].as_str().unwrap_or_default(), received_at_ms),
        // gift / cumulated gifts report
        "2" | "11" => CommentEvent::gift(received_at_ms),
        // telop; may be null
        "8" => CommentEvent::telop(
            value["telop"].as_str().map(str::to_string),
            received_at_ms,
        ),
        // live finished
        "101" => CommentEvent::lifecycle_end(received_at_ms),
        _ => CommentEvent::other(value.to_string(), received_at_ms),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_strips_routing_prefix() {
        let event = decode_frame(r#"MSG	8016f3:LyTkjap9	{"t":"1","cm":"hello"}"#, 5, "room").unwrap();
        assert_eq!(event.kind, CommentKind::Comment);
        assert_eq!(event.text.as_deref(), Some("hello"));
        assert_eq!(event.received_at_ms, 5);
    }

    #[test]
    fn test_decode_drops_frame_without_json() {
        assert!(decode_frame("ACK\tshowroom", 0, "room").is_none());
    }

    #[test]
    fn test_decode_repairs_truncated_comment() {
        let event = decode_frame(r#"MSG	x	{"ac":"fan1","cm":"long comment cut of"#, 0, "room").unwrap();
        assert_eq!(event.kind, CommentKind::Comment);
    }

    #[test]
    fn test_decode_gives_up_on_unrepairable_frame() {
        assert!(decode_frame(r#"MSG	x	{"t":1,"cm":}"#, 0, "room").is_none());
    }

    #[test]
    fn test_classify_tag_variants() {
        let comment = decode_frame(r#"{"t":1,"cm":"numeric tag"}"#, 0, "room").unwrap();
        assert_eq!(comment.kind, CommentKind::Comment);

        let gift = decode_frame(r#"{"t":"2","g":1500,"n":10}"#, 0, "room").unwrap();
        assert_eq!(gift.kind, CommentKind::GiftIgnored);

        let report = decode_frame(r#"{"t":"11"}"#, 0, "room").unwrap();
        assert_eq!(report.kind, CommentKind::GiftIgnored);

        let telop = decode_frame(r#"{"t":"8","telop":"next show at 9"}"#, 0, "room").unwrap();
        assert_eq!(telop.kind, CommentKind::Telop);
        assert_eq!(telop.text.as_deref(), Some("next show at 9"));

        let null_telop = decode_frame(r#"{"t":"8","telop":null}"#, 0, "room").unwrap();
        assert_eq!(null_telop.kind, CommentKind::Telop);
        assert!(null_telop.text.is_none());

        let end = decode_frame(r#"{"t":101}"#, 0, "room").unwrap();
        assert_eq!(end.kind, CommentKind::LifecycleEnd);
    }

    #[test]
    fn test_classify_unknown_tag_preserved() {
        let event = decode_frame(r#"{"t":"47","created_at":1577193934}"#, 0, "room").unwrap();
        assert_eq!(event.kind, CommentKind::Other);
        let raw = event.text.unwrap();
        assert!(raw.contains("\"t\":\"47\""));
        assert!(raw.contains("1577193934"));
    }

    /// Integration test: connect to a real room's chat server.
    /// Requires network access and a live room id.
    #[tokio::test]
    #[ignore]
    async fn test_real_connection() {
        let api = ShowroomApi::new();
        let room_id = 105923;

        let mut conn = ChatConnection::open(&api, "LOVE_ANNA_YAMAMOTO", room_id)
            .await
            .expect("room must be on live for this test");

        let mut count = 0;
        while let Some(event) = conn.recv().await {
            println!("{event:?}");
            count += 1;
            if count >= 20 {
                break;
            }
        }
        conn.shutdown().await;
    }
}

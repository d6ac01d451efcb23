//! Per-room recording session.
//!
//! One task per live room, owning the accumulated event sequence from open
//! to finalize. On completion (end of broadcast, socket close, or forced
//! quit) the events are sorted, rendered through the layout engine and
//! written out; a forced quit therefore never loses a partial recording.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::DateTime;
use chrono_tz::Asia::Tokyo;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use danmaku::{CommentEvent, CommentKind, is_score_noise, layout, raw_log};
use showroom::{ChatConnection, LiveRoomSnapshot, ShowroomApi};

use crate::config::Settings;

/// Directory recordings are written into, under the working directory.
const OUTPUT_DIR: &str = "comments";

/// Characters that are invalid in file names on common filesystems.
const INVALID_PATH_CHARS: &[char] = &['\\', '/', ':', '*', '?', '"', '<', '>', '|'];

/// Handle to one room's recording task.
pub struct RecordingSession {
    room_key: String,
    display_name: String,
    recording: Arc<AtomicBool>,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl RecordingSession {
    /// Spawn the recording task for a room the listing reports as live.
    pub fn spawn(
        api: ShowroomApi,
        room: LiveRoomSnapshot,
        settings: Settings,
        echo_comments: Arc<AtomicBool>,
    ) -> Self {
        let recording = Arc::new(AtomicBool::new(false));
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run(
            api,
            room.clone(),
            settings,
            echo_comments,
            recording.clone(),
            cancel.clone(),
        ));

        Self {
            room_key: room.room_key,
            display_name: room.display_name,
            recording,
            cancel,
            handle,
        }
    }

    pub fn room_key(&self) -> &str {
        &self.room_key
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// True while the chat connection is open and events are accumulating.
    pub fn is_recording(&self) -> bool {
        self.recording.load(Ordering::SeqCst)
    }

    /// True once the session task has exited; the scheduler reclaims the
    /// room slot on this signal, never on `is_recording` alone.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Force the session to finish and wait until its files are flushed.
    pub async fn quit(self) {
        self.cancel.cancel();
        let _ = self.handle.await;
    }
}

async fn run(
    api: ShowroomApi,
    room: LiveRoomSnapshot,
    settings: Settings,
    echo_comments: Arc<AtomicBool>,
    recording: Arc<AtomicBool>,
    cancel: CancellationToken,
) {
    let mut conn = match ChatConnection::open(&api, &room.room_key, room.room_id).await {
        Ok(conn) => conn,
        Err(e) => {
            // The next poll cycle retries once the listing and the live-info
            // endpoint agree again.
            debug!("{}: chat connection not opened: {e}", room.room_key);
            return;
        }
    };

    info!("{}: is on live, start recording comments", room.room_key);
    recording.store(true, Ordering::SeqCst);

    let start_time_ms = conn.started_at_ms();
    let mut events: Vec<CommentEvent> = Vec::new();

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,

            event = conn.recv() => {
                let Some(event) = event else { break };
                if echo_comments.load(Ordering::Relaxed)
                    && event.is_comment()
                    && let Some(text) = event.text.as_deref()
                    && !is_score_noise(text)
                {
                    info!("{}: {}", room.room_key, text);
                }
                let ended = event.kind == CommentKind::LifecycleEnd;
                events.push(event);
                if ended {
                    break;
                }
            }
        }
    }

    conn.shutdown().await;

    finalize(&room, start_time_ms, events, &settings, Path::new(".")).await;
    recording.store(false, Ordering::SeqCst);
}

/// Sort, render and persist a finished session. All failures degrade to an
/// error log; the scheduler keeps running either way.
async fn finalize(
    room: &LiveRoomSnapshot,
    start_time_ms: i64,
    mut events: Vec<CommentEvent>,
    settings: &Settings,
    base_dir: &Path,
) {
    // Arrival order is not guaranteed monotonic across edge cases.
    events.sort_by_key(|e| e.received_at_ms);

    let accepted = events
        .iter()
        .filter(|e| {
            e.is_comment()
                && e.text
                    .as_deref()
                    .is_some_and(|text| !is_score_noise(text))
        })
        .count();

    // Timestamp in the platform's home timezone.
    let timestamp = DateTime::from_timestamp_millis(start_time_ms)
        .map(|dt| dt.with_timezone(&Tokyo).format("%y%m%d %H%M%S").to_string())
        .unwrap_or_default();

    let dir = output_dir(base_dir).await;
    let safe_name = sanitize_file_name(&room.display_name);
    let primary = format!("{} {} {}", room.room_key, timestamp, safe_name);
    let fallback = format!("{} {}", room.room_key, timestamp);

    if settings.program.save_comments_debug_log && !events.is_empty() {
        match raw_log::render_jsonl(&events) {
            Ok(log_text) => {
                write_with_fallback(&dir, &primary, &fallback, "log", &log_text, &room.room_key)
                    .await;
            }
            Err(e) => error!("{}: failed to serialize raw event log: {e}", room.room_key),
        }
    }

    if accepted > 0 {
        let doc = layout::render(start_time_ms, &events, &settings.danmaku);
        write_with_fallback(&dir, &primary, &fallback, "ass", &doc, &room.room_key).await;
    } else {
        info!("{}: no comments to save", room.room_key);
    }
}

/// The output directory, falling back to the base directory itself when it
/// cannot be created.
async fn output_dir(base_dir: &Path) -> PathBuf {
    let dir = base_dir.join(OUTPUT_DIR);
    match tokio::fs::create_dir_all(&dir).await {
        Ok(()) => dir,
        Err(e) => {
            error!("cannot create {}: {e}", dir.display());
            base_dir.to_path_buf()
        }
    }
}

fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .map(|c| if INVALID_PATH_CHARS.contains(&c) { '_' } else { c })
        .collect()
}

/// Write with the full display name; on filesystem failure retry once with
/// the short room-key name, then give up.
async fn write_with_fallback(
    dir: &Path,
    primary: &str,
    fallback: &str,
    ext: &str,
    contents: &str,
    room_key: &str,
) {
    let path = dir.join(format!("{primary}.{ext}"));
    match tokio::fs::write(&path, contents).await {
        Ok(()) => {
            info!("{room_key}: recording finished, saved to {}", path.display());
            return;
        }
        Err(e) => error!("{room_key}: failed to write {}: {e}", path.display()),
    }

    let path = dir.join(format!("{fallback}.{ext}"));
    match tokio::fs::write(&path, contents).await {
        Ok(()) => info!("{room_key}: recording finished, saved to {}", path.display()),
        Err(e) => error!("{room_key}: giving up on {}: {e}", path.display()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;

    fn snapshot(display_name: &str) -> LiveRoomSnapshot {
        LiveRoomSnapshot {
            room_key: "ROOM_A".to_string(),
            room_id: 105923,
            display_name: display_name.to_string(),
            genre_id: 102,
        }
    }

    fn find_output(dir: &Path, ext: &str) -> Vec<PathBuf> {
        let mut found = Vec::new();
        for entry in std::fs::read_dir(dir.join(OUTPUT_DIR)).unwrap() {
            let path = entry.unwrap().path();
            if path.extension().is_some_and(|e| e == ext) {
                found.push(path);
            }
        }
        found
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("山本 杏奈（=LOVE）"), "山本 杏奈（=LOVE）");
        assert_eq!(sanitize_file_name("a/b\\c:d*e?f\"g<h>i|j"), "a_b_c_d_e_f_g_h_i_j");
    }

    #[tokio::test]
    async fn test_finalize_writes_subtitle_and_log() {
        let tmp = tempfile::tempdir().unwrap();
        let mut settings = Settings::default();
        settings.program.save_comments_debug_log = true;

        let events = vec![
            CommentEvent::comment("yo", 150),
            CommentEvent::comment("hi", 100),
            CommentEvent::gift(120),
            CommentEvent::comment("50", 200),
        ];
        finalize(&snapshot("A Room"), 0, events, &settings, tmp.path()).await;

        let ass = find_output(tmp.path(), "ass");
        assert_eq!(ass.len(), 1);
        let doc = std::fs::read_to_string(&ass[0]).unwrap();
        // Sorted before rendering: "hi" precedes "yo"; "50" suppressed.
        let cues: Vec<&str> = doc.lines().filter(|l| l.starts_with("Dialogue:")).collect();
        assert_eq!(cues.len(), 2);
        assert!(cues[0].ends_with("}hi"));
        assert!(cues[1].ends_with("}yo"));

        let logs = find_output(tmp.path(), "log");
        assert_eq!(logs.len(), 1);
        assert_eq!(std::fs::read_to_string(&logs[0]).unwrap().lines().count(), 4);
    }

    #[tokio::test]
    async fn test_finalize_no_accepted_comments_skips_subtitle() {
        let tmp = tempfile::tempdir().unwrap();
        let mut settings = Settings::default();
        settings.program.save_comments_debug_log = true;

        // Only ignored gifts and score noise observed.
        let events = vec![CommentEvent::gift(50), CommentEvent::comment("50", 100)];
        finalize(&snapshot("A Room"), 0, events, &settings, tmp.path()).await;

        assert!(find_output(tmp.path(), "ass").is_empty());
        assert_eq!(find_output(tmp.path(), "log").len(), 1);
    }

    #[tokio::test]
    async fn test_finalize_without_debug_log_writes_nothing_for_empty_session() {
        let tmp = tempfile::tempdir().unwrap();
        finalize(&snapshot("A Room"), 0, Vec::new(), &Settings::default(), tmp.path()).await;
        assert!(find_output(tmp.path(), "ass").is_empty());
        assert!(find_output(tmp.path(), "log").is_empty());
    }

    #[tokio::test]
    async fn test_finalize_filename_uses_tokyo_time_and_room_name() {
        let tmp = tempfile::tempdir().unwrap();
        let events = vec![CommentEvent::comment("hello", 100)];
        // 2019-12-24 13:05:34 UTC -> 22:05:34 in Tokyo.
        finalize(&snapshot("地下/天使"), 1_577_192_734_000, events, &Settings::default(), tmp.path())
            .await;

        let ass = find_output(tmp.path(), "ass");
        assert_eq!(ass.len(), 1);
        let name = ass[0].file_name().unwrap().to_string_lossy().into_owned();
        assert_eq!(name, "ROOM_A 191224 220534 地下_天使.ass");
    }
}

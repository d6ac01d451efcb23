//! Room scheduler.
//!
//! Polls the on-lives listing on a fixed interval, reconciles it against the
//! watch-list, and keeps at most one recording session per room key.
//! Sessions end on their own; the scheduler only ever starts them and, on
//! shutdown, force-quits the stragglers.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use showroom::{LiveRoomSnapshot, ShowroomApi};

use crate::config::Settings;
use crate::session::RecordingSession;

/// Commands accepted by a running scheduler.
pub enum SchedulerCommand {
    /// Log the set of currently-recording rooms.
    Status,
}

/// Handle to the running scheduler task.
pub struct SchedulerHandle {
    cancel: CancellationToken,
    command_tx: mpsc::Sender<SchedulerCommand>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Ask the scheduler to log its recording status.
    pub async fn status(&self) {
        let _ = self.command_tx.send(SchedulerCommand::Status).await;
    }

    /// Stop polling, force-quit every active session and wait for each, so
    /// all partial recordings are flushed before this returns.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        let _ = self.task.await;
    }
}

pub struct RoomScheduler {
    api: ShowroomApi,
    watch_keys: Vec<String>,
    settings: Settings,
    echo_comments: Arc<AtomicBool>,
    sessions: HashMap<String, RecordingSession>,
}

impl RoomScheduler {
    pub fn new(
        api: ShowroomApi,
        watch_keys: Vec<String>,
        settings: Settings,
        echo_comments: Arc<AtomicBool>,
    ) -> Self {
        Self {
            api,
            watch_keys,
            settings,
            echo_comments,
            sessions: HashMap::new(),
        }
    }

    /// Spawn the scheduler task.
    pub fn start(self) -> SchedulerHandle {
        let cancel = CancellationToken::new();
        let (command_tx, command_rx) = mpsc::channel(16);
        let task = tokio::spawn(self.run(command_rx, cancel.clone()));
        SchedulerHandle {
            cancel,
            command_tx,
            task,
        }
    }

    async fn run(
        mut self,
        mut command_rx: mpsc::Receiver<SchedulerCommand>,
        cancel: CancellationToken,
    ) {
        let interval = self.settings.program.interval.max(1);
        debug!(
            "interval = {}s, monitoring {} rooms: {:?}",
            interval,
            self.watch_keys.len(),
            self.watch_keys
        );

        // First poll fires immediately; after that every `interval` seconds,
        // counted on a 1 s tick so quitting is never stalled by the wait.
        let mut elapsed = interval;
        loop {
            if elapsed >= interval {
                elapsed = 0;
                self.poll_cycle().await;
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                Some(cmd) = command_rx.recv() => self.handle_command(cmd),
                _ = tokio::time::sleep(Duration::from_secs(1)) => elapsed += 1,
            }
        }

        for (room_key, session) in self.sessions.drain() {
            if !session.is_finished() {
                info!("quitting {room_key}...");
            }
            session.quit().await;
        }
    }

    async fn poll_cycle(&mut self) {
        // A finished task frees its key for re-detection; a session that is
        // still connecting stays claimed, so a room never records twice.
        self.sessions.retain(|_, session| !session.is_finished());

        let listing = match self.api.fetch_onlives().await {
            Ok(listing) => listing,
            Err(e) => {
                error!("failed to get lives info: {e}");
                Vec::new()
            }
        };

        let active: Vec<&str> = self.sessions.keys().map(String::as_str).collect();
        let starts: Vec<LiveRoomSnapshot> =
            rooms_to_start(&self.watch_keys, &active, &listing)
                .into_iter()
                .cloned()
                .collect();

        for room in starts {
            debug!("{}: is on the main site live list", room.room_key);
            let session = RecordingSession::spawn(
                self.api.clone(),
                room.clone(),
                self.settings.clone(),
                self.echo_comments.clone(),
            );
            self.sessions.insert(room.room_key, session);
        }
    }

    fn handle_command(&self, cmd: SchedulerCommand) {
        match cmd {
            SchedulerCommand::Status => {
                let recording: Vec<&RecordingSession> = self
                    .sessions
                    .values()
                    .filter(|s| s.is_recording())
                    .collect();
                let mut report = format!(
                    "Monitoring rooms: {}\nRecording rooms: {}\n",
                    self.watch_keys.len(),
                    recording.len()
                );
                for (i, session) in recording.iter().enumerate() {
                    report.push_str(&format!(
                        "  {}) {}: {}\n",
                        i + 1,
                        session.room_key(),
                        session.display_name()
                    ));
                }
                info!("{report}");
            }
        }
    }
}

/// Watched rooms that should get a new session this cycle: present in the
/// listing and not already claimed by an active session.
fn rooms_to_start<'a>(
    watch_keys: &[String],
    active_keys: &[&str],
    listing: &'a [LiveRoomSnapshot],
) -> Vec<&'a LiveRoomSnapshot> {
    watch_keys
        .iter()
        .filter(|key| !active_keys.contains(&key.as_str()))
        .filter_map(|key| listing.iter().find(|room| &room.room_key == key))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn room(key: &str) -> LiveRoomSnapshot {
        LiveRoomSnapshot {
            room_key: key.to_string(),
            room_id: 1,
            display_name: key.to_lowercase(),
            genre_id: 102,
        }
    }

    #[test]
    fn test_rooms_to_start_matches_watchlist_only() {
        let watch = vec!["A".to_string(), "B".to_string()];
        let listing = vec![room("B"), room("C")];

        let starts = rooms_to_start(&watch, &[], &listing);
        assert_eq!(starts.len(), 1);
        assert_eq!(starts[0].room_key, "B");
    }

    /// An active session claims its key even while still connecting, so a
    /// key never gets a second concurrent session.
    #[test]
    fn test_rooms_to_start_skips_active_keys() {
        let watch = vec!["A".to_string(), "B".to_string()];
        let listing = vec![room("A"), room("B")];

        let starts = rooms_to_start(&watch, &["A"], &listing);
        assert_eq!(starts.len(), 1);
        assert_eq!(starts[0].room_key, "B");

        assert!(rooms_to_start(&watch, &["A", "B"], &listing).is_empty());
    }

    #[test]
    fn test_rooms_to_start_empty_listing() {
        let watch = vec!["A".to_string()];
        assert!(rooms_to_start(&watch, &[], &[]).is_empty());
    }
}

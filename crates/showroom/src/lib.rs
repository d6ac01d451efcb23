//! SHOWROOM platform client.
//!
//! Plumbing around the platform's public endpoints: the on-lives listing
//! poll, the per-room live-info lookup, and the chat websocket that yields
//! typed [`danmaku::CommentEvent`]s for a recording session.

pub mod api;
pub mod chat;
pub mod error;
pub mod models;

pub use api::ShowroomApi;
pub use chat::ChatConnection;
pub use error::{Result, ShowroomError};
pub use models::{LiveInfo, LiveRoomSnapshot};

//! Danmaku: typed live-chat events and the subtitle layout engine.
//!
//! This crate holds the pure core of the recorder: the event model a chat
//! session accumulates, and the layout algorithm that turns a finished
//! session into a danmaku (弾幕 / bullet comment) `.ass` overlay.
//!
//! ## Core Types
//!
//! - [`CommentEvent`] - A single timestamped item of a session's chat stream
//! - [`CommentKind`] - Closed classification of inbound message types
//! - [`DanmakuStyle`] - Font/screen options for the generated overlay
//!
//! ## Layout
//!
//! - [`layout::render`] - Comment stream + start time -> `.ass` document
//!
//! ## Output
//!
//! - [`raw_log::render_jsonl`] - Raw event stream as newline-delimited JSON

pub mod error;
pub mod event;
pub mod layout;
pub mod raw_log;

pub use error::{DanmakuError, Result};
pub use event::{CommentEvent, CommentKind};
pub use layout::{DanmakuStyle, is_score_noise, render};

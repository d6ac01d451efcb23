//! Danmaku layout engine.
//!
//! Converts an ordered comment stream into an `.ass` subtitle overlay in
//! which each accepted comment flies right-to-left across the screen without
//! vertically overlapping comments that are still in flight.
//!
//! The engine is pure: for a fixed input sequence and style the output is
//! byte-identical. Callers are expected to pass events already sorted by
//! `received_at_ms`.

use std::fmt::Write;

use crate::event::{CommentEvent, CommentKind};

/// Time a bullet comment spends crossing the screen, in milliseconds.
const FLIGHT_MS: i64 = 8_000;

/// Style options for the generated overlay.
#[derive(Debug, Clone, PartialEq)]
pub struct DanmakuStyle {
    /// Font size in pixels; also the height of one text row.
    pub font_size: u32,
    pub font_name: String,
    /// Transparency percentage, 0 (opaque) to 100 (invisible).
    pub alpha_percent: u32,
    /// Playback resolution width in pixels.
    pub width: u32,
    /// Playback resolution height in pixels.
    pub height: u32,
}

impl Default for DanmakuStyle {
    fn default() -> Self {
        Self {
            font_size: 18,
            font_name: "MS PGothic".to_string(),
            alpha_percent: 10,
            width: 640,
            height: 360,
        }
    }
}

impl DanmakuStyle {
    /// Alpha as the two-digit uppercase hex byte used in ASS override tags:
    /// `00` is fully visible, `FF` fully transparent.
    fn alpha_hex(&self) -> String {
        let alpha = (self.alpha_percent as f64 * 255.0 / 100.0).round() as i64;
        format!("{:02X}", alpha.clamp(0, 255))
    }
}

/// Render a comment stream as a complete `.ass` danmaku document.
///
/// `start_time_ms` is the recording start (the websocket open time); each
/// cue is timed relative to it. Events received before it produce negative
/// offsets, which still drive slot assignment but clamp to zero in the
/// emitted timestamps.
pub fn render(start_time_ms: i64, events: &[CommentEvent], style: &DanmakuStyle) -> String {
    let mut doc = String::new();
    push_header(&mut doc, style);

    // One entry per text row, top to bottom; each holds the relative time at
    // which that row becomes free again.
    let slot_count = ((style.height / style.font_size.max(1)) as usize).max(1);
    let mut slots = vec![0i64; slot_count];
    let mut previous_telop: Option<String> = None;

    for event in events {
        let Some(text) = accepted_text(event, &mut previous_telop) else {
            continue;
        };

        let t = event.received_at_ms - start_time_ms;

        // First fit from the top keeps simultaneous comments in reading
        // order; when every row is occupied, evict the oldest-finishing row,
        // lowest index winning ties.
        let row = match slots.iter().position(|&free_at| free_at <= t) {
            Some(row) => row,
            None => min_index(&slots),
        };
        slots[row] = t + FLIGHT_MS;

        push_dialogue(&mut doc, t, row, &text, style);
    }

    doc
}

/// Short, purely numeric comments are score/vote spam ("1" through "50"),
/// not chat. Only true ASCII decimal digits match; numeral-like scripts
/// (full-width, enclosed, superscript digits) do not.
pub fn is_score_noise(text: &str) -> bool {
    !text.is_empty()
        && text.chars().count() < 3
        && text.chars().all(|c| c.is_ascii_digit())
        && text.parse::<u32>().is_ok_and(|v| v <= 50)
}

/// The display text for an event, or `None` when it is filtered out.
fn accepted_text(event: &CommentEvent, previous_telop: &mut Option<String>) -> Option<String> {
    match event.kind {
        CommentKind::Comment => {
            let text = event.text.as_deref()?;
            if is_score_noise(text) {
                return None;
            }
            Some(text.replace('\n', " "))
        }
        CommentKind::Telop => {
            // Null telops and repeats of the last shown telop are dropped.
            let telop = event.text.as_deref()?;
            if previous_telop.as_deref() == Some(telop) {
                return None;
            }
            *previous_telop = Some(telop.to_string());
            Some(format!("Telop: 【{telop}】"))
        }
        CommentKind::GiftIgnored | CommentKind::LifecycleEnd | CommentKind::Other => None,
    }
}

/// Index of the smallest free-time; the first occurrence wins ties.
fn min_index(slots: &[i64]) -> usize {
    let mut min = 0;
    for (row, &free_at) in slots.iter().enumerate().skip(1) {
        if free_at < slots[min] {
            min = row;
        }
    }
    min
}

fn push_header(doc: &mut String, style: &DanmakuStyle) {
    let _ = write!(
        doc,
        "[Script Info]\n\
         ScriptType: v4.00+\n\
         Collisions: Normal\n\
         PlayResX: {}\n\
         PlayResY: {}\n\n",
        style.width, style.height
    );
    doc.push_str("[V4+ Styles]\n");
    doc.push_str(
        "Format: Name, Fontname, Fontsize, PrimaryColour, SecondaryColour, OutlineColour, \
         BackColour, Bold, Italic, Underline, StrikeOut, ScaleX, ScaleY, Spacing, Angle, \
         BorderStyle, Outline, Shadow, Alignment, MarginL, MarginR, MarginV, Encoding\n",
    );
    let _ = write!(
        doc,
        "Style: danmakuFont, {}, {}, &H00FFFFFF, &H00FFFFFF, &H00000000, &H00000000, \
         1, 0, 0, 0, 100, 100, 0.00, 0.00, 1, 1, 0, 2, 20, 20, 20, 0\n\n",
        style.font_name, style.font_size
    );
    doc.push_str("[Events]\n");
    doc.push_str("Format: Layer, Start, End, Style, Name, MarginL, MarginR, MarginV, Effect, Text\n");
}

fn push_dialogue(doc: &mut String, t: i64, row: usize, text: &str, style: &DanmakuStyle) {
    // Overshoot both screen edges so the text enters and leaves fully
    // off-screen.
    let extra = text.chars().count().div_ceil(2) as i64 * style.font_size as i64;
    let x1 = style.width as i64 + extra;
    let x2 = -extra;
    let y = (row as i64 + 1) * style.font_size as i64;

    let _ = writeln!(
        doc,
        "Dialogue: 3,{},{},danmakuFont,,0000,0000,0000,,{{\\alpha&H{}&\\move({},{},{},{})}}{}",
        ass_time(t),
        ass_time(t + FLIGHT_MS),
        style.alpha_hex(),
        x1,
        y,
        x2,
        y,
        text
    );
}

/// Millisecond offset as an ASS timestamp (`HH:MM:SS.CC`). Pre-roll events
/// produce negative offsets the format cannot express; they clamp to zero
/// here rather than in slot arithmetic.
fn ass_time(ms: i64) -> String {
    let ms = ms.max(0);
    let cs = (ms % 1000) / 10;
    let secs = ms / 1000;
    format!(
        "{:02}:{:02}:{:02}.{:02}",
        secs / 3600,
        secs / 60 % 60,
        secs % 60,
        cs
    )
}

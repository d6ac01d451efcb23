//! Program configuration.
//!
//! Two INI-style text files, both auto-created with documented examples when
//! absent: `srdan.ini` holds program and danmaku settings, `rooms.ini` the
//! watch-list of room keys. `#` starts a comment anywhere on a line; section
//! names and keys are case-insensitive; malformed or unknown entries are
//! warned about and skipped so a typo never prevents startup.

use std::fs;
use std::path::Path;

use danmaku::DanmakuStyle;
use tracing::warn;

/// Default settings file name.
pub const SETTINGS_FILE: &str = "srdan.ini";
/// Default watch-list file name.
pub const ROOMS_FILE: &str = "rooms.ini";

const SETTINGS_TEMPLATE: &str = "\
[program_settings]
interval = 10                    # seconds, time interval to check rooms are on live or not
show_comments = 0                # 1: enable, 0: disable
show_debug_message = 0           # 1: enable, 0: disable
save_program_debug_log = 0       # 1: enable, 0: disable
save_comments_debug_log = 0      # 1: enable, 0: disable

[danmaku_settings]
width = 640
height = 360
font_name = MS PGothic
font_size = 18
alpha = 10                       # transparency percentage, a number between 0 and 100
";

const ROOMS_TEMPLATE: &str = "\
#######################################################################################
# To add a room to monitor and record its comments, copy and paste its room_url_key
# in the \"[rooms]\" section below. Each line is only for one room.
#
# The room_url_key is the last part of the room url address.
# For example, if a room url is https://www.showroom-live.com/LOVE_ANNA_YAMAMOTO
# the room_url_key is the last part after the main website address: LOVE_ANNA_YAMAMOTO
# Please note that it is case sensitive.
#
# The program checks the on-live list from the website. A wrong room_url_key will not
# be reported, since it will simply never be found on the on-live list.
#
# Anything after a \"#\" on a line is ignored. You can put a description for a
# room_url_key after #, or temporarily disable one by inserting # in front of it.
#
# You can delete this file and run the program once to regenerate a clean copy.
#######################################################################################
[rooms]
";

/// Program-level settings from `[program_settings]`.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgramSettings {
    /// Seconds between listing polls.
    pub interval: u64,
    /// Echo recorded comments at INFO level.
    pub show_comments: bool,
    /// Log at DEBUG level on the console.
    pub show_debug_message: bool,
    /// Also write a debug-level program log file.
    pub save_program_debug_log: bool,
    /// Write the raw per-session event log next to the subtitle file.
    pub save_comments_debug_log: bool,
}

impl Default for ProgramSettings {
    fn default() -> Self {
        Self {
            interval: 10,
            show_comments: false,
            show_debug_message: false,
            save_program_debug_log: false,
            save_comments_debug_log: false,
        }
    }
}

/// All settings: program behavior plus the danmaku style bundle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Settings {
    pub program: ProgramSettings,
    pub danmaku: DanmakuStyle,
}

/// Load the settings file, writing the documented template first if absent.
pub fn load_or_create_settings(path: &Path) -> anyhow::Result<Settings> {
    Ok(parse_settings(&ensure_file(path, SETTINGS_TEMPLATE)?))
}

/// Load the watch-list, writing the documented template first if absent.
/// Returns the keys in file order plus the number of duplicates removed.
pub fn load_or_create_rooms(path: &Path) -> anyhow::Result<(Vec<String>, usize)> {
    let keys = parse_rooms(&ensure_file(path, ROOMS_TEMPLATE)?);
    let total = keys.len();
    let mut deduped: Vec<String> = Vec::with_capacity(total);
    for key in keys {
        if !deduped.contains(&key) {
            deduped.push(key);
        }
    }
    let removed = total - deduped.len();
    Ok((deduped, removed))
}

fn ensure_file(path: &Path, template: &str) -> std::io::Result<String> {
    if !path.is_file() {
        fs::write(path, template)?;
    }
    fs::read_to_string(path)
}

#[derive(Clone, Copy, PartialEq)]
enum Section {
    None,
    Program,
    Danmaku,
}

fn parse_settings(text: &str) -> Settings {
    let mut settings = Settings::default();
    let mut section = Section::None;

    for line in text.lines() {
        let line = strip_comment(line);
        if line.is_empty() {
            continue;
        }

        if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            section = match name.to_ascii_lowercase().as_str() {
                "program_settings" => Section::Program,
                "danmaku_settings" => Section::Danmaku,
                other => {
                    warn!("unknown settings section [{other}]");
                    Section::None
                }
            };
            continue;
        }

        let Some((key, value)) = line.split_once('=') else {
            warn!("ignoring malformed settings line: {line}");
            continue;
        };
        let key = key.trim().to_ascii_lowercase();
        let value = value.trim();

        match section {
            Section::Program => {
                let program = &mut settings.program;
                match key.as_str() {
                    "interval" => parse_into(&key, value, &mut program.interval),
                    "show_comments" => parse_flag(&key, value, &mut program.show_comments),
                    "show_debug_message" => parse_flag(&key, value, &mut program.show_debug_message),
                    "save_program_debug_log" => {
                        parse_flag(&key, value, &mut program.save_program_debug_log)
                    }
                    "save_comments_debug_log" => {
                        parse_flag(&key, value, &mut program.save_comments_debug_log)
                    }
                    _ => warn!("unknown program setting: {key}"),
                }
            }
            Section::Danmaku => {
                let danmaku = &mut settings.danmaku;
                match key.as_str() {
                    "width" => parse_into(&key, value, &mut danmaku.width),
                    "height" => parse_into(&key, value, &mut danmaku.height),
                    "font_size" => parse_into(&key, value, &mut danmaku.font_size),
                    "font_name" => danmaku.font_name = value.to_string(),
                    "alpha" => parse_into(&key, value, &mut danmaku.alpha_percent),
                    _ => warn!("unknown danmaku setting: {key}"),
                }
            }
            Section::None => warn!("settings line outside any section: {line}"),
        }
    }

    settings
}

fn parse_rooms(text: &str) -> Vec<String> {
    text.lines()
        .map(strip_comment)
        .filter(|line| !line.is_empty() && !line.starts_with('['))
        .map(str::to_string)
        .collect()
}

fn strip_comment(line: &str) -> &str {
    match line.find('#') {
        Some(idx) => line[..idx].trim(),
        None => line.trim(),
    }
}

fn parse_into<T: std::str::FromStr>(key: &str, value: &str, target: &mut T) {
    match value.parse() {
        Ok(parsed) => *target = parsed,
        Err(_) => warn!("invalid value for {key}: {value}"),
    }
}

fn parse_flag(key: &str, value: &str, target: &mut bool) {
    match value.parse::<i64>() {
        Ok(parsed) => *target = parsed > 0,
        Err(_) => warn!("invalid value for {key}: {value}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_parses_to_defaults() {
        assert_eq!(parse_settings(SETTINGS_TEMPLATE), Settings::default());
    }

    #[test]
    fn test_parse_settings_overrides() {
        let text = "
[program_settings]
interval = 30
SHOW_COMMENTS = 1        # case-insensitive key
[danmaku_settings]
width = 1280
height = 720
font_name = Noto Sans CJK JP
alpha = 25
";
        let settings = parse_settings(text);
        assert_eq!(settings.program.interval, 30);
        assert!(settings.program.show_comments);
        assert!(!settings.program.show_debug_message);
        assert_eq!(settings.danmaku.width, 1280);
        assert_eq!(settings.danmaku.height, 720);
        assert_eq!(settings.danmaku.font_name, "Noto Sans CJK JP");
        assert_eq!(settings.danmaku.alpha_percent, 25);
        assert_eq!(settings.danmaku.font_size, 18);
    }

    #[test]
    fn test_malformed_values_keep_defaults() {
        let text = "
[program_settings]
interval = soon
show_comments = yes
";
        let settings = parse_settings(text);
        assert_eq!(settings.program.interval, 10);
        assert!(!settings.program.show_comments);
    }

    #[test]
    fn test_parse_rooms_strips_comments_and_headers() {
        let text = "
[rooms]
ROOM_A
ROOM_B   # my favorite
# ROOM_C
ROOM_D
";
        assert_eq!(parse_rooms(text), vec!["ROOM_A", "ROOM_B", "ROOM_D"]);
    }

    #[test]
    fn test_rooms_template_is_empty() {
        assert!(parse_rooms(ROOMS_TEMPLATE).is_empty());
    }

    #[test]
    fn test_dedup_preserves_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rooms.ini");
        fs::write(&path, "B\nA\nB\nC\nA\n").unwrap();

        let (keys, removed) = load_or_create_rooms(&path).unwrap();
        assert_eq!(keys, vec!["B", "A", "C"]);
        assert_eq!(removed, 2);
    }

    #[test]
    fn test_auto_create_writes_template() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("srdan.ini");

        let settings = load_or_create_settings(&path).unwrap();
        assert_eq!(settings, Settings::default());
        assert!(path.is_file());
        assert!(fs::read_to_string(&path).unwrap().contains("[danmaku_settings]"));
    }
}

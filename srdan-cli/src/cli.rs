//! Command-line arguments.

use std::path::PathBuf;

use clap::Parser;

use crate::config;

const SITE_PREFIX: &str = "https://www.showroom-live.com/";

#[derive(Parser, Debug)]
#[command(
    name = "srdan",
    version,
    about = "Monitor SHOWROOM rooms and record live comments as danmaku ass subtitles"
)]
pub struct Args {
    /// Only monitor this one room (full URL or bare room_url_key),
    /// bypassing the watch-list file.
    #[arg(short = 'u', long = "url", value_name = "SHOWROOM_URL")]
    pub url: Option<String>,

    /// Settings file path.
    #[arg(long, value_name = "FILE", default_value = config::SETTINGS_FILE)]
    pub settings: PathBuf,

    /// Watch-list file path.
    #[arg(long, value_name = "FILE", default_value = config::ROOMS_FILE)]
    pub rooms: PathBuf,
}

/// Room key from a full room URL, or the input unchanged when it is already
/// a bare key.
pub fn room_key_from_url(input: &str) -> String {
    match input.find(SITE_PREFIX) {
        Some(idx) => input[idx + SITE_PREFIX.len()..].trim().to_string(),
        None => input.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_room_key_from_url() {
        assert_eq!(
            room_key_from_url("https://www.showroom-live.com/LOVE_ANNA_YAMAMOTO"),
            "LOVE_ANNA_YAMAMOTO"
        );
        assert_eq!(room_key_from_url("LOVE_ANNA_YAMAMOTO"), "LOVE_ANNA_YAMAMOTO");
        assert_eq!(room_key_from_url("  ROOM_KEY  "), "ROOM_KEY");
    }
}

//! Response models for the SHOWROOM web API.
//!
//! Fields default aggressively: the platform adds and drops keys without
//! notice, and a missing field should never fail a whole poll cycle.

use serde::Deserialize;

/// Response from the on-lives listing endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct OnLivesResponse {
    #[serde(default)]
    pub onlives: Vec<GenreCategory>,
}

/// One genre category in the listing, with the rooms currently live in it.
#[derive(Debug, Default, Deserialize)]
pub struct GenreCategory {
    #[serde(default)]
    pub genre_id: i64,
    #[serde(default)]
    pub lives: Vec<RoomEntry>,
}

/// One live room in the listing. Only the fields the recorder consumes.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RoomEntry {
    #[serde(default)]
    pub room_url_key: Option<String>,
    #[serde(default)]
    pub room_id: u64,
    #[serde(default)]
    pub main_name: String,
}

/// Response from the live-info endpoint. An empty `bcsvr_key` means the
/// room is not actually on live.
#[derive(Debug, Default, Deserialize)]
pub struct LiveInfo {
    #[serde(default)]
    pub bcsvr_key: String,
    #[serde(default)]
    pub bcsvr_host: String,
    #[serde(default)]
    pub bcsvr_port: u16,
}

/// A watched-room candidate from a single listing poll.
///
/// Transient: produced and consumed within one scheduler cycle, never
/// persisted.
#[derive(Debug, Clone)]
pub struct LiveRoomSnapshot {
    pub room_key: String,
    pub room_id: u64,
    pub display_name: String,
    pub genre_id: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listing_tolerates_missing_fields() {
        let json = r#"{"onlives":[{"genre_id":102,"lives":[{"room_id":105923},{"room_url_key":"ROOM_A","room_id":1,"main_name":"A","view_num":3}]}]}"#;
        let data: OnLivesResponse = serde_json::from_str(json).unwrap();
        assert_eq!(data.onlives.len(), 1);
        assert_eq!(data.onlives[0].lives.len(), 2);
        assert!(data.onlives[0].lives[0].room_url_key.is_none());
        assert_eq!(
            data.onlives[0].lives[1].room_url_key.as_deref(),
            Some("ROOM_A")
        );
    }

    #[test]
    fn test_live_info_defaults() {
        let info: LiveInfo = serde_json::from_str("{}").unwrap();
        assert!(info.bcsvr_key.is_empty());

        let info: LiveInfo = serde_json::from_str(
            r#"{"bcsvr_key":"8016f3:LyTkjap9","bcsvr_host":"online.showroom-live.com","bcsvr_port":80}"#,
        )
        .unwrap();
        assert_eq!(info.bcsvr_key, "8016f3:LyTkjap9");
        assert_eq!(info.bcsvr_port, 80);
    }
}

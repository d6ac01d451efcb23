//! SHOWROOM web API client.

use std::sync::Arc;

use rand::RngExt;
use reqwest::Client;
use rustls::ClientConfig;
use rustls_platform_verifier::BuilderVerifierExt;
use tracing::debug;

use crate::error::{Result, ShowroomError};
use crate::models::{LiveInfo, LiveRoomSnapshot, OnLivesResponse};

pub(crate) const DEFAULT_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36";

const ONLIVES_URL: &str = "https://www.showroom-live.com/api/live/onlives";
const LIVE_INFO_URL: &str = "https://www.showroom-live.com/api/live/live_info";

/// Genre categories that mirror rooms already listed elsewhere (regional and
/// cross-posted feeds). Matching the watch-list against them would detect
/// the same room twice.
///
/// 0 Popularity, 701 DOB, 703 Karaoke, 704 MEN'S, 801 Taiwan.
const DUPLICATE_GENRES: &[i64] = &[0, 701, 703, 704, 801];

/// Build the shared HTTP client used for all platform requests.
pub fn default_client() -> Client {
    let provider = Arc::new(rustls::crypto::aws_lc_rs::default_provider());
    let tls_config = ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .expect("Failed to configure default TLS protocol versions")
        .with_platform_verifier()
        .unwrap()
        .with_no_client_auth();

    Client::builder()
        .use_preconfigured_tls(tls_config)
        .user_agent(DEFAULT_UA)
        .timeout(std::time::Duration::from_secs(30))
        .build()
        .expect("Failed to create HTTP client")
}

/// Client for the platform's listing and live-info endpoints.
#[derive(Clone)]
pub struct ShowroomApi {
    client: Client,
}

impl ShowroomApi {
    pub fn new() -> Self {
        Self {
            client: default_client(),
        }
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    /// Fetch the currently-live rooms, flattened across genre categories
    /// with the duplicate feeds filtered out.
    pub async fn fetch_onlives(&self) -> Result<Vec<LiveRoomSnapshot>> {
        // Random suffix busts the CDN cache in front of the endpoint.
        let buster: u32 = rand::rng().random_range(0..1000);
        let url = format!("{ONLIVES_URL}?{buster}");

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(ShowroomError::Status(response.status()));
        }
        let data: OnLivesResponse = response.json().await?;

        let mut rooms = Vec::new();
        for category in data.onlives {
            if DUPLICATE_GENRES.contains(&category.genre_id) {
                continue;
            }
            for room in category.lives {
                let Some(room_key) = room.room_url_key else {
                    continue;
                };
                rooms.push(LiveRoomSnapshot {
                    room_key,
                    room_id: room.room_id,
                    display_name: room.main_name,
                    genre_id: category.genre_id,
                });
            }
        }
        debug!("listing poll returned {} rooms", rooms.len());
        Ok(rooms)
    }

    /// Fetch the chat connection token and socket address for a room.
    pub async fn fetch_live_info(&self, room_id: u64) -> Result<LiveInfo> {
        let response = self
            .client
            .get(LIVE_INFO_URL)
            .query(&[("room_id", room_id)])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(ShowroomError::Status(response.status()));
        }
        Ok(response.json().await?)
    }
}

impl Default for ShowroomApi {
    fn default() -> Self {
        Self::new()
    }
}

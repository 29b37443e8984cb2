//! MusicBrainz release lookup
//!
//! Implements [`AlbumCatalog`] against the MusicBrainz web service.
//! Requests are rate limited (MusicBrainz asks for at most one request
//! per second per client).
//!
//! API Documentation: https://musicbrainz.org/doc/MusicBrainz_API

use async_trait::async_trait;
use governor::{Quota, RateLimiter};
use junt_common::models::{AlbumDescriptor, TrackInfo};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::num::NonZeroU32;
use std::time::Duration;

use crate::types::{AlbumCatalog, CollaboratorError};

pub const DEFAULT_BASE_URL: &str = "https://musicbrainz.org/ws/2";
pub const DEFAULT_USER_AGENT: &str = "Junt/0.1.0 (album preview montages)";
const COVER_ART_BASE_URL: &str = "https://coverartarchive.org/release";

#[derive(Debug, Deserialize)]
struct MBRelease {
    id: String,
    title: String,
    date: Option<String>,
    #[serde(rename = "artist-credit", default)]
    artist_credit: Vec<MBArtistCredit>,
    #[serde(default)]
    media: Vec<MBMedium>,
}

#[derive(Debug, Deserialize)]
struct MBArtistCredit {
    name: String,
    #[serde(default)]
    joinphrase: String,
}

#[derive(Debug, Deserialize)]
struct MBMedium {
    #[serde(default)]
    tracks: Vec<MBTrack>,
}

#[derive(Debug, Deserialize)]
struct MBTrack {
    title: Option<String>,
    length: Option<u64>,
    recording: Option<MBRecording>,
}

#[derive(Debug, Deserialize)]
struct MBRecording {
    title: Option<String>,
    length: Option<u64>,
}

/// MusicBrainz-backed album catalog
pub struct MusicBrainzCatalog {
    client: Client,
    base_url: String,
    rate_limiter: RateLimiter<
        governor::state::direct::NotKeyed,
        governor::state::InMemoryState,
        governor::clock::DefaultClock,
    >,
}

impl MusicBrainzCatalog {
    pub fn new(
        base_url: impl Into<String>,
        user_agent: &str,
        requests_per_second: u32,
    ) -> Result<Self, CollaboratorError> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(15))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| CollaboratorError::Network(e.to_string()))?;

        let rate = NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN);

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            rate_limiter: RateLimiter::direct(Quota::per_second(rate)),
        })
    }

    fn release_url(&self, mbid: &str) -> String {
        format!(
            "{}/release/{}?inc=artist-credits+recordings&fmt=json",
            self.base_url, mbid
        )
    }
}

#[async_trait]
impl AlbumCatalog for MusicBrainzCatalog {
    async fn fetch_album(&self, album_id: &str) -> Result<Option<AlbumDescriptor>, CollaboratorError> {
        self.rate_limiter.until_ready().await;

        let url = self.release_url(album_id);
        tracing::debug!(album_id = %album_id, url = %url, "Querying MusicBrainz release");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| CollaboratorError::Network(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND || status == StatusCode::BAD_REQUEST {
            // MusicBrainz answers 400 for malformed MBIDs
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CollaboratorError::InvalidResponse(format!(
                "MusicBrainz returned {}: {}",
                status.as_u16(),
                body
            )));
        }

        let release: MBRelease = response
            .json()
            .await
            .map_err(|e| CollaboratorError::InvalidResponse(e.to_string()))?;

        let album = to_descriptor(release);
        tracing::info!(
            album_id = %album.id,
            title = %album.title,
            tracks = album.tracks.len(),
            "Fetched album from MusicBrainz"
        );
        Ok(Some(album))
    }
}

fn artist_phrase(credits: &[MBArtistCredit]) -> String {
    let phrase: String = credits
        .iter()
        .map(|c| format!("{}{}", c.name, c.joinphrase))
        .collect();
    let phrase = phrase.trim();
    if phrase.is_empty() {
        "Unknown Artist".to_string()
    } else {
        phrase.to_string()
    }
}

fn parse_year(date: Option<&str>) -> Option<i32> {
    date.and_then(|d| d.get(..4)).and_then(|y| y.parse().ok())
}

fn to_descriptor(release: MBRelease) -> AlbumDescriptor {
    let tracks = release
        .media
        .iter()
        .flat_map(|m| m.tracks.iter())
        .enumerate()
        .map(|(i, t)| {
            let recording = t.recording.as_ref();
            let title = t
                .title
                .clone()
                .or_else(|| recording.and_then(|r| r.title.clone()))
                .unwrap_or_else(|| "Unknown Track".to_string());
            let length_ms = t.length.or_else(|| recording.and_then(|r| r.length));
            TrackInfo {
                number: i as u32 + 1,
                title,
                duration_seconds: length_ms.map(|ms| (ms / 1000) as u32),
            }
        })
        .collect();

    AlbumDescriptor {
        cover_url: Some(format!("{}/{}/front-500", COVER_ART_BASE_URL, release.id)),
        year: parse_year(release.date.as_deref()),
        artist: artist_phrase(&release.artist_credit),
        id: release.id,
        title: release.title,
        tracks,
    }
}

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as B64_ENGINE, Engine};
use regex::Regex;
use serde::Deserialize;
use std::time::Duration;
use tokio::{sync::Mutex, time::Instant};
use tracing::{debug, info};

use super::{MetadataResolver, ResolveError};

const TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
const TRACKS_URL: &str = "https://api.spotify.com/v1/tracks";

/// Tokens are refreshed this long before Spotify says they expire.
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

pub fn is_spotify_link(query: &str) -> bool {
    query.contains("open.spotify.com/") || query.starts_with("spotify:")
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Deserialize)]
struct SpotifyTrack {
    name: String,
    artists: Vec<SpotifyArtist>,
}

#[derive(Deserialize)]
struct SpotifyArtist {
    name: String,
}

struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

/// Spotify Web API client using the client-credentials flow.
///
/// Only track links are supported; they become "title artist" search terms.
pub struct SpotifyClient {
    client_id: String,
    client_secret: String,
    http: reqwest::Client,
    track_id: Regex,
    token: Mutex<Option<CachedToken>>,
}

impl SpotifyClient {
    pub fn new(client_id: String, client_secret: String) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()?;

        Ok(Self {
            client_id,
            client_secret,
            http,
            track_id: Regex::new(r"(?:track/|track:)([a-zA-Z0-9]+)")?,
            token: Mutex::new(None),
        })
    }

    pub fn track_id<'a>(&self, link: &'a str) -> Option<&'a str> {
        self.track_id
            .captures(link)
            .and_then(|captures| captures.get(1))
            .map(|id| id.as_str())
    }

    async fn access_token(&self) -> Result<String, ResolveError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref().filter(|t| t.expires_at > Instant::now()) {
            return Ok(token.access_token.clone());
        }

        debug!("🔑 Requesting Spotify access token");
        let credentials = B64_ENGINE.encode(format!("{}:{}", self.client_id, self.client_secret));
        let response: TokenResponse = self
            .http
            .post(TOKEN_URL)
            .header("Authorization", format!("Basic {credentials}"))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(backend)?
            .json()
            .await
            .map_err(backend)?;

        let lifetime = Duration::from_secs(response.expires_in).saturating_sub(TOKEN_EXPIRY_MARGIN);
        let access_token = response.access_token;
        *cached = Some(CachedToken {
            access_token: access_token.clone(),
            expires_at: Instant::now() + lifetime,
        });
        Ok(access_token)
    }
}

fn backend(error: reqwest::Error) -> ResolveError {
    ResolveError::Backend(format!("Spotify: {error}"))
}

fn search_terms_for(track: &SpotifyTrack) -> String {
    match track.artists.first() {
        Some(artist) => format!("{} {}", track.name, artist.name),
        None => track.name.clone(),
    }
}

#[async_trait]
impl MetadataResolver for SpotifyClient {
    fn handles(&self, query: &str) -> bool {
        is_spotify_link(query)
    }

    async fn search_terms(&self, link: &str) -> Result<String, ResolveError> {
        let id = self
            .track_id(link)
            .ok_or_else(|| ResolveError::Unsupported("Only Spotify track links are supported.".to_string()))?;

        let token = self.access_token().await?;
        let response = self
            .http
            .get(format!("{TRACKS_URL}/{id}"))
            .bearer_auth(token)
            .send()
            .await
            .map_err(backend)?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(ResolveError::NotFound(link.to_string()));
        }

        let track: SpotifyTrack = response
            .error_for_status()
            .map_err(backend)?
            .json()
            .await
            .map_err(backend)?;

        let terms = search_terms_for(&track);
        info!("🎧 Spotify track {} is {}", id, terms);
        Ok(terms)
    }
}

use async_trait::async_trait;
use serenity::model::id::UserId;
use url::Url;

use super::{ResolveError, TrackResolver};
use crate::audio::Track;

const AUDIO_EXTENSIONS: [&str; 6] = [".mp3", ".wav", ".ogg", ".flac", ".m4a", ".opus"];

/// Plays http(s) links that point straight at an audio file.
#[derive(Debug, Default, Clone, Copy)]
pub struct DirectUrlResolver;

impl DirectUrlResolver {
    pub fn is_direct_audio(query: &str) -> bool {
        let Ok(url) = Url::parse(query) else {
            return false;
        };
        if !matches!(url.scheme(), "http" | "https") {
            return false;
        }
        let path = url.path().to_lowercase();
        AUDIO_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
    }
}

#[async_trait]
impl TrackResolver for DirectUrlResolver {
    async fn resolve(&self, query: &str, requester: UserId) -> Result<Track, ResolveError> {
        let url = Url::parse(query).map_err(|e| ResolveError::Unsupported(format!("Invalid link: {e}")))?;
        if !Self::is_direct_audio(query) {
            return Err(ResolveError::Unsupported(format!("`{query}` is not an audio file link.")));
        }

        let title = url
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .filter(|segment| !segment.is_empty())
            .unwrap_or(query)
            .to_string();

        Ok(Track::new(title, query.to_string(), query.to_string(), requester))
    }
}

pub mod direct_url;
pub mod spotify;
pub mod youtube;

use async_trait::async_trait;
use serenity::model::id::UserId;
use std::{sync::Arc, time::Duration};
use thiserror::Error;
use tracing::{debug, info, warn};

#[cfg(test)]
use mockall::automock;

use crate::audio::Track;

pub use direct_url::DirectUrlResolver;
pub use spotify::SpotifyClient;
pub use youtube::YtDlpResolver;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResolveError {
    #[error("No results found for `{0}`")]
    NotFound(String),

    #[error("{0}")]
    Unsupported(String),

    #[error("Lookup failed: {0}")]
    Backend(String),

    #[error("Lookup timed out after {}", humantime::format_duration(*.0))]
    Timeout(Duration),
}

/// Turns user input (a link or free search terms) into a playable track.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait TrackResolver: Send + Sync {
    async fn resolve(&self, query: &str, requester: UserId) -> Result<Track, ResolveError>;
}

/// Maps links from catalogue services into search terms for a [`TrackResolver`].
#[cfg_attr(test, automock)]
#[async_trait]
pub trait MetadataResolver: Send + Sync {
    fn handles(&self, query: &str) -> bool;

    async fn search_terms(&self, link: &str) -> Result<String, ResolveError>;
}

/// Picks the right resolver for a query and bounds the whole lookup in time.
pub struct SmartResolver {
    primary: Arc<dyn TrackResolver>,
    direct: DirectUrlResolver,
    metadata: Option<Arc<dyn MetadataResolver>>,
    timeout: Duration,
}

impl SmartResolver {
    pub fn new(primary: Arc<dyn TrackResolver>, metadata: Option<Arc<dyn MetadataResolver>>, timeout: Duration) -> Self {
        Self {
            primary,
            direct: DirectUrlResolver,
            metadata,
            timeout,
        }
    }

    async fn route(&self, query: &str, requester: UserId) -> Result<Track, ResolveError> {
        if spotify::is_spotify_link(query) {
            let Some(metadata) = self.metadata.as_ref().filter(|m| m.handles(query)) else {
                return Err(ResolveError::Unsupported(
                    "Spotify links are not enabled on this bot.".to_string(),
                ));
            };
            let terms = metadata.search_terms(query).await?;
            info!("🎧 Spotify link mapped to search: {}", terms);
            return self.primary.resolve(&terms, requester).await;
        }

        if DirectUrlResolver::is_direct_audio(query) {
            debug!("🔗 Playing direct audio link {}", query);
            return self.direct.resolve(query, requester).await;
        }

        self.primary.resolve(query, requester).await
    }
}

#[async_trait]
impl TrackResolver for SmartResolver {
    async fn resolve(&self, query: &str, requester: UserId) -> Result<Track, ResolveError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(ResolveError::NotFound(String::new()));
        }

        match tokio::time::timeout(self.timeout, self.route(query, requester)).await {
            Ok(result) => result,
            Err(_) => {
                warn!("⏰ Resolving `{}` timed out", query);
                Err(ResolveError::Timeout(self.timeout))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn found(title: &str) -> Track {
        Track::new(
            title.to_string(),
            format!("https://www.youtube.com/watch?v={title}"),
            format!("https://media.example.test/{title}"),
            UserId::new(3),
        )
    }

    #[tokio::test]
    async fn plain_queries_go_to_the_primary_resolver() {
        let mut primary = MockTrackResolver::new();
        primary
            .expect_resolve()
            .withf(|query, requester| query == "lofi beats" && *requester == UserId::new(3))
            .times(1)
            .returning(|_, _| Ok(found("lofi")));

        let resolver = SmartResolver::new(Arc::new(primary), None, Duration::from_secs(30));
        let track = resolver.resolve("  lofi beats ", UserId::new(3)).await.unwrap();
        assert_eq!(track.title, "lofi");
    }

    #[tokio::test]
    async fn spotify_links_are_mapped_to_search_terms() {
        let link = "https://open.spotify.com/track/4uLU6hMCjMI75M1A2tKUQC";

        let mut metadata = MockMetadataResolver::new();
        metadata.expect_handles().return_const(true);
        metadata
            .expect_search_terms()
            .withf(move |query| query == link)
            .returning(|_| Ok("Never Gonna Give You Up Rick Astley".to_string()));

        let mut primary = MockTrackResolver::new();
        primary
            .expect_resolve()
            .withf(|query, _| query == "Never Gonna Give You Up Rick Astley")
            .returning(|_, _| Ok(found("rick")));

        let resolver = SmartResolver::new(Arc::new(primary), Some(Arc::new(metadata)), Duration::from_secs(30));
        assert_eq!(resolver.resolve(link, UserId::new(3)).await.unwrap().title, "rick");
    }

    #[tokio::test]
    async fn spotify_links_without_credentials_are_unsupported() {
        let mut primary = MockTrackResolver::new();
        primary.expect_resolve().never();

        let resolver = SmartResolver::new(Arc::new(primary), None, Duration::from_secs(30));
        let outcome = resolver
            .resolve("https://open.spotify.com/track/abc123", UserId::new(3))
            .await;
        assert!(matches!(outcome, Err(ResolveError::Unsupported(_))));
    }

    #[tokio::test]
    async fn direct_audio_links_skip_the_primary_resolver() {
        let mut primary = MockTrackResolver::new();
        primary.expect_resolve().never();

        let resolver = SmartResolver::new(Arc::new(primary), None, Duration::from_secs(30));
        let track = resolver
            .resolve("https://radio.example.test/live/stream.mp3", UserId::new(3))
            .await
            .unwrap();
        assert_eq!(track.title, "stream.mp3");
        assert_eq!(track.stream_url, "https://radio.example.test/live/stream.mp3");
    }

    struct Stalled;

    #[async_trait]
    impl TrackResolver for Stalled {
        async fn resolve(&self, _query: &str, _requester: UserId) -> Result<Track, ResolveError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Err(ResolveError::NotFound("never".to_string()))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn slow_lookups_time_out() {
        let resolver = SmartResolver::new(Arc::new(Stalled), None, Duration::from_secs(30));
        let outcome = resolver.resolve("anything", UserId::new(3)).await;
        assert_eq!(outcome, Err(ResolveError::Timeout(Duration::from_secs(30))));
    }

    #[test]
    fn timeout_message_is_human_readable() {
        assert_eq!(
            ResolveError::Timeout(Duration::from_secs(30)).to_string(),
            "Lookup timed out after 30s"
        );
    }
}

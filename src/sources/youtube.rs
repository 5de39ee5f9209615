use async_process::Command;
use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use serenity::model::id::UserId;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use super::{ResolveError, TrackResolver};
use crate::audio::Track;

/// Concurrent yt-dlp processes allowed at once.
const MAX_CONCURRENT_LOOKUPS: usize = 3;

/// Resolves YouTube links and free-text searches through yt-dlp.
pub struct YtDlpResolver {
    binary: String,
    rate_limiter: Semaphore,
    youtube_link: Regex,
}

/// Fields of `yt-dlp --dump-json` output we use.
#[derive(Debug, Deserialize)]
struct YtDlpInfo {
    title: String,
    webpage_url: String,
    /// Direct media URL of the selected format.
    url: Option<String>,
    thumbnail: Option<String>,
    uploader: Option<String>,
}

impl YtDlpResolver {
    pub fn new(binary: impl Into<String>) -> anyhow::Result<Self> {
        Ok(Self {
            binary: binary.into(),
            rate_limiter: Semaphore::new(MAX_CONCURRENT_LOOKUPS),
            youtube_link: Regex::new(
                r"^(https?://)?(www\.)?(youtube\.com/(watch\?v=|embed/|v/|shorts/)|youtu\.be/|music\.youtube\.com/)",
            )?,
        })
    }

    pub fn is_youtube_url(&self, query: &str) -> bool {
        self.youtube_link.is_match(query)
    }

    /// Links go to yt-dlp as-is, anything else becomes a one-result search.
    fn target(&self, query: &str) -> String {
        if self.is_youtube_url(query) || query.starts_with("http://") || query.starts_with("https://") {
            query.to_string()
        } else {
            format!("ytsearch1:{query}")
        }
    }

    async fn dump_json(&self, target: &str) -> Result<String, ResolveError> {
        let _permit = self
            .rate_limiter
            .acquire()
            .await
            .map_err(|e| ResolveError::Backend(e.to_string()))?;

        debug!("📊 yt-dlp lookup: {}", target);
        let output = Command::new(&self.binary)
            .args([
                "--no-playlist",
                "--dump-json",
                "--no-warnings",
                "-f",
                "bestaudio/best",
                target,
            ])
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| ResolveError::Backend(format!("could not run {}: {}", self.binary, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!("❌ yt-dlp failed for {}: {}", target, stderr.trim());
            return Err(ResolveError::Backend(first_line(&stderr)));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

fn first_line(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or("yt-dlp exited with an error")
        .to_string()
}

/// Picks the first entry of a `--dump-json` listing.
fn parse_listing(stdout: &str, query: &str) -> Result<YtDlpInfo, ResolveError> {
    let line = stdout
        .lines()
        .find(|line| !line.trim().is_empty())
        .ok_or_else(|| ResolveError::NotFound(query.to_string()))?;

    serde_json::from_str(line).map_err(|e| ResolveError::Backend(format!("unreadable yt-dlp output: {e}")))
}

#[async_trait]
impl TrackResolver for YtDlpResolver {
    async fn resolve(&self, query: &str, requester: UserId) -> Result<Track, ResolveError> {
        let target = self.target(query);
        let stdout = self.dump_json(&target).await?;
        let info = parse_listing(&stdout, query)?;

        let Some(stream_url) = info.url else {
            return Err(ResolveError::Backend(format!("no playable stream for {}", info.title)));
        };

        info!(
            "🔍 Resolved `{}` to {} ({})",
            query,
            info.title,
            info.uploader.as_deref().unwrap_or("unknown uploader")
        );

        let track = Track::new(info.title, info.webpage_url, stream_url, requester);
        Ok(match info.thumbnail {
            Some(thumbnail) => track.with_thumbnail(thumbnail),
            None => track,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn resolver() -> YtDlpResolver {
        YtDlpResolver::new("yt-dlp").unwrap()
    }

    #[test]
    fn test_youtube_url_detection() {
        let resolver = resolver();
        assert!(resolver.is_youtube_url("https://www.youtube.com/watch?v=dQw4w9WgXcQ"));
        assert!(resolver.is_youtube_url("https://youtu.be/dQw4w9WgXcQ"));
        assert!(resolver.is_youtube_url("https://music.youtube.com/watch?v=test"));
        assert!(!resolver.is_youtube_url("https://example.com/video"));
    }

    #[test]
    fn search_terms_become_a_single_result_search() {
        let resolver = resolver();
        assert_eq!(resolver.target("daft punk around the world"), "ytsearch1:daft punk around the world");
        assert_eq!(resolver.target("https://youtu.be/abc"), "https://youtu.be/abc");
    }

    #[test]
    fn first_listing_entry_wins() {
        let stdout = concat!(
            r#"{"title":"First","webpage_url":"https://www.youtube.com/watch?v=1","url":"https://media/1","thumbnail":null}"#,
            "\n",
            r#"{"title":"Second","webpage_url":"https://www.youtube.com/watch?v=2","url":"https://media/2"}"#,
        );
        let info = parse_listing(stdout, "q").unwrap();
        assert_eq!(info.title, "First");
        assert_eq!(info.url.as_deref(), Some("https://media/1"));
    }

    #[test]
    fn empty_listing_is_not_found() {
        assert!(matches!(parse_listing("\n", "nothing"), Err(ResolveError::NotFound(q)) if q == "nothing"));
    }

    #[test]
    fn stderr_is_reduced_to_its_first_line() {
        assert_eq!(first_line("\nERROR: Video unavailable\nmore"), "ERROR: Video unavailable");
        assert_eq!(first_line(""), "yt-dlp exited with an error");
    }

    #[cfg(unix)]
    mod process {
        use super::*;
        use pretty_assertions::assert_eq;
        use crate::sources::SmartResolver;
        use std::{
            os::unix::fs::PermissionsExt,
            path::{Path, PathBuf},
            sync::Arc,
            time::Duration,
        };

        /// Writes an executable shell script standing in for yt-dlp.
        fn fake_ytdlp(name: &str, body: &str) -> PathBuf {
            let dir = std::env::temp_dir().join(format!("voice-jukebox-{}-{}", name, std::process::id()));
            std::fs::create_dir_all(&dir).unwrap();
            let script = dir.join("yt-dlp");
            std::fs::write(&script, format!("#!/bin/sh\n{body}\n")).unwrap();
            std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
            script
        }

        fn path_str(path: &Path) -> String {
            path.to_string_lossy().into_owned()
        }

        #[tokio::test]
        async fn dump_json_output_becomes_a_track() {
            let script = fake_ytdlp(
                "listing",
                r#"echo '{"title":"Around the World","webpage_url":"https://www.youtube.com/watch?v=1","url":"https://media.example.test/1","thumbnail":"https://img.example.test/1.jpg","uploader":"Daft Punk"}'"#,
            );
            let resolver = YtDlpResolver::new(path_str(&script)).unwrap();

            let track = resolver.resolve("around the world", UserId::new(5)).await.unwrap();
            assert_eq!(track.title, "Around the World");
            assert_eq!(track.stream_url, "https://media.example.test/1");
            assert_eq!(track.thumbnail.as_deref(), Some("https://img.example.test/1.jpg"));
        }

        #[tokio::test]
        async fn timed_out_lookup_kills_the_process() {
            let script = fake_ytdlp("slow", "");
            let marker = script.with_file_name("finished");
            let _ = std::fs::remove_file(&marker);
            std::fs::write(&script, format!("#!/bin/sh\nsleep 2\ntouch '{}'\n", marker.display())).unwrap();

            let resolver = SmartResolver::new(
                Arc::new(YtDlpResolver::new(path_str(&script)).unwrap()),
                None,
                Duration::from_millis(200),
            );
            let outcome = resolver.resolve("slow search", UserId::new(5)).await;
            assert_eq!(outcome.unwrap_err(), ResolveError::Timeout(Duration::from_millis(200)));

            tokio::time::sleep(Duration::from_secs(3)).await;
            assert!(!marker.exists(), "yt-dlp kept running after the lookup timed out");
        }
    }
}

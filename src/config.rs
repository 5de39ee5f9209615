use anyhow::{Context, Result};
use std::{str::FromStr, time::Duration};

use crate::audio::SessionSettings;

#[derive(Debug, Clone)]
pub struct Config {
    // Discord
    pub discord_token: String,
    pub guild_id: Option<u64>, // Development guild for command registration
    pub command_prefix: String,

    // Sources
    pub spotify_client_id: Option<String>,
    pub spotify_client_secret: Option<String>,
    pub ytdlp_path: String,
    pub resolve_timeout: Duration,

    // Audio
    pub default_volume: f32,
    pub volume_step: f32,

    // Timers
    pub idle_check_interval: Duration,
    pub idle_timeout: Duration,
    pub refresh_interval: Duration,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key/value source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let config = Self {
            discord_token: var("DISCORD_TOKEN").context("DISCORD_TOKEN must be set")?,
            guild_id: var("GUILD_ID").map(|s| s.parse::<u64>()).transpose().context("GUILD_ID")?,
            command_prefix: var("COMMAND_PREFIX").unwrap_or_else(|| "h".to_string()),

            spotify_client_id: var("SPOTIFY_CLIENT_ID"),
            spotify_client_secret: var("SPOTIFY_CLIENT_SECRET"),
            ytdlp_path: var("YTDLP_PATH").unwrap_or_else(|| "yt-dlp".to_string()),
            resolve_timeout: seconds(&var, "RESOLVE_TIMEOUT_SECS", 30)?,

            default_volume: parse_or(&var, "DEFAULT_VOLUME", 0.1)?,
            volume_step: parse_or(&var, "VOLUME_STEP", 0.1)?,

            idle_check_interval: seconds(&var, "IDLE_CHECK_INTERVAL_SECS", 60)?,
            idle_timeout: seconds(&var, "IDLE_TIMEOUT_SECS", 300)?,
            refresh_interval: seconds(&var, "REFRESH_INTERVAL_SECS", 5)?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validates configuration values for correctness.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.default_volume) {
            anyhow::bail!("Default volume must be between 0.0 and 1.0, got: {}", self.default_volume);
        }

        if self.volume_step <= 0.0 || self.volume_step > 1.0 {
            anyhow::bail!("Volume step must be in (0.0, 1.0], got: {}", self.volume_step);
        }

        if self.command_prefix.chars().any(char::is_whitespace) {
            anyhow::bail!("Command prefix cannot contain whitespace: {:?}", self.command_prefix);
        }

        for (name, value) in [
            ("IDLE_CHECK_INTERVAL_SECS", self.idle_check_interval),
            ("IDLE_TIMEOUT_SECS", self.idle_timeout),
            ("REFRESH_INTERVAL_SECS", self.refresh_interval),
            ("RESOLVE_TIMEOUT_SECS", self.resolve_timeout),
        ] {
            if value.is_zero() {
                anyhow::bail!("{} must be greater than 0", name);
            }
        }

        if self.idle_timeout < self.idle_check_interval {
            anyhow::bail!("Idle timeout cannot be shorter than the idle check interval");
        }

        if self.spotify_client_id.is_some() != self.spotify_client_secret.is_some() {
            anyhow::bail!("SPOTIFY_CLIENT_ID and SPOTIFY_CLIENT_SECRET must be set together");
        }

        Ok(())
    }

    pub fn spotify_credentials(&self) -> Option<(String, String)> {
        self.spotify_client_id
            .clone()
            .zip(self.spotify_client_secret.clone())
    }

    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            default_volume: self.default_volume,
            idle_check_interval: self.idle_check_interval,
            idle_timeout: self.idle_timeout,
            refresh_interval: self.refresh_interval,
        }
    }

    /// Returns a summary of the current configuration for logging.
    ///
    /// Tokens and secrets are left out.
    pub fn summary(&self) -> String {
        format!(
            "Config Summary:\n  \
            Discord: prefix `{}` (Guild: {})\n  \
            Audio: {}% vol, {}% step\n  \
            Idle: check every {}, disconnect after {}\n  \
            Panels: refresh every {}\n  \
            Sources: yt-dlp at {}, Spotify={}, timeout {}",
            self.command_prefix,
            self.guild_id.map_or("global".to_string(), |id| id.to_string()),
            (self.default_volume * 100.0).round() as u32,
            (self.volume_step * 100.0).round() as u32,
            humantime::format_duration(self.idle_check_interval),
            humantime::format_duration(self.idle_timeout),
            humantime::format_duration(self.refresh_interval),
            self.ytdlp_path,
            self.spotify_credentials().is_some(),
            humantime::format_duration(self.resolve_timeout),
        )
    }
}

fn parse_or<T>(var: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match var(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} has an invalid value: {:?}", key, raw)),
        None => Ok(default),
    }
}

fn seconds(var: &impl Fn(&str) -> Option<String>, key: &str, default: u64) -> Result<Duration> {
    parse_or(var, key, default).map(Duration::from_secs)
}

use serenity::model::id::GuildId;
use std::time::Duration;
use tokio::time::Instant;

use super::{
    queue::QueuePage,
    track::{PlayState, RepeatMode, Track},
};

/// Immutable view of a session, published after every transition.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub guild_id: GuildId,
    pub play_state: PlayState,
    pub repeat_mode: RepeatMode,
    pub volume: f32,
    pub current: Option<Track>,
    pub queue: Vec<Track>,
    /// Elapsed playback of the current track, paused time excluded.
    pub position: Duration,
}

impl SessionSnapshot {
    pub fn idle(guild_id: GuildId, volume: f32) -> Self {
        Self {
            guild_id,
            play_state: PlayState::Idle,
            repeat_mode: RepeatMode::Off,
            volume,
            current: None,
            queue: Vec::new(),
            position: Duration::ZERO,
        }
    }

    pub fn queue_page(&self, page: usize) -> QueuePage {
        QueuePage::new(&self.queue, page)
    }

    pub fn volume_percent(&self) -> u32 {
        (self.volume * 100.0).round() as u32
    }
}

/// Tracks elapsed playback time across pauses.
#[derive(Debug, Default)]
pub(crate) struct PlaybackClock {
    started: Option<Instant>,
    paused_at: Option<Instant>,
    paused_total: Duration,
}

impl PlaybackClock {
    pub fn start(&mut self) {
        *self = Self {
            started: Some(Instant::now()),
            ..Self::default()
        };
    }

    pub fn pause(&mut self) {
        if self.paused_at.is_none() {
            self.paused_at = Some(Instant::now());
        }
    }

    pub fn resume(&mut self) {
        if let Some(paused_at) = self.paused_at.take() {
            self.paused_total += paused_at.elapsed();
        }
    }

    pub fn stop(&mut self) {
        *self = Self::default();
    }

    pub fn position(&self) -> Duration {
        let Some(started) = self.started else {
            return Duration::ZERO;
        };
        let end = self.paused_at.unwrap_or_else(Instant::now);
        end.saturating_duration_since(started)
            .saturating_sub(self.paused_total)
    }
}

use chrono::{DateTime, Utc};
use serenity::model::id::UserId;
use std::fmt;

/// A resolved, playable track.
///
/// Tracks are produced by a resolver and never change afterwards; the queue
/// and the current slot hold clones.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    pub title: String,
    pub page_url: String,
    pub stream_url: String,
    pub thumbnail: Option<String>,
    pub requester: UserId,
    pub requested_at: DateTime<Utc>,
}

impl Track {
    pub fn new(title: String, page_url: String, stream_url: String, requester: UserId) -> Self {
        Self {
            title,
            page_url,
            stream_url,
            thumbnail: None,
            requester,
            requested_at: Utc::now(),
        }
    }

    pub fn with_thumbnail(mut self, thumbnail: String) -> Self {
        self.thumbnail = Some(thumbnail);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayState {
    Idle,
    Playing,
    Paused,
}

impl PlayState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlayState::Idle => "Idle",
            PlayState::Playing => "Playing",
            PlayState::Paused => "Paused",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RepeatMode {
    #[default]
    Off,
    RepeatOne,
    RepeatAll,
}

impl RepeatMode {
    /// Off -> RepeatOne -> RepeatAll -> Off
    pub fn next(self) -> Self {
        match self {
            RepeatMode::Off => RepeatMode::RepeatOne,
            RepeatMode::RepeatOne => RepeatMode::RepeatAll,
            RepeatMode::RepeatAll => RepeatMode::Off,
        }
    }
}

impl fmt::Display for RepeatMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RepeatMode::Off => "Off",
            RepeatMode::RepeatOne => "Repeat One",
            RepeatMode::RepeatAll => "Repeat All",
        };
        f.write_str(label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeat_mode_cycles_through_all_three() {
        let mut mode = RepeatMode::Off;
        let mut seen = Vec::new();
        for _ in 0..4 {
            mode = mode.next();
            seen.push(mode);
        }
        assert_eq!(
            seen,
            vec![
                RepeatMode::RepeatOne,
                RepeatMode::RepeatAll,
                RepeatMode::Off,
                RepeatMode::RepeatOne
            ]
        );
    }

    #[test]
    fn repeat_mode_labels() {
        assert_eq!(RepeatMode::Off.to_string(), "Off");
        assert_eq!(RepeatMode::RepeatOne.to_string(), "Repeat One");
        assert_eq!(RepeatMode::RepeatAll.to_string(), "Repeat All");
    }
}

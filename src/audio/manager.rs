use dashmap::DashMap;
use serenity::model::id::GuildId;
use std::sync::Arc;
use tracing::{debug, info};

use super::session::{Session, SessionHandle, SessionParts, SessionSettings, StopOutcome, StopReason};

/// One live session per guild.
///
/// Starting a session for a guild that already has one supersedes the old
/// session. Closed sessions drop out of the registry on their own.
#[derive(Clone)]
pub struct SessionManager {
    sessions: Arc<DashMap<GuildId, SessionHandle>>,
    settings: SessionSettings,
}

impl SessionManager {
    pub fn new(settings: SessionSettings) -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            settings,
        }
    }

    pub fn get(&self, guild_id: GuildId) -> Option<SessionHandle> {
        self.sessions
            .get(&guild_id)
            .map(|entry| entry.value().clone())
            .filter(|handle| !handle.is_closed())
    }

    pub async fn start(&self, guild_id: GuildId, parts: SessionParts) -> SessionHandle {
        let handle = Session::spawn(guild_id, parts, self.settings.clone());

        if let Some(previous) = self.sessions.insert(guild_id, handle.clone()) {
            info!("🔁 Session {} supersedes {} in guild {}", handle.id(), previous.id(), guild_id);
            previous.stop_with(StopReason::Superseded).await;
        }

        let sessions = self.sessions.clone();
        let watched = handle.clone();
        tokio::spawn(async move {
            watched.closed().await;
            let removed = sessions.remove_if(&guild_id, |_, current| current.id() == watched.id());
            if removed.is_some() {
                debug!("🧹 Removed session {} for guild {}", watched.id(), guild_id);
            }
        });

        handle
    }

    pub async fn stop(&self, guild_id: GuildId) -> StopOutcome {
        match self.get(guild_id) {
            Some(handle) => handle.stop().await,
            None => StopOutcome::AlreadyStopped,
        }
    }

    /// Stops every live session and releases its voice connection.
    pub async fn shutdown(&self) -> usize {
        let handles: Vec<SessionHandle> = self
            .sessions
            .iter()
            .map(|entry| entry.value().clone())
            .collect();

        let mut stopped = 0;
        for handle in handles {
            if handle.stop().await == StopOutcome::Stopped {
                stopped += 1;
            }
        }
        stopped
    }

    pub fn active_count(&self) -> usize {
        self.sessions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::testing::{fake_parts, track};
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn starting_again_supersedes_without_releasing() {
        let manager = SessionManager::new(SessionSettings::default());
        let guild = GuildId::new(42);

        let (parts, first_sink) = fake_parts();
        let first = manager.start(guild, parts).await;
        first.enqueue(track("A")).await.unwrap();

        let (parts, _) = fake_parts();
        let second = manager.start(guild, parts).await;

        assert!(first.is_closed());
        assert_eq!(first_sink.releases(), 0);
        assert_eq!(manager.get(guild).map(|h| h.id()), Some(second.id()));
    }

    #[tokio::test(start_paused = true)]
    async fn stopped_sessions_leave_the_registry() {
        let manager = SessionManager::new(SessionSettings::default());
        let guild = GuildId::new(42);

        let (parts, sink) = fake_parts();
        manager.start(guild, parts).await;
        assert_eq!(manager.stop(guild).await, StopOutcome::Stopped);
        assert_eq!(sink.releases(), 1);

        tokio::time::sleep(Duration::from_millis(1)).await;
        assert!(manager.get(guild).is_none());
        assert_eq!(manager.active_count(), 0);
        assert_eq!(manager.stop(guild).await, StopOutcome::AlreadyStopped);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_stops_every_guild() {
        let manager = SessionManager::new(SessionSettings::default());
        let mut sinks = Vec::new();
        for id in 1..=3 {
            let (parts, sink) = fake_parts();
            manager.start(GuildId::new(id), parts).await;
            sinks.push(sink);
        }
        assert_eq!(manager.active_count(), 3);

        assert_eq!(manager.shutdown().await, 3);
        assert!(sinks.iter().all(|sink| sink.releases() == 1));
        assert_eq!(manager.shutdown().await, 0);
    }
}

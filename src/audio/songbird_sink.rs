use async_trait::async_trait;
use parking_lot::Mutex;
use serenity::model::id::GuildId;
use songbird::{
    input::{HttpRequest, Input},
    tracks::{PlayMode, TrackHandle},
    Call, Event, EventContext, EventHandler as VoiceEventHandler, Songbird, TrackEvent,
};
use std::{sync::Arc, time::Duration};
use tracing::{debug, error, info};

use super::sink::{AudioSink, SinkError, StreamCompletion, StreamHandle};

/// [`AudioSink`] backed by a songbird voice call.
pub struct SongbirdSink {
    manager: Arc<Songbird>,
    guild_id: GuildId,
    call: Arc<tokio::sync::Mutex<Call>>,
    client: reqwest::Client,
}

impl SongbirdSink {
    pub fn new(manager: Arc<Songbird>, guild_id: GuildId, call: Arc<tokio::sync::Mutex<Call>>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            manager,
            guild_id,
            call,
            client,
        })
    }
}

#[async_trait]
impl AudioSink for SongbirdSink {
    async fn open(
        &self,
        stream_url: &str,
        volume: f32,
        completion: StreamCompletion,
    ) -> Result<Box<dyn StreamHandle>, SinkError> {
        let input: Input = HttpRequest::new(self.client.clone(), stream_url.to_string()).into();
        let stream_id = completion.stream_id();

        let track = {
            let mut call = self.call.lock().await;
            call.play_input(input)
        };
        track
            .set_volume(volume)
            .map_err(|e| SinkError::Open(e.to_string()))?;

        let notifier = CompletionNotifier::new(completion);
        for event in [TrackEvent::End, TrackEvent::Error] {
            track
                .add_event(Event::Track(event), notifier.clone())
                .map_err(|e| SinkError::Open(e.to_string()))?;
        }

        // Lazy inputs only connect once the driver readies them; surface a
        // dead URL here instead of as a later track error.
        if let Err(e) = track.make_playable_async().await {
            notifier.disarm();
            if let Err(stop) = track.stop() {
                debug!("Stopping unplayable stream {}: {}", stream_id, stop);
            }
            return Err(SinkError::Open(e.to_string()));
        }

        debug!("🔈 Stream {} opened in guild {}", stream_id, self.guild_id);
        Ok(Box::new(SongbirdStream(track)))
    }

    async fn release(&self) {
        match self.manager.remove(self.guild_id).await {
            Ok(()) => info!("🔌 Left voice in guild {}", self.guild_id),
            Err(e) => debug!("Leaving voice in guild {}: {}", self.guild_id, e),
        }
    }
}

struct SongbirdStream(TrackHandle);

impl StreamHandle for SongbirdStream {
    fn set_volume(&self, volume: f32) -> Result<(), SinkError> {
        self.0
            .set_volume(volume)
            .map_err(|e| SinkError::Control(e.to_string()))
    }

    fn pause(&self) -> Result<(), SinkError> {
        self.0.pause().map_err(|e| SinkError::Control(e.to_string()))
    }

    fn resume(&self) -> Result<(), SinkError> {
        self.0.play().map_err(|e| SinkError::Control(e.to_string()))
    }

    fn halt(&self) -> Result<(), SinkError> {
        self.0.stop().map_err(|e| SinkError::Control(e.to_string()))
    }
}

/// Forwards the first End or Error event of a track to its session.
#[derive(Clone)]
struct CompletionNotifier {
    completion: Arc<Mutex<Option<StreamCompletion>>>,
}

impl CompletionNotifier {
    fn new(completion: StreamCompletion) -> Self {
        Self {
            completion: Arc::new(Mutex::new(Some(completion))),
        }
    }

    /// Drops the completion so no later event reaches the session.
    fn disarm(&self) {
        self.completion.lock().take();
    }
}

#[async_trait]
impl VoiceEventHandler for CompletionNotifier {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        let error = match ctx {
            EventContext::Track(tracks) => tracks.iter().find_map(|(state, _)| match &state.playing {
                PlayMode::Errored(e) => Some(format!("{e:?}")),
                _ => None,
            }),
            _ => None,
        };

        if let Some(completion) = self.completion.lock().take() {
            if let Some(e) = &error {
                error!("❌ Stream {} errored: {}", completion.stream_id(), e);
            }
            completion.complete(error);
        }

        None
    }
}

//! In-memory doubles for driving sessions in tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use serenity::model::id::{GuildId, UserId};
use std::{
    collections::HashSet,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use super::{
    display::PlayerDisplay,
    session::{Session, SessionHandle, SessionParts, SessionSettings},
    sink::{AudioSink, Occupancy, SinkError, StreamCompletion, StreamHandle},
    snapshot::SessionSnapshot,
    track::{PlayState, Track},
};

const STREAM_PREFIX: &str = "https://cdn.example.test/";

pub fn track(title: &str) -> Track {
    Track::new(
        title.to_string(),
        format!("https://example.test/watch/{title}"),
        format!("{STREAM_PREFIX}{title}.mp3"),
        UserId::new(7),
    )
}

fn title_of(stream_url: &str) -> String {
    stream_url
        .trim_start_matches(STREAM_PREFIX)
        .trim_end_matches(".mp3")
        .to_string()
}

pub struct FakeStream {
    pub url: String,
    completion: StreamCompletion,
    opened_volume: f32,
    volume: Mutex<f32>,
    paused: AtomicBool,
    halted: AtomicBool,
}

impl FakeStream {
    /// Reports natural completion; may be called any number of times.
    pub fn finish(&self) {
        self.completion.complete(None);
    }

    pub fn fail(&self, error: &str) {
        self.completion.complete(Some(error.to_string()));
    }

    pub fn opened_volume(&self) -> f32 {
        self.opened_volume
    }

    pub fn volume(&self) -> f32 {
        *self.volume.lock()
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    pub fn is_halted(&self) -> bool {
        self.halted.load(Ordering::SeqCst)
    }
}

struct FakeStreamHandle(Arc<FakeStream>);

impl StreamHandle for FakeStreamHandle {
    fn set_volume(&self, volume: f32) -> Result<(), SinkError> {
        *self.0.volume.lock() = volume;
        Ok(())
    }

    fn pause(&self) -> Result<(), SinkError> {
        self.0.paused.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn resume(&self) -> Result<(), SinkError> {
        self.0.paused.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn halt(&self) -> Result<(), SinkError> {
        self.0.halted.store(true, Ordering::SeqCst);
        self.0.finish();
        Ok(())
    }
}

#[derive(Default)]
struct FakeSinkState {
    streams: Vec<Arc<FakeStream>>,
    refused: HashSet<String>,
    refused_late: HashSet<String>,
    releases: usize,
}

/// Sink that records every stream instead of playing it.
#[derive(Default)]
pub struct FakeSink {
    state: Mutex<FakeSinkState>,
}

impl FakeSink {
    /// Makes every later open of `title` fail.
    pub fn refuse(&self, title: &str) {
        self.state.lock().refused.insert(title.to_string());
    }

    /// Makes later opens of `title` fail the way a lazily connected source
    /// does: the stream reports an error first, then the open fails.
    pub fn refuse_late(&self, title: &str) {
        self.state.lock().refused_late.insert(title.to_string());
    }

    pub fn opened_titles(&self) -> Vec<String> {
        self.state
            .lock()
            .streams
            .iter()
            .map(|s| title_of(&s.url))
            .collect()
    }

    pub fn latest(&self) -> Option<Arc<FakeStream>> {
        self.state.lock().streams.last().cloned()
    }

    pub fn finish_latest(&self) {
        if let Some(stream) = self.latest() {
            stream.finish();
        }
    }

    pub fn releases(&self) -> usize {
        self.state.lock().releases
    }
}

#[async_trait]
impl AudioSink for FakeSink {
    async fn open(
        &self,
        stream_url: &str,
        volume: f32,
        completion: StreamCompletion,
    ) -> Result<Box<dyn StreamHandle>, SinkError> {
        let title = title_of(stream_url);
        if self.state.lock().refused_late.contains(&title) {
            completion.complete(Some("connection reset".to_string()));
            tokio::time::sleep(Duration::from_millis(5)).await;
            return Err(SinkError::Open("connection reset".to_string()));
        }

        let mut state = self.state.lock();
        if state.refused.contains(&title) {
            return Err(SinkError::Open("source refused".to_string()));
        }
        let stream = Arc::new(FakeStream {
            url: stream_url.to_string(),
            completion,
            opened_volume: volume,
            volume: Mutex::new(volume),
            paused: AtomicBool::new(false),
            halted: AtomicBool::new(false),
        });
        state.streams.push(stream.clone());
        Ok(Box::new(FakeStreamHandle(stream)))
    }

    async fn release(&self) {
        self.state.lock().releases += 1;
    }
}

pub struct FakeOccupancy(AtomicUsize);

impl FakeOccupancy {
    pub fn set(&self, listeners: usize) {
        self.0.store(listeners, Ordering::SeqCst);
    }
}

impl Occupancy for FakeOccupancy {
    fn listener_count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DisplayEvent {
    NowPlaying {
        title: Option<String>,
        state: PlayState,
    },
    Queue {
        page: usize,
        len: usize,
    },
    Clear,
    Notice(String),
}

#[derive(Default)]
pub struct RecordingDisplay {
    events: Mutex<Vec<DisplayEvent>>,
}

impl RecordingDisplay {
    pub fn events(&self) -> Vec<DisplayEvent> {
        self.events.lock().clone()
    }

    pub fn notices(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                DisplayEvent::Notice(message) => Some(message),
                _ => None,
            })
            .collect()
    }

    pub fn now_playing_count(&self) -> usize {
        self.events()
            .iter()
            .filter(|event| matches!(event, DisplayEvent::NowPlaying { .. }))
            .count()
    }
}

#[async_trait]
impl PlayerDisplay for RecordingDisplay {
    async fn render_now_playing(&self, snapshot: &SessionSnapshot) {
        self.events.lock().push(DisplayEvent::NowPlaying {
            title: snapshot.current.as_ref().map(|t| t.title.clone()),
            state: snapshot.play_state,
        });
    }

    async fn render_queue(&self, snapshot: &SessionSnapshot, page: usize) {
        self.events.lock().push(DisplayEvent::Queue {
            page,
            len: snapshot.queue.len(),
        });
    }

    async fn clear(&self) {
        self.events.lock().push(DisplayEvent::Clear);
    }

    async fn notify(&self, message: &str) {
        self.events
            .lock()
            .push(DisplayEvent::Notice(message.to_string()));
    }
}

/// A running session wired to fakes.
pub struct Harness {
    pub session: SessionHandle,
    pub sink: Arc<FakeSink>,
    pub occupancy: Arc<FakeOccupancy>,
    pub display: Arc<RecordingDisplay>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_settings(SessionSettings::default())
    }

    pub fn with_settings(settings: SessionSettings) -> Self {
        let sink = Arc::new(FakeSink::default());
        let occupancy = Arc::new(FakeOccupancy(AtomicUsize::new(1)));
        let display = Arc::new(RecordingDisplay::default());
        let session = Session::spawn(GuildId::new(1), Harness::parts(&sink, &occupancy, &display), settings);
        Self {
            session,
            sink,
            occupancy,
            display,
        }
    }

    pub fn parts(
        sink: &Arc<FakeSink>,
        occupancy: &Arc<FakeOccupancy>,
        display: &Arc<RecordingDisplay>,
    ) -> SessionParts {
        SessionParts {
            sink: sink.clone(),
            occupancy: occupancy.clone(),
            display: display.clone(),
        }
    }

    /// Lets spawned workers drain their channels.
    pub async fn settle(&self) {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
}

pub fn fake_parts() -> (SessionParts, Arc<FakeSink>) {
    let sink = Arc::new(FakeSink::default());
    let occupancy = Arc::new(FakeOccupancy(AtomicUsize::new(1)));
    let display = Arc::new(RecordingDisplay::default());
    (Harness::parts(&sink, &occupancy, &display), sink)
}

//! Per-connection playback session.
//!
//! A session is a tokio task that owns the queue, the current stream and the
//! timers of one voice connection. Everything that mutates it (user
//! commands, stream completions, watchdog and refresh ticks) arrives as a
//! [`SessionMessage`] on a single inbox and is handled one message at a time.
//! Readers use the [`SessionSnapshot`] published after every message and
//! never wait on the task.

use serenity::model::id::GuildId;
use std::{
    sync::{
        atomic::{AtomicU64, AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::sync::{
    mpsc::{self, UnboundedReceiver, UnboundedSender},
    oneshot, watch,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{
    display::{spawn_display_worker, DisplayUpdate, PlayerDisplay},
    error::{InvalidTransition, SessionError},
    queue::{QueuePage, TrackQueue},
    sink::{AudioSink, Occupancy, StreamCompletion, StreamHandle, StreamId},
    snapshot::{PlaybackClock, SessionSnapshot},
    track::{PlayState, RepeatMode, Track},
    watchdog::{spawn_ticker, IdleTracker, IdleVerdict},
};

pub type SessionId = u64;

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// Timing and volume defaults for new sessions.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub default_volume: f32,
    pub idle_check_interval: Duration,
    pub idle_timeout: Duration,
    pub refresh_interval: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            default_volume: 0.1,
            idle_check_interval: Duration::from_secs(60),
            idle_timeout: Duration::from_secs(300),
            refresh_interval: Duration::from_secs(5),
        }
    }
}

/// Collaborators a session is built from.
pub struct SessionParts {
    pub sink: Arc<dyn AudioSink>,
    pub occupancy: Arc<dyn Occupancy>,
    pub display: Arc<dyn PlayerDisplay>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    Started,
    Queued { position: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Requested,
    IdleTimeout,
    ConnectionLost,
    /// A newer session took over the guild's connection.
    Superseded,
}

impl StopReason {
    fn releases_connection(self) -> bool {
        matches!(self, StopReason::Requested | StopReason::IdleTimeout)
    }

    fn notice(self) -> Option<&'static str> {
        match self {
            StopReason::IdleTimeout => Some("👋 Auto-disconnected: the voice channel was empty."),
            StopReason::ConnectionLost => Some("🔌 Voice connection lost, playback stopped."),
            StopReason::Requested | StopReason::Superseded => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    Stopped,
    AlreadyStopped,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VolumeChange {
    By(f32),
    To(f32),
}

impl VolumeChange {
    fn apply(self, current: f32) -> f32 {
        let target = match self {
            VolumeChange::By(delta) => current + delta,
            VolumeChange::To(level) => level,
        };
        (target.clamp(0.0, 1.0) * 100.0).round() / 100.0
    }
}

type Reply<T> = oneshot::Sender<T>;

/// Everything a session task reacts to.
pub enum SessionMessage {
    Enqueue {
        track: Track,
        reply: Reply<Result<EnqueueOutcome, SessionError>>,
    },
    Pause {
        reply: Reply<Result<(), SessionError>>,
    },
    Resume {
        reply: Reply<Result<(), SessionError>>,
    },
    Skip {
        reply: Reply<Result<(), SessionError>>,
    },
    Stop {
        reason: StopReason,
        reply: Option<Reply<StopOutcome>>,
    },
    SetVolume {
        change: VolumeChange,
        reply: Reply<f32>,
    },
    CycleRepeatMode {
        reply: Reply<RepeatMode>,
    },
    ClearQueue {
        reply: Reply<usize>,
    },
    Sync {
        reply: Reply<Arc<SessionSnapshot>>,
    },
    StreamEnded {
        stream_id: StreamId,
        error: Option<String>,
    },
    WatchdogTick,
    RefreshTick,
}

/// Cloneable front door to a running session.
#[derive(Clone)]
pub struct SessionHandle {
    id: SessionId,
    guild_id: GuildId,
    inbox: UnboundedSender<SessionMessage>,
    snapshots: watch::Receiver<Arc<SessionSnapshot>>,
    display: UnboundedSender<DisplayUpdate>,
    queue_page: Arc<AtomicUsize>,
    closed: CancellationToken,
}

impl SessionHandle {
    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(Reply<T>) -> SessionMessage,
    ) -> Result<T, SessionError> {
        let (tx, rx) = oneshot::channel();
        self.inbox.send(make(tx)).map_err(|_| SessionError::Closed)?;
        rx.await.map_err(|_| SessionError::Closed)
    }

    /// Adds a track; an idle session starts playing it right away.
    pub async fn enqueue(&self, track: Track) -> Result<EnqueueOutcome, SessionError> {
        self.request(|reply| SessionMessage::Enqueue { track, reply })
            .await?
    }

    pub async fn pause(&self) -> Result<(), SessionError> {
        self.request(|reply| SessionMessage::Pause { reply }).await?
    }

    pub async fn resume(&self) -> Result<(), SessionError> {
        self.request(|reply| SessionMessage::Resume { reply }).await?
    }

    /// Halts the current stream; the repeat mode then decides what plays next.
    pub async fn skip(&self) -> Result<(), SessionError> {
        self.request(|reply| SessionMessage::Skip { reply }).await?
    }

    pub async fn stop(&self) -> StopOutcome {
        self.stop_with(StopReason::Requested).await
    }

    pub async fn stop_with(&self, reason: StopReason) -> StopOutcome {
        self.request(|reply| SessionMessage::Stop {
            reason,
            reply: Some(reply),
        })
        .await
        .unwrap_or(StopOutcome::AlreadyStopped)
    }

    /// Reports that the voice transport dropped underneath the session.
    pub fn connection_lost(&self) {
        let message = SessionMessage::Stop {
            reason: StopReason::ConnectionLost,
            reply: None,
        };
        if self.inbox.send(message).is_err() {
            debug!("Connection loss reported for closed session {}", self.id);
        }
    }

    pub async fn set_volume(&self, change: VolumeChange) -> Result<f32, SessionError> {
        self.request(|reply| SessionMessage::SetVolume { change, reply })
            .await
    }

    pub async fn cycle_repeat_mode(&self) -> Result<RepeatMode, SessionError> {
        self.request(|reply| SessionMessage::CycleRepeatMode { reply })
            .await
    }

    pub async fn clear_queue(&self) -> Result<usize, SessionError> {
        self.request(|reply| SessionMessage::ClearQueue { reply })
            .await
    }

    /// Latest published state, without waiting on the session.
    pub fn snapshot(&self) -> Arc<SessionSnapshot> {
        self.snapshots.borrow().clone()
    }

    /// State after every message sent so far has been handled.
    pub async fn fresh_snapshot(&self) -> Result<Arc<SessionSnapshot>, SessionError> {
        self.request(|reply| SessionMessage::Sync { reply }).await
    }

    /// Renders a queue page and remembers it for later queue refreshes.
    pub fn show_queue(&self, page: usize) -> QueuePage {
        let snapshot = self.snapshot();
        let page = snapshot.queue_page(page);
        self.queue_page.store(page.page, Ordering::Relaxed);
        if !self.is_closed() {
            let _ = self.display.send(DisplayUpdate::Queue(snapshot, page.page));
        }
        page
    }

    /// Page index last shown on the queue panel.
    pub fn queue_page_index(&self) -> usize {
        self.queue_page.load(Ordering::Relaxed)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Resolves once the session has torn down.
    pub async fn closed(&self) {
        self.closed.cancelled().await
    }
}

struct ActiveStream {
    id: StreamId,
    handle: Box<dyn StreamHandle>,
}

pub struct Session {
    id: SessionId,
    guild_id: GuildId,
    queue: TrackQueue,
    play_state: PlayState,
    volume: f32,
    idle: IdleTracker,
    clock: PlaybackClock,
    stream: Option<ActiveStream>,
    next_stream_id: StreamId,
    sink: Arc<dyn AudioSink>,
    occupancy: Arc<dyn Occupancy>,
    display: UnboundedSender<DisplayUpdate>,
    inbox: UnboundedSender<SessionMessage>,
    snapshots: watch::Sender<Arc<SessionSnapshot>>,
    queue_page: Arc<AtomicUsize>,
    settings: SessionSettings,
    lifetime: CancellationToken,
    refresh: Option<CancellationToken>,
}

impl Session {
    /// Starts a session task and its idle watchdog.
    pub fn spawn(guild_id: GuildId, parts: SessionParts, settings: SessionSettings) -> SessionHandle {
        let id = NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed);
        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
        let initial = Arc::new(SessionSnapshot::idle(guild_id, settings.default_volume));
        let (snapshots_tx, snapshots_rx) = watch::channel(initial);
        let display = spawn_display_worker(parts.display);
        let lifetime = CancellationToken::new();
        let queue_page = Arc::new(AtomicUsize::new(0));

        spawn_ticker(
            "watchdog",
            settings.idle_check_interval,
            inbox_tx.clone(),
            lifetime.child_token(),
            || SessionMessage::WatchdogTick,
        );

        let handle = SessionHandle {
            id,
            guild_id,
            inbox: inbox_tx.clone(),
            snapshots: snapshots_rx,
            display: display.clone(),
            queue_page: queue_page.clone(),
            closed: lifetime.clone(),
        };

        let session = Session {
            id,
            guild_id,
            queue: TrackQueue::new(),
            play_state: PlayState::Idle,
            volume: settings.default_volume,
            idle: IdleTracker::new(settings.idle_timeout),
            clock: PlaybackClock::default(),
            stream: None,
            next_stream_id: 1,
            sink: parts.sink,
            occupancy: parts.occupancy,
            display,
            inbox: inbox_tx,
            snapshots: snapshots_tx,
            queue_page,
            settings,
            lifetime,
            refresh: None,
        };

        info!("🎧 Session {} started for guild {}", id, guild_id);
        tokio::spawn(session.run(inbox_rx));
        handle
    }

    async fn run(mut self, mut inbox: UnboundedReceiver<SessionMessage>) {
        while let Some(message) = inbox.recv().await {
            if !self.handle(message).await {
                break;
            }
        }
        info!("👋 Session {} for guild {} closed", self.id, self.guild_id);
    }

    /// Handles one message. Returns `false` once the session has torn down.
    async fn handle(&mut self, message: SessionMessage) -> bool {
        match message {
            SessionMessage::Enqueue { track, reply } => {
                let outcome = self.enqueue(track).await;
                self.respond(reply, outcome);
            }
            SessionMessage::Pause { reply } => {
                let outcome = self.pause();
                self.respond(reply, outcome);
            }
            SessionMessage::Resume { reply } => {
                let outcome = self.resume();
                self.respond(reply, outcome);
            }
            SessionMessage::Skip { reply } => {
                let outcome = self.skip();
                self.respond(reply, outcome);
            }
            SessionMessage::Stop { reason, reply } => {
                self.teardown(reason).await;
                match reply {
                    Some(reply) => self.respond(reply, StopOutcome::Stopped),
                    None => self.publish(),
                }
                return false;
            }
            SessionMessage::SetVolume { change, reply } => {
                let volume = self.set_volume(change);
                self.respond(reply, volume);
            }
            SessionMessage::CycleRepeatMode { reply } => {
                let mode = self.queue.cycle_repeat_mode();
                if self.play_state != PlayState::Idle {
                    self.render_now_playing();
                }
                self.respond(reply, mode);
            }
            SessionMessage::ClearQueue { reply } => {
                let removed = self.queue.clear();
                self.render_queue();
                self.respond(reply, removed);
            }
            SessionMessage::Sync { reply } => {
                let _ = reply.send(Arc::new(self.snapshot()));
            }
            SessionMessage::StreamEnded { stream_id, error } => {
                self.on_stream_ended(stream_id, error).await;
                self.publish();
            }
            SessionMessage::WatchdogTick => {
                let keep_running = self.on_watchdog_tick().await;
                self.publish();
                return keep_running;
            }
            SessionMessage::RefreshTick => {
                self.on_refresh_tick();
                self.publish();
            }
        }
        true
    }

    fn respond<T>(&self, reply: Reply<T>, value: T) {
        self.publish();
        let _ = reply.send(value);
    }

    async fn enqueue(&mut self, track: Track) -> Result<EnqueueOutcome, SessionError> {
        if self.play_state == PlayState::Idle {
            self.queue.promote(track);
            return self.start_current().await.map(|()| EnqueueOutcome::Started);
        }

        let position = self.queue.push(track);
        self.render_queue();
        Ok(EnqueueOutcome::Queued { position })
    }

    fn pause(&mut self) -> Result<(), SessionError> {
        if self.play_state != PlayState::Playing {
            return Err(InvalidTransition::NothingPlaying.into());
        }
        if let Some(stream) = &self.stream {
            if let Err(e) = stream.handle.pause() {
                warn!("Pausing stream {} failed: {}", stream.id, e);
            }
        }
        self.play_state = PlayState::Paused;
        self.clock.pause();
        info!("⏸️ Paused in guild {}", self.guild_id);
        self.render_now_playing();
        Ok(())
    }

    fn resume(&mut self) -> Result<(), SessionError> {
        if self.play_state != PlayState::Paused {
            return Err(InvalidTransition::NothingPaused.into());
        }
        if let Some(stream) = &self.stream {
            if let Err(e) = stream.handle.resume() {
                warn!("Resuming stream {} failed: {}", stream.id, e);
            }
        }
        self.play_state = PlayState::Playing;
        self.clock.resume();
        self.arm_refresh();
        info!("▶️ Resumed in guild {}", self.guild_id);
        self.render_now_playing();
        Ok(())
    }

    fn skip(&mut self) -> Result<(), SessionError> {
        let Some(stream) = &self.stream else {
            return Err(InvalidTransition::NothingPlaying.into());
        };
        info!("⏭️ Skipping stream {} in guild {}", stream.id, self.guild_id);
        // The advance happens when the halted stream reports completion.
        if let Err(e) = stream.handle.halt() {
            warn!("Halting stream {} failed: {}", stream.id, e);
        }
        Ok(())
    }

    fn set_volume(&mut self, change: VolumeChange) -> f32 {
        self.volume = change.apply(self.volume);
        if let Some(stream) = &self.stream {
            if let Err(e) = stream.handle.set_volume(self.volume) {
                warn!("Setting volume on stream {} failed: {}", stream.id, e);
            }
        }
        info!("🔊 Volume {}% in guild {}", (self.volume * 100.0).round(), self.guild_id);
        if self.play_state != PlayState::Idle {
            self.render_now_playing();
        }
        self.volume
    }

    async fn on_stream_ended(&mut self, stream_id: StreamId, error: Option<String>) {
        if self.stream.as_ref().map(|s| s.id) != Some(stream_id) {
            debug!("Ignoring completion of stale stream {}", stream_id);
            return;
        }
        self.stream = None;

        if let Some(error) = error {
            // A broken track is dropped even under RepeatOne.
            if let Some(track) = self.queue.discard_current() {
                warn!("❌ Stream {} for {} failed: {}", stream_id, track.title, error);
                self.notice(format!("⚠️ Playback of **{}** failed: {}", track.title, error));
            }
        }

        self.queue.advance();
        if self.start_current().await.is_err() {
            self.notice("⚠️ No playable tracks left, playback stopped.".to_string());
        }
    }

    /// Opens the current track, dropping tracks the sink refuses.
    ///
    /// Gives up after `len(queue) + 1` refusals and goes idle. Returns the
    /// first refusal if nothing could be started.
    async fn start_current(&mut self) -> Result<(), SessionError> {
        let mut attempts = self.queue.len() + 1;
        let mut first_failure = None;

        loop {
            let Some(track) = self.queue.current().cloned() else {
                self.go_idle();
                return first_failure.map_or(Ok(()), Err);
            };

            match self.open_stream(&track).await {
                Ok(()) => return Ok(()),
                Err(reason) => {
                    warn!("❌ Could not open {}: {}", track.title, reason);
                    self.notice(format!("❌ Failed to play **{}**: {}", track.title, reason));
                    first_failure.get_or_insert(SessionError::Open {
                        title: track.title.clone(),
                        reason,
                    });
                    self.queue.discard_current();

                    attempts -= 1;
                    if attempts == 0 {
                        self.queue.reset();
                    } else {
                        self.queue.advance();
                    }
                }
            }
        }
    }

    async fn open_stream(&mut self, track: &Track) -> Result<(), String> {
        let stream_id = self.next_stream_id;
        self.next_stream_id += 1;

        let completion = StreamCompletion::new(stream_id, self.inbox.clone());
        let handle = self
            .sink
            .open(&track.stream_url, self.volume, completion)
            .await
            .map_err(|e| e.to_string())?;

        self.stream = Some(ActiveStream { id: stream_id, handle });
        self.play_state = PlayState::Playing;
        self.clock.start();
        self.arm_refresh();

        info!("🎵 Now playing in guild {}: {} (stream {})", self.guild_id, track.title, stream_id);
        self.render_now_playing();
        self.render_queue();
        Ok(())
    }

    fn go_idle(&mut self) {
        self.queue.discard_current();
        self.stream = None;
        self.play_state = PlayState::Idle;
        self.clock.stop();
        self.cancel_refresh();
        self.send_display(DisplayUpdate::Clear);
        info!("📭 Nothing left to play in guild {}", self.guild_id);
    }

    async fn on_watchdog_tick(&mut self) -> bool {
        let listeners = self.occupancy.listener_count();
        match self.idle.observe(listeners, self.settings.idle_check_interval) {
            IdleVerdict::Occupied => true,
            IdleVerdict::Idle(idle_for) => {
                debug!("💤 Guild {} channel empty for {:?}", self.guild_id, idle_for);
                true
            }
            IdleVerdict::Expired => {
                info!("🚪 Guild {} channel empty for too long, disconnecting", self.guild_id);
                self.teardown(StopReason::IdleTimeout).await;
                false
            }
        }
    }

    fn on_refresh_tick(&mut self) {
        if self.play_state == PlayState::Playing {
            self.render_now_playing();
        } else {
            self.cancel_refresh();
        }
    }

    fn arm_refresh(&mut self) {
        if self.refresh.as_ref().is_some_and(|token| !token.is_cancelled()) {
            return;
        }
        let token = self.lifetime.child_token();
        spawn_ticker(
            "refresh",
            self.settings.refresh_interval,
            self.inbox.clone(),
            token.clone(),
            || SessionMessage::RefreshTick,
        );
        self.refresh = Some(token);
    }

    fn cancel_refresh(&mut self) {
        if let Some(token) = self.refresh.take() {
            token.cancel();
        }
    }

    async fn teardown(&mut self, reason: StopReason) {
        info!("⏹️ Tearing down session {} for guild {} ({:?})", self.id, self.guild_id, reason);

        if !self.queue.is_empty() {
            debug!("Dropping {} queued tracks in guild {}", self.queue.len(), self.guild_id);
        }
        self.queue.reset();
        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.handle.halt() {
                debug!("Halting stream {} during teardown: {}", stream.id, e);
            }
        }
        self.play_state = PlayState::Idle;
        self.clock.stop();
        self.cancel_refresh();
        self.lifetime.cancel();

        if reason.releases_connection() {
            self.sink.release().await;
        }

        self.send_display(DisplayUpdate::Clear);
        if let Some(notice) = reason.notice() {
            self.notice(notice.to_string());
        }
    }

    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            guild_id: self.guild_id,
            play_state: self.play_state,
            repeat_mode: self.queue.repeat_mode(),
            volume: self.volume,
            current: self.queue.current().cloned(),
            queue: self.queue.tracks(),
            position: self.clock.position(),
        }
    }

    fn publish(&self) {
        self.snapshots.send_replace(Arc::new(self.snapshot()));
    }

    fn render_now_playing(&self) {
        self.send_display(DisplayUpdate::NowPlaying(Arc::new(self.snapshot())));
    }

    fn render_queue(&self) {
        let page = self.queue_page.load(Ordering::Relaxed);
        self.send_display(DisplayUpdate::Queue(Arc::new(self.snapshot()), page));
    }

    fn notice(&self, message: String) {
        self.send_display(DisplayUpdate::Notice(message));
    }

    fn send_display(&self, update: DisplayUpdate) {
        if self.display.send(update).is_err() {
            debug!("Display worker for guild {} is gone", self.guild_id);
        }
    }
}

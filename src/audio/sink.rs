use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

use super::session::SessionMessage;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SinkError {
    #[error("could not open stream: {0}")]
    Open(String),
    #[error("stream control failed: {0}")]
    Control(String),
}

/// Identifies one opened stream within a session.
pub type StreamId = u64;

/// Completion notifier handed to the sink with every opened stream.
///
/// Sinks call [`StreamCompletion::complete`] once when the stream is
/// exhausted, errors out or is halted. The signal is delivered into the
/// owning session's inbox; a session that has already moved on or shut down
/// ignores it.
#[derive(Debug, Clone)]
pub struct StreamCompletion {
    stream_id: StreamId,
    inbox: UnboundedSender<SessionMessage>,
}

impl StreamCompletion {
    pub(crate) fn new(stream_id: StreamId, inbox: UnboundedSender<SessionMessage>) -> Self {
        Self { stream_id, inbox }
    }

    pub fn stream_id(&self) -> StreamId {
        self.stream_id
    }

    pub fn complete(&self, error: Option<String>) {
        let message = SessionMessage::StreamEnded {
            stream_id: self.stream_id,
            error,
        };
        if self.inbox.send(message).is_err() {
            debug!("Stream {} ended after its session closed", self.stream_id);
        }
    }
}

/// Control surface of one playing stream.
pub trait StreamHandle: Send + Sync {
    fn set_volume(&self, volume: f32) -> Result<(), SinkError>;
    fn pause(&self) -> Result<(), SinkError>;
    fn resume(&self) -> Result<(), SinkError>;
    /// Stops the stream; the completion fires as a result.
    fn halt(&self) -> Result<(), SinkError>;
}

/// The voice transport a session owns.
#[async_trait]
pub trait AudioSink: Send + Sync {
    /// Starts streaming `stream_url` at `volume`.
    async fn open(
        &self,
        stream_url: &str,
        volume: f32,
        completion: StreamCompletion,
    ) -> Result<Box<dyn StreamHandle>, SinkError>;

    /// Closes the voice connection.
    async fn release(&self);
}

/// Reports how many non-bot listeners share the voice channel.
pub trait Occupancy: Send + Sync {
    fn listener_count(&self) -> usize;
}

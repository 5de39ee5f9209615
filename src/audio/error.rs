use thiserror::Error;

/// A control request that does not apply to the current playback state.
///
/// These are informational: the caller reports them to the user as a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InvalidTransition {
    #[error("Nothing is playing.")]
    NothingPlaying,
    #[error("Nothing is paused.")]
    NothingPaused,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SessionError {
    #[error("❌ Failed to play **{title}**: {reason}")]
    Open { title: String, reason: String },

    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),

    #[error("The playback session has ended.")]
    Closed,
}

impl SessionError {
    /// Whether the error is a reported no-op rather than a fault.
    pub fn is_informational(&self) -> bool {
        matches!(self, SessionError::InvalidTransition(_) | SessionError::Closed)
    }
}

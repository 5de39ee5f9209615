//! # Audio Module
//!
//! Per-guild playback sessions for the jukebox.
//!
//! ## Architecture
//!
//! ### [`session`] - Playback Session
//! - One tokio task per voice connection, fed through a single inbox
//! - Owns the queue, the current stream and the idle/refresh timers
//! - Publishes a [`snapshot::SessionSnapshot`] after every transition
//!
//! ### [`queue`] - Queue Management
//! - FIFO of pending tracks plus the current slot
//! - Repeat modes (Off, RepeatOne, RepeatAll) applied on advance
//! - Fixed-size pagination for the queue panel
//!
//! ### [`sink`] - Voice Transport
//! - [`sink::AudioSink`] abstracts the voice connection
//! - [`songbird_sink::SongbirdSink`] plays HTTP streams through songbird
//!
//! ### [`manager`] - Session Registry
//! - At most one live session per guild
//! - New sessions supersede old ones without dropping the connection

pub mod display;
pub mod error;
pub mod manager;
pub mod queue;
pub mod session;
pub mod sink;
pub mod snapshot;
pub mod songbird_sink;
pub mod track;
pub mod watchdog;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{InvalidTransition, SessionError};
pub use manager::SessionManager;
pub use session::{
    EnqueueOutcome, SessionHandle, SessionParts, SessionSettings, StopOutcome, StopReason, VolumeChange,
};
pub use snapshot::SessionSnapshot;
pub use track::{PlayState, RepeatMode, Track};

//! Discord rendering of playback sessions.

pub mod buttons;
pub mod display;
pub mod embeds;
pub mod occupancy;

pub use display::DiscordDisplay;
pub use occupancy::ChannelOccupancy;

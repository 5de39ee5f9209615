use serenity::{
    all::Timestamp,
    builder::{CreateEmbed, CreateEmbedFooter},
};
use std::{fmt::Write as _, time::Duration};

use crate::audio::{queue::QueuePage, PlayState, RepeatMode, SessionSnapshot};

/// Shared colour palette for every embed
pub mod colors {
    use serenity::all::Colour;

    pub const SUCCESS_GREEN: Colour = Colour::from_rgb(67, 181, 129);
    pub const ERROR_RED: Colour = Colour::from_rgb(220, 53, 69);
    pub const WARNING_ORANGE: Colour = Colour::from_rgb(255, 193, 7);
    pub const INFO_BLUE: Colour = Colour::from_rgb(52, 144, 220);
    pub const NEUTRAL_GRAY: Colour = Colour::from_rgb(108, 117, 125);
}

const STANDARD_FOOTER: &str = "🎵 Voice Jukebox";

fn state_label(state: PlayState) -> &'static str {
    match state {
        PlayState::Playing => "▶️ Playing",
        PlayState::Paused => "⏸️ Paused",
        PlayState::Idle => "⏹️ Idle",
    }
}

fn repeat_emoji(mode: RepeatMode) -> &'static str {
    match mode {
        RepeatMode::Off => "➡️",
        RepeatMode::RepeatOne => "🔂",
        RepeatMode::RepeatAll => "🔁",
    }
}

/// Now-playing panel for a session.
pub fn now_playing_embed(snapshot: &SessionSnapshot) -> CreateEmbed {
    let Some(track) = &snapshot.current else {
        return CreateEmbed::default()
            .title("🎵 Now Playing")
            .description("Nothing is playing right now.")
            .color(colors::NEUTRAL_GRAY)
            .footer(CreateEmbedFooter::new(STANDARD_FOOTER));
    };

    let color = match snapshot.play_state {
        PlayState::Playing => colors::SUCCESS_GREEN,
        PlayState::Paused => colors::WARNING_ORANGE,
        PlayState::Idle => colors::NEUTRAL_GRAY,
    };

    let mut embed = CreateEmbed::default()
        .title("🎵 Now Playing")
        .description(format!("**[{}]({})**", track.title, track.page_url))
        .color(color)
        .field("👤 Requested by", format!("<@{}>", track.requester), true)
        .field("📡 State", state_label(snapshot.play_state), true)
        .field(
            "🔁 Repeat",
            format!("{} {}", repeat_emoji(snapshot.repeat_mode), snapshot.repeat_mode),
            true,
        )
        .field("🔊 Volume", format!("{}%", snapshot.volume_percent()), true)
        .field("⏱️ Elapsed", format_duration(snapshot.position), true)
        .field("📋 Up next", up_next(snapshot), true);

    if let Some(thumbnail) = &track.thumbnail {
        embed = embed.thumbnail(thumbnail);
    }

    embed
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

fn up_next(snapshot: &SessionSnapshot) -> String {
    match snapshot.queue.first() {
        Some(next) if snapshot.queue.len() > 1 => {
            format!("{} (+{} more)", next.title, snapshot.queue.len() - 1)
        }
        Some(next) => next.title.clone(),
        None => "Nothing queued".to_string(),
    }
}

/// Queue panel showing one page of pending tracks.
pub fn queue_embed(snapshot: &SessionSnapshot, page: &QueuePage) -> CreateEmbed {
    let mut embed = CreateEmbed::default()
        .title("📋 Queue")
        .color(colors::INFO_BLUE);

    if let Some(current) = &snapshot.current {
        embed = embed.field(
            format!("{} Now playing", repeat_emoji(snapshot.repeat_mode)),
            format!("**{}**", current.title),
            false,
        );
    }

    if page.total_items == 0 {
        return embed
            .description("😴 **The queue is empty**\n\n💡 Use `/play <song>` to add music")
            .color(colors::NEUTRAL_GRAY)
            .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
            .timestamp(Timestamp::now());
    }

    embed
        .description(queue_listing(page))
        .footer(CreateEmbedFooter::new(format!(
            "Page {} / {} • {} tracks",
            page.page + 1,
            page.total_pages,
            page.total_items
        )))
        .timestamp(Timestamp::now())
}

/// Numbered list of a page's entries plus the overflow line.
pub fn queue_listing(page: &QueuePage) -> String {
    let mut listing = String::new();
    for (position, track) in &page.entries {
        let _ = writeln!(listing, "**{}**. {} • <@{}>", position, track.title, track.requester);
    }

    let remaining = page.remaining_after();
    if remaining > 0 {
        let _ = write!(listing, "...and {} more", remaining);
    }
    listing
}

/// Plain notice posted to the channel; failures render in red.
pub fn notice_embed(message: &str) -> CreateEmbed {
    let color = if message.starts_with('❌') || message.starts_with('⚠') {
        colors::ERROR_RED
    } else {
        colors::INFO_BLUE
    };

    CreateEmbed::default()
        .description(message)
        .color(color)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Formats a duration as `m:ss`, or `h:mm:ss` past an hour
pub fn format_duration(duration: Duration) -> String {
    let total_seconds = duration.as_secs();
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}

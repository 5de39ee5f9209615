use serenity::{
    all::ButtonStyle,
    builder::{CreateActionRow, CreateButton},
};

use crate::audio::{queue::QueuePage, PlayState, RepeatMode};

/// Custom ids carried by every button
pub mod button_ids {
    pub const PAUSE: &str = "pause_btn";
    pub const RESUME: &str = "resume_btn";
    pub const SKIP: &str = "skip_btn";
    pub const STOP: &str = "stop_btn";
    pub const REPEAT: &str = "repeat_btn";
    pub const VOLUME_UP: &str = "volup_btn";
    pub const VOLUME_DOWN: &str = "voldown_btn";
    pub const PREVIOUS_PAGE: &str = "prev_page";
    pub const NEXT_PAGE: &str = "next_page";
    pub const CLEAR_QUEUE: &str = "queue_clear";
}

/// Controls under the now-playing panel.
///
/// Only the transport button that applies to `state` is enabled.
pub fn player_controls(state: PlayState, repeat: RepeatMode) -> Vec<CreateActionRow> {
    let pause_btn = CreateButton::new(button_ids::PAUSE)
        .emoji('⏸')
        .label("Pause")
        .style(ButtonStyle::Primary)
        .disabled(state != PlayState::Playing);

    let resume_btn = CreateButton::new(button_ids::RESUME)
        .emoji('▶')
        .label("Resume")
        .style(ButtonStyle::Success)
        .disabled(state != PlayState::Paused);

    let skip_btn = CreateButton::new(button_ids::SKIP)
        .emoji('⏭')
        .label("Skip")
        .style(ButtonStyle::Secondary)
        .disabled(state == PlayState::Idle);

    let stop_btn = CreateButton::new(button_ids::STOP)
        .emoji('⏹')
        .label("Stop")
        .style(ButtonStyle::Danger);

    let repeat_style = if repeat == RepeatMode::Off {
        ButtonStyle::Secondary
    } else {
        ButtonStyle::Success
    };
    let repeat_btn = CreateButton::new(button_ids::REPEAT)
        .emoji(if repeat == RepeatMode::RepeatOne { '🔂' } else { '🔁' })
        .label(repeat.to_string())
        .style(repeat_style);

    let vol_down_btn = CreateButton::new(button_ids::VOLUME_DOWN)
        .emoji('🔉')
        .label("Vol -")
        .style(ButtonStyle::Secondary);

    let vol_up_btn = CreateButton::new(button_ids::VOLUME_UP)
        .emoji('🔊')
        .label("Vol +")
        .style(ButtonStyle::Secondary);

    vec![
        CreateActionRow::Buttons(vec![pause_btn, resume_btn, skip_btn, stop_btn]),
        CreateActionRow::Buttons(vec![repeat_btn, vol_down_btn, vol_up_btn]),
    ]
}

/// Paging and clearing controls under the queue panel.
pub fn queue_controls(page: &QueuePage) -> Vec<CreateActionRow> {
    let prev_btn = CreateButton::new(button_ids::PREVIOUS_PAGE)
        .emoji('⬅')
        .style(ButtonStyle::Primary)
        .disabled(page.is_first());

    let next_btn = CreateButton::new(button_ids::NEXT_PAGE)
        .emoji('➡')
        .style(ButtonStyle::Primary)
        .disabled(page.is_last());

    let clear_btn = CreateButton::new(button_ids::CLEAR_QUEUE)
        .emoji('🗑')
        .label("Clear Queue")
        .style(ButtonStyle::Danger)
        .disabled(page.total_items == 0);

    vec![CreateActionRow::Buttons(vec![prev_btn, next_btn, clear_btn])]
}

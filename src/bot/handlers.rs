//! Maps slash commands, buttons and prefix commands onto one set of actions.

use tracing::debug;

use crate::{
    audio::{EnqueueOutcome, SessionError, SessionHandle, StopOutcome, Track, VolumeChange},
    ui::{buttons::button_ids, embeds::format_duration},
};

/// What a user asked the bot to do.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Play(String),
    Join,
    Control(Control),
}

/// Actions that run against an existing session.
#[derive(Debug, Clone, PartialEq)]
pub enum Control {
    Pause,
    Resume,
    Skip,
    Stop,
    Repeat,
    Volume(VolumeChange),
    ClearQueue,
    Queue(PageRequest),
    NowPlaying,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageRequest {
    /// Zero-based page index.
    At(usize),
    Previous,
    Next,
}

/// Response text for the user who triggered an action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub content: String,
    pub ephemeral: bool,
}

impl Reply {
    pub fn public(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ephemeral: false,
        }
    }

    pub fn private(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ephemeral: true,
        }
    }

    pub fn from_error(error: &SessionError) -> Self {
        if error.is_informational() {
            Self::private(format!("ℹ️ {}", error))
        } else {
            Self::private(error.to_string())
        }
    }
}

impl Action {
    /// Parses a slash command from its name and first text/integer option.
    pub fn from_slash(name: &str, text: Option<&str>, number: Option<i64>) -> Option<Self> {
        let control = match name {
            "play" => return text.map(|query| Action::Play(query.to_string())),
            "join" => return Some(Action::Join),
            "pause" => Control::Pause,
            "resume" => Control::Resume,
            "skip" => Control::Skip,
            "stop" | "leave" => Control::Stop,
            "repeat" => Control::Repeat,
            "clear" => Control::ClearQueue,
            "nowplaying" => Control::NowPlaying,
            "queue" => Control::Queue(PageRequest::At(one_based(number.unwrap_or(1)))),
            "volume" => Control::Volume(VolumeChange::To(number? as f32 / 100.0)),
            _ => return None,
        };
        Some(Action::Control(control))
    }

    pub fn from_button(custom_id: &str, volume_step: f32) -> Option<Self> {
        let control = match custom_id {
            button_ids::PAUSE => Control::Pause,
            button_ids::RESUME => Control::Resume,
            button_ids::SKIP => Control::Skip,
            button_ids::STOP => Control::Stop,
            button_ids::REPEAT => Control::Repeat,
            button_ids::VOLUME_UP => Control::Volume(VolumeChange::By(volume_step)),
            button_ids::VOLUME_DOWN => Control::Volume(VolumeChange::By(-volume_step)),
            button_ids::PREVIOUS_PAGE => Control::Queue(PageRequest::Previous),
            button_ids::NEXT_PAGE => Control::Queue(PageRequest::Next),
            button_ids::CLEAR_QUEUE => Control::ClearQueue,
            _ => return None,
        };
        Some(Action::Control(control))
    }

    /// Parses `<prefix><command> [args]`, e.g. `hplay never gonna give you up`.
    pub fn from_prefix(content: &str, prefix: &str) -> Option<Self> {
        let rest = content.trim().strip_prefix(prefix)?;
        let (command, args) = match rest.split_once(char::is_whitespace) {
            Some((command, args)) => (command, args.trim()),
            None => (rest, ""),
        };

        let control = match command.to_lowercase().as_str() {
            "play" | "p" if !args.is_empty() => return Some(Action::Play(args.to_string())),
            "join" => return Some(Action::Join),
            "pause" => Control::Pause,
            "resume" => Control::Resume,
            "skip" | "s" => Control::Skip,
            "stop" | "leave" => Control::Stop,
            "repeat" | "loop" => Control::Repeat,
            "clear" => Control::ClearQueue,
            "np" | "nowplaying" => Control::NowPlaying,
            "queue" | "q" => {
                let page = args.parse::<i64>().unwrap_or(1);
                Control::Queue(PageRequest::At(one_based(page)))
            }
            "volume" | "vol" => Control::Volume(VolumeChange::To(args.parse::<f32>().ok()? / 100.0)),
            _ => return None,
        };
        Some(Action::Control(control))
    }
}

fn one_based(page: i64) -> usize {
    usize::try_from(page.max(1) - 1).unwrap_or(0)
}

pub fn enqueue_reply(track: &Track, outcome: EnqueueOutcome) -> Reply {
    match outcome {
        EnqueueOutcome::Started => Reply::public(format!("🎵 Now playing **{}**", track.title)),
        EnqueueOutcome::Queued { position } => {
            Reply::public(format!("✅ Queued **{}** at position {}", track.title, position))
        }
    }
}

/// Runs a control action against a live session.
pub async fn control(control: &Control, session: &SessionHandle) -> Reply {
    debug!("🎛️ {:?} in guild {}", control, session.guild_id());

    let outcome = match control {
        Control::Pause => session.pause().await.map(|()| Reply::public("⏸️ Paused.")),
        Control::Resume => session.resume().await.map(|()| Reply::public("▶️ Resumed.")),
        Control::Skip => session.skip().await.map(|()| Reply::public("⏭️ Skipped.")),
        Control::Stop => Ok(match session.stop().await {
            StopOutcome::Stopped => Reply::public("⏹️ Stopped and disconnected."),
            StopOutcome::AlreadyStopped => Reply::private("ℹ️ Nothing to stop."),
        }),
        Control::Repeat => session
            .cycle_repeat_mode()
            .await
            .map(|mode| Reply::public(format!("🔁 Repeat mode: **{}**", mode))),
        Control::Volume(change) => session
            .set_volume(*change)
            .await
            .map(|volume| Reply::public(format!("🔊 Volume set to {}%", (volume * 100.0).round()))),
        Control::ClearQueue => session
            .clear_queue()
            .await
            .map(|removed| Reply::public(format!("🗑️ Removed {} tracks from the queue.", removed))),
        Control::Queue(request) => {
            let page = match request {
                PageRequest::At(page) => *page,
                PageRequest::Previous => session.queue_page_index().saturating_sub(1),
                PageRequest::Next => session.queue_page_index() + 1,
            };
            let shown = session.show_queue(page);
            Ok(Reply::private(format!(
                "📋 Queue page {} / {}",
                shown.page + 1,
                shown.total_pages
            )))
        }
        Control::NowPlaying => session.fresh_snapshot().await.map(|snapshot| match &snapshot.current {
            Some(track) => Reply::private(format!(
                "🎵 Now playing **{}** ({}, {} elapsed, {} queued)",
                track.title,
                snapshot.play_state.as_str(),
                format_duration(snapshot.position),
                snapshot.queue.len()
            )),
            None => Reply::private("ℹ️ Nothing is playing."),
        }),
    };

    outcome.unwrap_or_else(|e| Reply::from_error(&e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::testing::{track, Harness};
    use pretty_assertions::assert_eq;

    #[test]
    fn slash_commands_parse() {
        assert_eq!(
            Action::from_slash("play", Some("lofi"), None),
            Some(Action::Play("lofi".to_string()))
        );
        assert_eq!(Action::from_slash("play", None, None), None);
        assert_eq!(Action::from_slash("leave", None, None), Some(Action::Control(Control::Stop)));
        assert_eq!(
            Action::from_slash("queue", None, Some(3)),
            Some(Action::Control(Control::Queue(PageRequest::At(2))))
        );
        assert_eq!(
            Action::from_slash("queue", None, Some(-4)),
            Some(Action::Control(Control::Queue(PageRequest::At(0))))
        );
        assert_eq!(
            Action::from_slash("volume", None, Some(35)),
            Some(Action::Control(Control::Volume(VolumeChange::To(0.35))))
        );
        assert_eq!(Action::from_slash("volume", None, None), None);
        assert_eq!(Action::from_slash("equalizer", None, None), None);
    }

    #[test]
    fn buttons_parse() {
        assert_eq!(
            Action::from_button("volup_btn", 0.1),
            Some(Action::Control(Control::Volume(VolumeChange::By(0.1))))
        );
        assert_eq!(
            Action::from_button("voldown_btn", 0.1),
            Some(Action::Control(Control::Volume(VolumeChange::By(-0.1))))
        );
        assert_eq!(
            Action::from_button("next_page", 0.1),
            Some(Action::Control(Control::Queue(PageRequest::Next)))
        );
        assert_eq!(Action::from_button("queue_clear", 0.1), Some(Action::Control(Control::ClearQueue)));
        assert_eq!(Action::from_button("something_else", 0.1), None);
    }

    #[test]
    fn prefix_commands_parse() {
        assert_eq!(
            Action::from_prefix("hplay never gonna give you up", "h"),
            Some(Action::Play("never gonna give you up".to_string()))
        );
        assert_eq!(Action::from_prefix("hplay", "h"), None);
        assert_eq!(Action::from_prefix("hskip", "h"), Some(Action::Control(Control::Skip)));
        assert_eq!(
            Action::from_prefix("hqueue 2", "h"),
            Some(Action::Control(Control::Queue(PageRequest::At(1))))
        );
        assert_eq!(Action::from_prefix("hello everyone", "h"), None);
        assert_eq!(Action::from_prefix("!skip", "h"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn controls_report_no_ops_privately() {
        let h = Harness::new();
        let reply = control(&Control::Pause, &h.session).await;
        assert_eq!(reply, Reply::private("ℹ️ Nothing is playing."));

        h.session.enqueue(track("A")).await.unwrap();
        let reply = control(&Control::Resume, &h.session).await;
        assert_eq!(reply, Reply::private("ℹ️ Nothing is paused."));
    }

    #[tokio::test(start_paused = true)]
    async fn stop_twice_is_a_quiet_no_op() {
        let h = Harness::new();
        h.session.enqueue(track("A")).await.unwrap();

        assert_eq!(
            control(&Control::Stop, &h.session).await,
            Reply::public("⏹️ Stopped and disconnected.")
        );
        assert_eq!(control(&Control::Stop, &h.session).await, Reply::private("ℹ️ Nothing to stop."));
    }

    #[tokio::test(start_paused = true)]
    async fn queue_paging_moves_from_the_last_shown_page() {
        let h = Harness::new();
        for i in 0..25 {
            h.session.enqueue(track(&format!("T{i}"))).await.unwrap();
        }

        let next = control(&Control::Queue(PageRequest::Next), &h.session).await;
        assert_eq!(next.content, "📋 Queue page 2 / 3");
        control(&Control::Queue(PageRequest::Next), &h.session).await;
        let clamped = control(&Control::Queue(PageRequest::Next), &h.session).await;
        assert_eq!(clamped.content, "📋 Queue page 3 / 3");
        let back = control(&Control::Queue(PageRequest::Previous), &h.session).await;
        assert_eq!(back.content, "📋 Queue page 2 / 3");
    }

    #[tokio::test(start_paused = true)]
    async fn volume_reply_shows_the_clamped_level() {
        let h = Harness::new();
        let reply = control(&Control::Volume(VolumeChange::To(1.7)), &h.session).await;
        assert_eq!(reply, Reply::public("🔊 Volume set to 100%"));
    }

    #[test]
    fn enqueue_replies() {
        let t = track("A");
        assert_eq!(enqueue_reply(&t, EnqueueOutcome::Started).content, "🎵 Now playing **A**");
        assert_eq!(
            enqueue_reply(&t, EnqueueOutcome::Queued { position: 3 }).content,
            "✅ Queued **A** at position 3"
        );
    }
}

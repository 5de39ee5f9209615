use async_trait::async_trait;
use serenity::{
    all::{ChannelId, Http, MessageId},
    builder::{CreateActionRow, CreateEmbed, CreateMessage, EditMessage},
};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::{buttons, embeds};
use crate::audio::{display::PlayerDisplay, SessionSnapshot};

#[derive(Default)]
struct Panels {
    now_playing: Option<MessageId>,
    queue: Option<MessageId>,
}

/// Renders a session into a text channel.
///
/// Keeps one now-playing and one queue message and edits them in place.
pub struct DiscordDisplay {
    http: Arc<Http>,
    channel_id: ChannelId,
    panels: Mutex<Panels>,
}

impl DiscordDisplay {
    pub fn new(http: Arc<Http>, channel_id: ChannelId) -> Self {
        Self {
            http,
            channel_id,
            panels: Mutex::new(Panels::default()),
        }
    }

    /// Edits `slot`'s message, sending a fresh one if it is missing or gone.
    async fn upsert(&self, slot: &mut Option<MessageId>, embed: CreateEmbed, components: Vec<CreateActionRow>) {
        if let Some(message_id) = *slot {
            let edit = EditMessage::new()
                .embed(embed.clone())
                .components(components.clone());
            match self.channel_id.edit_message(&*self.http, message_id, edit).await {
                Ok(_) => return,
                Err(e) => debug!("Panel {} not editable, re-sending: {}", message_id, e),
            }
        }

        let message = CreateMessage::new().embed(embed).components(components);
        match self.channel_id.send_message(&*self.http, message).await {
            Ok(sent) => *slot = Some(sent.id),
            Err(e) => {
                warn!("❌ Could not post panel in {}: {}", self.channel_id, e);
                *slot = None;
            }
        }
    }

    async fn delete(&self, slot: &mut Option<MessageId>) {
        if let Some(message_id) = slot.take() {
            if let Err(e) = self.channel_id.delete_message(&*self.http, message_id).await {
                debug!("Panel {} already gone: {}", message_id, e);
            }
        }
    }
}

#[async_trait]
impl PlayerDisplay for DiscordDisplay {
    async fn render_now_playing(&self, snapshot: &SessionSnapshot) {
        let embed = embeds::now_playing_embed(snapshot);
        let controls = buttons::player_controls(snapshot.play_state, snapshot.repeat_mode);
        let mut panels = self.panels.lock().await;
        self.upsert(&mut panels.now_playing, embed, controls).await;
    }

    async fn render_queue(&self, snapshot: &SessionSnapshot, page: usize) {
        let page = snapshot.queue_page(page);
        let embed = embeds::queue_embed(snapshot, &page);
        let controls = buttons::queue_controls(&page);
        let mut panels = self.panels.lock().await;
        self.upsert(&mut panels.queue, embed, controls).await;
    }

    async fn clear(&self) {
        let mut panels = self.panels.lock().await;
        self.delete(&mut panels.now_playing).await;
        self.delete(&mut panels.queue).await;
    }

    async fn notify(&self, message: &str) {
        let notice = CreateMessage::new().embed(embeds::notice_embed(message));
        if let Err(e) = self.channel_id.send_message(&*self.http, notice).await {
            warn!("❌ Could not post notice in {}: {}", self.channel_id, e);
        }
    }
}

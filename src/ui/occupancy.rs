use serenity::all::{Cache, ChannelId, GuildId};
use std::sync::Arc;

use crate::audio::sink::Occupancy;

/// Counts human listeners in a voice channel from the gateway cache.
pub struct ChannelOccupancy {
    cache: Arc<Cache>,
    guild_id: GuildId,
    channel_id: ChannelId,
}

impl ChannelOccupancy {
    pub fn new(cache: Arc<Cache>, guild_id: GuildId, channel_id: ChannelId) -> Self {
        Self {
            cache,
            guild_id,
            channel_id,
        }
    }
}

/// `(channel, is_bot)` per voice state; bots never count.
fn count_listeners(states: impl IntoIterator<Item = (Option<ChannelId>, bool)>, channel_id: ChannelId) -> usize {
    states
        .into_iter()
        .filter(|(channel, is_bot)| *channel == Some(channel_id) && !is_bot)
        .count()
}

impl Occupancy for ChannelOccupancy {
    fn listener_count(&self) -> usize {
        let own_id = self.cache.current_user().id;
        let Some(guild) = self.cache.guild(self.guild_id) else {
            return 0;
        };

        let states = guild.voice_states.values().map(|state| {
            let is_bot = state.user_id == own_id
                || state
                    .member
                    .as_ref()
                    .map(|member| member.user.bot)
                    .unwrap_or(false);
            (state.channel_id, is_bot)
        });
        count_listeners(states, self.channel_id)
    }
}

//! # Bot Module
//!
//! Discord front end for the jukebox.
//!
//! [`Jukebox`] implements Serenity's [`EventHandler`]. Slash commands, button
//! clicks and prefix messages are parsed into one [`Action`] and dispatched
//! against the guild's playback session, which is created on demand when a
//! user asks to play something or calls `/join`.

use anyhow::Result;
use serenity::{
    all::{
        ChannelId, CommandInteraction, ComponentInteraction, Context, CreateInteractionResponse,
        CreateInteractionResponseMessage, EditInteractionResponse, EventHandler, GuildId,
        Interaction, Message, Ready, UserId, VoiceState,
    },
    async_trait,
};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::{
    audio::{SessionHandle, SessionManager, SessionParts},
    audio::songbird_sink::SongbirdSink,
    config::Config,
    sources::TrackResolver,
    ui::{ChannelOccupancy, DiscordDisplay},
};

pub mod commands;
pub mod handlers;

use handlers::{Action, Control, Reply};

/// Where an action came from.
#[derive(Debug, Clone, Copy)]
struct Origin {
    guild_id: GuildId,
    user_id: UserId,
    text_channel: ChannelId,
}

pub struct Jukebox {
    config: Arc<Config>,
    sessions: SessionManager,
    resolver: Arc<dyn TrackResolver>,
}

impl Jukebox {
    pub fn new(config: Arc<Config>, sessions: SessionManager, resolver: Arc<dyn TrackResolver>) -> Self {
        Self {
            config,
            sessions,
            resolver,
        }
    }

    async fn register_commands(&self, ctx: &Context) -> Result<()> {
        info!("📝 Registering slash commands...");

        match self.config.guild_id {
            Some(guild_id) => {
                let guild_id = GuildId::new(guild_id);
                if !ctx.cache.guilds().contains(&guild_id) {
                    warn!("⚠️ Bot is not a member of guild {}, skipping registration", guild_id);
                    return Ok(());
                }
                commands::register_guild_commands(ctx, guild_id).await?;
                info!("✅ Guild commands registered for {}", guild_id);
            }
            None => {
                commands::register_global_commands(ctx).await?;
                info!("✅ Global commands registered");
            }
        }

        Ok(())
    }

    async fn dispatch(&self, ctx: &Context, origin: Origin, action: Action) -> Reply {
        match action {
            Action::Play(query) => self.play(ctx, origin, &query).await,
            Action::Join => match self.join(ctx, origin).await {
                Ok(_) => Reply::public("🔊 Joined your voice channel."),
                Err(e) => failure(e),
            },
            Action::Control(control) => match self.sessions.get(origin.guild_id) {
                Some(session) => handlers::control(&control, &session).await,
                None if control == Control::Stop => Reply::private("ℹ️ Nothing to stop."),
                None => Reply::private("ℹ️ Nothing is playing."),
            },
        }
    }

    async fn play(&self, ctx: &Context, origin: Origin, query: &str) -> Reply {
        let session = match self.sessions.get(origin.guild_id) {
            Some(session) => session,
            None => match self.join(ctx, origin).await {
                Ok(session) => session,
                Err(e) => return failure(e),
            },
        };

        let track = match self.resolver.resolve(query, origin.user_id).await {
            Ok(track) => track,
            Err(e) => {
                warn!("🔍 Could not resolve {:?}: {}", query, e);
                return Reply::private(format!("❌ {}", e));
            }
        };

        match session.enqueue(track.clone()).await {
            Ok(outcome) => handlers::enqueue_reply(&track, outcome),
            Err(e) => Reply::from_error(&e),
        }
    }

    /// Connects to the requester's voice channel and starts a fresh session
    /// bound to it, superseding any session the guild already had.
    async fn join(&self, ctx: &Context, origin: Origin) -> Result<SessionHandle> {
        let voice_channel = user_voice_channel(ctx, origin.guild_id, origin.user_id)?;

        let manager = songbird::get(ctx)
            .await
            .ok_or_else(|| anyhow::anyhow!("Voice client is not initialised"))?;
        let call = manager.join(origin.guild_id, voice_channel).await?;
        info!("🔊 Connected to voice channel {} in guild {}", voice_channel, origin.guild_id);

        let parts = SessionParts {
            sink: Arc::new(SongbirdSink::new(manager.clone(), origin.guild_id, call)?),
            occupancy: Arc::new(ChannelOccupancy::new(
                ctx.cache.clone(),
                origin.guild_id,
                voice_channel,
            )),
            display: Arc::new(DiscordDisplay::new(ctx.http.clone(), origin.text_channel)),
        };

        Ok(self.sessions.start(origin.guild_id, parts).await)
    }

    async fn handle_command(&self, ctx: &Context, command: CommandInteraction) -> Result<()> {
        let Some(guild_id) = command.guild_id else {
            return respond(ctx, &command, Reply::private("❌ Commands only work inside a server.")).await;
        };

        info!(
            "📝 /{} used by {} in guild {}",
            command.data.name, command.user.name, guild_id
        );

        let options = &command.data.options;
        let text = options.iter().find_map(|opt| opt.value.as_str());
        let number = options.iter().find_map(|opt| opt.value.as_i64());

        let Some(action) = Action::from_slash(&command.data.name, text, number) else {
            return respond(ctx, &command, Reply::private("❌ Unknown command")).await;
        };

        let origin = Origin {
            guild_id,
            user_id: command.user.id,
            text_channel: command.channel_id,
        };

        if matches!(action, Action::Play(_)) {
            // Resolving can outlast the interaction deadline.
            command
                .create_response(
                    &ctx.http,
                    CreateInteractionResponse::Defer(CreateInteractionResponseMessage::new()),
                )
                .await?;
            let reply = self.dispatch(ctx, origin, action).await;
            command
                .edit_response(&ctx.http, EditInteractionResponse::new().content(reply.content))
                .await?;
            return Ok(());
        }

        let reply = self.dispatch(ctx, origin, action).await;
        respond(ctx, &command, reply).await
    }

    async fn handle_component(&self, ctx: &Context, component: ComponentInteraction) -> Result<()> {
        let Some(guild_id) = component.guild_id else {
            return Ok(());
        };

        let Some(action) = Action::from_button(&component.data.custom_id, self.config.volume_step) else {
            warn!("🔘 Unknown button {:?}", component.data.custom_id);
            return Ok(());
        };

        let origin = Origin {
            guild_id,
            user_id: component.user.id,
            text_channel: component.channel_id,
        };
        let reply = self.dispatch(ctx, origin, action).await;

        component
            .create_response(
                &ctx.http,
                CreateInteractionResponse::Message(
                    CreateInteractionResponseMessage::new()
                        .content(reply.content)
                        .ephemeral(true),
                ),
            )
            .await?;
        Ok(())
    }
}

#[async_trait]
impl EventHandler for Jukebox {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("🤖 {} is online!", ready.user.name);
        info!("📊 Connected to {} guilds", ready.guilds.len());

        if let Err(e) = self.register_commands(&ctx).await {
            error!("❌ Failed to register commands: {:?}", e);
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        match interaction {
            Interaction::Command(command) => {
                if let Err(e) = self.handle_command(&ctx, command).await {
                    error!("Error handling command: {:?}", e);
                }
            }
            Interaction::Component(component) => {
                if let Err(e) = self.handle_component(&ctx, component).await {
                    error!("Error handling component: {:?}", e);
                }
            }
            _ => {}
        }
    }

    async fn message(&self, ctx: Context, msg: Message) {
        if msg.author.bot {
            return;
        }
        let Some(guild_id) = msg.guild_id else {
            return;
        };
        let Some(action) = Action::from_prefix(&msg.content, &self.config.command_prefix) else {
            return;
        };

        info!("💬 {:?} from {} in guild {}", action, msg.author.name, guild_id);

        let origin = Origin {
            guild_id,
            user_id: msg.author.id,
            text_channel: msg.channel_id,
        };
        let reply = self.dispatch(&ctx, origin, action).await;

        if let Err(e) = msg.channel_id.say(&ctx.http, reply.content).await {
            error!("Error replying to prefix command: {:?}", e);
        }
    }

    async fn voice_state_update(&self, ctx: Context, old: Option<VoiceState>, new: VoiceState) {
        if new.user_id != ctx.cache.current_user().id {
            return;
        }

        // Kicked or disconnected from outside the bot.
        if old.is_some() && new.channel_id.is_none() {
            if let Some(guild_id) = new.guild_id {
                if let Some(session) = self.sessions.get(guild_id) {
                    info!("🔌 Bot was disconnected in guild {}", guild_id);
                    session.connection_lost();
                }
            }
        }
    }
}

async fn respond(ctx: &Context, command: &CommandInteraction, reply: Reply) -> Result<()> {
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .content(reply.content)
                    .ephemeral(reply.ephemeral),
            ),
        )
        .await?;
    Ok(())
}

fn failure(error: anyhow::Error) -> Reply {
    warn!("⚠️ {:#}", error);
    Reply::private(format!("❌ {}", error))
}

fn user_voice_channel(ctx: &Context, guild_id: GuildId, user_id: UserId) -> Result<ChannelId> {
    let guild = ctx
        .cache
        .guild(guild_id)
        .ok_or_else(|| anyhow::anyhow!("Guild is not cached yet"))?;

    guild
        .voice_states
        .get(&user_id)
        .and_then(|state| state.channel_id)
        .ok_or_else(|| anyhow::anyhow!("You must be in a voice channel"))
}

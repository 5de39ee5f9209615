use anyhow::Result;
use serenity::{model::gateway::GatewayIntents, Client};
use songbird::SerenityInit;
use std::sync::Arc;
use tracing::{error, info, warn};

mod audio;
mod bot;
mod config;
mod sources;
mod ui;

use crate::audio::SessionManager;
use crate::bot::Jukebox;
use crate::config::Config;
use crate::sources::{
    spotify::SpotifyClient, youtube::YtDlpResolver, MetadataResolver, SmartResolver,
};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("voice_jukebox=debug".parse()?)
                .add_directive("serenity=info".parse()?)
                .add_directive("songbird=info".parse()?),
        )
        .init();

    info!("🎵 Starting Voice Jukebox v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::load()?;

    if std::env::args().any(|arg| arg == "--health-check") {
        return health_check(&config).await;
    }

    info!("{}", config.summary());
    let config = Arc::new(config);

    let metadata: Option<Arc<dyn MetadataResolver>> = match config.spotify_credentials() {
        Some((id, secret)) => Some(Arc::new(SpotifyClient::new(id, secret)?)),
        None => {
            info!("🎧 Spotify credentials not set, Spotify links are disabled");
            None
        }
    };
    let resolver = SmartResolver::new(
        Arc::new(YtDlpResolver::new(config.ytdlp_path.clone())?),
        metadata,
        config.resolve_timeout,
    );

    let sessions = SessionManager::new(config.session_settings());
    let handler = Jukebox::new(config.clone(), sessions.clone(), Arc::new(resolver));

    let intents = GatewayIntents::GUILDS
        | GatewayIntents::GUILD_VOICE_STATES
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT;

    let mut client = Client::builder(&config.discord_token, intents)
        .event_handler(handler)
        .register_songbird()
        .await?;

    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!(
                    "⚠️ Shutdown signal received, closing {} sessions...",
                    sessions.active_count()
                );
                let stopped = sessions.shutdown().await;
                info!("⏹️ Stopped {} playback sessions", stopped);
                shard_manager.shutdown_all().await;
            }
            Err(e) => warn!("Could not listen for Ctrl+C: {:?}", e),
        }
    });

    info!("🚀 Bot started");
    if let Err(why) = client.start().await {
        error!("Client error: {:?}", why);
    }

    Ok(())
}

async fn health_check(config: &Config) -> Result<()> {
    let yt_dlp = async_process::Command::new(&config.ytdlp_path)
        .arg("--version")
        .output()
        .await?;

    if yt_dlp.status.success() {
        println!("OK");
        Ok(())
    } else {
        anyhow::bail!("{} is not available", config.ytdlp_path);
    }
}

//! Discord bot for configuring and querying a tgstation-server deployment.

mod client;
mod commands;
mod config;
mod deployment;
mod plugin;
mod reply;
mod settings;

use std::sync::Arc;

use anyhow::{Context as _, Result};
use serenity::all::{
    Client, Context, EventHandler, GatewayIntents, Interaction, Ready,
};
use serenity::async_trait;
use tracing::{error, info};

use client::HttpClientFactory;
use commands::Owners;
use config::Config;
use deployment::Deployment;
use plugin::TgsPlugin;
use settings::{JsonFileStore, Settings};

/// Bot event handler.
struct Handler {
    plugin: TgsPlugin,
    owners: Owners,
    guild_id: Option<u64>,
}

#[async_trait]
impl EventHandler for Handler {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("Bot connected as {}", ready.user.name);
        self.owners.resolve(&ctx).await;
        commands::register_commands(&ctx, &ready, self.guild_id).await;
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        if let Interaction::Command(command) = interaction {
            info!("Received command: {}", command.data.name);

            match command.data.name.as_str() {
                "tgs4" => commands::tgs4(&ctx, &command, &self.plugin, &self.owners).await,
                _ => {
                    error!("Unknown command: {}", command.data.name);
                }
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(&config.log_level)
        .init();

    info!("Starting TGS bot...");
    info!("Settings file: {}", config.settings_path.display());

    // Load the deployment settings and build the TGS plugin
    let store = JsonFileStore::open(&config.settings_path)
        .await
        .context("Failed to open settings file")?;
    let settings = Settings::new(Arc::new(store));

    let snapshot = settings.snapshot().await?;
    info!(
        "TGS server: {} ({})",
        snapshot.base_url(),
        snapshot.api_header()
    );

    let deployment = Deployment::new(
        settings,
        Arc::new(HttpClientFactory::new(config.http_timeout)),
    );

    // Create Discord client
    let handler = Handler {
        plugin: TgsPlugin::new(Arc::new(deployment)),
        owners: Owners::new(config.owner_ids.iter().copied()),
        guild_id: config.guild_id,
    };

    let intents = GatewayIntents::empty();
    let mut client = Client::builder(&config.discord_token, intents)
        .event_handler(handler)
        .await?;

    // Shut the shards down cleanly on Ctrl-C
    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Shutting down...");
                shard_manager.shutdown_all().await;
            }
            Err(e) => error!("Failed to listen for Ctrl-C: {}", e),
        }
    });

    // Run the bot
    info!("Connecting to Discord...");
    client.start().await?;

    Ok(())
}

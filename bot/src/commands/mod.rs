//! Discord slash commands module.

mod access;
mod interaction;
mod tgs4;

pub use access::Owners;
pub use tgs4::tgs4;

use serenity::all::{Command, Context, GuildId, Ready};
use tracing::{error, info, warn};

/// Register all slash commands with Discord.
pub async fn register_commands(ctx: &Context, ready: &Ready, guild_id: Option<u64>) {
    info!("Registering slash commands...");

    let commands = vec![tgs4::register()];

    // Register to specific guild (faster) or globally
    if let Some(gid) = guild_id {
        warn!("Registering to guild {} only, DM-only subcommands will be unavailable", gid);
        let guild = GuildId::new(gid);
        match guild.set_commands(&ctx.http, commands).await {
            Ok(cmds) => info!("Registered {} guild commands", cmds.len()),
            Err(e) => error!("Failed to register guild commands: {}", e),
        }
    } else {
        match Command::set_global_commands(&ctx.http, commands).await {
            Ok(cmds) => info!("Registered {} global commands", cmds.len()),
            Err(e) => error!("Failed to register global commands: {}", e),
        }
    }

    info!("{} is connected!", ready.user.name);
}

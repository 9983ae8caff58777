//! /tgs4 command - Configure and query the TGS server.

use serenity::all::{
    CommandDataOption, CommandDataOptionValue, CommandInteraction, CommandOptionType, Context,
    CreateCommand, CreateCommandOption, GuildId,
};
use tracing::{error, info, warn};

use super::access::{self, Access, Owners, Scope};
use super::interaction::InteractionReply;
use crate::plugin::TgsPlugin;
use crate::reply::Reply;

/// A subcommand and the single option it takes, if any.
struct Subcommand {
    name: &'static str,
    description: &'static str,
    access: Access,
    scope: Scope,
    /// Talks to TGS, so the interaction is deferred before any work starts.
    defer: bool,
    option: Option<(CommandOptionType, &'static str, &'static str)>,
}

const SUBCOMMANDS: &[Subcommand] = &[
    Subcommand {
        name: "host",
        description: "Set the TGS host, defaults to http://127.0.0.1",
        access: Access::Owner,
        scope: Scope::Guild,
        defer: false,
        option: Some((
            CommandOptionType::String,
            "url",
            "HTTP URL of the server, optionally with a port (e.g. http://10.0.0.5:5000)",
        )),
    },
    Subcommand {
        name: "port",
        description: "Set the TGS port, defaults to 8080",
        access: Access::Owner,
        scope: Scope::Guild,
        defer: false,
        option: Some((CommandOptionType::Integer, "port", "Port from 1024 to 65535")),
    },
    Subcommand {
        name: "api",
        description: "Set the API header name (without version). You rarely need this",
        access: Access::Owner,
        scope: Scope::Guild,
        defer: false,
        option: Some((CommandOptionType::String, "name", "API name, e.g. Tgstation.Server.Api")),
    },
    Subcommand {
        name: "api_version",
        description: "Set the API version sent in the API header",
        access: Access::Owner,
        scope: Scope::Guild,
        defer: false,
        option: Some((CommandOptionType::String, "version", "API version, e.g. 8.3.0")),
    },
    Subcommand {
        name: "agent",
        description: "Set the User-Agent header",
        access: Access::Owner,
        scope: Scope::Guild,
        defer: false,
        option: Some((CommandOptionType::String, "user_agent", "User-Agent value")),
    },
    Subcommand {
        name: "account",
        description: "Start setting up the TGS account this bot logs in with",
        access: Access::Owner,
        scope: Scope::AnyGuild,
        defer: false,
        option: None,
    },
    Subcommand {
        name: "tgs_user",
        description: "Set the TGS username (DM only)",
        access: Access::Owner,
        scope: Scope::DirectMessage,
        defer: false,
        option: Some((CommandOptionType::String, "username", "TGS username")),
    },
    Subcommand {
        name: "tgs_pass",
        description: "Set the TGS password (DM only)",
        access: Access::Owner,
        scope: Scope::DirectMessage,
        defer: false,
        option: Some((CommandOptionType::String, "password", "TGS password")),
    },
    Subcommand {
        name: "config",
        description: "Display basic config info",
        access: Access::Moderator,
        scope: Scope::Guild,
        defer: false,
        option: None,
    },
    Subcommand {
        name: "info",
        description: "Retrieve basic TGS server info",
        access: Access::Moderator,
        scope: Scope::Guild,
        defer: true,
        option: None,
    },
    Subcommand {
        name: "authenticate",
        description: "Log in to TGS now with the stored credentials",
        access: Access::Owner,
        scope: Scope::Any,
        defer: true,
        option: None,
    },
    Subcommand {
        name: "reload",
        description: "Rebuild the TGS client from the stored settings",
        access: Access::Owner,
        scope: Scope::Any,
        defer: false,
        option: None,
    },
];

/// Create the command registration.
pub fn register() -> CreateCommand {
    SUBCOMMANDS.iter().fold(
        CreateCommand::new("tgs4")
            .description("Configure and query tgstation-server")
            .dm_permission(true),
        |command, sub| {
            let mut option =
                CreateCommandOption::new(CommandOptionType::SubCommand, sub.name, sub.description);
            if let Some((kind, name, description)) = sub.option {
                option = option.add_sub_option(
                    CreateCommandOption::new(kind, name, description).required(true),
                );
            }
            command.add_option(option)
        },
    )
}

/// Handle the /tgs4 command.
pub async fn tgs4(ctx: &Context, command: &CommandInteraction, plugin: &TgsPlugin, owners: &Owners) {
    let Some(invoked) = command.data.options.first() else {
        error!("tgs4 invoked without a subcommand");
        return;
    };
    let args: &[CommandDataOption] = match &invoked.value {
        CommandDataOptionValue::SubCommand(opts) => opts,
        _ => &[],
    };

    info!(
        "tgs4 command received: subcommand='{}', user={}, guild={:?}",
        invoked.name, command.user.id, command.guild_id
    );

    let Some(sub) = SUBCOMMANDS.iter().find(|s| s.name == invoked.name) else {
        let reply = InteractionReply::new(ctx, command, true);
        if let Err(e) = reply.say("Unknown subcommand.").await {
            error!("Failed to send response: {}", e);
        }
        return;
    };

    let sensitive = sub.scope == Scope::DirectMessage;
    let reply = InteractionReply::new(ctx, command, sensitive);

    let owner_guild = match plugin.owner_guild().await {
        Ok(guild) => guild.map(GuildId::new),
        Err(e) => {
            error!("Failed to read the owning guild: {:#}", e);
            if let Err(e) = reply.say("There was an error reading the TGS settings.").await {
                error!("Failed to send response: {}", e);
            }
            return;
        }
    };

    if let Err(reason) = access::check(command, owners, sub.access, sub.scope, owner_guild).await {
        warn!(
            "Refused tgs4 {} for user {}: {}",
            sub.name, command.user.id, reason
        );
        let denied = InteractionReply::new(ctx, command, true);
        if let Err(e) = denied.say(reason).await {
            error!("Failed to send denial: {}", e);
        }
        return;
    }

    if sub.defer {
        if let Err(e) = reply.acknowledge().await {
            warn!("Failed to defer tgs4 {}: {}", sub.name, e);
        }
    }

    match sub.name {
        "host" => plugin.host(&reply, str_arg(args, "url")).await,
        "port" => plugin.port(&reply, int_arg(args, "port")).await,
        "api" => plugin.api(&reply, str_arg(args, "name")).await,
        "api_version" => plugin.api_version(&reply, str_arg(args, "version")).await,
        "agent" => plugin.agent(&reply, str_arg(args, "user_agent")).await,
        "account" => match command.guild_id {
            Some(guild_id) => plugin.account(&reply, guild_id.get()).await,
            None => error!("account passed the guild check without a guild"),
        },
        "tgs_user" => plugin.username(&reply, str_arg(args, "username")).await,
        "tgs_pass" => plugin.password(&reply, str_arg(args, "password")).await,
        "config" => plugin.config(&reply).await,
        "info" => plugin.info(&reply).await,
        "authenticate" => plugin.authenticate(&reply).await,
        "reload" => plugin.reload(&reply).await,
        other => error!("Subcommand {} is registered but not handled", other),
    }
}

fn str_arg<'a>(args: &'a [CommandDataOption], name: &str) -> &'a str {
    args.iter()
        .find(|opt| opt.name == name)
        .and_then(|opt| opt.value.as_str())
        .unwrap_or("")
}

fn int_arg(args: &[CommandDataOption], name: &str) -> i64 {
    args.iter()
        .find(|opt| opt.name == name)
        .and_then(|opt| opt.value.as_i64())
        .unwrap_or_default()
}

//! Who may run which subcommand, and where.

use std::collections::HashSet;

use serenity::all::{CommandInteraction, Context, GuildId, Permissions, UserId};
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Permission tier of a subcommand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Bot owners only.
    Owner,
    /// Bot owners, or guild members with moderation rights.
    Moderator,
}

/// Where a subcommand may be invoked.
///
/// Once a guild has claimed the configuration, every scope except
/// [`Scope::AnyGuild`] refuses other guilds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Guild,
    /// Any guild, including one that does not own the configuration.
    AnyGuild,
    DirectMessage,
    Any,
}

const FOREIGN_GUILD: &str = "The TGS configuration belongs to another server. \
    An owner can run `/tgs4 account` here to move it.";

/// Guild permissions that count as moderator.
const MODERATOR_PERMISSIONS: Permissions = Permissions::ADMINISTRATOR
    .union(Permissions::MANAGE_GUILD)
    .union(Permissions::MODERATE_MEMBERS);

/// Bot owners: the configured ids plus the application owner or team.
#[derive(Debug, Default)]
pub struct Owners {
    ids: RwLock<HashSet<UserId>>,
}

impl Owners {
    pub fn new(ids: impl IntoIterator<Item = u64>) -> Self {
        Self {
            ids: RwLock::new(ids.into_iter().map(UserId::new).collect()),
        }
    }

    pub async fn contains(&self, id: UserId) -> bool {
        self.ids.read().await.contains(&id)
    }

    /// Add the application owner (or team members) reported by Discord.
    pub async fn resolve(&self, ctx: &Context) {
        match ctx.http.get_current_application_info().await {
            Ok(app) => {
                let mut ids = self.ids.write().await;
                if let Some(owner) = app.owner {
                    ids.insert(owner.id);
                }
                if let Some(team) = app.team {
                    ids.extend(team.members.into_iter().map(|m| m.user.id));
                }
                info!("Resolved {} bot owner(s)", ids.len());
            }
            Err(e) => warn!("Failed to fetch application owner: {}", e),
        }
    }
}

/// Check that the caller may run a subcommand here, or say why not.
pub async fn check(
    command: &CommandInteraction,
    owners: &Owners,
    access: Access,
    scope: Scope,
    owner_guild: Option<GuildId>,
) -> Result<(), &'static str> {
    check_location(scope, command.guild_id, owner_guild)?;

    let is_owner = owners.contains(command.user.id).await;
    match access {
        Access::Owner if is_owner => Ok(()),
        Access::Owner => Err("You must be the bot owner to use this command."),
        Access::Moderator if is_owner || is_moderator(command) => Ok(()),
        Access::Moderator => {
            Err("You need moderator or administrator permissions to use this command.")
        }
    }
}

fn check_location(
    scope: Scope,
    guild: Option<GuildId>,
    owner_guild: Option<GuildId>,
) -> Result<(), &'static str> {
    match (scope, guild) {
        (Scope::Guild | Scope::AnyGuild, None) => {
            Err("This command can only be used in a server.")
        }
        (Scope::DirectMessage, Some(_)) => {
            Err("For your security, this command only works in a direct message with me.")
        }
        (Scope::Guild | Scope::Any, Some(guild))
            if owner_guild.is_some_and(|owner| owner != guild) =>
        {
            Err(FOREIGN_GUILD)
        }
        _ => Ok(()),
    }
}

fn is_moderator(command: &CommandInteraction) -> bool {
    command
        .member
        .as_ref()
        .and_then(|member| member.permissions)
        .is_some_and(|perms| perms.intersects(MODERATOR_PERMISSIONS))
}

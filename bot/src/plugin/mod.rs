//! User-facing TGS operations behind the `/tgs4` command.
//!
//! Every operation reports its outcome through a [`Reply`]; nothing here
//! returns an error to the caller. Validation failures are answered with
//! the validation message, anything unexpected with a generic
//! "There was an error ..." message.

pub mod validate;

use std::future::Future;
use std::sync::Arc;

use anyhow::Result;
use tracing::{error, info, warn};

use crate::deployment::{Deployment, Operation, Response};
use crate::reply::Reply;
use validate::ValidationError;

const ACCOUNT_INSTRUCTIONS: &str = "**TGS account setup**\n\n\
    Send the credentials of the TGS user this bot should log in as, here in this DM:\n\
    1. `/tgs4 tgs_user <username>`\n\
    2. `/tgs4 tgs_pass <password>`\n\n\
    Then run `/tgs4 authenticate` to check they work. \
    Credentials are only accepted in direct messages.";

const CANNOT_DM: &str = "Error: I couldn't send you a direct message. \
    Please allow DMs from server members and run `/tgs4 account` again.";

const NO_OWNER_GUILD: &str = "Error: No server owns the TGS configuration yet. \
    Run `/tgs4 account` in your server first.";

/// The TGS plugin: configuration, credentials and queries.
#[derive(Debug, Clone)]
pub struct TgsPlugin {
    deployment: Arc<Deployment>,
}

impl TgsPlugin {
    pub fn new(deployment: Arc<Deployment>) -> Self {
        Self { deployment }
    }

    /// `host <url>`: set the host, and the port when the URL carries one.
    pub async fn host(&self, reply: &dyn Reply, input: &str) {
        run(reply, "setting the TGS host URL", async {
            let target = match validate::parse_host(input) {
                Ok(target) => target,
                Err(e) => return reject(reply, e).await,
            };
            self.deployment.set_host(&target.host, target.port).await?;
            // Read back so the user sees exactly what will be used.
            let url = self.deployment.settings().snapshot().await?.base_url();
            reply.say(&format!("TGS host set to: `{}`", url)).await
        })
        .await;
    }

    /// `port <int>`
    pub async fn port(&self, reply: &dyn Reply, port: i64) {
        run(reply, "setting the TGS port", async {
            let port = match validate::parse_port(port) {
                Ok(port) => port,
                Err(e) => return reject(reply, e).await,
            };
            self.deployment.set_port(port).await?;
            let url = self.deployment.settings().snapshot().await?.base_url();
            reply.say(&format!("TGS port set to: `{}` (`{}`)", port, url)).await
        })
        .await;
    }

    /// `api <name>`
    pub async fn api(&self, reply: &dyn Reply, input: &str) {
        run(reply, "setting the API", async {
            let name = match validate::parse_api_name(input) {
                Ok(name) => name,
                Err(e) => return reject(reply, e).await,
            };
            self.deployment.set_api(&name).await?;
            let header = self.deployment.settings().snapshot().await?.api_header();
            reply
                .say(&format!(
                    "TGS API set to: `{}`\nTGS API header: `{}`",
                    name, header
                ))
                .await
        })
        .await;
    }

    /// `api_version <version>`
    pub async fn api_version(&self, reply: &dyn Reply, input: &str) {
        run(reply, "setting the API version", async {
            let version = match validate::non_empty(input, "API version") {
                Ok(version) => version,
                Err(e) => return reject(reply, e).await,
            };
            self.deployment.set_api_version(version).await?;
            let header = self.deployment.settings().snapshot().await?.api_header();
            reply
                .say(&format!(
                    "TGS API version set to: `{}`\nTGS API header: `{}`",
                    version, header
                ))
                .await
        })
        .await;
    }

    /// `agent <string>`
    pub async fn agent(&self, reply: &dyn Reply, input: &str) {
        run(reply, "setting the User-Agent header", async {
            let agent = match validate::non_empty(input, "User-Agent") {
                Ok(agent) => agent,
                Err(e) => return reject(reply, e).await,
            };
            self.deployment.set_user_agent(agent).await?;
            reply.say(&format!("User-Agent set to: `{}`", agent)).await
        })
        .await;
    }

    /// `account`: start credential setup from the guild that will own it.
    ///
    /// The owner is walked through the rest by DM. If the DM cannot be
    /// delivered nothing is recorded.
    pub async fn account(&self, reply: &dyn Reply, guild_id: u64) {
        run(reply, "starting the TGS account setup", async {
            if let Err(e) = reply.direct_message(ACCOUNT_INSTRUCTIONS).await {
                warn!("Could not DM account setup instructions: {}", e);
                return reply.say(CANNOT_DM).await;
            }
            self.deployment.set_owner_guild(guild_id).await?;
            reply
                .say("I've sent you a DM with the next steps for setting up the TGS account.")
                .await
        })
        .await;
    }

    /// The guild that owns the configuration, once `account` has run.
    pub async fn owner_guild(&self) -> Result<Option<u64>> {
        Ok(self.deployment.settings().owner_guild_id().await?)
    }

    /// `tgs_user <username>`, DM only.
    pub async fn username(&self, reply: &dyn Reply, input: &str) {
        run(reply, "setting the TGS username", async {
            if self.deployment.settings().owner_guild_id().await?.is_none() {
                return reply.say(NO_OWNER_GUILD).await;
            }
            let username = match validate::non_empty(input, "username") {
                Ok(username) => username,
                Err(e) => return reject(reply, e).await,
            };
            self.deployment.set_username(username).await?;
            reply
                .say(&format!(
                    "TGS username set to: `{}`{}",
                    username,
                    self.next_step().await?
                ))
                .await
        })
        .await;
    }

    /// `tgs_pass <password>`, DM only. The password is never echoed.
    pub async fn password(&self, reply: &dyn Reply, input: &str) {
        run(reply, "setting the TGS password", async {
            if self.deployment.settings().owner_guild_id().await?.is_none() {
                return reply.say(NO_OWNER_GUILD).await;
            }
            if input.is_empty() {
                return reject(reply, ValidationError::Empty("password")).await;
            }
            self.deployment.set_password(input).await?;
            reply
                .say(&format!("TGS password updated.{}", self.next_step().await?))
                .await
        })
        .await;
    }

    async fn next_step(&self) -> Result<&'static str> {
        let snapshot = self.deployment.settings().snapshot().await?;
        Ok(match (&snapshot.username, &snapshot.password) {
            (Some(_), Some(_)) => "\nCredentials complete. Run `/tgs4 authenticate` to test them.",
            (None, _) => "\nNext: `/tgs4 tgs_user <username>`",
            (_, None) => "\nNext: `/tgs4 tgs_pass <password>`",
        })
    }

    /// `config`: show how the bot will reach the server.
    pub async fn config(&self, reply: &dyn Reply) {
        run(reply, "retrieving config info", async {
            let snapshot = self.deployment.settings().snapshot().await?;
            let account = match (&snapshot.username, snapshot.password.is_some()) {
                (Some(user), true) => format!("`{}`", user),
                (Some(user), false) => format!("`{}` (no password set)", user),
                (None, _) => "not configured".to_string(),
            };
            let token = if snapshot.auth_token.is_some() {
                "present"
            } else {
                "none"
            };
            reply
                .say(&format!(
                    "Server URL: `{}`\nAPI header: `{}`\nUser-Agent: `{}`\nAccount: {}\nToken: {}",
                    snapshot.base_url(),
                    snapshot.api_header(),
                    snapshot.user_agent,
                    account,
                    token
                ))
                .await
        })
        .await;
    }

    /// `info`: fetch and show the server information.
    pub async fn info(&self, reply: &dyn Reply) {
        run(reply, "retrieving the TGS info", async {
            match self.deployment.call(Operation::ServerInfo, reply).await {
                Some(Response::ServerInfo(info)) => reply.say(&info.to_string()).await,
                // Already reported by the dispatcher.
                None => Ok(()),
            }
        })
        .await;
    }

    /// `authenticate`: request a fresh token now.
    pub async fn authenticate(&self, reply: &dyn Reply) {
        run(reply, "authenticating with TGS", async {
            if let Err(e) = reply.acknowledge().await {
                warn!("Failed to acknowledge command: {}", e);
            }
            match self.deployment.authenticate().await {
                Ok(()) => reply.say("Successfully authenticated with TGS.").await,
                Err(e) => {
                    warn!("Authentication failed: {}", e);
                    reply.say(&e.user_message()).await
                }
            }
        })
        .await;
    }

    /// `reload`: drop the cached client.
    pub async fn reload(&self, reply: &dyn Reply) {
        run(reply, "reloading the TGS config", async {
            self.deployment.reload().await;
            info!("TGS client reloaded on request");
            reply.say("TGS client configuration reloaded.").await
        })
        .await;
    }
}

/// Run one operation, turning any error into a chat message.
async fn run<F>(reply: &dyn Reply, action: &str, operation: F)
where
    F: Future<Output = Result<()>>,
{
    if let Err(e) = operation.await {
        error!("Error {}: {:#}", action, e);
        if let Err(send_err) = reply
            .say(&format!("There was an error {}: {}", action, e))
            .await
        {
            error!("Failed to send error response: {}", send_err);
        }
    }
}

async fn reject(reply: &dyn Reply, error: ValidationError) -> Result<()> {
    info!("Rejected input: {}", error);
    reply.say(&error.to_string()).await
}

//! [`Reply`] backed by a slash command interaction.

use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context as _, Result};
use async_trait::async_trait;
use serenity::all::{
    CommandInteraction, Context, CreateInteractionResponse, CreateInteractionResponseFollowup,
    CreateInteractionResponseMessage, CreateMessage,
};

use crate::reply::Reply;

/// Sends the first message as the interaction response and the rest as
/// follow-ups. Acknowledging defers the response.
pub struct InteractionReply<'a> {
    ctx: &'a Context,
    command: &'a CommandInteraction,
    ephemeral: bool,
    responded: AtomicBool,
}

impl<'a> InteractionReply<'a> {
    pub fn new(ctx: &'a Context, command: &'a CommandInteraction, ephemeral: bool) -> Self {
        Self {
            ctx,
            command,
            ephemeral,
            responded: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl Reply for InteractionReply<'_> {
    async fn acknowledge(&self) -> Result<()> {
        if self.responded.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let deferred = if self.ephemeral {
            self.command.defer_ephemeral(&self.ctx.http).await
        } else {
            self.command.defer(&self.ctx.http).await
        };
        deferred.context("Failed to defer interaction")
    }

    async fn say(&self, text: &str) -> Result<()> {
        if self.responded.swap(true, Ordering::SeqCst) {
            let followup = CreateInteractionResponseFollowup::new()
                .content(text)
                .ephemeral(self.ephemeral);
            self.command
                .create_followup(&self.ctx.http, followup)
                .await
                .context("Failed to send follow-up message")?;
        } else {
            let message = CreateInteractionResponseMessage::new()
                .content(text)
                .ephemeral(self.ephemeral);
            self.command
                .create_response(&self.ctx.http, CreateInteractionResponse::Message(message))
                .await
                .context("Failed to send response")?;
        }
        Ok(())
    }

    async fn direct_message(&self, text: &str) -> Result<()> {
        self.command
            .user
            .direct_message(&self.ctx.http, CreateMessage::new().content(text))
            .await
            .context("Failed to send direct message")?;
        Ok(())
    }
}

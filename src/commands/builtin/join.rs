//! Move the bot into the invoker's channel.

use async_trait::async_trait;
use tracing::info;

use crate::commands::{CommandContext, CommandHandler, CommandResult};

/// Follows the invoker, unless the bot is parked in the announcement channel.
pub struct JoinHandler;

#[async_trait]
impl CommandHandler for JoinHandler {
    async fn handle(&self, ctx: &CommandContext<'_>) -> CommandResult {
        ctx.ensure_live()?;
        let me = ctx.client().whoami().await?;

        if ctx.session.announcement == Some(me.channel_id) {
            return ctx
                .reply("Cannot move: Bot must remain in status channel")
                .await;
        }

        let target = ctx.invoker_channel().await?;
        if target != me.channel_id {
            ctx.ensure_live()?;
            ctx.client().move_client(ctx.session.self_id, target).await?;
            info!(channel_id = %target, invoker = %ctx.invoker_name, "Bot joined invoker channel");
        }

        let label = match ctx.client().list_channels().await {
            Ok(channels) => channels
                .into_iter()
                .find(|c| c.id == target)
                .map(|c| c.name)
                .unwrap_or_else(|| target.to_string()),
            Err(_) => target.to_string(),
        };
        ctx.reply(&format!("Joined channel {label}")).await
    }

    fn failure_reply(&self) -> &'static str {
        "Failed to join channel."
    }
}

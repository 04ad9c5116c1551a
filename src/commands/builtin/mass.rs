//! Server-wide admin actions: mass poke, kick and move.
//!
//! Each action walks the client list once, pausing between remote calls so
//! the server's flood protection does not trip. The session is checked
//! before every call; a torn-down session aborts the walk.

use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;
use tsq_proto::{ClientInfo, KickScope};

use super::plural;
use crate::commands::{CommandContext, CommandHandler, CommandResult};

/// Pause after every remote call in a mass action.
const PACING: Duration = Duration::from_millis(100);

/// Regular clients other than the invoker.
fn targets<'c>(clients: &'c [ClientInfo], ctx: &CommandContext<'_>) -> impl Iterator<Item = &'c ClientInfo> {
    let invoker = ctx.invoker_id;
    clients
        .iter()
        .filter(move |c| !c.is_query() && c.id != invoker)
}

fn failed_line(failed: usize) -> String {
    if failed > 0 {
        format!("\nFailed: {failed}")
    } else {
        String::new()
    }
}

/// Pokes every regular client with a message.
pub struct MassPokeHandler;

#[async_trait]
impl CommandHandler for MassPokeHandler {
    async fn handle(&self, ctx: &CommandContext<'_>) -> CommandResult {
        let message = ctx
            .remainder()
            .unwrap_or(ctx.defaults.mass_poke_message.as_str());
        let clients = ctx.clients().await?;

        let (mut poked, mut failed) = (0usize, 0usize);
        for client in targets(&clients, ctx) {
            ctx.ensure_live()?;
            match ctx.client().poke_client(client.id, message).await {
                Ok(()) => poked += 1,
                Err(e) => {
                    warn!(client_id = %client.id, invoker = %ctx.invoker_name, error = %e, "Failed to poke client");
                    failed += 1;
                }
            }
            tokio::time::sleep(PACING).await;
        }

        ctx.reply(&format!(
            "Mass poke sent to {poked} client{} with message: \"{message}\"{}",
            plural(poked),
            failed_line(failed)
        ))
        .await
    }

    fn failure_reply(&self) -> &'static str {
        "Failed to execute mass poke."
    }
}

/// Kicks every regular client from the server.
pub struct MassKickHandler;

#[async_trait]
impl CommandHandler for MassKickHandler {
    async fn handle(&self, ctx: &CommandContext<'_>) -> CommandResult {
        let reason = ctx
            .remainder()
            .unwrap_or(ctx.defaults.mass_kick_reason.as_str());
        let clients = ctx.clients().await?;

        let mut failed = 0usize;
        for client in targets(&clients, ctx) {
            ctx.ensure_live()?;
            if let Err(e) = ctx
                .client()
                .kick_client(client.id, KickScope::Server, reason)
                .await
            {
                warn!(client_id = %client.id, invoker = %ctx.invoker_name, error = %e, "Failed to kick client");
                failed += 1;
            }
            tokio::time::sleep(PACING).await;
        }

        ctx.reply(&format!(
            "Mass kick executed with reason: {reason}{}",
            failed_line(failed)
        ))
        .await
    }

    fn failure_reply(&self) -> &'static str {
        "Failed to execute mass kick."
    }
}

/// Moves every regular client into the first channel whose name contains
/// the argument.
pub struct MassMoveHandler;

#[async_trait]
impl CommandHandler for MassMoveHandler {
    async fn handle(&self, ctx: &CommandContext<'_>) -> CommandResult {
        if ctx.args.is_empty() {
            return ctx.reply("Please specify a channel name!").await;
        }
        let query = ctx.args.join(" ");

        ctx.ensure_live()?;
        let needle = query.to_lowercase();
        let channels = ctx.client().list_channels().await?;
        let Some(channel) = channels
            .iter()
            .find(|c| c.name.to_lowercase().contains(&needle))
        else {
            return ctx.reply(&format!("Channel \"{query}\" not found!")).await;
        };

        let clients = ctx.clients().await?;
        let (mut moved, mut skipped, mut failed) = (0usize, 0usize, 0usize);
        for client in &clients {
            if client.is_query() || client.id == ctx.invoker_id || client.channel_id == channel.id {
                skipped += 1;
                continue;
            }
            ctx.ensure_live()?;
            match ctx.client().move_client(client.id, channel.id).await {
                Ok(()) => moved += 1,
                Err(e) => {
                    warn!(client_id = %client.id, channel_id = %channel.id, error = %e, "Failed to move client");
                    failed += 1;
                }
            }
            tokio::time::sleep(PACING).await;
        }

        ctx.reply(&format!(
            "Channel: {}\nMoved: {moved} client{}\nSkipped: {skipped} (already in channel/query clients){}",
            channel.name,
            plural(moved),
            failed_line(failed)
        ))
        .await
    }

    fn failure_reply(&self) -> &'static str {
        "Failed to execute mass move."
    }
}

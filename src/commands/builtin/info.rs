//! Informational commands: ping, help.

use async_trait::async_trait;

use crate::commands::{CommandContext, CommandHandler, CommandResult};

/// Liveness check.
pub struct PingHandler;

#[async_trait]
impl CommandHandler for PingHandler {
    async fn handle(&self, ctx: &CommandContext<'_>) -> CommandResult {
        ctx.reply("Pong!").await
    }
}

/// Lists every registered command.
pub struct HelpHandler;

#[async_trait]
impl CommandHandler for HelpHandler {
    async fn handle(&self, ctx: &CommandContext<'_>) -> CommandResult {
        let mut text = String::from("Available commands:");
        for descriptor in ctx.registry.iter() {
            text.push_str(&format!(
                "\n{}{} - {}",
                ctx.prefix, descriptor.name, descriptor.description
            ));
            if let Some(example) = &descriptor.example {
                text.push_str(&format!("\n  Example: {example}"));
            }
        }
        ctx.reply(&text).await
    }

    fn failure_reply(&self) -> &'static str {
        "Failed to list commands."
    }
}

//! Inbound chat message dispatch.

use std::sync::Arc;

use tracing::{Instrument, Level, debug, error, info, span};
use tsq_proto::{ClientId, TextMessage};

use super::context::CommandContext;
use super::handler_for;
use super::registry::CommandRegistry;
use crate::config::DefaultsConfig;
use crate::error::CommandError;
use crate::session::SessionHandle;

/// A prefixed message split into command name and arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation<'a> {
    /// Case-folded command name.
    pub name: String,
    /// Text after the name, untrimmed inside.
    pub remainder: &'a str,
}

/// Split `message` into an [`Invocation`] if it carries `prefix`.
pub fn parse<'a>(message: &'a str, prefix: &str) -> Option<Invocation<'a>> {
    let body = message.strip_prefix(prefix)?.trim();
    let (name, remainder) = body
        .split_once(char::is_whitespace)
        .unwrap_or((body, ""));
    if name.is_empty() {
        return None;
    }
    Some(Invocation {
        name: name.to_lowercase(),
        remainder: remainder.trim(),
    })
}

/// Routes chat messages of one session to command handlers.
pub struct Dispatcher {
    registry: Arc<CommandRegistry>,
    prefix: String,
    defaults: Arc<DefaultsConfig>,
    session: SessionHandle,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<CommandRegistry>,
        prefix: String,
        defaults: Arc<DefaultsConfig>,
        session: SessionHandle,
    ) -> Self {
        Self {
            registry,
            prefix,
            defaults,
            session,
        }
    }

    /// Handle one inbound text message. Never fails.
    pub async fn handle(&self, message: &TextMessage) {
        if message.invoker_id == self.session.self_id {
            return;
        }
        let Some(invocation) = parse(&message.message, &self.prefix) else {
            return;
        };

        let Some(descriptor) = self.registry.resolve(&invocation.name) else {
            debug!(command = %invocation.name, invoker = %message.invoker_id, "Unknown command");
            self.send(
                message.invoker_id,
                &format!("Unknown command: {}", invocation.name),
            )
            .await;
            return;
        };

        let ctx = CommandContext::new(
            message.invoker_id,
            &message.invoker_name,
            invocation.remainder,
            &self.prefix,
            &self.session,
            &self.registry,
            &self.defaults,
        );

        let command_span = span!(
            Level::DEBUG,
            "bot.command",
            command = %descriptor.name,
            handler = %descriptor.handler,
            invoker = %message.invoker_id,
            invoker_name = %message.invoker_name,
        );

        let handler = handler_for(descriptor.handler);
        match handler.handle(&ctx).instrument(command_span).await {
            Ok(()) => debug!(command = %descriptor.name, "Command completed"),
            Err(CommandError::SessionEnded) => {
                info!(command = %descriptor.name, "Command aborted, session ended");
            }
            Err(e) => {
                error!(command = %descriptor.name, invoker = %message.invoker_id, error = %e, "Command failed");
                if self.session.is_live() {
                    self.send(message.invoker_id, handler.failure_reply()).await;
                }
            }
        }
    }

    async fn send(&self, target: ClientId, text: &str) {
        if let Err(e) = self.session.client.send_private_message(target, text).await {
            debug!(target = %target, error = %e, "Failed to deliver reply");
        }
    }
}

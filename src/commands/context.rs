//! Per-invocation handler context.

use tsq_proto::{ChannelId, ClientId, ClientInfo, QueryClient};

use super::registry::CommandRegistry;
use crate::config::DefaultsConfig;
use crate::error::CommandError;
use crate::session::SessionHandle;

/// Everything a handler may use while serving one chat command.
///
/// The invoker's channel is not a field: text notifications carry no channel
/// id, and the invoker may have moved since sending. Handlers that need it
/// call [`CommandContext::invoker_channel`], which asks the server.
pub struct CommandContext<'a> {
    /// Client that sent the command.
    pub invoker_id: ClientId,
    pub invoker_name: &'a str,
    /// Whitespace-separated arguments after the name.
    pub args: Vec<&'a str>,
    remainder: &'a str,
    pub prefix: &'a str,
    pub session: &'a SessionHandle,
    pub registry: &'a CommandRegistry,
    pub defaults: &'a DefaultsConfig,
}

impl<'a> CommandContext<'a> {
    pub fn new(
        invoker_id: ClientId,
        invoker_name: &'a str,
        remainder: &'a str,
        prefix: &'a str,
        session: &'a SessionHandle,
        registry: &'a CommandRegistry,
        defaults: &'a DefaultsConfig,
    ) -> Self {
        Self {
            invoker_id,
            invoker_name,
            args: remainder.split_whitespace().collect(),
            remainder,
            prefix,
            session,
            registry,
            defaults,
        }
    }

    /// Argument text after the command name, or `None` if there is none.
    pub fn remainder(&self) -> Option<&'a str> {
        Some(self.remainder.trim()).filter(|r| !r.is_empty())
    }

    pub fn client(&self) -> &dyn QueryClient {
        self.session.client.as_ref()
    }

    /// Send a private message to the invoker.
    pub async fn reply(&self, text: &str) -> Result<(), CommandError> {
        self.client()
            .send_private_message(self.invoker_id, text)
            .await?;
        Ok(())
    }

    /// Fail with [`CommandError::SessionEnded`] once the session is gone.
    pub fn ensure_live(&self) -> Result<(), CommandError> {
        if self.session.is_live() {
            Ok(())
        } else {
            Err(CommandError::SessionEnded)
        }
    }

    /// Current client list. Fails if the session ended.
    pub async fn clients(&self) -> Result<Vec<ClientInfo>, CommandError> {
        self.ensure_live()?;
        Ok(self.client().list_clients().await?)
    }

    /// Channel the invoker sits in right now.
    pub async fn invoker_channel(&self) -> Result<ChannelId, CommandError> {
        self.clients()
            .await?
            .into_iter()
            .find(|c| c.id == self.invoker_id)
            .map(|c| c.channel_id)
            .ok_or(CommandError::InvokerGone(self.invoker_id))
    }
}

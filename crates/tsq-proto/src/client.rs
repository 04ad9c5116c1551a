//! Capability interface for a ServerQuery session.
//!
//! Consumers program against [`QueryConnector`] and [`QueryClient`] so that
//! the TCP implementation in [`crate::transport`] can be replaced by an
//! in-process double in tests.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::Result;
use crate::event::QueryEvent;
use crate::types::{
    ChannelId, ChannelInfo, ChannelProps, ClientId, ClientInfo, ClientProperties, ConnectParams,
    EventCategory, KickScope, VirtualServer, WhoAmI,
};

/// Operations available on an authenticated query connection.
#[async_trait]
pub trait QueryClient: Send + Sync {
    /// Select the virtual server to operate on.
    ///
    /// The display name from [`ConnectParams::nickname`] is applied here, so a
    /// name collision surfaces as an error from this call.
    async fn select_context(&self, server: VirtualServer) -> Result<()>;

    /// Subscribe to a notification category.
    async fn register_events(&self, category: EventCategory) -> Result<()>;

    /// Own identity on the selected server.
    async fn whoami(&self) -> Result<WhoAmI>;

    /// Update own client flags.
    async fn update_self(&self, props: &ClientProperties) -> Result<()>;

    /// Send a private text message.
    async fn send_private_message(&self, target: ClientId, text: &str) -> Result<()>;

    /// Send a text message to the current channel.
    async fn send_channel_message(&self, text: &str) -> Result<()>;

    /// All clients on the selected server.
    async fn list_clients(&self) -> Result<Vec<ClientInfo>>;

    /// All channels on the selected server.
    async fn list_channels(&self) -> Result<Vec<ChannelInfo>>;

    /// Create a channel.
    async fn create_channel(&self, name: &str, props: &ChannelProps) -> Result<ChannelInfo>;

    /// Delete a channel, even if occupied.
    async fn delete_channel(&self, id: ChannelId) -> Result<()>;

    /// Move a client into a channel.
    async fn move_client(&self, client: ClientId, channel: ChannelId) -> Result<()>;

    /// Kick a client from its channel or from the server.
    async fn kick_client(&self, client: ClientId, scope: KickScope, reason: &str) -> Result<()>;

    /// Poke a client with a popup message.
    async fn poke_client(&self, client: ClientId, text: &str) -> Result<()>;

    /// Log out and close the connection.
    async fn quit(&self) -> Result<()>;

    /// Whether the transport is still open.
    fn is_connected(&self) -> bool;
}

/// An authenticated connection and its event stream.
///
/// Dropping `events` unsubscribes from the stream; the connection itself
/// stays open until [`QueryClient::quit`] or the server closes it.
pub struct Connection {
    /// Command handle.
    pub client: Arc<dyn QueryClient>,
    /// Notifications, ending with [`QueryEvent::Closed`].
    pub events: mpsc::UnboundedReceiver<QueryEvent>,
}

/// Opens and authenticates query connections.
#[async_trait]
pub trait QueryConnector: Send + Sync {
    /// Connect the transport and log in.
    async fn connect(&self, params: &ConnectParams) -> Result<Connection>;
}

//! # tsq-proto
//!
//! A Rust library for talking to the TeamSpeak 3 ServerQuery interface.
//!
//! ## Features
//!
//! - Value escaping and `key=value` record parsing
//! - `error id= msg=` status lines mapped to typed errors
//! - Typed `notify*` events delivered over a channel
//! - A capability interface ([`QueryClient`], [`QueryConnector`]) with an
//!   async TCP implementation ([`ServerQueryConnector`])

#![deny(clippy::all)]
#![warn(missing_docs)]

//! ## Quick Start
//!
//! ```no_run
//! use tsq_proto::{ConnectParams, QueryConnector, ServerQueryConnector, ServerId, VirtualServer};
//!
//! # async fn run() -> tsq_proto::Result<()> {
//! let connector = ServerQueryConnector::default();
//! let mut conn = connector
//!     .connect(&ConnectParams {
//!         host: "127.0.0.1".into(),
//!         port: 10011,
//!         username: "serveradmin".into(),
//!         password: "secret".into(),
//!         nickname: Some("Bert The Bot".into()),
//!     })
//!     .await?;
//!
//! conn.client.select_context(VirtualServer::Id(ServerId(1))).await?;
//! for client in conn.client.list_clients().await? {
//!     println!("{} {}", client.id, client.nickname);
//! }
//! while let Some(event) = conn.events.recv().await {
//!     println!("{event:?}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod command;
pub mod error;
pub mod escape;
pub mod event;
pub mod line;
pub mod record;
pub mod transport;
pub mod types;

pub use self::client::{Connection, QueryClient, QueryConnector};
pub use self::command::Command;
pub use self::error::{QueryError, Result};
pub use self::event::{QueryEvent, TextMessage, TextTarget};
pub use self::line::LineCodec;
pub use self::record::{Record, Status};
pub use self::transport::{ServerQueryClient, ServerQueryConnector};
pub use self::types::{
    ChannelId, ChannelInfo, ChannelProps, ClientId, ClientInfo, ClientKind, ClientProperties,
    ConnectParams, EventCategory, KickScope, ServerId, VirtualServer, WhoAmI,
};

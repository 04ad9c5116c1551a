//! Typed views over ServerQuery records.

use std::fmt;

use crate::command::Command;
use crate::error::Result;
use crate::record::Record;

macro_rules! id_newtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u32);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<u32> for $name {
            fn from(raw: u32) -> Self {
                Self(raw)
            }
        }
    };
}

id_newtype!(
    /// Per-connection client id (`clid`).
    ClientId
);
id_newtype!(
    /// Channel id (`cid`).
    ChannelId
);
id_newtype!(
    /// Virtual server id (`sid`).
    ServerId
);

/// Whether a client is a regular voice client or a query connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientKind {
    /// A human (or voice bot) connected through the voice protocol.
    Voice,
    /// A ServerQuery connection.
    Query,
}

impl ClientKind {
    /// Map the wire `client_type` value.
    pub fn from_wire(raw: u32) -> Self {
        if raw == 1 {
            Self::Query
        } else {
            Self::Voice
        }
    }
}

/// Entry of `clientlist`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientInfo {
    /// Client id.
    pub id: ClientId,
    /// Channel the client currently sits in.
    pub channel_id: ChannelId,
    /// Display name.
    pub nickname: String,
    /// Voice or query client.
    pub kind: ClientKind,
}

impl ClientInfo {
    /// Build from a `clientlist` record.
    pub fn from_record(record: &Record) -> Result<Self> {
        Ok(Self {
            id: ClientId(record.parse_field("clid")?),
            channel_id: ChannelId(record.parse_field("cid")?),
            nickname: record.get("client_nickname").unwrap_or_default().to_string(),
            kind: ClientKind::from_wire(record.parse_opt("client_type").unwrap_or(0)),
        })
    }

    /// Whether this is a query connection.
    pub fn is_query(&self) -> bool {
        self.kind == ClientKind::Query
    }
}

/// Entry of `channellist`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelInfo {
    /// Channel id.
    pub id: ChannelId,
    /// Parent channel id, 0 for top level.
    pub parent_id: ChannelId,
    /// Sort position (id of the channel above, 0 for first).
    pub order: u32,
    /// Channel name.
    pub name: String,
}

impl ChannelInfo {
    /// Build from a `channellist` record.
    pub fn from_record(record: &Record) -> Result<Self> {
        Ok(Self {
            id: ChannelId(record.parse_field("cid")?),
            parent_id: ChannelId(record.parse_opt("pid").unwrap_or(0)),
            order: record.parse_opt("channel_order").unwrap_or(0),
            name: record.get("channel_name").unwrap_or_default().to_string(),
        })
    }
}

/// Properties for `channelcreate`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelProps {
    /// Channel topic.
    pub topic: Option<String>,
    /// Channel description (BBCode allowed).
    pub description: Option<String>,
    /// Survive the creator leaving and server restarts.
    pub permanent: bool,
    /// Parent channel; 0 for top level.
    pub parent_id: ChannelId,
    /// Sort position; 0 puts the channel first.
    pub order: u32,
}

impl ChannelProps {
    pub(crate) fn apply(&self, cmd: Command) -> Command {
        let cmd = cmd
            .arg_opt("channel_topic", self.topic.as_deref())
            .arg_opt("channel_description", self.description.as_deref())
            .arg("cpid", self.parent_id)
            .arg("channel_order", self.order);
        if self.permanent {
            cmd.arg("channel_flag_permanent", 1)
        } else {
            cmd
        }
    }
}

/// Own-client flags set through `clientupdate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientProperties {
    /// Microphone muted.
    pub input_muted: bool,
    /// Speakers muted.
    pub output_muted: bool,
}

/// Reason scope for `clientkick`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KickScope {
    /// Kick to the default channel.
    Channel,
    /// Disconnect from the server.
    Server,
}

impl KickScope {
    /// Wire `reasonid`.
    pub fn reason_id(self) -> u32 {
        match self {
            Self::Channel => 4,
            Self::Server => 5,
        }
    }
}

/// The virtual server a query session operates on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VirtualServer {
    /// Select by server id (`use sid=`).
    Id(ServerId),
    /// Select by voice port (`use port=`).
    Port(u16),
}

/// Notification categories for `servernotifyregister`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventCategory {
    /// Clients joining/leaving the server.
    Server,
    /// Channel-level events for every channel.
    Channel,
    /// Server-wide chat.
    TextServer,
    /// Chat in the current channel.
    TextChannel,
    /// Private chat.
    TextPrivate,
}

impl EventCategory {
    /// Wire `event=` value.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Server => "server",
            Self::Channel => "channel",
            Self::TextServer => "textserver",
            Self::TextChannel => "textchannel",
            Self::TextPrivate => "textprivate",
        }
    }
}

/// Reply of `whoami`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WhoAmI {
    /// Own client id; `None` before a virtual server is selected.
    pub client_id: Option<ClientId>,
    /// Channel the query client sits in.
    pub channel_id: ChannelId,
    /// Own display name.
    pub nickname: String,
}

impl WhoAmI {
    /// Build from a `whoami` record.
    pub fn from_record(record: &Record) -> Self {
        Self {
            client_id: record
                .parse_opt::<u32>("client_id")
                .filter(|id| *id != 0)
                .map(ClientId),
            channel_id: ChannelId(record.parse_opt("client_channel_id").unwrap_or(0)),
            nickname: record.get("client_nickname").unwrap_or_default().to_string(),
        }
    }
}

/// Transport and login parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectParams {
    /// Server host name or address.
    pub host: String,
    /// Query port.
    pub port: u16,
    /// Query login name.
    pub username: String,
    /// Query login password.
    pub password: String,
    /// Display name applied when selecting the virtual server.
    pub nickname: Option<String>,
}

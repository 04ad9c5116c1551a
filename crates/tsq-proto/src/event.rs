//! Asynchronous `notify*` events.

use crate::error::Result;
use crate::record::Record;
use crate::types::{ChannelId, ClientId, ClientKind};

/// Scope a text message was sent in (`targetmode`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextTarget {
    /// Direct message to a client.
    Private,
    /// Message to the current channel.
    Channel,
    /// Server-wide chat.
    Server,
}

impl TextTarget {
    /// Map the wire `targetmode` value.
    pub fn from_wire(raw: u32) -> Option<Self> {
        match raw {
            1 => Some(Self::Private),
            2 => Some(Self::Channel),
            3 => Some(Self::Server),
            _ => None,
        }
    }
}

/// Body of `notifytextmessage`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextMessage {
    /// Where the message was sent.
    pub target: TextTarget,
    /// Message text.
    pub message: String,
    /// Sender client id.
    pub invoker_id: ClientId,
    /// Sender display name.
    pub invoker_name: String,
    /// Sender unique identity, when reported.
    pub invoker_uid: Option<String>,
}

/// Events pushed by the server outside of command replies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryEvent {
    /// Chat message received.
    TextMessage(TextMessage),
    /// A client connected or became visible.
    ClientEntered {
        /// Client id.
        client_id: ClientId,
        /// Channel the client entered.
        channel_id: ChannelId,
        /// Display name.
        nickname: String,
        /// Voice or query client.
        kind: ClientKind,
    },
    /// A client disconnected or left view.
    ClientLeft {
        /// Client id.
        client_id: ClientId,
        /// Leave reason, when given.
        reason: Option<String>,
    },
    /// The transport closed. Always the last event of a connection.
    Closed {
        /// Why the connection ended, when known.
        reason: Option<String>,
    },
    /// The transport reported an error; the connection may still be usable.
    Error(String),
}

impl QueryEvent {
    /// Parse a `notify*` line.
    ///
    /// Returns `Ok(None)` for notifications this crate does not model.
    pub fn from_notify(line: &str) -> Result<Option<Self>> {
        let (name, rest) = line.split_once(' ').unwrap_or((line, ""));
        let record = Record::parse(rest);

        let event = match name {
            "notifytextmessage" => {
                let Some(target) = TextTarget::from_wire(record.parse_field("targetmode")?) else {
                    return Ok(None);
                };
                QueryEvent::TextMessage(TextMessage {
                    target,
                    message: record.get("msg").unwrap_or_default().to_string(),
                    invoker_id: ClientId(record.parse_field("invokerid")?),
                    invoker_name: record.get("invokername").unwrap_or_default().to_string(),
                    invoker_uid: record.get("invokeruid").map(str::to_string),
                })
            }
            "notifycliententerview" => QueryEvent::ClientEntered {
                client_id: ClientId(record.parse_field("clid")?),
                channel_id: ChannelId(record.parse_opt("ctid").unwrap_or(0)),
                nickname: record.get("client_nickname").unwrap_or_default().to_string(),
                kind: ClientKind::from_wire(record.parse_opt("client_type").unwrap_or(0)),
            },
            "notifyclientleftview" => QueryEvent::ClientLeft {
                client_id: ClientId(record.parse_field("clid")?),
                reason: record
                    .get("reasonmsg")
                    .filter(|r| !r.is_empty())
                    .map(str::to_string),
            },
            _ => return Ok(None),
        };
        Ok(Some(event))
    }
}

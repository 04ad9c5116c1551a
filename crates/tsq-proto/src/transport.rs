//! ServerQuery over plain TCP.
//!
//! One reader task per connection splits incoming lines into command replies
//! and `notify*` events. Commands are strictly sequential: the wire lock is
//! held from sending a command until its status line arrives.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::{Mutex, mpsc};
use tokio::time::timeout;
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::client::{Connection, QueryClient, QueryConnector};
use crate::command::Command;
use crate::error::{QueryError, Result};
use crate::event::QueryEvent;
use crate::line::LineCodec;
use crate::record::{Record, Status, parse_records};
use crate::types::{
    ChannelId, ChannelInfo, ChannelProps, ClientId, ClientInfo, ClientProperties, ConnectParams,
    EventCategory, KickScope, VirtualServer, WhoAmI,
};

/// First line a ServerQuery endpoint sends.
const BANNER: &str = "TS3";

/// Connection factory for real ServerQuery endpoints.
#[derive(Debug, Clone)]
pub struct ServerQueryConnector {
    /// Limit for TCP connect and banner.
    pub connect_timeout: Duration,
    /// Limit for a single command round trip.
    pub command_timeout: Duration,
    /// Idle interval after which a no-op command is sent.
    ///
    /// Servers drop query sessions idle for five minutes. Zero disables it.
    pub keepalive_interval: Duration,
}

impl Default for ServerQueryConnector {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            command_timeout: Duration::from_secs(10),
            keepalive_interval: Duration::from_secs(180),
        }
    }
}

enum ReplyLine {
    Data(String),
    Status(Status),
}

struct Wire {
    writer: FramedWrite<OwnedWriteHalf, LineCodec>,
    replies: mpsc::UnboundedReceiver<ReplyLine>,
}

/// An authenticated ServerQuery connection.
pub struct ServerQueryClient {
    wire: Mutex<Wire>,
    connected: Arc<AtomicBool>,
    shutdown: CancellationToken,
    nickname: Option<String>,
    command_timeout: Duration,
}

#[async_trait]
impl QueryConnector for ServerQueryConnector {
    async fn connect(&self, params: &ConnectParams) -> Result<Connection> {
        let stream = timeout(
            self.connect_timeout,
            TcpStream::connect((params.host.as_str(), params.port)),
        )
        .await
        .map_err(|_| QueryError::Timeout("connect"))??;
        stream.set_nodelay(true)?;

        let (read_half, write_half) = stream.into_split();
        let mut reader = FramedRead::new(read_half, LineCodec::new());
        timeout(self.connect_timeout, read_banner(&mut reader))
            .await
            .map_err(|_| QueryError::Timeout("banner"))??;

        let (event_tx, events) = mpsc::unbounded_channel();
        let (reply_tx, replies) = mpsc::unbounded_channel();
        let connected = Arc::new(AtomicBool::new(true));
        let shutdown = CancellationToken::new();

        tokio::spawn(read_loop(
            reader,
            reply_tx,
            event_tx,
            connected.clone(),
            shutdown.clone(),
        ));

        let client = Arc::new(ServerQueryClient {
            wire: Mutex::new(Wire {
                writer: FramedWrite::new(write_half, LineCodec::new()),
                replies,
            }),
            connected,
            shutdown,
            nickname: params.nickname.clone(),
            command_timeout: self.command_timeout,
        });

        client
            .execute(
                Command::new("login")
                    .arg("client_login_name", &params.username)
                    .arg("client_login_password", &params.password),
            )
            .await?;
        debug!(host = %params.host, port = params.port, "ServerQuery login accepted");

        spawn_keepalive(Arc::downgrade(&client), self.keepalive_interval);

        Ok(Connection { client, events })
    }
}

async fn next_line(reader: &mut FramedRead<OwnedReadHalf, LineCodec>) -> Result<String> {
    loop {
        match reader.next().await {
            Some(Ok(line)) if line.is_empty() => continue,
            Some(Ok(line)) => return Ok(line),
            Some(Err(e)) => return Err(e),
            None => return Err(QueryError::Closed),
        }
    }
}

async fn read_banner(reader: &mut FramedRead<OwnedReadHalf, LineCodec>) -> Result<()> {
    let first = next_line(reader).await?;
    if first != BANNER {
        return Err(QueryError::Protocol(format!(
            "unexpected banner {first:?}, is this a ServerQuery port?"
        )));
    }
    // Welcome text.
    next_line(reader).await?;
    Ok(())
}

async fn read_loop(
    mut reader: FramedRead<OwnedReadHalf, LineCodec>,
    replies: mpsc::UnboundedSender<ReplyLine>,
    events: mpsc::UnboundedSender<QueryEvent>,
    connected: Arc<AtomicBool>,
    shutdown: CancellationToken,
) {
    let reason = loop {
        let next = tokio::select! {
            _ = shutdown.cancelled() => break Some("closed locally".to_string()),
            next = reader.next() => next,
        };

        match next {
            Some(Ok(line)) => {
                if line.is_empty() {
                    continue;
                }
                if line.starts_with("notify") {
                    match QueryEvent::from_notify(&line) {
                        Ok(Some(event)) => {
                            let _ = events.send(event);
                        }
                        Ok(None) => trace!(line = %line, "Ignoring notification"),
                        Err(e) => warn!(error = %e, "Malformed notification"),
                    }
                } else if let Some(status) = Status::parse(&line) {
                    let _ = replies.send(ReplyLine::Status(status));
                } else {
                    let _ = replies.send(ReplyLine::Data(line));
                }
            }
            Some(Err(e)) => {
                let _ = events.send(QueryEvent::Error(e.to_string()));
                break Some(e.to_string());
            }
            None => break None,
        }
    };

    connected.store(false, Ordering::SeqCst);
    debug!(reason = ?reason, "ServerQuery reader stopped");
    let _ = events.send(QueryEvent::Closed { reason });
}

fn spawn_keepalive(client: Weak<ServerQueryClient>, interval: Duration) {
    if interval.is_zero() {
        warn!("Keepalive disabled by a zero interval");
        return;
    }
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // First tick completes immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let Some(client) = client.upgrade() else {
                break;
            };
            if !client.is_connected() {
                break;
            }
            if let Err(e) = client.execute(Command::new("whoami")).await {
                debug!(error = %e, "Keepalive failed");
            }
        }
    });
}

impl ServerQueryClient {
    /// Send one command and collect its data records.
    pub async fn execute(&self, command: Command) -> Result<Vec<Record>> {
        if !self.is_connected() {
            return Err(QueryError::Closed);
        }

        let mut wire = self.wire.lock().await;
        trace!(command = command.name(), "Sending command");
        wire.writer.send(command.to_string()).await?;

        let mut records = Vec::new();
        loop {
            match timeout(self.command_timeout, wire.replies.recv()).await {
                Err(_) => {
                    // A late reply would be taken as the answer to the next command.
                    self.connected.store(false, Ordering::SeqCst);
                    self.shutdown.cancel();
                    return Err(QueryError::Timeout(command.name()));
                }
                Ok(None) => return Err(QueryError::Closed),
                Ok(Some(ReplyLine::Data(line))) => records.extend(parse_records(&line)),
                Ok(Some(ReplyLine::Status(status))) => {
                    return status.into_result().map(|()| records);
                }
            }
        }
    }

    async fn execute_list(&self, command: Command) -> Result<Vec<Record>> {
        match self.execute(command).await {
            Err(e) if e.is_empty_result() => Ok(Vec::new()),
            other => other,
        }
    }
}

impl Drop for ServerQueryClient {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

#[async_trait]
impl QueryClient for ServerQueryClient {
    async fn select_context(&self, server: VirtualServer) -> Result<()> {
        let cmd = match server {
            VirtualServer::Id(sid) => Command::new("use").arg("sid", sid),
            VirtualServer::Port(port) => Command::new("use").arg("port", port),
        };
        self.execute(cmd.arg_opt("client_nickname", self.nickname.as_deref()))
            .await
            .map(|_| ())
    }

    async fn register_events(&self, category: EventCategory) -> Result<()> {
        let cmd = Command::new("servernotifyregister").arg("event", category.as_str());
        let cmd = match category {
            EventCategory::Channel => cmd.arg("id", 0),
            _ => cmd,
        };
        self.execute(cmd).await.map(|_| ())
    }

    async fn whoami(&self) -> Result<WhoAmI> {
        let records = self.execute(Command::new("whoami")).await?;
        records
            .first()
            .map(WhoAmI::from_record)
            .ok_or_else(|| QueryError::Protocol("empty whoami reply".to_string()))
    }

    async fn update_self(&self, props: &ClientProperties) -> Result<()> {
        let cmd = Command::new("clientupdate")
            .arg("client_input_muted", u8::from(props.input_muted))
            .arg("client_output_muted", u8::from(props.output_muted));
        self.execute(cmd).await.map(|_| ())
    }

    async fn send_private_message(&self, target: ClientId, text: &str) -> Result<()> {
        let cmd = Command::new("sendtextmessage")
            .arg("targetmode", 1)
            .arg("target", target)
            .arg("msg", text);
        self.execute(cmd).await.map(|_| ())
    }

    async fn send_channel_message(&self, text: &str) -> Result<()> {
        let me = self.whoami().await?;
        let cmd = Command::new("sendtextmessage")
            .arg("targetmode", 2)
            .arg("target", me.channel_id)
            .arg("msg", text);
        self.execute(cmd).await.map(|_| ())
    }

    async fn list_clients(&self) -> Result<Vec<ClientInfo>> {
        self.execute_list(Command::new("clientlist"))
            .await?
            .iter()
            .map(ClientInfo::from_record)
            .collect()
    }

    async fn list_channels(&self) -> Result<Vec<ChannelInfo>> {
        self.execute_list(Command::new("channellist"))
            .await?
            .iter()
            .map(ChannelInfo::from_record)
            .collect()
    }

    async fn create_channel(&self, name: &str, props: &ChannelProps) -> Result<ChannelInfo> {
        let cmd = props.apply(Command::new("channelcreate").arg("channel_name", name));
        let records = self.execute(cmd).await?;
        let record = records
            .first()
            .ok_or_else(|| QueryError::Protocol("channelcreate returned no cid".to_string()))?;
        Ok(ChannelInfo {
            id: ChannelId(record.parse_field("cid")?),
            parent_id: props.parent_id,
            order: props.order,
            name: name.to_string(),
        })
    }

    async fn delete_channel(&self, id: ChannelId) -> Result<()> {
        let cmd = Command::new("channeldelete").arg("cid", id).arg("force", 1);
        self.execute(cmd).await.map(|_| ())
    }

    async fn move_client(&self, client: ClientId, channel: ChannelId) -> Result<()> {
        let cmd = Command::new("clientmove")
            .arg("clid", client)
            .arg("cid", channel);
        self.execute(cmd).await.map(|_| ())
    }

    async fn kick_client(&self, client: ClientId, scope: KickScope, reason: &str) -> Result<()> {
        let cmd = Command::new("clientkick")
            .arg("clid", client)
            .arg("reasonid", scope.reason_id())
            .arg("reasonmsg", reason);
        self.execute(cmd).await.map(|_| ())
    }

    async fn poke_client(&self, client: ClientId, text: &str) -> Result<()> {
        let cmd = Command::new("clientpoke").arg("clid", client).arg("msg", text);
        self.execute(cmd).await.map(|_| ())
    }

    async fn quit(&self) -> Result<()> {
        let result = self.execute(Command::new("quit")).await.map(|_| ());
        self.connected.store(false, Ordering::SeqCst);
        self.shutdown.cancel();
        result
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

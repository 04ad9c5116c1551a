//! In-process ServerQuery double for session, dispatch and HTTP tests.
//!
//! [`MockServer`] keeps a client and channel table, records every call made
//! through its connections, and can be scripted to refuse connects or fail
//! individual operations.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::{Mutex, MutexGuard};
use tokio::sync::mpsc;
use tsq_proto::{
    ChannelId, ChannelInfo, ChannelProps, ClientId, ClientInfo, ClientKind, ClientProperties,
    ConnectParams, Connection, EventCategory, KickScope, QueryClient, QueryConnector, QueryError,
    QueryEvent, Result, TextMessage, TextTarget, VirtualServer, WhoAmI,
};

use crate::commands::{CommandRegistry, Dispatcher};
use crate::config::DefaultsConfig;
use crate::db::Credentials;
use crate::session::{SessionHandle, Sleeper};

/// Channel every client starts in.
pub const DEFAULT_CHANNEL: ChannelId = ChannelId(1);

/// A call that reached the mock server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Connect { nickname: Option<String> },
    SelectContext(VirtualServer),
    RegisterEvents(EventCategory),
    UpdateSelf(ClientProperties),
    PrivateMessage { target: ClientId, text: String },
    ChannelMessage(String),
    CreateChannel(String),
    DeleteChannel(ChannelId),
    Move { client: ClientId, channel: ChannelId },
    Kick { client: ClientId, scope: KickScope, reason: String },
    Poke { client: ClientId, text: String },
    Quit { client: ClientId },
}

struct LiveConnection {
    connected: Arc<AtomicBool>,
    events: mpsc::UnboundedSender<QueryEvent>,
}

/// Server tables and failure switches.
pub struct MockState {
    clients: Vec<ClientInfo>,
    channels: Vec<ChannelInfo>,
    connections: HashMap<ClientId, LiveConnection>,
    next_client: u32,
    next_channel: u32,
    calls: Vec<Call>,
    kicked: Vec<ClientId>,
    /// Refuse this many upcoming connects.
    pub connect_failures: u32,
    /// Withhold the client id from `whoami` on this many named connections.
    pub withhold_identity: u32,
    /// Every kick fails.
    pub fail_kicks: bool,
    /// `list_clients` fails.
    pub fail_list_clients: bool,
    /// Poke, kick and move fail for these clients.
    pub fail_for: HashSet<ClientId>,
    /// `register_events` fails.
    pub fail_register_events: bool,
    /// Channel create and delete take this long.
    pub channel_delay: Option<Duration>,
}

impl MockState {
    fn allocate_client(&mut self) -> ClientId {
        let id = ClientId(self.next_client);
        self.next_client += 1;
        id
    }

    fn allocate_channel(&mut self) -> ChannelId {
        let id = ChannelId(self.next_channel);
        self.next_channel += 1;
        id
    }

    fn client_mut(&mut self, id: ClientId) -> Option<&mut ClientInfo> {
        self.clients.iter_mut().find(|c| c.id == id)
    }

    fn drop_client(&mut self, id: ClientId) {
        self.clients.retain(|c| c.id != id);
        if let Some(conn) = self.connections.remove(&id) {
            conn.connected.store(false, Ordering::SeqCst);
        }
    }
}

fn server_error(id: u32, message: &str) -> QueryError {
    QueryError::Server {
        id,
        message: message.to_string(),
    }
}

/// Shared handle to the simulated server.
#[derive(Clone)]
pub struct MockServer {
    state: Arc<Mutex<MockState>>,
}

impl MockServer {
    pub fn new() -> Self {
        let state = MockState {
            clients: Vec::new(),
            channels: vec![ChannelInfo {
                id: DEFAULT_CHANNEL,
                parent_id: ChannelId(0),
                order: 0,
                name: "Default Channel".to_string(),
            }],
            connections: HashMap::new(),
            next_client: 1,
            next_channel: 2,
            calls: Vec::new(),
            kicked: Vec::new(),
            connect_failures: 0,
            withhold_identity: 0,
            fail_kicks: false,
            fail_list_clients: false,
            fail_for: HashSet::new(),
            fail_register_events: false,
            channel_delay: None,
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    pub fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock()
    }

    pub fn connector(&self) -> MockConnector {
        MockConnector {
            server: self.clone(),
        }
    }

    /// Add a client that is not backed by a connection.
    pub fn add_client(&self, nickname: &str, kind: ClientKind) -> ClientId {
        self.add_client_in(nickname, kind, DEFAULT_CHANNEL)
    }

    pub fn add_client_in(&self, nickname: &str, kind: ClientKind, channel: ChannelId) -> ClientId {
        let mut state = self.state();
        let id = state.allocate_client();
        state.clients.push(ClientInfo {
            id,
            channel_id: channel,
            nickname: nickname.to_string(),
            kind,
        });
        id
    }

    pub fn add_channel(&self, name: &str) -> ChannelId {
        let mut state = self.state();
        let id = state.allocate_channel();
        state.channels.push(ChannelInfo {
            id,
            parent_id: ChannelId(0),
            order: id.0,
            name: name.to_string(),
        });
        id
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state().calls.clone()
    }

    pub fn clients(&self) -> Vec<ClientInfo> {
        self.state().clients.clone()
    }

    pub fn client(&self, id: ClientId) -> Option<ClientInfo> {
        self.state().clients.iter().find(|c| c.id == id).cloned()
    }

    pub fn channels(&self) -> Vec<ChannelInfo> {
        self.state().channels.clone()
    }

    /// Clients removed by a successful kick.
    pub fn kicked(&self) -> Vec<ClientId> {
        self.state().kicked.clone()
    }

    /// Private messages sent to `to`, in order.
    pub fn replies_to(&self, to: ClientId) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::PrivateMessage { target, text } if target == to => Some(text),
                _ => None,
            })
            .collect()
    }

    /// Connect and select the server under `nickname`, like a bot session.
    pub async fn live_session(&self, nickname: &str) -> SessionHandle {
        let conn = self
            .connector()
            .connect(&sample_credentials().connect_params(Some(nickname.to_string())))
            .await
            .expect("mock connect");
        conn.client
            .select_context(sample_credentials().target())
            .await
            .expect("mock select");
        let me = conn.client.whoami().await.expect("mock whoami");
        SessionHandle::new(conn.client, me.client_id.expect("mock client id"), None)
    }

    /// Push an event to the connection owned by `client`.
    pub fn emit(&self, client: ClientId, event: QueryEvent) {
        if let Some(conn) = self.state().connections.get(&client) {
            let _ = conn.events.send(event);
        }
    }

    /// Drop the connection owned by `client` as the server would.
    pub fn close_connection(&self, client: ClientId, reason: Option<&str>) {
        let mut state = self.state();
        if let Some(conn) = state.connections.remove(&client) {
            conn.connected.store(false, Ordering::SeqCst);
            let _ = conn.events.send(QueryEvent::Closed {
                reason: reason.map(str::to_string),
            });
        }
        state.clients.retain(|c| c.id != client);
    }
}

/// Connector handing out [`MockClient`]s.
pub struct MockConnector {
    server: MockServer,
}

#[async_trait]
impl QueryConnector for MockConnector {
    async fn connect(&self, params: &ConnectParams) -> Result<Connection> {
        let mut state = self.server.state();
        state.calls.push(Call::Connect {
            nickname: params.nickname.clone(),
        });
        if state.connect_failures > 0 {
            state.connect_failures -= 1;
            return Err(QueryError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "connection refused",
            )));
        }

        let id = state.allocate_client();
        let connected = Arc::new(AtomicBool::new(true));
        let (tx, rx) = mpsc::unbounded_channel();
        state.connections.insert(
            id,
            LiveConnection {
                connected: Arc::clone(&connected),
                events: tx,
            },
        );

        let client = MockClient {
            id,
            nickname: params.nickname.clone(),
            selected: AtomicBool::new(false),
            connected,
            server: self.server.clone(),
        };
        Ok(Connection {
            client: Arc::new(client),
            events: rx,
        })
    }
}

/// One simulated query connection.
pub struct MockClient {
    id: ClientId,
    nickname: Option<String>,
    selected: AtomicBool,
    connected: Arc<AtomicBool>,
    server: MockServer,
}

impl MockClient {
    /// Lock the server and record `call`, failing if this connection closed.
    fn begin(&self, call: Call) -> Result<MutexGuard<'_, MockState>> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(QueryError::Closed);
        }
        let mut state = self.server.state();
        state.calls.push(call);
        Ok(state)
    }

    fn record(&self, call: Call) -> Result<()> {
        self.begin(call).map(drop)
    }

    async fn channel_delay(&self) {
        let delay = self.server.state().channel_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl QueryClient for MockClient {
    async fn select_context(&self, server: VirtualServer) -> Result<()> {
        let mut state = self.begin(Call::SelectContext(server))?;
        let nickname = match &self.nickname {
            Some(name) => {
                if state.clients.iter().any(|c| &c.nickname == name) {
                    return Err(server_error(513, "nickname is already in use"));
                }
                name.clone()
            }
            None => "serveradmin".to_string(),
        };
        state.clients.push(ClientInfo {
            id: self.id,
            channel_id: DEFAULT_CHANNEL,
            nickname,
            kind: ClientKind::Query,
        });
        self.selected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn register_events(&self, category: EventCategory) -> Result<()> {
        let state = self.begin(Call::RegisterEvents(category))?;
        if state.fail_register_events {
            return Err(server_error(2568, "insufficient client permissions"));
        }
        Ok(())
    }

    async fn whoami(&self) -> Result<WhoAmI> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(QueryError::Closed);
        }
        let mut state = self.server.state();
        let listed = state.clients.iter().find(|c| c.id == self.id).cloned();
        let withhold = self.nickname.is_some() && state.withhold_identity > 0;
        if withhold {
            state.withhold_identity -= 1;
        }
        Ok(match listed {
            Some(me) if self.selected.load(Ordering::SeqCst) && !withhold => WhoAmI {
                client_id: Some(me.id),
                channel_id: me.channel_id,
                nickname: me.nickname,
            },
            _ => WhoAmI {
                client_id: None,
                channel_id: ChannelId(0),
                nickname: self.nickname.clone().unwrap_or_default(),
            },
        })
    }

    async fn update_self(&self, props: &ClientProperties) -> Result<()> {
        self.record(Call::UpdateSelf(*props))
    }

    async fn send_private_message(&self, target: ClientId, text: &str) -> Result<()> {
        self.record(Call::PrivateMessage {
            target,
            text: text.to_string(),
        })
    }

    async fn send_channel_message(&self, text: &str) -> Result<()> {
        self.record(Call::ChannelMessage(text.to_string()))
    }

    async fn list_clients(&self) -> Result<Vec<ClientInfo>> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(QueryError::Closed);
        }
        let state = self.server.state();
        if state.fail_list_clients {
            return Err(server_error(1281, "database empty result set"));
        }
        let mut clients = state.clients.clone();
        clients.sort_by_key(|c| c.id);
        Ok(clients)
    }

    async fn list_channels(&self) -> Result<Vec<ChannelInfo>> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(QueryError::Closed);
        }
        Ok(self.server.state().channels.clone())
    }

    async fn create_channel(&self, name: &str, props: &ChannelProps) -> Result<ChannelInfo> {
        self.channel_delay().await;
        let mut state = self.begin(Call::CreateChannel(name.to_string()))?;
        if state.channels.iter().any(|c| c.name == name) {
            return Err(server_error(771, "channel name is already in use"));
        }
        let channel = ChannelInfo {
            id: state.allocate_channel(),
            parent_id: props.parent_id,
            order: props.order,
            name: name.to_string(),
        };
        state.channels.push(channel.clone());
        Ok(channel)
    }

    async fn delete_channel(&self, id: ChannelId) -> Result<()> {
        self.channel_delay().await;
        let mut state = self.begin(Call::DeleteChannel(id))?;
        if !state.channels.iter().any(|c| c.id == id) {
            return Err(server_error(768, "invalid channelID"));
        }
        state.channels.retain(|c| c.id != id);
        for client in state.clients.iter_mut().filter(|c| c.channel_id == id) {
            client.channel_id = DEFAULT_CHANNEL;
        }
        Ok(())
    }

    async fn move_client(&self, client: ClientId, channel: ChannelId) -> Result<()> {
        let mut state = self.begin(Call::Move { client, channel })?;
        if state.fail_for.contains(&client) {
            return Err(server_error(2568, "insufficient client permissions"));
        }
        if !state.channels.iter().any(|c| c.id == channel) {
            return Err(server_error(768, "invalid channelID"));
        }
        match state.client_mut(client) {
            Some(info) if info.channel_id == channel => {
                Err(server_error(770, "already member of channel"))
            }
            Some(info) => {
                info.channel_id = channel;
                Ok(())
            }
            None => Err(server_error(512, "invalid clientID")),
        }
    }

    async fn kick_client(&self, client: ClientId, scope: KickScope, reason: &str) -> Result<()> {
        let mut state = self.begin(Call::Kick {
            client,
            scope,
            reason: reason.to_string(),
        })?;
        if state.fail_kicks || state.fail_for.contains(&client) {
            return Err(server_error(2568, "insufficient client permissions"));
        }
        match scope {
            KickScope::Server => {
                if !state.clients.iter().any(|c| c.id == client) {
                    return Err(server_error(512, "invalid clientID"));
                }
                state.drop_client(client);
            }
            KickScope::Channel => match state.client_mut(client) {
                Some(info) => info.channel_id = DEFAULT_CHANNEL,
                None => return Err(server_error(512, "invalid clientID")),
            },
        }
        state.kicked.push(client);
        Ok(())
    }

    async fn poke_client(&self, client: ClientId, text: &str) -> Result<()> {
        let state = self.begin(Call::Poke {
            client,
            text: text.to_string(),
        })?;
        if state.fail_for.contains(&client) {
            return Err(server_error(2568, "insufficient client permissions"));
        }
        Ok(())
    }

    async fn quit(&self) -> Result<()> {
        let mut state = self.begin(Call::Quit { client: self.id })?;
        state.drop_client(self.id);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

/// Records requested delays without sleeping.
#[derive(Default)]
pub struct RecordingSleeper {
    slept: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn slept(&self) -> Vec<Duration> {
        self.slept.lock().clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.slept.lock().push(duration);
    }
}

pub fn sample_credentials() -> Credentials {
    Credentials {
        host: "127.0.0.1".to_string(),
        query_port: 10011,
        target_port: 9987,
        username: "serveradmin".to_string(),
        password: "secret".to_string(),
        display_name: None,
        target_id: None,
    }
}

/// Registry built from the bundled command source.
pub fn registry() -> Arc<CommandRegistry> {
    Arc::new(CommandRegistry::from_json(include_str!("../commands.json")))
}

pub fn text_message(invoker: ClientId, name: &str, text: &str) -> TextMessage {
    TextMessage {
        target: TextTarget::Private,
        message: text.to_string(),
        invoker_id: invoker,
        invoker_name: name.to_string(),
        invoker_uid: None,
    }
}

pub fn dispatcher(session: &SessionHandle) -> Dispatcher {
    dispatcher_with(session, registry())
}

pub fn dispatcher_with(session: &SessionHandle, registry: Arc<CommandRegistry>) -> Dispatcher {
    Dispatcher::new(
        registry,
        "!".to_string(),
        Arc::new(DefaultsConfig::default()),
        session.clone(),
    )
}

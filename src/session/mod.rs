//! Bot session lifecycle.
//!
//! [`SessionManager`] owns the single live ServerQuery session. Establishing
//! one runs, in order:
//!
//! 1. teardown of the previous session (announcement channel, then quit)
//! 2. ghost eviction on an auxiliary connection (best-effort)
//! 3. connect with retry, each attempt under a fresh display name
//! 4. event registration, announcement channel, event pump
//!
//! `initialize` and `disconnect` are serialized by an async lifecycle lock
//! and run on their own task: a caller that stops waiting (an HTTP client
//! hanging up) never leaves a session half built or half torn down.
//! Status reads take a short sync lock and never wait on a connect.

mod announce;
mod events;
mod ghost;
mod nickname;
mod retry;

pub use retry::Sleeper;
use retry::{RetryPolicy, TokioSleeper};

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use tsq_proto::{
    ChannelId, ClientId, ClientProperties, Connection, EventCategory, QueryClient, QueryConnector,
    QueryError,
};

use crate::commands::{CommandRegistry, Dispatcher};
use crate::config::{AnnouncementConfig, BotConfig, Config, DefaultsConfig};
use crate::db::Credentials;
use crate::error::{CleanupWarning, SessionError};

/// Notifications the dispatcher needs.
const EVENT_CATEGORIES: [EventCategory; 4] = [
    EventCategory::Server,
    EventCategory::TextServer,
    EventCategory::TextChannel,
    EventCategory::TextPrivate,
];

/// Client flags applied right after connecting.
const INITIAL_PROPERTIES: ClientProperties = ClientProperties {
    input_muted: true,
    output_muted: false,
};

/// The live session as seen by command handlers.
#[derive(Clone)]
pub struct SessionHandle {
    pub client: Arc<dyn QueryClient>,
    /// The bot's own client id.
    pub self_id: ClientId,
    /// Protected status channel, if one could be set up.
    pub announcement: Option<ChannelId>,
    cancel: CancellationToken,
}

impl SessionHandle {
    pub fn new(client: Arc<dyn QueryClient>, self_id: ClientId, announcement: Option<ChannelId>) -> Self {
        Self {
            client,
            self_id,
            announcement,
            cancel: CancellationToken::new(),
        }
    }

    /// False once the session was torn down or its transport closed.
    pub fn is_live(&self) -> bool {
        !self.cancel.is_cancelled() && self.client.is_connected()
    }

    /// Mark the session as ended; in-flight commands stop at their next call.
    pub fn end(&self) {
        self.cancel.cancel();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Online,
    Offline,
}

/// Snapshot served by `GET /status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub status: SessionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub announcement_channel: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

struct LiveSession {
    generation: u64,
    nickname: String,
    handle: SessionHandle,
}

#[derive(Default)]
struct SessionState {
    live: Option<LiveSession>,
    last_error: Option<String>,
}

struct Established {
    conn: Connection,
    self_id: ClientId,
    channel_id: ChannelId,
    nickname: String,
}

/// Owner of the bot's single ServerQuery session.
pub struct SessionManager {
    connector: Arc<dyn QueryConnector>,
    registry: Arc<CommandRegistry>,
    bot: BotConfig,
    announcement: AnnouncementConfig,
    defaults: Arc<DefaultsConfig>,
    retry: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
    lifecycle: Mutex<()>,
    state: RwLock<SessionState>,
    generation: AtomicU64,
}

impl SessionManager {
    pub fn new(
        config: &Config,
        connector: Arc<dyn QueryConnector>,
        registry: Arc<CommandRegistry>,
    ) -> Arc<Self> {
        Self::with_sleeper(config, connector, registry, Arc::new(TokioSleeper))
    }

    /// Like [`SessionManager::new`], with a custom source of retry delays.
    pub fn with_sleeper(
        config: &Config,
        connector: Arc<dyn QueryConnector>,
        registry: Arc<CommandRegistry>,
        sleeper: Arc<dyn Sleeper>,
    ) -> Arc<Self> {
        Arc::new(Self {
            connector,
            registry,
            bot: config.bot.clone(),
            announcement: config.announcement.clone(),
            defaults: Arc::new(config.defaults.clone()),
            retry: RetryPolicy::new(config.bot.connect_attempts, config.bot.retry_delay()),
            sleeper,
            lifecycle: Mutex::new(()),
            state: RwLock::new(SessionState::default()),
            generation: AtomicU64::new(0),
        })
    }

    /// Replace any current session with one using `credentials`.
    ///
    /// Fails with [`SessionError::InvalidSettings`] before touching the
    /// network when a required field is blank. The previous session is torn
    /// down even if the new one cannot be established.
    pub async fn initialize(self: &Arc<Self>, credentials: &Credentials) -> Result<StatusReport, SessionError> {
        let manager = Arc::clone(self);
        let credentials = credentials.clone();
        tokio::spawn(async move { manager.establish(&credentials).await })
            .await
            .unwrap_or_else(|e| {
                let err = SessionError::Interrupted(e.to_string());
                error!(error = %err, "Session task failed");
                Err(err)
            })
    }

    /// Tear down the current session, if any.
    pub async fn disconnect(self: &Arc<Self>) {
        let manager = Arc::clone(self);
        let task = tokio::spawn(async move {
            let _guard = manager.lifecycle.lock().await;
            manager.teardown().await;
        });
        if let Err(e) = task.await {
            error!(error = %e, "Teardown task failed");
        }
    }

    async fn establish(self: &Arc<Self>, credentials: &Credentials) -> Result<StatusReport, SessionError> {
        let missing = credentials.missing_fields();
        if !missing.is_empty() {
            let err = SessionError::InvalidSettings { missing };
            warn!(error = %err, "Rejected session settings");
            self.record_error(&err);
            return Err(err);
        }

        let _guard = self.lifecycle.lock().await;
        self.teardown().await;

        let base = credentials
            .display_name()
            .unwrap_or(&self.bot.nickname)
            .to_string();

        match ghost::evict_ghosts(self.connector.as_ref(), credentials, &base).await {
            Ok(0) => debug!("No ghost clients found"),
            Ok(count) => info!(count, "Evicted ghost clients"),
            Err(warning) => warn!(error = %warning, "Ghost cleanup skipped"),
        }

        let established = self
            .retry
            .run(self.sleeper.as_ref(), |attempt| {
                self.attempt(credentials, nickname::for_attempt(&base, attempt), attempt)
            })
            .await
            .map_err(|exhausted| SessionError::ConnectionFailed {
                attempts: exhausted.attempts,
                source: exhausted.last,
            });

        let result = match established {
            Ok(established) => self.activate(established).await,
            Err(err) => Err(err),
        };

        match result {
            Ok(()) => Ok(self.status_report()),
            Err(err) => {
                error!(error = %err, code = err.error_code(), "Could not establish session");
                self.record_error(&err);
                Err(err)
            }
        }
    }

    /// Online iff a session exists and its transport is open.
    pub fn status(&self) -> SessionStatus {
        match &self.state.read().live {
            Some(live) if live.handle.is_live() => SessionStatus::Online,
            _ => SessionStatus::Offline,
        }
    }

    pub fn status_report(&self) -> StatusReport {
        let status = self.status();
        let state = self.state.read();
        let live = state
            .live
            .as_ref()
            .filter(|_| status == SessionStatus::Online);
        StatusReport {
            status,
            nickname: live.map(|l| l.nickname.clone()),
            client_id: live.map(|l| l.handle.self_id.0),
            announcement_channel: live.and_then(|l| l.handle.announcement).map(|c| c.0),
            last_error: state.last_error.clone(),
        }
    }

    fn record_error(&self, err: &SessionError) {
        self.state.write().last_error = Some(err.to_string());
    }

    /// One connect attempt: login, select the server, confirm identity.
    async fn attempt(
        &self,
        credentials: &Credentials,
        nickname: String,
        attempt: u32,
    ) -> Result<Established, QueryError> {
        info!(attempt, nickname = %nickname, host = %credentials.host, "Connecting");

        let conn = self
            .connector
            .connect(&credentials.connect_params(Some(nickname.clone())))
            .await?;

        let (self_id, channel_id) = match identify(conn.client.as_ref(), credentials).await {
            Ok(me) => me,
            Err(e) => {
                if let Err(quit_err) = conn.client.quit().await {
                    debug!(error = %quit_err, "Failed to close rejected connection");
                }
                return Err(e);
            }
        };

        if let Err(e) = conn.client.update_self(&INITIAL_PROPERTIES).await {
            warn!(error = %e, "Failed to set client properties");
        }

        info!(nickname = %nickname, %self_id, "Connected");
        Ok(Established {
            conn,
            self_id,
            channel_id,
            nickname,
        })
    }

    /// Post-connect setup; publishes the session on success.
    async fn activate(self: &Arc<Self>, established: Established) -> Result<(), SessionError> {
        let Established {
            conn: Connection { client, events },
            self_id,
            channel_id,
            nickname,
        } = established;

        for category in EVENT_CATEGORIES {
            if let Err(e) = client.register_events(category).await {
                if let Err(quit_err) = client.quit().await {
                    warn!(error = %CleanupWarning::Quit(quit_err), "Teardown incomplete");
                }
                return Err(SessionError::SetupFailed(e));
            }
        }

        let announcement = match announce::ensure_channel(client.as_ref(), &self.announcement).await {
            Ok(id) => Some(id),
            Err(e) => {
                warn!(error = %e, "Failed to set up announcement channel");
                None
            }
        };

        if let Some(channel) = announcement
            && channel != channel_id
        {
            match client.move_client(self_id, channel).await {
                Ok(()) => info!(channel_id = %channel, "Bot moved to announcement channel"),
                Err(e) => warn!(channel_id = %channel, error = %e, "Failed to enter announcement channel"),
            }
        }

        let handle = SessionHandle::new(client, self_id, announcement);
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let dispatcher = Arc::new(Dispatcher::new(
            Arc::clone(&self.registry),
            self.bot.command_prefix.clone(),
            Arc::clone(&self.defaults),
            handle.clone(),
        ));

        {
            let mut state = self.state.write();
            state.live = Some(LiveSession {
                generation,
                nickname: nickname.clone(),
                handle: handle.clone(),
            });
            state.last_error = None;
        }

        tokio::spawn(events::pump(
            Arc::downgrade(self),
            generation,
            events,
            dispatcher,
            handle.cancel.clone(),
        ));

        info!(generation, nickname = %nickname, "Session online");
        Ok(())
    }

    /// Remove the announcement channel and log out. Never fails.
    async fn teardown(&self) {
        let live = self.state.write().live.take();
        let Some(live) = live else {
            return;
        };

        let handle = live.handle;
        handle.end();

        if handle.client.is_connected() {
            if let Some(channel) = handle.announcement
                && let Err(source) = handle.client.delete_channel(channel).await
            {
                warn!(error = %CleanupWarning::Announcement { channel, source }, "Teardown incomplete");
            }
            if let Err(e) = handle.client.quit().await {
                warn!(error = %CleanupWarning::Quit(e), "Teardown incomplete");
            }
        }

        info!(generation = live.generation, "Session torn down");
    }

    /// Called by the event pump when the server closed the session.
    fn transport_closed(&self, generation: u64, reason: Option<String>) {
        let mut state = self.state.write();
        if !state
            .live
            .as_ref()
            .is_some_and(|live| live.generation == generation)
        {
            debug!(generation, "Ignoring close of a replaced session");
            return;
        }

        if let Some(live) = state.live.take() {
            live.handle.end();
        }
        let err = SessionError::TransportClosed { reason };
        warn!(generation, error = %err, "Session lost");
        state.last_error = Some(err.to_string());
    }
}

async fn identify(
    client: &dyn QueryClient,
    credentials: &Credentials,
) -> Result<(ClientId, ChannelId), QueryError> {
    client.select_context(credentials.target()).await?;
    let me = client.whoami().await?;
    let id = me.client_id.ok_or_else(|| {
        QueryError::Protocol("no client id after selecting the virtual server".to_string())
    })?;
    Ok((id, me.channel_id))
}

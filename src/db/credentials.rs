//! Credential repository.
//!
//! Exactly one record exists at a time, keyed [`CREDENTIALS_ID`]. Saving
//! replaces every field; there is no partial merge.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tsq_proto::{ConnectParams, ServerId, VirtualServer};

use super::{Database, DbError};

/// Primary key of the single credential row.
pub const CREDENTIALS_ID: &str = "ts3_credentials";

/// ServerQuery port used when none is given.
pub const DEFAULT_QUERY_PORT: u16 = 10011;

/// Voice port used to pick the virtual server when no id is given.
pub const DEFAULT_TARGET_PORT: u16 = 9987;

fn default_query_port() -> u16 {
    DEFAULT_QUERY_PORT
}

fn default_target_port() -> u16 {
    DEFAULT_TARGET_PORT
}

/// ServerQuery login and target selection.
///
/// Missing string fields deserialize as empty so that validation can name
/// every missing field instead of failing on the first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    #[serde(default)]
    pub host: String,
    #[serde(default = "default_query_port", alias = "queryport", alias = "port")]
    pub query_port: u16,
    #[serde(default = "default_target_port")]
    pub target_port: u16,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    /// Base display name; falls back to `bot.nickname`.
    #[serde(default, alias = "nickname", skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Virtual server id; takes precedence over `target_port`.
    #[serde(default, alias = "serverId", skip_serializing_if = "Option::is_none")]
    pub target_id: Option<u32>,
}

impl Credentials {
    /// Required fields that are empty after trimming.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        [
            ("host", &self.host),
            ("username", &self.username),
            ("password", &self.password),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect()
    }

    /// Virtual server to select after login.
    pub fn target(&self) -> VirtualServer {
        match self.target_id.filter(|id| *id != 0) {
            Some(id) => VirtualServer::Id(ServerId(id)),
            None => VirtualServer::Port(self.target_port),
        }
    }

    /// Configured display name, if non-blank.
    pub fn display_name(&self) -> Option<&str> {
        self.display_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }

    /// Transport parameters for a connection using `nickname`.
    pub fn connect_params(&self, nickname: Option<String>) -> ConnectParams {
        ConnectParams {
            host: self.host.trim().to_string(),
            port: self.query_port,
            username: self.username.trim().to_string(),
            password: self.password.clone(),
            nickname,
        }
    }
}

/// Persistence of the active credential record.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// The stored record, if any.
    async fn get(&self) -> Result<Option<Credentials>, DbError>;

    /// Replace the stored record.
    async fn upsert(&self, credentials: Credentials) -> Result<Credentials, DbError>;
}

#[async_trait]
impl CredentialStore for Database {
    async fn get(&self) -> Result<Option<Credentials>, DbError> {
        self.credentials().load().await
    }

    async fn upsert(&self, credentials: Credentials) -> Result<Credentials, DbError> {
        self.credentials().save(&credentials).await?;
        Ok(credentials)
    }
}

type CredentialRow = (
    String,
    i64,
    i64,
    String,
    String,
    Option<String>,
    Option<i64>,
);

/// Repository for the credential row.
pub struct CredentialRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> CredentialRepository<'a> {
    /// Create a new credential repository.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Load the stored record.
    pub async fn load(&self) -> Result<Option<Credentials>, DbError> {
        let row = sqlx::query_as::<_, CredentialRow>(
            r#"
            SELECT host, query_port, target_port, username, password, display_name, target_id
            FROM credentials
            WHERE id = ?
            "#,
        )
        .bind(CREDENTIALS_ID)
        .fetch_optional(self.pool)
        .await?;

        let Some((host, query_port, target_port, username, password, display_name, target_id)) =
            row
        else {
            return Ok(None);
        };

        let target_id = target_id
            .map(|id| {
                u32::try_from(id).map_err(|_| DbError::Corrupt(format!("target_id {id}")))
            })
            .transpose()?;

        Ok(Some(Credentials {
            host,
            query_port: port("query_port", query_port)?,
            target_port: port("target_port", target_port)?,
            username,
            password,
            display_name,
            target_id,
        }))
    }

    /// Insert or replace the record.
    pub async fn save(&self, credentials: &Credentials) -> Result<(), DbError> {
        let now = chrono::Utc::now().timestamp();

        sqlx::query(
            r#"
            INSERT INTO credentials
                (id, host, query_port, target_port, username, password, display_name, target_id, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                host = excluded.host,
                query_port = excluded.query_port,
                target_port = excluded.target_port,
                username = excluded.username,
                password = excluded.password,
                display_name = excluded.display_name,
                target_id = excluded.target_id,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(CREDENTIALS_ID)
        .bind(&credentials.host)
        .bind(i64::from(credentials.query_port))
        .bind(i64::from(credentials.target_port))
        .bind(&credentials.username)
        .bind(&credentials.password)
        .bind(credentials.display_name.as_deref())
        .bind(credentials.target_id.map(i64::from))
        .bind(now)
        .execute(self.pool)
        .await?;

        Ok(())
    }
}

fn port(column: &str, raw: i64) -> Result<u16, DbError> {
    u16::try_from(raw).map_err(|_| DbError::Corrupt(format!("{column} {raw}")))
}

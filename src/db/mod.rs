//! Credential persistence.
//!
//! One SQLite file holds the single ServerQuery credential record. The store
//! sees one writer (settings updates) and the occasional HTTP reader, so the
//! pool stays small.

mod credentials;

pub use credentials::{CredentialRepository, CredentialStore, Credentials};

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use sqlx::SqlitePool;
use sqlx::migrate::MigrateError;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use thiserror::Error;
use tracing::{info, warn};

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("migration error: {0}")]
    Migration(#[from] MigrateError),
    #[error("stored value out of range: {0}")]
    Corrupt(String),
}

/// Handle to the credential database.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Wait this long for a free connection before failing the request.
    const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(3);

    /// Open `path` (or a private in-memory database for `:memory:`) and
    /// apply pending migrations.
    pub async fn new(path: &str) -> Result<Self, DbError> {
        let pool = if path == ":memory:" {
            // Every connection to `:memory:` is its own database, so keep
            // exactly one open for the lifetime of the pool.
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .acquire_timeout(Self::ACQUIRE_TIMEOUT)
                .connect_with(SqliteConnectOptions::from_str("sqlite::memory:")?)
                .await?
        } else {
            if let Some(parent) = Path::new(path).parent()
                && !parent.as_os_str().is_empty()
                && let Err(e) = std::fs::create_dir_all(parent)
            {
                warn!(path = %parent.display(), error = %e, "Failed to create database directory");
            }

            let options = SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal)
                .synchronous(SqliteSynchronous::Normal);

            SqlitePoolOptions::new()
                .max_connections(2)
                .acquire_timeout(Self::ACQUIRE_TIMEOUT)
                .connect_with(options)
                .await?
        };

        sqlx::migrate!("./migrations").run(&pool).await?;
        info!(path = %path, "Credential database ready");

        Ok(Self { pool })
    }

    /// Repository for the credential record.
    pub fn credentials(&self) -> CredentialRepository<'_> {
        CredentialRepository::new(&self.pool)
    }
}

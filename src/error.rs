//! Unified error handling for tsqbot.
//!
//! Session errors surface to HTTP callers; command and cleanup errors are
//! handled where they occur and only ever logged or reported in chat.

use thiserror::Error;
use tsq_proto::{ChannelId, ClientId, QueryError};

// ============================================================================
// Session Errors (initialize / lifecycle)
// ============================================================================

/// Errors from establishing or running the bot session.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Required credential fields are empty. No connection was attempted.
    #[error("invalid settings: missing {}", .missing.join(", "))]
    InvalidSettings { missing: Vec<&'static str> },

    /// Every connect attempt failed.
    #[error("connection failed after {attempts} attempt(s): {source}")]
    ConnectionFailed {
        attempts: u32,
        #[source]
        source: QueryError,
    },

    /// Connected, but the session could not be made usable.
    #[error("session setup failed: {0}")]
    SetupFailed(#[source] QueryError),

    /// The server closed the session.
    #[error("connection closed{}", reason_suffix(.reason))]
    TransportClosed { reason: Option<String> },

    /// The lifecycle task stopped before finishing.
    #[error("session task interrupted: {0}")]
    Interrupted(String),
}

fn reason_suffix(reason: &Option<String>) -> String {
    reason.as_deref().map(|r| format!(": {r}")).unwrap_or_default()
}

impl SessionError {
    /// Get a static error code string for logs and API responses.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidSettings { .. } => "invalid_settings",
            Self::ConnectionFailed { .. } => "connection_failed",
            Self::SetupFailed(_) => "setup_failed",
            Self::TransportClosed { .. } => "transport_closed",
            Self::Interrupted(_) => "interrupted",
        }
    }
}

// ============================================================================
// Command Errors (chat dispatch)
// ============================================================================

/// Errors raised by chat command handlers. Never fatal to the session.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("query failed: {0}")]
    Query(#[from] QueryError),

    /// The session was torn down while the command ran.
    #[error("session ended")]
    SessionEnded,

    #[error("invoker {0} is no longer on the server")]
    InvokerGone(ClientId),
}

// ============================================================================
// Cleanup Warnings (best-effort teardown and eviction)
// ============================================================================

/// Best-effort cleanup failures. Logged, never propagated.
#[derive(Debug, Error)]
pub enum CleanupWarning {
    #[error("ghost cleanup failed: {0}")]
    Ghosts(#[source] QueryError),

    #[error("failed to delete announcement channel {channel}: {source}")]
    Announcement {
        channel: ChannelId,
        #[source]
        source: QueryError,
    },

    #[error("failed to close session: {0}")]
    Quit(#[source] QueryError),
}

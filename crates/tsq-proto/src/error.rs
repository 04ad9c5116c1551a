//! Error types for the ServerQuery client.

use thiserror::Error;

/// Convenience type alias for Results using [`QueryError`].
pub type Result<T, E = QueryError> = std::result::Result<T, E>;

/// Server error id for "database empty result set".
///
/// Returned by list commands when there is nothing to list.
pub const ERR_EMPTY_RESULT: u32 = 1281;

/// Server error id for "nickname is already in use".
pub const ERR_NICKNAME_IN_USE: u32 = 513;

/// Top-level query errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum QueryError {
    /// I/O error during reading or writing.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The server answered a command with a non-zero `error id=`.
    #[error("server error {id}: {message}")]
    Server {
        /// Numeric error id reported by the server.
        id: u32,
        /// Unescaped `msg=` text.
        message: String,
    },

    /// A line did not have the expected shape.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A line exceeded the codec's length limit.
    #[error("line too long: {actual} bytes (limit {limit})")]
    LineTooLong {
        /// Observed length in bytes.
        actual: usize,
        /// Configured limit in bytes.
        limit: usize,
    },

    /// A line was not valid UTF-8.
    #[error("invalid utf-8 in server line: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    /// The connection is gone.
    #[error("connection closed")]
    Closed,

    /// No reply arrived in time.
    #[error("timed out waiting for {0}")]
    Timeout(&'static str),
}

impl QueryError {
    /// Numeric server error id, if this is a server-side rejection.
    pub fn server_code(&self) -> Option<u32> {
        match self {
            Self::Server { id, .. } => Some(*id),
            _ => None,
        }
    }

    /// Whether the server rejected a display name because it is taken.
    pub fn is_nickname_in_use(&self) -> bool {
        self.server_code() == Some(ERR_NICKNAME_IN_USE)
    }

    /// Whether the server reported an empty list instead of data.
    pub fn is_empty_result(&self) -> bool {
        self.server_code() == Some(ERR_EMPTY_RESULT)
    }
}

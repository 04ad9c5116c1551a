//! Reply records and status lines.
//!
//! A data reply is one line of `|`-separated records; each record is a
//! space-separated list of `key=value` pairs (or bare keys). Every command
//! ends with a status line of the form `error id=<n> msg=<text>`.

use std::str::FromStr;

use crate::error::{QueryError, Result};
use crate::escape::unescape;

/// One `key=value ...` record with unescaped values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    fields: Vec<(String, String)>,
}

impl Record {
    /// Parse a single record (no `|` separators).
    pub fn parse(segment: &str) -> Self {
        let fields = segment
            .split(' ')
            .filter(|token| !token.is_empty())
            .map(|token| match token.split_once('=') {
                Some((key, value)) => (key.to_string(), unescape(value)),
                None => (token.to_string(), String::new()),
            })
            .collect();
        Self { fields }
    }

    /// Raw value for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Parse the value for `key`, failing when missing or malformed.
    pub fn parse_field<T: FromStr>(&self, key: &str) -> Result<T> {
        let raw = self
            .get(key)
            .ok_or_else(|| QueryError::Protocol(format!("missing field `{key}`")))?;
        raw.parse()
            .map_err(|_| QueryError::Protocol(format!("invalid value for `{key}`: {raw:?}")))
    }

    /// Parse the value for `key`, falling back to `None` when missing or malformed.
    pub fn parse_opt<T: FromStr>(&self, key: &str) -> Option<T> {
        self.get(key).and_then(|raw| raw.parse().ok())
    }

    /// Whether the record has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Split a data line into records.
pub fn parse_records(line: &str) -> Vec<Record> {
    line.split('|')
        .map(Record::parse)
        .filter(|record| !record.is_empty())
        .collect()
}

/// Trailing `error id= msg=` line of a command reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    /// Numeric error id, 0 on success.
    pub id: u32,
    /// Human-readable message.
    pub message: String,
}

impl Status {
    /// Parse a status line, returning `None` if `line` is not one.
    pub fn parse(line: &str) -> Option<Self> {
        let rest = line.strip_prefix("error ")?;
        let record = Record::parse(rest);
        let id = record.parse_opt("id")?;
        let mut message = record.get("msg").unwrap_or_default().to_string();
        if let Some(extra) = record.get("extra_msg") {
            message.push_str(" (");
            message.push_str(extra);
            message.push(')');
        }
        Some(Self { id, message })
    }

    /// Whether the command succeeded.
    pub fn is_ok(&self) -> bool {
        self.id == 0
    }

    /// Convert to a `Result`, mapping non-zero ids to [`QueryError::Server`].
    pub fn into_result(self) -> Result<()> {
        if self.is_ok() {
            Ok(())
        } else {
            Err(QueryError::Server {
                id: self.id,
                message: self.message,
            })
        }
    }
}

//! Outgoing command construction.

use std::fmt;

use crate::escape::escape;

/// A single ServerQuery command line.
///
/// ```
/// use tsq_proto::command::Command;
///
/// let cmd = Command::new("clientpoke").arg("clid", 7).arg("msg", "wake up");
/// assert_eq!(cmd.to_string(), "clientpoke clid=7 msg=wake\\sup");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    name: &'static str,
    params: Vec<String>,
}

impl Command {
    /// Start a command with no parameters.
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            params: Vec::new(),
        }
    }

    /// Append an escaped `key=value` parameter.
    pub fn arg(mut self, key: &str, value: impl fmt::Display) -> Self {
        self.params
            .push(format!("{key}={}", escape(&value.to_string())));
        self
    }

    /// Append a parameter only when `value` is present.
    pub fn arg_opt<T: fmt::Display>(self, key: &str, value: Option<T>) -> Self {
        match value {
            Some(value) => self.arg(key, value),
            None => self,
        }
    }

    /// Append a `-flag` option.
    pub fn flag(mut self, flag: &str) -> Self {
        self.params.push(format!("-{flag}"));
        self
    }

    /// Command name (first token).
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)?;
        for param in &self.params {
            write!(f, " {param}")?;
        }
        Ok(())
    }
}

//! Command descriptors loaded from the JSON command source.
//!
//! The source maps command names to a handler reference and help text:
//!
//! ```json
//! { "ping": { "handler": "handlePing", "description": "Check if the bot is alive" } }
//! ```
//!
//! Handler references resolve against the closed [`HandlerId`] set when the
//! registry is built. Entries that fail to resolve or lack a description are
//! skipped with a warning; the rest of the source still loads.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::Deserialize;
use tracing::{error, info, warn};

/// Built-in handler a command can be bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandlerId {
    Ping,
    Help,
    MassPoke,
    MassKick,
    MassMove,
    Join,
}

impl HandlerId {
    pub const ALL: [HandlerId; 6] = [
        Self::Ping,
        Self::Help,
        Self::MassPoke,
        Self::MassKick,
        Self::MassMove,
        Self::Join,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ping => "ping",
            Self::Help => "help",
            Self::MassPoke => "mass-poke",
            Self::MassKick => "mass-kick",
            Self::MassMove => "mass-move",
            Self::Join => "join",
        }
    }

    /// Resolve a handler reference.
    ///
    /// Accepts `mass-poke`, `mass_poke`, `masspoke` and `handleMassPoke`
    /// spellings, case-insensitively.
    pub fn resolve(reference: &str) -> Option<Self> {
        let normalized: String = reference
            .trim()
            .chars()
            .filter(|c| !matches!(c, '-' | '_'))
            .flat_map(char::to_lowercase)
            .collect();
        let key = match normalized.strip_prefix("handle") {
            Some(rest) if !rest.is_empty() => rest,
            _ => normalized.as_str(),
        };

        Self::ALL
            .into_iter()
            .find(|id| id.as_str().replace('-', "") == key)
    }
}

impl fmt::Display for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A registered chat command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandDescriptor {
    /// Lowercase command name, without prefix.
    pub name: String,
    pub handler: HandlerId,
    pub description: String,
    pub example: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawDescriptor {
    #[serde(default)]
    handler: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    example: Option<String>,
}

/// Why a source entry was skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
enum EntryError {
    EmptyName,
    MissingHandler,
    MissingDescription,
    UnknownHandler(String),
    Duplicate,
    Malformed(String),
}

impl fmt::Display for EntryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyName => f.write_str("empty command name"),
            Self::MissingHandler => f.write_str("missing handler"),
            Self::MissingDescription => f.write_str("missing description"),
            Self::UnknownHandler(h) => write!(f, "unknown handler {h:?}"),
            Self::Duplicate => f.write_str("duplicate command name"),
            Self::Malformed(e) => write!(f, "malformed entry: {e}"),
        }
    }
}

/// Immutable name to descriptor mapping.
#[derive(Debug, Clone, Default)]
pub struct CommandRegistry {
    commands: BTreeMap<String, CommandDescriptor>,
}

impl CommandRegistry {
    /// Load the registry from a JSON file.
    ///
    /// An unreadable or unparsable file yields an empty registry.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(source) => {
                let registry = Self::from_json(&source);
                info!(path = %path.display(), commands = registry.len(), "Loaded command registry");
                registry
            }
            Err(e) => {
                error!(path = %path.display(), error = %e, "Failed to read command source");
                Self::default()
            }
        }
    }

    /// Build the registry from JSON source text.
    pub fn from_json(source: &str) -> Self {
        let entries: serde_json::Map<String, serde_json::Value> = match serde_json::from_str(source) {
            Ok(entries) => entries,
            Err(e) => {
                error!(error = %e, "Failed to parse command source");
                return Self::default();
            }
        };

        let mut commands = BTreeMap::new();
        for (name, value) in entries {
            match Self::parse_entry(&name, value, &commands) {
                Ok(descriptor) => {
                    commands.insert(descriptor.name.clone(), descriptor);
                }
                Err(e) => warn!(command = %name, error = %e, "Skipping command entry"),
            }
        }
        Self { commands }
    }

    fn parse_entry(
        name: &str,
        value: serde_json::Value,
        existing: &BTreeMap<String, CommandDescriptor>,
    ) -> Result<CommandDescriptor, EntryError> {
        let key = name.trim().to_lowercase();
        if key.is_empty() || key.contains(char::is_whitespace) {
            return Err(EntryError::EmptyName);
        }
        if existing.contains_key(&key) {
            return Err(EntryError::Duplicate);
        }

        let raw: RawDescriptor =
            serde_json::from_value(value).map_err(|e| EntryError::Malformed(e.to_string()))?;
        if raw.handler.trim().is_empty() {
            return Err(EntryError::MissingHandler);
        }
        if raw.description.trim().is_empty() {
            return Err(EntryError::MissingDescription);
        }
        let handler =
            HandlerId::resolve(&raw.handler).ok_or_else(|| EntryError::UnknownHandler(raw.handler.clone()))?;

        Ok(CommandDescriptor {
            name: key,
            handler,
            description: raw.description.trim().to_string(),
            example: raw
                .example
                .map(|e| e.trim().to_string())
                .filter(|e| !e.is_empty()),
        })
    }

    /// Case-insensitive exact lookup.
    pub fn resolve(&self, name: &str) -> Option<&CommandDescriptor> {
        self.commands.get(&name.to_lowercase())
    }

    /// Descriptors in name order.
    pub fn iter(&self) -> impl Iterator<Item = &CommandDescriptor> {
        self.commands.values()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

//! Configuration validation.
//!
//! Validates configuration at startup to catch common errors early.

use super::Config;
use std::path::Path;
use thiserror::Error;

/// Validation errors for configuration.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("bot.nickname is required")]
    MissingNickname,
    #[error("bot.command_prefix must be non-empty and contain no whitespace, got '{0}'")]
    InvalidPrefix(String),
    #[error("bot.connect_attempts must be at least 1")]
    NoConnectAttempts,
    #[error("bot.keepalive_secs must be at least 1")]
    NoKeepalive,
    #[error("announcement.name is required")]
    MissingAnnouncementName,
    #[error("database.path parent directory does not exist: {0}")]
    DatabasePathInvalid(String),
}

/// Validate a configuration, returning all errors found.
pub fn validate(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.bot.nickname.trim().is_empty() {
        errors.push(ValidationError::MissingNickname);
    }

    let prefix = &config.bot.command_prefix;
    if prefix.is_empty() || prefix.chars().any(char::is_whitespace) {
        errors.push(ValidationError::InvalidPrefix(prefix.clone()));
    }

    if config.bot.connect_attempts == 0 {
        errors.push(ValidationError::NoConnectAttempts);
    }

    if config.bot.keepalive_secs == 0 {
        errors.push(ValidationError::NoKeepalive);
    }

    if config.announcement.name.trim().is_empty() {
        errors.push(ValidationError::MissingAnnouncementName);
    }

    // Database path validation
    let db = &config.database;
    if db.path != ":memory:" {
        let db_path = Path::new(&db.path);
        if let Some(parent) = db_path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            errors.push(ValidationError::DatabasePathInvalid(db.path.clone()));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_passes() {
        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn test_whitespace_prefix_fails() {
        let toml = r#"
[bot]
command_prefix = "! "
"#;
        let config: Config = toml::from_str(toml).unwrap();
        let errors = validate(&config).unwrap_err();
        assert!(errors.iter().any(|e| matches!(e, ValidationError::InvalidPrefix(_))));
    }

    #[test]
    fn test_all_errors_reported() {
        let toml = r#"
[bot]
nickname = "  "
command_prefix = ""
connect_attempts = 0
keepalive_secs = 0

[announcement]
name = ""

[database]
path = "/nonexistent/dir/tsqbot.db"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        let errors = validate(&config).unwrap_err();
        assert_eq!(errors.len(), 6);
        assert!(errors.iter().any(|e| matches!(e, ValidationError::MissingNickname)));
        assert!(errors.iter().any(|e| matches!(e, ValidationError::NoConnectAttempts)));
        assert!(errors.iter().any(|e| matches!(e, ValidationError::NoKeepalive)));
        assert!(errors.iter().any(|e| matches!(e, ValidationError::DatabasePathInvalid(_))));
    }

    #[test]
    fn test_zero_keepalive_fails() {
        let config: Config = toml::from_str("[bot]\nkeepalive_secs = 0\n").unwrap();
        let errors = validate(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], ValidationError::NoKeepalive));
    }

    #[test]
    fn test_memory_database_is_valid() {
        let toml = r#"
[database]
path = ":memory:"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert!(validate(&config).is_ok());
    }
}

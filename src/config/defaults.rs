//! Default value functions for configuration.
//!
//! Separated into its own module for clarity and reuse.

use std::net::SocketAddr;
use std::path::PathBuf;

// =============================================================================
// HTTP / Database Defaults
// =============================================================================

pub fn default_http_address() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 3002))
}

pub fn default_database_path() -> String {
    "tsqbot.db".to_string()
}

// =============================================================================
// Bot Defaults
// =============================================================================

pub fn default_nickname() -> String {
    "Bert The Bot".to_string()
}

pub fn default_command_prefix() -> String {
    "!".to_string()
}

pub fn default_connect_attempts() -> u32 {
    3
}

pub fn default_retry_delay_ms() -> u64 {
    2000
}

pub fn default_keepalive_secs() -> u64 {
    180
}

pub fn default_commands_path() -> PathBuf {
    PathBuf::from("commands.json")
}

// =============================================================================
// Announcement Channel Defaults
// =============================================================================

pub fn default_announcement_name() -> String {
    "━━ Bert the Bot [Online] ━━".to_string()
}

pub fn default_announcement_topic() -> String {
    "Bot Status: Online".to_string()
}

pub fn default_announcement_description() -> String {
    "[center][b]Bot Status[/b]\n[color=green]✓ Connected[/color]\n\nType !help for commands[/center]"
        .to_string()
}

// =============================================================================
// Command Defaults
// =============================================================================

pub fn default_mass_poke_message() -> String {
    "Mass poke from admin!".to_string()
}

pub fn default_mass_kick_reason() -> String {
    "No reason provided".to_string()
}

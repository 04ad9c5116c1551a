//! tsqbot - ServerQuery session bot
//!
//! Keeps one announced bot session on a TeamSpeak 3 server, answers chat
//! commands, and exposes a small HTTP control surface for the dashboard.

mod commands;
mod config;
mod db;
mod error;
mod http;
mod session;
#[cfg(test)]
mod testing;

use crate::commands::CommandRegistry;
use crate::config::{Config, LogFormat};
use crate::db::{CredentialStore, Database};
use crate::http::AppState;
use crate::session::SessionManager;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use tsq_proto::ServerQueryConnector;

const DEFAULT_CONFIG_PATH: &str = "tsqbot.toml";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration before logging so the format can be chosen
    let explicit_path = std::env::args().nth(1);
    let config_path = explicit_path
        .clone()
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

    let config_result = match Config::load(&config_path) {
        Ok(config) => Ok(config),
        // Running without any config file is allowed; credentials come over HTTP
        Err(config::ConfigError::Io(e))
            if explicit_path.is_none() && e.kind() == std::io::ErrorKind::NotFound =>
        {
            Ok(Config::default())
        }
        Err(e) => Err(e),
    };

    let format = config_result
        .as_ref()
        .map(|c| c.logging.format)
        .unwrap_or_default();
    init_tracing(format);

    let config = config_result.map_err(|e| {
        error!(path = %config_path, error = %e, "Failed to load config");
        e
    })?;

    if let Err(errors) = config::validate(&config) {
        for e in &errors {
            error!(error = %e, "Invalid configuration");
        }
        return Err(anyhow::anyhow!(
            "configuration has {} error(s), see log above",
            errors.len()
        ));
    }

    info!(
        version = env!("CARGO_PKG_VERSION"),
        http = %config.http.address,
        nickname = %config.bot.nickname,
        "Starting tsqbot"
    );

    // Bind first so a taken port fails startup instead of leaving no control surface
    let listener = tokio::net::TcpListener::bind(config.http.address)
        .await
        .map_err(|e| {
            error!(address = %config.http.address, error = %e, "Failed to bind HTTP control surface");
            e
        })?;

    // Initialize database
    let db = Database::new(&config.database.path).await?;
    let store: Arc<dyn CredentialStore> = Arc::new(db);

    if let Some(seed) = &config.credentials {
        match store.get().await? {
            Some(_) => info!("Stored credentials found, ignoring config seed"),
            None => {
                store.upsert(seed.clone()).await?;
                info!(host = %seed.host, "Seeded credentials from config");
            }
        }
    }

    // Load chat commands
    let registry = Arc::new(CommandRegistry::load(&config.bot.commands_path));
    if registry.is_empty() {
        warn!(path = %config.bot.commands_path.display(), "No chat commands registered");
    }

    let connector = ServerQueryConnector {
        keepalive_interval: config.bot.keepalive_interval(),
        ..ServerQueryConnector::default()
    };
    let manager = SessionManager::new(&config, Arc::new(connector), registry);

    // Connect in the background so the HTTP surface is up immediately
    match store.get().await? {
        Some(credentials) => {
            let manager = Arc::clone(&manager);
            tokio::spawn(async move {
                if let Err(e) = manager.initialize(&credentials).await {
                    warn!(error = %e, "Initial connect failed; waiting for settings or a connect command");
                }
            });
        }
        None => info!("No credentials stored; waiting for settings over HTTP"),
    }

    let shutdown = CancellationToken::new();
    let mut server = tokio::spawn(http::run_http_server(
        listener,
        AppState {
            manager: Arc::clone(&manager),
            store,
        },
        shutdown.clone(),
    ));

    let stopped_early = tokio::select! {
        _ = shutdown_signal() => None,
        result = &mut server => Some(result),
    };

    info!("Shutting down");

    // Remove the announcement channel before the process goes away
    manager.disconnect().await;
    shutdown.cancel();

    let result = match stopped_early {
        Some(result) => result,
        None => server.await,
    };
    match result {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            error!(error = %e, "HTTP server error");
            return Err(e.into());
        }
        Err(e) => {
            error!(error = %e, "HTTP server task failed");
            return Err(e.into());
        }
    }

    info!("Shut down");
    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match format {
        LogFormat::Pretty => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init(),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to register SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }
}

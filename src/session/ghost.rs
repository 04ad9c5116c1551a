//! Eviction of stale bot sessions before connecting.

use tracing::{info, warn};
use tsq_proto::{KickScope, QueryClient, QueryConnector};

use super::nickname::is_ghost;
use crate::db::Credentials;
use crate::error::CleanupWarning;

const GHOST_KICK_REASON: &str = "Cleaning up ghost connection";

/// Kick every query client named after `base` from the server.
///
/// Runs on a short-lived auxiliary connection without a display name of its
/// own. Individual kick failures are logged and skipped. Returns the number
/// of clients evicted.
pub async fn evict_ghosts(
    connector: &dyn QueryConnector,
    credentials: &Credentials,
    base: &str,
) -> Result<usize, CleanupWarning> {
    let conn = connector
        .connect(&credentials.connect_params(None))
        .await
        .map_err(CleanupWarning::Ghosts)?;

    let result = sweep(conn.client.as_ref(), credentials, base).await;

    if let Err(e) = conn.client.quit().await {
        warn!(error = %e, "Failed to close cleanup connection");
    }
    result
}

async fn sweep(
    client: &dyn QueryClient,
    credentials: &Credentials,
    base: &str,
) -> Result<usize, CleanupWarning> {
    client
        .select_context(credentials.target())
        .await
        .map_err(CleanupWarning::Ghosts)?;

    let own_id = client.whoami().await.ok().and_then(|me| me.client_id);
    let clients = client.list_clients().await.map_err(CleanupWarning::Ghosts)?;

    let mut evicted = 0;
    for ghost in clients
        .iter()
        .filter(|c| Some(c.id) != own_id && is_ghost(c, base))
    {
        match client
            .kick_client(ghost.id, KickScope::Server, GHOST_KICK_REASON)
            .await
        {
            Ok(()) => {
                info!(client_id = %ghost.id, nickname = %ghost.nickname, "Cleaned up ghost client");
                evicted += 1;
            }
            Err(e) => {
                warn!(client_id = %ghost.id, nickname = %ghost.nickname, error = %e, "Failed to clean ghost client");
            }
        }
    }
    Ok(evicted)
}

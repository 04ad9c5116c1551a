//! Per-session event pump.
//!
//! One pump runs per live session and owns that session's event receiver.
//! Teardown cancels the pump; a pump that sees the transport close reports
//! it tagged with its session generation, so a late close from a replaced
//! session cannot clear the current one.

use std::sync::{Arc, Weak};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use tsq_proto::QueryEvent;

use super::SessionManager;
use crate::commands::Dispatcher;

pub(super) async fn pump(
    manager: Weak<SessionManager>,
    generation: u64,
    mut events: mpsc::UnboundedReceiver<QueryEvent>,
    dispatcher: Arc<Dispatcher>,
    cancel: CancellationToken,
) {
    let reason = loop {
        let event = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(generation, "Event pump stopped");
                return;
            }
            event = events.recv() => event,
        };

        match event {
            Some(QueryEvent::TextMessage(message)) => {
                // Mass commands pace themselves; keep reading so a close is noticed.
                let dispatcher = Arc::clone(&dispatcher);
                tokio::spawn(async move { dispatcher.handle(&message).await });
            }
            Some(QueryEvent::ClientEntered {
                client_id,
                nickname,
                ..
            }) => debug!(generation, %client_id, %nickname, "Client entered"),
            Some(QueryEvent::ClientLeft { client_id, .. }) => {
                debug!(generation, %client_id, "Client left")
            }
            Some(QueryEvent::Error(e)) => warn!(generation, error = %e, "Query transport error"),
            Some(QueryEvent::Closed { reason }) => break reason,
            None => break None,
        }
    };

    if let Some(manager) = manager.upgrade() {
        manager.transport_closed(generation, reason);
    }
}

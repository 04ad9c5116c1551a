//! Announcement channel: created or reused on connect, removed on teardown.

use tracing::{info, warn};
use tsq_proto::{ChannelId, ChannelProps, QueryClient, Result};

use crate::config::AnnouncementConfig;

/// Find or create the announcement channel and return its id.
///
/// An existing channel with exactly the configured name is reused. Further
/// channels carrying the same name are deleted so only one remains.
pub async fn ensure_channel(
    client: &dyn QueryClient,
    config: &AnnouncementConfig,
) -> Result<ChannelId> {
    let channels = client.list_channels().await?;
    let mut matching = channels.iter().filter(|c| c.name == config.name);

    if let Some(existing) = matching.next() {
        for duplicate in matching {
            match client.delete_channel(duplicate.id).await {
                Ok(()) => info!(channel_id = %duplicate.id, "Deleted duplicate announcement channel"),
                Err(e) => warn!(channel_id = %duplicate.id, error = %e, "Failed to delete duplicate announcement channel"),
            }
        }
        info!(channel_id = %existing.id, name = %existing.name, "Reusing announcement channel");
        return Ok(existing.id);
    }

    let props = ChannelProps {
        topic: Some(config.topic.clone()),
        description: Some(config.description.clone()),
        permanent: config.permanent,
        parent_id: ChannelId(0),
        order: 0,
    };
    let created = client.create_channel(&config.name, &props).await?;
    info!(channel_id = %created.id, name = %created.name, "Created announcement channel");
    Ok(created.id)
}

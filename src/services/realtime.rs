use redis::AsyncCommands;
use tracing::warn;

use crate::models::realtime::ChangeEvent;

/// Redis channel every connected console listens on.
pub const CHANGES_CHANNEL: &str = "canteen:changes";

pub struct RealtimeService;

impl RealtimeService {
    /// Fire-and-forget. Consoles also reconcile on a timer, so a lost event only delays them.
    pub async fn publish(redis: &mut redis::aio::MultiplexedConnection, event: &ChangeEvent) {
        let payload = match serde_json::to_string(event) {
            Ok(p) => p,
            Err(e) => {
                warn!("Failed to encode change event: {}", e);
                return;
            }
        };
        if let Err(e) = redis.publish::<_, _, ()>(CHANGES_CHANNEL, &payload).await {
            warn!("Failed to publish change event: {}", e);
        }
    }

    /// Unknown payloads still count as "something changed".
    pub fn parse(payload: &str) -> Option<ChangeEvent> {
        serde_json::from_str(payload).ok()
    }
}

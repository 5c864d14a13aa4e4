use std::collections::VecDeque;
use tokio::sync::broadcast;
use tracing::warn;

use super::events::{EventKind, RoomEvent};

/// One client's view of a room channel: buffered history first, then live
/// events in publish order.
///
/// Dropping the subscription (client disconnect included) detaches it from
/// the channel; nothing stored in the room is affected.
pub struct RoomSubscription {
    replay: VecDeque<RoomEvent>,
    live: broadcast::Receiver<RoomEvent>,
    kinds: Vec<EventKind>,
}

impl RoomSubscription {
    pub(super) fn new(
        replay: Vec<RoomEvent>,
        live: broadcast::Receiver<RoomEvent>,
        kinds: Vec<EventKind>,
    ) -> Self {
        Self {
            replay: replay.into(),
            live,
            kinds,
        }
    }

    /// Next event for this subscriber; `None` once the room's channel is
    /// gone and everything buffered has been drained.
    pub async fn next(&mut self) -> Option<RoomEvent> {
        if let Some(event) = self.replay.pop_front() {
            return Some(event);
        }

        loop {
            match self.live.recv().await {
                Ok(event) if self.kinds.contains(&event.kind()) => return Some(event),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    // Delivery is best-effort: a slow consumer loses events
                    // rather than stalling the publisher.
                    warn!(skipped, "Subscriber lagged behind room channel");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

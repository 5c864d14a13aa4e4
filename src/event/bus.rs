use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::debug;

use super::events::{EventKind, RoomEvent};
use super::history::{HistoryBuffer, HistoryConfig};
use super::subscription::RoomSubscription;
use crate::store::{KeyValueStore, StoreError};

const CHANNEL_CAPACITY: usize = 100;

/// Event bus fanning room events out to connected clients
///
/// Each room gets its own broadcast channel; publishes reach every live
/// subscriber at most once. Clients that subscribe later catch up through
/// the history buffer, not the channel.
#[derive(Clone)]
pub struct EventBus {
    /// Room-specific event channels: room_id -> sender
    channels: Arc<RwLock<HashMap<String, broadcast::Sender<RoomEvent>>>>,
    history: HistoryBuffer,
}

impl EventBus {
    pub fn new(store: Arc<dyn KeyValueStore>, history_config: HistoryConfig) -> Self {
        Self {
            channels: Arc::new(RwLock::new(HashMap::new())),
            history: HistoryBuffer::new(store, history_config),
        }
    }

    /// Records the event in the room's history buffer, then delivers it to
    /// every currently subscribed client.
    pub async fn publish(&self, room_id: &str, event: RoomEvent) -> Result<(), StoreError> {
        self.history.record(room_id, &event).await?;

        let sender = self.channel(room_id).await;
        match sender.send(event) {
            Ok(receivers) => {
                debug!(
                    room_id = %room_id,
                    receivers,
                    "Room event published"
                );
            }
            Err(_) => {
                debug!(room_id = %room_id, "Room event published with no receivers");
            }
        }
        Ok(())
    }

    /// Subscribes to a room's channel: buffered history matching the filter
    /// first, then live events in publish order. Dropping the subscription
    /// releases the registration.
    pub async fn subscribe(
        &self,
        room_id: &str,
        kinds: &[EventKind],
    ) -> Result<RoomSubscription, StoreError> {
        // Replay is read before attaching to the live channel; an event
        // published in between is missed rather than delivered twice.
        let replay = self.history.replay(room_id, kinds).await?;
        let receiver = self.channel(room_id).await.subscribe();

        debug!(
            room_id = %room_id,
            replayed = replay.len(),
            "Subscription opened"
        );
        Ok(RoomSubscription::new(replay, receiver, kinds.to_vec()))
    }

    /// Drops the room's channel; live subscriptions end once they drain.
    pub async fn close_channel(&self, room_id: &str) {
        let removed = self.channels.write().await.remove(room_id).is_some();
        if removed {
            debug!(room_id = %room_id, "Room channel closed");
        }
    }

    async fn channel(&self, room_id: &str) -> broadcast::Sender<RoomEvent> {
        {
            let channels = self.channels.read().await;
            if let Some(sender) = channels.get(room_id) {
                return sender.clone();
            }
        }

        let mut channels = self.channels.write().await;
        channels
            .entry(room_id.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .clone()
    }
}

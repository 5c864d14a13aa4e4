use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use super::events::{EventKind, RoomEvent};
use crate::room::models::history_key;
use crate::store::{with_backoff, KeyValueStore, StoreError};

/// Limits on the per-room replay buffer
#[derive(Debug, Clone)]
pub struct HistoryConfig {
    /// Most recent entries kept per room.
    pub max_len: usize,
    /// Entries older than this are not replayed.
    pub max_age: Duration,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_len: 100,
            max_age: Duration::from_secs(60 * 60), // 1 hour
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct HistoryEntry {
    at: i64,
    event: RoomEvent,
}

/// Bounded recent-event cache, replayed to newly subscribed clients.
///
/// Not the authoritative message log: it caps by count and age, and shares
/// the room's expiry like every other room-scoped key.
#[derive(Clone)]
pub struct HistoryBuffer {
    store: Arc<dyn KeyValueStore>,
    config: HistoryConfig,
}

impl HistoryBuffer {
    pub fn new(store: Arc<dyn KeyValueStore>, config: HistoryConfig) -> Self {
        Self { store, config }
    }

    /// Records a published event, dropping the oldest entries past the cap.
    pub async fn record(&self, room_id: &str, event: &RoomEvent) -> Result<(), StoreError> {
        let entry = HistoryEntry {
            at: Utc::now().timestamp_millis(),
            event: event.clone(),
        };
        let raw = serde_json::to_string(&entry)
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        let key = history_key(room_id);
        self.store.list_append(&key, &raw).await?;
        self.store.list_trim_to_last(&key, self.config.max_len).await?;
        Ok(())
    }

    /// Recent events matching the kind filter, oldest first.
    pub async fn replay(
        &self,
        room_id: &str,
        kinds: &[EventKind],
    ) -> Result<Vec<RoomEvent>, StoreError> {
        let key = history_key(room_id);
        let raw = with_backoff("history replay", || self.store.list_range(&key)).await?;

        let oldest_allowed =
            Utc::now().timestamp_millis() - self.config.max_age.as_millis() as i64;

        let mut events = Vec::new();
        for item in raw {
            match serde_json::from_str::<HistoryEntry>(&item) {
                Ok(entry) => {
                    if entry.at >= oldest_allowed && kinds.contains(&entry.event.kind()) {
                        events.push(entry.event);
                    }
                }
                Err(e) => {
                    warn!(room_id = %room_id, error = %e, "Skipping malformed history entry");
                }
            }
        }
        Ok(events)
    }
}

use chrono::Utc;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use super::models::Message;
use crate::event::{EventBus, RoomEvent};
use crate::room::models::{messages_key, RoomMeta, RoomState};
use crate::room::TtlSynchronizer;
use crate::shared::AppError;
use crate::store::{with_backoff, KeyValueStore};

/// Append-only per-room message log with authorship-aware replay.
pub struct MessageStore {
    store: Arc<dyn KeyValueStore>,
    event_bus: EventBus,
    ttl: TtlSynchronizer,
}

impl MessageStore {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        event_bus: EventBus,
        ttl: TtlSynchronizer,
    ) -> Self {
        Self {
            store,
            event_bus,
            ttl,
        }
    }

    /// Appends a message to the room's log and relays it live.
    ///
    /// The caller has already authenticated `owner_token`; the room may
    /// still have vanished in between, which surfaces as `RoomNotFound`.
    /// Publish happens before the touch so the history entry it writes is
    /// covered by the same expiry pass as the log itself.
    #[instrument(skip(self, text, owner_token))]
    pub async fn append(
        &self,
        room_id: &str,
        sender: &str,
        text: &str,
        owner_token: &str,
    ) -> Result<Message, AppError> {
        self.require_live_room(room_id).await?;

        let message = Message {
            id: Uuid::new_v4().simple().to_string(),
            sender: sender.to_string(),
            text: text.to_string(),
            timestamp: Utc::now().timestamp_millis(),
            room_id: room_id.to_string(),
            token: Some(owner_token.to_string()),
        };

        let raw = serde_json::to_string(&message).map_err(|_| AppError::Internal)?;
        self.store
            .list_append(&messages_key(room_id), &raw)
            .await?;

        self.event_bus
            .publish(room_id, RoomEvent::Message(message.redacted()))
            .await?;
        self.ttl.touch(room_id).await?;

        info!(
            room_id = %room_id,
            message_id = %message.id,
            "Message appended"
        );
        Ok(message)
    }

    /// The room's full log in append order, redacted for the requester: a
    /// client recognizes its own messages and never sees a foreign token.
    #[instrument(skip(self, requesting_token))]
    pub async fn list(
        &self,
        room_id: &str,
        requesting_token: &str,
    ) -> Result<Vec<Message>, AppError> {
        self.require_live_room(room_id).await?;

        let key = messages_key(room_id);
        let raw = with_backoff("list messages", || self.store.list_range(&key)).await?;

        raw.iter()
            .map(|item| {
                serde_json::from_str::<Message>(item)
                    .map(|message| message.redacted_for(requesting_token))
                    .map_err(|_| AppError::Internal)
            })
            .collect()
    }

    async fn require_live_room(&self, room_id: &str) -> Result<(), AppError> {
        match RoomMeta::load(self.store.as_ref(), room_id).await? {
            Some(meta) if meta.state == RoomState::Active => Ok(()),
            _ => Err(AppError::RoomNotFound),
        }
    }
}

use std::sync::Arc;
use tracing::{debug, info, instrument};

use super::models::{
    meta_key, room_keys, RoomConfig, RoomMeta, RoomState, FIELD_STATE, STATE_ACTIVE,
    STATE_DESTROYED,
};
use crate::access::AccessGate;
use crate::event::{EventBus, RoomEvent};
use crate::shared::AppError;
use crate::store::KeyValueStore;

/// Authenticated, idempotent room teardown.
///
/// The transition from alive to destroyed is claimed with a conditional
/// update on the state field, so exactly one caller publishes
/// `chat.destroy` no matter how many race; everyone else observes the room
/// already gone and succeeds as a no-op.
pub struct DestroySequencer {
    store: Arc<dyn KeyValueStore>,
    event_bus: EventBus,
    gate: AccessGate,
}

impl DestroySequencer {
    pub fn new(store: Arc<dyn KeyValueStore>, event_bus: EventBus, config: RoomConfig) -> Self {
        let gate = AccessGate::new(Arc::clone(&store), config);
        Self {
            store,
            event_bus,
            gate,
        }
    }

    /// Tears the room down: publish `chat.destroy` so connected clients can
    /// react, then remove every room-scoped key as one teardown.
    #[instrument(skip(self, requesting_token))]
    pub async fn destroy(
        &self,
        room_id: &str,
        requesting_token: &str,
    ) -> Result<(), AppError> {
        let meta = match RoomMeta::load(self.store.as_ref(), room_id).await? {
            Some(meta) => meta,
            None => {
                debug!(room_id = %room_id, "Room already gone, destroy is a no-op");
                return Ok(());
            }
        };
        if meta.state == RoomState::Destroyed {
            debug!(room_id = %room_id, "Room already torn down, destroy is a no-op");
            return Ok(());
        }

        self.gate.authenticate(room_id, requesting_token).await?;

        // Claim the alive -> destroyed transition; only the winner may
        // publish and delete.
        let claimed = self
            .store
            .hash_compare_and_swap(
                &meta_key(room_id),
                FIELD_STATE,
                Some(STATE_ACTIVE),
                STATE_DESTROYED,
            )
            .await?;
        if !claimed {
            debug!(room_id = %room_id, "Lost destroy race, teardown already underway");
            return Ok(());
        }

        self.event_bus
            .publish(room_id, RoomEvent::destroy())
            .await?;

        let keys = room_keys(room_id);
        let key_refs: Vec<&str> = keys.iter().map(String::as_str).collect();
        self.store.delete(&key_refs).await?;
        self.event_bus.close_channel(room_id).await;

        info!(room_id = %room_id, "Room destroyed");
        Ok(())
    }
}

use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, instrument};

use super::models::{meta_key, room_keys, RoomConfig, RoomMeta};
use crate::shared::AppError;
use crate::store::{with_backoff, KeyTtl, KeyValueStore};

/// Keeps every room-scoped key expiring at the same instant.
///
/// This is the only place that writes expiries to more than one key. The
/// authoritative remaining lifetime is the meta key's TTL, clamped to the
/// ceiling fixed at creation - a touch can tighten or preserve an expiry,
/// never extend it.
pub struct TtlSynchronizer {
    store: Arc<dyn KeyValueStore>,
    config: RoomConfig,
}

impl TtlSynchronizer {
    pub fn new(store: Arc<dyn KeyValueStore>, config: RoomConfig) -> Self {
        Self { store, config }
    }

    /// Re-applies the room's single authoritative expiry to metadata,
    /// message log and history buffer.
    #[instrument(skip(self))]
    pub async fn touch(&self, room_id: &str) -> Result<(), AppError> {
        let meta = RoomMeta::load(self.store.as_ref(), room_id)
            .await?
            .ok_or(AppError::RoomNotFound)?;

        let key = meta_key(room_id);
        let current = with_backoff("meta ttl", || self.store.time_to_live(&key)).await?;
        let current = match current {
            KeyTtl::Expires(left) => left,
            KeyTtl::Missing => return Err(AppError::RoomNotFound),
            KeyTtl::NoExpiry => return Err(AppError::Internal),
        };

        let ceiling = meta.remaining_ceiling(Utc::now(), self.config.max_lifetime);
        let expiry = current.min(ceiling);

        for key in room_keys(room_id) {
            // Absent keys (e.g. a log with no messages yet) are skipped;
            // they pick up the shared expiry on the touch after they appear.
            self.store.expire(&key, expiry).await?;
        }

        debug!(
            room_id = %room_id,
            expiry_secs = expiry.as_secs(),
            "Room artifacts re-synchronized"
        );
        Ok(())
    }
}

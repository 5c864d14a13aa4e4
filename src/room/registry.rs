use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use super::models::{meta_key, RoomConfig, RoomMeta, RoomState};
use crate::shared::AppError;
use crate::store::{with_backoff, KeyTtl, KeyValueStore};

/// Owns room metadata: creation, existence, remaining lifetime, membership.
pub struct RoomRegistry {
    store: Arc<dyn KeyValueStore>,
    config: RoomConfig,
}

impl RoomRegistry {
    pub fn new(store: Arc<dyn KeyValueStore>, config: RoomConfig) -> Self {
        Self { store, config }
    }

    /// Creates a new room with a fresh unguessable identifier and an empty
    /// membership. The meta key starts expiring immediately; its initial TTL
    /// is the lifetime ceiling every later touch is clamped to.
    #[instrument(skip(self))]
    pub async fn create(&self) -> Result<String, AppError> {
        let room_id = Uuid::new_v4().simple().to_string();
        let meta = RoomMeta::new_active(Utc::now());

        let fields = meta.to_fields()?;
        let field_refs: Vec<(&str, &str)> = fields
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
            .collect();

        let key = meta_key(&room_id);
        self.store.hash_set(&key, &field_refs).await?;
        self.store.expire(&key, self.config.max_lifetime).await?;

        info!(room_id = %room_id, "Room created");
        Ok(room_id)
    }

    /// Whether the room's metadata is present, unexpired and not torn down.
    #[instrument(skip(self))]
    pub async fn exists(&self, room_id: &str) -> Result<bool, AppError> {
        let meta = RoomMeta::load(self.store.as_ref(), room_id).await?;
        Ok(matches!(
            meta,
            Some(RoomMeta {
                state: RoomState::Active,
                ..
            })
        ))
    }

    /// Time until the room's shared expiry.
    #[instrument(skip(self))]
    pub async fn remaining_lifetime(&self, room_id: &str) -> Result<Duration, AppError> {
        if !self.exists(room_id).await? {
            debug!(room_id = %room_id, "Room not found for ttl query");
            return Err(AppError::RoomNotFound);
        }

        let key = meta_key(room_id);
        let ttl = with_backoff("meta ttl", || self.store.time_to_live(&key)).await?;
        match ttl {
            KeyTtl::Expires(left) => Ok(left),
            KeyTtl::Missing => Err(AppError::RoomNotFound),
            // Room metadata is always written with an expiry; a key without
            // one is corrupt state, not a live room.
            KeyTtl::NoExpiry => Err(AppError::Internal),
        }
    }

    /// The insertion-ordered member tokens of the room.
    #[instrument(skip(self))]
    pub async fn membership(&self, room_id: &str) -> Result<Vec<String>, AppError> {
        match RoomMeta::load(self.store.as_ref(), room_id).await? {
            Some(meta) if meta.state == RoomState::Active => Ok(meta.connected),
            _ => Err(AppError::RoomNotFound),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::test_utils::test_state;
    use tokio::time::advance;

    fn registry(state: &crate::shared::AppState) -> RoomRegistry {
        RoomRegistry::new(Arc::clone(&state.store), state.config.clone())
    }

    #[tokio::test]
    async fn test_create_and_exists() {
        let state = test_state();
        let registry = registry(&state);

        let room_id = registry.create().await.unwrap();
        assert!(!room_id.is_empty());
        assert!(registry.exists(&room_id).await.unwrap());
        assert!(!registry.exists("nonexistent").await.unwrap());
    }

    #[tokio::test]
    async fn test_create_generates_unique_ids() {
        let state = test_state();
        let registry = registry(&state);

        let first = registry.create().await.unwrap();
        let second = registry.create().await.unwrap();
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn test_new_room_has_empty_membership() {
        let state = test_state();
        let registry = registry(&state);

        let room_id = registry.create().await.unwrap();
        let members = registry.membership(&room_id).await.unwrap();
        assert!(members.is_empty());
    }

    #[tokio::test]
    async fn test_membership_of_missing_room_fails() {
        let state = test_state();
        let registry = registry(&state);

        assert!(matches!(
            registry.membership("nonexistent").await,
            Err(AppError::RoomNotFound)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_remaining_lifetime_counts_down() {
        let state = test_state();
        let registry = registry(&state);

        let room_id = registry.create().await.unwrap();
        let initial = registry.remaining_lifetime(&room_id).await.unwrap();
        assert_eq!(initial, Duration::from_secs(600));

        advance(Duration::from_secs(100)).await;
        let later = registry.remaining_lifetime(&room_id).await.unwrap();
        assert_eq!(later, Duration::from_secs(500));
    }

    #[tokio::test]
    async fn test_remaining_lifetime_of_missing_room_fails() {
        let state = test_state();
        let registry = registry(&state);

        assert!(matches!(
            registry.remaining_lifetime("nonexistent").await,
            Err(AppError::RoomNotFound)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_room_expires_after_max_lifetime() {
        let state = test_state();
        let registry = registry(&state);

        let room_id = registry.create().await.unwrap();
        advance(Duration::from_secs(601)).await;

        assert!(!registry.exists(&room_id).await.unwrap());
        assert!(matches!(
            registry.remaining_lifetime(&room_id).await,
            Err(AppError::RoomNotFound)
        ));
        assert!(matches!(
            registry.membership(&room_id).await,
            Err(AppError::RoomNotFound)
        ));
    }
}

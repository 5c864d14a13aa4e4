use chrono::{DateTime, TimeZone, Utc};
use std::collections::HashMap;
use std::time::Duration;

use crate::shared::AppError;
use crate::store::{with_backoff, KeyValueStore};

/// Hash field holding the JSON array of member tokens.
pub const FIELD_CONNECTED: &str = "connected";
/// Hash field holding the creation timestamp in unix milliseconds.
pub const FIELD_CREATED_AT: &str = "createdAt";
/// Hash field holding the room lifecycle state.
pub const FIELD_STATE: &str = "state";

pub const STATE_ACTIVE: &str = "active";
pub const STATE_DESTROYED: &str = "destroyed";

/// Runtime configuration for rooms
#[derive(Debug, Clone)]
pub struct RoomConfig {
    /// Fixed maximum lifetime of a room; the expiry ceiling of every
    /// room-scoped key.
    pub max_lifetime: Duration,
    /// Membership capacity.
    pub capacity: usize,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            max_lifetime: Duration::from_secs(60 * 10), // 10 minutes
            capacity: 2,
        }
    }
}

pub fn meta_key(room_id: &str) -> String {
    format!("meta:{room_id}")
}

pub fn messages_key(room_id: &str) -> String {
    format!("messages:{room_id}")
}

pub fn history_key(room_id: &str) -> String {
    format!("history:{room_id}")
}

/// All store keys scoped to one room; these expire in lockstep and are
/// removed together at teardown.
pub fn room_keys(room_id: &str) -> [String; 3] {
    [meta_key(room_id), messages_key(room_id), history_key(room_id)]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomState {
    Active,
    Destroyed,
}

/// Room metadata as stored in the `meta:{roomId}` hash.
#[derive(Debug, Clone)]
pub struct RoomMeta {
    pub connected: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub state: RoomState,
}

impl RoomMeta {
    /// Fresh metadata for a just-created room.
    pub fn new_active(created_at: DateTime<Utc>) -> Self {
        Self {
            connected: Vec::new(),
            created_at,
            state: RoomState::Active,
        }
    }

    /// Serializes into the stored hash field pairs.
    pub fn to_fields(&self) -> Result<Vec<(String, String)>, AppError> {
        let connected =
            serde_json::to_string(&self.connected).map_err(|_| AppError::Internal)?;
        let state = match self.state {
            RoomState::Active => STATE_ACTIVE,
            RoomState::Destroyed => STATE_DESTROYED,
        };
        Ok(vec![
            (FIELD_CONNECTED.to_string(), connected),
            (
                FIELD_CREATED_AT.to_string(),
                self.created_at.timestamp_millis().to_string(),
            ),
            (FIELD_STATE.to_string(), state.to_string()),
        ])
    }

    /// Parses the stored hash fields; fails on data the service itself never
    /// writes.
    pub fn from_fields(fields: &HashMap<String, String>) -> Result<Self, AppError> {
        let connected = match fields.get(FIELD_CONNECTED) {
            Some(raw) => serde_json::from_str(raw).map_err(|_| AppError::Internal)?,
            None => Vec::new(),
        };

        let created_ms = fields
            .get(FIELD_CREATED_AT)
            .and_then(|raw| raw.parse::<i64>().ok())
            .ok_or(AppError::Internal)?;
        let created_at = Utc
            .timestamp_millis_opt(created_ms)
            .single()
            .ok_or(AppError::Internal)?;

        let state = match fields.get(FIELD_STATE).map(String::as_str) {
            Some(STATE_DESTROYED) => RoomState::Destroyed,
            Some(STATE_ACTIVE) | None => RoomState::Active,
            Some(_) => return Err(AppError::Internal),
        };

        Ok(Self {
            connected,
            created_at,
            state,
        })
    }

    /// Loads the metadata of a live (possibly destroyed, never expired)
    /// room. `None` means the meta key is absent from the store.
    pub async fn load(
        store: &dyn KeyValueStore,
        room_id: &str,
    ) -> Result<Option<Self>, AppError> {
        let key = meta_key(room_id);
        let fields = with_backoff("load room meta", || store.hash_get_all(&key)).await?;
        match fields {
            Some(fields) => Ok(Some(Self::from_fields(&fields)?)),
            None => Ok(None),
        }
    }

    /// Time left until the room's original lifetime ceiling. The ceiling is
    /// fixed at creation; this only ever shrinks.
    pub fn remaining_ceiling(&self, now: DateTime<Utc>, max_lifetime: Duration) -> Duration {
        let elapsed = (now - self.created_at).to_std().unwrap_or(Duration::ZERO);
        max_lifetime.saturating_sub(elapsed)
    }
}

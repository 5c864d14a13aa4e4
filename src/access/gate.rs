use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::room::models::{meta_key, RoomConfig, RoomMeta, RoomState, FIELD_CONNECTED};
use crate::shared::AppError;
use crate::store::KeyValueStore;

/// Attempts before an admission gives up on a contended membership field.
/// With capacity 2 a loser converges after one re-read; the bound only
/// guards against a misbehaving store.
const ADMIT_ATTEMPTS: u32 = 8;
const ADMIT_RETRY_DELAY: Duration = Duration::from_millis(5);

/// Race-safe admission and per-request authentication.
///
/// Admission is a compare-and-swap loop over the `connected` field: the
/// membership read and the conditional append land on the store as one
/// atomic step, so two admissions racing for the last slot can never both
/// commit. Rooms contend only with themselves.
pub struct AccessGate {
    store: Arc<dyn KeyValueStore>,
    config: RoomConfig,
}

impl AccessGate {
    pub fn new(store: Arc<dyn KeyValueStore>, config: RoomConfig) -> Self {
        Self { store, config }
    }

    /// Admits a participant into the room, returning their bearer token.
    ///
    /// Re-presenting a token that is already a member returns it unchanged
    /// without consuming a slot. Otherwise a fresh token is appended,
    /// provided the membership stays within capacity - first committed
    /// write wins the last slot, the loser fails with `RoomFull`.
    #[instrument(skip(self, existing))]
    pub async fn admit(
        &self,
        room_id: &str,
        existing: Option<&str>,
    ) -> Result<String, AppError> {
        let key = meta_key(room_id);

        for attempt in 1..=ADMIT_ATTEMPTS {
            let fields = self
                .store
                .hash_get_all(&key)
                .await?
                .ok_or(AppError::RoomNotFound)?;
            let meta = RoomMeta::from_fields(&fields)?;
            if meta.state != RoomState::Active {
                return Err(AppError::RoomNotFound);
            }

            if let Some(token) = existing {
                if meta.connected.iter().any(|member| member == token) {
                    debug!(room_id = %room_id, "Known member re-entered");
                    return Ok(token.to_string());
                }
            }

            if meta.connected.len() >= self.config.capacity {
                debug!(room_id = %room_id, "Room is full");
                return Err(AppError::RoomFull);
            }

            // The raw field value read above is the CAS expectation; any
            // concurrent membership change makes the swap fail and sends us
            // back to a fresh read.
            let expected = fields
                .get(FIELD_CONNECTED)
                .cloned()
                .unwrap_or_else(|| "[]".to_string());

            let token = Uuid::new_v4().simple().to_string();
            let mut updated = meta.connected;
            updated.push(token.clone());
            let replacement =
                serde_json::to_string(&updated).map_err(|_| AppError::Internal)?;

            let swapped = self
                .store
                .hash_compare_and_swap(&key, FIELD_CONNECTED, Some(&expected), &replacement)
                .await?;
            if swapped {
                info!(
                    room_id = %room_id,
                    member_count = updated.len(),
                    "Participant admitted"
                );
                return Ok(token);
            }

            debug!(room_id = %room_id, attempt, "Admission raced, retrying");
            sleep(ADMIT_RETRY_DELAY).await;
        }

        warn!(room_id = %room_id, "Admission retries exhausted");
        Err(AppError::ServiceUnavailable)
    }

    /// Verifies that `token` is a current member of a live room. Gates every
    /// room-scoped operation.
    #[instrument(skip(self, token))]
    pub async fn authenticate(&self, room_id: &str, token: &str) -> Result<(), AppError> {
        if token.is_empty() {
            return Err(AppError::Unauthorized);
        }

        let meta = RoomMeta::load(self.store.as_ref(), room_id)
            .await?
            .ok_or(AppError::Unauthorized)?;
        if meta.state != RoomState::Active {
            return Err(AppError::Unauthorized);
        }

        if meta.connected.iter().any(|member| member == token) {
            Ok(())
        } else {
            debug!(room_id = %room_id, "Token is not a member");
            Err(AppError::Unauthorized)
        }
    }
}

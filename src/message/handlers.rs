use axum::{
    extract::{Query, State},
    http::HeaderMap,
    Json,
};
use std::sync::Arc;
use tracing::{info, instrument, warn};

use super::models::Message;
use super::store::MessageStore;
use super::types::PostMessageRequest;
use crate::access::{token_from_headers, AccessGate};
use crate::room::types::RoomQuery;
use crate::room::TtlSynchronizer;
use crate::shared::{AppError, AppState};

const MAX_SENDER_CHARS: usize = 100;
const MAX_TEXT_CHARS: usize = 1000;

fn message_store(state: &AppState) -> MessageStore {
    MessageStore::new(
        Arc::clone(&state.store),
        state.event_bus.clone(),
        TtlSynchronizer::new(Arc::clone(&state.store), state.config.clone()),
    )
}

/// Authenticates the cookie-borne token against the room.
async fn authenticated_token(
    state: &AppState,
    room_id: &str,
    headers: &HeaderMap,
) -> Result<String, AppError> {
    let token = token_from_headers(headers).ok_or_else(|| {
        warn!(room_id = %room_id, "Missing auth cookie");
        AppError::Unauthorized
    })?;

    let gate = AccessGate::new(Arc::clone(&state.store), state.config.clone());
    gate.authenticate(room_id, &token).await?;
    Ok(token)
}

/// HTTP handler for posting a message to a room
///
/// POST /messages?roomId with body {"sender", "text"}
#[instrument(name = "post_message", skip(state, headers, request))]
pub async fn post_message(
    State(state): State<AppState>,
    Query(query): Query<RoomQuery>,
    headers: HeaderMap,
    Json(request): Json<PostMessageRequest>,
) -> Result<Json<Message>, AppError> {
    if request.sender.chars().count() > MAX_SENDER_CHARS {
        return Err(AppError::Validation(format!(
            "sender exceeds {MAX_SENDER_CHARS} characters"
        )));
    }
    if request.text.chars().count() > MAX_TEXT_CHARS {
        return Err(AppError::Validation(format!(
            "text exceeds {MAX_TEXT_CHARS} characters"
        )));
    }

    let token = authenticated_token(&state, &query.room_id, &headers).await?;
    let message = message_store(&state)
        .append(&query.room_id, &request.sender, &request.text, &token)
        .await?;

    info!(
        room_id = %query.room_id,
        message_id = %message.id,
        "Message posted"
    );
    Ok(Json(message))
}

/// HTTP handler for listing a room's messages
///
/// GET /messages?roomId
/// Returns the log redacted for the requesting token.
#[instrument(name = "list_messages", skip(state, headers))]
pub async fn list_messages(
    State(state): State<AppState>,
    Query(query): Query<RoomQuery>,
    headers: HeaderMap,
) -> Result<Json<Vec<Message>>, AppError> {
    let token = authenticated_token(&state, &query.room_id, &headers).await?;
    let messages = message_store(&state)
        .list(&query.room_id, &token)
        .await?;

    Ok(Json(messages))
}

use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{AppendHeaders, IntoResponse},
    Json,
};
use std::sync::Arc;
use tracing::{info, instrument, warn};

use super::destroy::DestroySequencer;
use super::registry::RoomRegistry;
use super::types::{
    DestroyQuery, JoinRoomResponse, RoomCreateResponse, RoomQuery, RoomTtlResponse,
};
use crate::access::{auth_cookie, token_from_headers, AccessGate};
use crate::shared::{AppError, AppState};

/// HTTP handler for creating a new room
///
/// POST /room/create
/// Returns the generated room identifier
#[instrument(name = "create_room", skip(state))]
pub async fn create_room(
    State(state): State<AppState>,
) -> Result<Json<RoomCreateResponse>, AppError> {
    let registry = RoomRegistry::new(Arc::clone(&state.store), state.config.clone());
    let room_id = registry.create().await?;

    info!(room_id = %room_id, "Room created via API");
    Ok(Json(RoomCreateResponse { room_id }))
}

/// HTTP handler for joining a room
///
/// POST /room/join?roomId
/// Admits the caller (idempotently when the auth cookie already names a
/// member) and sets the token cookie, scoped to the room's remaining
/// lifetime.
#[instrument(name = "join_room", skip(state, headers))]
pub async fn join_room(
    State(state): State<AppState>,
    Query(query): Query<RoomQuery>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let existing = token_from_headers(&headers);

    let gate = AccessGate::new(Arc::clone(&state.store), state.config.clone());
    let token = gate.admit(&query.room_id, existing.as_deref()).await?;

    let registry = RoomRegistry::new(Arc::clone(&state.store), state.config.clone());
    let remaining = registry.remaining_lifetime(&query.room_id).await?;

    info!(room_id = %query.room_id, "Participant joined via API");
    Ok((
        AppendHeaders([(header::SET_COOKIE, auth_cookie(&token, remaining))]),
        Json(JoinRoomResponse { token }),
    ))
}

/// HTTP handler for the self-destruct countdown
///
/// GET /room/ttl?roomId
#[instrument(name = "room_ttl", skip(state))]
pub async fn room_ttl(
    State(state): State<AppState>,
    Query(query): Query<RoomQuery>,
) -> Result<Json<RoomTtlResponse>, AppError> {
    let registry = RoomRegistry::new(Arc::clone(&state.store), state.config.clone());
    let remaining = registry.remaining_lifetime(&query.room_id).await?;

    Ok(Json(RoomTtlResponse {
        ttl: remaining.as_secs(),
    }))
}

/// HTTP handler for destroying a room
///
/// DELETE /room?roomId[&token] with the token in the query or the auth
/// cookie
#[instrument(name = "destroy_room", skip(state, headers))]
pub async fn destroy_room(
    State(state): State<AppState>,
    Query(query): Query<DestroyQuery>,
    headers: HeaderMap,
) -> Result<StatusCode, AppError> {
    let token = query
        .token
        .clone()
        .or_else(|| token_from_headers(&headers))
        .ok_or_else(|| {
            warn!(room_id = %query.room_id, "Destroy without a token");
            AppError::Unauthorized
        })?;

    let sequencer = DestroySequencer::new(
        Arc::clone(&state.store),
        state.event_bus.clone(),
        state.config.clone(),
    );
    sequencer.destroy(&query.room_id, &token).await?;

    Ok(StatusCode::NO_CONTENT)
}

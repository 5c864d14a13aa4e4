use axum::{
    extract::{
        ws::{Message as WsMessage, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    http::HeaderMap,
    response::Response,
};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::access::{token_from_headers, AccessGate};
use crate::event::{EventKind, RoomEvent, RoomSubscription};
use crate::room::types::RoomQuery;
use crate::shared::{AppError, AppState};

/// WebSocket endpoint streaming a room's events to an authenticated member
///
/// GET /room/subscribe?roomId with the auth cookie. Buffered history is
/// replayed first, then live events; the socket closes after a destroy
/// frame or when the client hangs up.
#[instrument(name = "subscribe_room", skip(ws, state, headers))]
pub async fn subscribe_room(
    ws: WebSocketUpgrade,
    Query(query): Query<RoomQuery>,
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<Response, AppError> {
    let token = token_from_headers(&headers).ok_or_else(|| {
        warn!(room_id = %query.room_id, "Subscribe without auth cookie");
        AppError::Unauthorized
    })?;

    let gate = AccessGate::new(Arc::clone(&state.store), state.config.clone());
    gate.authenticate(&query.room_id, &token).await?;

    let subscription = state
        .event_bus
        .subscribe(&query.room_id, &[EventKind::Message, EventKind::Destroy])
        .await?;

    info!(room_id = %query.room_id, "Event stream authenticated");
    let room_id = query.room_id;
    Ok(ws.on_upgrade(move |socket| relay_events(socket, room_id, subscription)))
}

/// Forwards room events to the client until the room channel ends or the
/// client disconnects. Dropping the subscription on the way out releases
/// the channel registration.
async fn relay_events(
    mut socket: WebSocket,
    room_id: String,
    mut subscription: RoomSubscription,
) {
    info!(room_id = %room_id, "Event stream opened");

    loop {
        tokio::select! {
            event = subscription.next() => {
                let Some(event) = event else {
                    debug!(room_id = %room_id, "Room channel ended");
                    break;
                };

                let frame = match serde_json::to_string(&event) {
                    Ok(frame) => frame,
                    Err(e) => {
                        warn!(room_id = %room_id, error = %e, "Failed to encode event");
                        continue;
                    }
                };
                if socket.send(WsMessage::Text(frame)).await.is_err() {
                    debug!(room_id = %room_id, "Client went away mid-send");
                    break;
                }

                if matches!(event, RoomEvent::Destroy(_)) {
                    let _ = socket.send(WsMessage::Close(None)).await;
                    break;
                }
            }

            inbound = socket.recv() => {
                match inbound {
                    // This stream is outbound-only; anything the client
                    // sends besides a close is ignored.
                    Some(Ok(WsMessage::Close(_))) | None => break,
                    Some(Err(_)) => break,
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    info!(room_id = %room_id, "Event stream closed");
}

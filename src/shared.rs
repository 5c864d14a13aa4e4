use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;

use crate::event::EventBus;
use crate::room::RoomConfig;
use crate::store::{KeyValueStore, StoreError};

/// Shared application state containing all dependencies
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn KeyValueStore>,
    pub event_bus: EventBus,
    pub config: RoomConfig,
}

impl AppState {
    pub fn new(store: Arc<dyn KeyValueStore>, event_bus: EventBus, config: RoomConfig) -> Self {
        Self {
            store,
            event_bus,
            config,
        }
    }
}

/// Error taxonomy for room-scoped operations.
///
/// `RoomNotFound`, `RoomFull` and `Unauthorized` are terminal for the
/// caller; `ServiceUnavailable` is the transient store/transport case after
/// bounded retries.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Room not found")]
    RoomNotFound,

    #[error("Room is full")]
    RoomFull,

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Service unavailable")]
    ServiceUnavailable,

    #[error("Internal server error")]
    Internal,
}

impl From<StoreError> for AppError {
    fn from(_: StoreError) -> Self {
        AppError::ServiceUnavailable
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            AppError::RoomNotFound => StatusCode::NOT_FOUND,
            AppError::RoomFull => StatusCode::CONFLICT,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

use serde::{Deserialize, Serialize};

/// Query string carried by every room-scoped endpoint
#[derive(Debug, Deserialize)]
pub struct RoomQuery {
    #[serde(rename = "roomId")]
    pub room_id: String,
}

/// Query string for the destroy endpoint; the token may ride in the query
/// or in the auth cookie
#[derive(Debug, Deserialize)]
pub struct DestroyQuery {
    #[serde(rename = "roomId")]
    pub room_id: String,
    pub token: Option<String>,
}

/// Response for room creation
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomCreateResponse {
    pub room_id: String,
}

/// Response for the remaining-lifetime query
#[derive(Debug, Serialize, Deserialize)]
pub struct RoomTtlResponse {
    /// Seconds until the room self-destructs.
    pub ttl: u64,
}

/// Response for a successful admission
#[derive(Debug, Serialize, Deserialize)]
pub struct JoinRoomResponse {
    pub token: String,
}

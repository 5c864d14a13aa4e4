use serde::{Deserialize, Serialize};

use crate::message::Message;

/// Events published on a room's channel
///
/// Events represent facts about things that have already happened. The
/// message variant carries the already-redacted message - the bus never
/// sees a raw owner token, so no subscriber can either.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum RoomEvent {
    /// A chat message was appended to the room's log
    #[serde(rename = "chat.message")]
    Message(Message),

    /// The room was irrevocably torn down
    #[serde(rename = "chat.destroy")]
    Destroy(DestroyNotice),
}

/// Payload of a `chat.destroy` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DestroyNotice {
    pub is_destroyed: bool,
}

/// Event kind used for subscription filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Message,
    Destroy,
}

impl RoomEvent {
    pub fn destroy() -> Self {
        RoomEvent::Destroy(DestroyNotice { is_destroyed: true })
    }

    pub fn kind(&self) -> EventKind {
        match self {
            RoomEvent::Message(_) => EventKind::Message,
            RoomEvent::Destroy(_) => EventKind::Destroy,
        }
    }

    /// Wire name of the event type
    pub fn event_type(&self) -> &'static str {
        match self {
            RoomEvent::Message(_) => "chat.message",
            RoomEvent::Destroy(_) => "chat.destroy",
        }
    }
}

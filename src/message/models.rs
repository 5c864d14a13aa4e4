use serde::{Deserialize, Serialize};

/// One chat message, immutable once appended.
///
/// The stored form always carries the author's token; every outward-facing
/// form goes through one of the redaction helpers first so a credential
/// never leaves the server except to its own holder.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub sender: String,
    pub text: String,
    /// Unix milliseconds.
    pub timestamp: i64,
    pub room_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl Message {
    /// Copy with the owner token stripped, for publication to subscribers.
    pub fn redacted(&self) -> Self {
        Self {
            token: None,
            ..self.clone()
        }
    }

    /// Copy keeping the owner token only when the viewer authored the
    /// message.
    pub fn redacted_for(&self, viewer: &str) -> Self {
        Self {
            token: self.token.as_deref().filter(|owner| *owner == viewer).map(String::from),
            ..self.clone()
        }
    }
}

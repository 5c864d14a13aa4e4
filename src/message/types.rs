use serde::Deserialize;

/// Request payload for posting a message
#[derive(Debug, Deserialize)]
pub struct PostMessageRequest {
    pub sender: String,
    pub text: String,
}

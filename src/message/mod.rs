// Message log and relay
//
// Append-only per-room storage with authorship-aware replay: a client can
// recognize its own messages, and never observes another participant's
// credential.

// Public API - what other modules can use
pub use models::Message;
pub use store::MessageStore;
pub use types::PostMessageRequest;

pub mod handlers;

// Internal modules
mod models;
mod store;
mod types;

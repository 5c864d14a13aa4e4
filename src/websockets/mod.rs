// Live event relay
//
// Thin WebSocket layer over the event bus; all redaction has already
// happened before an event reaches a socket.

// Public API - what other modules can use
pub use handler::subscribe_room;

// Internal modules
mod handler;

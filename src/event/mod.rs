// Real-time event fan-out
//
// This module carries room events from the services that produce them to
// the clients listening on a room's channel, with a bounded store-backed
// history so late subscribers can catch up.

// Public API - what other modules can use
pub use bus::EventBus;
pub use events::{DestroyNotice, EventKind, RoomEvent};
pub use history::{HistoryBuffer, HistoryConfig};
pub use subscription::RoomSubscription;

// Internal modules
mod bus;
mod events;
mod history;
mod subscription;

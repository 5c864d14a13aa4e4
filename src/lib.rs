// Library crate for the vanish ephemeral chat server
// This file exposes the public API for integration tests

pub mod access;
pub mod event;
pub mod message;
pub mod room;
pub mod shared;
pub mod store;
pub mod websockets;

// Re-export commonly used types for easier access in tests
pub use access::{AccessGate, AUTH_COOKIE};
pub use event::{EventBus, EventKind, HistoryConfig, RoomEvent, RoomSubscription};
pub use message::{Message, MessageStore};
pub use room::{DestroySequencer, RoomConfig, RoomRegistry, TtlSynchronizer};
pub use shared::{AppError, AppState};
pub use store::{InMemoryKvStore, KeyValueStore, StoreError};

// Key-value store abstraction
//
// The store is an external collaborator: the core only depends on the
// KeyValueStore trait. The in-memory implementation backs development and
// tests; production deployments substitute a networked store offering the
// same conditional-update primitive.

// Public API - what other modules can use
pub use kv::{KeyTtl, KeyValueStore, StoreError};
pub use memory::{spawn_sweeper, InMemoryKvStore};
pub use retry::with_backoff;

// Internal modules
mod kv;
mod memory;
mod retry;

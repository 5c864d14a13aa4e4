// Room lifecycle
//
// Registry (metadata), TTL synchronizer (lockstep expiry) and destroy
// sequencer (idempotent teardown). A room moves NONEXISTENT -> ACTIVE ->
// DESTROYED and never back.

// Public API - what other modules can use
pub use destroy::DestroySequencer;
pub use models::RoomConfig;
pub use registry::RoomRegistry;
pub use ttl::TtlSynchronizer;

pub mod handlers;
pub mod types;

// Internal modules - models stays crate-visible for the sibling domains
// that read the metadata hash.
pub(crate) mod models;

mod destroy;
mod registry;
mod ttl;

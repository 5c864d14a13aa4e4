use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by the external key-value store.
///
/// Everything here is transient from the core's point of view: callers map
/// it to a service-unavailable condition after bounded retries, never to a
/// silent success.
#[derive(Error, Debug, Clone)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("wrong kind of value at key: {0}")]
    WrongType(String),
}

/// Remaining time-to-live of a key, mirroring the three answers a TTL query
/// can give (missing key, key without expiry, key expiring in a duration).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyTtl {
    Missing,
    NoExpiry,
    Expires(Duration),
}

/// Interface to the external key-value store.
///
/// The store holds all room-scoped state: metadata hashes, message logs and
/// history buffers. The `hash_compare_and_swap` primitive is a hard
/// requirement, not an optimization - room admission is only race-safe when
/// the membership field can be conditionally updated in a single step.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Returns all fields of the hash at `key`, or `None` if the key is
    /// absent (or expired).
    async fn hash_get_all(&self, key: &str)
        -> Result<Option<HashMap<String, String>>, StoreError>;

    /// Sets the given fields on the hash at `key`, creating it if needed.
    async fn hash_set(&self, key: &str, fields: &[(&str, &str)]) -> Result<(), StoreError>;

    /// Atomically replaces one hash field, but only if its current value
    /// equals `expected` (`None` = field currently absent). Returns whether
    /// the swap was applied. A missing or expired key never matches, so an
    /// expired room cannot be resurrected by a late writer.
    async fn hash_compare_and_swap(
        &self,
        key: &str,
        field: &str,
        expected: Option<&str>,
        value: &str,
    ) -> Result<bool, StoreError>;

    /// Whether `key` is present and unexpired.
    async fn exists(&self, key: &str) -> Result<bool, StoreError>;

    /// Sets the expiry of `key` to `ttl` from now. Returns `false` (and does
    /// nothing) when the key is absent.
    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, StoreError>;

    /// Remaining time-to-live of `key`.
    async fn time_to_live(&self, key: &str) -> Result<KeyTtl, StoreError>;

    /// Appends `value` to the list at `key`, creating it if needed.
    /// Returns the new list length.
    async fn list_append(&self, key: &str, value: &str) -> Result<u64, StoreError>;

    /// Returns the full list at `key` in append order (empty if absent).
    async fn list_range(&self, key: &str) -> Result<Vec<String>, StoreError>;

    /// Drops elements from the front of the list at `key` until at most
    /// `max_len` remain.
    async fn list_trim_to_last(&self, key: &str, max_len: usize) -> Result<(), StoreError>;

    /// Removes the given keys. Returns how many existed.
    async fn delete(&self, keys: &[&str]) -> Result<u64, StoreError>;
}

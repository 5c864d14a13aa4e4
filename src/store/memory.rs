use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::{interval, Instant};
use tracing::{debug, info, instrument};

use super::kv::{KeyTtl, KeyValueStore, StoreError};

/// One stored value - the store only ever holds hashes and lists.
#[derive(Debug, Clone)]
enum Value {
    Hash(HashMap<String, String>),
    List(Vec<String>),
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// In-memory implementation of [`KeyValueStore`] for development and testing.
///
/// Expiry is driven by `tokio::time`, so tests can run the clock forward
/// under a paused runtime. Expired entries are dropped lazily on access; the
/// [`spawn_sweeper`] task reclaims entries nothing reads anymore.
pub struct InMemoryKvStore {
    entries: Mutex<HashMap<String, Entry>>,
}

impl Default for InMemoryKvStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryKvStore {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Removes every expired entry. Returns how many were dropped.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.lock().unwrap();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        before - entries.len()
    }

    /// Drops the entry at `key` if its expiry has passed.
    fn drop_if_expired(entries: &mut HashMap<String, Entry>, key: &str) {
        let now = Instant::now();
        if entries.get(key).is_some_and(|e| e.is_expired(now)) {
            entries.remove(key);
        }
    }

    /// Fetches a live entry, dropping it first if its expiry has passed.
    fn live_entry<'a>(
        entries: &'a mut HashMap<String, Entry>,
        key: &str,
    ) -> Option<&'a mut Entry> {
        Self::drop_if_expired(entries, key);
        entries.get_mut(key)
    }
}

#[async_trait]
impl KeyValueStore for InMemoryKvStore {
    async fn hash_get_all(
        &self,
        key: &str,
    ) -> Result<Option<HashMap<String, String>>, StoreError> {
        let mut entries = self.entries.lock().unwrap();
        match Self::live_entry(&mut entries, key) {
            Some(entry) => match &entry.value {
                Value::Hash(fields) => Ok(Some(fields.clone())),
                Value::List(_) => Err(StoreError::WrongType(key.to_string())),
            },
            None => Ok(None),
        }
    }

    async fn hash_set(&self, key: &str, fields: &[(&str, &str)]) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().unwrap();
        Self::drop_if_expired(&mut entries, key);
        let entry = entries.entry(key.to_string()).or_insert(Entry {
            value: Value::Hash(HashMap::new()),
            expires_at: None,
        });
        match &mut entry.value {
            Value::Hash(existing) => {
                for (field, value) in fields {
                    existing.insert((*field).to_string(), (*value).to_string());
                }
                Ok(())
            }
            Value::List(_) => Err(StoreError::WrongType(key.to_string())),
        }
    }

    async fn hash_compare_and_swap(
        &self,
        key: &str,
        field: &str,
        expected: Option<&str>,
        value: &str,
    ) -> Result<bool, StoreError> {
        let mut entries = self.entries.lock().unwrap();
        // A missing or expired key never matches: late writers cannot
        // recreate state that already vanished.
        let Some(entry) = Self::live_entry(&mut entries, key) else {
            return Ok(false);
        };
        match &mut entry.value {
            Value::Hash(fields) => {
                if fields.get(field).map(String::as_str) == expected {
                    fields.insert(field.to_string(), value.to_string());
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
            Value::List(_) => Err(StoreError::WrongType(key.to_string())),
        }
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let mut entries = self.entries.lock().unwrap();
        Ok(Self::live_entry(&mut entries, key).is_some())
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, StoreError> {
        let mut entries = self.entries.lock().unwrap();
        match Self::live_entry(&mut entries, key) {
            Some(entry) => {
                entry.expires_at = Some(Instant::now() + ttl);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn time_to_live(&self, key: &str) -> Result<KeyTtl, StoreError> {
        let mut entries = self.entries.lock().unwrap();
        match Self::live_entry(&mut entries, key) {
            Some(entry) => match entry.expires_at {
                Some(at) => Ok(KeyTtl::Expires(at.saturating_duration_since(Instant::now()))),
                None => Ok(KeyTtl::NoExpiry),
            },
            None => Ok(KeyTtl::Missing),
        }
    }

    async fn list_append(&self, key: &str, value: &str) -> Result<u64, StoreError> {
        let mut entries = self.entries.lock().unwrap();
        Self::drop_if_expired(&mut entries, key);
        let entry = entries.entry(key.to_string()).or_insert(Entry {
            value: Value::List(Vec::new()),
            expires_at: None,
        });
        match &mut entry.value {
            Value::List(items) => {
                items.push(value.to_string());
                Ok(items.len() as u64)
            }
            Value::Hash(_) => Err(StoreError::WrongType(key.to_string())),
        }
    }

    async fn list_range(&self, key: &str) -> Result<Vec<String>, StoreError> {
        let mut entries = self.entries.lock().unwrap();
        match Self::live_entry(&mut entries, key) {
            Some(entry) => match &entry.value {
                Value::List(items) => Ok(items.clone()),
                Value::Hash(_) => Err(StoreError::WrongType(key.to_string())),
            },
            None => Ok(Vec::new()),
        }
    }

    async fn list_trim_to_last(&self, key: &str, max_len: usize) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().unwrap();
        match Self::live_entry(&mut entries, key) {
            Some(entry) => match &mut entry.value {
                Value::List(items) => {
                    if items.len() > max_len {
                        let excess = items.len() - max_len;
                        items.drain(..excess);
                    }
                    Ok(())
                }
                Value::Hash(_) => Err(StoreError::WrongType(key.to_string())),
            },
            None => Ok(()),
        }
    }

    async fn delete(&self, keys: &[&str]) -> Result<u64, StoreError> {
        let now = Instant::now();
        let mut entries = self.entries.lock().unwrap();
        let mut removed = 0;
        for key in keys {
            if let Some(entry) = entries.remove(*key) {
                if !entry.is_expired(now) {
                    removed += 1;
                }
            }
        }
        Ok(removed)
    }
}

/// Starts the background task that periodically purges expired entries.
///
/// Lazy expiry already hides dead keys from readers; the sweeper exists so
/// an idle process does not keep expired rooms in memory indefinitely.
#[instrument(skip(store))]
pub fn spawn_sweeper(
    store: Arc<InMemoryKvStore>,
    every: Duration,
) -> tokio::task::JoinHandle<()> {
    info!(every_secs = every.as_secs(), "Starting store sweeper task");

    tokio::spawn(async move {
        let mut tick = interval(every);
        loop {
            tick.tick().await;
            let purged = store.purge_expired();
            if purged > 0 {
                debug!(purged, "Swept expired store entries");
            }
        }
    })
}

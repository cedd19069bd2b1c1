//! Ephemeral state store (C1).
//!
//! A TTL-scoped key/value/list/set facility. Every durable-within-room datum
//! the game state machines need lives here under `room:{roomId}:...` keys.
//! Values are UTF-8 JSON; the store itself is byte-string valued so it has
//! no opinion on what's stored in it (spec.md §4.1).
//!
//! `MemoryStore` is the only implementation shipped: §1's Non-goals rule
//! out horizontal sharding, so there is no need for a networked backend. The
//! trait exists so a Redis-backed store is a drop-in if that ever changes.

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
    time::{Duration, Instant},
};

use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::RwLock;

use crate::error::{CoreError, CoreResult};

/// Default TTL for every key this core writes (spec.md §3: "TTL 6 hours
/// from last write").
pub const DEFAULT_TTL: Duration = Duration::from_secs(6 * 60 * 60);

#[derive(Clone, Debug)]
enum Value {
    Scalar(String),
    List(Vec<String>),
    Set(HashSet<String>),
}

struct Entry {
    value: Value,
    expires_at: Instant,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// A TTL-bounded key/value/list/set store.
///
/// Reads return the last successful write or "absent" (spec.md §4.1); the
/// store may evict keys past TTL at any time, so callers must treat absence
/// as "room gone" and surface a `notFound` error — that mapping happens at
/// the call sites in `room` and `game`, not here, since "absent" is also
/// the legitimate state of a key nobody has written yet.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<RwLock<HashMap<String, Entry>>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Spawn the background sweep task. The store itself stays correct
    /// without it (every read checks expiry), the sweep only reclaims
    /// memory for keys nobody reads again.
    pub fn spawn_sweeper(&self, interval: Duration) -> tokio::task::JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                store.sweep().await;
            }
        })
    }

    async fn sweep(&self) {
        let now = Instant::now();
        let mut guard = self.inner.write().await;
        guard.retain(|_, entry| !entry.is_expired(now));
    }

    /// Store a JSON-serializable value under `key`, refreshing its TTL.
    pub async fn set<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) -> CoreResult<()> {
        let json = serde_json::to_string(value)
            .map_err(|e| CoreError::invalid_argument(format!("serialize {key}: {e}")))?;
        let mut guard = self.inner.write().await;
        guard.insert(
            key.to_string(),
            Entry {
                value: Value::Scalar(json),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    /// Read and deserialize the value under `key`, or `None` if absent/expired.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> CoreResult<Option<T>> {
        let now = Instant::now();
        let guard = self.inner.read().await;
        match guard.get(key) {
            Some(entry) if !entry.is_expired(now) => match &entry.value {
                Value::Scalar(json) => {
                    let parsed = serde_json::from_str(json)
                        .map_err(|e| CoreError::invalid_argument(format!("parse {key}: {e}")))?;
                    Ok(Some(parsed))
                }
                _ => Err(CoreError::invalid_argument(format!(
                    "{key} is not a scalar value"
                ))),
            },
            _ => Ok(None),
        }
    }

    pub async fn delete(&self, key: &str) {
        let mut guard = self.inner.write().await;
        guard.remove(key);
    }

    /// Refresh the TTL of `key` without rewriting its value. No-op if absent.
    pub async fn expire(&self, key: &str, ttl: Duration) {
        let mut guard = self.inner.write().await;
        if let Some(entry) = guard.get_mut(key) {
            entry.expires_at = Instant::now() + ttl;
        }
    }

    /// Append a JSON-serialized item to the list at `key`, creating it if
    /// absent. Append-only data (mafia chat, face-tracking samples, vote
    /// records) uses this instead of a scalar `set` to tolerate independent
    /// concurrent writers (spec.md §4.1).
    pub async fn list_append<T: Serialize>(
        &self,
        key: &str,
        item: &T,
        ttl: Duration,
    ) -> CoreResult<()> {
        let json = serde_json::to_string(item)
            .map_err(|e| CoreError::invalid_argument(format!("serialize {key}: {e}")))?;
        let mut guard = self.inner.write().await;
        let entry = guard.entry(key.to_string()).or_insert_with(|| Entry {
            value: Value::List(Vec::new()),
            expires_at: Instant::now() + ttl,
        });
        entry.expires_at = Instant::now() + ttl;
        match &mut entry.value {
            Value::List(list) => list.push(json),
            _ => return Err(CoreError::invalid_argument(format!("{key} is not a list"))),
        }
        Ok(())
    }

    /// Read the full list at `key`, or an empty vec if absent/expired.
    pub async fn list_range<T: DeserializeOwned>(&self, key: &str) -> CoreResult<Vec<T>> {
        let now = Instant::now();
        let guard = self.inner.read().await;
        match guard.get(key) {
            Some(entry) if !entry.is_expired(now) => match &entry.value {
                Value::List(items) => items
                    .iter()
                    .map(|json| {
                        serde_json::from_str(json)
                            .map_err(|e| CoreError::invalid_argument(format!("parse {key}: {e}")))
                    })
                    .collect(),
                _ => Err(CoreError::invalid_argument(format!("{key} is not a list"))),
            },
            _ => Ok(Vec::new()),
        }
    }

    /// Add `member` to the set at `key`. Returns whether it was newly added.
    pub async fn set_add(&self, key: &str, member: &str, ttl: Duration) -> CoreResult<bool> {
        let mut guard = self.inner.write().await;
        let entry = guard.entry(key.to_string()).or_insert_with(|| Entry {
            value: Value::Set(HashSet::new()),
            expires_at: Instant::now() + ttl,
        });
        entry.expires_at = Instant::now() + ttl;
        match &mut entry.value {
            Value::Set(set) => Ok(set.insert(member.to_string())),
            _ => Err(CoreError::invalid_argument(format!("{key} is not a set"))),
        }
    }

    /// Remove `member` from the set at `key`. Returns whether it was present.
    pub async fn set_remove(&self, key: &str, member: &str) -> CoreResult<bool> {
        let mut guard = self.inner.write().await;
        match guard.get_mut(key) {
            Some(entry) => match &mut entry.value {
                Value::Set(set) => Ok(set.remove(member)),
                _ => Err(CoreError::invalid_argument(format!("{key} is not a set"))),
            },
            None => Ok(false),
        }
    }

    pub async fn set_contains(&self, key: &str, member: &str) -> CoreResult<bool> {
        let now = Instant::now();
        let guard = self.inner.read().await;
        match guard.get(key) {
            Some(entry) if !entry.is_expired(now) => match &entry.value {
                Value::Set(set) => Ok(set.contains(member)),
                _ => Err(CoreError::invalid_argument(format!("{key} is not a set"))),
            },
            _ => Ok(false),
        }
    }

    pub async fn set_size(&self, key: &str) -> CoreResult<usize> {
        let now = Instant::now();
        let guard = self.inner.read().await;
        match guard.get(key) {
            Some(entry) if !entry.is_expired(now) => match &entry.value {
                Value::Set(set) => Ok(set.len()),
                _ => Err(CoreError::invalid_argument(format!("{key} is not a set"))),
            },
            _ => Ok(0),
        }
    }

    pub async fn set_members(&self, key: &str) -> CoreResult<HashSet<String>> {
        let now = Instant::now();
        let guard = self.inner.read().await;
        match guard.get(key) {
            Some(entry) if !entry.is_expired(now) => match &entry.value {
                Value::Set(set) => Ok(set.clone()),
                _ => Err(CoreError::invalid_argument(format!("{key} is not a set"))),
            },
            _ => Ok(HashSet::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn set_then_get_roundtrips() {
        let store = MemoryStore::new();
        store.set("k", &42i64, DEFAULT_TTL).await.unwrap();
        let got: Option<i64> = store.get("k").await.unwrap();
        assert_eq!(got, Some(42));
    }

    #[tokio::test]
    async fn absent_key_is_none() {
        let store = MemoryStore::new();
        let got: Option<i64> = store.get("missing").await.unwrap();
        assert_eq!(got, None);
    }

    #[tokio::test]
    async fn expired_key_reads_as_absent() {
        let store = MemoryStore::new();
        store.set("k", &1i64, Duration::from_millis(1)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        let got: Option<i64> = store.get("k").await.unwrap();
        assert_eq!(got, None);
    }

    #[tokio::test]
    async fn delete_removes_value() {
        let store = MemoryStore::new();
        store.set("k", &1i64, DEFAULT_TTL).await.unwrap();
        store.delete("k").await;
        let got: Option<i64> = store.get("k").await.unwrap();
        assert_eq!(got, None);
    }

    #[tokio::test]
    async fn list_append_and_range() {
        let store = MemoryStore::new();
        store.list_append("l", &"a", DEFAULT_TTL).await.unwrap();
        store.list_append("l", &"b", DEFAULT_TTL).await.unwrap();
        let items: Vec<String> = store.list_range("l").await.unwrap();
        assert_eq!(items, vec!["a".to_string(), "b".to_string()]);
    }

    #[tokio::test]
    async fn set_add_remove_contains() {
        let store = MemoryStore::new();
        assert!(store.set_add("s", "x", DEFAULT_TTL).await.unwrap());
        assert!(!store.set_add("s", "x", DEFAULT_TTL).await.unwrap());
        assert!(store.set_contains("s", "x").await.unwrap());
        assert_eq!(store.set_size("s").await.unwrap(), 1);
        assert!(store.set_remove("s", "x").await.unwrap());
        assert!(!store.set_contains("s", "x").await.unwrap());
    }

    #[tokio::test]
    async fn sweeper_reclaims_expired_keys() {
        let store = MemoryStore::new();
        store.set("k", &1i64, Duration::from_millis(1)).await.unwrap();
        let handle = store.spawn_sweeper(Duration::from_millis(5));
        tokio::time::sleep(Duration::from_millis(40)).await;
        handle.abort();
        let guard = store.inner.read().await;
        assert!(!guard.contains_key("k"));
    }
}

//! Process-local byte backend.

use super::CacheBackend;
use crate::error::Result;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Clone, Debug)]
struct StoredValue {
    bytes: Vec<u8>,
    expires_at: Option<Instant>,
}

impl StoredValue {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

/// In-process backend over a concurrent map.
///
/// Useful as an external tier in tests, or to keep serialized copies of
/// records that the memory tier does not retain. Clones share storage.
///
/// # Example
///
/// ```
/// # use gateway_cache::backend::{CacheBackend, InMemoryBackend};
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> gateway_cache::Result<()> {
/// let backend = InMemoryBackend::new();
/// backend.set("user:1", b"bytes".to_vec(), None).await?;
/// assert_eq!(backend.get("user:1").await?, Some(b"bytes".to_vec()));
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug, Default)]
pub struct InMemoryBackend {
    store: Arc<DashMap<String, StoredValue>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys, expired ones included until next read.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Whether `key` holds an unexpired value.
    pub fn contains_key(&self, key: &str) -> bool {
        self.store
            .get(key)
            .is_some_and(|entry| !entry.is_expired(Instant::now()))
    }
}

impl CacheBackend for InMemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let now = Instant::now();

        let expired = match self.store.get(key) {
            Some(entry) if !entry.is_expired(now) => {
                debug!("✓ InMemory GET {} -> HIT", key);
                return Ok(Some(entry.bytes.clone()));
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            self.store.remove_if(key, |_, v| v.is_expired(now));
            debug!("✓ InMemory GET {} -> EXPIRED", key);
        } else {
            debug!("✓ InMemory GET {} -> MISS", key);
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()> {
        let expires_at = ttl.map(|d| Instant::now() + d);
        self.store.insert(
            key.to_string(),
            StoredValue {
                bytes: value,
                expires_at,
            },
        );
        debug!("✓ InMemory SET {}", key);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.store.remove(key);
        debug!("✓ InMemory DELETE {}", key);
        Ok(())
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    async fn clear_all(&self) -> Result<()> {
        self.store.clear();
        warn!("⚠ InMemory backend cleared");
        Ok(())
    }
}

//! External tier contract.
//!
//! The cache talks to persistent storage only through [`ExternalStorage`],
//! addressing records by [`RecordKey`] (table name, id and, for members, the
//! owning guild). Any engine can sit behind it; [`BackendStorage`] adapts the
//! bundled byte backends.

use crate::backend::CacheBackend;
use crate::entity::CacheEntity;
use crate::error::Result;
use crate::key::{CacheKeyBuilder, RecordKey};
use std::future::Future;
use std::time::Duration;

/// Storage delegate used for the external tier.
pub trait ExternalStorage: Send + Sync + 'static {
    /// Fetch one record.
    fn get_item<E: CacheEntity>(
        &self,
        key: RecordKey,
    ) -> impl Future<Output = Result<Option<E>>> + Send;

    /// Store `record` under `key`, replacing any previous value.
    fn set_item<E: CacheEntity>(
        &self,
        key: RecordKey,
        record: &E,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Remove one record. Removing a missing record is not an error.
    fn remove_item(&self, key: RecordKey) -> impl Future<Output = Result<()>> + Send;

    /// Whether a storage engine is actually present.
    ///
    /// When `false` the cache skips the external tier even for kinds that
    /// enable it.
    fn is_configured(&self) -> bool {
        true
    }
}

/// No external storage at all.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoStorage;

impl ExternalStorage for NoStorage {
    async fn get_item<E: CacheEntity>(&self, _key: RecordKey) -> Result<Option<E>> {
        Ok(None)
    }

    async fn set_item<E: CacheEntity>(&self, _key: RecordKey, _record: &E) -> Result<()> {
        Ok(())
    }

    async fn remove_item(&self, _key: RecordKey) -> Result<()> {
        Ok(())
    }

    fn is_configured(&self) -> bool {
        false
    }
}

/// External tier over a byte [`CacheBackend`].
///
/// Records are encoded with [`CacheEntity::serialize_for_cache`] and stored
/// under keys built by [`CacheKeyBuilder`].
///
/// ```
/// # use gateway_cache::backend::InMemoryBackend;
/// # use gateway_cache::storage::BackendStorage;
/// # use std::time::Duration;
/// let storage = BackendStorage::new(InMemoryBackend::new())
///     .with_namespace("shard-0")
///     .with_ttl(Duration::from_secs(3600));
/// assert_eq!(storage.ttl(), Some(Duration::from_secs(3600)));
/// ```
#[derive(Clone, Debug)]
pub struct BackendStorage<B: CacheBackend> {
    backend: B,
    keys: CacheKeyBuilder,
    ttl: Option<Duration>,
}

impl<B: CacheBackend> BackendStorage<B> {
    pub fn new(backend: B) -> Self {
        BackendStorage {
            backend,
            keys: CacheKeyBuilder::default(),
            ttl: None,
        }
    }

    /// Prefix every key with `namespace`.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.keys = CacheKeyBuilder::with_namespace(namespace);
        self
    }

    /// Expire stored records after `ttl`.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Backend key for a record key.
    pub fn key_for(&self, key: &RecordKey) -> String {
        self.keys.build(key)
    }

    /// # Errors
    /// Returns `Err` if the backend reports a failure.
    pub async fn health_check(&self) -> Result<bool> {
        self.backend.health_check().await
    }
}

impl<B: CacheBackend> ExternalStorage for BackendStorage<B> {
    async fn get_item<E: CacheEntity>(&self, key: RecordKey) -> Result<Option<E>> {
        let cache_key = self.keys.build(&key);

        match self.backend.get(&cache_key).await? {
            Some(bytes) => {
                let record = E::deserialize_from_cache(&bytes)?;
                debug!("✓ External GET {} -> HIT", cache_key);
                Ok(Some(record))
            }
            None => {
                debug!("✓ External GET {} -> MISS", cache_key);
                Ok(None)
            }
        }
    }

    async fn set_item<E: CacheEntity>(&self, key: RecordKey, record: &E) -> Result<()> {
        let cache_key = self.keys.build(&key);
        let bytes = record.serialize_for_cache()?;
        self.backend.set(&cache_key, bytes, self.ttl).await
    }

    async fn remove_item(&self, key: RecordKey) -> Result<()> {
        let cache_key = self.keys.build(&key);
        self.backend.delete(&cache_key).await
    }
}

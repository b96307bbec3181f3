//! Byte-level key/value backends for the external tier.
//!
//! A [`CacheBackend`] stores opaque bytes under string keys. Wrap one in
//! [`crate::storage::BackendStorage`] to use it as the cache's external tier;
//! records are written in the envelope described in [`crate::serialization`].

use crate::error::Result;
use std::future::Future;
use std::time::Duration;

#[cfg(feature = "inmemory")]
mod inmemory;
#[cfg(feature = "memcached")]
mod memcached;
#[cfg(feature = "redis")]
mod redis;

#[cfg(feature = "inmemory")]
pub use inmemory::InMemoryBackend;
#[cfg(feature = "memcached")]
pub use memcached::{MemcachedBackend, MemcachedConfig};
#[cfg(feature = "redis")]
pub use redis::{RedisBackend, RedisConfig};

/// Trait all byte backends implement.
///
/// Implementations may use `async fn`; the returned futures must be `Send`
/// so that cache operations can run on a multi-threaded runtime.
pub trait CacheBackend: Send + Sync + Clone + 'static {
    /// Read the bytes stored under `key`.
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<Vec<u8>>>> + Send;

    /// Store `value` under `key`, optionally expiring after `ttl`.
    fn set(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Option<Duration>,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Remove `key`. Removing a missing key is not an error.
    fn delete(&self, key: &str) -> impl Future<Output = Result<()>> + Send;

    /// Whether the backend is reachable.
    fn health_check(&self) -> impl Future<Output = Result<bool>> + Send;

    /// Drop every key. Intended for tests and maintenance tooling.
    fn clear_all(&self) -> impl Future<Output = Result<()>> + Send;
}

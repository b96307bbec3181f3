//! Memcached byte backend.

use super::CacheBackend;
use crate::error::{Error, Result};
use async_memcached::AsciiProtocol;
use deadpool_memcached::{Manager, Pool};
use std::fmt::Display;
use std::time::Duration;

/// Pool size used when `GATEWAY_CACHE_MEMCACHED_POOL_SIZE` is unset.
const DEFAULT_POOL_SIZE: usize = 16;

/// Memcached expirations above 30 days are read as absolute UNIX times.
const MAX_RELATIVE_TTL_SECS: u64 = 30 * 24 * 60 * 60;

#[derive(Clone, Debug)]
pub struct MemcachedConfig {
    /// `host:port` of the server.
    pub server: String,
    pub pool_size: usize,
}

impl Default for MemcachedConfig {
    fn default() -> Self {
        MemcachedConfig {
            server: "localhost:11211".to_string(),
            pool_size: DEFAULT_POOL_SIZE,
        }
    }
}

impl MemcachedConfig {
    /// Read `GATEWAY_CACHE_MEMCACHED_SERVER` and
    /// `GATEWAY_CACHE_MEMCACHED_POOL_SIZE`, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        MemcachedConfig {
            server: std::env::var("GATEWAY_CACHE_MEMCACHED_SERVER").unwrap_or(defaults.server),
            pool_size: std::env::var("GATEWAY_CACHE_MEMCACHED_POOL_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.pool_size),
        }
    }
}

/// Pooled Memcached backend.
///
/// ```no_run
/// # use gateway_cache::backend::{MemcachedBackend, MemcachedConfig};
/// # use gateway_cache::storage::BackendStorage;
/// # async fn example() -> gateway_cache::Result<()> {
/// let backend = MemcachedBackend::new(MemcachedConfig::from_env())?;
/// let storage = BackendStorage::new(backend).with_namespace("bot");
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct MemcachedBackend {
    pool: Pool,
}

impl MemcachedBackend {
    /// # Errors
    /// Returns `Error::ConfigError` if the pool cannot be built.
    pub fn new(config: MemcachedConfig) -> Result<Self> {
        if config.server.is_empty() {
            return Err(Error::ConfigError(
                "No memcached server specified".to_string(),
            ));
        }

        let pool = Pool::builder(Manager::new(config.server.clone()))
            .max_size(config.pool_size)
            .build()
            .map_err(|e| Error::ConfigError(format!("Failed to create connection pool: {}", e)))?;

        info!(
            "✓ Memcached backend initialized with server: {} (pool size: {})",
            config.server, config.pool_size
        );

        Ok(MemcachedBackend { pool })
    }
}

fn pool_error(e: impl Display) -> Error {
    Error::BackendError(format!("Failed to get Memcached connection: {}", e))
}

impl CacheBackend for MemcachedBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut conn = self.pool.get().await.map_err(pool_error)?;

        match conn.get(key).await {
            Ok(Some(value)) => {
                debug!("✓ Memcached GET {} -> HIT", key);
                Ok(value.data)
            }
            Ok(None) => {
                debug!("✓ Memcached GET {} -> MISS", key);
                Ok(None)
            }
            Err(e) => Err(Error::BackendError(format!(
                "Memcached GET failed for key {}: {}",
                key, e
            ))),
        }
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()> {
        let mut conn = self.pool.get().await.map_err(pool_error)?;

        let expiration = ttl.map(|d| d.as_secs().min(MAX_RELATIVE_TTL_SECS) as i64);

        conn.set(key, value.as_slice(), expiration, None)
            .await
            .map_err(|e| {
                Error::BackendError(format!("Memcached SET failed for key {}: {}", key, e))
            })?;

        debug!("✓ Memcached SET {} ({} bytes)", key, value.len());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.pool.get().await.map_err(pool_error)?;

        conn.delete(key).await.map_err(|e| {
            Error::BackendError(format!("Memcached DELETE failed for key {}: {}", key, e))
        })?;

        debug!("✓ Memcached DELETE {}", key);
        Ok(())
    }

    async fn health_check(&self) -> Result<bool> {
        let Ok(mut conn) = self.pool.get().await else {
            return Ok(false);
        };
        Ok(conn.get("__health_check__").await.is_ok())
    }

    async fn clear_all(&self) -> Result<()> {
        let mut conn = self.pool.get().await.map_err(pool_error)?;

        conn.flush_all()
            .await
            .map_err(|e| Error::BackendError(format!("Memcached FLUSH_ALL failed: {}", e)))?;

        warn!("⚠ Memcached FLUSH_ALL executed - all cache cleared!");
        Ok(())
    }
}

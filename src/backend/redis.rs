//! Redis byte backend.

use super::CacheBackend;
use crate::error::{Error, Result};
use deadpool_redis::redis::cmd;
use deadpool_redis::{Config, Pool, Runtime};
use std::fmt::Display;
use std::time::Duration;

const DEFAULT_POOL_SIZE: usize = 16;

#[derive(Clone, Debug)]
pub struct RedisConfig {
    /// `redis://host:port/db`
    pub url: String,
    pub pool_size: usize,
}

impl Default for RedisConfig {
    fn default() -> Self {
        RedisConfig {
            url: "redis://127.0.0.1:6379".to_string(),
            pool_size: DEFAULT_POOL_SIZE,
        }
    }
}

impl RedisConfig {
    /// Read `GATEWAY_CACHE_REDIS_URL` and `GATEWAY_CACHE_REDIS_POOL_SIZE`,
    /// falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        RedisConfig {
            url: std::env::var("GATEWAY_CACHE_REDIS_URL").unwrap_or(defaults.url),
            pool_size: std::env::var("GATEWAY_CACHE_REDIS_POOL_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.pool_size),
        }
    }
}

/// Pooled Redis backend.
///
/// ```no_run
/// # use gateway_cache::backend::{RedisBackend, RedisConfig};
/// # use gateway_cache::storage::BackendStorage;
/// # async fn example() -> gateway_cache::Result<()> {
/// let backend = RedisBackend::new(RedisConfig::from_env())?;
/// let storage = BackendStorage::new(backend);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct RedisBackend {
    pool: Pool,
}

impl RedisBackend {
    /// # Errors
    /// Returns `Error::ConfigError` if the URL is invalid or the pool cannot
    /// be built.
    pub fn new(config: RedisConfig) -> Result<Self> {
        let mut pool_config = Config::from_url(config.url.clone());
        pool_config.pool = Some(deadpool_redis::PoolConfig::new(config.pool_size));

        let pool = pool_config
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| Error::ConfigError(format!("Failed to create Redis pool: {}", e)))?;

        info!(
            "✓ Redis backend initialized with url: {} (pool size: {})",
            config.url, config.pool_size
        );

        Ok(RedisBackend { pool })
    }
}

fn pool_error(e: impl Display) -> Error {
    Error::BackendError(format!("Failed to get Redis connection: {}", e))
}

impl CacheBackend for RedisBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut conn = self.pool.get().await.map_err(pool_error)?;

        let value: Option<Vec<u8>> = cmd("GET")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| Error::BackendError(format!("Redis GET failed for key {}: {}", key, e)))?;

        debug!(
            "✓ Redis GET {} -> {}",
            key,
            if value.is_some() { "HIT" } else { "MISS" }
        );
        Ok(value)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()> {
        let mut conn = self.pool.get().await.map_err(pool_error)?;

        let mut command = cmd("SET");
        command.arg(key).arg(value.as_slice());
        if let Some(ttl) = ttl {
            command.arg("PX").arg(ttl.as_millis().max(1) as u64);
        }

        command
            .query_async::<()>(&mut conn)
            .await
            .map_err(|e| Error::BackendError(format!("Redis SET failed for key {}: {}", key, e)))?;

        debug!("✓ Redis SET {} ({} bytes)", key, value.len());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.pool.get().await.map_err(pool_error)?;

        cmd("DEL")
            .arg(key)
            .query_async::<()>(&mut conn)
            .await
            .map_err(|e| Error::BackendError(format!("Redis DEL failed for key {}: {}", key, e)))?;

        debug!("✓ Redis DEL {}", key);
        Ok(())
    }

    async fn health_check(&self) -> Result<bool> {
        let Ok(mut conn) = self.pool.get().await else {
            return Ok(false);
        };
        let pong: std::result::Result<String, _> = cmd("PING").query_async(&mut conn).await;
        Ok(pong.is_ok())
    }

    async fn clear_all(&self) -> Result<()> {
        let mut conn = self.pool.get().await.map_err(pool_error)?;

        cmd("FLUSHDB")
            .query_async::<()>(&mut conn)
            .await
            .map_err(|e| Error::BackendError(format!("Redis FLUSHDB failed: {}", e)))?;

        warn!("⚠ Redis FLUSHDB executed - all cache cleared!");
        Ok(())
    }
}

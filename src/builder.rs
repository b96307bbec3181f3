//! Fluent construction of a [`ProxyCache`].

use crate::cache::ProxyCache;
use crate::config::{bulk_hook, CacheOptions, KindOptions, ReplaceInternal, SweeperOptions};
use crate::entity::Snowflake;
use crate::error::Result;
use crate::model::{Channel, Guild, Member, Role, User};
use crate::storage::{ExternalStorage, NoStorage};
use std::future::Future;
use std::time::Duration;

/// Fluent builder for a [`ProxyCache`].
///
/// Chainable methods cover the tier switches, per-kind options, bulk hooks
/// and timers. Anything not set keeps its [`CacheOptions::default`] value.
///
/// # Example
///
/// ```
/// use gateway_cache::backend::InMemoryBackend;
/// use gateway_cache::config::KindOptions;
/// use gateway_cache::storage::BackendStorage;
/// use gateway_cache::CacheBuilder;
/// use std::time::Duration;
///
/// let cache = CacheBuilder::new()
///     .with_storage(BackendStorage::new(InMemoryBackend::new()))
///     .with_default_outside_memory(true)
///     .with_member(KindOptions::new().with_in_memory(false))
///     .with_deletion_delay(Duration::from_secs(2))
///     .on_remove_guild(|guild_id| async move {
///         println!("guild {} removed", guild_id);
///         Ok(())
///     })
///     .build();
///
/// assert!(cache.members().outside_memory());
/// ```
pub struct CacheBuilder<S = NoStorage> {
    options: CacheOptions,
    storage: S,
}

impl CacheBuilder<NoStorage> {
    /// Create a builder with default options and no external tier.
    pub fn new() -> Self {
        CacheBuilder {
            options: CacheOptions::default(),
            storage: NoStorage,
        }
    }
}

impl Default for CacheBuilder<NoStorage> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: ExternalStorage> CacheBuilder<S> {
    /// Start from an existing set of options, e.g. [`CacheOptions::from_env`].
    pub fn with_options(mut self, options: CacheOptions) -> Self {
        self.options = options;
        self
    }

    /// Use `storage` as the external tier.
    pub fn with_storage<T: ExternalStorage>(self, storage: T) -> CacheBuilder<T> {
        CacheBuilder {
            options: self.options,
            storage,
        }
    }

    pub fn with_default_in_memory(mut self, enabled: bool) -> Self {
        self.options.default_in_memory = enabled;
        self
    }

    pub fn with_default_outside_memory(mut self, enabled: bool) -> Self {
        self.options.default_outside_memory = enabled;
        self
    }

    pub fn with_guild(mut self, options: KindOptions<Guild>) -> Self {
        self.options.guild = options;
        self
    }

    pub fn with_channel(mut self, options: KindOptions<Channel>) -> Self {
        self.options.channel = options;
        self
    }

    pub fn with_role(mut self, options: KindOptions<Role>) -> Self {
        self.options.role = options;
        self
    }

    pub fn with_member(mut self, options: KindOptions<Member>) -> Self {
        self.options.member = options;
        self
    }

    pub fn with_user(mut self, options: KindOptions<User>) -> Self {
        self.options.user = options;
        self
    }

    /// Run `hook` after the internal guild cascade.
    pub fn on_remove_guild<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(Snowflake) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.options.bulk.remove_guild = Some(bulk_hook(hook));
        self
    }

    /// Run `hook` after the internal role cascade.
    pub fn on_remove_role<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(Snowflake) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.options.bulk.remove_role = Some(bulk_hook(hook));
        self
    }

    /// Run `hook` after the internal channel cascade.
    pub fn on_remove_channel<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(Snowflake) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.options.bulk.remove_channel = Some(bulk_hook(hook));
        self
    }

    /// Skip the internal cascade for the flagged kinds; only hooks run.
    pub fn with_replace_internal(mut self, replace: ReplaceInternal) -> Self {
        self.options.bulk.replace_internal = replace;
        self
    }

    pub fn with_sweeper(mut self, sweeper: SweeperOptions) -> Self {
        self.options.sweeper = sweeper;
        self
    }

    /// Tombstone window after channel and thread deletions.
    pub fn with_deletion_delay(mut self, delay: Duration) -> Self {
        self.options.deletion_delay = delay;
        self
    }

    /// The connected account's user id.
    pub fn with_current_user(mut self, user_id: Snowflake) -> Self {
        self.options.current_user = Some(user_id);
        self
    }

    pub fn with_top_level_private_channels(mut self, enabled: bool) -> Self {
        self.options.top_level_private_channels = enabled;
        self
    }

    pub fn build(self) -> ProxyCache<S> {
        ProxyCache::new(self.options, self.storage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityKind;
    use crate::store::SetOutcome;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_builder_defaults() {
        let cache = CacheBuilder::new().build();

        for kind in EntityKind::ALL {
            assert!(cache.options().in_memory(kind));
        }
        assert!(!cache.users().outside_memory());
        assert_eq!(
            cache
                .users()
                .set(User::new(1))
                .await
                .expect("Failed to set"),
            SetOutcome::Stored
        );
    }

    #[tokio::test]
    async fn test_builder_chaining() {
        let cache = CacheBuilder::new()
            .with_default_in_memory(false)
            .with_user(KindOptions::new().with_in_memory(true))
            .with_current_user(7)
            .with_top_level_private_channels(true)
            .with_deletion_delay(Duration::from_millis(10))
            .build();

        assert!(!cache.guilds().in_memory());
        assert!(cache.users().in_memory());
        assert_eq!(cache.options().current_user, Some(7));
        assert!(cache.options().top_level_private_channels);
        assert_eq!(cache.options().deletion_delay, Duration::from_millis(10));
    }

    #[tokio::test]
    async fn test_builder_hooks_reach_store() {
        let removed = Arc::new(AtomicU64::new(0));
        let seen = Arc::clone(&removed);

        let cache = CacheBuilder::new()
            .on_remove_role(move |role_id| {
                let seen = Arc::clone(&seen);
                async move {
                    seen.store(role_id, Ordering::SeqCst);
                    Ok(())
                }
            })
            .with_replace_internal(ReplaceInternal {
                role: true,
                ..Default::default()
            })
            .build();

        cache.roles().delete(42).await.expect("Failed to delete");
        assert_eq!(removed.load(Ordering::SeqCst), 42);
    }

    #[tokio::test]
    async fn test_builder_with_options_from_lookup() {
        let options = CacheOptions::from_lookup(|name| {
            (name == "GATEWAY_CACHE_GUILD_IN_MEMORY").then(|| "false".to_string())
        })
        .expect("Failed to load options");

        let cache = CacheBuilder::new().with_options(options).build();
        assert!(!cache.options().nesting());
        assert!(!cache.members().in_memory());
    }
}

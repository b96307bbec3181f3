//! Event interception for the ingestion pipeline.
//!
//! The pipeline hands every decoded entity and every deletion to an
//! [`InterceptorChain`]. The cache's own [`CacheInterceptor`] always runs
//! first, so a decoded guild is already cached (shell first, then its
//! children, then the guild itself) when later interceptors see it.

use crate::cache::ProxyCache;
use crate::entity::{CacheEntity, Snowflake};
use crate::error::Result;
use crate::key::MemberKey;
use crate::model::{Channel, Guild, GuildField, Member, Role, User};
use crate::storage::ExternalStorage;
use crate::store::SetOutcome;
use futures::future::BoxFuture;
use std::sync::Arc;

/// A decoded entity on its way to consumers.
#[derive(Debug, Clone, PartialEq)]
pub enum Entity {
    Guild(Guild),
    Channel(Channel),
    Role(Role),
    Member(Member),
    User(User),
}

/// A deletion event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deletion {
    Guild(Snowflake),
    Channel(Snowflake),
    Thread(Snowflake),
    Role { id: Snowflake, guild_id: Snowflake },
    /// A member left or was removed.
    Member { user_id: Snowflake, guild_id: Snowflake },
    Ban { user_id: Snowflake, guild_id: Snowflake },
}

/// One link of an [`InterceptorChain`].
pub trait Interceptor: Send + Sync {
    /// Observe (and optionally rewrite) a decoded entity.
    fn on_decoded(&self, entity: Entity) -> BoxFuture<'_, Result<Entity>>;

    fn on_deleted<'a>(&'a self, _deletion: &'a Deletion) -> BoxFuture<'a, Result<()>> {
        Box::pin(async { Ok(()) })
    }

    /// A member joined `guild_id`.
    fn on_member_added(&self, _guild_id: Snowflake) -> BoxFuture<'_, Result<()>> {
        Box::pin(async { Ok(()) })
    }
}

/// Keeps a [`ProxyCache`] in sync with the event stream.
pub struct CacheInterceptor<S> {
    cache: ProxyCache<S>,
}

impl<S: ExternalStorage> CacheInterceptor<S> {
    pub fn new(cache: ProxyCache<S>) -> Self {
        CacheInterceptor { cache }
    }

    pub fn cache(&self) -> &ProxyCache<S> {
        &self.cache
    }

    async fn cache_entity(&self, entity: &Entity) -> Result<()> {
        let options = self.cache.options();
        match entity {
            Entity::Guild(guild) => self.cache_guild(guild).await?,
            Entity::Channel(channel) => {
                let projected = options.channel.projection.apply(channel.clone());
                self.cache.channels().set(projected).await?;
            }
            Entity::Role(role) => {
                let projected = options.role.projection.apply(role.clone());
                self.cache.roles().set(projected).await?;
            }
            Entity::Member(member) => {
                let projected = options.member.projection.apply(member.clone());
                self.cache.members().set(projected).await?;
            }
            Entity::User(user) => {
                let projected = options.user.projection.apply(user.clone());
                self.cache.users().set(projected).await?;
            }
        }
        Ok(())
    }

    async fn cache_guild(&self, guild: &Guild) -> Result<()> {
        let options = self.cache.options();
        let projection = &options.guild.projection;
        let mut projected = projection.apply(guild.clone());

        let Some(guild_id) = projected.id else {
            self.cache.guilds().set(projected).await?;
            return Ok(());
        };

        let shell = self.cache.install_guild_shell(&projected);

        if projection.keeps(GuildField::Channels, Guild::ID_FIELDS) {
            for channel in guild.channels.iter().flat_map(|m| m.values()) {
                let mut channel = channel.clone();
                channel.guild_id.get_or_insert(guild_id);
                let channel = options.channel.projection.apply(channel);
                self.cache.channels().set(channel).await?;
            }
        }
        if projection.keeps(GuildField::Roles, Guild::ID_FIELDS) {
            for role in guild.roles.iter().flat_map(|m| m.values()) {
                let mut role = role.clone();
                role.guild_id.get_or_insert(guild_id);
                let role = options.role.projection.apply(role);
                self.cache.roles().set(role).await?;
            }
        }
        if projection.keeps(GuildField::Members, Guild::ID_FIELDS) {
            for member in guild.members.iter().flat_map(|m| m.values()) {
                let mut member = member.clone();
                member.guild_id.get_or_insert(guild_id);
                let member = options.member.projection.apply(member);
                self.cache.members().set(member).await?;
            }
        }

        projected.channels = None;
        projected.roles = None;
        projected.members = None;
        let outcome = self.cache.guilds().set(projected).await?;

        if outcome == SetOutcome::Rejected && shell {
            debug!("Guild {} rejected; evicting its shell", guild_id);
            self.cache.evict_guild_shell(guild_id);
        }
        Ok(())
    }

    async fn apply_deletion(&self, deletion: &Deletion) -> Result<()> {
        match *deletion {
            Deletion::Guild(id) => {
                self.cache.guilds().delete(id).await?;
            }
            Deletion::Channel(id) | Deletion::Thread(id) => {
                self.cache.channels().delete_debounced(id).await?;
            }
            Deletion::Role { id, .. } => {
                self.cache.roles().delete(id).await?;
            }
            Deletion::Member { user_id, guild_id } => {
                self.cache.guilds().adjust_member_count(guild_id, -1).await?;
                self.cache
                    .members()
                    .delete(MemberKey::new(guild_id, user_id))
                    .await?;
            }
            Deletion::Ban { user_id, guild_id } => {
                self.cache
                    .members()
                    .delete(MemberKey::new(guild_id, user_id))
                    .await?;
            }
        }
        Ok(())
    }
}

impl<S: ExternalStorage> Interceptor for CacheInterceptor<S> {
    fn on_decoded(&self, entity: Entity) -> BoxFuture<'_, Result<Entity>> {
        Box::pin(async move {
            self.cache_entity(&entity).await?;
            Ok(entity)
        })
    }

    fn on_deleted<'a>(&'a self, deletion: &'a Deletion) -> BoxFuture<'a, Result<()>> {
        Box::pin(self.apply_deletion(deletion))
    }

    fn on_member_added(&self, guild_id: Snowflake) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            self.cache.guilds().adjust_member_count(guild_id, 1).await?;
            Ok(())
        })
    }
}

/// Ordered interceptors, cache first.
///
/// ```
/// # use gateway_cache::{CacheOptions, ProxyCache};
/// # use gateway_cache::intercept::{Entity, InterceptorChain};
/// # use gateway_cache::model::{Channel, Guild};
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> gateway_cache::Result<()> {
/// let cache = ProxyCache::memory_only(CacheOptions::default());
/// let chain = InterceptorChain::new(cache.clone());
///
/// let mut guild = Guild::new(1).with_name("rustaceans");
/// guild.insert_channel(Channel::new(10).with_name("general"));
/// chain.decoded(Entity::Guild(guild)).await?;
///
/// let channel = cache.channels().get(10).await?;
/// assert_eq!(channel.and_then(|c| c.guild_id), Some(1));
/// # Ok(())
/// # }
/// ```
pub struct InterceptorChain {
    interceptors: Vec<Arc<dyn Interceptor>>,
}

impl InterceptorChain {
    pub fn new<S: ExternalStorage>(cache: ProxyCache<S>) -> Self {
        InterceptorChain {
            interceptors: vec![Arc::new(CacheInterceptor::new(cache))],
        }
    }

    /// Append an interceptor; it runs after every one already in the chain.
    pub fn push(&mut self, interceptor: impl Interceptor + 'static) {
        self.interceptors.push(Arc::new(interceptor));
    }

    pub fn with(mut self, interceptor: impl Interceptor + 'static) -> Self {
        self.push(interceptor);
        self
    }

    pub fn len(&self) -> usize {
        self.interceptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interceptors.is_empty()
    }

    /// Pass a decoded entity through every interceptor in order.
    ///
    /// # Errors
    /// Stops at the first interceptor that fails.
    pub async fn decoded(&self, entity: Entity) -> Result<Entity> {
        let mut entity = entity;
        for interceptor in &self.interceptors {
            entity = interceptor.on_decoded(entity).await?;
        }
        Ok(entity)
    }

    /// # Errors
    /// Stops at the first interceptor that fails.
    pub async fn deleted(&self, deletion: Deletion) -> Result<()> {
        for interceptor in &self.interceptors {
            interceptor.on_deleted(&deletion).await?;
        }
        Ok(())
    }

    /// # Errors
    /// Stops at the first interceptor that fails.
    pub async fn member_added(&self, guild_id: Snowflake) -> Result<()> {
        for interceptor in &self.interceptors {
            interceptor.on_member_added(guild_id).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CacheOptions, KindOptions};
    use crate::projection::Projection;
    use parking_lot::Mutex;

    struct Recorder {
        seen: Arc<Mutex<Vec<String>>>,
        cache: ProxyCache,
    }

    impl Interceptor for Recorder {
        fn on_decoded(&self, entity: Entity) -> BoxFuture<'_, Result<Entity>> {
            Box::pin(async move {
                if let Entity::Channel(channel) = &entity {
                    let id = channel.id.unwrap_or_default();
                    let cached = self.cache.channels().get(id).await?.is_some();
                    self.seen.lock().push(format!("channel {} cached={}", id, cached));
                }
                Ok(entity)
            })
        }
    }

    #[tokio::test]
    async fn test_cache_runs_before_consumers() {
        let cache = ProxyCache::memory_only(CacheOptions::default());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let chain = InterceptorChain::new(cache.clone()).with(Recorder {
            seen: Arc::clone(&seen),
            cache: cache.clone(),
        });
        assert_eq!(chain.len(), 2);

        chain
            .decoded(Entity::Guild(Guild::new(1)))
            .await
            .expect("Failed to decode guild");
        chain
            .decoded(Entity::Channel(Channel::new(10).in_guild(1)))
            .await
            .expect("Failed to decode channel");

        assert_eq!(*seen.lock(), vec!["channel 10 cached=true".to_string()]);
    }

    #[tokio::test]
    async fn test_guild_children_cached_through_projections() {
        let mut options = CacheOptions::default();
        options.channel = KindOptions::new().with_projection(
            Projection::new().with_undesired([crate::model::ChannelField::Topic]),
        );
        let cache = ProxyCache::memory_only(options);
        let chain = InterceptorChain::new(cache.clone());

        let mut guild = Guild::new(1).with_name("g");
        let mut channel = Channel::new(10).with_name("general");
        channel.topic = Some("hello".to_string());
        guild.insert_channel(channel);
        guild.insert_member(Member::new(1, 30));

        let passed = chain
            .decoded(Entity::Guild(guild.clone()))
            .await
            .expect("Failed to decode guild");
        assert_eq!(passed, Entity::Guild(guild));

        let channel = cache
            .channels()
            .get(10)
            .await
            .expect("get failed")
            .expect("channel missing");
        assert_eq!(channel.name.as_deref(), Some("general"));
        assert!(channel.topic.is_none());
        assert!(cache
            .members()
            .get(MemberKey::new(1, 30))
            .await
            .expect("get failed")
            .is_some());
    }

    #[tokio::test]
    async fn test_member_projection_keeps_guild_identity() {
        let mut options = CacheOptions::default();
        options.member = KindOptions::new()
            .with_projection(Projection::new().with_desired([crate::model::MemberField::Nick]));
        let cache = ProxyCache::memory_only(options);
        let chain = InterceptorChain::new(cache.clone());

        let mut guild = Guild::new(1);
        guild.insert_member(Member::new(1, 30).with_nick("ferris").with_roles(vec![5]));
        chain
            .decoded(Entity::Guild(guild))
            .await
            .expect("Failed to decode guild");
        chain
            .decoded(Entity::Member(Member::new(1, 31)))
            .await
            .expect("Failed to decode member");

        let nested = cache
            .members()
            .get(MemberKey::new(1, 30))
            .await
            .expect("get failed")
            .expect("member 30 missing");
        assert_eq!(nested.nick.as_deref(), Some("ferris"));
        assert!(nested.roles.is_none());
        assert!(cache
            .members()
            .get(MemberKey::new(1, 31))
            .await
            .expect("get failed")
            .is_some());
    }

    #[tokio::test]
    async fn test_rejected_guild_leaves_no_shell() {
        let mut options = CacheOptions::default();
        options.guild = KindOptions::new().with_should_cache(|_: &Guild| async { false });
        let cache = ProxyCache::memory_only(options);
        let chain = InterceptorChain::new(cache.clone());

        let mut guild = Guild::new(1);
        guild.insert_channel(Channel::new(10));
        chain
            .decoded(Entity::Guild(guild))
            .await
            .expect("Failed to decode guild");

        let stats = cache.memory_stats();
        assert_eq!(stats.guilds, 0);
        assert_eq!(stats.channels, 0);
        assert_eq!(stats.index_entries, 0);
    }

    #[tokio::test]
    async fn test_member_lifecycle_edits_count() {
        let cache = ProxyCache::memory_only(CacheOptions::default());
        let chain = InterceptorChain::new(cache.clone());

        let mut guild = Guild::new(1);
        guild.member_count = Some(1);
        guild.insert_member(Member::new(1, 30));
        chain
            .decoded(Entity::Guild(guild))
            .await
            .expect("Failed to decode guild");

        chain.member_added(1).await.expect("member_added failed");
        chain
            .decoded(Entity::Member(Member::new(1, 31)))
            .await
            .expect("Failed to decode member");
        chain
            .deleted(Deletion::Member {
                user_id: 30,
                guild_id: 1,
            })
            .await
            .expect("Failed to delete member");

        let guild = cache
            .guilds()
            .get(1)
            .await
            .expect("get failed")
            .expect("guild missing");
        assert_eq!(guild.member_count, Some(1));
        assert!(guild.member(30).is_none());
        assert!(guild.member(31).is_some());
    }

    #[tokio::test]
    async fn test_member_count_edit_bypasses_guild_predicate() {
        let mut options = CacheOptions::default();
        options.guild = KindOptions::new().with_should_cache(|guild: &Guild| {
            let named = guild.name.is_some();
            async move { named }
        });
        let cache = ProxyCache::memory_only(options);
        let chain = InterceptorChain::new(cache.clone());

        let mut guild = Guild::new(1).with_name("named");
        guild.member_count = Some(5);
        chain
            .decoded(Entity::Guild(guild))
            .await
            .expect("Failed to decode guild");
        chain.member_added(1).await.expect("member_added failed");

        let guild = cache
            .guilds()
            .get(1)
            .await
            .expect("get failed")
            .expect("guild missing");
        assert_eq!(guild.member_count, Some(6));
        assert_eq!(guild.name.as_deref(), Some("named"));
    }

    #[tokio::test]
    async fn test_ban_removes_member_without_count_change() {
        let cache = ProxyCache::memory_only(CacheOptions::default());
        let chain = InterceptorChain::new(cache.clone());

        let mut guild = Guild::new(1);
        guild.member_count = Some(5);
        guild.insert_member(Member::new(1, 30));
        chain
            .decoded(Entity::Guild(guild))
            .await
            .expect("Failed to decode guild");
        chain
            .deleted(Deletion::Ban {
                user_id: 30,
                guild_id: 1,
            })
            .await
            .expect("Failed to apply ban");

        let guild = cache
            .guilds()
            .get(1)
            .await
            .expect("get failed")
            .expect("guild missing");
        assert_eq!(guild.member_count, Some(5));
        assert!(guild.member(30).is_none());
    }
}

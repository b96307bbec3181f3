//! Cache configuration.
//!
//! [`CacheOptions`] carries the tier switches, projections and predicates
//! for every entity kind, the bulk-removal hooks and the sweeper settings.
//! Build it by hand, from the environment with [`CacheOptions::from_env`],
//! or fluently with [`crate::CacheBuilder`].

use crate::entity::{CacheEntity, EntityKind, Snowflake};
use crate::error::{Error, Result};
use crate::model::{Channel, Guild, Member, Role, User};
use crate::projection::Projection;
use futures::future::BoxFuture;
use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// Default window during which a deleted channel id is tombstoned.
pub const DEFAULT_DELETION_DELAY: Duration = Duration::from_secs(5);

/// Default interval between sweeper passes.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Async predicate deciding whether a record is cached at all.
pub type ShouldCache<E> = Arc<dyn Fn(&E) -> BoxFuture<'static, bool> + Send + Sync>;

/// Sweeper predicate: `true` evicts the record from memory.
pub type SweepFilter<E> = Arc<dyn Fn(&E) -> bool + Send + Sync>;

/// Caller-side bulk removal hook, run after the internal cascade.
pub type BulkHook = Arc<dyn Fn(Snowflake) -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// Per-kind options.
pub struct KindOptions<E: CacheEntity> {
    /// Memory tier switch; `None` falls back to [`CacheOptions::default_in_memory`].
    pub in_memory: Option<bool>,
    /// External tier switch; `None` falls back to [`CacheOptions::default_outside_memory`].
    pub outside_memory: Option<bool>,
    pub projection: Projection<E::Field>,
    pub should_cache: Option<ShouldCache<E>>,
    pub sweep_filter: Option<SweepFilter<E>>,
}

impl<E: CacheEntity> KindOptions<E> {
    pub fn new() -> Self {
        KindOptions {
            in_memory: None,
            outside_memory: None,
            projection: Projection::new(),
            should_cache: None,
            sweep_filter: None,
        }
    }

    pub fn with_in_memory(mut self, enabled: bool) -> Self {
        self.in_memory = Some(enabled);
        self
    }

    pub fn with_outside_memory(mut self, enabled: bool) -> Self {
        self.outside_memory = Some(enabled);
        self
    }

    pub fn with_projection(mut self, projection: Projection<E::Field>) -> Self {
        self.projection = projection;
        self
    }

    /// Only cache records for which `predicate` resolves to `true`.
    ///
    /// ```
    /// use gateway_cache::config::KindOptions;
    /// use gateway_cache::model::User;
    ///
    /// let options = KindOptions::<User>::new()
    ///     .with_should_cache(|user: &User| {
    ///         let human = user.bot != Some(true);
    ///         async move { human }
    ///     });
    /// assert!(options.should_cache.is_some());
    /// ```
    pub fn with_should_cache<F, Fut>(mut self, predicate: F) -> Self
    where
        F: Fn(&E) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = bool> + Send + 'static,
    {
        let predicate: ShouldCache<E> =
            Arc::new(move |record: &E| -> BoxFuture<'static, bool> { Box::pin(predicate(record)) });
        self.should_cache = Some(predicate);
        self
    }

    pub fn with_sweep_filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&E) -> bool + Send + Sync + 'static,
    {
        let filter: SweepFilter<E> = Arc::new(filter);
        self.sweep_filter = Some(filter);
        self
    }
}

impl<E: CacheEntity> Default for KindOptions<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: CacheEntity> Clone for KindOptions<E> {
    fn clone(&self) -> Self {
        KindOptions {
            in_memory: self.in_memory,
            outside_memory: self.outside_memory,
            projection: self.projection.clone(),
            should_cache: self.should_cache.clone(),
            sweep_filter: self.sweep_filter.clone(),
        }
    }
}

impl<E: CacheEntity> fmt::Debug for KindOptions<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KindOptions")
            .field("kind", &E::KIND)
            .field("in_memory", &self.in_memory)
            .field("outside_memory", &self.outside_memory)
            .field("projection", &self.projection)
            .field("should_cache", &self.should_cache.is_some())
            .field("sweep_filter", &self.sweep_filter.is_some())
            .finish()
    }
}

/// Kinds whose internal cascade is replaced by the caller's hook.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReplaceInternal {
    pub guild: bool,
    pub role: bool,
    pub channel: bool,
}

/// Bulk removal configuration.
#[derive(Clone, Default)]
pub struct BulkOptions {
    pub remove_guild: Option<BulkHook>,
    pub remove_role: Option<BulkHook>,
    pub remove_channel: Option<BulkHook>,
    pub replace_internal: ReplaceInternal,
}

impl fmt::Debug for BulkOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BulkOptions")
            .field("remove_guild", &self.remove_guild.is_some())
            .field("remove_role", &self.remove_role.is_some())
            .field("remove_channel", &self.remove_channel.is_some())
            .field("replace_internal", &self.replace_internal)
            .finish()
    }
}

/// Wrap an async closure as a [`BulkHook`].
pub fn bulk_hook<F, Fut>(hook: F) -> BulkHook
where
    F: Fn(Snowflake) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    Arc::new(move |id: Snowflake| -> BoxFuture<'static, Result<()>> { Box::pin(hook(id)) })
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SweeperOptions {
    pub interval: Duration,
    /// Evict records idle for longer than this, for kinds without a filter.
    pub max_inactive: Option<Duration>,
}

impl Default for SweeperOptions {
    fn default() -> Self {
        SweeperOptions {
            interval: DEFAULT_SWEEP_INTERVAL,
            max_inactive: None,
        }
    }
}

/// Complete cache configuration.
#[derive(Clone, Debug)]
pub struct CacheOptions {
    pub default_in_memory: bool,
    pub default_outside_memory: bool,
    pub guild: KindOptions<Guild>,
    pub channel: KindOptions<Channel>,
    pub role: KindOptions<Role>,
    pub member: KindOptions<Member>,
    pub user: KindOptions<User>,
    pub bulk: BulkOptions,
    pub sweeper: SweeperOptions,
    /// Tombstone window after a channel or thread deletion event.
    pub deletion_delay: Duration,
    /// The connected account's own user id; never swept nor re-stamped.
    pub current_user: Option<Snowflake>,
    /// Keep guild-less channels in a top-level map while nesting is on.
    pub top_level_private_channels: bool,
}

impl Default for CacheOptions {
    fn default() -> Self {
        CacheOptions {
            default_in_memory: true,
            default_outside_memory: false,
            guild: KindOptions::new(),
            channel: KindOptions::new(),
            role: KindOptions::new(),
            member: KindOptions::new(),
            user: KindOptions::new(),
            bulk: BulkOptions::default(),
            sweeper: SweeperOptions::default(),
            deletion_delay: DEFAULT_DELETION_DELAY,
            current_user: None,
            top_level_private_channels: false,
        }
    }
}

impl CacheOptions {
    /// Resolve the memory tier switch for a kind.
    pub fn in_memory(&self, kind: EntityKind) -> bool {
        let explicit = match kind {
            EntityKind::Guild => self.guild.in_memory,
            EntityKind::Channel => self.channel.in_memory,
            EntityKind::Role => self.role.in_memory,
            EntityKind::Member => self.member.in_memory,
            EntityKind::User => self.user.in_memory,
        };
        explicit.unwrap_or(self.default_in_memory)
    }

    /// Resolve the external tier switch for a kind.
    pub fn outside_memory(&self, kind: EntityKind) -> bool {
        let explicit = match kind {
            EntityKind::Guild => self.guild.outside_memory,
            EntityKind::Channel => self.channel.outside_memory,
            EntityKind::Role => self.role.outside_memory,
            EntityKind::Member => self.member.outside_memory,
            EntityKind::User => self.user.outside_memory,
        };
        explicit.unwrap_or(self.default_outside_memory)
    }

    /// Guild-scoped kinds nest inside their guild when guilds live in memory.
    pub fn nesting(&self) -> bool {
        self.in_memory(EntityKind::Guild)
    }

    /// The current user's record is exempt from stamping and sweeping.
    pub fn is_pinned(&self, kind: EntityKind, id: Option<Snowflake>) -> bool {
        kind == EntityKind::User && id.is_some() && id == self.current_user
    }

    /// Load options from `GATEWAY_CACHE_*` environment variables.
    ///
    /// Recognised variables:
    ///
    /// - `GATEWAY_CACHE_IN_MEMORY`, `GATEWAY_CACHE_OUTSIDE_MEMORY`
    /// - `GATEWAY_CACHE_<KIND>_IN_MEMORY`, `GATEWAY_CACHE_<KIND>_OUTSIDE_MEMORY`
    /// - `GATEWAY_CACHE_<KIND>_DESIRED`, `GATEWAY_CACHE_<KIND>_UNDESIRED`
    ///   (comma separated field names)
    /// - `GATEWAY_CACHE_DELETION_DELAY_MS`
    /// - `GATEWAY_CACHE_SWEEP_INTERVAL_SECS`, `GATEWAY_CACHE_MAX_INACTIVE_SECS`
    /// - `GATEWAY_CACHE_CURRENT_USER`
    /// - `GATEWAY_CACHE_TOP_LEVEL_PRIVATE_CHANNELS`
    ///
    /// Unset variables keep their defaults. Hooks and predicates cannot be
    /// expressed this way; add them afterwards.
    ///
    /// # Errors
    /// Returns `Error::ConfigError` when a variable cannot be parsed.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`CacheOptions::from_env`] with a custom variable source.
    pub fn from_lookup<L>(lookup: L) -> Result<Self>
    where
        L: Fn(&str) -> Option<String>,
    {
        let mut options = CacheOptions::default();

        if let Some(v) = parse_var::<bool, _>(&lookup, "GATEWAY_CACHE_IN_MEMORY")? {
            options.default_in_memory = v;
        }
        if let Some(v) = parse_var::<bool, _>(&lookup, "GATEWAY_CACHE_OUTSIDE_MEMORY")? {
            options.default_outside_memory = v;
        }

        options.guild = kind_from_lookup(&lookup)?;
        options.channel = kind_from_lookup(&lookup)?;
        options.role = kind_from_lookup(&lookup)?;
        options.member = kind_from_lookup(&lookup)?;
        options.user = kind_from_lookup(&lookup)?;

        if let Some(ms) = parse_var::<u64, _>(&lookup, "GATEWAY_CACHE_DELETION_DELAY_MS")? {
            options.deletion_delay = Duration::from_millis(ms);
        }
        if let Some(secs) = parse_var::<u64, _>(&lookup, "GATEWAY_CACHE_SWEEP_INTERVAL_SECS")? {
            if secs == 0 {
                return Err(Error::ConfigError(
                    "GATEWAY_CACHE_SWEEP_INTERVAL_SECS must be greater than zero".to_string(),
                ));
            }
            options.sweeper.interval = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_var::<u64, _>(&lookup, "GATEWAY_CACHE_MAX_INACTIVE_SECS")? {
            options.sweeper.max_inactive = Some(Duration::from_secs(secs));
        }
        options.current_user = parse_var(&lookup, "GATEWAY_CACHE_CURRENT_USER")?;
        if let Some(v) = parse_var::<bool, _>(&lookup, "GATEWAY_CACHE_TOP_LEVEL_PRIVATE_CHANNELS")? {
            options.top_level_private_channels = v;
        }

        Ok(options)
    }
}

fn parse_var<T, L>(lookup: &L, name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: fmt::Display,
    L: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        Some(raw) => raw
            .trim()
            .to_lowercase()
            .parse::<T>()
            .map(Some)
            .map_err(|e| Error::ConfigError(format!("Invalid {}={:?}: {}", name, raw, e))),
        None => Ok(None),
    }
}

fn parse_fields<F, L>(lookup: &L, name: &str) -> Result<Vec<F>>
where
    F: FromStr<Err = String>,
    L: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(name) else {
        return Ok(Vec::new());
    };

    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<F>()
                .map_err(|e| Error::ConfigError(format!("{}: {}", name, e)))
        })
        .collect()
}

fn kind_from_lookup<E, L>(lookup: &L) -> Result<KindOptions<E>>
where
    E: CacheEntity,
    E::Field: FromStr<Err = String>,
    L: Fn(&str) -> Option<String>,
{
    let prefix = format!("GATEWAY_CACHE_{}", E::KIND.table().to_uppercase());

    let mut options = KindOptions::<E>::new();
    options.in_memory = parse_var(lookup, &format!("{}_IN_MEMORY", prefix))?;
    options.outside_memory = parse_var(lookup, &format!("{}_OUTSIDE_MEMORY", prefix))?;

    let desired: Vec<E::Field> = parse_fields(lookup, &format!("{}_DESIRED", prefix))?;
    let undesired: Vec<E::Field> = parse_fields(lookup, &format!("{}_UNDESIRED", prefix))?;
    options.projection = Projection::new()
        .with_desired(desired)
        .with_undesired(undesired);

    Ok(options)
}

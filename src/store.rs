//! Per-kind entity store: get, set and delete across the memory and
//! external tiers.

use crate::cache::ProxyCache;
use crate::entity::{now_millis, CacheEntity, EntityKind, Snowflake};
use crate::error::Result;
use crate::memory::{NestedKinds, Placement};
use crate::model::{Channel, Guild};
use crate::residence::MemoryResident;
use crate::storage::ExternalStorage;
use std::marker::PhantomData;

/// Why a record was not cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Skip {
    /// The record carries no identifier.
    MissingIdentifier,
    /// Nesting is on and no owning guild could be resolved.
    OrphanedChild,
}

/// Result of a successful `set`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOutcome {
    /// Placed in a top-level memory map.
    Stored,
    /// Placed inside its guild.
    Nested,
    /// Held in the pending buffer until its guild is cached.
    Buffered,
    /// The memory tier does not retain this kind.
    OutsideMemory,
    /// The should-cache predicate declined the record. Nothing was written.
    Rejected,
    /// Not placed in memory. The external write still happened if enabled.
    Skipped(Skip),
}

impl SetOutcome {
    /// Whether the record is now readable from memory.
    pub fn in_memory(&self) -> bool {
        matches!(
            self,
            SetOutcome::Stored | SetOutcome::Nested | SetOutcome::Buffered
        )
    }
}

/// Store for one entity kind, borrowed from a [`ProxyCache`].
///
/// ```
/// # use gateway_cache::{ProxyCache, CacheOptions, SetOutcome};
/// # use gateway_cache::model::User;
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> gateway_cache::Result<()> {
/// let cache = ProxyCache::memory_only(CacheOptions::default());
///
/// let outcome = cache.users().set(User::new(1).with_username("ferris")).await?;
/// assert_eq!(outcome, SetOutcome::Stored);
///
/// let user = cache.users().get(1).await?;
/// assert_eq!(user.and_then(|u| u.username).as_deref(), Some("ferris"));
/// # Ok(())
/// # }
/// ```
pub struct EntityStore<'a, E, S> {
    cache: &'a ProxyCache<S>,
    _kind: PhantomData<fn() -> E>,
}

impl<'a, E, S> EntityStore<'a, E, S>
where
    E: MemoryResident,
    S: ExternalStorage,
{
    pub(crate) fn new(cache: &'a ProxyCache<S>) -> Self {
        EntityStore {
            cache,
            _kind: PhantomData,
        }
    }

    /// Whether the memory tier retains this kind.
    pub fn in_memory(&self) -> bool {
        E::memory_enabled(self.cache.options())
    }

    /// Whether reads and writes reach the external tier.
    pub fn outside_memory(&self) -> bool {
        self.cache.options().outside_memory(E::KIND) && self.cache.storage().is_configured()
    }

    fn stamp(&self, id: Option<Snowflake>) -> Option<u64> {
        if self.cache.options().is_pinned(E::KIND, id) {
            None
        } else {
            Some(now_millis())
        }
    }

    fn placement(&self, replace: bool, stamp: Option<u64>) -> Placement {
        let options = self.cache.options();
        Placement {
            nesting: options.nesting(),
            replace,
            private_channels: options.top_level_private_channels,
            stamp,
            nested: NestedKinds::of(options),
        }
    }

    /// Read a record, memory first.
    ///
    /// A memory miss falls back to the external tier when it is enabled;
    /// a record found there is copied into memory.
    ///
    /// # Errors
    /// Returns `Err` if the external tier fails.
    pub async fn get(&self, key: E::Key) -> Result<Option<E>> {
        if self.in_memory() {
            let hit = self.cache.with_state(|state| {
                let record = E::lookup(state, &key)?;
                if let Some(now) = self.stamp(record.id()) {
                    record.touch(now);
                }
                Some(record.clone())
            });
            if hit.is_some() {
                debug!("✓ {} {} -> memory HIT", E::KIND, key);
                return Ok(hit);
            }
        }

        if !self.outside_memory() {
            debug!("✓ {} {} -> MISS", E::KIND, key);
            return Ok(None);
        }

        let Some(mut record) = self
            .cache
            .storage()
            .get_item::<E>(E::record_key(&key))
            .await?
        else {
            debug!("✓ {} {} -> MISS", E::KIND, key);
            return Ok(None);
        };

        debug!("✓ {} {} -> external HIT", E::KIND, key);
        let stamp = self.stamp(record.id());
        if let Some(now) = stamp {
            record.touch(now);
        }
        if self.in_memory() {
            let placement = self.placement(false, stamp);
            let copy = record.clone();
            self.cache.with_state(|state| {
                E::place(state, key, copy, placement);
                state.debug_check_index();
            });
        }
        Ok(Some(record))
    }

    /// Cache `record`, merging it over any resident copy.
    ///
    /// # Errors
    /// Returns `Err` if the external tier fails. The memory tier is not
    /// rolled back.
    pub async fn set(&self, record: E) -> Result<SetOutcome> {
        self.set_with(record, false).await
    }

    /// Cache `record`; with `replace` the resident copy is overwritten
    /// instead of merged.
    ///
    /// # Errors
    /// Returns `Err` if the external tier fails. The memory tier is not
    /// rolled back.
    pub async fn set_with(&self, record: E, replace: bool) -> Result<SetOutcome> {
        let Some(id) = record.id() else {
            warn!("✗ {} record without an id was not cached", E::KIND);
            return Ok(SetOutcome::Skipped(Skip::MissingIdentifier));
        };
        let Some(key) = record.cache_key() else {
            warn!("✗ {} {} has no owning guild and was not cached", E::KIND, id);
            return Ok(SetOutcome::Skipped(Skip::OrphanedChild));
        };

        if let Some(predicate) = &E::options(self.cache.options()).should_cache {
            if !predicate(&record).await {
                return Ok(SetOutcome::Rejected);
            }
        }

        let mut record = record;
        let stamp = self.stamp(Some(id));
        if let Some(now) = stamp {
            record.touch(now);
        }

        let external = self.outside_memory();
        let (outcome, mirror) = if self.in_memory() {
            let incoming = external.then(|| record.clone());
            let placement = self.placement(replace, stamp);
            let (outcome, resident) = self.cache.with_state(|state| {
                if E::KIND == EntityKind::Channel {
                    state.revive(id);
                }
                let outcome = E::place(state, key, record, placement);
                state.debug_check_index();
                let resident = if external {
                    E::lookup(state, &key).map(|r| r.clone())
                } else {
                    None
                };
                (outcome, resident)
            });
            (outcome, resident.or(incoming))
        } else {
            (SetOutcome::OutsideMemory, external.then_some(record))
        };

        match outcome {
            SetOutcome::Skipped(Skip::OrphanedChild) => {
                warn!("✗ {} {} has no resolvable guild; not cached in memory", E::KIND, key)
            }
            _ => debug!("✓ {} {} -> {:?}", E::KIND, key, outcome),
        }

        if let Some(copy) = mirror {
            self.cache
                .storage()
                .set_item(E::record_key(&key), &copy)
                .await?;
        }
        Ok(outcome)
    }

    /// Delete a record from both tiers.
    ///
    /// Guilds, roles and channels run their bulk cascade first (the internal
    /// one unless replaced, then the configured hook).
    ///
    /// Returns whether a memory copy was evicted.
    ///
    /// # Errors
    /// Returns `Err` if a bulk hook or the external tier fails.
    pub async fn delete(&self, key: E::Key) -> Result<bool> {
        let (replace_internal, hook) = E::bulk_hook(&self.cache.options().bulk);
        if !replace_internal {
            self.cache.with_state(|state| E::cascade(state, &key));
        }
        if let Some(hook) = hook {
            hook(E::record_key(&key).id).await?;
        }

        let evicted = self.cache.with_state(|state| {
            let evicted = E::evict(state, &key).is_some();
            state.debug_check_index();
            evicted
        });
        debug!("✓ {} {} deleted (memory copy: {})", E::KIND, key, evicted);

        if self.outside_memory() {
            self.cache
                .storage()
                .remove_item(E::record_key(&key))
                .await?;
        }
        Ok(evicted)
    }
}

impl<'a, S: ExternalStorage> EntityStore<'a, Channel, S> {
    /// Delete a channel or thread and tombstone its id.
    ///
    /// The delete runs immediately. For the configured deletion delay the id
    /// stays tombstoned: a later `set` revives it, and if none arrives any
    /// memory copy that reappeared (for example through an external read)
    /// is evicted when the window closes.
    ///
    /// # Errors
    /// Returns `Err` if a bulk hook or the external tier fails.
    pub async fn delete_debounced(&self, id: Snowflake) -> Result<bool> {
        let generation = self.cache.with_state(|state| state.open_tombstone(id));
        self.cache.schedule_tombstone_close(id, generation);
        self.delete(id).await
    }
}

impl<'a, S: ExternalStorage> EntityStore<'a, Guild, S> {
    /// Add `delta` to a guild's member count (saturating at zero).
    ///
    /// The count is edited in place: the should-cache predicate does not run
    /// and no other field changes. With the memory tier on only resident
    /// guilds are edited; otherwise the external copy is.
    ///
    /// Returns the new count, or `None` when the guild is not cached.
    ///
    /// # Errors
    /// Returns `Err` if the external tier fails.
    pub async fn adjust_member_count(&self, guild_id: Snowflake, delta: i64) -> Result<Option<u64>> {
        let key = Guild::record_key(&guild_id);

        let edited = if self.in_memory() {
            let external = self.outside_memory();
            let edited = self.cache.with_state(|state| {
                let guild = Guild::lookup(state, &guild_id)?;
                let next = shift_count(guild.member_count, delta);
                guild.member_count = Some(next);
                Some((next, external.then(|| guild.clone())))
            });
            let Some((next, mirror)) = edited else {
                return Ok(None);
            };
            if let Some(copy) = mirror {
                self.cache.storage().set_item(key, &copy).await?;
            }
            next
        } else if self.outside_memory() {
            let Some(mut guild) = self.cache.storage().get_item::<Guild>(key).await? else {
                return Ok(None);
            };
            let next = shift_count(guild.member_count, delta);
            guild.member_count = Some(next);
            self.cache.storage().set_item(key, &guild).await?;
            next
        } else {
            return Ok(None);
        };

        debug!("✓ guild {} member count -> {}", guild_id, edited);
        Ok(Some(edited))
    }
}

fn shift_count(count: Option<u64>, delta: i64) -> u64 {
    let current = count.unwrap_or(0);
    if delta.is_negative() {
        current.saturating_sub(delta.unsigned_abs())
    } else {
        current.saturating_add(delta.unsigned_abs())
    }
}

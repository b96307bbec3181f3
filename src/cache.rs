//! The cache instance: shared memory state, options and external storage.

use crate::bulk;
use crate::config::CacheOptions;
use crate::entity::Snowflake;
use crate::memory::{MemoryState, NestedKinds, Placement};
use crate::model::{Channel, Guild, Member, Role, User};
use crate::residence::MemoryResident;
use crate::storage::{ExternalStorage, NoStorage};
use crate::store::EntityStore;
use crate::sweeper::{self, SweepReport};
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;

struct Inner<S> {
    options: CacheOptions,
    storage: S,
    state: Mutex<MemoryState>,
}

/// Write-through entity cache shared between event handlers.
///
/// Cloning is cheap; clones share the same state.
pub struct ProxyCache<S = NoStorage> {
    inner: Arc<Inner<S>>,
}

impl<S> Clone for ProxyCache<S> {
    fn clone(&self) -> Self {
        ProxyCache {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Number of records resident in memory, per location.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MemoryStats {
    pub guilds: usize,
    /// Top-level and nested channels.
    pub channels: usize,
    /// Top-level and nested roles.
    pub roles: usize,
    pub members: usize,
    pub users: usize,
    /// Records waiting in the pending buffer.
    pub pending: usize,
    pub index_entries: usize,
    pub tombstones: usize,
}

impl ProxyCache<NoStorage> {
    /// Cache without an external tier.
    pub fn memory_only(options: CacheOptions) -> Self {
        ProxyCache::new(options, NoStorage)
    }
}

impl<S: ExternalStorage> ProxyCache<S> {
    pub fn new(options: CacheOptions, storage: S) -> Self {
        info!(
            "✓ Cache created (nesting: {}, external tier: {})",
            options.nesting(),
            storage.is_configured()
        );
        ProxyCache {
            inner: Arc::new(Inner {
                options,
                storage,
                state: Mutex::new(MemoryState::default()),
            }),
        }
    }

    pub fn options(&self) -> &CacheOptions {
        &self.inner.options
    }

    pub fn storage(&self) -> &S {
        &self.inner.storage
    }

    pub fn guilds(&self) -> EntityStore<'_, Guild, S> {
        EntityStore::new(self)
    }

    pub fn channels(&self) -> EntityStore<'_, Channel, S> {
        EntityStore::new(self)
    }

    pub fn roles(&self) -> EntityStore<'_, Role, S> {
        EntityStore::new(self)
    }

    pub fn members(&self) -> EntityStore<'_, Member, S> {
        EntityStore::new(self)
    }

    pub fn users(&self) -> EntityStore<'_, User, S> {
        EntityStore::new(self)
    }

    /// Run `f` with the memory state locked. `f` must not block.
    pub(crate) fn with_state<R>(&self, f: impl FnOnce(&mut MemoryState) -> R) -> R {
        let mut state = self.inner.state.lock();
        f(&mut state)
    }

    /// Close the tombstone for `channel_id` once the deletion delay elapses.
    pub(crate) fn schedule_tombstone_close(&self, channel_id: Snowflake, generation: u64) {
        let delay = self.inner.options.deletion_delay;
        let weak = Arc::downgrade(&self.inner);

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    tokio::time::sleep(delay).await;
                    close_tombstone(&weak, channel_id, generation);
                });
            }
            Err(_) => {
                warn!(
                    "⚠ No tokio runtime; closing tombstone for channel {} immediately",
                    channel_id
                );
                close_tombstone(&weak, channel_id, generation);
            }
        }
    }

    /// Install a childless copy of `guild` so its children can nest while it
    /// is being decoded. Returns `false` when guilds are not kept in memory.
    pub(crate) fn install_guild_shell(&self, guild: &Guild) -> bool {
        let Some(id) = guild.id else {
            return false;
        };
        if !self.options().nesting() {
            return false;
        }

        let placement = Placement {
            nesting: true,
            replace: false,
            private_channels: self.options().top_level_private_channels,
            stamp: None,
            nested: NestedKinds::of(self.options()),
        };
        self.with_state(|state| {
            Guild::place(state, id, guild.shell(), placement);
            state.debug_check_index();
        });
        true
    }

    /// Undo [`ProxyCache::install_guild_shell`] together with everything
    /// that nested into the shell.
    pub(crate) fn evict_guild_shell(&self, guild_id: Snowflake) {
        self.with_state(|state| {
            Guild::evict(state, &guild_id);
            bulk::cascade_guild(state, guild_id);
            state.debug_check_index();
        });
    }

    pub fn memory_stats(&self) -> MemoryStats {
        self.with_state(|state| {
            let nested = |count: fn(&Guild) -> usize| state.guilds.values().map(count).sum::<usize>();
            MemoryStats {
                guilds: state.guilds.len(),
                channels: state.channels.len()
                    + nested(|g| g.channels.as_ref().map_or(0, |m| m.len())),
                roles: state.roles.len() + nested(|g| g.roles.as_ref().map_or(0, |m| m.len())),
                members: nested(|g| g.members.as_ref().map_or(0, |m| m.len())),
                users: state.users.len(),
                pending: state.pending.len(),
                index_entries: state.index.len(),
                tombstones: state.tombstone_count(),
            }
        })
    }

    /// Run one sweeper pass over the memory tier.
    pub fn sweep(&self) -> SweepReport {
        let report = sweeper::sweep(self);
        if report.total() > 0 {
            info!("✓ Sweep evicted {} records: {:?}", report.total(), report);
        }
        report
    }

    /// Spawn the periodic sweeper.
    ///
    /// The task stops on its own once every handle to the cache is dropped.
    /// Must be called inside a tokio runtime.
    pub fn start_sweeper(&self) -> JoinHandle<()> {
        let period = self.options().sweeper.interval.max(Duration::from_millis(1));
        let weak = Arc::downgrade(&self.inner);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(inner) = weak.upgrade() else {
                    debug!("Sweeper stopped: cache dropped");
                    break;
                };
                ProxyCache { inner }.sweep();
            }
        })
    }
}

fn close_tombstone<S>(weak: &Weak<Inner<S>>, channel_id: Snowflake, generation: u64) {
    let Some(inner) = weak.upgrade() else {
        return;
    };
    let mut state = inner.state.lock();
    let Some(tombstone) = state.close_tombstone(channel_id, generation) else {
        return;
    };
    if tombstone.revived {
        debug!("✓ Channel {} was re-added during its tombstone window", channel_id);
        return;
    }
    if Channel::evict(&mut state, &channel_id).is_some() {
        debug!("✓ Channel {} evicted by delayed deletion pass", channel_id);
    }
    state.debug_check_index();
}

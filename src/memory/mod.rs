//! Memory tier state.
//!
//! Everything the memory tier holds lives in one [`MemoryState`] guarded by a
//! single mutex in the cache. Callers never hold the lock across an `.await`.

mod index;
mod pending;

pub use index::GuildIndex;
pub use pending::PendingBuffer;

use crate::config::CacheOptions;
use crate::entity::{CacheEntity, EntityKind, Snowflake};
use crate::model::{Channel, Guild, Role, User};
use std::collections::HashMap;
use std::hash::Hash;

/// How a record should be placed in memory.
#[derive(Debug, Clone, Copy)]
pub struct Placement {
    /// Guild-scoped kinds nest inside their guild.
    pub nesting: bool,
    /// Overwrite instead of merging over the resident copy.
    pub replace: bool,
    /// Guild-less channels go to the top-level map while nesting.
    pub private_channels: bool,
    /// Last-interaction stamp to apply; `None` for pinned records.
    pub stamp: Option<u64>,
    /// Child collections a guild keeps when it is placed.
    pub nested: NestedKinds,
}

/// Guild-scoped kinds the memory tier retains inside a guild.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NestedKinds {
    pub channels: bool,
    pub roles: bool,
    pub members: bool,
}

impl NestedKinds {
    pub const ALL: NestedKinds = NestedKinds {
        channels: true,
        roles: true,
        members: true,
    };

    pub fn of(options: &CacheOptions) -> Self {
        NestedKinds {
            channels: options.in_memory(EntityKind::Channel),
            roles: options.in_memory(EntityKind::Role),
            members: options.in_memory(EntityKind::Member),
        }
    }
}

/// Tombstone opened by a debounced channel deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tombstone {
    pub generation: u64,
    /// A set arrived while the tombstone was open.
    pub revived: bool,
}

#[derive(Debug, Default)]
pub struct MemoryState {
    pub guilds: HashMap<Snowflake, Guild>,
    /// Top-level channels: all of them without nesting, private ones with it.
    pub channels: HashMap<Snowflake, Channel>,
    /// Top-level roles, only used without nesting.
    pub roles: HashMap<Snowflake, Role>,
    pub users: HashMap<Snowflake, User>,
    pub index: GuildIndex,
    pub pending: PendingBuffer,
    tombstones: HashMap<Snowflake, Tombstone>,
    next_generation: u64,
}

impl MemoryState {
    /// Open (or reopen) a tombstone for a deleted channel id.
    pub fn open_tombstone(&mut self, channel_id: Snowflake) -> u64 {
        self.next_generation += 1;
        let generation = self.next_generation;
        self.tombstones.insert(
            channel_id,
            Tombstone {
                generation,
                revived: false,
            },
        );
        generation
    }

    /// Record that `channel_id` was set while tombstoned.
    pub fn revive(&mut self, channel_id: Snowflake) {
        if let Some(tombstone) = self.tombstones.get_mut(&channel_id) {
            tombstone.revived = true;
        }
    }

    /// Close the tombstone if it still belongs to `generation`.
    pub fn close_tombstone(&mut self, channel_id: Snowflake, generation: u64) -> Option<Tombstone> {
        match self.tombstones.get(&channel_id) {
            Some(t) if t.generation == generation => self.tombstones.remove(&channel_id),
            _ => None,
        }
    }

    pub fn tombstone_count(&self) -> usize {
        self.tombstones.len()
    }

    /// Every reverse-index entry must point at a cached guild or a pending bucket.
    pub fn debug_check_index(&self) {
        if !cfg!(debug_assertions) {
            return;
        }
        for guild_id in self.index.guilds() {
            debug_assert!(
                self.guilds.contains_key(&guild_id) || self.pending.contains(guild_id),
                "reverse index points at unknown guild {}",
                guild_id
            );
        }
    }
}

/// Merge or replace `record` in `slot`, then apply the placement stamp.
pub fn settle<K, E>(slot: &mut HashMap<K, E>, key: K, record: E, placement: Placement)
where
    K: Copy + Eq + Hash,
    E: CacheEntity,
{
    if placement.replace || !slot.contains_key(&key) {
        slot.insert(key, record);
    } else if let Some(existing) = slot.get_mut(&key) {
        existing.merge(record);
    }

    if let (Some(now), Some(resident)) = (placement.stamp, slot.get_mut(&key)) {
        resident.touch(now);
    }
}

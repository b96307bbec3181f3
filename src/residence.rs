//! Where each entity kind lives in the memory tier.
//!
//! Guilds and users always live in top-level maps. Channels and roles nest
//! inside their guild while nesting is on, and fall back to top-level maps
//! otherwise. Members only ever live nested.

use crate::bulk;
use crate::config::{BulkHook, BulkOptions, CacheOptions, KindOptions};
use crate::entity::{overlay_collection, CacheEntity, EntityKind, Snowflake};
use crate::key::MemberKey;
use crate::memory::{settle, MemoryState, Placement};
use crate::model::{Channel, Guild, Member, Role, User};
use crate::store::{SetOutcome, Skip};
use std::collections::HashMap;

mod private {
    pub trait Sealed {}
}

impl private::Sealed for Guild {}
impl private::Sealed for Channel {}
impl private::Sealed for Role {}
impl private::Sealed for Member {}
impl private::Sealed for User {}

/// Memory-tier placement rules of one entity kind.
///
/// Implemented for the five cached kinds only.
pub trait MemoryResident: CacheEntity + private::Sealed {
    #[doc(hidden)]
    fn options(options: &CacheOptions) -> &KindOptions<Self>;

    /// Whether the memory tier retains this kind.
    #[doc(hidden)]
    fn memory_enabled(options: &CacheOptions) -> bool {
        options.in_memory(Self::KIND)
    }

    #[doc(hidden)]
    fn lookup<'a>(state: &'a mut MemoryState, key: &Self::Key) -> Option<&'a mut Self>;

    #[doc(hidden)]
    fn place(
        state: &mut MemoryState,
        key: Self::Key,
        record: Self,
        placement: Placement,
    ) -> SetOutcome;

    #[doc(hidden)]
    fn evict(state: &mut MemoryState, key: &Self::Key) -> Option<Self>;

    /// Keys of every resident record, nested ones included.
    #[doc(hidden)]
    fn resident_keys(state: &MemoryState) -> Vec<Self::Key>;

    /// Internal bulk cascade run before the record itself is deleted.
    #[doc(hidden)]
    fn cascade(_state: &mut MemoryState, _key: &Self::Key) {}

    /// `(replace_internal, hook)` for this kind.
    #[doc(hidden)]
    fn bulk_hook(_bulk: &BulkOptions) -> (bool, Option<BulkHook>) {
        (false, None)
    }
}

fn nested_keys<E>(
    nested: Option<&HashMap<Snowflake, E>>,
) -> impl Iterator<Item = Snowflake> + '_ {
    nested.into_iter().flat_map(|map| map.keys().copied())
}

/// Take channel `id` out of its current home when it is about to nest in
/// `guild_id` instead: the top-level map, or another guild or pending bucket.
fn detach_channel(state: &mut MemoryState, id: Snowflake, guild_id: Snowflake) -> Option<Channel> {
    if let Some(channel) = state.channels.remove(&id) {
        return Some(channel);
    }
    let previous = state.index.channel_guild(id).filter(|old| *old != guild_id)?;
    state.index.remove_channel(id);
    debug!("Channel {} moves from guild {} to {}", id, previous, guild_id);

    if let Some(guild) = state.guilds.get_mut(&previous) {
        return guild.channels.as_mut()?.remove(&id);
    }
    let removed = state.pending.bucket_mut(previous)?.channels.remove(&id);
    state.pending.compact(previous);
    removed
}

/// Role counterpart of [`detach_channel`]. Roles never sit top-level while
/// nesting.
fn detach_role(state: &mut MemoryState, id: Snowflake, guild_id: Snowflake) -> Option<Role> {
    let previous = state.index.role_guild(id).filter(|old| *old != guild_id)?;
    state.index.remove_role(id);
    debug!("Role {} moves from guild {} to {}", id, previous, guild_id);

    if let Some(guild) = state.guilds.get_mut(&previous) {
        return guild.roles.as_mut()?.remove(&id);
    }
    let removed = state.pending.bucket_mut(previous)?.roles.remove(&id);
    state.pending.compact(previous);
    removed
}

impl MemoryResident for Guild {
    fn options(options: &CacheOptions) -> &KindOptions<Self> {
        &options.guild
    }

    fn lookup<'a>(state: &'a mut MemoryState, key: &Snowflake) -> Option<&'a mut Self> {
        state.guilds.get_mut(key)
    }

    fn place(
        state: &mut MemoryState,
        id: Snowflake,
        record: Guild,
        placement: Placement,
    ) -> SetOutcome {
        if placement.replace {
            state.index.prune_guild(id);
        }
        let pending = state.pending.take(id);

        settle(&mut state.guilds, id, record, placement);
        let Some(guild) = state.guilds.get_mut(&id) else {
            return SetOutcome::Stored;
        };
        guild.ensure_collections();

        if let Some(bucket) = pending {
            debug!(
                "✓ Draining {} pending records into guild {}",
                bucket.len(),
                id
            );
            overlay_collection(&mut guild.channels, Some(bucket.channels));
            overlay_collection(&mut guild.roles, Some(bucket.roles));
            overlay_collection(&mut guild.members, Some(bucket.members));
        }

        let nested = placement.nested;
        if !nested.channels {
            guild.channels = None;
        }
        if !nested.roles {
            guild.roles = None;
        }
        if !nested.members {
            guild.members = None;
        }

        for channel in guild.channels.iter_mut().flat_map(|m| m.values_mut()) {
            channel.guild_id.get_or_insert(id);
        }
        for role in guild.roles.iter_mut().flat_map(|m| m.values_mut()) {
            role.guild_id.get_or_insert(id);
        }
        for member in guild.members.iter_mut().flat_map(|m| m.values_mut()) {
            member.guild_id.get_or_insert(id);
        }

        let channel_ids: Vec<Snowflake> = nested_keys(guild.channels.as_ref()).collect();
        let role_ids: Vec<Snowflake> = nested_keys(guild.roles.as_ref()).collect();
        for channel_id in channel_ids {
            detach_channel(state, channel_id, id);
            state.index.insert_channel(channel_id, id);
        }
        for role_id in role_ids {
            detach_role(state, role_id, id);
            state.index.insert_role(role_id, id);
        }

        SetOutcome::Stored
    }

    fn evict(state: &mut MemoryState, key: &Snowflake) -> Option<Self> {
        let removed = state.guilds.remove(key)?;
        state.index.prune_guild(*key);
        Some(removed)
    }

    fn resident_keys(state: &MemoryState) -> Vec<Snowflake> {
        state.guilds.keys().copied().collect()
    }

    fn cascade(state: &mut MemoryState, key: &Snowflake) {
        bulk::cascade_guild(state, *key);
    }

    fn bulk_hook(bulk: &BulkOptions) -> (bool, Option<BulkHook>) {
        (bulk.replace_internal.guild, bulk.remove_guild.clone())
    }
}

impl MemoryResident for Channel {
    fn options(options: &CacheOptions) -> &KindOptions<Self> {
        &options.channel
    }

    fn lookup<'a>(state: &'a mut MemoryState, key: &Snowflake) -> Option<&'a mut Self> {
        let id = *key;
        if state.channels.contains_key(&id) {
            return state.channels.get_mut(&id);
        }

        let guild_id = state.index.channel_guild(id)?;
        if state.guilds.contains_key(&guild_id) {
            return state.guilds.get_mut(&guild_id)?.channels.as_mut()?.get_mut(&id);
        }
        state.pending.bucket_mut(guild_id)?.channels.get_mut(&id)
    }

    fn place(
        state: &mut MemoryState,
        id: Snowflake,
        mut record: Channel,
        placement: Placement,
    ) -> SetOutcome {
        if !placement.nesting {
            settle(&mut state.channels, id, record, placement);
            return SetOutcome::Stored;
        }

        let Some(guild_id) = record.guild_id.or_else(|| state.index.channel_guild(id)) else {
            if placement.private_channels {
                settle(&mut state.channels, id, record, placement);
                return SetOutcome::Stored;
            }
            return SetOutcome::Skipped(Skip::OrphanedChild);
        };

        record.guild_id = Some(guild_id);
        let record = match detach_channel(state, id, guild_id) {
            Some(mut previous) if !placement.replace => {
                previous.merge(record);
                previous
            }
            _ => record,
        };
        state.index.insert_channel(id, guild_id);

        match state.guilds.get_mut(&guild_id) {
            Some(guild) => {
                settle(guild.channels.get_or_insert_with(HashMap::new), id, record, placement);
                SetOutcome::Nested
            }
            None => {
                state.pending.buffer_channel(guild_id, id, record, placement.replace);
                SetOutcome::Buffered
            }
        }
    }

    fn evict(state: &mut MemoryState, key: &Snowflake) -> Option<Self> {
        let id = *key;
        let guild_id = state.index.remove_channel(id);
        if let Some(channel) = state.channels.remove(&id) {
            return Some(channel);
        }

        let guild_id = guild_id?;
        if let Some(guild) = state.guilds.get_mut(&guild_id) {
            return guild.channels.as_mut()?.remove(&id);
        }
        let removed = state.pending.bucket_mut(guild_id)?.channels.remove(&id);
        state.pending.compact(guild_id);
        removed
    }

    fn resident_keys(state: &MemoryState) -> Vec<Snowflake> {
        let nested = state
            .guilds
            .values()
            .flat_map(|guild| nested_keys(guild.channels.as_ref()));
        state.channels.keys().copied().chain(nested).collect()
    }

    fn cascade(state: &mut MemoryState, key: &Snowflake) {
        bulk::cascade_channel(state, *key);
    }

    fn bulk_hook(bulk: &BulkOptions) -> (bool, Option<BulkHook>) {
        (bulk.replace_internal.channel, bulk.remove_channel.clone())
    }
}

impl MemoryResident for Role {
    fn options(options: &CacheOptions) -> &KindOptions<Self> {
        &options.role
    }

    fn lookup<'a>(state: &'a mut MemoryState, key: &Snowflake) -> Option<&'a mut Self> {
        let id = *key;
        if state.roles.contains_key(&id) {
            return state.roles.get_mut(&id);
        }

        let guild_id = state.index.role_guild(id)?;
        if state.guilds.contains_key(&guild_id) {
            return state.guilds.get_mut(&guild_id)?.roles.as_mut()?.get_mut(&id);
        }
        state.pending.bucket_mut(guild_id)?.roles.get_mut(&id)
    }

    fn place(
        state: &mut MemoryState,
        id: Snowflake,
        mut record: Role,
        placement: Placement,
    ) -> SetOutcome {
        if !placement.nesting {
            settle(&mut state.roles, id, record, placement);
            return SetOutcome::Stored;
        }

        let Some(guild_id) = record.guild_id.or_else(|| state.index.role_guild(id)) else {
            return SetOutcome::Skipped(Skip::OrphanedChild);
        };

        record.guild_id = Some(guild_id);
        let record = match detach_role(state, id, guild_id) {
            Some(mut previous) if !placement.replace => {
                previous.merge(record);
                previous
            }
            _ => record,
        };
        state.index.insert_role(id, guild_id);

        match state.guilds.get_mut(&guild_id) {
            Some(guild) => {
                settle(guild.roles.get_or_insert_with(HashMap::new), id, record, placement);
                SetOutcome::Nested
            }
            None => {
                state.pending.buffer_role(guild_id, id, record, placement.replace);
                SetOutcome::Buffered
            }
        }
    }

    fn evict(state: &mut MemoryState, key: &Snowflake) -> Option<Self> {
        let id = *key;
        let guild_id = state.index.remove_role(id);
        if let Some(role) = state.roles.remove(&id) {
            return Some(role);
        }

        let guild_id = guild_id?;
        if let Some(guild) = state.guilds.get_mut(&guild_id) {
            return guild.roles.as_mut()?.remove(&id);
        }
        let removed = state.pending.bucket_mut(guild_id)?.roles.remove(&id);
        state.pending.compact(guild_id);
        removed
    }

    fn resident_keys(state: &MemoryState) -> Vec<Snowflake> {
        let nested = state
            .guilds
            .values()
            .flat_map(|guild| nested_keys(guild.roles.as_ref()));
        state.roles.keys().copied().chain(nested).collect()
    }

    fn cascade(state: &mut MemoryState, key: &Snowflake) {
        bulk::cascade_role(state, *key);
    }

    fn bulk_hook(bulk: &BulkOptions) -> (bool, Option<BulkHook>) {
        (bulk.replace_internal.role, bulk.remove_role.clone())
    }
}

impl MemoryResident for Member {
    fn options(options: &CacheOptions) -> &KindOptions<Self> {
        &options.member
    }

    /// Members have no top-level map, so they need nesting.
    fn memory_enabled(options: &CacheOptions) -> bool {
        options.in_memory(EntityKind::Member) && options.nesting()
    }

    fn lookup<'a>(state: &'a mut MemoryState, key: &MemberKey) -> Option<&'a mut Self> {
        if state.guilds.contains_key(&key.guild_id) {
            return state
                .guilds
                .get_mut(&key.guild_id)?
                .members
                .as_mut()?
                .get_mut(&key.user_id);
        }
        state
            .pending
            .bucket_mut(key.guild_id)?
            .members
            .get_mut(&key.user_id)
    }

    fn place(
        state: &mut MemoryState,
        key: MemberKey,
        record: Member,
        placement: Placement,
    ) -> SetOutcome {
        if !placement.nesting {
            return SetOutcome::OutsideMemory;
        }

        match state.guilds.get_mut(&key.guild_id) {
            Some(guild) => {
                settle(
                    guild.members.get_or_insert_with(HashMap::new),
                    key.user_id,
                    record,
                    placement,
                );
                SetOutcome::Nested
            }
            None => {
                state
                    .pending
                    .buffer_member(key.guild_id, key.user_id, record, placement.replace);
                SetOutcome::Buffered
            }
        }
    }

    fn evict(state: &mut MemoryState, key: &MemberKey) -> Option<Self> {
        if let Some(guild) = state.guilds.get_mut(&key.guild_id) {
            return guild.members.as_mut()?.remove(&key.user_id);
        }
        let removed = state
            .pending
            .bucket_mut(key.guild_id)?
            .members
            .remove(&key.user_id);
        state.pending.compact(key.guild_id);
        removed
    }

    fn resident_keys(state: &MemoryState) -> Vec<MemberKey> {
        state
            .guilds
            .iter()
            .flat_map(|(guild_id, guild)| {
                nested_keys(guild.members.as_ref())
                    .map(move |user_id| MemberKey::new(*guild_id, user_id))
            })
            .collect()
    }
}

impl MemoryResident for User {
    fn options(options: &CacheOptions) -> &KindOptions<Self> {
        &options.user
    }

    fn lookup<'a>(state: &'a mut MemoryState, key: &Snowflake) -> Option<&'a mut Self> {
        state.users.get_mut(key)
    }

    fn place(
        state: &mut MemoryState,
        id: Snowflake,
        record: User,
        placement: Placement,
    ) -> SetOutcome {
        settle(&mut state.users, id, record, placement);
        SetOutcome::Stored
    }

    fn evict(state: &mut MemoryState, key: &Snowflake) -> Option<Self> {
        state.users.remove(key)
    }

    fn resident_keys(state: &MemoryState) -> Vec<Snowflake> {
        state.users.keys().copied().collect()
    }
}

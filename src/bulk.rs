//! Internal bulk cascades for guild, role and channel deletions.
//!
//! These run on the memory tier before the deleted record itself is evicted.
//! Caller hooks configured in [`crate::config::BulkOptions`] run after them,
//! and `replace_internal` skips them entirely.

use crate::entity::Snowflake;
use crate::memory::MemoryState;

/// What a cascade removed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CascadeReport {
    pub channels: usize,
    pub index_entries: usize,
    pub pending: usize,
    /// Members whose role list lost the deleted role.
    pub members: usize,
}

/// Guild deletion: top-level channels of the guild, reverse-index entries
/// pointing at it and its pending bucket.
pub(crate) fn cascade_guild(state: &mut MemoryState, guild_id: Snowflake) -> CascadeReport {
    let before = state.channels.len();
    state
        .channels
        .retain(|_, channel| channel.guild_id != Some(guild_id));

    let report = CascadeReport {
        channels: before - state.channels.len(),
        index_entries: state.index.prune_guild(guild_id),
        pending: state.pending.take(guild_id).map_or(0, |b| b.len()),
        members: 0,
    };

    debug!("✓ Guild {} cascade: {:?}", guild_id, report);
    report
}

/// Role deletion: strip the role from every cached member of its guild.
pub(crate) fn cascade_role(state: &mut MemoryState, role_id: Snowflake) -> CascadeReport {
    let guild_id = state
        .index
        .role_guild(role_id)
        .or_else(|| state.roles.get(&role_id).and_then(|role| role.guild_id));

    let Some(guild_id) = guild_id else {
        return CascadeReport::default();
    };

    let mut stripped = 0;
    if let Some(members) = state
        .guilds
        .get_mut(&guild_id)
        .and_then(|guild| guild.members.as_mut())
    {
        stripped += members
            .values_mut()
            .filter_map(|member| member.strip_role(role_id).then_some(()))
            .count();
    }
    if let Some(bucket) = state.pending.bucket_mut(guild_id) {
        stripped += bucket
            .members
            .values_mut()
            .filter_map(|member| member.strip_role(role_id).then_some(()))
            .count();
    }

    let report = CascadeReport {
        members: stripped,
        ..Default::default()
    };
    debug!("✓ Role {} cascade: {:?}", role_id, report);
    report
}

/// Channel deletion: evict every thread whose parent is `channel_id`.
pub(crate) fn cascade_channel(state: &mut MemoryState, channel_id: Snowflake) -> CascadeReport {
    let is_thread = |parent: Option<Snowflake>| parent == Some(channel_id);

    let mut threads: Vec<Snowflake> = state
        .channels
        .iter()
        .filter(|(_, c)| is_thread(c.parent_id))
        .map(|(id, _)| *id)
        .collect();
    for id in &threads {
        state.channels.remove(id);
    }

    let mut nested = Vec::new();
    for guild in state.guilds.values_mut() {
        if let Some(channels) = guild.channels.as_mut() {
            channels.retain(|id, c| {
                let doomed = is_thread(c.parent_id);
                if doomed {
                    nested.push(*id);
                }
                !doomed
            });
        }
    }

    let guild_id = state.index.channel_guild(channel_id);
    if let Some(bucket) = guild_id.and_then(|g| state.pending.bucket_mut(g)) {
        bucket.channels.retain(|id, c| {
            let doomed = is_thread(c.parent_id);
            if doomed {
                nested.push(*id);
            }
            !doomed
        });
    }
    if let Some(guild_id) = guild_id {
        state.pending.compact(guild_id);
    }

    let mut index_entries = 0;
    for id in &nested {
        if state.index.remove_channel(*id).is_some() {
            index_entries += 1;
        }
    }
    threads.append(&mut nested);

    let report = CascadeReport {
        channels: threads.len(),
        index_entries,
        ..Default::default()
    };
    debug!("✓ Channel {} cascade: {:?}", channel_id, report);
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{NestedKinds, Placement};
    use crate::model::{Channel, Guild, Member, Role};
    use crate::residence::MemoryResident;

    fn nesting() -> Placement {
        Placement {
            nesting: true,
            replace: false,
            private_channels: true,
            stamp: None,
            nested: NestedKinds::ALL,
        }
    }

    fn populated() -> MemoryState {
        let mut state = MemoryState::default();
        let mut guild = Guild::new(1);
        guild.insert_channel(Channel::new(10));
        guild.insert_channel(Channel::new(11).with_parent(10));
        guild.insert_role(Role::new(20));
        guild.insert_member(Member::new(1, 100).with_roles(vec![20, 21]));
        guild.insert_member(Member::new(1, 101).with_roles(vec![21]));
        Guild::place(&mut state, 1, guild, nesting());
        state
    }

    #[test]
    fn test_guild_cascade_prunes_everything_pointing_at_guild() {
        let mut state = populated();
        Role::place(&mut state, 30, Role::new(30).in_guild(2), nesting());
        state.channels.insert(50, Channel::new(50).in_guild(1));

        Guild::evict(&mut state, &1);
        let report = cascade_guild(&mut state, 1);

        assert_eq!(report.channels, 1);
        assert!(state.channels.is_empty());
        assert_eq!(state.index.channel_guild(10), None);
        assert_eq!(state.index.role_guild(30), Some(2));
        state.debug_check_index();
    }

    #[test]
    fn test_guild_cascade_discards_pending_bucket() {
        let mut state = MemoryState::default();
        Channel::place(&mut state, 10, Channel::new(10).in_guild(9), nesting());

        let report = cascade_guild(&mut state, 9);
        assert_eq!(report.pending, 1);
        assert_eq!(state.pending.len(), 0);
        assert_eq!(state.index.len(), 0);
    }

    #[test]
    fn test_role_cascade_strips_members() {
        let mut state = populated();
        let report = cascade_role(&mut state, 20);

        assert_eq!(report.members, 1);
        let guild = &state.guilds[&1];
        assert_eq!(guild.member(100).and_then(|m| m.roles.clone()), Some(vec![21]));
        assert_eq!(guild.member(101).and_then(|m| m.roles.clone()), Some(vec![21]));
    }

    #[test]
    fn test_channel_cascade_evicts_threads() {
        let mut state = populated();
        let report = cascade_channel(&mut state, 10);

        assert_eq!(report.channels, 1);
        assert_eq!(report.index_entries, 1);
        assert!(state.guilds[&1].channel(11).is_none());
        assert!(state.guilds[&1].channel(10).is_some());
        assert_eq!(state.index.channel_guild(11), None);
    }
}

//! Children that arrived before their guild.

use crate::entity::{CacheEntity, Snowflake};
use crate::model::{Channel, Member, Role};
use std::collections::HashMap;

/// Buffered children of one guild, keyed by their own id.
#[derive(Debug, Default)]
pub struct PendingBucket {
    pub channels: HashMap<Snowflake, Channel>,
    pub roles: HashMap<Snowflake, Role>,
    /// Keyed by user id.
    pub members: HashMap<Snowflake, Member>,
}

impl PendingBucket {
    pub fn len(&self) -> usize {
        self.channels.len() + self.roles.len() + self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Per-guild buffer used while nesting is on and the guild is not cached.
#[derive(Debug, Default)]
pub struct PendingBuffer {
    buckets: HashMap<Snowflake, PendingBucket>,
}

/// Insert or merge `record` into `slot` under `id`.
fn stash<E: CacheEntity>(
    slot: &mut HashMap<Snowflake, E>,
    id: Snowflake,
    record: E,
    replace: bool,
) {
    match slot.get_mut(&id) {
        Some(existing) if !replace => existing.merge(record),
        _ => {
            slot.insert(id, record);
        }
    }
}

impl PendingBuffer {
    pub fn buffer_channel(
        &mut self,
        guild_id: Snowflake,
        id: Snowflake,
        channel: Channel,
        replace: bool,
    ) {
        stash(&mut self.entry(guild_id).channels, id, channel, replace);
    }

    pub fn buffer_role(&mut self, guild_id: Snowflake, id: Snowflake, role: Role, replace: bool) {
        stash(&mut self.entry(guild_id).roles, id, role, replace);
    }

    pub fn buffer_member(
        &mut self,
        guild_id: Snowflake,
        user_id: Snowflake,
        member: Member,
        replace: bool,
    ) {
        stash(&mut self.entry(guild_id).members, user_id, member, replace);
    }

    pub fn bucket_mut(&mut self, guild_id: Snowflake) -> Option<&mut PendingBucket> {
        self.buckets.get_mut(&guild_id)
    }

    /// Remove and return the bucket for `guild_id`.
    pub fn take(&mut self, guild_id: Snowflake) -> Option<PendingBucket> {
        self.buckets.remove(&guild_id)
    }

    pub fn contains(&self, guild_id: Snowflake) -> bool {
        self.buckets.contains_key(&guild_id)
    }

    /// Drop empty buckets left behind by evictions.
    pub fn compact(&mut self, guild_id: Snowflake) {
        if self.buckets.get(&guild_id).is_some_and(PendingBucket::is_empty) {
            self.buckets.remove(&guild_id);
        }
    }

    pub fn buckets_mut(&mut self) -> impl Iterator<Item = &mut PendingBucket> + '_ {
        self.buckets.values_mut()
    }

    /// Drop every empty bucket.
    pub fn compact_all(&mut self) {
        self.buckets.retain(|_, bucket| !bucket.is_empty());
    }

    /// Total buffered records across all guilds.
    pub fn len(&self) -> usize {
        self.buckets.values().map(PendingBucket::len).sum()
    }

    fn entry(&mut self, guild_id: Snowflake) -> &mut PendingBucket {
        self.buckets.entry(guild_id).or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_merges_repeated_records() {
        let mut pending = PendingBuffer::default();
        let channel = Channel::new(10).in_guild(1).with_name("a");
        pending.buffer_channel(1, 10, channel, false);

        let mut update = Channel::new(10);
        update.topic = Some("t".to_string());
        pending.buffer_channel(1, 10, update, false);

        let bucket = pending.take(1).expect("bucket missing");
        let channel = &bucket.channels[&10];
        assert_eq!(channel.name.as_deref(), Some("a"));
        assert_eq!(channel.topic.as_deref(), Some("t"));
        assert!(!pending.contains(1));
    }

    #[test]
    fn test_replace_discards_previous_copy() {
        let mut pending = PendingBuffer::default();
        pending.buffer_role(1, 5, Role::new(5).with_name("old"), false);
        pending.buffer_role(1, 5, Role::new(5), true);

        assert!(pending.bucket_mut(1).expect("bucket missing").roles[&5].name.is_none());
    }

    #[test]
    fn test_compact_drops_empty_bucket() {
        let mut pending = PendingBuffer::default();
        pending.buffer_member(3, 9, Member::new(3, 9), false);
        pending
            .bucket_mut(3)
            .expect("bucket missing")
            .members
            .clear();
        pending.compact(3);

        assert!(!pending.contains(3));
        assert_eq!(pending.len(), 0);
    }
}

//! Predicate-driven eviction over the memory tier.
//!
//! A pass snapshots the keys of each kind, then re-resolves every key before
//! testing it, so records removed earlier in the same pass (for example the
//! children of a swept guild) are skipped instead of visited twice. Sweeping
//! never touches the external tier.
//!
//! Records waiting in the pending buffer are swept with their kind's rules
//! too, so buckets of guilds that never arrive do not accumulate.
//!
//! Filters run with the memory state locked and must not call back into the
//! cache.

use crate::bulk;
use crate::cache::ProxyCache;
use crate::config::{CacheOptions, SweepFilter};
use crate::entity::{now_millis, CacheEntity, EntityKind, Snowflake};
use crate::memory::MemoryState;
use crate::model::{Channel, Guild, Member, Role, User};
use crate::residence::MemoryResident;
use crate::storage::ExternalStorage;
use std::collections::HashMap;

/// Records evicted by one pass, per kind.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub guilds: usize,
    pub channels: usize,
    pub roles: usize,
    pub members: usize,
    pub users: usize,
    /// Buffered children of guilds that are not cached.
    pub pending: usize,
}

impl SweepReport {
    pub fn total(&self) -> usize {
        self.guilds + self.channels + self.roles + self.members + self.users + self.pending
    }
}

pub(crate) fn sweep<S: ExternalStorage>(cache: &ProxyCache<S>) -> SweepReport {
    let options = cache.options();
    let now = now_millis();

    cache.with_state(|state| {
        let members = sweep_kind::<Member>(state, options, now);
        let channels = sweep_kind::<Channel>(state, options, now);
        let roles = sweep_kind::<Role>(state, options, now);
        let guilds = sweep_kind::<Guild>(state, options, now);
        let users = sweep_kind::<User>(state, options, now);
        let pending = sweep_pending(state, options, now);
        state.debug_check_index();

        SweepReport {
            guilds,
            channels,
            roles,
            members,
            users,
            pending,
        }
    })
}

fn sweep_kind<E: MemoryResident>(state: &mut MemoryState, options: &CacheOptions, now: u64) -> usize {
    if !E::memory_enabled(options) {
        return 0;
    }

    let filter = E::options(options).sweep_filter.as_ref();
    let cutoff = inactivity_cutoff(options, now);
    if filter.is_none() && cutoff.is_none() {
        return 0;
    }

    let mut evicted = 0;
    for key in E::resident_keys(state) {
        let expired = match E::lookup(state, &key) {
            Some(record) if !options.is_pinned(E::KIND, record.id()) => {
                doomed(&*record, filter, cutoff)
            }
            _ => false,
        };
        if !expired {
            continue;
        }

        if E::evict(state, &key).is_some() {
            evicted += 1;
        }
        if E::KIND == EntityKind::Guild {
            bulk::cascade_guild(state, E::record_key(&key).id);
        }
    }

    if evicted > 0 {
        debug!("✓ Swept {} {} records", evicted, E::KIND);
    }
    evicted
}

fn inactivity_cutoff(options: &CacheOptions, now: u64) -> Option<u64> {
    options
        .sweeper
        .max_inactive
        .map(|idle| now.saturating_sub(u64::try_from(idle.as_millis()).unwrap_or(u64::MAX)))
}

fn doomed<E: CacheEntity>(record: &E, filter: Option<&SweepFilter<E>>, cutoff: Option<u64>) -> bool {
    match filter {
        Some(filter) => filter(record),
        None => cutoff.is_some_and(|cutoff| record.last_interacted_time() < cutoff),
    }
}

/// Remove the doomed records of one pending map, returning their ids.
fn drain_doomed<E: CacheEntity>(
    records: &mut HashMap<Snowflake, E>,
    filter: Option<&SweepFilter<E>>,
    cutoff: Option<u64>,
) -> Vec<Snowflake> {
    let mut swept = Vec::new();
    records.retain(|id, record| {
        let gone = doomed(&*record, filter, cutoff);
        if gone {
            swept.push(*id);
        }
        !gone
    });
    swept
}

fn sweep_pending(state: &mut MemoryState, options: &CacheOptions, now: u64) -> usize {
    let cutoff = inactivity_cutoff(options, now);
    let channel_filter = options.channel.sweep_filter.as_ref();
    let role_filter = options.role.sweep_filter.as_ref();
    let member_filter = options.member.sweep_filter.as_ref();
    if cutoff.is_none() && channel_filter.is_none() && role_filter.is_none() && member_filter.is_none() {
        return 0;
    }

    let mut channels = Vec::new();
    let mut roles = Vec::new();
    let mut members = 0;
    for bucket in state.pending.buckets_mut() {
        channels.extend(drain_doomed(&mut bucket.channels, channel_filter, cutoff));
        roles.extend(drain_doomed(&mut bucket.roles, role_filter, cutoff));
        members += drain_doomed(&mut bucket.members, member_filter, cutoff).len();
    }

    for id in &channels {
        state.index.remove_channel(*id);
    }
    for id in &roles {
        state.index.remove_role(*id);
    }
    state.pending.compact_all();

    let evicted = channels.len() + roles.len() + members;
    if evicted > 0 {
        debug!("✓ Swept {} pending records", evicted);
    }
    evicted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KindOptions;
    use std::time::Duration;

    fn populated_options() -> CacheOptions {
        let mut options = CacheOptions::default();
        options.guild = KindOptions::new().with_sweep_filter(|_: &Guild| true);
        options.channel = KindOptions::new().with_sweep_filter(|_: &Channel| true);
        options.role = KindOptions::new().with_sweep_filter(|_: &Role| true);
        options.member = KindOptions::new().with_sweep_filter(|_: &Member| true);
        options.user = KindOptions::new().with_sweep_filter(|_: &User| true);
        options
    }

    #[tokio::test]
    async fn test_match_all_empties_memory() {
        let cache = ProxyCache::memory_only(populated_options());
        let mut guild = Guild::new(1);
        guild.insert_channel(Channel::new(10));
        guild.insert_channel(Channel::new(11).with_parent(10));
        guild.insert_role(Role::new(20));
        guild.insert_member(Member::new(1, 30).with_roles(vec![20]));
        cache.guilds().set(guild).await.expect("Failed to set guild");
        cache.users().set(User::new(30)).await.expect("Failed to set user");

        let report = cache.sweep();
        assert_eq!(report.guilds, 1);
        assert_eq!(report.channels, 2);
        assert_eq!(report.users, 1);

        let stats = cache.memory_stats();
        assert_eq!(stats.guilds + stats.channels + stats.roles + stats.members, 0);
        assert_eq!(stats.users, 0);
        assert_eq!(stats.index_entries, 0);
    }

    #[tokio::test]
    async fn test_filter_selects_records() {
        let mut options = CacheOptions::default();
        options.user = KindOptions::new().with_sweep_filter(|u: &User| u.bot == Some(true));
        let cache = ProxyCache::memory_only(options);

        let mut bot = User::new(1);
        bot.bot = Some(true);
        cache.users().set(bot).await.expect("Failed to set user");
        cache.users().set(User::new(2)).await.expect("Failed to set user");

        assert_eq!(cache.sweep().users, 1);
        assert!(cache.users().get(1).await.expect("get failed").is_none());
        assert!(cache.users().get(2).await.expect("get failed").is_some());
    }

    #[tokio::test]
    async fn test_inactivity_cutoff_spares_current_user() {
        let mut options = CacheOptions::default();
        options.sweeper.max_inactive = Some(Duration::ZERO);
        options.current_user = Some(1);
        let cache = ProxyCache::memory_only(options);

        cache.users().set(User::new(1)).await.expect("Failed to set user");
        cache.users().set(User::new(2)).await.expect("Failed to set user");
        std::thread::sleep(Duration::from_millis(5));

        let report = cache.sweep();
        assert_eq!(report.users, 1);
        assert_eq!(cache.memory_stats().users, 1);
        let me = cache.users().get(1).await.expect("get failed");
        assert_eq!(me.map(|u| u.last_interacted_time), Some(0));
    }

    #[tokio::test]
    async fn test_no_filter_no_cutoff_is_noop() {
        let cache = ProxyCache::memory_only(CacheOptions::default());
        cache.users().set(User::new(1)).await.expect("Failed to set user");
        assert_eq!(cache.sweep().total(), 0);
    }

    #[tokio::test]
    async fn test_pending_bucket_of_missing_guild_is_swept() {
        let mut options = CacheOptions::default();
        options.sweeper.max_inactive = Some(Duration::ZERO);
        let cache = ProxyCache::memory_only(options);

        cache
            .channels()
            .set(Channel::new(10).in_guild(9))
            .await
            .expect("Failed to set channel");
        cache
            .roles()
            .set(Role::new(20).in_guild(9))
            .await
            .expect("Failed to set role");
        cache
            .members()
            .set(Member::new(9, 30))
            .await
            .expect("Failed to set member");
        assert_eq!(cache.memory_stats().pending, 3);
        std::thread::sleep(Duration::from_millis(5));

        let report = cache.sweep();
        assert_eq!(report.pending, 3);
        let stats = cache.memory_stats();
        assert_eq!(stats.pending, 0);
        assert_eq!(stats.index_entries, 0);
        assert!(cache.channels().get(10).await.expect("get failed").is_none());
    }

    #[tokio::test]
    async fn test_pending_filter_is_per_kind() {
        let mut options = CacheOptions::default();
        options.channel = KindOptions::new().with_sweep_filter(|_: &Channel| true);
        let cache = ProxyCache::memory_only(options);

        cache
            .channels()
            .set(Channel::new(10).in_guild(9))
            .await
            .expect("Failed to set channel");
        cache
            .roles()
            .set(Role::new(20).in_guild(9))
            .await
            .expect("Failed to set role");

        assert_eq!(cache.sweep().pending, 1);
        assert!(cache.channels().get(10).await.expect("get failed").is_none());
        assert!(cache.roles().get(20).await.expect("get failed").is_some());
    }
}

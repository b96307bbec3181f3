//! Core entity trait that all cached records implement.

use crate::error::Result;
use crate::key::RecordKey;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::{self, Debug, Display};
use std::hash::Hash;
use std::time::{SystemTime, UNIX_EPOCH};

/// 64-bit entity identifier.
pub type Snowflake = u64;

/// The five entity kinds the cache knows about.
///
/// The kind doubles as the external-tier table name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Guild,
    Channel,
    Role,
    Member,
    User,
}

impl EntityKind {
    /// All kinds, in cascade order (parents first).
    pub const ALL: [EntityKind; 5] = [
        EntityKind::Guild,
        EntityKind::Channel,
        EntityKind::Role,
        EntityKind::Member,
        EntityKind::User,
    ];

    /// Table name used in every external-tier call.
    pub fn table(&self) -> &'static str {
        match self {
            EntityKind::Guild => "guild",
            EntityKind::Channel => "channel",
            EntityKind::Role => "role",
            EntityKind::Member => "member",
            EntityKind::User => "user",
        }
    }

    /// Whether records of this kind live inside their guild when nesting is on.
    pub fn is_guild_scoped(&self) -> bool {
        matches!(
            self,
            EntityKind::Channel | EntityKind::Role | EntityKind::Member
        )
    }
}

impl Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table())
    }
}

/// Trait that all records stored in the cache implement.
///
/// Records are *partial*: every payload field is an `Option`, so a record can
/// say "this field was not part of the event". That is what makes the merge
/// law and the projection filter expressible with static types.
///
/// # Example
///
/// ```
/// use gateway_cache::model::User;
/// use gateway_cache::CacheEntity;
///
/// let mut cached = User::new(1).with_username("ferris");
/// let mut partial = User::new(1);
/// partial.global_name = Some("Ferris".to_string());
///
/// cached.merge(partial);
/// assert_eq!(cached.username.as_deref(), Some("ferris"));
/// assert_eq!(cached.global_name.as_deref(), Some("Ferris"));
/// ```
pub trait CacheEntity:
    Send + Sync + Serialize + for<'de> Deserialize<'de> + Clone + Debug + 'static
{
    /// Key used to address one record of this kind.
    type Key: Display + Debug + Copy + Send + Sync + Eq + Hash + 'static;

    /// Closed set of projectable fields.
    type Field: Debug + Copy + Send + Sync + Eq + Hash + 'static;

    /// Kind (and external table) of this record.
    const KIND: EntityKind;

    /// Fields that make up the record's identity; they always survive
    /// projection.
    const ID_FIELDS: &'static [Self::Field];

    /// Every field of the record, identifier included.
    const FIELDS: &'static [Self::Field];

    /// The record's own identifier, if the payload carried one.
    fn id(&self) -> Option<Snowflake>;

    /// Owning guild, for guild-scoped kinds.
    fn guild_id(&self) -> Option<Snowflake> {
        None
    }

    /// Full cache key, if the record carries enough identity to build one.
    fn cache_key(&self) -> Option<Self::Key>;

    /// External-tier key for a cache key.
    fn record_key(key: &Self::Key) -> RecordKey;

    /// Whether `field` is present on this record.
    fn has_field(&self, field: Self::Field) -> bool;

    /// Drop `field` from this record.
    fn clear_field(&mut self, field: Self::Field);

    /// Overlay `incoming` onto `self`, field by field.
    ///
    /// Fields absent from `incoming` keep their current value.
    fn merge(&mut self, incoming: Self);

    /// UNIX-millisecond timestamp of the last get or set.
    fn last_interacted_time(&self) -> u64;

    /// Refresh the last-interaction timestamp.
    fn touch(&mut self, now: u64);

    /// Return the cache prefix for this entity type.
    fn cache_prefix() -> &'static str {
        Self::KIND.table()
    }

    /// Serialize the record for a byte backend.
    ///
    /// See `crate::serialization` for the envelope format.
    fn serialize_for_cache(&self) -> Result<Vec<u8>> {
        crate::serialization::serialize_for_cache(self)
    }

    /// Deserialize a record read from a byte backend.
    fn deserialize_from_cache(bytes: &[u8]) -> Result<Self> {
        crate::serialization::deserialize_from_cache(bytes)
    }
}

/// Current UNIX time in milliseconds.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Replace `slot` when `incoming` carries a value.
pub(crate) fn overlay<T>(slot: &mut Option<T>, incoming: Option<T>) {
    if incoming.is_some() {
        *slot = incoming;
    }
}

/// Merge a nested collection entry by entry.
///
/// Entries only present on one side are kept; entries present on both sides
/// are merged with [`CacheEntity::merge`].
pub(crate) fn overlay_collection<E: CacheEntity>(
    slot: &mut Option<HashMap<Snowflake, E>>,
    incoming: Option<HashMap<Snowflake, E>>,
) {
    let Some(incoming) = incoming else {
        return;
    };

    match slot {
        Some(existing) => {
            for (id, record) in incoming {
                match existing.get_mut(&id) {
                    Some(current) => current.merge(record),
                    None => {
                        existing.insert(id, record);
                    }
                }
            }
        }
        None => *slot = Some(incoming),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Channel, User};

    #[test]
    fn test_kind_tables() {
        let tables: Vec<&str> = EntityKind::ALL.iter().map(|k| k.table()).collect();
        assert_eq!(tables, vec!["guild", "channel", "role", "member", "user"]);
        assert_eq!(EntityKind::Member.to_string(), "member");
    }

    #[test]
    fn test_guild_scoped_kinds() {
        assert!(!EntityKind::Guild.is_guild_scoped());
        assert!(EntityKind::Channel.is_guild_scoped());
        assert!(EntityKind::Role.is_guild_scoped());
        assert!(EntityKind::Member.is_guild_scoped());
        assert!(!EntityKind::User.is_guild_scoped());
    }

    #[test]
    fn test_overlay_keeps_existing_when_absent() {
        let mut slot = Some("old".to_string());
        overlay(&mut slot, None);
        assert_eq!(slot.as_deref(), Some("old"));

        overlay(&mut slot, Some("new".to_string()));
        assert_eq!(slot.as_deref(), Some("new"));
    }

    #[test]
    fn test_overlay_collection_merges_entries() {
        let mut existing = HashMap::new();
        existing.insert(1, Channel::new(1).with_name("general"));
        existing.insert(2, Channel::new(2).with_name("random"));
        let mut slot = Some(existing);

        let mut incoming = HashMap::new();
        let mut partial = Channel::new(1);
        partial.topic = Some("hello".to_string());
        incoming.insert(1, partial);
        incoming.insert(3, Channel::new(3));

        overlay_collection(&mut slot, Some(incoming));

        let merged = slot.expect("collection missing");
        assert_eq!(merged.len(), 3);
        assert_eq!(merged[&1].name.as_deref(), Some("general"));
        assert_eq!(merged[&1].topic.as_deref(), Some("hello"));
    }

    #[test]
    fn test_serialize_deserialize() {
        let user = User::new(42).with_username("ferris");

        let bytes = user.serialize_for_cache().expect("Failed to serialize");
        let decoded = User::deserialize_from_cache(&bytes).expect("Failed to deserialize");

        assert_eq!(user, decoded);
    }

    #[test]
    fn test_now_millis_is_recent() {
        // 2020-01-01 in ms
        assert!(now_millis() > 1_577_836_800_000);
    }
}

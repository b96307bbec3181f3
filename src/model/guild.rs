//! Guild record and its nested collections.

use super::{Channel, Member, Role};
use crate::entity::{overlay, overlay_collection, CacheEntity, EntityKind, Snowflake};
use crate::key::RecordKey;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

/// A guild and, when nesting is enabled, everything scoped to it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Guild {
    pub id: Option<Snowflake>,
    pub name: Option<String>,
    pub member_count: Option<u64>,
    pub owner_id: Option<Snowflake>,
    pub shard_id: Option<u32>,
    /// Icon hash.
    pub icon: Option<String>,
    pub channels: Option<HashMap<Snowflake, Channel>>,
    /// Keyed by user id.
    pub members: Option<HashMap<Snowflake, Member>>,
    pub roles: Option<HashMap<Snowflake, Role>>,
    #[serde(default)]
    pub last_interacted_time: u64,
}

/// Projectable guild fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuildField {
    Id,
    Name,
    MemberCount,
    OwnerId,
    ShardId,
    Icon,
    Channels,
    Members,
    Roles,
}

impl GuildField {
    pub fn name(&self) -> &'static str {
        match self {
            GuildField::Id => "id",
            GuildField::Name => "name",
            GuildField::MemberCount => "member_count",
            GuildField::OwnerId => "owner_id",
            GuildField::ShardId => "shard_id",
            GuildField::Icon => "icon",
            GuildField::Channels => "channels",
            GuildField::Members => "members",
            GuildField::Roles => "roles",
        }
    }
}

impl FromStr for GuildField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Guild::FIELDS
            .iter()
            .copied()
            .find(|f| f.name() == s)
            .ok_or_else(|| format!("unknown guild field: {}", s))
    }
}

impl Guild {
    pub fn new(id: Snowflake) -> Self {
        Guild {
            id: Some(id),
            ..Default::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// A copy of the scalar fields with empty nested collections.
    ///
    /// Installed in memory ahead of a guild's children so that they find
    /// their guild while the full payload is still being processed.
    pub fn shell(&self) -> Guild {
        Guild {
            id: self.id,
            name: self.name.clone(),
            member_count: self.member_count,
            owner_id: self.owner_id,
            shard_id: self.shard_id,
            icon: self.icon.clone(),
            channels: Some(HashMap::new()),
            members: Some(HashMap::new()),
            roles: Some(HashMap::new()),
            last_interacted_time: 0,
        }
    }

    pub fn insert_channel(&mut self, channel: Channel) {
        if let Some(id) = channel.id {
            self.channels
                .get_or_insert_with(HashMap::new)
                .insert(id, channel);
        }
    }

    pub fn insert_role(&mut self, role: Role) {
        if let Some(id) = role.id {
            self.roles.get_or_insert_with(HashMap::new).insert(id, role);
        }
    }

    pub fn insert_member(&mut self, member: Member) {
        if let Some(id) = member.id {
            self.members
                .get_or_insert_with(HashMap::new)
                .insert(id, member);
        }
    }

    pub fn channel(&self, id: Snowflake) -> Option<&Channel> {
        self.channels.as_ref()?.get(&id)
    }

    pub fn role(&self, id: Snowflake) -> Option<&Role> {
        self.roles.as_ref()?.get(&id)
    }

    pub fn member(&self, user_id: Snowflake) -> Option<&Member> {
        self.members.as_ref()?.get(&user_id)
    }

    /// Make sure all three nested collections exist.
    pub(crate) fn ensure_collections(&mut self) {
        self.channels.get_or_insert_with(HashMap::new);
        self.members.get_or_insert_with(HashMap::new);
        self.roles.get_or_insert_with(HashMap::new);
    }
}

impl CacheEntity for Guild {
    type Key = Snowflake;
    type Field = GuildField;

    const KIND: EntityKind = EntityKind::Guild;
    const ID_FIELDS: &'static [GuildField] = &[GuildField::Id];
    const FIELDS: &'static [GuildField] = &[
        GuildField::Id,
        GuildField::Name,
        GuildField::MemberCount,
        GuildField::OwnerId,
        GuildField::ShardId,
        GuildField::Icon,
        GuildField::Channels,
        GuildField::Members,
        GuildField::Roles,
    ];

    fn id(&self) -> Option<Snowflake> {
        self.id
    }

    fn cache_key(&self) -> Option<Snowflake> {
        self.id
    }

    fn record_key(key: &Snowflake) -> RecordKey {
        RecordKey::new(EntityKind::Guild, *key)
    }

    fn has_field(&self, field: GuildField) -> bool {
        match field {
            GuildField::Id => self.id.is_some(),
            GuildField::Name => self.name.is_some(),
            GuildField::MemberCount => self.member_count.is_some(),
            GuildField::OwnerId => self.owner_id.is_some(),
            GuildField::ShardId => self.shard_id.is_some(),
            GuildField::Icon => self.icon.is_some(),
            GuildField::Channels => self.channels.is_some(),
            GuildField::Members => self.members.is_some(),
            GuildField::Roles => self.roles.is_some(),
        }
    }

    fn clear_field(&mut self, field: GuildField) {
        match field {
            GuildField::Id => self.id = None,
            GuildField::Name => self.name = None,
            GuildField::MemberCount => self.member_count = None,
            GuildField::OwnerId => self.owner_id = None,
            GuildField::ShardId => self.shard_id = None,
            GuildField::Icon => self.icon = None,
            GuildField::Channels => self.channels = None,
            GuildField::Members => self.members = None,
            GuildField::Roles => self.roles = None,
        }
    }

    fn merge(&mut self, incoming: Guild) {
        overlay(&mut self.id, incoming.id);
        overlay(&mut self.name, incoming.name);
        overlay(&mut self.member_count, incoming.member_count);
        overlay(&mut self.owner_id, incoming.owner_id);
        overlay(&mut self.shard_id, incoming.shard_id);
        overlay(&mut self.icon, incoming.icon);
        overlay_collection(&mut self.channels, incoming.channels);
        overlay_collection(&mut self.members, incoming.members);
        overlay_collection(&mut self.roles, incoming.roles);
    }

    fn last_interacted_time(&self) -> u64 {
        self.last_interacted_time
    }

    fn touch(&mut self, now: u64) {
        self.last_interacted_time = now;
    }
}

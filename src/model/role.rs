//! Role record.

use crate::entity::{overlay, CacheEntity, EntityKind, Snowflake};
use crate::key::RecordKey;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Role {
    pub id: Option<Snowflake>,
    pub guild_id: Option<Snowflake>,
    pub name: Option<String>,
    pub color: Option<u32>,
    pub position: Option<i32>,
    /// Permission bitset, opaque to the cache.
    pub permissions: Option<u64>,
    #[serde(default)]
    pub last_interacted_time: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleField {
    Id,
    GuildId,
    Name,
    Color,
    Position,
    Permissions,
}

impl RoleField {
    pub fn name(&self) -> &'static str {
        match self {
            RoleField::Id => "id",
            RoleField::GuildId => "guild_id",
            RoleField::Name => "name",
            RoleField::Color => "color",
            RoleField::Position => "position",
            RoleField::Permissions => "permissions",
        }
    }
}

impl FromStr for RoleField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::FIELDS
            .iter()
            .copied()
            .find(|f| f.name() == s)
            .ok_or_else(|| format!("unknown role field: {}", s))
    }
}

impl Role {
    pub fn new(id: Snowflake) -> Self {
        Role {
            id: Some(id),
            ..Default::default()
        }
    }

    pub fn in_guild(mut self, guild_id: Snowflake) -> Self {
        self.guild_id = Some(guild_id);
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

impl CacheEntity for Role {
    type Key = Snowflake;
    type Field = RoleField;

    const KIND: EntityKind = EntityKind::Role;
    const ID_FIELDS: &'static [RoleField] = &[RoleField::Id];
    const FIELDS: &'static [RoleField] = &[
        RoleField::Id,
        RoleField::GuildId,
        RoleField::Name,
        RoleField::Color,
        RoleField::Position,
        RoleField::Permissions,
    ];

    fn id(&self) -> Option<Snowflake> {
        self.id
    }

    fn guild_id(&self) -> Option<Snowflake> {
        self.guild_id
    }

    fn cache_key(&self) -> Option<Snowflake> {
        self.id
    }

    fn record_key(key: &Snowflake) -> RecordKey {
        RecordKey::new(EntityKind::Role, *key)
    }

    fn has_field(&self, field: RoleField) -> bool {
        match field {
            RoleField::Id => self.id.is_some(),
            RoleField::GuildId => self.guild_id.is_some(),
            RoleField::Name => self.name.is_some(),
            RoleField::Color => self.color.is_some(),
            RoleField::Position => self.position.is_some(),
            RoleField::Permissions => self.permissions.is_some(),
        }
    }

    fn clear_field(&mut self, field: RoleField) {
        match field {
            RoleField::Id => self.id = None,
            RoleField::GuildId => self.guild_id = None,
            RoleField::Name => self.name = None,
            RoleField::Color => self.color = None,
            RoleField::Position => self.position = None,
            RoleField::Permissions => self.permissions = None,
        }
    }

    fn merge(&mut self, incoming: Role) {
        overlay(&mut self.id, incoming.id);
        overlay(&mut self.guild_id, incoming.guild_id);
        overlay(&mut self.name, incoming.name);
        overlay(&mut self.color, incoming.color);
        overlay(&mut self.position, incoming.position);
        overlay(&mut self.permissions, incoming.permissions);
    }

    fn last_interacted_time(&self) -> u64 {
        self.last_interacted_time
    }

    fn touch(&mut self, now: u64) {
        self.last_interacted_time = now;
    }
}

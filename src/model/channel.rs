//! Channel record (guild channels, threads and DM channels).

use crate::entity::{overlay, CacheEntity, EntityKind, Snowflake};
use crate::key::RecordKey;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    pub id: Option<Snowflake>,
    /// Absent for direct-message channels.
    pub guild_id: Option<Snowflake>,
    /// Parent channel of a thread.
    pub parent_id: Option<Snowflake>,
    pub name: Option<String>,
    /// Wire channel type.
    pub kind: Option<u8>,
    pub position: Option<i32>,
    pub topic: Option<String>,
    pub nsfw: Option<bool>,
    #[serde(default)]
    pub last_interacted_time: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelField {
    Id,
    GuildId,
    ParentId,
    Name,
    Kind,
    Position,
    Topic,
    Nsfw,
}

impl ChannelField {
    pub fn name(&self) -> &'static str {
        match self {
            ChannelField::Id => "id",
            ChannelField::GuildId => "guild_id",
            ChannelField::ParentId => "parent_id",
            ChannelField::Name => "name",
            ChannelField::Kind => "kind",
            ChannelField::Position => "position",
            ChannelField::Topic => "topic",
            ChannelField::Nsfw => "nsfw",
        }
    }
}

impl FromStr for ChannelField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Channel::FIELDS
            .iter()
            .copied()
            .find(|f| f.name() == s)
            .ok_or_else(|| format!("unknown channel field: {}", s))
    }
}

impl Channel {
    pub fn new(id: Snowflake) -> Self {
        Channel {
            id: Some(id),
            ..Default::default()
        }
    }

    pub fn in_guild(mut self, guild_id: Snowflake) -> Self {
        self.guild_id = Some(guild_id);
        self
    }

    pub fn with_parent(mut self, parent_id: Snowflake) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

impl CacheEntity for Channel {
    type Key = Snowflake;
    type Field = ChannelField;

    const KIND: EntityKind = EntityKind::Channel;
    const ID_FIELDS: &'static [ChannelField] = &[ChannelField::Id];
    const FIELDS: &'static [ChannelField] = &[
        ChannelField::Id,
        ChannelField::GuildId,
        ChannelField::ParentId,
        ChannelField::Name,
        ChannelField::Kind,
        ChannelField::Position,
        ChannelField::Topic,
        ChannelField::Nsfw,
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
        RecordKey::new(EntityKind::Channel, *key)
    }

    fn has_field(&self, field: ChannelField) -> bool {
        match field {
            ChannelField::Id => self.id.is_some(),
            ChannelField::GuildId => self.guild_id.is_some(),
            ChannelField::ParentId => self.parent_id.is_some(),
            ChannelField::Name => self.name.is_some(),
            ChannelField::Kind => self.kind.is_some(),
            ChannelField::Position => self.position.is_some(),
            ChannelField::Topic => self.topic.is_some(),
            ChannelField::Nsfw => self.nsfw.is_some(),
        }
    }

    fn clear_field(&mut self, field: ChannelField) {
        match field {
            ChannelField::Id => self.id = None,
            ChannelField::GuildId => self.guild_id = None,
            ChannelField::ParentId => self.parent_id = None,
            ChannelField::Name => self.name = None,
            ChannelField::Kind => self.kind = None,
            ChannelField::Position => self.position = None,
            ChannelField::Topic => self.topic = None,
            ChannelField::Nsfw => self.nsfw = None,
        }
    }

    fn merge(&mut self, incoming: Channel) {
        overlay(&mut self.id, incoming.id);
        overlay(&mut self.guild_id, incoming.guild_id);
        overlay(&mut self.parent_id, incoming.parent_id);
        overlay(&mut self.name, incoming.name);
        overlay(&mut self.kind, incoming.kind);
        overlay(&mut self.position, incoming.position);
        overlay(&mut self.topic, incoming.topic);
        overlay(&mut self.nsfw, incoming.nsfw);
    }

    fn last_interacted_time(&self) -> u64 {
        self.last_interacted_time
    }

    fn touch(&mut self, now: u64) {
        self.last_interacted_time = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_helpers() {
        let thread = Channel::new(9).in_guild(1).with_parent(3).with_name("help");
        assert_eq!(thread.guild_id(), Some(1));
        assert_eq!(thread.parent_id, Some(3));
        assert_eq!(thread.cache_key(), Some(9));
    }

    #[test]
    fn test_merge_overlays_present_fields() {
        let mut cached = Channel::new(9).in_guild(1).with_name("help");
        cached.position = Some(4);

        let mut edit = Channel::new(9);
        edit.name = Some("support".to_string());
        cached.merge(edit);

        assert_eq!(cached.name.as_deref(), Some("support"));
        assert_eq!(cached.position, Some(4));
        assert_eq!(cached.guild_id, Some(1));
    }
}

//! Guild member record.

use crate::entity::{overlay, CacheEntity, EntityKind, Snowflake};
use crate::key::{MemberKey, RecordKey};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// A user's membership in one guild.
///
/// `id` is the user id; the record is only meaningful together with
/// `guild_id`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Member {
    pub id: Option<Snowflake>,
    pub guild_id: Option<Snowflake>,
    pub nick: Option<String>,
    pub roles: Option<Vec<Snowflake>>,
    /// UNIX ms.
    pub joined_at: Option<u64>,
    pub avatar: Option<String>,
    pub deaf: Option<bool>,
    pub mute: Option<bool>,
    #[serde(default)]
    pub last_interacted_time: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberField {
    Id,
    GuildId,
    Nick,
    Roles,
    JoinedAt,
    Avatar,
    Deaf,
    Mute,
}

impl MemberField {
    pub fn name(&self) -> &'static str {
        match self {
            MemberField::Id => "id",
            MemberField::GuildId => "guild_id",
            MemberField::Nick => "nick",
            MemberField::Roles => "roles",
            MemberField::JoinedAt => "joined_at",
            MemberField::Avatar => "avatar",
            MemberField::Deaf => "deaf",
            MemberField::Mute => "mute",
        }
    }
}

impl FromStr for MemberField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Member::FIELDS
            .iter()
            .copied()
            .find(|f| f.name() == s)
            .ok_or_else(|| format!("unknown member field: {}", s))
    }
}

impl Member {
    pub fn new(guild_id: Snowflake, user_id: Snowflake) -> Self {
        Member {
            id: Some(user_id),
            guild_id: Some(guild_id),
            ..Default::default()
        }
    }

    pub fn with_roles(mut self, roles: Vec<Snowflake>) -> Self {
        self.roles = Some(roles);
        self
    }

    pub fn with_nick(mut self, nick: impl Into<String>) -> Self {
        self.nick = Some(nick.into());
        self
    }

    /// Whether the member holds `role_id`.
    pub fn has_role(&self, role_id: Snowflake) -> bool {
        self.roles
            .as_ref()
            .is_some_and(|roles| roles.contains(&role_id))
    }

    /// Remove `role_id` from the role list. Returns whether it was held.
    pub fn strip_role(&mut self, role_id: Snowflake) -> bool {
        match self.roles.as_mut() {
            Some(roles) => {
                let before = roles.len();
                roles.retain(|r| *r != role_id);
                roles.len() != before
            }
            None => false,
        }
    }
}

impl CacheEntity for Member {
    type Key = MemberKey;
    type Field = MemberField;

    const KIND: EntityKind = EntityKind::Member;
    const ID_FIELDS: &'static [MemberField] = &[MemberField::Id, MemberField::GuildId];
    const FIELDS: &'static [MemberField] = &[
        MemberField::Id,
        MemberField::GuildId,
        MemberField::Nick,
        MemberField::Roles,
        MemberField::JoinedAt,
        MemberField::Avatar,
        MemberField::Deaf,
        MemberField::Mute,
    ];

    fn id(&self) -> Option<Snowflake> {
        self.id
    }

    fn guild_id(&self) -> Option<Snowflake> {
        self.guild_id
    }

    fn cache_key(&self) -> Option<MemberKey> {
        Some(MemberKey::new(self.guild_id?, self.id?))
    }

    fn record_key(key: &MemberKey) -> RecordKey {
        RecordKey::member(*key)
    }

    fn has_field(&self, field: MemberField) -> bool {
        match field {
            MemberField::Id => self.id.is_some(),
            MemberField::GuildId => self.guild_id.is_some(),
            MemberField::Nick => self.nick.is_some(),
            MemberField::Roles => self.roles.is_some(),
            MemberField::JoinedAt => self.joined_at.is_some(),
            MemberField::Avatar => self.avatar.is_some(),
            MemberField::Deaf => self.deaf.is_some(),
            MemberField::Mute => self.mute.is_some(),
        }
    }

    fn clear_field(&mut self, field: MemberField) {
        match field {
            MemberField::Id => self.id = None,
            MemberField::GuildId => self.guild_id = None,
            MemberField::Nick => self.nick = None,
            MemberField::Roles => self.roles = None,
            MemberField::JoinedAt => self.joined_at = None,
            MemberField::Avatar => self.avatar = None,
            MemberField::Deaf => self.deaf = None,
            MemberField::Mute => self.mute = None,
        }
    }

    fn merge(&mut self, incoming: Member) {
        overlay(&mut self.id, incoming.id);
        overlay(&mut self.guild_id, incoming.guild_id);
        overlay(&mut self.nick, incoming.nick);
        overlay(&mut self.roles, incoming.roles);
        overlay(&mut self.joined_at, incoming.joined_at);
        overlay(&mut self.avatar, incoming.avatar);
        overlay(&mut self.deaf, incoming.deaf);
        overlay(&mut self.mute, incoming.mute);
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
    fn test_compound_key_requires_guild() {
        assert_eq!(Member::new(1, 2).cache_key(), Some(MemberKey::new(1, 2)));

        let mut orphan = Member::new(1, 2);
        orphan.guild_id = None;
        assert_eq!(orphan.cache_key(), None);
    }

    #[test]
    fn test_strip_role() {
        let mut member = Member::new(1, 2).with_roles(vec![10, 20, 10]);
        assert!(member.strip_role(10));
        assert_eq!(member.roles, Some(vec![20]));
        assert!(!member.strip_role(10));
        assert!(!member.has_role(10));
        assert!(member.has_role(20));
    }
}

//! User record.

use crate::entity::{overlay, CacheEntity, EntityKind, Snowflake};
use crate::key::RecordKey;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Option<Snowflake>,
    pub username: Option<String>,
    pub discriminator: Option<String>,
    pub global_name: Option<String>,
    pub avatar: Option<String>,
    pub bot: Option<bool>,
    #[serde(default)]
    pub last_interacted_time: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserField {
    Id,
    Username,
    Discriminator,
    GlobalName,
    Avatar,
    Bot,
}

impl UserField {
    pub fn name(&self) -> &'static str {
        match self {
            UserField::Id => "id",
            UserField::Username => "username",
            UserField::Discriminator => "discriminator",
            UserField::GlobalName => "global_name",
            UserField::Avatar => "avatar",
            UserField::Bot => "bot",
        }
    }
}

impl FromStr for UserField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        User::FIELDS
            .iter()
            .copied()
            .find(|f| f.name() == s)
            .ok_or_else(|| format!("unknown user field: {}", s))
    }
}

impl User {
    pub fn new(id: Snowflake) -> Self {
        User {
            id: Some(id),
            ..Default::default()
        }
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }
}

impl CacheEntity for User {
    type Key = Snowflake;
    type Field = UserField;

    const KIND: EntityKind = EntityKind::User;
    const ID_FIELDS: &'static [UserField] = &[UserField::Id];
    const FIELDS: &'static [UserField] = &[
        UserField::Id,
        UserField::Username,
        UserField::Discriminator,
        UserField::GlobalName,
        UserField::Avatar,
        UserField::Bot,
    ];

    fn id(&self) -> Option<Snowflake> {
        self.id
    }

    fn cache_key(&self) -> Option<Snowflake> {
        self.id
    }

    fn record_key(key: &Snowflake) -> RecordKey {
        RecordKey::new(EntityKind::User, *key)
    }

    fn has_field(&self, field: UserField) -> bool {
        match field {
            UserField::Id => self.id.is_some(),
            UserField::Username => self.username.is_some(),
            UserField::Discriminator => self.discriminator.is_some(),
            UserField::GlobalName => self.global_name.is_some(),
            UserField::Avatar => self.avatar.is_some(),
            UserField::Bot => self.bot.is_some(),
        }
    }

    fn clear_field(&mut self, field: UserField) {
        match field {
            UserField::Id => self.id = None,
            UserField::Username => self.username = None,
            UserField::Discriminator => self.discriminator = None,
            UserField::GlobalName => self.global_name = None,
            UserField::Avatar => self.avatar = None,
            UserField::Bot => self.bot = None,
        }
    }

    fn merge(&mut self, incoming: User) {
        overlay(&mut self.id, incoming.id);
        overlay(&mut self.username, incoming.username);
        overlay(&mut self.discriminator, incoming.discriminator);
        overlay(&mut self.global_name, incoming.global_name);
        overlay(&mut self.avatar, incoming.avatar);
        overlay(&mut self.bot, incoming.bot);
    }

    fn last_interacted_time(&self) -> u64 {
        self.last_interacted_time
    }

    fn touch(&mut self, now: u64) {
        self.last_interacted_time = now;
    }
}

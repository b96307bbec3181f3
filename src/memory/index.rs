//! Reverse index from nested child ids to their owning guild.

use crate::entity::Snowflake;
use std::collections::HashMap;

/// Non-owning lookup aid: channel id or role id to guild id.
///
/// Members need no entry since their key already carries the guild.
#[derive(Debug, Default)]
pub struct GuildIndex {
    channels: HashMap<Snowflake, Snowflake>,
    roles: HashMap<Snowflake, Snowflake>,
}

impl GuildIndex {
    pub fn insert_channel(&mut self, channel_id: Snowflake, guild_id: Snowflake) {
        self.channels.insert(channel_id, guild_id);
    }

    pub fn insert_role(&mut self, role_id: Snowflake, guild_id: Snowflake) {
        self.roles.insert(role_id, guild_id);
    }

    pub fn channel_guild(&self, channel_id: Snowflake) -> Option<Snowflake> {
        self.channels.get(&channel_id).copied()
    }

    pub fn role_guild(&self, role_id: Snowflake) -> Option<Snowflake> {
        self.roles.get(&role_id).copied()
    }

    pub fn remove_channel(&mut self, channel_id: Snowflake) -> Option<Snowflake> {
        self.channels.remove(&channel_id)
    }

    pub fn remove_role(&mut self, role_id: Snowflake) -> Option<Snowflake> {
        self.roles.remove(&role_id)
    }

    /// Drop every entry pointing at `guild_id`. Returns how many were removed.
    pub fn prune_guild(&mut self, guild_id: Snowflake) -> usize {
        let before = self.len();
        self.channels.retain(|_, g| *g != guild_id);
        self.roles.retain(|_, g| *g != guild_id);
        before - self.len()
    }

    pub fn len(&self) -> usize {
        self.channels.len() + self.roles.len()
    }

    /// Every guild id referenced by the index.
    pub fn guilds(&self) -> impl Iterator<Item = Snowflake> + '_ {
        self.channels.values().chain(self.roles.values()).copied()
    }
}

//! Record keys for the external tier.

use crate::entity::{EntityKind, Snowflake};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Compound identity of a guild member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MemberKey {
    pub guild_id: Snowflake,
    pub user_id: Snowflake,
}

impl MemberKey {
    pub fn new(guild_id: Snowflake, user_id: Snowflake) -> Self {
        MemberKey { guild_id, user_id }
    }
}

impl fmt::Display for MemberKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.guild_id, self.user_id)
    }
}

/// Address of one record in the external tier.
///
/// `guild_id` is only set for members, whose identity is compound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordKey {
    pub kind: EntityKind,
    pub id: Snowflake,
    pub guild_id: Option<Snowflake>,
}

impl RecordKey {
    /// Key for a record with a single id.
    pub fn new(kind: EntityKind, id: Snowflake) -> Self {
        RecordKey {
            kind,
            id,
            guild_id: None,
        }
    }

    /// Key for a guild member.
    pub fn member(key: MemberKey) -> Self {
        RecordKey {
            kind: EntityKind::Member,
            id: key.user_id,
            guild_id: Some(key.guild_id),
        }
    }

    /// Table name this key lives in.
    pub fn table(&self) -> &'static str {
        self.kind.table()
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.guild_id {
            Some(guild_id) => write!(f, "{}:{}:{}", self.table(), guild_id, self.id),
            None => write!(f, "{}:{}", self.table(), self.id),
        }
    }
}

/// Builds flat string keys for byte backends.
///
/// Format: `"{namespace}:{table}:{id}"` or `"{namespace}:member:{guild}:{id}"`.
#[derive(Debug, Clone)]
pub struct CacheKeyBuilder {
    namespace: Option<String>,
}

impl CacheKeyBuilder {
    pub fn new() -> Self {
        CacheKeyBuilder { namespace: None }
    }

    /// Prefix every key with `namespace` (e.g. one namespace per bot).
    pub fn with_namespace(namespace: impl Into<String>) -> Self {
        CacheKeyBuilder {
            namespace: Some(namespace.into()),
        }
    }

    pub fn build(&self, key: &RecordKey) -> String {
        match &self.namespace {
            Some(ns) => format!("{}:{}", ns, key),
            None => key.to_string(),
        }
    }
}

impl Default for CacheKeyBuilder {
    fn default() -> Self {
        Self::new()
    }
}

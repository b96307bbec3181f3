//! Field projection: the desired/undesired property filter.

use crate::entity::CacheEntity;
use std::collections::HashSet;
use std::fmt::Debug;
use std::hash::Hash;

/// Field filter applied to a record before it is cached.
///
/// - Identity fields always survive (a member's guild id included).
/// - When `desired` is non-empty, only desired fields survive, even if they
///   are also listed as undesired.
/// - Otherwise every field not listed in `undesired` survives.
///
/// # Example
///
/// ```
/// use gateway_cache::model::{User, UserField};
/// use gateway_cache::Projection;
///
/// let projection = Projection::new().with_undesired([UserField::Avatar]);
///
/// let mut user = User::new(1).with_username("ferris");
/// user.avatar = Some("abc".to_string());
///
/// let projected = projection.apply(user);
/// assert_eq!(projected.username.as_deref(), Some("ferris"));
/// assert!(projected.avatar.is_none());
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Projection<F: Eq + Hash> {
    desired: HashSet<F>,
    undesired: HashSet<F>,
}

impl<F: Eq + Hash> Default for Projection<F> {
    fn default() -> Self {
        Projection {
            desired: HashSet::new(),
            undesired: HashSet::new(),
        }
    }
}

impl<F: Copy + Eq + Hash + Debug> Projection<F> {
    /// A projection that keeps every field.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_desired(mut self, fields: impl IntoIterator<Item = F>) -> Self {
        self.desired.extend(fields);
        self
    }

    pub fn with_undesired(mut self, fields: impl IntoIterator<Item = F>) -> Self {
        self.undesired.extend(fields);
        self
    }

    pub fn desired(&self) -> &HashSet<F> {
        &self.desired
    }

    pub fn undesired(&self) -> &HashSet<F> {
        &self.undesired
    }

    /// True when the projection keeps every field.
    pub fn is_identity(&self) -> bool {
        self.desired.is_empty() && self.undesired.is_empty()
    }

    /// Whether `field` survives, given the kind's identity fields.
    pub fn keeps(&self, field: F, id_fields: &[F]) -> bool {
        if id_fields.contains(&field) {
            return true;
        }
        if !self.desired.is_empty() {
            return self.desired.contains(&field);
        }
        !self.undesired.contains(&field)
    }

    /// Project `record`.
    ///
    /// Records without an identifier are returned unchanged; the store
    /// refuses them later.
    pub fn apply<E>(&self, mut record: E) -> E
    where
        E: CacheEntity<Field = F>,
    {
        if self.is_identity() || record.id().is_none() {
            return record;
        }

        for field in E::FIELDS {
            if !self.keeps(*field, E::ID_FIELDS) {
                record.clear_field(*field);
            }
        }
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Channel, ChannelField, Member, MemberField, User, UserField};
    use proptest::prelude::*;

    fn full_user() -> User {
        User {
            id: Some(7),
            username: Some("ferris".to_string()),
            discriminator: Some("0001".to_string()),
            global_name: Some("Ferris".to_string()),
            avatar: Some("hash".to_string()),
            bot: Some(false),
            last_interacted_time: 0,
        }
    }

    #[test]
    fn test_identity_projection_keeps_everything() {
        let projection = Projection::<UserField>::new();
        assert!(projection.is_identity());
        assert_eq!(projection.apply(full_user()), full_user());
    }

    #[test]
    fn test_desired_wins_over_undesired() {
        let projection = Projection::new()
            .with_desired([UserField::Username, UserField::Avatar])
            .with_undesired([UserField::Avatar]);

        let projected = projection.apply(full_user());
        assert_eq!(projected.id, Some(7));
        assert!(projected.username.is_some());
        assert!(projected.avatar.is_some());
        assert!(projected.global_name.is_none());
        assert!(projected.bot.is_none());
    }

    #[test]
    fn test_undesired_only() {
        let projection = Projection::new().with_undesired([ChannelField::Topic]);

        let mut channel = Channel::new(3).in_guild(1).with_name("general");
        channel.topic = Some("hi".to_string());

        let projected = projection.apply(channel);
        assert_eq!(projected.name.as_deref(), Some("general"));
        assert_eq!(projected.guild_id, Some(1));
        assert!(projected.topic.is_none());
    }

    #[test]
    fn test_identifier_always_survives() {
        let projection = Projection::new()
            .with_desired([UserField::Bot])
            .with_undesired([UserField::Id]);

        let projected = projection.apply(full_user());
        assert_eq!(projected.id, Some(7));
        assert_eq!(projected.bot, Some(false));
    }

    #[test]
    fn test_member_keeps_guild_id() {
        let desired = Projection::new().with_desired([MemberField::Nick]);
        let undesired = Projection::new().with_undesired([MemberField::GuildId, MemberField::Roles]);

        let member = Member::new(1, 30).with_nick("crab").with_roles(vec![5]);
        let projected = desired.apply(member.clone());
        assert_eq!(projected.guild_id, Some(1));
        assert_eq!(projected.nick.as_deref(), Some("crab"));
        assert!(projected.roles.is_none());

        let projected = undesired.apply(member);
        assert_eq!(projected.guild_id, Some(1));
        assert!(projected.roles.is_none());
    }

    #[test]
    fn test_record_without_identifier_passes_through() {
        let projection = Projection::new().with_undesired([UserField::Username]);
        let mut user = full_user();
        user.id = None;

        let projected = projection.apply(user.clone());
        assert_eq!(projected, user);
    }

    fn arb_field() -> impl Strategy<Value = UserField> {
        prop::sample::select(User::FIELDS.to_vec())
    }

    fn arb_user() -> impl Strategy<Value = User> {
        (
            prop::option::of(any::<u64>()),
            prop::option::of("[a-z]{1,8}"),
            prop::option::of("[0-9]{4}"),
            prop::option::of("[A-Za-z]{1,8}"),
            prop::option::of("[a-f0-9]{6}"),
            prop::option::of(any::<bool>()),
        )
            .prop_map(
                |(id, username, discriminator, global_name, avatar, bot)| User {
                    id,
                    username,
                    discriminator,
                    global_name,
                    avatar,
                    bot,
                    last_interacted_time: 0,
                },
            )
    }

    proptest! {
        #[test]
        fn prop_projection_is_idempotent(
            user in arb_user(),
            desired in prop::collection::vec(arb_field(), 0..4),
            undesired in prop::collection::vec(arb_field(), 0..4),
        ) {
            let projection = Projection::new()
                .with_desired(desired)
                .with_undesired(undesired);

            let once = projection.apply(user);
            let twice = projection.apply(once.clone());
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn prop_projection_never_adds_fields(
            user in arb_user(),
            undesired in prop::collection::vec(arb_field(), 0..6),
        ) {
            let projection = Projection::new().with_undesired(undesired);
            let projected = projection.apply(user.clone());

            for field in User::FIELDS {
                if projected.has_field(*field) {
                    prop_assert!(user.has_field(*field));
                }
            }
        }
    }
}

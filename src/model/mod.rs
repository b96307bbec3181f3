//! Cached entity records.
//!
//! Every payload field is optional so that partial update events can be
//! merged over what is already cached.

mod channel;
mod guild;
mod member;
mod role;
mod user;

pub use channel::{Channel, ChannelField};
pub use guild::{Guild, GuildField};
pub use member::{Member, MemberField};
pub use role::{Role, RoleField};
pub use user::{User, UserField};

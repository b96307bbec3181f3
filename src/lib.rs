//! # gateway-cache
//!
//! A write-through, multi-tier entity cache for real-time guild event streams.
//!
//! ## Features
//!
//! - **Two tiers:** an in-process memory tier and any external store behind [`ExternalStorage`]
//! - **Guild nesting:** channels, roles and members live inside their guild, found through a reverse index
//! - **Out-of-order safe:** children that arrive before their guild wait in a pending buffer
//! - **Partial updates:** `set` merges field by field; `set_with(.., true)` replaces
//! - **Cascading deletes:** deleting a guild, role or channel cleans up what depended on it
//! - **Projection:** per-kind desired/undesired field lists
//! - **Sweeper:** periodic predicate or inactivity based eviction
//!
//! ## Quick Start
//!
//! ```
//! use gateway_cache::model::{Channel, Guild};
//! use gateway_cache::{CacheBuilder, SetOutcome};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> gateway_cache::Result<()> {
//! let cache = CacheBuilder::new().build();
//!
//! // A channel that arrives before its guild is buffered...
//! let outcome = cache.channels().set(Channel::new(10).in_guild(1)).await?;
//! assert_eq!(outcome, SetOutcome::Buffered);
//!
//! // ...and nested as soon as the guild is cached.
//! cache.guilds().set(Guild::new(1).with_name("rustaceans")).await?;
//! let guild = cache.guilds().get(1).await?.expect("guild cached");
//! assert!(guild.channel(10).is_some());
//! # Ok(())
//! # }
//! ```

#[macro_use]
extern crate log;

pub mod backend;
pub mod builder;
pub mod bulk;
pub mod cache;
pub mod config;
pub mod entity;
pub mod error;
pub mod intercept;
pub mod key;
pub mod model;
pub mod projection;
pub mod residence;
pub mod serialization;
pub mod storage;
pub mod store;
pub mod sweeper;

mod memory;

// Re-exports for convenience
pub use backend::CacheBackend;
pub use builder::CacheBuilder;
pub use cache::{MemoryStats, ProxyCache};
pub use config::{CacheOptions, KindOptions};
pub use entity::{CacheEntity, EntityKind, Snowflake};
pub use error::{Error, Result};
pub use intercept::{Deletion, Entity, Interceptor, InterceptorChain};
pub use key::{MemberKey, RecordKey};
pub use projection::Projection;
pub use storage::{BackendStorage, ExternalStorage, NoStorage};
pub use store::{EntityStore, SetOutcome, Skip};
pub use sweeper::SweepReport;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

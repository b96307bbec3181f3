//! Feeding a small event stream through the cache.

use gateway_cache::backend::InMemoryBackend;
use gateway_cache::config::KindOptions;
use gateway_cache::intercept::{Deletion, Entity, InterceptorChain};
use gateway_cache::model::{Channel, Guild, GuildField, Member, Role, User};
use gateway_cache::storage::BackendStorage;
use gateway_cache::{CacheBuilder, MemberKey, Projection, Result};

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Debug)
        .try_init()
        .ok();

    println!("\n=== Gateway Cache - Basic Usage ===\n");

    // 1. Users also go to the external tier; guild icons are never kept.
    let backend = InMemoryBackend::new();
    let cache = CacheBuilder::new()
        .with_storage(BackendStorage::new(backend.clone()).with_namespace("demo"))
        .with_guild(
            KindOptions::new().with_projection(Projection::new().with_undesired([GuildField::Icon])),
        )
        .with_user(KindOptions::new().with_outside_memory(true))
        .with_current_user(1)
        .build();
    let chain = InterceptorChain::new(cache.clone());

    // 2. A channel event overtakes its guild.
    println!("1. Channel arrives before its guild...");
    chain
        .decoded(Entity::Channel(Channel::new(10).in_guild(100).with_name("general")))
        .await?;
    println!("    → pending records: {}", cache.memory_stats().pending);

    // 3. The guild arrives and adopts it.
    println!("2. Guild arrives...");
    let mut guild = Guild::new(100).with_name("rustaceans");
    guild.icon = Some("a1b2c3".to_string());
    guild.member_count = Some(1);
    guild.insert_role(Role::new(200).with_name("mods"));
    guild.insert_member(Member::new(100, 1).with_roles(vec![200]));
    chain.decoded(Entity::Guild(guild)).await?;
    chain.decoded(Entity::User(User::new(1).with_username("bot"))).await?;

    if let Some(guild) = cache.guilds().get(100).await? {
        println!(
            "    → {:?} with {} channels, icon kept: {}",
            guild.name,
            guild.channels.as_ref().map_or(0, |c| c.len()),
            guild.icon.is_some()
        );
    }
    println!("    → external keys: {}", backend.len());

    // 4. Role deletion cascades into members.
    println!("3. Deleting role 200...");
    chain
        .deleted(Deletion::Role {
            id: 200,
            guild_id: 100,
        })
        .await?;
    if let Some(member) = cache.members().get(MemberKey::new(100, 1)).await? {
        println!("    → member roles: {:?}", member.roles);
    }

    // 5. Stats.
    println!("4. Memory: {:?}", cache.memory_stats());
    println!("\n=== Done ===\n");
    Ok(())
}

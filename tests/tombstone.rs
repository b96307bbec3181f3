use gateway_cache::intercept::{Deletion, Entity, InterceptorChain};
use gateway_cache::model::{Channel, Guild};
use gateway_cache::{CacheBuilder, ProxyCache};
use std::time::Duration;

async fn cache_with_channel() -> ProxyCache {
    let cache = CacheBuilder::new()
        .with_deletion_delay(Duration::from_secs(5))
        .build();
    let mut guild = Guild::new(1);
    guild.insert_channel(Channel::new(10).with_name("general"));
    cache.guilds().set(guild).await.expect("Failed to set guild");
    cache
}

#[tokio::test(start_paused = true)]
async fn test_readd_during_window_survives_delayed_pass() {
    let cache = cache_with_channel().await;
    let chain = InterceptorChain::new(cache.clone());

    chain
        .deleted(Deletion::Channel(10))
        .await
        .expect("Failed to delete channel");
    assert!(cache.channels().get(10).await.expect("get failed").is_none());
    assert_eq!(cache.memory_stats().tombstones, 1);

    tokio::time::sleep(Duration::from_secs(1)).await;
    chain
        .decoded(Entity::Channel(Channel::new(10).in_guild(1).with_name("again")))
        .await
        .expect("Failed to decode channel");

    tokio::time::sleep(Duration::from_secs(5)).await;
    tokio::task::yield_now().await;

    let channel = cache
        .channels()
        .get(10)
        .await
        .expect("get failed")
        .expect("re-added channel was destroyed");
    assert_eq!(channel.name.as_deref(), Some("again"));
    assert_eq!(cache.memory_stats().tombstones, 0);
}

#[tokio::test(start_paused = true)]
async fn test_delayed_pass_evicts_copy_that_reappeared_without_set() {
    let cache = cache_with_channel().await;

    cache
        .channels()
        .delete_debounced(10)
        .await
        .expect("Failed to delete channel");

    // A racing guild update still carries the old channel.
    let mut stale = Guild::new(1);
    stale.insert_channel(Channel::new(10).with_name("general"));
    cache.guilds().set(stale).await.expect("Failed to set guild");
    assert!(cache.channels().get(10).await.expect("get failed").is_some());

    tokio::time::sleep(Duration::from_secs(6)).await;
    tokio::task::yield_now().await;

    assert!(cache.channels().get(10).await.expect("get failed").is_none());
    let stats = cache.memory_stats();
    assert_eq!(stats.tombstones, 0);
    assert_eq!(stats.index_entries, 0);
}

#[tokio::test(start_paused = true)]
async fn test_repeated_delete_extends_window() {
    let cache = cache_with_channel().await;

    cache
        .channels()
        .delete_debounced(10)
        .await
        .expect("Failed to delete channel");
    tokio::time::sleep(Duration::from_secs(3)).await;
    cache
        .channels()
        .delete_debounced(10)
        .await
        .expect("Failed to delete channel");

    // The first window closes without touching the newer tombstone.
    tokio::time::sleep(Duration::from_secs(3)).await;
    tokio::task::yield_now().await;
    assert_eq!(cache.memory_stats().tombstones, 1);

    tokio::time::sleep(Duration::from_secs(3)).await;
    tokio::task::yield_now().await;
    assert_eq!(cache.memory_stats().tombstones, 0);
}

#[tokio::test(start_paused = true)]
async fn test_thread_deletion_is_debounced_too() {
    let cache = cache_with_channel().await;
    cache
        .channels()
        .set(Channel::new(11).in_guild(1).with_parent(10))
        .await
        .expect("Failed to set thread");
    let chain = InterceptorChain::new(cache.clone());

    chain
        .deleted(Deletion::Thread(11))
        .await
        .expect("Failed to delete thread");
    assert!(cache.channels().get(11).await.expect("get failed").is_none());
    assert!(cache.channels().get(10).await.expect("get failed").is_some());
    assert_eq!(cache.memory_stats().tombstones, 1);
}

//! Two-tier dispatcher with invalidation and a generation bump.
//!
//! The second tier is Redis when `REDIS_URL` is set, otherwise a Moka cache
//! standing in for it. Both tiers are type-agnostic: the same dispatcher caches
//! users and API keys.

use multilevel_cache::{
    CacheDispatcher, CacheTier, InvalidationRules, MemoryTier, MemoryTierConfig, MokaTier,
    MokaTierConfig, RedisTier, RedisTierConfig, TierDescriptor, describe,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone, Debug, Serialize, Deserialize)]
struct User {
    id: String,
    name: String,
    email: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct ApiKey {
    key: String,
    user_id: String,
    created_at: i64,
}

fn dispatcher(
    current: u32,
    previous: u32,
    l1: Arc<dyn CacheTier>,
    l2: Arc<dyn CacheTier>,
) -> Result<CacheDispatcher, multilevel_cache::CacheError> {
    CacheDispatcher::builder()
        .generations(current, previous)
        .tier(TierDescriptor::new(
            "local",
            l1,
            Duration::from_millis(5),  // give up on local memory quickly
            Duration::from_secs(60),   // keep locally for a minute
        ))
        .tier(TierDescriptor::new(
            "shared",
            l2,
            Duration::from_millis(100),
            Duration::from_secs(3600),
        ))
        .build()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Everything cached about a user goes when the user changes
    let rules = InvalidationRules::default().with(describe(|user: &User| {
        vec![format!("user:{}", user.id), format!("apikeys:{}:*", user.id)]
    }));

    let l1: Arc<dyn CacheTier> =
        Arc::new(MemoryTier::new(MemoryTierConfig::default()).with_invalidation(rules.clone()));
    let l2: Arc<dyn CacheTier> = match std::env::var("REDIS_URL") {
        Ok(url) => Arc::new(
            RedisTier::new(RedisTierConfig::new(url))
                .await?
                .with_invalidation(rules),
        ),
        Err(_) => Arc::new(MokaTier::new(MokaTierConfig::default()).with_invalidation(rules)),
    };
    println!("Second tier: {}", l2.name());

    let cache = dispatcher(1, 1, l1.clone(), l2.clone())?;

    // Cache-aside read: the loader only runs on a miss
    let user = cache
        .get_or_insert_with("user:chronark", None, |key| async move {
            println!("Loading user from database: {}", key);
            Some(User {
                id: "chronark".to_string(),
                name: "Andreas".to_string(),
                email: "andreas@example.com".to_string(),
            })
        })
        .await;
    println!("User: {:?}", user);

    // Same tiers, different value type; the shared tier keeps it for a day
    let api_key = ApiKey {
        key: "sk_live_123".to_string(),
        user_id: "chronark".to_string(),
        created_at: 1_700_000_000,
    };
    cache.set(
        "apikeys:chronark:sk_live_123",
        api_key,
        Some(Duration::from_secs(86_400)),
    );
    tokio::time::sleep(Duration::from_millis(50)).await;

    let cached: Option<ApiKey> = cache.get("apikeys:chronark:sk_live_123").await;
    println!("API key: {:?}", cached);

    // Deploy generation 2: old entries stay readable and move over on first read
    let cache = dispatcher(2, 1, l1, l2)?;
    let user: Option<User> = cache.get("user:chronark").await;
    println!("User after generation bump: {:?}", user);
    tokio::time::sleep(Duration::from_millis(50)).await;

    if let Some(user) = user {
        let report = cache.invalidate(&user).await;
        println!(
            "Invalidated {} keys (skipped tiers: {:?}, failures: {})",
            report.removed,
            report.skipped,
            report.failures.len()
        );
    }

    let gone: Option<ApiKey> = cache.get("apikeys:chronark:sk_live_123").await;
    println!("API key after invalidation: {:?}", gone);

    Ok(())
}

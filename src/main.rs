//! Tiered Cache demo
//!
//! Builds a two-level cache from the environment, drives a skewed concurrent
//! workload through it and prints the resulting statistics and tier usage.

use anyhow::Context;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tiered_cache::{Config, SharedCache, TwoLevelCache};

/// Concurrent clients in the demo workload
const WORKERS: u64 = 4;
/// Operations per client
const OPS_PER_WORKER: u64 = 500;

/// Main entry point for the tiered cache demo.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load and validate configuration from environment variables
/// 3. Create the two-level cache with its on-disk slow tier
/// 4. Run the workload on several tasks sharing the cache
/// 5. Report statistics and usage as JSON, then release the slow tier
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tiered_cache=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting tiered cache demo");

    let config = Config::from_env();
    config.validate().context("invalid configuration")?;
    info!(
        "Configuration loaded: fast={}, slow={}, strategy={}, period={}, dir={}",
        config.fast_tier_capacity,
        config.slow_tier_capacity,
        config.strategy,
        config.rebalance_period,
        config.cache_dir.display()
    );

    let cache = TwoLevelCache::<u64, String>::from_config(&config)
        .context("failed to create cache")?;
    let shared = SharedCache::new(cache);

    let key_space = (config.fast_tier_capacity + config.slow_tier_capacity) as u64 * 2;
    let mut workers = Vec::new();
    for worker in 0..WORKERS {
        let shared = shared.clone();
        workers.push(tokio::spawn(async move {
            run_worker(shared, worker, key_space).await
        }));
    }
    for handle in workers {
        handle.await.context("worker panicked")??;
    }

    let stats = shared.stats().await;
    let usage = shared.usage().await;
    info!("Hit rate: {:.2}", stats.hit_rate());
    println!("{}", serde_json::to_string_pretty(&stats)?);
    println!(
        "{}",
        serde_json::json!({
            "strategy": usage.strategy,
            "fast_tier_entries": usage.fast_tier.len(),
            "slow_tier_entries": usage.slow_tier.len(),
        })
    );

    shared.clear().await.context("failed to clear cache")?;
    info!("Demo complete");
    Ok(())
}

/// Reads a key, filling it on a miss. Low keys are requested far more often
/// so they end up rebalanced into the fast tier.
async fn run_worker(
    cache: SharedCache<u64, String>,
    worker: u64,
    key_space: u64,
) -> tiered_cache::Result<()> {
    let mut state = worker.wrapping_mul(0x9E37_79B9_7F4A_7C15) | 1;
    for _ in 0..OPS_PER_WORKER {
        // xorshift
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;

        let spread = 1 + state % key_space;
        let key = state % spread;
        if cache.get(&key).await?.is_none() {
            cache.put(key, format!("value-{}", key)).await?;
        }
    }
    Ok(())
}

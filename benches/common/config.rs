use std::env;
use std::time::Duration;

/// Configuration for benchmarks, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct BenchConfig {
    /// Redis URL for the remote-tier group (from REDIS_URL env var). Without it
    /// only in-process tiers are benchmarked.
    pub redis_url: Option<String>,

    /// Simulated database latency in milliseconds (from DB_LATENCY_MS env var, defaults to 20)
    pub db_latency_ms: u64,

    /// Retrieval timeout given to the slow tier in the timeout group
    /// (from TIER_TIMEOUT_MS env var, defaults to 2)
    pub tier_timeout: Duration,

    /// Sample size for benchmarks (from BENCH_SAMPLE_SIZE env var, defaults to 100)
    pub sample_size: usize,
}

fn env_number<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            redis_url: env::var("REDIS_URL").ok(),
            db_latency_ms: env_number("DB_LATENCY_MS", 20),
            tier_timeout: Duration::from_millis(env_number("TIER_TIMEOUT_MS", 2)),
            sample_size: env_number("BENCH_SAMPLE_SIZE", 100),
        }
    }
}

impl BenchConfig {
    pub fn new() -> Self {
        let config = Self::default();
        eprintln!("Benchmark Configuration:");
        eprintln!(
            "  Redis URL: {}",
            config.redis_url.as_deref().unwrap_or("(not set, skipping Redis)")
        );
        eprintln!("  DB Latency: {}ms", config.db_latency_ms);
        eprintln!("  Tier Timeout: {:?}", config.tier_timeout);
        eprintln!("  Sample Size: {}", config.sample_size);
        config
    }
}

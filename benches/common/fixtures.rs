use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Cached payload used by the benchmarks
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BenchUser {
    pub id: u64,
    pub name: String,
    pub email: String,
    pub score: u32,
}

impl BenchUser {
    pub fn new(id: u64) -> Self {
        Self {
            id,
            name: format!("User {}", id),
            email: format!("user{}@example.com", id),
            score: (id % 1000) as u32,
        }
    }
}

/// Simulated origin with configurable latency
#[derive(Clone)]
pub struct FakeDatabase {
    data: Arc<HashMap<String, BenchUser>>,
    latency: Duration,
    query_count: Arc<AtomicUsize>,
}

impl FakeDatabase {
    pub fn new(num_users: usize, latency_ms: u64) -> Self {
        let data = (0..num_users as u64)
            .map(|i| (format!("user:{}", i), BenchUser::new(i)))
            .collect();

        Self {
            data: Arc::new(data),
            latency: Duration::from_millis(latency_ms),
            query_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub async fn get(&self, key: &str) -> Option<BenchUser> {
        self.query_count.fetch_add(1, Ordering::Relaxed);
        tokio::time::sleep(self.latency).await;
        self.data.get(key).cloned()
    }

    #[allow(dead_code)]
    pub fn query_count(&self) -> usize {
        self.query_count.load(Ordering::Relaxed)
    }
}

/// Generate logical keys for different workload patterns
pub struct KeyGenerator {
    num_keys: usize,
}

impl KeyGenerator {
    pub fn new(num_keys: usize) -> Self {
        Self { num_keys }
    }

    /// Every key once, in order (for warming a cache)
    pub fn sequential(&self) -> Vec<String> {
        (0..self.num_keys).map(|i| format!("user:{}", i)).collect()
    }

    /// Keys with a simplified Zipf distribution: 80% of requests go to 20% of keys
    pub fn zipf_random(&self, count: usize) -> Vec<String> {
        let mut rng = rand::thread_rng();
        let hot = (self.num_keys / 5).max(1);

        (0..count)
            .map(|_| {
                let key_id = if rng.gen_bool(0.8) {
                    rng.gen_range(0..hot)
                } else {
                    rng.gen_range(0..self.num_keys)
                };
                format!("user:{}", key_id)
            })
            .collect()
    }

    /// Keys of which roughly `hit_ratio` fall into the first, warmed, part of the key space
    pub fn mixed(&self, count: usize, hit_ratio: f64) -> Vec<String> {
        let mut rng = rand::thread_rng();
        let hot_key_count = ((self.num_keys as f64 * hit_ratio) as usize).clamp(1, self.num_keys - 1);

        (0..count)
            .map(|_| {
                if rng.gen_bool(hit_ratio) {
                    format!("user:{}", rng.gen_range(0..hot_key_count))
                } else {
                    format!("user:{}", rng.gen_range(hot_key_count..self.num_keys))
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    #[tokio::test]
    async fn test_fake_database() {
        use super::FakeDatabase;

        let db = FakeDatabase::new(100, 1);

        let user = db.get("user:0").await;
        assert_eq!(user.map(|u| u.id), Some(0));

        assert!(db.get("user:100").await.is_none());
        assert_eq!(db.query_count(), 2);
    }

    #[test]
    fn test_key_generator() {
        use super::KeyGenerator;

        let key_gen = KeyGenerator::new(100);

        let seq = key_gen.sequential();
        assert_eq!(seq.len(), 100);
        assert_eq!(seq[0], "user:0");

        assert_eq!(key_gen.zipf_random(100).len(), 100);
        assert_eq!(key_gen.mixed(50, 0.8).len(), 50);
    }
}

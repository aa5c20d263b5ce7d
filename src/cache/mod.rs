use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::clock::Clock;

/// Counter cache used by the rate limiter. Injected at bootstrap and passed
/// through application state; nothing holds it as process-global mutable
/// state. A Redis-backed implementation slots in behind this trait when
/// counters must be shared across instances.
#[async_trait]
pub trait CacheClient: Send + Sync {
    /// Increment `key` within the current fixed window of `window_secs`
    /// seconds and return the post-increment count. Counts reset when the
    /// window rolls over.
    async fn incr_window(&self, key: &str, window_secs: u64) -> u64;
}

/// Single-process implementation keyed by (key, window bucket).
pub struct MemoryCache {
    clock: Arc<dyn Clock>,
    counters: Mutex<HashMap<String, (i64, u64)>>,
}

impl MemoryCache {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            counters: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl CacheClient for MemoryCache {
    async fn incr_window(&self, key: &str, window_secs: u64) -> u64 {
        let bucket = self.clock.now().timestamp() / window_secs.max(1) as i64;
        let mut counters = self.counters.lock().await;
        let entry = counters.entry(key.to_string()).or_insert((bucket, 0));
        if entry.0 != bucket {
            *entry = (bucket, 0);
        }
        entry.1 += 1;
        entry.1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    #[tokio::test]
    async fn counts_reset_when_window_rolls() {
        let clock = Arc::new(ManualClock::at("2024-03-11T09:00:00Z"));
        let cache = MemoryCache::new(clock.clone());

        assert_eq!(cache.incr_window("agent:1", 60).await, 1);
        assert_eq!(cache.incr_window("agent:1", 60).await, 2);
        assert_eq!(cache.incr_window("agent:2", 60).await, 1);

        clock.advance_minutes(2);
        assert_eq!(cache.incr_window("agent:1", 60).await, 1);
    }
}

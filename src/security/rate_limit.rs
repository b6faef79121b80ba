//! Per-client rate limiting with idle-client eviction.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::config::RateLimitConfig;
use crate::observability::metrics;
use crate::security::token_bucket::{RefillRate, TokenBucket};

/// Registry of token buckets keyed by client.
///
/// One mutex guards the whole map. Admission checks and janitor sweeps both
/// take it, so a sweep can never interleave with the lazy creation of a
/// bucket, and eviction is decided against the latest `last_seen`.
pub struct ClientRateLimiter {
    buckets: Mutex<HashMap<String, TokenBucket>>,
    capacity: u32,
    rate: RefillRate,
    ttl: Duration,
}

impl ClientRateLimiter {
    pub fn new(capacity: u32, rate: RefillRate, ttl: Duration) -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
            capacity,
            rate,
            ttl,
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.burst_size, config.refill_rate(), config.idle_ttl())
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, TokenBucket>> {
        // Buckets hold plain numbers; a panic mid-update cannot leave them unusable.
        self.buckets.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns `true` if the client may proceed.
    pub fn allow(&self, key: &str) -> bool {
        self.allow_at(key, Instant::now())
    }

    /// [`allow`](Self::allow) against an explicit clock reading.
    pub fn allow_at(&self, key: &str, now: Instant) -> bool {
        let mut buckets = self.lock();
        if let Some(bucket) = buckets.get_mut(key) {
            return bucket.try_acquire(now);
        }

        let mut bucket = TokenBucket::new(self.capacity, self.rate, now);
        let allowed = bucket.try_acquire(now);
        buckets.insert(key.to_owned(), bucket);
        metrics::record_tracked_clients(buckets.len());
        allowed
    }

    /// Evict every client idle for longer than the TTL. Returns the number
    /// of evicted entries.
    pub fn sweep(&self) -> usize {
        let mut buckets = self.lock();
        // Read the clock under the lock: anything touched before we got here
        // has a `last_seen` no later than `now`.
        let now = Instant::now();
        self.evict(&mut buckets, now)
    }

    /// [`sweep`](Self::sweep) against an explicit clock reading.
    pub fn sweep_at(&self, now: Instant) -> usize {
        let mut buckets = self.lock();
        self.evict(&mut buckets, now)
    }

    fn evict(&self, buckets: &mut HashMap<String, TokenBucket>, now: Instant) -> usize {
        let before = buckets.len();
        let ttl = self.ttl;
        buckets.retain(|_, bucket| bucket.idle_for(now) <= ttl);
        let evicted = before - buckets.len();

        metrics::record_tracked_clients(buckets.len());
        if evicted > 0 {
            metrics::record_evictions(evicted);
        }
        evicted
    }

    /// Number of clients currently tracked.
    pub fn tracked_clients(&self) -> usize {
        self.lock().len()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.lock().contains_key(key)
    }

    /// Spawn the janitor task.
    ///
    /// The first sweep happens one `interval` after spawning. The task exits
    /// when `shutdown` fires or its sender is dropped.
    pub fn spawn_janitor(
        self: &Arc<Self>,
        interval: Duration,
        mut shutdown: broadcast::Receiver<()>,
    ) -> JoinHandle<()> {
        let limiter = Arc::clone(self);
        // `interval_at` panics on a zero period.
        let interval = interval.max(Duration::from_millis(1));
        tokio::spawn(async move {
            tracing::info!(
                interval_secs = interval.as_secs_f64(),
                ttl_secs = limiter.ttl.as_secs_f64(),
                "Rate limiter janitor starting"
            );

            let mut ticker = time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let evicted = limiter.sweep();
                        tracing::debug!(
                            evicted,
                            remaining = limiter.tracked_clients(),
                            "Janitor sweep complete"
                        );
                    }
                    _ = shutdown.recv() => {
                        tracing::info!("Rate limiter janitor received shutdown signal, exiting loop");
                        break;
                    }
                }
            }
        })
    }
}

impl std::fmt::Debug for ClientRateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientRateLimiter")
            .field("capacity", &self.capacity)
            .field("rate", &self.rate)
            .field("ttl", &self.ttl)
            .field("tracked_clients", &self.tracked_clients())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::Shutdown;

    fn limiter(capacity: u32) -> ClientRateLimiter {
        ClientRateLimiter::new(
            capacity,
            RefillRate::new(10, Duration::from_secs(60)),
            Duration::from_secs(300),
        )
    }

    #[test]
    fn burst_then_deny() {
        let limiter = limiter(10);
        let now = Instant::now();

        let admitted = (0..15).filter(|_| limiter.allow_at("a", now)).count();
        assert_eq!(admitted, 10);
    }

    #[test]
    fn clients_are_independent() {
        let limiter = limiter(1);
        let now = Instant::now();

        assert!(limiter.allow_at("a", now));
        assert!(!limiter.allow_at("a", now));
        assert!(limiter.allow_at("b", now));
        assert_eq!(limiter.tracked_clients(), 2);
    }

    #[test]
    fn refill_after_six_seconds() {
        let limiter = limiter(10);
        let start = Instant::now();
        while limiter.allow_at("a", start) {}

        assert!(limiter.allow_at("a", start + Duration::from_secs(6)));
    }

    #[test]
    fn sweep_evicts_only_idle_clients() {
        let limiter = limiter(10);
        let start = Instant::now();
        limiter.allow_at("idle", start);
        limiter.allow_at("active", start);

        limiter.allow_at("active", start + Duration::from_secs(200));
        let evicted = limiter.sweep_at(start + Duration::from_secs(301));

        assert_eq!(evicted, 1);
        assert!(!limiter.contains("idle"));
        assert!(limiter.contains("active"));
    }

    #[test]
    fn throttled_clients_are_not_evicted() {
        let limiter = limiter(1);
        let start = Instant::now();
        assert!(limiter.allow_at("a", start));

        let mut now = start;
        for _ in 0..10 {
            now += Duration::from_secs(100);
            limiter.allow_at("a", now);
            limiter.sweep_at(now);
        }
        assert!(limiter.contains("a"));
    }

    #[test]
    fn bucket_touched_after_sweep_clock_is_kept() {
        let limiter = limiter(10);
        let start = Instant::now();
        let fresh = start + Duration::from_secs(1000);
        limiter.allow_at("late", fresh);

        // A sweep holding an older clock reading must not evict it.
        assert_eq!(limiter.sweep_at(start), 0);
        assert!(limiter.contains("late"));
    }

    #[test]
    fn evicted_client_starts_with_full_bucket() {
        let limiter = limiter(2);
        let start = Instant::now();
        while limiter.allow_at("a", start) {}

        let later = start + Duration::from_secs(301);
        limiter.sweep_at(later);
        assert!(!limiter.contains("a"));

        assert!(limiter.allow_at("a", later));
        assert!(limiter.allow_at("a", later));
    }

    #[tokio::test(start_paused = true)]
    async fn janitor_runs_on_interval() {
        let limiter = Arc::new(limiter(10));
        let shutdown = Shutdown::new();
        let janitor = limiter.spawn_janitor(Duration::from_secs(60), shutdown.subscribe());

        limiter.allow("idle");
        limiter.allow("active");
        for _ in 0..12 {
            tokio::time::sleep(Duration::from_secs(30)).await;
            limiter.allow("active");
        }
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert!(!limiter.contains("idle"));
        assert!(limiter.contains("active"));

        shutdown.trigger();
        janitor.await.unwrap();
    }

    #[tokio::test]
    async fn janitor_stops_when_sender_dropped() {
        let limiter = Arc::new(limiter(10));
        let shutdown = Shutdown::new();
        let janitor = limiter.spawn_janitor(Duration::from_secs(3600), shutdown.subscribe());

        drop(shutdown);
        tokio::time::timeout(Duration::from_secs(5), janitor)
            .await
            .expect("janitor should exit")
            .unwrap();
    }
}

//! Login attempt throttling.
//!
//! Each user id that hits `POST /auth/login` gets a token bucket holding up to
//! `burst` attempts and refilling at `rate` attempts per second. Attempts
//! count whether or not the password turns out to be correct, so a guessing
//! client is slowed down regardless of outcome.
//!
//! # Example
//!
//! ```rust
//! use eventhub_server::throttle::{LoginThrottle, ThrottleDecision};
//!
//! #[tokio::main]
//! async fn main() {
//!     let throttle = LoginThrottle::new(0.2, 2);
//!
//!     assert!(throttle.check("alice").await.is_allowed());
//!     assert!(throttle.check("alice").await.is_allowed());
//!     assert!(matches!(
//!         throttle.check("alice").await,
//!         ThrottleDecision::Limited { .. }
//!     ));
//! }
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

/// Default refill rate: one attempt every five seconds.
pub const DEFAULT_LOGIN_RATE: f64 = 0.2;

/// Default burst: five attempts.
pub const DEFAULT_LOGIN_BURST: u32 = 5;

/// Buckets idle for longer than this are dropped by cleanup once refilled.
pub const IDLE_BUCKET_TIMEOUT: Duration = Duration::from_secs(60);

/// Upper bound on the advertised retry delay (one hour).
pub const MAX_RETRY_AFTER_SECS: u64 = 3600;

/// Outcome of a throttle check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThrottleDecision {
    /// The attempt may proceed.
    Allowed,

    /// Too many attempts; the client should wait before retrying.
    Limited {
        /// Seconds until the next attempt is available, between 1 and
        /// [`MAX_RETRY_AFTER_SECS`].
        retry_after_secs: u64,
    },
}

impl ThrottleDecision {
    /// Returns `true` if the attempt may proceed.
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }
}

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

impl Bucket {
    fn full(burst: u32) -> Self {
        Self {
            tokens: f64::from(burst),
            last_refill: Instant::now(),
        }
    }

    fn take(&mut self, rate: f64, burst: u32) -> ThrottleDecision {
        let now = Instant::now();
        let refilled = now.duration_since(self.last_refill).as_secs_f64() * rate;
        self.tokens = (self.tokens + refilled).min(f64::from(burst));
        self.last_refill = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            return ThrottleDecision::Allowed;
        }

        let wait = if rate > 0.0 {
            ((1.0 - self.tokens) / rate).ceil() as u64
        } else {
            MAX_RETRY_AFTER_SECS
        };
        ThrottleDecision::Limited {
            retry_after_secs: wait.clamp(1, MAX_RETRY_AFTER_SECS),
        }
    }

    fn idle_for(&self) -> Duration {
        self.last_refill.elapsed()
    }

    /// A bucket may only be forgotten once it would be full again, otherwise
    /// dropping it hands the user a fresh burst.
    fn is_refilled(&self, rate: f64, burst: u32) -> bool {
        self.tokens + self.idle_for().as_secs_f64() * rate >= f64::from(burst)
    }
}

/// Per-user login throttle. Cheap to clone; clones share state.
#[derive(Debug, Clone)]
pub struct LoginThrottle {
    buckets: Arc<RwLock<HashMap<String, Bucket>>>,
    rate: f64,
    burst: u32,
}

impl LoginThrottle {
    /// Creates a throttle refilling `rate` attempts per second up to `burst`.
    pub fn new(rate: f64, burst: u32) -> Self {
        Self {
            buckets: Arc::new(RwLock::new(HashMap::new())),
            rate,
            burst,
        }
    }

    /// Records an attempt for `user_id` and decides whether it may proceed.
    pub async fn check(&self, user_id: &str) -> ThrottleDecision {
        let mut buckets = self.buckets.write().await;
        buckets
            .entry(user_id.to_string())
            .or_insert_with(|| Bucket::full(self.burst))
            .take(self.rate, self.burst)
    }

    /// Drops buckets idle for longer than [`IDLE_BUCKET_TIMEOUT`] that have
    /// refilled to `burst`. Exhausted buckets are kept however long they idle.
    ///
    /// Returns the number of buckets removed.
    pub async fn cleanup_stale_entries(&self) -> usize {
        self.cleanup_idle_for(IDLE_BUCKET_TIMEOUT).await
    }

    async fn cleanup_idle_for(&self, timeout: Duration) -> usize {
        let mut buckets = self.buckets.write().await;
        let before = buckets.len();
        let (rate, burst) = (self.rate, self.burst);
        buckets.retain(|_, bucket| {
            bucket.idle_for() < timeout || !bucket.is_refilled(rate, burst)
        });
        before - buckets.len()
    }

    /// Number of users currently tracked.
    pub async fn tracked_users(&self) -> usize {
        self.buckets.read().await.len()
    }

    /// Spawns a task that runs [`cleanup_stale_entries`](Self::cleanup_stale_entries)
    /// every `interval`. Abort the returned handle to stop it.
    pub fn spawn_cleanup_task(&self, interval: Duration) -> JoinHandle<()> {
        let throttle = self.clone();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let removed = throttle.cleanup_stale_entries().await;
                if removed > 0 {
                    debug!(removed_count = removed, "Dropped idle login throttle buckets");
                }
            }
        })
    }
}

impl Default for LoginThrottle {
    fn default() -> Self {
        Self::new(DEFAULT_LOGIN_RATE, DEFAULT_LOGIN_BURST)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn allows_burst_then_limits() {
        let throttle = LoginThrottle::new(0.1, 3);

        for attempt in 1..=3 {
            assert!(
                throttle.check("alice").await.is_allowed(),
                "attempt {attempt} should be allowed"
            );
        }

        match throttle.check("alice").await {
            ThrottleDecision::Limited { retry_after_secs } => {
                assert!((1..=10).contains(&retry_after_secs));
            }
            ThrottleDecision::Allowed => panic!("fourth attempt should be limited"),
        }
    }

    #[tokio::test]
    async fn users_are_throttled_independently() {
        let throttle = LoginThrottle::new(0.1, 1);

        assert!(throttle.check("alice").await.is_allowed());
        assert!(!throttle.check("alice").await.is_allowed());
        assert!(throttle.check("bob").await.is_allowed());
        assert_eq!(throttle.tracked_users().await, 2);
    }

    #[tokio::test]
    async fn attempts_refill_over_time() {
        let throttle = LoginThrottle::new(10.0, 1);

        assert!(throttle.check("alice").await.is_allowed());
        assert!(!throttle.check("alice").await.is_allowed());

        tokio::time::sleep(Duration::from_millis(150)).await;

        assert!(throttle.check("alice").await.is_allowed());
    }

    #[tokio::test]
    async fn zero_rate_never_refills() {
        let throttle = LoginThrottle::new(0.0, 1);

        assert!(throttle.check("alice").await.is_allowed());
        assert_eq!(
            throttle.check("alice").await,
            ThrottleDecision::Limited {
                retry_after_secs: MAX_RETRY_AFTER_SECS
            }
        );
    }

    #[tokio::test]
    async fn slow_rate_retry_is_capped() {
        let throttle = LoginThrottle::new(0.0001, 1);

        assert!(throttle.check("alice").await.is_allowed());
        assert_eq!(
            throttle.check("alice").await,
            ThrottleDecision::Limited {
                retry_after_secs: MAX_RETRY_AFTER_SECS
            }
        );
    }

    #[tokio::test]
    async fn cleanup_removes_only_idle_refilled_buckets() {
        let throttle = LoginThrottle::new(1000.0, 5);
        throttle.check("alice").await;

        assert_eq!(throttle.cleanup_stale_entries().await, 0);

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(throttle.cleanup_idle_for(Duration::from_millis(10)).await, 1);
        assert_eq!(throttle.tracked_users().await, 0);
    }

    #[tokio::test]
    async fn cleanup_keeps_exhausted_buckets() {
        let throttle = LoginThrottle::new(0.0, 1);
        assert!(throttle.check("alice").await.is_allowed());
        assert!(!throttle.check("alice").await.is_allowed());

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(throttle.cleanup_idle_for(Duration::from_millis(10)).await, 0);

        assert!(matches!(
            throttle.check("alice").await,
            ThrottleDecision::Limited { .. }
        ));
    }

    #[tokio::test]
    async fn cleanup_keeps_partially_refilled_buckets() {
        let throttle = LoginThrottle::new(1.0, 5);
        for _ in 0..5 {
            throttle.check("alice").await;
        }

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(throttle.cleanup_idle_for(Duration::from_millis(10)).await, 0);
        assert_eq!(throttle.tracked_users().await, 1);
    }

    #[tokio::test]
    async fn clones_share_buckets() {
        let throttle = LoginThrottle::new(0.1, 1);
        let clone = throttle.clone();

        assert!(throttle.check("alice").await.is_allowed());
        assert!(!clone.check("alice").await.is_allowed());
    }

    #[test]
    fn default_uses_login_constants() {
        let throttle = LoginThrottle::default();
        assert_eq!(throttle.rate, DEFAULT_LOGIN_RATE);
        assert_eq!(throttle.burst, DEFAULT_LOGIN_BURST);
    }
}

//! Rate limiting for login attempts
//!
//! Uses a token bucket per client key (the request's origin IP):
//! - Each key has a bucket with a maximum capacity
//! - A request consumes one token
//! - One token is added back every token interval
//! - When the bucket is empty, requests are rejected
//!
//! Buckets are created on first use. Buckets that have refilled completely
//! carry no state worth keeping and are dropped by a periodic sweep.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use dashmap::DashMap;

use crate::core::auth::{AuthError, ClientInfo};
use crate::core::sweeper::SweeperHandle;

/// Login attempts allowed in a burst
pub const LOGIN_MAX_TOKENS: u32 = 5;

/// Time to regain one login attempt (5 per minute sustained)
pub const LOGIN_TOKEN_INTERVAL: Duration = Duration::from_secs(12);

/// How often full buckets are dropped
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Token bucket rate limiter
///
/// # Example
/// ```
/// # use warden::core::rate_limiter::RateLimiter;
/// # use std::time::Duration;
/// let mut limiter = RateLimiter::new(2, Duration::from_secs(12));
///
/// assert!(limiter.check_and_consume(1));
/// assert!(limiter.check_and_consume(1));
///
/// // Bucket empty
/// assert!(!limiter.check_and_consume(1));
/// ```
#[derive(Debug, Clone)]
pub struct RateLimiter {
    /// Maximum number of tokens the bucket can hold
    max_tokens: u32,
    /// Current number of tokens in the bucket
    current_tokens: f64,
    /// Time to add one token
    token_interval: Duration,
    /// Last time tokens were refilled
    last_refill: Instant,
}

impl RateLimiter {
    /// Create a full bucket
    ///
    /// # Arguments
    /// * `max_tokens` - Maximum bucket capacity
    /// * `token_interval` - Time to add one token back
    pub fn new(max_tokens: u32, token_interval: Duration) -> Self {
        Self::new_at(max_tokens, token_interval, Instant::now())
    }

    /// Create a full bucket whose clock starts at `now`
    pub fn new_at(max_tokens: u32, token_interval: Duration, now: Instant) -> Self {
        Self {
            max_tokens,
            current_tokens: max_tokens as f64,
            token_interval,
            last_refill: now,
        }
    }

    /// Refill tokens based on elapsed time
    fn refill_at(&mut self, now: Instant) {
        if now <= self.last_refill {
            return;
        }

        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        let tokens_to_add = elapsed / self.token_interval.as_secs_f64();

        // Add tokens, capped at max_tokens
        self.current_tokens = (self.current_tokens + tokens_to_add).min(self.max_tokens as f64);
        self.last_refill = now;
    }

    /// Check if tokens are available and consume them if so
    ///
    /// Returns `true` if the operation is allowed (tokens consumed),
    /// `false` if rate limit exceeded (tokens not consumed).
    pub fn check_and_consume(&mut self, tokens: u32) -> bool {
        self.check_and_consume_at(tokens, Instant::now())
    }

    pub fn check_and_consume_at(&mut self, tokens: u32, now: Instant) -> bool {
        self.refill_at(now);

        if self.current_tokens >= tokens as f64 {
            self.current_tokens -= tokens as f64;
            true
        } else {
            false
        }
    }

    /// Get current token count (after refill)
    pub fn current_tokens_at(&mut self, now: Instant) -> u32 {
        self.refill_at(now);
        self.current_tokens as u32
    }

    /// Get maximum token capacity
    pub fn max_tokens(&self) -> u32 {
        self.max_tokens
    }

    /// Check if the bucket is full
    pub fn is_full_at(&mut self, now: Instant) -> bool {
        self.refill_at(now);
        self.current_tokens >= self.max_tokens as f64
    }
}

/// Per-key token buckets
#[derive(Clone)]
pub struct RateLimiterRegistry {
    buckets: Arc<DashMap<String, RateLimiter>>,
    max_tokens: u32,
    token_interval: Duration,
}

impl RateLimiterRegistry {
    pub fn new(max_tokens: u32, token_interval: Duration) -> Self {
        Self {
            buckets: Arc::new(DashMap::new()),
            max_tokens,
            token_interval,
        }
    }

    /// Registry with the login limits
    pub fn for_login() -> Self {
        Self::new(LOGIN_MAX_TOKENS, LOGIN_TOKEN_INTERVAL)
    }

    /// Consume one token for `key`, creating its bucket on first use
    pub fn allow(&self, key: &str) -> bool {
        self.allow_at(key, Instant::now())
    }

    pub fn allow_at(&self, key: &str, now: Instant) -> bool {
        // Fast path avoids allocating the key for known clients
        if let Some(mut bucket) = self.buckets.get_mut(key) {
            return bucket.check_and_consume_at(1, now);
        }

        self.buckets
            .entry(key.to_string())
            .or_insert_with(|| RateLimiter::new_at(self.max_tokens, self.token_interval, now))
            .check_and_consume_at(1, now)
    }

    /// Drop buckets that have refilled to capacity, returning how many went
    pub fn sweep_idle(&self) -> usize {
        self.sweep_idle_at(Instant::now())
    }

    pub fn sweep_idle_at(&self, now: Instant) -> usize {
        let before = self.buckets.len();
        self.buckets.retain(|_, bucket| !bucket.is_full_at(now));
        before.saturating_sub(self.buckets.len())
    }

    /// Number of tracked keys
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Sweep idle buckets every `period` until the handle is stopped
    pub fn spawn_sweeper(&self, period: Duration) -> SweeperHandle {
        let registry = self.clone();
        SweeperHandle::spawn("rate_limiter", period, move || {
            let registry = registry.clone();
            async move {
                let removed = registry.sweep_idle();
                if removed > 0 {
                    tracing::debug!(removed, "Dropped idle rate-limit buckets");
                }
            }
        })
    }
}

impl Default for RateLimiterRegistry {
    fn default() -> Self {
        Self::for_login()
    }
}

/// Reject requests from clients that have exhausted their bucket
pub async fn limit_by_client(
    State(registry): State<RateLimiterRegistry>,
    req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let client = ClientInfo::resolve(req.headers(), req.extensions());

    if !registry.allow(&client.ip) {
        tracing::warn!(ip = %client.ip, path = %req.uri().path(), "Rate limit exceeded");
        return Err(AuthError::TooManyRequests);
    }

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    const INTERVAL: Duration = Duration::from_secs(12);

    // ========================================================================
    // Bucket Tests
    // ========================================================================

    #[test]
    fn test_rate_limiter_initial_full() {
        let now = Instant::now();
        let mut limiter = RateLimiter::new_at(5, INTERVAL, now);
        assert_eq!(limiter.max_tokens(), 5);
        assert_eq!(limiter.current_tokens_at(now), 5);
        assert!(limiter.is_full_at(now));
    }

    #[test]
    fn test_rate_limiter_exhaust() {
        let now = Instant::now();
        let mut limiter = RateLimiter::new_at(5, INTERVAL, now);
        for _ in 0..5 {
            assert!(limiter.check_and_consume_at(1, now));
        }
        assert!(!limiter.check_and_consume_at(1, now));
        assert_eq!(limiter.current_tokens_at(now), 0);
    }

    #[test]
    fn test_rate_limiter_exceed_capacity() {
        let now = Instant::now();
        let mut limiter = RateLimiter::new_at(5, INTERVAL, now);
        assert!(!limiter.check_and_consume_at(6, now));
        assert_eq!(limiter.current_tokens_at(now), 5);
    }

    #[test]
    fn test_rate_limiter_refills_one_token_per_interval() {
        let start = Instant::now();
        let mut limiter = RateLimiter::new_at(5, INTERVAL, start);
        for _ in 0..5 {
            assert!(limiter.check_and_consume_at(1, start));
        }

        assert!(!limiter.check_and_consume_at(1, start + Duration::from_secs(6)));
        assert!(limiter.check_and_consume_at(1, start + INTERVAL));
        assert!(!limiter.check_and_consume_at(1, start + INTERVAL));
    }

    #[test]
    fn test_rate_limiter_refill_caps_at_max() {
        let start = Instant::now();
        let mut limiter = RateLimiter::new_at(5, INTERVAL, start);
        assert!(limiter.check_and_consume_at(3, start));

        let later = start + Duration::from_secs(600);
        assert_eq!(limiter.current_tokens_at(later), 5);
        assert!(limiter.is_full_at(later));
    }

    #[test]
    fn test_rate_limiter_ignores_clock_going_backwards() {
        let start = Instant::now() + Duration::from_secs(10);
        let mut limiter = RateLimiter::new_at(1, INTERVAL, start);
        assert!(limiter.check_and_consume_at(1, start));
        assert!(!limiter.check_and_consume_at(1, start - Duration::from_secs(5)));
    }

    // ========================================================================
    // Registry Tests
    // ========================================================================

    #[test]
    fn test_registry_five_then_reject() {
        let registry = RateLimiterRegistry::for_login();
        let now = Instant::now();

        for _ in 0..5 {
            assert!(registry.allow_at("1.2.3.4", now));
        }
        assert!(!registry.allow_at("1.2.3.4", now));

        // Other clients are unaffected
        assert!(registry.allow_at("5.6.7.8", now));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_registry_regains_one_after_interval() {
        let registry = RateLimiterRegistry::for_login();
        let start = Instant::now();

        for _ in 0..5 {
            assert!(registry.allow_at("1.2.3.4", start));
        }
        assert!(!registry.allow_at("1.2.3.4", start));

        let later = start + LOGIN_TOKEN_INTERVAL;
        assert!(registry.allow_at("1.2.3.4", later));
        assert!(!registry.allow_at("1.2.3.4", later));
    }

    #[test]
    fn test_sweep_drops_only_full_buckets() {
        let registry = RateLimiterRegistry::for_login();
        let start = Instant::now();

        registry.allow_at("idle", start);
        for _ in 0..5 {
            registry.allow_at("busy", start + Duration::from_secs(50));
        }

        // "idle" refilled by now, "busy" has not
        let removed = registry.sweep_idle_at(start + Duration::from_secs(60));
        assert_eq!(removed, 1);
        assert_eq!(registry.len(), 1);
        assert!(!registry.allow_at("busy", start + Duration::from_secs(60)));
    }

    #[tokio::test]
    async fn test_sweeper_runs_in_background() {
        let registry = RateLimiterRegistry::new(1, Duration::from_millis(5));
        registry.allow("client");
        assert_eq!(registry.len(), 1);

        let handle = registry.spawn_sweeper(Duration::from_millis(20));
        tokio::time::sleep(Duration::from_millis(80)).await;

        assert!(registry.is_empty());
        handle.stop().await;
    }
}

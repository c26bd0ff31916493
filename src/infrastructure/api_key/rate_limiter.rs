//! Sliding window rate limiting for API keys
//!
//! Enforces the per-minute/hour/day limits carried on each key. Windows
//! are independent; no consistency between them is assumed.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

use crate::domain::api_key::{ApiKeyId, RateLimits};

/// Result of a rate limit check
#[derive(Debug, Clone)]
pub struct RateLimitDecision {
    /// Whether the request is allowed
    pub allowed: bool,
    /// Remaining requests in the per-minute window
    pub remaining: u32,
    /// Limit of the window that produced this decision
    pub limit: u32,
    /// Seconds until the violated (or per-minute) window frees up
    pub reset_in_seconds: u64,
    /// Which window was exhausted, if any
    pub exhausted: Option<LimitWindow>,
}

/// The three enforcement windows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitWindow {
    PerMinute,
    PerHour,
    PerDay,
}

impl LimitWindow {
    fn duration(self) -> Duration {
        match self {
            Self::PerMinute => Duration::from_secs(60),
            Self::PerHour => Duration::from_secs(3600),
            Self::PerDay => Duration::from_secs(86400),
        }
    }
}

impl std::fmt::Display for LimitWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PerMinute => write!(f, "per_minute"),
            Self::PerHour => write!(f, "per_hour"),
            Self::PerDay => write!(f, "per_day"),
        }
    }
}

/// In-process sliding window limiter keyed by API key id
#[derive(Debug)]
pub struct RateLimiter {
    timestamps: Arc<RwLock<HashMap<ApiKeyId, Vec<Instant>>>>,
    cleanup_interval: Duration,
    last_cleanup: Arc<RwLock<Instant>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self {
            timestamps: Arc::new(RwLock::new(HashMap::new())),
            cleanup_interval: Duration::from_secs(300),
            last_cleanup: Arc::new(RwLock::new(Instant::now())),
        }
    }

    /// Check the limits and, when allowed, record the request
    pub async fn check_and_record(
        &self,
        id: ApiKeyId,
        limits: RateLimits,
    ) -> RateLimitDecision {
        self.maybe_cleanup().await;

        let now = Instant::now();
        let mut timestamps = self.timestamps.write().await;

        let decision = decide(timestamps.get(&id), limits, now);

        if decision.allowed {
            timestamps.entry(id).or_default().push(now);
        }

        decision
    }

    /// Check the limits without consuming a request
    pub async fn check(&self, id: ApiKeyId, limits: RateLimits) -> RateLimitDecision {
        let now = Instant::now();
        let timestamps = self.timestamps.read().await;

        decide(timestamps.get(&id), limits, now)
    }

    /// Drop counters for a key (limits changed, key rotated or deleted)
    pub async fn reset(&self, id: ApiKeyId) {
        let mut timestamps = self.timestamps.write().await;
        timestamps.remove(&id);
    }

    async fn maybe_cleanup(&self) {
        let due = {
            let last = self.last_cleanup.read().await;
            last.elapsed() >= self.cleanup_interval
        };

        if !due {
            return;
        }

        let mut last = self.last_cleanup.write().await;
        *last = Instant::now();

        let now = Instant::now();
        let cutoff = now
            .checked_sub(LimitWindow::PerDay.duration())
            .unwrap_or(now);

        let mut timestamps = self.timestamps.write().await;

        for entries in timestamps.values_mut() {
            entries.retain(|t| *t >= cutoff);
        }

        timestamps.retain(|_, v| !v.is_empty());
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

fn decide(entries: Option<&Vec<Instant>>, limits: RateLimits, now: Instant) -> RateLimitDecision {
    let entries = match entries {
        Some(e) => e,
        None => {
            return RateLimitDecision {
                allowed: true,
                remaining: limits.per_minute.saturating_sub(1),
                limit: limits.per_minute,
                reset_in_seconds: 60,
                exhausted: None,
            };
        }
    };

    let windows = [
        (LimitWindow::PerMinute, limits.per_minute),
        (LimitWindow::PerHour, limits.per_hour),
        (LimitWindow::PerDay, limits.per_day),
    ];

    for (window, limit) in windows {
        let window_start = now.checked_sub(window.duration()).unwrap_or(now);
        let in_window: Vec<&Instant> = entries.iter().filter(|t| **t >= window_start).collect();

        if in_window.len() as u32 >= limit {
            let reset_in = in_window
                .iter()
                .map(|t| now.duration_since(**t))
                .max()
                .map(|elapsed| window.duration().as_secs().saturating_sub(elapsed.as_secs()))
                .unwrap_or_else(|| window.duration().as_secs());

            return RateLimitDecision {
                allowed: false,
                remaining: 0,
                limit,
                reset_in_seconds: reset_in,
                exhausted: Some(window),
            };
        }
    }

    let minute_start = now
        .checked_sub(LimitWindow::PerMinute.duration())
        .unwrap_or(now);
    let minute_count = entries.iter().filter(|t| **t >= minute_start).count() as u32;

    RateLimitDecision {
        allowed: true,
        remaining: limits.per_minute.saturating_sub(minute_count + 1),
        limit: limits.per_minute,
        reset_in_seconds: 60,
        exhausted: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_first_request_allowed() {
        let limiter = RateLimiter::new();
        let id = ApiKeyId::generate();

        let decision = limiter.check(id, RateLimits::new(10, 100, 1000)).await;

        assert!(decision.allowed);
        assert_eq!(decision.remaining, 9);
        assert_eq!(decision.limit, 10);
    }

    #[tokio::test]
    async fn test_blocks_over_per_minute_limit() {
        let limiter = RateLimiter::new();
        let id = ApiKeyId::generate();
        let limits = RateLimits::new(2, 100, 1000);

        limiter.check_and_record(id, limits).await;
        limiter.check_and_record(id, limits).await;

        let decision = limiter.check_and_record(id, limits).await;

        assert!(!decision.allowed);
        assert_eq!(decision.remaining, 0);
        assert_eq!(decision.exhausted, Some(LimitWindow::PerMinute));
    }

    #[tokio::test]
    async fn test_hourly_window_can_block_before_minute() {
        let limiter = RateLimiter::new();
        let id = ApiKeyId::generate();
        // Inconsistent configuration is accepted and enforced as-is
        let limits = RateLimits::new(100, 1, 1000);

        limiter.check_and_record(id, limits).await;
        let decision = limiter.check_and_record(id, limits).await;

        assert!(!decision.allowed);
        assert_eq!(decision.exhausted, Some(LimitWindow::PerHour));
    }

    #[tokio::test]
    async fn test_keys_are_independent() {
        let limiter = RateLimiter::new();
        let a = ApiKeyId::generate();
        let b = ApiKeyId::generate();
        let limits = RateLimits::new(1, 100, 1000);

        limiter.check_and_record(a, limits).await;

        assert!(limiter.check(b, limits).await.allowed);
        assert!(!limiter.check(a, limits).await.allowed);
    }

    #[tokio::test]
    async fn test_reset_clears_counters() {
        let limiter = RateLimiter::new();
        let id = ApiKeyId::generate();
        let limits = RateLimits::new(1, 100, 1000);

        limiter.check_and_record(id, limits).await;
        assert!(!limiter.check(id, limits).await.allowed);

        limiter.reset(id).await;

        assert!(limiter.check(id, limits).await.allowed);
    }

    #[tokio::test]
    async fn test_rejected_requests_are_not_recorded() {
        let limiter = RateLimiter::new();
        let id = ApiKeyId::generate();
        let limits = RateLimits::new(1, 100, 1000);

        limiter.check_and_record(id, limits).await;

        // Denied attempts must not extend the window
        for _ in 0..5 {
            let decision = limiter.check_and_record(id, limits).await;
            assert!(!decision.allowed);
        }

        let timestamps = limiter.timestamps.read().await;
        assert_eq!(timestamps.get(&id).unwrap().len(), 1);
    }
}

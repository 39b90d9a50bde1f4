//! Pacing of search requests issued by branches
//!
//! One limiter is owned by the orchestrator's branch executor, so every
//! branch of every run draws from the same budget. A branch waits on it only
//! after passing its cancellation checkpoint, which keeps queued branches of a
//! failed run from consuming searches.

use std::num::NonZeroU32;

use governor::{clock::DefaultClock, state::InMemoryState, state::NotKeyed, Quota, RateLimiter};

type Bucket = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Shared search budget in searches per second
pub struct SearchRateLimiter {
    bucket: Option<Bucket>,
    searches_per_second: Option<f64>,
}

/// Whole-second quota for a configured rate, if the rate limits anything
fn search_quota(searches_per_second: f64) -> Option<Quota> {
    if !searches_per_second.is_finite() || searches_per_second <= 0.0 {
        return None;
    }
    // governor quotas are integral; 0.5 searches/s becomes 1
    let burst = NonZeroU32::new(searches_per_second.ceil() as u32)?;
    Some(Quota::per_second(burst))
}

impl SearchRateLimiter {
    /// Budget of `searches_per_second`; `None`, zero, negative or NaN means unpaced
    ///
    /// ```
    /// use relevance_bench_core::fanout::SearchRateLimiter;
    ///
    /// assert!(SearchRateLimiter::new(Some(20.0)).is_enabled());
    /// assert!(!SearchRateLimiter::new(None).is_enabled());
    /// ```
    pub fn new(searches_per_second: Option<f64>) -> Self {
        Self {
            bucket: searches_per_second
                .and_then(search_quota)
                .map(RateLimiter::direct),
            searches_per_second,
        }
    }

    /// Unpaced budget
    pub fn unlimited() -> Self {
        Self::new(None)
    }

    /// Suspend the calling branch until its search fits the budget
    pub async fn wait(&self) {
        if let Some(bucket) = &self.bucket {
            bucket.until_ready().await;
        }
    }

    /// Spend one search from the budget without suspending
    pub fn try_acquire(&self) -> bool {
        self.bucket.as_ref().map_or(true, |b| b.check().is_ok())
    }

    /// Whether searches are paced at all
    pub fn is_enabled(&self) -> bool {
        self.bucket.is_some()
    }

    /// Rate as configured, before rounding
    pub fn searches_per_second(&self) -> Option<f64> {
        self.searches_per_second
    }
}

impl Default for SearchRateLimiter {
    fn default() -> Self {
        Self::unlimited()
    }
}

impl std::fmt::Debug for SearchRateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchRateLimiter")
            .field("searches_per_second", &self.searches_per_second)
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    #[test]
    fn test_disabled_rates() {
        for rate in [None, Some(0.0), Some(-3.0), Some(f64::NAN)] {
            let limiter = SearchRateLimiter::new(rate);
            assert!(!limiter.is_enabled(), "rate {rate:?} should disable limiting");
            assert!(limiter.try_acquire());
        }
        assert!(!SearchRateLimiter::default().is_enabled());
    }

    #[test]
    fn test_fractional_rate_rounds_up() {
        let limiter = SearchRateLimiter::new(Some(0.5));
        assert!(limiter.is_enabled());
        assert_eq!(limiter.searches_per_second(), Some(0.5));
        assert!(limiter.try_acquire());
    }

    #[test]
    fn test_burst_exhausts_quota() {
        let limiter = SearchRateLimiter::new(Some(2.0));
        assert!(limiter.try_acquire());
        assert!(limiter.try_acquire());
        assert!(!limiter.try_acquire());
    }

    #[tokio::test]
    async fn test_wait_throttles_after_burst() {
        let limiter = SearchRateLimiter::new(Some(10.0));
        while limiter.try_acquire() {}

        let start = Instant::now();
        limiter.wait().await;
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_wait_unlimited_returns_immediately() {
        let limiter = SearchRateLimiter::unlimited();
        for _ in 0..100 {
            limiter.wait().await;
        }
    }

    #[test]
    fn test_debug() {
        let debug = format!("{:?}", SearchRateLimiter::new(Some(25.0)));
        assert!(debug.contains("SearchRateLimiter"));
        assert!(debug.contains("25.0"));
    }
}

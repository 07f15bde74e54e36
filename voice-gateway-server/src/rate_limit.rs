//! Fixed-window rate limiting per client key
use dashmap::DashMap;
use std::time::{Duration, Instant};

use crate::config::RateLimitConfig;
use crate::error::ApiError;

/// Entries beyond this count trigger a cleanup of stale windows
const CLEANUP_THRESHOLD: usize = 10_000;

/// Rate limit entry tracking requests in a time window
#[derive(Debug, Clone)]
struct RateLimitEntry {
    count: u32,
    window_start: Instant,
}

/// Outcome of an allowed request, used for the `X-RateLimit-*` headers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitStatus {
    pub limit: u32,
    pub remaining: u32,
    /// Seconds until the current window resets
    pub reset_secs: u64,
}

/// In-memory rate limiter for single-instance deployments
pub struct RateLimiter {
    entries: DashMap<String, RateLimitEntry>,
    config: RateLimitConfig,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            entries: DashMap::new(),
            config,
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    fn window(&self) -> Duration {
        Duration::from_secs(self.config.window_seconds)
    }

    /// Count a request against `key`
    pub fn check(&self, key: &str) -> Result<RateLimitStatus, ApiError> {
        let window = self.window();

        if self.entries.len() > CLEANUP_THRESHOLD {
            self.entries.retain(|_, entry| entry.window_start.elapsed() < window);
        }

        let now = Instant::now();
        let mut entry = self.entries.entry(key.to_string()).or_insert_with(|| RateLimitEntry {
            count: 0,
            window_start: now,
        });

        // Reset if window expired
        if entry.window_start.elapsed() >= window {
            entry.count = 0;
            entry.window_start = now;
        }

        let reset_secs = window.saturating_sub(entry.window_start.elapsed()).as_secs().max(1);

        if entry.count >= self.config.max_requests {
            return Err(ApiError::rate_limit(
                format!(
                    "{} requests per {} seconds",
                    self.config.max_requests, self.config.window_seconds
                ),
                reset_secs,
            ));
        }

        entry.count += 1;
        Ok(RateLimitStatus {
            limit: self.config.max_requests,
            remaining: self.config.max_requests.saturating_sub(entry.count),
            reset_secs,
        })
    }

    /// Get remaining requests in current window
    pub fn remaining(&self, key: &str) -> u32 {
        match self.entries.get(key) {
            Some(entry) if entry.window_start.elapsed() < self.window() => {
                self.config.max_requests.saturating_sub(entry.count)
            }
            _ => self.config.max_requests,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(max_requests: u32) -> RateLimiter {
        RateLimiter::new(RateLimitConfig {
            enabled: true,
            max_requests,
            window_seconds: 60,
        })
    }

    #[test]
    fn counts_down_then_rejects() {
        let limiter = limiter(2);

        let first = limiter.check("10.0.0.1").unwrap();
        assert_eq!(first.limit, 2);
        assert_eq!(first.remaining, 1);
        assert_eq!(limiter.check("10.0.0.1").unwrap().remaining, 0);

        let err = limiter.check("10.0.0.1").unwrap_err();
        assert!(matches!(err, ApiError::RateLimit { retry_after_secs, .. } if retry_after_secs <= 60));
        assert_eq!(limiter.remaining("10.0.0.1"), 0);
    }

    #[test]
    fn clients_are_counted_separately() {
        let limiter = limiter(1);
        assert!(limiter.check("a").is_ok());
        assert!(limiter.check("a").is_err());
        assert!(limiter.check("b").is_ok());
        assert_eq!(limiter.remaining("c"), 1);
    }
}

// Fixed window per client key. Up to 2M requests can pass across a boundary,
// and counts are per process.

use dashmap::DashMap;
use std::time::{Duration, Instant};

// Rate limit entry - tracks requests per IP/key
#[derive(Debug, Clone, Copy)]
pub struct RateLimitEntry {
    pub count: u32,
    pub window_start: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed,
    Limited { retry_after: Duration },
}

impl RateDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateDecision::Allowed)
    }
}

/// Seam for swapping the in-process map for a shared store.
pub trait RateLimiter: Send + Sync {
    /// Records one request for `key` at `now` and says whether it may pass.
    fn check(&self, key: &str, now: Instant) -> RateDecision;

    /// Drops records whose window ended before `now`. Returns how many went.
    fn sweep(&self, _now: Instant) -> usize {
        0
    }

    /// Number of keys currently tracked.
    fn tracked_keys(&self) -> usize {
        0
    }
}

pub struct InMemoryRateLimiter {
    entries: DashMap<String, RateLimitEntry>,
    max_requests: u32, // 0 disables limiting
    window: Duration,
}

impl InMemoryRateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            max_requests,
            window,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.max_requests > 0
    }
}

impl RateLimiter for InMemoryRateLimiter {
    fn check(&self, key: &str, now: Instant) -> RateDecision {
        if !self.is_enabled() {
            return RateDecision::Allowed;
        }

        // the shard lock is held for the whole read-modify-write
        let mut entry = self
            .entries
            .entry(key.to_string())
            .or_insert(RateLimitEntry {
                count: 0,
                window_start: now,
            });

        // window expired..? start a new one
        if now.saturating_duration_since(entry.window_start) > self.window {
            entry.count = 1;
            entry.window_start = now;
        } else {
            entry.count = entry.count.saturating_add(1);
        }

        if entry.count <= self.max_requests {
            return RateDecision::Allowed;
        }

        let elapsed = now.saturating_duration_since(entry.window_start);
        RateDecision::Limited {
            retry_after: self.window.saturating_sub(elapsed),
        }
    }

    fn sweep(&self, now: Instant) -> usize {
        let before = self.entries.len();
        let window = self.window;
        self.entries
            .retain(|_, entry| now.saturating_duration_since(entry.window_start) <= window);
        before.saturating_sub(self.entries.len())
    }

    fn tracked_keys(&self) -> usize {
        self.entries.len()
    }
}

/// `Retry-After` value in whole seconds, rounded up, never 0.
pub fn retry_after_secs(retry_after: Duration) -> u64 {
    let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
    secs.max(1)
}

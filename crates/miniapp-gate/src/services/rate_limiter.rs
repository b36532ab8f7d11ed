//! Fixed-window rate limiter.
//!
//! Every key gets two windows: one second and one hour. A request is allowed
//! only if both windows still have budget; a denied request does not consume
//! budget.
//!
//! Keys come from unverified init data, so the table is bounded. Once it holds
//! [`MAX_TRACKED_KEYS`] entries, requests for keys it has not seen share a
//! single overflow bucket. Keys whose hour window has expired are pruned when
//! the table grows past [`PRUNE_THRESHOLD`], at most once per
//! [`PRUNE_INTERVAL`].

use crate::auth::rate_key::RateLimitKey;
use crate::observability::metrics::record_rate_limit_check;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

const SECOND: Duration = Duration::from_secs(1);
const HOUR: Duration = Duration::from_secs(3600);

/// Number of tracked keys above which expired entries are pruned.
pub const PRUNE_THRESHOLD: usize = 10_000;

/// Hard cap on tracked keys.
pub const MAX_TRACKED_KEYS: usize = 2 * PRUNE_THRESHOLD;

/// Minimum time between two pruning passes.
pub const PRUNE_INTERVAL: Duration = Duration::from_secs(60);

/// Result of a rate limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitOutcome {
    Allowed,
    Limited,
    /// Limiter state unavailable; the request is let through.
    Degraded,
}

impl RateLimitOutcome {
    pub fn is_allowed(&self) -> bool {
        !matches!(self, RateLimitOutcome::Limited)
    }

    pub fn as_label(&self) -> &'static str {
        match self {
            RateLimitOutcome::Allowed => "allowed",
            RateLimitOutcome::Limited => "limited",
            RateLimitOutcome::Degraded => "degraded",
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

impl Window {
    fn new(now: Instant) -> Self {
        Self {
            started: now,
            count: 0,
        }
    }

    fn roll(&mut self, now: Instant, length: Duration) {
        if now.saturating_duration_since(self.started) >= length {
            *self = Window::new(now);
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Buckets {
    second: Window,
    hour: Window,
}

impl Buckets {
    fn new(now: Instant) -> Self {
        Self {
            second: Window::new(now),
            hour: Window::new(now),
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.hour.started) >= HOUR
    }

    fn admit(&mut self, now: Instant, per_second: u32, per_hour: u32) -> RateLimitOutcome {
        self.second.roll(now, SECOND);
        self.hour.roll(now, HOUR);

        if self.second.count >= per_second || self.hour.count >= per_hour {
            RateLimitOutcome::Limited
        } else {
            self.second.count += 1;
            self.hour.count += 1;
            RateLimitOutcome::Allowed
        }
    }
}

#[derive(Debug)]
struct Table {
    buckets: HashMap<RateLimitKey, Buckets>,
    overflow: Buckets,
    last_pruned: Instant,
}

impl Table {
    fn prune(&mut self, now: Instant) {
        if self.buckets.len() <= PRUNE_THRESHOLD
            || now.saturating_duration_since(self.last_pruned) < PRUNE_INTERVAL
        {
            return;
        }

        let before = self.buckets.len();
        self.buckets.retain(|_, b| !b.is_expired(now));
        self.last_pruned = now;
        tracing::debug!(
            target: "gate.rate_limiter",
            removed = before - self.buckets.len(),
            remaining = self.buckets.len(),
            "Pruned expired rate limit keys"
        );
    }

    fn bucket_for(&mut self, key: RateLimitKey, now: Instant, max_keys: usize) -> &mut Buckets {
        if !self.buckets.contains_key(&key) && self.buckets.len() >= max_keys {
            tracing::debug!(
                target: "gate.rate_limiter",
                key_kind = key.kind(),
                "Rate limit table full, using overflow bucket"
            );
            return &mut self.overflow;
        }

        self.buckets.entry(key).or_insert_with(|| Buckets::new(now))
    }
}

#[derive(Debug)]
pub struct RateLimiter {
    per_second: u32,
    per_hour: u32,
    max_keys: usize,
    table: Mutex<Table>,
}

impl RateLimiter {
    pub fn new(per_second: u32, per_hour: u32) -> Self {
        let now = Instant::now();
        Self {
            per_second,
            per_hour,
            max_keys: MAX_TRACKED_KEYS,
            table: Mutex::new(Table {
                buckets: HashMap::new(),
                overflow: Buckets::new(now),
                last_pruned: now,
            }),
        }
    }

    /// Override the cap on tracked keys.
    pub fn with_max_keys(mut self, max_keys: usize) -> Self {
        self.max_keys = max_keys;
        self
    }

    pub fn check(&self, key: RateLimitKey) -> RateLimitOutcome {
        self.check_at(key, Instant::now())
    }

    /// Check against an explicit clock reading.
    pub fn check_at(&self, key: RateLimitKey, now: Instant) -> RateLimitOutcome {
        let outcome = match self.table.lock() {
            Ok(mut table) => {
                table.prune(now);
                table
                    .bucket_for(key, now, self.max_keys)
                    .admit(now, self.per_second, self.per_hour)
            }
            Err(_) => {
                tracing::error!(target: "gate.rate_limiter", "Rate limiter lock poisoned, allowing request");
                RateLimitOutcome::Degraded
            }
        };

        record_rate_limit_check(outcome.as_label(), key.kind());
        outcome
    }

    /// Number of keys currently tracked.
    pub fn tracked_keys(&self) -> usize {
        self.table.lock().map(|t| t.buckets.len()).unwrap_or(0)
    }
}

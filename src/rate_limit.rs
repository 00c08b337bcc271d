//! Sliding-log admission control.
//!
//! Each key owns an ordered deque of request timestamps; entries older than
//! the window are dropped on every check, so at most `max` requests for a
//! key are admitted within any window-length interval. Two tiers coexist:
//! requests carrying an `X-API-Key` header use the wider `api_key` tier,
//! everything else is keyed by client address. Denied requests are not
//! recorded. State is process-local; a periodic sweep drops idle keys.

use chrono::{DateTime, SecondsFormat, Utc};
use dashmap::DashMap;
use std::collections::VecDeque;
use std::net::IpAddr;
use std::time::{SystemTime, UNIX_EPOCH};

/// Window and ceiling for requests identified by client address.
pub const IP_LIMIT: (u64, usize) = (60_000, 100);
/// Window and ceiling for requests carrying an API key.
pub const API_KEY_LIMIT: (u64, usize) = (60_000, 1000);

/// Seconds a denied caller is told to wait.
pub const RETRY_AFTER_SECS: u64 = 60;

/// How a request is attributed for admission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientId {
    ApiKey(String),
    Ip(IpAddr),
}

impl ClientId {
    /// Bucket key; tiers use distinct maps so no prefixing is needed, but
    /// the key still names its kind for log lines.
    fn bucket_key(&self) -> String {
        match self {
            ClientId::ApiKey(key) => format!("key:{key}"),
            ClientId::Ip(ip) => format!("ip:{ip}"),
        }
    }
}

/// Successful admission, echoed back as `X-RateLimit-*` response headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Admission {
    pub limit: usize,
    pub remaining: usize,
    /// ISO-8601 instant at which the current window ends.
    pub reset: String,
}

/// Denial outcome; surfaces as HTTP 429.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Rate limit exceeded")]
pub struct RateLimited {
    pub retry_after: u64,
}

/// One sliding-log limiter with a fixed `(window, max)` tuple.
pub struct SlidingWindowLimiter {
    window_ms: u64,
    max: usize,
    buckets: DashMap<String, VecDeque<u64>>,
}

impl SlidingWindowLimiter {
    pub fn new(window_ms: u64, max: usize) -> Self {
        Self {
            window_ms,
            max,
            buckets: DashMap::new(),
        }
    }

    /// Check-and-record for one key. The bucket lock is held only for the
    /// duration of this call, never across dispatch.
    pub fn check(&self, key: &str) -> Result<Admission, RateLimited> {
        self.check_at(key, now_ms())
    }

    fn check_at(&self, key: &str, now_ms: u64) -> Result<Admission, RateLimited> {
        let window_start = now_ms.saturating_sub(self.window_ms);
        let mut bucket = self.buckets.entry(key.to_string()).or_default();

        while let Some(&front) = bucket.front() {
            if front < window_start {
                bucket.pop_front();
            } else {
                break;
            }
        }

        if bucket.len() >= self.max {
            return Err(RateLimited {
                retry_after: RETRY_AFTER_SECS,
            });
        }

        bucket.push_back(now_ms);
        Ok(Admission {
            limit: self.max,
            remaining: self.max - bucket.len(),
            reset: iso8601(now_ms + self.window_ms),
        })
    }

    /// Evicts expired timestamps and removes empty buckets.
    pub fn sweep(&self) {
        self.sweep_at(now_ms());
    }

    fn sweep_at(&self, now_ms: u64) {
        let window_start = now_ms.saturating_sub(self.window_ms);
        self.buckets.retain(|_, bucket| {
            while let Some(&front) = bucket.front() {
                if front < window_start {
                    bucket.pop_front();
                } else {
                    break;
                }
            }
            !bucket.is_empty()
        });
    }

    #[cfg(test)]
    fn tracked_keys(&self) -> usize {
        self.buckets.len()
    }
}

/// The two admission tiers used by the pipeline.
pub struct RateLimiters {
    ip: SlidingWindowLimiter,
    api_key: SlidingWindowLimiter,
}

impl Default for RateLimiters {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimiters {
    pub fn new() -> Self {
        Self {
            ip: SlidingWindowLimiter::new(IP_LIMIT.0, IP_LIMIT.1),
            api_key: SlidingWindowLimiter::new(API_KEY_LIMIT.0, API_KEY_LIMIT.1),
        }
    }

    pub fn admit(&self, client: &ClientId) -> Result<Admission, RateLimited> {
        let limiter = match client {
            ClientId::ApiKey(_) => &self.api_key,
            ClientId::Ip(_) => &self.ip,
        };
        limiter.check(&client.bucket_key())
    }

    pub fn sweep(&self) {
        self.ip.sweep();
        self.api_key.sweep();
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

fn iso8601(unix_ms: u64) -> String {
    DateTime::<Utc>::from_timestamp_millis(unix_ms as i64)
        .unwrap_or_else(|| DateTime::<Utc>::UNIX_EPOCH)
        .to_rfc3339_opts(SecondsFormat::Millis, true)
}

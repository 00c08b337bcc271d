//! Request counters and latency distribution.
//!
//! A [`MetricsRecorder`] is constructed once and passed into the pipeline;
//! there is no module-level state. All mutable counters live behind one
//! mutex so a snapshot can never observe a histogram that disagrees with its
//! totals. Two expositions exist: a Prometheus-style text form on
//! `GET /metrics` and a JSON snapshot on `GET /api/metrics`.

use serde::Serialize;
use std::collections::HashMap;
use std::fmt::Write;
use std::sync::Mutex;
use std::time::Instant;

use crate::timestamp::UnixTimestamp;

/// Histogram bucket upper bounds in milliseconds; a final `+∞` bucket is
/// implicit.
pub const LATENCY_BUCKETS_MS: [u64; 6] = [10, 50, 100, 500, 1000, 5000];

#[derive(Default)]
struct MetricsInner {
    total: u64,
    success: u64,
    errors: u64,
    by_method: HashMap<String, u64>,
    latency_sum_ms: f64,
    /// Cumulative buckets: index i counts samples ≤ `LATENCY_BUCKETS_MS[i]`,
    /// the last slot counts every sample.
    buckets: [u64; 7],
    cache_hits: u64,
    cache_misses: u64,
    signatures_generated: u64,
    signatures_verified: u64,
    signatures_failed: u64,
}

pub struct MetricsRecorder {
    inner: Mutex<MetricsInner>,
    started: Instant,
}

impl Default for MetricsRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(MetricsInner::default()),
            started: Instant::now(),
        }
    }

    pub fn record_request(&self, method: &str, success: bool, latency_ms: f64) {
        let mut inner = self.lock();
        inner.total += 1;
        if success {
            inner.success += 1;
        } else {
            inner.errors += 1;
        }
        *inner.by_method.entry(method.to_string()).or_insert(0) += 1;
        inner.latency_sum_ms += latency_ms;
        for (i, bound) in LATENCY_BUCKETS_MS.iter().enumerate() {
            if latency_ms <= *bound as f64 {
                inner.buckets[i] += 1;
            }
        }
        inner.buckets[6] += 1;
    }

    pub fn record_cache_hit(&self) {
        self.lock().cache_hits += 1;
    }

    pub fn record_cache_miss(&self) {
        self.lock().cache_misses += 1;
    }

    pub fn record_signature_generated(&self) {
        self.lock().signatures_generated += 1;
    }

    pub fn record_signature_verified(&self, success: bool) {
        let mut inner = self.lock();
        if success {
            inner.signatures_verified += 1;
        } else {
            inner.signatures_failed += 1;
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started.elapsed().as_secs()
    }

    /// Prometheus text exposition.
    pub fn render_text(&self) -> String {
        let inner = self.lock();
        let average_seconds = average_ms(&inner) / 1000.0;

        let mut out = String::new();
        let mut counter = |name: &str, help: &str, value: u64| {
            let _ = writeln!(out, "# HELP {name} {help}");
            let _ = writeln!(out, "# TYPE {name} counter");
            let _ = writeln!(out, "{name} {value}");
        };
        counter(
            "ens_compute_requests_total",
            "Total lookup requests processed",
            inner.total,
        );
        counter(
            "ens_compute_requests_success_total",
            "Lookup requests that completed successfully",
            inner.success,
        );
        counter(
            "ens_compute_requests_errors_total",
            "Lookup requests that failed",
            inner.errors,
        );
        counter(
            "ens_compute_cache_hits_total",
            "Compute results served from cache",
            inner.cache_hits,
        );
        counter(
            "ens_compute_cache_misses_total",
            "Compute results that required dispatch",
            inner.cache_misses,
        );
        let _ = writeln!(
            out,
            "# HELP ens_compute_latency_seconds Average request latency in seconds"
        );
        let _ = writeln!(out, "# TYPE ens_compute_latency_seconds gauge");
        let _ = writeln!(out, "ens_compute_latency_seconds {average_seconds}");
        out
    }

    /// Consistent JSON snapshot for `GET /api/metrics`.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let inner = self.lock();
        MetricsSnapshot {
            requests: RequestCounters {
                total: inner.total,
                success: inner.success,
                errors: inner.errors,
                by_method: inner.by_method.clone(),
            },
            latency: LatencyStats {
                average_ms: average_ms(&inner),
                distribution: LatencyDistribution {
                    le_10: inner.buckets[0],
                    le_50: inner.buckets[1],
                    le_100: inner.buckets[2],
                    le_500: inner.buckets[3],
                    le_1000: inner.buckets[4],
                    le_5000: inner.buckets[5],
                    le_inf: inner.buckets[6],
                },
            },
            cache: CacheCounters {
                hits: inner.cache_hits,
                misses: inner.cache_misses,
            },
            signatures: SignatureCounters {
                generated: inner.signatures_generated,
                verified: inner.signatures_verified,
                failed: inner.signatures_failed,
            },
            uptime_seconds: self.uptime_seconds(),
            timestamp: UnixTimestamp::try_now().unwrap_or(UnixTimestamp(0)),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MetricsInner> {
        // A poisoned metrics mutex only means a panic mid-increment; the
        // counters remain usable.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn average_ms(inner: &MetricsInner) -> f64 {
    if inner.total == 0 {
        0.0
    } else {
        inner.latency_sum_ms / inner.total as f64
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub requests: RequestCounters,
    pub latency: LatencyStats,
    pub cache: CacheCounters,
    pub signatures: SignatureCounters,
    #[serde(rename = "uptimeSeconds")]
    pub uptime_seconds: u64,
    pub timestamp: UnixTimestamp,
}

#[derive(Debug, Clone, Serialize)]
pub struct RequestCounters {
    pub total: u64,
    pub success: u64,
    pub errors: u64,
    #[serde(rename = "byMethod")]
    pub by_method: HashMap<String, u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LatencyStats {
    #[serde(rename = "averageMs")]
    pub average_ms: f64,
    pub distribution: LatencyDistribution,
}

/// Cumulative histogram keyed by millisecond upper bound.
#[derive(Debug, Clone, Serialize)]
pub struct LatencyDistribution {
    pub le_10: u64,
    pub le_50: u64,
    pub le_100: u64,
    pub le_500: u64,
    pub le_1000: u64,
    pub le_5000: u64,
    pub le_inf: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CacheCounters {
    pub hits: u64,
    pub misses: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SignatureCounters {
    pub generated: u64,
    pub verified: u64,
    pub failed: u64,
}

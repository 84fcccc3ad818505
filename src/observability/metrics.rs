//! Thread-safe metrics collection system
//!
//! Provides atomic counters and mutex-protected collections for tracking
//! uploads, logins, API traffic and service lifecycle.

use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Global metrics collector instance
pub static METRICS: Lazy<MetricsCollector> = Lazy::new(MetricsCollector::new);

/// Get reference to global metrics collector
pub fn metrics() -> &'static MetricsCollector {
    &METRICS
}

/// Upload timings kept for percentile reporting
const MAX_SAMPLES: usize = 1000;

/// Thread-safe metrics collector using atomics and mutexes
pub struct MetricsCollector {
    // Upload pipeline
    uploads_received: AtomicU64,
    uploads_succeeded: AtomicU64,
    uploads_failed: AtomicU64,
    rows_accepted: AtomicU64,
    rows_rejected: AtomicU64,
    records_inserted: AtomicU64,
    records_updated: AtomicU64,
    upload_times: Mutex<VecDeque<u64>>, // milliseconds, oldest first
    last_upload: AtomicU64,

    // Authentication
    logins_succeeded: AtomicU64,
    logins_failed: AtomicU64,
    sessions_issued: AtomicU64,

    // API traffic, keyed by route label
    route_stats: Mutex<BTreeMap<&'static str, RouteStats>>,

    // Lifecycle
    service_state: Mutex<String>,
    uptime_start: AtomicU64,
    state_transitions: AtomicU64,
    health_status: AtomicBool,
    last_health_check: AtomicU64,
}

#[derive(Debug, Default, Clone, Copy, Serialize)]
pub struct RouteStats {
    pub requests: u64,
    pub errors: u64,
    /// Unix seconds of the latest request
    pub last_request: u64,
}

impl MetricsCollector {
    pub fn new() -> Self {
        let now = current_timestamp();
        Self {
            uploads_received: AtomicU64::new(0),
            uploads_succeeded: AtomicU64::new(0),
            uploads_failed: AtomicU64::new(0),
            rows_accepted: AtomicU64::new(0),
            rows_rejected: AtomicU64::new(0),
            records_inserted: AtomicU64::new(0),
            records_updated: AtomicU64::new(0),
            upload_times: Mutex::new(VecDeque::with_capacity(MAX_SAMPLES)),
            last_upload: AtomicU64::new(0),
            logins_succeeded: AtomicU64::new(0),
            logins_failed: AtomicU64::new(0),
            sessions_issued: AtomicU64::new(0),
            route_stats: Mutex::new(BTreeMap::new()),
            service_state: Mutex::new("initializing".to_string()),
            uptime_start: AtomicU64::new(now),
            state_transitions: AtomicU64::new(0),
            health_status: AtomicBool::new(true),
            last_health_check: AtomicU64::new(now),
        }
    }

    // Upload metrics
    pub fn upload_received(&self) {
        self.uploads_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn upload_succeeded(
        &self,
        rows_accepted: usize,
        rows_rejected: usize,
        inserted: usize,
        updated: usize,
        duration: Duration,
    ) {
        self.uploads_succeeded.fetch_add(1, Ordering::Relaxed);
        self.rows_accepted
            .fetch_add(rows_accepted as u64, Ordering::Relaxed);
        self.rows_rejected
            .fetch_add(rows_rejected as u64, Ordering::Relaxed);
        self.records_inserted
            .fetch_add(inserted as u64, Ordering::Relaxed);
        self.records_updated
            .fetch_add(updated as u64, Ordering::Relaxed);
        self.last_upload.store(current_timestamp(), Ordering::Relaxed);
        self.record_upload_time(duration);
    }

    pub fn upload_failed(&self) {
        self.uploads_failed.fetch_add(1, Ordering::Relaxed);
    }

    fn record_upload_time(&self, duration: Duration) {
        if let Ok(mut times) = self.upload_times.lock() {
            if times.len() == MAX_SAMPLES {
                times.pop_front();
            }
            times.push_back(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX));
        }
    }

    // Authentication metrics
    pub fn login_succeeded(&self) {
        self.logins_succeeded.fetch_add(1, Ordering::Relaxed);
        self.sessions_issued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn login_failed(&self) {
        self.logins_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Count one API request under its route label
    pub fn api_request(&self, route: &'static str, success: bool) {
        if let Ok(mut stats) = self.route_stats.lock() {
            let entry = stats.entry(route).or_default();
            entry.requests += 1;
            entry.last_request = current_timestamp();
            if !success {
                entry.errors += 1;
            }
        }
    }

    // Lifecycle metrics
    pub fn set_service_state(&self, state: &str) {
        if let Ok(mut current_state) = self.service_state.lock() {
            if *current_state != state {
                self.state_transitions.fetch_add(1, Ordering::Relaxed);
                *current_state = state.to_string();
            }
        }
    }

    pub fn update_health_status(&self, healthy: bool) {
        self.health_status.store(healthy, Ordering::Relaxed);
        self.last_health_check
            .store(current_timestamp(), Ordering::Relaxed);
    }

    fn upload_latency(&self) -> LatencySummary {
        self.upload_times
            .lock()
            .map(|times| LatencySummary::of(times.iter().copied()))
            .unwrap_or_default()
    }

    fn api_statistics(&self) -> ApiMetrics {
        let Ok(stats) = self.route_stats.lock() else {
            return ApiMetrics::default();
        };
        ApiMetrics {
            total_requests: stats.values().map(|s| s.requests).sum(),
            total_errors: stats.values().map(|s| s.errors).sum(),
            routes: stats.iter().map(|(route, s)| (route.to_string(), *s)).collect(),
        }
    }

    /// Get complete metrics snapshot
    pub fn get_metrics(&self) -> MetricsSnapshot {
        let now = current_timestamp();

        MetricsSnapshot {
            uploads: UploadMetrics {
                uploads_received: self.uploads_received.load(Ordering::Relaxed),
                uploads_succeeded: self.uploads_succeeded.load(Ordering::Relaxed),
                uploads_failed: self.uploads_failed.load(Ordering::Relaxed),
                rows_accepted: self.rows_accepted.load(Ordering::Relaxed),
                rows_rejected: self.rows_rejected.load(Ordering::Relaxed),
                records_inserted: self.records_inserted.load(Ordering::Relaxed),
                records_updated: self.records_updated.load(Ordering::Relaxed),
                last_upload: self.last_upload.load(Ordering::Relaxed),
                processing_time_ms: self.upload_latency(),
            },
            auth: AuthMetrics {
                logins_succeeded: self.logins_succeeded.load(Ordering::Relaxed),
                logins_failed: self.logins_failed.load(Ordering::Relaxed),
                sessions_issued: self.sessions_issued.load(Ordering::Relaxed),
            },
            api: self.api_statistics(),
            lifecycle: LifecycleMetrics {
                current_state: self
                    .service_state
                    .lock()
                    .map(|s| s.clone())
                    .unwrap_or_else(|_| "unknown".to_string()),
                uptime_seconds: now.saturating_sub(self.uptime_start.load(Ordering::Relaxed)),
                state_transitions: self.state_transitions.load(Ordering::Relaxed),
                healthy: self.health_status.load(Ordering::Relaxed),
                last_health_check: self.last_health_check.load(Ordering::Relaxed),
            },
            timestamp: now,
        }
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

// Public metrics structures
#[derive(Debug, Serialize)]
pub struct MetricsSnapshot {
    pub uploads: UploadMetrics,
    pub auth: AuthMetrics,
    pub api: ApiMetrics,
    pub lifecycle: LifecycleMetrics,
    pub timestamp: u64,
}

#[derive(Debug, Serialize)]
pub struct UploadMetrics {
    pub uploads_received: u64,
    pub uploads_succeeded: u64,
    pub uploads_failed: u64,
    pub rows_accepted: u64,
    pub rows_rejected: u64,
    pub records_inserted: u64,
    pub records_updated: u64,
    /// Unix seconds of the latest successful upload, 0 before the first
    pub last_upload: u64,
    pub processing_time_ms: LatencySummary,
}

/// Mean and interpolated percentiles over a window of samples
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct LatencySummary {
    pub samples: usize,
    pub avg: f64,
    pub p50: f64,
    pub p95: f64,
    pub p99: f64,
}

impl LatencySummary {
    pub fn of(samples: impl IntoIterator<Item = u64>) -> Self {
        let mut sorted: Vec<u64> = samples.into_iter().collect();
        if sorted.is_empty() {
            return Self::default();
        }
        sorted.sort_unstable();
        Self {
            samples: sorted.len(),
            avg: sorted.iter().sum::<u64>() as f64 / sorted.len() as f64,
            p50: percentile(&sorted, 50.0),
            p95: percentile(&sorted, 95.0),
            p99: percentile(&sorted, 99.0),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AuthMetrics {
    pub logins_succeeded: u64,
    pub logins_failed: u64,
    pub sessions_issued: u64,
}

#[derive(Debug, Default, Serialize)]
pub struct ApiMetrics {
    pub routes: BTreeMap<String, RouteStats>,
    pub total_requests: u64,
    pub total_errors: u64,
}

#[derive(Debug, Serialize)]
pub struct LifecycleMetrics {
    pub current_state: String,
    pub uptime_seconds: u64,
    pub state_transitions: u64,
    pub healthy: bool,
    pub last_health_check: u64,
}

// Helper functions
pub(crate) fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Linear interpolation between closest ranks of already sorted data
fn percentile(sorted: &[u64], pct: f64) -> f64 {
    let Some(last) = sorted.len().checked_sub(1) else {
        return 0.0;
    };
    let rank = pct / 100.0 * last as f64;
    let (lower, upper) = (rank.floor() as usize, rank.ceil() as usize);
    let (low, high) = (sorted[lower] as f64, sorted[upper] as f64);
    low + (high - low) * rank.fract()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_upload_metrics() {
        let collector = MetricsCollector::new();

        collector.upload_received();
        collector.upload_succeeded(8, 2, 5, 3, Duration::from_millis(1500));
        collector.upload_received();
        collector.upload_failed();

        let metrics = collector.get_metrics();
        assert_eq!(metrics.uploads.uploads_received, 2);
        assert_eq!(metrics.uploads.uploads_succeeded, 1);
        assert_eq!(metrics.uploads.uploads_failed, 1);
        assert_eq!(metrics.uploads.rows_accepted, 8);
        assert_eq!(metrics.uploads.rows_rejected, 2);
        assert_eq!(metrics.uploads.records_inserted, 5);
        assert_eq!(metrics.uploads.records_updated, 3);
        assert_eq!(metrics.uploads.processing_time_ms.samples, 1);
        assert!(metrics.uploads.last_upload > 0);
        assert_eq!(metrics.uploads.processing_time_ms.avg, 1500.0);
    }

    #[test]
    fn test_auth_metrics() {
        let collector = MetricsCollector::new();

        collector.login_succeeded();
        collector.login_failed();
        collector.login_failed();

        let metrics = collector.get_metrics();
        assert_eq!(metrics.auth.logins_succeeded, 1);
        assert_eq!(metrics.auth.logins_failed, 2);
        assert_eq!(metrics.auth.sessions_issued, 1);
    }

    #[test]
    fn test_route_metrics() {
        let collector = MetricsCollector::new();

        collector.api_request("GET /api/data", true);
        collector.api_request("GET /api/data", false);
        collector.api_request("POST /api/login", true);

        let metrics = collector.get_metrics();
        let data = metrics.api.routes.get("GET /api/data").unwrap();
        assert_eq!(data.requests, 2);
        assert_eq!(data.errors, 1);
        assert_eq!(metrics.api.total_requests, 3);
        assert_eq!(metrics.api.total_errors, 1);
    }

    #[test]
    fn test_thread_safety() {
        let collector = Arc::new(MetricsCollector::new());

        let mut handles = vec![];

        for _ in 0..10 {
            let collector_clone = Arc::clone(&collector);
            let handle = thread::spawn(move || {
                for _ in 0..100 {
                    collector_clone.upload_received();
                    collector_clone.api_request("GET /api/users", true);
                }
            });
            handles.push(handle);
        }

        for handle in handles {
            handle.join().unwrap();
        }

        let metrics = collector.get_metrics();
        assert_eq!(metrics.uploads.uploads_received, 1000);
        assert_eq!(metrics.api.total_requests, 1000);
    }

    #[test]
    fn test_percentile_calculation() {
        let data = vec![1, 2, 3, 4, 5, 6, 7, 8, 9, 10];

        let p50 = percentile(&data, 50.0);
        let p95 = percentile(&data, 95.0);
        let p0 = percentile(&data, 0.0);
        let p100 = percentile(&data, 100.0);

        assert!((p50 - 5.5).abs() < 0.1, "P50: expected ~5.5, got {p50}");
        assert!((p95 - 9.5).abs() < 0.1, "P95: expected ~9.5, got {p95}");
        assert!((p0 - 1.0).abs() < 0.1, "P0: expected ~1.0, got {p0}");
        assert!(
            (p100 - 10.0).abs() < 0.1,
            "P100: expected ~10.0, got {p100}"
        );

        assert_eq!(percentile(&[], 50.0), 0.0);
    }

    #[test]
    fn test_upload_time_bounds() {
        let collector = MetricsCollector::new();

        for i in 0..1500 {
            collector.upload_succeeded(1, 0, 1, 0, Duration::from_millis(i));
        }

        let times = collector.upload_times.lock().unwrap();
        assert_eq!(times.len(), MAX_SAMPLES);
        assert_eq!(times.front(), Some(&500));
        assert_eq!(times.back(), Some(&1499));
    }

    #[test]
    fn test_state_transitions() {
        let collector = MetricsCollector::new();

        collector.set_service_state("running");
        collector.set_service_state("running");
        collector.set_service_state("stopping");

        let metrics = collector.get_metrics();
        assert_eq!(metrics.lifecycle.current_state, "stopping");
        assert_eq!(metrics.lifecycle.state_transitions, 2);
    }

    #[test]
    fn test_latency_summary() {
        let summary = LatencySummary::of([40, 10, 30, 20]);
        assert_eq!(summary.samples, 4);
        assert_eq!(summary.avg, 25.0);
        assert_eq!(summary.p50, 25.0);
        assert_eq!(LatencySummary::of([]), LatencySummary::default());
    }
}

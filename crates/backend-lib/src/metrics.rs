// ============================
// crates/backend-lib/src/metrics.rs
// ============================
//! Metric keys and the in-process request monitor behind `/metrics` and
//! `/health`.
use std::collections::VecDeque;
use std::time::{Duration, Instant};

use chrono::Utc;
use metrics::{counter, histogram};
use parking_lot::Mutex;
use serde::Serialize;

/// Central place for metric keys
pub const HTTP_REQUESTS: &str = "http.requests";
pub const HTTP_ERRORS: &str = "http.errors";
pub const HTTP_RESPONSE_TIME: &str = "http.response_time_ms";
pub const SESSION_CREATED: &str = "session.created";
pub const SESSION_EXPIRED: &str = "session.expired";
pub const SESSION_ACTIVE: &str = "session.active";
pub const LOGIN_SUCCESS: &str = "auth.login.success";
pub const LOGIN_FAILED: &str = "auth.login.failed";
pub const FORM_SUBMITTED: &str = "form.submitted";
pub const BACKUP_CREATED: &str = "backup.created";

/// Response times kept for percentiles
pub const MAX_RESPONSE_TIMES: usize = 1000;
/// Requests slower than this are logged
pub const SLOW_REQUEST: Duration = Duration::from_secs(1);
/// Average response time at which the service reports unhealthy
const UNHEALTHY_AVG_MS: f64 = 1000.0;
/// Error ratio at which the service reports unhealthy
const UNHEALTHY_ERROR_RATE: f64 = 0.05;

#[derive(Debug, Default)]
struct Counters {
    total: u64,
    success: u64,
    error: u64,
    response_times: VecDeque<u64>,
}

impl Counters {
    fn avg_response_time(&self) -> f64 {
        if self.response_times.is_empty() {
            return 0.0;
        }
        self.response_times.iter().sum::<u64>() as f64 / self.response_times.len() as f64
    }

    fn error_rate(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.error as f64 / self.total as f64
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RequestCounters {
    pub total: u64,
    pub success: u64,
    pub error: u64,
    pub avg_response_time: f64,
}

/// Response time distribution in milliseconds
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct ResponseTimeStats {
    pub min: u64,
    pub max: u64,
    pub median: u64,
    pub p95: u64,
    pub p99: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub requests: RequestCounters,
    pub response_times: ResponseTimeStats,
    pub uptime_secs: u64,
    pub uptime: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthChecks {
    pub response_time: bool,
    pub error_rate: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub timestamp: String,
    pub uptime: String,
    pub checks: HealthChecks,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.checks.response_time && self.checks.error_rate
    }
}

/// Request counters and recent response times
pub struct PerformanceMonitor {
    started: Instant,
    counters: Mutex<Counters>,
}

impl Default for PerformanceMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl PerformanceMonitor {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            counters: Mutex::new(Counters::default()),
        }
    }

    /// Record one finished request. 2xx and 3xx count as success.
    pub fn record(&self, method: &str, path: &str, status: u16, elapsed: Duration) {
        let millis = elapsed.as_millis() as u64;
        let is_success = (200..400).contains(&status);
        {
            let mut counters = self.counters.lock();
            counters.total += 1;
            if is_success {
                counters.success += 1;
            } else {
                counters.error += 1;
            }
            counters.response_times.push_back(millis);
            if counters.response_times.len() > MAX_RESPONSE_TIMES {
                counters.response_times.pop_front();
            }
        }

        counter!(HTTP_REQUESTS).increment(1);
        if !is_success {
            counter!(HTTP_ERRORS).increment(1);
        }
        histogram!(HTTP_RESPONSE_TIME).record(millis as f64);

        if elapsed > SLOW_REQUEST {
            tracing::warn!(method, path, status, elapsed_ms = millis, "slow request");
        }
    }

    pub fn uptime(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn response_time_stats(&self) -> ResponseTimeStats {
        let mut sorted: Vec<u64> = self.counters.lock().response_times.iter().copied().collect();
        if sorted.is_empty() {
            return ResponseTimeStats::default();
        }
        sorted.sort_unstable();
        let len = sorted.len();
        let at = |fraction: f64| sorted[((len as f64 * fraction) as usize).min(len - 1)];
        ResponseTimeStats {
            min: sorted[0],
            max: sorted[len - 1],
            median: sorted[len / 2],
            p95: at(0.95),
            p99: at(0.99),
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let requests = {
            let counters = self.counters.lock();
            RequestCounters {
                total: counters.total,
                success: counters.success,
                error: counters.error,
                avg_response_time: counters.avg_response_time(),
            }
        };
        let uptime = self.uptime();
        MetricsSnapshot {
            requests,
            response_times: self.response_time_stats(),
            uptime_secs: uptime.as_secs(),
            uptime: format_uptime(uptime),
        }
    }

    pub fn health(&self) -> HealthReport {
        let checks = {
            let counters = self.counters.lock();
            HealthChecks {
                response_time: counters.avg_response_time() < UNHEALTHY_AVG_MS,
                error_rate: counters.error_rate() < UNHEALTHY_ERROR_RATE,
            }
        };
        let healthy = checks.response_time && checks.error_rate;
        HealthReport {
            status: if healthy { "healthy" } else { "unhealthy" },
            timestamp: Utc::now().to_rfc3339(),
            uptime: format_uptime(self.uptime()),
            checks,
        }
    }

    /// Log a summary of the counters
    pub fn report(&self) {
        let snapshot = self.snapshot();
        tracing::info!(
            total = snapshot.requests.total,
            errors = snapshot.requests.error,
            avg_ms = snapshot.requests.avg_response_time,
            p95_ms = snapshot.response_times.p95,
            uptime = %snapshot.uptime,
            "performance report"
        );
    }
}

/// `1d 2h 3m 4s`
pub fn format_uptime(uptime: Duration) -> String {
    let secs = uptime.as_secs();
    format!(
        "{}d {}h {}m {}s",
        secs / 86_400,
        (secs % 86_400) / 3600,
        (secs % 3600) / 60,
        secs % 60
    )
}

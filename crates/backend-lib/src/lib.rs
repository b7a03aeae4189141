// ============================
// backend-lib/src/lib.rs
// ============================
//! Core backend-lib functionality for the admissions admin server.

pub mod auth;
pub mod backup;
pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod records;
pub mod router;
pub mod storage;
pub mod validation;

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::auth::{AuthManager, AuthRateLimiter, AuthService};
use crate::backup::BackupManager;
use crate::config::Settings;
use crate::metrics::PerformanceMonitor;
use crate::middleware::RateLimiter;
use crate::records::RecordStore;
use crate::storage::Storage;

pub use router::create_router;

/// How often stale rate-limit entries are dropped
const RATE_LIMIT_CLEANUP_INTERVAL: Duration = Duration::from_secs(5 * 60);
/// How often the performance summary is logged
const PERFORMANCE_REPORT_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Application state shared across all handlers
pub struct AppState<S> {
    /// Authentication service
    pub auth: Arc<dyn AuthService>,
    /// Registrations and contacts
    pub records: RecordStore<S>,
    /// Storage backend
    pub storage: S,
    /// Settings the server was started with
    pub settings: Arc<Settings>,
    /// Global per-client limit
    pub rate_limiter: Arc<RateLimiter>,
    /// Limit on public form submissions
    pub form_limiter: Arc<RateLimiter>,
    /// Lockout after failed logins
    pub auth_rate_limiter: AuthRateLimiter,
    pub backups: Arc<BackupManager<S>>,
    pub monitor: Arc<PerformanceMonitor>,
}

impl<S: Storage + Clone + 'static> AppState<S> {
    /// Create a new application state
    pub fn new(storage: S, settings: &Settings) -> anyhow::Result<Self> {
        settings.validate()?;

        let auth: Arc<dyn AuthService> =
            Arc::new(AuthManager::from_settings(storage.clone(), settings)?);
        let limits = &settings.rate_limit;

        Ok(Self {
            auth,
            records: RecordStore::new(storage.clone()),
            backups: Arc::new(BackupManager::new(
                storage.clone(),
                &settings.storage.backup_dir,
                settings.backup.max_backups,
            )),
            storage,
            rate_limiter: Arc::new(RateLimiter::new(
                Duration::from_secs(limits.window_secs),
                limits.max_requests,
            )),
            form_limiter: Arc::new(RateLimiter::new(
                Duration::from_secs(limits.form_window_secs),
                limits.form_max_requests,
            )),
            auth_rate_limiter: AuthRateLimiter::new(
                settings.auth.login_max_attempts,
                settings.auth.login_lockout(),
            ),
            monitor: Arc::new(PerformanceMonitor::new()),
            settings: Arc::new(settings.clone()),
        })
    }

    /// Start the periodic jobs: session cleanup (immediately, then on the
    /// configured interval), the daily backup, rate-limit cleanup and the
    /// performance report.
    pub fn spawn_background_tasks(self: &Arc<Self>) -> Vec<JoinHandle<()>> {
        let mut tasks = Vec::new();

        let state = Arc::clone(self);
        tasks.push(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(state.settings.auth.session_cleanup_interval());
            loop {
                ticker.tick().await;
                match state.auth.cleanup_expired_sessions().await {
                    Ok(removed) => tracing::debug!(removed, "session cleanup finished"),
                    Err(err) => tracing::error!(error = %err, "session cleanup failed"),
                }
            }
        }));

        if let Some(hour) = self.settings.backup.daily_at_hour {
            tasks.push(tokio::spawn(Arc::clone(&self.backups).run_daily(hour)));
        }

        let state = Arc::clone(self);
        tasks.push(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(RATE_LIMIT_CLEANUP_INTERVAL);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                state.rate_limiter.cleanup();
                state.form_limiter.cleanup();
                state.auth_rate_limiter.cleanup();
            }
        }));

        let monitor = Arc::clone(&self.monitor);
        tasks.push(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(PERFORMANCE_REPORT_INTERVAL);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                monitor.report();
            }
        }));

        tasks
    }
}

// ============================
// backend-lib/src/config.rs
// ============================
//! Configuration management.
//!
//! Settings are layered: built-in defaults, then a TOML file, then
//! `DINGFENG_*` environment variables (nested keys split on `__`, e.g.
//! `DINGFENG_AUTH__TOKEN_TTL_SECS`).
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Result};
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::Deserialize;

use crate::auth::PasswordRequirements;

/// Environment variable prefix
pub const ENV_PREFIX: &str = "DINGFENG_";

/// Default config file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "config.toml";

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Application settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Server bind address
    pub bind_addr: SocketAddr,
    /// Log level used when `RUST_LOG` is not set
    pub log_level: String,
    /// Directory with the public site and admin pages
    pub static_dir: Option<PathBuf>,
    /// Allowed CORS origins; empty disables the CORS layer
    pub cors_origins: Vec<String>,
    pub storage: StorageSettings,
    pub auth: AuthSettings,
    pub password_requirements: PasswordRequirements,
    pub rate_limit: RateLimitSettings,
    pub backup: BackupSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Directory holding the JSON collections
    pub data_dir: PathBuf,
    /// Directory receiving timestamped backups
    pub backup_dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthSettings {
    /// HS256 signing secret. Generated and persisted in the data
    /// directory when unset.
    pub jwt_secret: Option<String>,
    /// Token lifetime for a normal login
    pub token_ttl_secs: u64,
    /// Token lifetime when "remember me" is ticked
    pub remember_me_ttl_secs: u64,
    /// How often expired sessions are purged
    pub session_cleanup_interval_secs: u64,
    /// Failed logins allowed per window before a client is locked out
    pub login_max_attempts: u32,
    /// Window in which failed logins are counted; a locked out client waits for it to close
    pub login_lockout_secs: u64,
    /// scrypt cost as log2(N)
    pub password_hash_log_n: u8,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RateLimitSettings {
    /// Global window
    pub window_secs: u64,
    /// Requests allowed per client in the global window
    pub max_requests: u32,
    /// Window for public form submissions
    pub form_window_secs: u64,
    /// Submissions allowed per client in the form window
    pub form_max_requests: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BackupSettings {
    /// Number of backups kept after pruning
    pub max_backups: usize,
    /// Local hour of the daily backup; `None` disables the schedule
    pub daily_at_hour: Option<u32>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            log_level: "info".to_string(),
            static_dir: None,
            cors_origins: Vec::new(),
            storage: StorageSettings::default(),
            auth: AuthSettings::default(),
            password_requirements: PasswordRequirements::default(),
            rate_limit: RateLimitSettings::default(),
            backup: BackupSettings::default(),
        }
    }
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            backup_dir: PathBuf::from("backups"),
        }
    }
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            jwt_secret: None,
            token_ttl_secs: 24 * 60 * 60,
            remember_me_ttl_secs: 7 * 24 * 60 * 60,
            session_cleanup_interval_secs: 60 * 60,
            login_max_attempts: 5,
            login_lockout_secs: 15 * 60,
            password_hash_log_n: crate::auth::password::DEFAULT_HASH_LOG_N,
        }
    }
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            window_secs: 15 * 60,
            max_requests: 1000,
            form_window_secs: 5 * 60,
            form_max_requests: 5,
        }
    }
}

impl Default for BackupSettings {
    fn default() -> Self {
        Self {
            max_backups: 30,
            daily_at_hour: Some(2),
        }
    }
}

impl AuthSettings {
    pub fn token_ttl(&self) -> Duration {
        Duration::from_secs(self.token_ttl_secs)
    }

    pub fn remember_me_ttl(&self) -> Duration {
        Duration::from_secs(self.remember_me_ttl_secs)
    }

    pub fn session_cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.session_cleanup_interval_secs)
    }

    pub fn login_lockout(&self) -> Duration {
        Duration::from_secs(self.login_lockout_secs)
    }
}

impl Settings {
    /// Load settings from `config.toml` (if present) and the environment
    pub fn load() -> Result<Self> {
        Self::load_from(DEFAULT_CONFIG_FILE)
    }

    /// Load settings from the given TOML file (if present) and the environment
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let settings: Settings = Figment::new()
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject settings the server cannot run with
    pub fn validate(&self) -> Result<()> {
        if !LOG_LEVELS.contains(&self.log_level.to_lowercase().as_str()) {
            bail!("invalid log level: {}", self.log_level);
        }
        if self.auth.token_ttl_secs == 0 || self.auth.remember_me_ttl_secs == 0 {
            bail!("token TTLs must be greater than zero");
        }
        if self.auth.session_cleanup_interval_secs == 0 {
            bail!("session cleanup interval must be greater than zero");
        }
        if self.auth.login_max_attempts == 0 {
            bail!("login_max_attempts must be greater than zero");
        }
        if self.auth.password_hash_log_n == 0 || self.auth.password_hash_log_n > 20 {
            bail!("password_hash_log_n must be between 1 and 20");
        }
        if let Some(secret) = &self.auth.jwt_secret {
            if secret.len() < crate::auth::token::MIN_SECRET_LEN {
                bail!(
                    "jwt_secret must be at least {} bytes",
                    crate::auth::token::MIN_SECRET_LEN
                );
            }
        }
        let req = &self.password_requirements;
        if req.min_length < 6 {
            bail!("password min_length must be at least 6");
        }
        if req.min_character_classes == 0 || req.min_character_classes > 4 {
            bail!("password min_character_classes must be between 1 and 4");
        }
        let rl = &self.rate_limit;
        if rl.max_requests == 0 || rl.window_secs == 0 {
            bail!("global rate limit must allow at least one request per window");
        }
        if rl.form_max_requests == 0 || rl.form_window_secs == 0 {
            bail!("form rate limit must allow at least one request per window");
        }
        if self.backup.max_backups == 0 {
            bail!("backup.max_backups must be greater than zero");
        }
        if matches!(self.backup.daily_at_hour, Some(hour) if hour > 23) {
            bail!("backup.daily_at_hour must be between 0 and 23");
        }
        Ok(())
    }

    /// Point every on-disk location at `root`. Used by tests and the
    /// `--data-dir` flag.
    pub fn with_data_root<P: AsRef<Path>>(mut self, root: P) -> Self {
        let root = root.as_ref();
        self.storage.data_dir = root.to_path_buf();
        self.storage.backup_dir = root.join("backups");
        self
    }
}

#[cfg(test)]
mod config_tests;

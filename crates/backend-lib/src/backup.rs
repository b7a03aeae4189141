// ============================
// backend-lib/src/backup.rs
// ============================
//! Timestamped copies of the record collections.
//!
//! Each backup is a directory under the backup root named after the moment
//! it was taken, holding `registrations.json` and `contacts.json`.
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use chrono::{DateTime, Local, Utc};
use dingfeng_common::{BackupInfo, BackupOutcome};
use metrics::counter;
use serde_json::Value;
use tokio::fs;

use crate::error::AppError;
use crate::metrics::BACKUP_CREATED;
use crate::storage::{Collection, Storage};

/// Collections included in a backup
pub const BACKED_UP: [Collection; 2] = [Collection::Registrations, Collection::Contacts];

pub struct BackupManager<S> {
    storage: S,
    backup_dir: PathBuf,
    max_backups: usize,
}

struct BackupDir {
    name: String,
    path: PathBuf,
    modified: SystemTime,
}

impl<S: Storage> BackupManager<S> {
    pub fn new(storage: S, backup_dir: impl Into<PathBuf>, max_backups: usize) -> Self {
        Self {
            storage,
            backup_dir: backup_dir.into(),
            max_backups,
        }
    }

    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    /// Copy the record collections into a new backup, then prune old ones
    pub async fn create(&self) -> Result<BackupOutcome, AppError> {
        let name = Utc::now()
            .to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
            .replace([':', '.'], "-");
        let target = self.backup_dir.join(&name);
        fs::create_dir_all(&target).await?;

        let mut files_count = 0;
        for collection in BACKED_UP {
            let _guard = self.storage.lock(collection).await;
            let source = self.storage.root().join(collection.file_name());
            if fs::try_exists(&source).await? {
                fs::copy(&source, target.join(collection.file_name())).await?;
                files_count += 1;
            }
        }

        tracing::info!(backup = %target.display(), files_count, "backup created");
        counter!(BACKUP_CREATED).increment(1);
        self.prune().await?;

        Ok(BackupOutcome {
            backup_path: Some(target.display().to_string()),
            files_count,
        })
    }

    async fn backup_dirs(&self) -> Result<Vec<BackupDir>, AppError> {
        let mut dirs = Vec::new();
        let mut entries = match fs::read_dir(&self.backup_dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(dirs),
            Err(err) => return Err(err.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            let meta = entry.metadata().await?;
            if !meta.is_dir() {
                continue;
            }
            dirs.push(BackupDir {
                name: entry.file_name().to_string_lossy().into_owned(),
                path: entry.path(),
                modified: meta.modified().unwrap_or(SystemTime::UNIX_EPOCH),
            });
        }
        // Newest first
        dirs.sort_by(|a, b| b.modified.cmp(&a.modified).then_with(|| b.name.cmp(&a.name)));
        Ok(dirs)
    }

    /// Delete backups beyond `max_backups`. Returns how many were removed.
    pub async fn prune(&self) -> Result<usize, AppError> {
        let dirs = self.backup_dirs().await?;
        let mut removed = 0;
        for old in dirs.iter().skip(self.max_backups) {
            fs::remove_dir_all(&old.path).await?;
            tracing::info!(backup = %old.name, "old backup removed");
            removed += 1;
        }
        Ok(removed)
    }

    /// Every backup, newest first
    pub async fn list(&self) -> Result<Vec<BackupInfo>, AppError> {
        let mut out = Vec::new();
        for dir in self.backup_dirs().await? {
            let mut size = 0;
            let mut entries = fs::read_dir(&dir.path).await?;
            while let Some(entry) = entries.next_entry().await? {
                let meta = entry.metadata().await?;
                if meta.is_file() {
                    size += meta.len();
                }
            }
            out.push(BackupInfo {
                timestamp: dir.name,
                date: DateTime::<Utc>::from(dir.modified).to_rfc3339(),
                size: format_bytes(size),
                path: dir.path.display().to_string(),
            });
        }
        Ok(out)
    }

    /// Copy a backup's files back over the live collections
    pub async fn restore(&self, name: &str) -> Result<BackupOutcome, AppError> {
        if name.is_empty() || name.contains(['/', '\\']) || name.contains("..") {
            return Err(AppError::InvalidInput("Invalid backup name".to_string()));
        }
        let source = self.backup_dir.join(name);
        if !fs::try_exists(&source).await? {
            return Err(AppError::NotFound(format!("Backup not found: {name}")));
        }

        let mut files_count = 0;
        for collection in BACKED_UP {
            let file = source.join(collection.file_name());
            if !fs::try_exists(&file).await? {
                continue;
            }
            let content = fs::read_to_string(&file).await?;
            let Value::Array(items) = serde_json::from_str::<Value>(&content)? else {
                return Err(AppError::InvalidInput(format!(
                    "{} in backup {name} is not a JSON array",
                    collection.file_name()
                )));
            };

            let _guard = self.storage.lock(collection).await;
            self.storage.write_collection(collection, &items).await?;
            files_count += 1;
        }

        tracing::info!(backup = name, files_count, "backup restored");
        Ok(BackupOutcome {
            backup_path: None,
            files_count,
        })
    }
}

impl<S: Storage + 'static> BackupManager<S> {
    /// Take a backup every day at `hour` local time. Runs until the task
    /// is dropped.
    pub async fn run_daily(self: Arc<Self>, hour: u32) {
        loop {
            let wait = until_next(Local::now(), hour);
            tracing::info!(in_secs = wait.as_secs(), hour, "next scheduled backup");
            tokio::time::sleep(wait).await;

            if let Err(err) = self.create().await {
                tracing::error!(error = %err, "scheduled backup failed");
            }
        }
    }
}

/// Time from `now` until the next `hour:00` (local time)
fn until_next(now: DateTime<Local>, hour: u32) -> std::time::Duration {
    let today = now.date_naive();
    let next = [today, today + chrono::Duration::days(1)]
        .into_iter()
        .filter_map(|day| day.and_hms_opt(hour, 0, 0))
        .filter_map(|naive| naive.and_local_timezone(Local).earliest())
        .find(|candidate| *candidate > now);

    next.and_then(|next| (next - now).to_std().ok())
        .unwrap_or(std::time::Duration::from_secs(24 * 60 * 60))
}

/// Human readable size, e.g. `1.5 KB`
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];
    if bytes == 0 {
        return "0 Bytes".to_string();
    }
    let mut exp = 0;
    let mut scaled = bytes;
    while scaled >= 1024 && exp < UNITS.len() - 1 {
        scaled /= 1024;
        exp += 1;
    }
    let value = bytes as f64 / 1024f64.powi(exp as i32);
    let formatted = format!("{value:.2}");
    let trimmed = formatted.trim_end_matches('0').trim_end_matches('.');
    format!("{trimmed} {}", UNITS[exp])
}

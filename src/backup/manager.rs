//! Backup manager for Shoebox
//!
//! Names, lists and prunes backup files in the backup directory. Backups are
//! written by the export pipeline; this module decides where they go and how
//! long they stay.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::settings::BackupRetention;
use crate::error::{ShoeboxError, ShoeboxResult};

use super::export::{ExportPipeline, ExportRequest, ExportResult};
use super::schema::BackupFormat;

/// File name prefix used when the caller does not supply one
pub const DEFAULT_PREFIX: &str = "shoebox-backup";

/// Metadata about a backup file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupInfo {
    pub filename: String,
    pub path: PathBuf,
    /// Parsed from the file name, not the file's mtime
    pub created_at: DateTime<Utc>,
    pub size_bytes: u64,
    pub format: BackupFormat,
    /// Made on the first day of a month (kept longer)
    pub is_monthly: bool,
}

/// Manages the backup directory and its retention policy
pub struct BackupManager {
    backup_dir: PathBuf,
    retention: BackupRetention,
}

impl BackupManager {
    pub fn new(backup_dir: PathBuf, retention: BackupRetention) -> Self {
        Self {
            backup_dir,
            retention,
        }
    }

    pub fn backup_dir(&self) -> &PathBuf {
        &self.backup_dir
    }

    /// A fresh path in the backup directory
    ///
    /// `<prefix>-YYYYMMDD-HHMMSS-mmm.<ext>`, with a counter appended if the
    /// name is already taken.
    pub fn next_backup_path(&self, prefix: Option<&str>, format: BackupFormat) -> ShoeboxResult<PathBuf> {
        fs::create_dir_all(&self.backup_dir)?;

        let prefix = prefix.filter(|p| !p.trim().is_empty()).unwrap_or(DEFAULT_PREFIX);
        let now = Utc::now();
        let stem = format!(
            "{}-{}-{:03}",
            prefix,
            now.format("%Y%m%d-%H%M%S"),
            now.timestamp_subsec_millis()
        );

        let mut path = self.backup_dir.join(format!("{}.{}", stem, format.extension()));
        let mut counter = 1;
        while path.exists() {
            path = self
                .backup_dir
                .join(format!("{}-{}.{}", stem, counter, format.extension()));
            counter += 1;
        }
        Ok(path)
    }

    /// Export into a freshly named file in the backup directory
    pub fn create_backup(
        &self,
        pipeline: &ExportPipeline<'_>,
        request: &ExportRequest,
        prefix: Option<&str>,
    ) -> ShoeboxResult<ExportResult> {
        let path = self.next_backup_path(prefix, request.format)?;
        pipeline.export_library(request, &path)
    }

    /// Create a backup and then enforce retention
    pub fn create_backup_with_retention(
        &self,
        pipeline: &ExportPipeline<'_>,
        request: &ExportRequest,
    ) -> ShoeboxResult<(ExportResult, Vec<PathBuf>)> {
        let result = self.create_backup(pipeline, request, None)?;
        let deleted = self.enforce_retention()?;
        Ok((result, deleted))
    }

    /// All recognizable backups, newest first
    pub fn list_backups(&self) -> ShoeboxResult<Vec<BackupInfo>> {
        if !self.backup_dir.exists() {
            return Ok(Vec::new());
        }

        let mut backups = Vec::new();
        for entry in fs::read_dir(&self.backup_dir)? {
            let path = entry?.path();
            if let Some(info) = parse_backup_info(&path) {
                backups.push(info);
            }
        }

        backups.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(backups)
    }

    pub fn get_backup(&self, filename: &str) -> ShoeboxResult<Option<BackupInfo>> {
        let path = self.backup_dir.join(filename);
        if path.is_file() {
            Ok(parse_backup_info(&path))
        } else {
            Ok(None)
        }
    }

    pub fn get_latest_backup(&self) -> ShoeboxResult<Option<BackupInfo>> {
        Ok(self.list_backups()?.into_iter().next())
    }

    /// Delete backups beyond the daily and monthly allowances
    pub fn enforce_retention(&self) -> ShoeboxResult<Vec<PathBuf>> {
        let (monthly, daily): (Vec<_>, Vec<_>) =
            self.list_backups()?.into_iter().partition(|b| b.is_monthly);

        let expired = daily
            .into_iter()
            .skip(self.retention.daily_count as usize)
            .chain(monthly.into_iter().skip(self.retention.monthly_count as usize));

        let mut deleted = Vec::new();
        for backup in expired {
            fs::remove_file(&backup.path).map_err(|e| {
                ShoeboxError::Io(format!("Failed to delete old backup {}: {}", backup.filename, e))
            })?;
            debug!(file = %backup.filename, "deleted expired backup");
            deleted.push(backup.path);
        }

        if !deleted.is_empty() {
            info!(count = deleted.len(), "retention removed old backups");
        }
        Ok(deleted)
    }
}

fn parse_backup_info(path: &Path) -> Option<BackupInfo> {
    let filename = path.file_name()?.to_string_lossy().to_string();
    let format = match path.extension()?.to_str()? {
        "zip" => BackupFormat::Archive,
        "json" => BackupFormat::Json,
        _ => return None,
    };

    let stem = path.file_stem()?.to_string_lossy();
    let created_at = parse_backup_timestamp(&stem)?;
    let size_bytes = fs::metadata(path).ok()?.len();

    Some(BackupInfo {
        filename,
        path: path.to_path_buf(),
        created_at,
        size_bytes,
        format,
        is_monthly: created_at.day() == 1,
    })
}

/// Find `YYYYMMDD-HHMMSS[-mmm]` anywhere in a dash-separated file stem
fn parse_backup_timestamp(stem: &str) -> Option<DateTime<Utc>> {
    let parts: Vec<&str> = stem.split('-').collect();
    let is_digits = |s: &str, len: usize| s.len() == len && s.bytes().all(|b| b.is_ascii_digit());

    let start = parts
        .windows(2)
        .position(|w| is_digits(w[0], 8) && is_digits(w[1], 6))?;
    let date_part = parts[start];
    let time_part = parts[start + 1];
    let millis: u32 = parts
        .get(start + 2)
        .filter(|p| is_digits(p, 3))
        .and_then(|p| p.parse().ok())
        .unwrap_or(0);

    let date = NaiveDate::from_ymd_opt(
        date_part[0..4].parse().ok()?,
        date_part[4..6].parse().ok()?,
        date_part[6..8].parse().ok()?,
    )?;
    let time = NaiveTime::from_hms_milli_opt(
        time_part[0..2].parse().ok()?,
        time_part[2..4].parse().ok()?,
        time_part[4..6].parse().ok()?,
        millis,
    )?;

    Some(DateTime::from_naive_utc_and_offset(NaiveDateTime::new(date, time), Utc))
}

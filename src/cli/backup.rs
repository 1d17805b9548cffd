//! Backup CLI commands
//!
//! Export, inspect, restore and prune backups. Long-running operations render
//! a progress bar fed from the engine's progress channel.

use std::path::PathBuf;
use std::sync::mpsc;
use std::thread;

use chrono::{DateTime, NaiveDate, Utc};
use clap::{Args, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tabled::{settings::Style, Table, Tabled};

use crate::backup::{
    BackupFormat, BackupManager, DateRange, DuplicatePolicy, ExportPipeline, ExportRequest,
    IntegrityValidator, ProgressEvent, ProgressReporter, RestoreEngine, RestoreOptions,
    RestoreStrategy,
};
use crate::config::settings::Settings;
use crate::error::{ShoeboxError, ShoeboxResult};
use crate::storage::Storage;

use super::format_size;

/// Backup subcommands
#[derive(Subcommand)]
pub enum BackupCommands {
    /// Export the library to a backup file
    Export(ExportArgs),

    /// List backups in the backup directory
    List,

    /// Validate a backup and show what it contains
    Info {
        /// Backup filename or path (use 'latest' for most recent)
        backup: String,
        /// Recompute payload checksums
        #[arg(long)]
        verify: bool,
    },

    /// Restore a backup into the library
    Restore {
        /// Backup filename or path (use 'latest' for most recent)
        backup: String,
        /// How to reconcile with the current library
        #[arg(short, long, value_enum, default_value_t = RestoreStrategy::Merge)]
        strategy: RestoreStrategy,
        /// What to do with photos that already exist
        #[arg(short = 'd', long, value_enum, default_value_t = DuplicatePolicy::Skip)]
        on_duplicate: DuplicatePolicy,
        /// Also restore preferences
        #[arg(long)]
        settings: bool,
        /// Skip the confirmation step
        #[arg(short, long)]
        force: bool,
    },

    /// Delete old backups according to the retention policy
    Prune {
        /// Skip the confirmation step
        #[arg(short, long)]
        force: bool,
    },
}

#[derive(Args)]
pub struct ExportArgs {
    /// Output file (defaults to a new file in the backup directory)
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Container format
    #[arg(long, value_enum, default_value_t = BackupFormat::Archive)]
    format: BackupFormat,
    /// File name prefix for backups written to the backup directory
    #[arg(long)]
    prefix: Option<String>,
    /// Only export these categories (repeatable)
    #[arg(short, long = "category")]
    categories: Vec<String>,
    /// Only photos added on or after this date (YYYY-MM-DD)
    #[arg(long)]
    since: Option<NaiveDate>,
    /// Only photos added on or before this date (YYYY-MM-DD)
    #[arg(long)]
    until: Option<NaiveDate>,
    /// Write records only, without photo files
    #[arg(long)]
    no_payloads: bool,
    /// Re-encode JPEG photos at this quality
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=100))]
    quality: Option<u8>,
    /// Include JPEG thumbnails
    #[arg(long)]
    thumbnails: bool,
    /// Apply the retention policy afterwards
    #[arg(long)]
    prune: bool,
}

#[derive(Tabled)]
struct BackupRow {
    #[tabled(rename = "#")]
    index: usize,
    file: String,
    created: String,
    age: String,
    size: String,
    format: String,
    monthly: String,
}

/// Handle a backup command
pub fn handle_backup_command(
    storage: &Storage,
    settings: &Settings,
    cmd: BackupCommands,
    quiet: bool,
) -> ShoeboxResult<()> {
    let paths = storage.paths();
    let manager = BackupManager::new(paths.backup_dir(), settings.backup_retention.clone());
    let files = storage.files();
    let settings_store = storage.settings();

    match cmd {
        BackupCommands::Export(args) => {
            let request = build_request(settings, &args);
            let dest = match args.output {
                Some(path) => path,
                None => manager.next_backup_path(args.prefix.as_deref(), request.format)?,
            };

            let result = with_progress(quiet, |progress| {
                ExportPipeline::new(storage, &files, &settings_store, paths.work_dir())
                    .with_progress(progress)
                    .export_library(&request, &dest)
            })?;

            println!("Backup created: {}", result.path.display());
            println!("{} ({})", result.summary(), format_size(result.size_bytes));
            print_list("Warnings", &result.warnings);

            if args.prune {
                let deleted = manager.enforce_retention()?;
                println!("Pruned {} old backup(s).", deleted.len());
            }
        }

        BackupCommands::List => {
            let backups = manager.list_backups()?;
            if backups.is_empty() {
                println!("No backups found in {}", manager.backup_dir().display());
                println!("Create one with: shoebox backup export");
                return Ok(());
            }

            let now = Utc::now();
            let rows = backups.iter().enumerate().map(|(i, b)| BackupRow {
                index: i + 1,
                file: b.filename.clone(),
                created: b.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                age: format_duration(now.signed_duration_since(b.created_at)),
                size: format_size(b.size_bytes),
                format: b.format.to_string(),
                monthly: if b.is_monthly { "yes".into() } else { String::new() },
            });
            println!("{}", Table::new(rows).with(Style::rounded()));
            println!("Total: {} backup(s)", backups.len());
        }

        BackupCommands::Info { backup, verify } => {
            let path = resolve_backup_path(&manager, &backup)?;
            let report = IntegrityValidator::new().validate(&path, verify);

            println!("File:     {}", path.display());
            println!("Format:   {}", report.format);
            if let Some(version) = report.schema_version {
                println!("Version:  {}", version);
            }
            if let Some(exported_at) = report.exported_at {
                println!("Exported: {}", exported_at.format("%Y-%m-%d %H:%M:%S UTC"));
            }
            if let Some(producer) = &report.producer_version {
                println!("Producer: {}", producer);
            }
            println!("Categories: {}", report.category_count);
            println!("Photos:     {}", report.photo_count);
            println!("Payloads:   {}", if report.has_payloads { "yes" } else { "no" });
            if verify {
                println!(
                    "Integrity:  {}",
                    if report.integrity_passed { "passed" } else { "FAILED" }
                );
            }
            println!();
            println!("Status: {}", report.summary());
            print_list("Warnings", &report.warnings);

            if !report.is_valid {
                return Err(ShoeboxError::InvalidFormat(report.errors.join("; ")));
            }
        }

        BackupCommands::Restore {
            backup,
            strategy,
            on_duplicate,
            settings: restore_settings,
            force,
        } => {
            let path = resolve_backup_path(&manager, &backup)?;

            let report = IntegrityValidator::new().validate(&path, false);
            println!("Backup: {}", path.display());
            println!("Status: {}", report.summary());
            if !report.is_valid {
                return Err(ShoeboxError::InvalidFormat(report.errors.join("; ")));
            }

            if settings.safety.confirm_before_restore && !force {
                println!();
                if strategy == RestoreStrategy::Replace {
                    println!("WARNING: replace removes every photo and custom category first.");
                }
                println!("To proceed, run again with --force:");
                println!("  shoebox backup restore {} --force", backup);
                return Ok(());
            }

            // Safety net: snapshot the current library before touching it
            let snapshot = manager.create_backup(
                &ExportPipeline::new(storage, &files, &settings_store, paths.work_dir()),
                &ExportRequest::from_defaults(&settings.export),
                Some("pre-restore"),
            )?;
            println!("Current library saved to {}", snapshot.path.display());

            let options = RestoreOptions::new(strategy, on_duplicate).with_settings(restore_settings);
            let result = with_progress(quiet, |progress| {
                RestoreEngine::new(storage, &files, &settings_store, paths.work_dir())
                    .with_progress(progress)
                    .restore(&path, &options)
            })?;

            println!("{}", result.summary());
            if result.settings_restored {
                println!("Preferences restored.");
            }
            print_list("Warnings", &result.warnings);
            print_list("Errors", &result.errors);

            if !result.success {
                return Err(ShoeboxError::ImportFailed(format!(
                    "{} item(s) could not be restored",
                    result.errors.len()
                )));
            }
            println!("Restore complete.");
        }

        BackupCommands::Prune { force } => {
            let retention = &settings.backup_retention;
            let backups = manager.list_backups()?;
            let (monthly, daily): (Vec<_>, Vec<_>) = backups.iter().partition(|b| b.is_monthly);

            let to_delete = daily.len().saturating_sub(retention.daily_count as usize)
                + monthly.len().saturating_sub(retention.monthly_count as usize);

            println!(
                "Retention policy: {} daily, {} monthly",
                retention.daily_count, retention.monthly_count
            );
            println!("Current backups: {} daily, {} monthly", daily.len(), monthly.len());

            if to_delete == 0 {
                println!("No backups to prune.");
                return Ok(());
            }

            if !force {
                println!("{} backup(s) would be deleted. Run again with --force.", to_delete);
                return Ok(());
            }

            let deleted = manager.enforce_retention()?;
            println!("Deleted {} backup(s).", deleted.len());
        }
    }

    Ok(())
}

fn build_request(settings: &Settings, args: &ExportArgs) -> ExportRequest {
    let mut request = ExportRequest::from_defaults(&settings.export);
    request.format = args.format;
    request.include_photo_payloads = !args.no_payloads;
    request.include_thumbnails |= args.thumbnails;
    if args.quality.is_some() {
        request.jpeg_quality = args.quality;
    }
    if !args.categories.is_empty() {
        request.filter.category_names = Some(args.categories.clone());
    }
    if args.since.is_some() || args.until.is_some() {
        request.filter.date_range = Some(DateRange::new(
            args.since.and_then(start_of_day),
            args.until.and_then(end_of_day),
        ));
    }
    request
}

fn start_of_day(date: NaiveDate) -> Option<DateTime<Utc>> {
    date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc())
}

fn end_of_day(date: NaiveDate) -> Option<DateTime<Utc>> {
    date.and_hms_milli_opt(23, 59, 59, 999).map(|dt| dt.and_utc())
}

/// Run `op` with a progress bar drawn from its progress events
fn with_progress<T>(quiet: bool, op: impl FnOnce(ProgressReporter) -> T) -> T {
    if quiet {
        return op(ProgressReporter::silent());
    }

    let (tx, rx) = mpsc::channel::<ProgressEvent>();
    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner} {msg}\n[{bar:40.cyan/blue}] {pos}/{len}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );

    let drain = {
        let bar = bar.clone();
        thread::spawn(move || {
            for event in rx {
                bar.set_length(event.total as u64);
                bar.set_position(event.processed as u64);
                bar.set_message(event.stage);
            }
        })
    };

    // The reporter, and with it the sender, is dropped when `op` returns
    let output = op(ProgressReporter::new(tx));
    let _ = drain.join();
    bar.finish_and_clear();
    output
}

fn print_list(title: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    println!();
    println!("{} ({}):", title, items.len());
    for item in items {
        println!("  - {}", item);
    }
}

/// Resolve a backup identifier to a full path
fn resolve_backup_path(manager: &BackupManager, backup: &str) -> ShoeboxResult<PathBuf> {
    if backup.eq_ignore_ascii_case("latest") {
        return manager
            .get_latest_backup()?
            .map(|b| b.path)
            .ok_or_else(|| ShoeboxError::backup_not_found("latest"));
    }

    let path = PathBuf::from(backup);
    if path.exists() {
        return Ok(path);
    }

    let in_dir = manager.backup_dir().join(backup);
    if in_dir.exists() {
        return Ok(in_dir);
    }

    for ext in ["zip", "json"] {
        let with_ext = manager.backup_dir().join(format!("{}.{}", backup, ext));
        if with_ext.exists() {
            return Ok(with_ext);
        }
    }

    Err(ShoeboxError::backup_not_found(backup))
}

/// Format a duration in human-readable form
fn format_duration(duration: chrono::Duration) -> String {
    let minutes = duration.num_minutes();
    match minutes {
        m if m < 1 => format!("{}s", duration.num_seconds().max(0)),
        m if m < 60 => format!("{}m", m),
        m if m < 60 * 24 => format!("{}h", m / 60),
        m if m < 60 * 24 * 30 => format!("{}d", m / (60 * 24)),
        m => format!("{}mo", m / (60 * 24 * 30)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(chrono::Duration::seconds(42)), "42s");
        assert_eq!(format_duration(chrono::Duration::minutes(5)), "5m");
        assert_eq!(format_duration(chrono::Duration::hours(3)), "3h");
        assert_eq!(format_duration(chrono::Duration::days(2)), "2d");
        assert_eq!(format_duration(chrono::Duration::days(65)), "2mo");
    }

    #[test]
    fn test_day_bounds() {
        let date = NaiveDate::from_ymd_opt(2025, 3, 9).unwrap();
        let range = DateRange::new(start_of_day(date), end_of_day(date));
        let noon = date.and_hms_opt(12, 0, 0).unwrap().and_utc();
        let next = NaiveDate::from_ymd_opt(2025, 3, 10)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
            .and_utc();
        assert!(range.contains(&noon));
        assert!(!range.contains(&next));
    }
}

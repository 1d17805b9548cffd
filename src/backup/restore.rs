//! Restore and reconciliation
//!
//! Applies a backup to the live library. Stages run in order and each one
//! is gated on the previous:
//!
//! 1. extract the archive into a fresh directory under the work dir
//! 2. decode and validate the metadata document
//! 3. clear the library (replace strategy only)
//! 4. import categories
//! 5. import photos and their payloads
//! 6. apply settings (optional)
//! 7. remove the extraction directory
//!
//! Anything that fails in stages 1 and 2 aborts before the library is touched.
//! From stage 3 on, failures are collected per item and processing continues.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Component, Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::{ShoeboxError, ShoeboxResult};
use crate::models::{CategoryId, PhotoId};
use crate::storage::{LibraryStore, PhotoFileStore, SettingsStore};

use super::archive::{self, ExtractReport};
use super::progress::{CancellationToken, ProgressReporter};
use super::schema::{
    strip_credentials, BackupCategory, BackupFormat, BackupPhoto, LibraryBackup, ManifestEntry,
    METADATA_ENTRY,
};

/// How the backup is reconciled with the live library
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum RestoreStrategy {
    /// Keep existing records, match categories by name
    #[default]
    Merge,
    /// Clear photo records and non-default categories first, trust backup ids
    Replace,
}

/// What to do when a restored photo lands on an existing path
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum DuplicatePolicy {
    /// Keep the existing photo
    #[default]
    Skip,
    /// Overwrite the existing photo
    Replace,
    /// Store under a new name derived from the photo id
    Rename,
}

/// Parameters of one restore
#[derive(Debug, Clone, Copy, Default)]
pub struct RestoreOptions {
    pub strategy: RestoreStrategy,
    pub duplicate_policy: DuplicatePolicy,
    pub restore_settings: bool,
}

impl RestoreOptions {
    pub fn new(strategy: RestoreStrategy, duplicate_policy: DuplicatePolicy) -> Self {
        Self {
            strategy,
            duplicate_policy,
            restore_settings: false,
        }
    }

    pub fn with_settings(mut self, restore_settings: bool) -> Self {
        self.restore_settings = restore_settings;
        self
    }
}

/// Outcome of a restore that got past validation
#[derive(Debug, Clone, Default)]
pub struct RestoreResult {
    /// No errors were recorded
    pub success: bool,
    pub schema_version: u32,
    pub categories_imported: usize,
    pub categories_updated: usize,
    pub photos_imported: usize,
    pub photos_skipped: usize,
    pub payloads_restored: usize,
    pub settings_restored: bool,
    pub cancelled: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl RestoreResult {
    pub fn summary(&self) -> String {
        format!(
            "{} categories imported ({} updated), {} photos imported, {} skipped, {} payloads restored",
            self.categories_imported,
            self.categories_updated,
            self.photos_imported,
            self.photos_skipped,
            self.payloads_restored
        )
    }

    fn warn(&mut self, message: String) {
        warn!("{}", message);
        self.warnings.push(message);
    }

    fn error(&mut self, message: String) {
        warn!(error = %message, "restore item failed");
        self.errors.push(message);
    }
}

enum PhotoOutcome {
    Imported { payload: bool },
    Skipped,
}

/// What stage 5 needs from the earlier stages
struct ImportPlan<'d> {
    doc: &'d LibraryBackup,
    category_map: HashMap<String, CategoryId>,
    payload_dir: Option<&'d Path>,
    /// Payload files left behind by the replace pre-clear
    released: HashSet<String>,
}

/// Applies backups to the live library
pub struct RestoreEngine<'a> {
    library: &'a dyn LibraryStore,
    files: &'a dyn PhotoFileStore,
    settings: &'a dyn SettingsStore,
    work_dir: PathBuf,
    progress: ProgressReporter,
    cancel: CancellationToken,
}

impl<'a> RestoreEngine<'a> {
    pub fn new(
        library: &'a dyn LibraryStore,
        files: &'a dyn PhotoFileStore,
        settings: &'a dyn SettingsStore,
        work_dir: PathBuf,
    ) -> Self {
        Self {
            library,
            files,
            settings,
            work_dir,
            progress: ProgressReporter::silent(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_progress(mut self, progress: ProgressReporter) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Restore a backup file
    ///
    /// Returns `Err` only for failures that happen before the library is
    /// modified. Later per-item failures are listed in the result.
    pub fn restore(&self, path: &Path, options: &RestoreOptions) -> ShoeboxResult<RestoreResult> {
        info!(
            path = %path.display(),
            strategy = ?options.strategy,
            policy = ?options.duplicate_policy,
            "starting restore"
        );

        fs::create_dir_all(&self.work_dir)?;
        let workspace = tempfile::Builder::new()
            .prefix("restore-")
            .tempdir_in(&self.work_dir)?;

        let outcome = self.run(path, options, workspace.path());

        if let Err(e) = workspace.close() {
            warn!(error = %e, "failed to remove restore workspace");
        }

        let result = outcome?;
        info!(
            success = result.success,
            imported = result.photos_imported,
            skipped = result.photos_skipped,
            errors = result.errors.len(),
            "restore finished"
        );
        Ok(result)
    }

    fn run(&self, path: &Path, options: &RestoreOptions, workspace: &Path) -> ShoeboxResult<RestoreResult> {
        let mut result = RestoreResult::default();

        self.progress.stage("Extracting");
        let (doc, payload_dir, extract_warnings) = self.extract(path, workspace)?;

        self.progress.stage("Validating");
        let doc_warnings = doc.validate()?;
        debug!(version = doc.schema_version, "backup document accepted");

        result.schema_version = doc.schema_version;
        for warning in extract_warnings.into_iter().chain(doc_warnings) {
            result.warn(warning);
        }

        let settings_steps = usize::from(options.restore_settings);
        self.progress
            .set_total(doc.categories.len() + doc.photos.len() + settings_steps);

        if self.cancel.is_cancelled() {
            return Ok(self.cancelled(result));
        }

        let released = match options.strategy {
            RestoreStrategy::Replace => {
                self.progress.stage("Clearing library");
                self.clear_library(&mut result)?
            }
            RestoreStrategy::Merge => HashSet::new(),
        };

        let Some(category_map) = self.import_categories(&doc, options.strategy, &mut result) else {
            return Ok(self.cancelled(result));
        };

        let plan = ImportPlan {
            doc: &doc,
            category_map,
            payload_dir: payload_dir.as_deref(),
            released,
        };

        for photo in &doc.photos {
            if self.cancel.is_cancelled() {
                return Ok(self.cancelled(result));
            }

            match self.import_photo(photo, &plan, options, &mut result) {
                Ok(PhotoOutcome::Imported { payload }) => {
                    result.photos_imported += 1;
                    if payload {
                        result.payloads_restored += 1;
                    }
                }
                Ok(PhotoOutcome::Skipped) => result.photos_skipped += 1,
                Err(e) => result.error(format!("Photo {}: {}", photo.source_path, e)),
            }
            self.progress.step("Importing photos");
        }

        if options.restore_settings {
            self.restore_settings(&doc, &mut result);
            self.progress.step("Restoring settings");
        }

        self.progress.finish("Done");
        result.success = result.errors.is_empty();
        Ok(result)
    }

    /// Stage 1 and the decode half of stage 2
    fn extract(
        &self,
        path: &Path,
        workspace: &Path,
    ) -> ShoeboxResult<(LibraryBackup, Option<PathBuf>, Vec<String>)> {
        match BackupFormat::from_path(path) {
            BackupFormat::Json => {
                let bytes = fs::read(path).map_err(|e| match e.kind() {
                    std::io::ErrorKind::NotFound => ShoeboxError::FileNotFound(path.to_path_buf()),
                    _ => e.into(),
                })?;
                Ok((LibraryBackup::decode(&bytes)?, None, Vec::new()))
            }
            BackupFormat::Archive => {
                let ExtractReport { warnings, .. } = archive::extract_to(path, workspace)?;
                let metadata = workspace.join(METADATA_ENTRY);
                if !metadata.is_file() {
                    return Err(ShoeboxError::InvalidFormat(format!(
                        "archive has no {}",
                        METADATA_ENTRY
                    )));
                }
                let doc = LibraryBackup::decode(&fs::read(metadata)?)?;
                Ok((doc, Some(workspace.to_path_buf()), warnings))
            }
        }
    }

    fn cancelled(&self, mut result: RestoreResult) -> RestoreResult {
        info!("restore cancelled");
        result.cancelled = true;
        result.error("Restore cancelled before completion".into());
        result.success = false;
        result
    }

    /// Stage 3: drop every photo record and every non-default category
    ///
    /// Payload files stay on disk. Their paths are returned so that stage 5
    /// overwrites them instead of treating them as collisions. Only the
    /// initial listing can fail the restore; once records are being deleted,
    /// failures go into the result.
    fn clear_library(&self, result: &mut RestoreResult) -> ShoeboxResult<HashSet<String>> {
        let photos = self.library.list_photos()?;
        let mut released = HashSet::new();

        for photo in photos {
            match self.library.delete_photo(photo.id) {
                Ok(_) => {
                    if photo.has_user_payload() && is_storage_relative(&photo.source_path) {
                        released.insert(photo.source_path);
                    }
                }
                Err(e) => result.error(format!("Could not remove photo {}: {}", photo.source_path, e)),
            }
        }

        match self.library.list_categories() {
            Ok(categories) => {
                for category in categories.into_iter().filter(|c| !c.is_default) {
                    if let Err(e) = self.library.delete_category(category.id) {
                        result.error(format!("Could not remove category '{}': {}", category.name, e));
                    }
                }
            }
            Err(e) => result.error(format!("Could not list categories: {}", e)),
        }

        debug!(kept_files = released.len(), "library cleared for replace");
        Ok(released)
    }

    /// Stage 4. Returns the backup-id to live-id map, or `None` if cancelled.
    fn import_categories(
        &self,
        doc: &LibraryBackup,
        strategy: RestoreStrategy,
        result: &mut RestoreResult,
    ) -> Option<HashMap<String, CategoryId>> {
        let mut map = HashMap::new();

        for backup in &doc.categories {
            if self.cancel.is_cancelled() {
                return None;
            }

            let outcome = match strategy {
                RestoreStrategy::Merge => self.merge_category(backup, result),
                RestoreStrategy::Replace => self.replace_category(backup, result),
            };
            match outcome {
                Ok(id) => {
                    map.insert(backup.id.clone(), id);
                }
                Err(e) => result.error(format!("Category '{}': {}", backup.name, e)),
            }
            self.progress.step("Importing categories");
        }

        Some(map)
    }

    fn merge_category(
        &self,
        backup: &BackupCategory,
        result: &mut RestoreResult,
    ) -> ShoeboxResult<CategoryId> {
        if let Some(mut existing) = self.library.find_category_by_name(&backup.name)? {
            backup.apply_to(&mut existing);
            self.library.update_category(existing.clone())?;
            result.categories_updated += 1;
            result.warn(format!("Category '{}' already exists, updated existing", backup.name));
            return Ok(existing.id);
        }

        let inserted = self.library.insert_category(backup.to_category(CategoryId::new()))?;
        result.categories_imported += 1;
        Ok(inserted.id)
    }

    fn replace_category(
        &self,
        backup: &BackupCategory,
        result: &mut RestoreResult,
    ) -> ShoeboxResult<CategoryId> {
        // Only defaults survive the clear; the backup record takes their place
        if let Some(existing) = self.library.find_category_by_name(&backup.name)? {
            self.library.delete_category(existing.id)?;
        }

        let id = backup.parsed_id().unwrap_or_default();
        let inserted = match self.library.insert_category(backup.to_category(id)) {
            Err(ShoeboxError::Duplicate { .. }) => {
                self.library.insert_category(backup.to_category(CategoryId::new()))?
            }
            other => other?,
        };
        result.categories_imported += 1;
        Ok(inserted.id)
    }

    /// Stage 5 for one photo
    fn import_photo(
        &self,
        backup: &BackupPhoto,
        plan: &ImportPlan<'_>,
        options: &RestoreOptions,
        result: &mut RestoreResult,
    ) -> ShoeboxResult<PhotoOutcome> {
        let category_id = plan.category_map.get(&backup.category_id).copied().ok_or_else(|| {
            ShoeboxError::ImportFailed(format!("category {} was not restored", backup.category_id))
        })?;

        let manifest = plan
            .doc
            .manifest_for(&backup.id)
            .filter(|_| !backup.is_from_bundled_assets);

        let payload = match manifest {
            Some(entry) => {
                let extracted = plan
                    .payload_dir
                    .map(|dir| dir.join(&entry.archive_entry_name))
                    .filter(|p| p.is_file());
                if extracted.is_none() {
                    result.warn(format!(
                        "Payload '{}' is missing, restoring record for {} without it",
                        entry.archive_entry_name, backup.source_path
                    ));
                }
                extracted
            }
            None => None,
        };

        let mut target = restore_target(backup, manifest);
        let writes_payload = payload.is_some();
        let mut displaced = None;

        if self.collides(&target, writes_payload, &plan.released)? {
            match options.duplicate_policy {
                DuplicatePolicy::Skip => {
                    debug!(path = %target, "skipping existing photo");
                    return Ok(PhotoOutcome::Skipped);
                }
                DuplicatePolicy::Replace => {
                    displaced = self.library.find_photo_by_path(&target)?;
                    debug!(path = %target, "replacing existing photo");
                }
                DuplicatePolicy::Rename if backup.is_from_bundled_assets => {
                    debug!(path = %target, "bundled asset already present");
                    return Ok(PhotoOutcome::Skipped);
                }
                DuplicatePolicy::Rename => {
                    let seed = backup.parsed_id().unwrap_or_default();
                    target = self.free_name(&target, seed, writes_payload, &plan.released)?;
                    debug!(path = %target, "renamed colliding photo");
                }
            }
        }

        if let (Some(src), Some(entry)) = (&payload, manifest) {
            self.verify_payload(src, entry, result)?;
            self.files.copy_in(src, &target)?;
        }

        // The displaced record goes only once the new payload is in place
        if let Some(existing) = &displaced {
            self.library.delete_photo(existing.id)?;
        }

        let id = match options.strategy {
            RestoreStrategy::Replace => backup.parsed_id().unwrap_or_default(),
            RestoreStrategy::Merge => PhotoId::new(),
        };
        let photo = backup.to_photo(id, category_id, target);

        let inserted = match self.library.insert_photo(photo.clone()) {
            Err(ShoeboxError::Duplicate { .. }) => {
                let mut fresh = photo;
                fresh.id = PhotoId::new();
                self.library.insert_photo(fresh)
            }
            other => other,
        };

        if let Err(e) = inserted {
            if let Some(existing) = displaced {
                if let Err(restore_err) = self.library.insert_photo(existing) {
                    warn!(error = %restore_err, "could not put back displaced photo record");
                }
            }
            return Err(e);
        }

        Ok(PhotoOutcome::Imported {
            payload: writes_payload,
        })
    }

    fn collides(&self, path: &str, writes_payload: bool, released: &HashSet<String>) -> ShoeboxResult<bool> {
        if self.library.find_photo_by_path(path)?.is_some() {
            return Ok(true);
        }
        Ok(writes_payload && !released.contains(path) && self.files.exists(path))
    }

    fn free_name(
        &self,
        path: &str,
        id: PhotoId,
        writes_payload: bool,
        released: &HashSet<String>,
    ) -> ShoeboxResult<String> {
        let mut attempt = 0;
        loop {
            let candidate = renamed_path(path, id, attempt);
            if !self.collides(&candidate, writes_payload, released)? {
                return Ok(candidate);
            }
            attempt += 1;
        }
    }

    /// Checksum mismatches are warnings; the payload is restored anyway
    fn verify_payload(&self, src: &Path, entry: &ManifestEntry, result: &mut RestoreResult) -> ShoeboxResult<()> {
        let Some(expected) = &entry.checksum else {
            return Ok(());
        };

        let actual = archive::sha256_file(src)?;
        if !actual.eq_ignore_ascii_case(expected) {
            result.warn(
                ShoeboxError::ChecksumMismatch {
                    entry: entry.archive_entry_name.clone(),
                    expected: expected.clone(),
                    actual,
                }
                .to_string(),
            );
        }
        Ok(())
    }

    /// Stage 6
    fn restore_settings(&self, doc: &LibraryBackup, result: &mut RestoreResult) {
        let mut preferences = doc.settings.clone();
        for key in strip_credentials(&mut preferences) {
            result.warn(format!("Ignored credential field '{}' in backup settings", key));
        }

        match self.settings.apply_preferences(&preferences) {
            Ok(ignored) => {
                for key in ignored {
                    result.warn(format!("Ignored unknown setting '{}'", key));
                }
                result.settings_restored = true;
            }
            Err(e) => result.error(format!("Settings: {}", e)),
        }
    }
}

fn is_storage_relative(path: &str) -> bool {
    !path.is_empty()
        && Path::new(path)
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

/// Where a restored photo's payload lives in photo storage
fn restore_target(backup: &BackupPhoto, manifest: Option<&ManifestEntry>) -> String {
    match manifest {
        Some(entry) if is_storage_relative(&entry.original_path) => entry.original_path.clone(),
        Some(entry) => entry.file_name.clone(),
        None => backup.source_path.clone(),
    }
}

/// `dir/name.ext` to `dir/name_<id>.ext`, with a counter after the first try
fn renamed_path(path: &str, id: PhotoId, attempt: usize) -> String {
    let p = Path::new(path);
    let stem = p
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let suffix = match attempt {
        0 => id.short(),
        n => format!("{}_{}", id.short(), n),
    };
    let name = match p.extension() {
        Some(ext) => format!("{}_{}.{}", stem, suffix, ext.to_string_lossy()),
        None => format!("{}_{}", stem, suffix),
    };

    match p.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        Some(parent) => format!("{}/{}", parent.to_string_lossy(), name),
        None => name,
    }
}

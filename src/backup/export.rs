//! Export pipeline
//!
//! Gathers the live library through the collaborator traits, stages photo
//! payloads in a temporary directory under the work dir, writes the metadata
//! document and packs everything with the archive codec. The staging
//! directory is removed on every exit path.

use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat};
use tracing::{debug, info, warn};

use crate::config::settings::ExportDefaults;
use crate::error::{ShoeboxError, ShoeboxResult};
use crate::models::{Category, Photo};
use crate::storage::{LibraryStore, PhotoFileStore, SettingsStore};

use super::archive;
use super::progress::{CancellationToken, ProgressReporter};
use super::schema::{
    is_flat_name, photo_entry_name, strip_credentials, BackupCategory, BackupFormat,
    BackupPhoto, LibraryBackup, ManifestEntry, METADATA_ENTRY, PHOTOS_DIR, THUMBNAILS_DIR,
};

/// Inclusive bounds on photo creation time
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DateRange {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl DateRange {
    pub fn new(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, at: &DateTime<Utc>) -> bool {
        self.start.map_or(true, |s| *at >= s) && self.end.map_or(true, |e| *at <= e)
    }
}

/// Which part of the library to export
#[derive(Debug, Clone, Default)]
pub struct ExportFilter {
    pub date_range: Option<DateRange>,
    /// Category names to keep; `None` keeps all
    pub category_names: Option<Vec<String>>,
}

/// Parameters of one export
#[derive(Debug, Clone)]
pub struct ExportRequest {
    pub filter: ExportFilter,
    pub format: BackupFormat,
    pub include_photo_payloads: bool,
    /// Re-encode JPEG payloads at this quality (1-100)
    pub jpeg_quality: Option<u8>,
    pub include_thumbnails: bool,
    pub thumbnail_size: u32,
    /// Deflate level for the metadata entry
    pub compression_level: Option<i64>,
}

impl Default for ExportRequest {
    fn default() -> Self {
        Self::from_defaults(&ExportDefaults::default())
    }
}

impl ExportRequest {
    /// Build a request from the configured export defaults
    pub fn from_defaults(defaults: &ExportDefaults) -> Self {
        Self {
            filter: ExportFilter::default(),
            format: BackupFormat::Archive,
            include_photo_payloads: true,
            jpeg_quality: defaults.jpeg_quality,
            include_thumbnails: defaults.include_thumbnails,
            thumbnail_size: defaults.thumbnail_size,
            compression_level: Some(defaults.compression_level),
        }
    }
}

/// Outcome of a successful export
#[derive(Debug, Clone)]
pub struct ExportResult {
    pub path: PathBuf,
    pub format: BackupFormat,
    pub categories_exported: usize,
    pub photos_exported: usize,
    pub payloads_included: usize,
    pub thumbnails_included: usize,
    pub size_bytes: u64,
    pub warnings: Vec<String>,
}

impl ExportResult {
    pub fn summary(&self) -> String {
        format!(
            "{} categories, {} photos, {} payloads ({} warnings)",
            self.categories_exported,
            self.photos_exported,
            self.payloads_included,
            self.warnings.len()
        )
    }
}

/// Serializes the library into a backup file
pub struct ExportPipeline<'a> {
    library: &'a dyn LibraryStore,
    files: &'a dyn PhotoFileStore,
    settings: &'a dyn SettingsStore,
    work_dir: PathBuf,
    progress: ProgressReporter,
    cancel: CancellationToken,
}

impl<'a> ExportPipeline<'a> {
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

    /// Export the filtered library to `dest`
    pub fn export_library(&self, request: &ExportRequest, dest: &Path) -> ShoeboxResult<ExportResult> {
        info!(dest = %dest.display(), format = %request.format, "starting export");
        let mut warnings = Vec::new();

        self.progress.stage("Collecting library");
        let categories = self.select_categories(&request.filter, &mut warnings)?;
        let photos = self.select_photos(&categories, &request.filter)?;
        self.progress.set_total(photos.len() + 2);

        let mut doc = LibraryBackup::new(request.format);
        doc.categories = categories.iter().map(BackupCategory::from).collect();
        doc.photos = photos.iter().map(BackupPhoto::from).collect();
        doc.settings = self.settings.preferences()?;
        for key in strip_credentials(&mut doc.settings) {
            debug!(key = %key, "dropped credential key from exported settings");
        }

        let result = match request.format {
            BackupFormat::Json => self.write_json(doc, &photos, dest, warnings)?,
            BackupFormat::Archive => self.write_archive(doc, &photos, request, dest, warnings)?,
        };

        self.progress.finish("Done");
        info!(
            path = %result.path.display(),
            photos = result.photos_exported,
            payloads = result.payloads_included,
            warnings = result.warnings.len(),
            "export finished"
        );
        Ok(result)
    }

    fn select_categories(
        &self,
        filter: &ExportFilter,
        warnings: &mut Vec<String>,
    ) -> ShoeboxResult<Vec<Category>> {
        let all = self.library.list_categories()?;
        let Some(names) = &filter.category_names else {
            return Ok(all);
        };

        for name in names {
            if !all.iter().any(|c| &c.name == name) {
                push_warning(warnings, format!("Category '{}' not found, nothing exported for it", name));
            }
        }

        Ok(all.into_iter().filter(|c| names.contains(&c.name)).collect())
    }

    fn select_photos(&self, categories: &[Category], filter: &ExportFilter) -> ShoeboxResult<Vec<Photo>> {
        let ids: HashSet<_> = categories.iter().map(|c| c.id).collect();
        Ok(self
            .library
            .list_photos()?
            .into_iter()
            .filter(|p| ids.contains(&p.category_id))
            .filter(|p| {
                filter
                    .date_range
                    .as_ref()
                    .map_or(true, |range| range.contains(&p.created_at))
            })
            .collect())
    }

    fn write_json(
        &self,
        doc: LibraryBackup,
        photos: &[Photo],
        dest: &Path,
        warnings: Vec<String>,
    ) -> ShoeboxResult<ExportResult> {
        for _ in photos {
            self.check_cancelled()?;
            self.progress.step("Collecting records");
        }

        self.progress.step("Writing metadata");
        let bytes = doc.encode()?;
        archive::check_free_space(dest.parent().unwrap_or(Path::new(".")), bytes.len() as u64)?;

        let mut file = File::create(dest).map_err(|e| {
            ShoeboxError::ExportFailed(format!("Cannot open {}: {}", dest.display(), e))
        })?;
        if let Err(e) = file.write_all(&bytes).and_then(|_| file.sync_all()) {
            let _ = fs::remove_file(dest);
            return Err(ShoeboxError::ExportFailed(format!(
                "Failed to write {}: {}",
                dest.display(),
                e
            )));
        }

        Ok(ExportResult {
            path: dest.to_path_buf(),
            format: BackupFormat::Json,
            categories_exported: doc.categories.len(),
            photos_exported: doc.photos.len(),
            payloads_included: 0,
            thumbnails_included: 0,
            size_bytes: bytes.len() as u64,
            warnings,
        })
    }

    fn write_archive(
        &self,
        mut doc: LibraryBackup,
        photos: &[Photo],
        request: &ExportRequest,
        dest: &Path,
        mut warnings: Vec<String>,
    ) -> ShoeboxResult<ExportResult> {
        fs::create_dir_all(&self.work_dir)?;
        let staging = tempfile::Builder::new()
            .prefix("export-")
            .tempdir_in(&self.work_dir)?;
        let photos_dir = staging.path().join(PHOTOS_DIR);
        let thumbs_dir = staging.path().join(THUMBNAILS_DIR);
        fs::create_dir_all(&photos_dir)?;

        let mut used_names = HashSet::new();
        let mut thumbnails = 0;

        for photo in photos {
            self.check_cancelled()?;

            if request.include_photo_payloads && photo.has_user_payload() {
                let name = unique_entry_name(photo, &mut used_names);
                let staged = photos_dir.join(&name);

                match self.stage_payload(photo, &staged, request.jpeg_quality, &mut warnings) {
                    Ok(size) => {
                        let checksum = archive::sha256_file(&staged)?;
                        if request.include_thumbnails {
                            fs::create_dir_all(&thumbs_dir)?;
                            match write_thumbnail(&staged, &thumbs_dir.join(&name), request.thumbnail_size) {
                                Ok(()) => thumbnails += 1,
                                Err(e) => push_warning(
                                    &mut warnings,
                                    format!("No thumbnail for {}: {}", photo.source_path, e),
                                ),
                            }
                        }
                        doc.payload_manifest.push(ManifestEntry {
                            photo_id: photo.id.key(),
                            original_path: photo.source_path.clone(),
                            archive_entry_name: photo_entry_name(&name),
                            file_name: name,
                            file_size_bytes: size,
                            checksum: Some(checksum),
                        });
                    }
                    Err(e) => {
                        used_names.remove(&name);
                        let message = match e {
                            ShoeboxError::FileNotFound(_) => {
                                format!("Photo file missing, record kept without payload: {}", photo.source_path)
                            }
                            other => format!("Failed to copy {}: {}", photo.source_path, other),
                        };
                        push_warning(&mut warnings, message);
                    }
                }
            }

            self.progress.step("Copying photos");
        }

        self.progress.step("Writing metadata");
        fs::write(staging.path().join(METADATA_ENTRY), doc.encode()?)?;

        self.check_cancelled()?;
        let size_bytes = archive::write_dir(staging.path(), dest, request.compression_level)
            .map_err(|e| match e {
                ShoeboxError::ExportFailed(_) | ShoeboxError::InsufficientStorage { .. } => e,
                other => ShoeboxError::ExportFailed(other.to_string()),
            })?;
        self.progress.step("Packing archive");

        Ok(ExportResult {
            path: dest.to_path_buf(),
            format: BackupFormat::Archive,
            categories_exported: doc.categories.len(),
            photos_exported: doc.photos.len(),
            payloads_included: doc.payload_manifest.len(),
            thumbnails_included: thumbnails,
            size_bytes,
            warnings,
        })
    }

    /// Copy or re-encode one payload into the staging directory
    fn stage_payload(
        &self,
        photo: &Photo,
        staged: &Path,
        jpeg_quality: Option<u8>,
        warnings: &mut Vec<String>,
    ) -> ShoeboxResult<u64> {
        if !self.files.exists(&photo.source_path) {
            return Err(ShoeboxError::FileNotFound(self.files.resolve(&photo.source_path)));
        }

        if let Some(quality) = jpeg_quality.filter(|_| is_jpeg(&photo.source_path)) {
            match recompress_jpeg(&self.files.resolve(&photo.source_path), staged, quality) {
                Ok(size) => return Ok(size),
                Err(e) => {
                    let _ = fs::remove_file(staged);
                    push_warning(
                        warnings,
                        format!("Could not recompress {}, copied as-is: {}", photo.source_path, e),
                    );
                }
            }
        }

        self.files.copy_out(&photo.source_path, staged)
    }

    fn check_cancelled(&self) -> ShoeboxResult<()> {
        if self.cancel.is_cancelled() {
            info!("export cancelled");
            return Err(ShoeboxError::Cancelled);
        }
        Ok(())
    }
}

fn push_warning(warnings: &mut Vec<String>, message: String) {
    warn!("{}", message);
    warnings.push(message);
}

fn is_jpeg(path: &str) -> bool {
    Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("jpg") || e.eq_ignore_ascii_case("jpeg"))
        .unwrap_or(false)
}

/// Flat archive name for a payload, prefixed with the short id on collision
///
/// File names that would not read back as a flat entry fall back to
/// `<short id>.<ext>`.
fn unique_entry_name(photo: &Photo, used: &mut HashSet<String>) -> String {
    let base = photo
        .file_name()
        .filter(|n| !n.starts_with('.') && is_flat_name(n))
        .unwrap_or_else(|| fallback_entry_name(photo));

    let mut candidate = base.clone();
    let mut counter = 1;
    while used.contains(&candidate) {
        candidate = if counter == 1 {
            format!("{}_{}", photo.id.short(), base)
        } else {
            format!("{}_{}_{}", photo.id.short(), counter, base)
        };
        counter += 1;
    }

    used.insert(candidate.clone());
    candidate
}

fn fallback_entry_name(photo: &Photo) -> String {
    let ext = Path::new(&photo.source_path)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty() && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or("bin");
    format!("{}.{}", photo.id.short(), ext.to_ascii_lowercase())
}

fn recompress_jpeg(src: &Path, dest: &Path, quality: u8) -> ShoeboxResult<u64> {
    let img = image::open(src)?;
    let mut writer = BufWriter::new(File::create(dest)?);
    {
        let mut encoder = JpegEncoder::new_with_quality(&mut writer, quality.clamp(1, 100));
        encoder.encode_image(&img.to_rgb8())?;
    }
    writer.flush()?;
    drop(writer);
    Ok(fs::metadata(dest)?.len())
}

fn write_thumbnail(src: &Path, dest: &Path, size: u32) -> ShoeboxResult<()> {
    let img = image::open(src)?;
    let thumb = DynamicImage::ImageRgb8(img.thumbnail(size, size).to_rgb8());
    let mut writer = BufWriter::new(File::create(dest)?);
    thumb.write_to(&mut writer, ImageFormat::Jpeg)?;
    writer.flush()?;
    Ok(())
}

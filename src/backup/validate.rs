//! Integrity validation
//!
//! Inspects a backup without touching the live library. Used before a
//! restore and for previewing backup files.

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::error::ShoeboxError;

use super::archive::ArchiveReader;
use super::schema::{BackupFormat, LibraryBackup, METADATA_ENTRY};

/// What a validation pass found
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    /// Structure is sound and no fatal error occurred
    pub is_valid: bool,
    pub format: BackupFormat,
    pub schema_version: Option<u32>,
    pub exported_at: Option<DateTime<Utc>>,
    pub producer_version: Option<String>,
    pub category_count: usize,
    pub photo_count: usize,
    pub has_metadata: bool,
    pub has_payloads: bool,
    /// No missing payloads and, when checked, no checksum mismatches
    pub integrity_passed: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn summary(&self) -> String {
        if !self.is_valid {
            return format!("Invalid: {}", self.errors.join("; "));
        }
        let mut summary = format!(
            "Valid (v{}): {} categories, {} photos",
            self.schema_version.unwrap_or_default(),
            self.category_count,
            self.photo_count
        );
        if !self.warnings.is_empty() {
            summary.push_str(&format!(", {} warning(s)", self.warnings.len()));
        }
        summary
    }

    fn fail(&mut self, error: ShoeboxError) {
        warn!(error = %error, "backup failed validation");
        self.is_valid = false;
        self.integrity_passed = false;
        self.errors.push(error.to_string());
    }

    fn warn(&mut self, message: String) {
        warn!("{}", message);
        self.warnings.push(message);
    }
}

/// Non-destructive backup inspection
#[derive(Debug, Default, Clone, Copy)]
pub struct IntegrityValidator;

impl IntegrityValidator {
    pub fn new() -> Self {
        Self
    }

    /// Validate a backup file
    ///
    /// Failures are reported inside the returned report, never as an `Err`.
    pub fn validate(&self, path: &Path, check_payload_integrity: bool) -> ValidationReport {
        let format = BackupFormat::from_path(path);
        let mut report = ValidationReport {
            format,
            integrity_passed: true,
            ..ValidationReport::default()
        };

        match format {
            BackupFormat::Json => self.validate_json(path, &mut report),
            BackupFormat::Archive => self.validate_archive(path, check_payload_integrity, &mut report),
        }

        report.is_valid = report.errors.is_empty();
        debug!(
            path = %path.display(),
            valid = report.is_valid,
            warnings = report.warnings.len(),
            "validation finished"
        );
        report
    }

    fn validate_json(&self, path: &Path, report: &mut ValidationReport) {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return report.fail(ShoeboxError::FileNotFound(path.to_path_buf()))
            }
            Err(e) => return report.fail(e.into()),
        };

        report.has_metadata = true;
        if let Some(doc) = self.check_document(&bytes, report) {
            if !doc.payload_manifest.is_empty() {
                report.integrity_passed = false;
            }
        }
    }

    fn validate_archive(&self, path: &Path, check_integrity: bool, report: &mut ValidationReport) {
        let mut reader = match ArchiveReader::open(path) {
            Ok(reader) => reader,
            Err(e) => return report.fail(e),
        };

        let listing = reader.listing().clone();
        for warning in &listing.warnings {
            report.warnings.push(warning.clone());
        }
        report.has_payloads = listing.photo_count() > 0;
        report.has_metadata = listing.has_metadata();

        if !report.has_metadata {
            return report.fail(ShoeboxError::InvalidFormat(format!(
                "archive has no {}",
                METADATA_ENTRY
            )));
        }

        let bytes = match reader.read(METADATA_ENTRY) {
            Ok(bytes) => bytes,
            Err(e) => return report.fail(e),
        };
        let Some(doc) = self.check_document(&bytes, report) else {
            return;
        };

        for entry in &doc.payload_manifest {
            if !listing.contains(&entry.archive_entry_name) {
                report.integrity_passed = false;
                report.warn(format!(
                    "Payload '{}' for photo {} is missing from the archive",
                    entry.archive_entry_name, entry.photo_id
                ));
                continue;
            }

            let Some(expected) = entry.checksum.as_deref().filter(|_| check_integrity) else {
                continue;
            };

            match reader.checksum(&entry.archive_entry_name) {
                Ok(actual) if actual.eq_ignore_ascii_case(expected) => {}
                Ok(actual) => {
                    report.integrity_passed = false;
                    report.warn(
                        ShoeboxError::ChecksumMismatch {
                            entry: entry.archive_entry_name.clone(),
                            expected: expected.to_string(),
                            actual,
                        }
                        .to_string(),
                    );
                }
                Err(e) => report.fail(e),
            }
        }
    }

    /// Decode and structurally validate the document, filling counts
    fn check_document(&self, bytes: &[u8], report: &mut ValidationReport) -> Option<LibraryBackup> {
        let doc = match LibraryBackup::decode(bytes) {
            Ok(doc) => doc,
            Err(e) => {
                if let ShoeboxError::VersionUnsupported { version, .. } = e {
                    report.schema_version = Some(version);
                }
                report.fail(e);
                return None;
            }
        };

        report.schema_version = Some(doc.schema_version);
        report.exported_at = Some(doc.exported_at());
        report.producer_version = Some(doc.producer_version.clone()).filter(|v| !v.is_empty());
        report.category_count = doc.categories.len();
        report.photo_count = doc.photos.len();

        match doc.validate() {
            Ok(warnings) => {
                for warning in warnings {
                    report.warn(warning);
                }
                Some(doc)
            }
            Err(e) => {
                report.fail(e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::archive::{write, EntrySource};
    use crate::backup::schema::{photo_entry_name, BackupCategory, BackupPhoto, ManifestEntry};
    use crate::models::{Category, Photo};
    use tempfile::TempDir;

    fn document(checksum: Option<String>) -> LibraryBackup {
        let family = Category::new("family");
        let photo = Photo::new("img_1.jpg", family.id);
        let mut doc = LibraryBackup::new(BackupFormat::Archive);
        doc.categories.push(BackupCategory::from(&family));
        doc.photos.push(BackupPhoto::from(&photo));
        doc.payload_manifest.push(ManifestEntry {
            photo_id: photo.id.key(),
            original_path: "img_1.jpg".into(),
            archive_entry_name: photo_entry_name("img_1.jpg"),
            file_name: "img_1.jpg".into(),
            file_size_bytes: 5,
            checksum,
        });
        doc
    }

    fn pack(dir: &Path, doc: &LibraryBackup, payload: Option<&[u8]>) -> std::path::PathBuf {
        let path = dir.join("backup.zip");
        let mut entries = vec![(
            METADATA_ENTRY.to_string(),
            EntrySource::Bytes(doc.encode().unwrap()),
        )];
        if let Some(bytes) = payload {
            entries.push(("photos/img_1.jpg".into(), EntrySource::Bytes(bytes.to_vec())));
        }
        write(&path, &entries, None).unwrap();
        path
    }

    #[test]
    fn test_valid_archive() {
        let temp_dir = TempDir::new().unwrap();
        let checksum = crate::backup::archive::sha256_reader(&mut &b"hello"[..]).unwrap();
        let path = pack(temp_dir.path(), &document(Some(checksum)), Some(b"hello"));

        let report = IntegrityValidator::new().validate(&path, true);
        assert!(report.is_valid, "{:?}", report.errors);
        assert!(report.integrity_passed);
        assert!(report.has_payloads);
        assert_eq!(report.schema_version, Some(2));
        assert_eq!(report.category_count, 1);
        assert_eq!(report.photo_count, 1);
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn test_checksum_mismatch_is_warning() {
        let temp_dir = TempDir::new().unwrap();
        let path = pack(temp_dir.path(), &document(Some("00".repeat(32))), Some(b"hello"));

        let report = IntegrityValidator::new().validate(&path, true);
        assert!(report.is_valid);
        assert!(!report.integrity_passed);
        assert_eq!(report.warnings.len(), 1);

        // Without the integrity pass, checksums are not read
        let report = IntegrityValidator::new().validate(&path, false);
        assert!(report.integrity_passed);
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn test_missing_payload_is_single_warning() {
        let temp_dir = TempDir::new().unwrap();
        let path = pack(temp_dir.path(), &document(None), None);

        let report = IntegrityValidator::new().validate(&path, true);
        assert!(report.is_valid);
        assert!(report.has_metadata);
        assert!(!report.has_payloads);
        assert_eq!(report.warnings.len(), 1);
    }

    #[test]
    fn test_future_version_is_invalid() {
        let temp_dir = TempDir::new().unwrap();
        let mut doc = document(None);
        doc.schema_version = 99;
        let path = pack(temp_dir.path(), &doc, Some(b"hello"));

        let report = IntegrityValidator::new().validate(&path, false);
        assert!(!report.is_valid);
        assert_eq!(report.schema_version, Some(99));
        assert_eq!(report.errors.len(), 1);
    }

    #[test]
    fn test_archive_without_metadata() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("backup.zip");
        write(
            &path,
            &[("photos/a.jpg".into(), EntrySource::Bytes(b"a".to_vec()))],
            None,
        )
        .unwrap();

        let report = IntegrityValidator::new().validate(&path, false);
        assert!(!report.is_valid);
        assert!(!report.has_metadata);
        assert!(report.has_payloads);
    }

    #[test]
    fn test_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let report = IntegrityValidator::new().validate(&temp_dir.path().join("nope.zip"), false);
        assert!(!report.is_valid);
        assert_eq!(report.errors.len(), 1);
    }
}

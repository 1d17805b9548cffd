//! Versioned backup document
//!
//! `LibraryBackup` is the `metadata.json` entry of every archive and the whole
//! content of a JSON-format backup. Field names are camelCase on the wire and
//! unknown fields are ignored, so a newer producer within the supported range
//! still decodes.

use std::collections::{HashMap, HashSet};
use std::path::{Component, Path};

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::config::settings::{Preferences, CREDENTIAL_KEYS};
use crate::error::{ShoeboxError, ShoeboxResult};
use crate::models::{Category, CategoryId, Photo, PhotoId};

/// Oldest document version this build can restore
pub const MIN_SUPPORTED_VERSION: u32 = 1;

/// Newest document version this build can restore
pub const MAX_SUPPORTED_VERSION: u32 = 2;

/// Version written by this build
pub const CURRENT_VERSION: u32 = 2;

/// Name of the metadata document inside an archive
pub const METADATA_ENTRY: &str = "metadata.json";

/// Archive directory holding photo payloads
pub const PHOTOS_DIR: &str = "photos";

/// Archive directory holding optional thumbnails
pub const THUMBNAILS_DIR: &str = "thumbnails";

/// Producer string stamped into new documents
pub fn producer_version() -> String {
    format!("shoebox/{}", env!("CARGO_PKG_VERSION"))
}

/// Container format of a backup file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BackupFormat {
    /// Bare metadata document, no payloads
    Json,
    /// ZIP container with metadata, photos and thumbnails
    #[default]
    Archive,
}

impl BackupFormat {
    /// File extension used for this format
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Archive => "zip",
        }
    }

    /// Detect the format from a file name
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Archive,
        }
    }
}

impl std::fmt::Display for BackupFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Json => write!(f, "JSON"),
            Self::Archive => write!(f, "ARCHIVE"),
        }
    }
}

/// Preference passthrough carried by a backup
pub type BackupSettings = Preferences;

/// Remove credential keys, returning the keys that were present
pub fn strip_credentials(settings: &mut BackupSettings) -> Vec<String> {
    CREDENTIAL_KEYS
        .iter()
        .filter(|key| settings.remove(**key).is_some())
        .map(|key| key.to_string())
        .collect()
}

/// Root backup document
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LibraryBackup {
    pub schema_version: u32,

    /// Epoch milliseconds
    #[serde(default)]
    pub export_timestamp: i64,

    #[serde(default)]
    pub producer_version: String,

    #[serde(default)]
    pub format: BackupFormat,

    #[serde(default)]
    pub categories: Vec<BackupCategory>,

    #[serde(default)]
    pub photos: Vec<BackupPhoto>,

    #[serde(default)]
    pub settings: BackupSettings,

    #[serde(default)]
    pub payload_manifest: Vec<ManifestEntry>,
}

/// Category record inside a backup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupCategory {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub position: i32,
    #[serde(default)]
    pub icon_ref: Option<String>,
    #[serde(default)]
    pub color_hex: Option<String>,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default)]
    pub created_at: i64,
}

/// Photo record inside a backup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupPhoto {
    pub id: String,
    pub source_path: String,
    pub category_id: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub is_from_bundled_assets: bool,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub file_size_bytes: u64,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
}

/// One payload packed into the archive
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestEntry {
    pub photo_id: String,
    pub original_path: String,
    /// Full entry path inside the archive, `photos/<fileName>`
    pub archive_entry_name: String,
    pub file_name: String,
    #[serde(default)]
    pub file_size_bytes: u64,
    /// Lowercase hex SHA-256 of the packed bytes
    #[serde(default)]
    pub checksum: Option<String>,
}

impl ManifestEntry {
    /// Archive path of the thumbnail for this payload
    pub fn thumbnail_entry_name(&self) -> String {
        format!("{}/{}", THUMBNAILS_DIR, self.file_name)
    }
}

/// Build the archive path for a flat payload name
pub fn photo_entry_name(file_name: &str) -> String {
    format!("{}/{}", PHOTOS_DIR, file_name)
}

/// A name that is a single normal path component
pub fn is_flat_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    ) && !name.contains('\\')
}

/// Epoch milliseconds to a UTC timestamp, falling back to the epoch
pub fn millis_to_datetime(millis: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(millis)
        .single()
        .unwrap_or(DateTime::UNIX_EPOCH)
}

impl From<&Category> for BackupCategory {
    fn from(category: &Category) -> Self {
        Self {
            id: category.id.key(),
            name: category.name.clone(),
            display_name: category.display_name.clone(),
            position: category.position,
            icon_ref: category.icon_ref.clone(),
            color_hex: category.color_hex.clone(),
            is_default: category.is_default,
            created_at: category.created_at.timestamp_millis(),
        }
    }
}

impl BackupCategory {
    /// The backup id as a live id, if it is a UUID
    pub fn parsed_id(&self) -> Option<CategoryId> {
        CategoryId::parse(&self.id).ok()
    }

    /// Materialize as a live category with the given id
    pub fn to_category(&self, id: CategoryId) -> Category {
        let created_at = millis_to_datetime(self.created_at);
        Category {
            id,
            name: self.name.clone(),
            display_name: if self.display_name.is_empty() {
                self.name.clone()
            } else {
                self.display_name.clone()
            },
            position: self.position,
            icon_ref: self.icon_ref.clone(),
            color_hex: self.color_hex.clone(),
            is_default: self.is_default,
            created_at,
            updated_at: Utc::now(),
        }
    }

    /// Copy the backup's fields onto an existing category, keeping its id
    pub fn apply_to(&self, existing: &mut Category) {
        if !self.display_name.is_empty() {
            existing.display_name = self.display_name.clone();
        }
        existing.position = self.position;
        existing.icon_ref = self.icon_ref.clone();
        existing.color_hex = self.color_hex.clone();
        existing.updated_at = Utc::now();
    }
}

impl From<&Photo> for BackupPhoto {
    fn from(photo: &Photo) -> Self {
        Self {
            id: photo.id.key(),
            source_path: photo.source_path.clone(),
            category_id: photo.category_id.key(),
            display_name: photo.display_name.clone(),
            is_from_bundled_assets: photo.is_from_bundled_assets,
            created_at: photo.created_at.timestamp_millis(),
            file_size_bytes: photo.file_size_bytes,
            width: photo.width,
            height: photo.height,
        }
    }
}

impl BackupPhoto {
    /// The backup id as a live id, if it is a UUID
    pub fn parsed_id(&self) -> Option<PhotoId> {
        PhotoId::parse(&self.id).ok()
    }

    /// Materialize as a live photo
    pub fn to_photo(&self, id: PhotoId, category_id: CategoryId, source_path: String) -> Photo {
        Photo {
            id,
            source_path,
            category_id,
            display_name: self.display_name.clone(),
            is_from_bundled_assets: self.is_from_bundled_assets,
            created_at: millis_to_datetime(self.created_at),
            file_size_bytes: self.file_size_bytes,
            width: self.width,
            height: self.height,
        }
    }
}

impl LibraryBackup {
    /// Start an empty document at the current version
    pub fn new(format: BackupFormat) -> Self {
        Self {
            schema_version: CURRENT_VERSION,
            export_timestamp: Utc::now().timestamp_millis(),
            producer_version: producer_version(),
            format,
            categories: Vec::new(),
            photos: Vec::new(),
            settings: BackupSettings::new(),
            payload_manifest: Vec::new(),
        }
    }

    /// Export time as a timestamp
    pub fn exported_at(&self) -> DateTime<Utc> {
        millis_to_datetime(self.export_timestamp)
    }

    /// Manifest entry for a photo id
    pub fn manifest_for(&self, photo_id: &str) -> Option<&ManifestEntry> {
        self.payload_manifest.iter().find(|m| m.photo_id == photo_id)
    }

    /// Serialize as pretty JSON
    pub fn encode(&self) -> ShoeboxResult<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    /// Decode a document, checking the version before the full parse
    pub fn decode(bytes: &[u8]) -> ShoeboxResult<Self> {
        let version = peek_version(bytes)?;
        check_version(version)?;

        serde_json::from_slice(bytes)
            .map_err(|e| ShoeboxError::InvalidFormat(format!("Malformed metadata document: {}", e)))
    }

    /// Structural validation
    ///
    /// Returns non-fatal findings as warnings. Broken category references,
    /// duplicate category names or ids and unusable manifest names are errors.
    pub fn validate(&self) -> ShoeboxResult<Vec<String>> {
        check_version(self.schema_version)?;

        let mut warnings = Vec::new();

        let mut category_ids = HashSet::new();
        let mut names = HashSet::new();
        for category in &self.categories {
            if category.name.trim().is_empty() {
                return Err(ShoeboxError::Validation(format!(
                    "Category {} has an empty name",
                    category.id
                )));
            }
            if !names.insert(category.name.as_str()) {
                return Err(ShoeboxError::Validation(format!(
                    "Duplicate category name '{}'",
                    category.name
                )));
            }
            if !category_ids.insert(category.id.as_str()) {
                return Err(ShoeboxError::Validation(format!(
                    "Duplicate category id {}",
                    category.id
                )));
            }
        }

        let mut photo_ids = HashSet::new();
        for photo in &self.photos {
            if !category_ids.contains(photo.category_id.as_str()) {
                return Err(ShoeboxError::Validation(format!(
                    "Photo {} references missing category {}",
                    photo.id, photo.category_id
                )));
            }
            photo_ids.insert(photo.id.as_str());
        }

        let mut entry_names: HashMap<&str, &str> = HashMap::new();
        for entry in &self.payload_manifest {
            let flat = entry
                .archive_entry_name
                .strip_prefix(PHOTOS_DIR)
                .and_then(|rest| rest.strip_prefix('/'))
                .filter(|name| is_flat_name(name));
            if flat.is_none() {
                return Err(ShoeboxError::Validation(format!(
                    "Manifest entry '{}' is not a flat photos/ name",
                    entry.archive_entry_name
                )));
            }
            if let Some(previous) = entry_names.insert(&entry.archive_entry_name, &entry.photo_id) {
                return Err(ShoeboxError::Validation(format!(
                    "Manifest entry '{}' is used by photos {} and {}",
                    entry.archive_entry_name, previous, entry.photo_id
                )));
            }
            if !photo_ids.contains(entry.photo_id.as_str()) {
                warnings.push(format!(
                    "Manifest entry '{}' belongs to unknown photo {}",
                    entry.archive_entry_name, entry.photo_id
                ));
            }
        }

        if self.format == BackupFormat::Json && !self.payload_manifest.is_empty() {
            warnings.push("JSON backup lists payloads it cannot contain".into());
        }

        Ok(warnings)
    }
}

/// Read `schemaVersion` without committing to the full document shape
pub fn peek_version(bytes: &[u8]) -> ShoeboxResult<u32> {
    let value: serde_json::Value = serde_json::from_slice(bytes)
        .map_err(|e| ShoeboxError::InvalidFormat(format!("Metadata is not JSON: {}", e)))?;

    let raw = value
        .get("schemaVersion")
        .ok_or_else(|| ShoeboxError::InvalidFormat("Metadata has no schemaVersion".into()))?;

    raw.as_u64()
        .map(|v| u32::try_from(v).unwrap_or(u32::MAX))
        .ok_or_else(|| {
            ShoeboxError::InvalidFormat(format!("schemaVersion is not a version number: {}", raw))
        })
}

/// Closed-range version gate
pub fn check_version(version: u32) -> ShoeboxResult<()> {
    if (MIN_SUPPORTED_VERSION..=MAX_SUPPORTED_VERSION).contains(&version) {
        Ok(())
    } else {
        Err(ShoeboxError::VersionUnsupported {
            version,
            min: MIN_SUPPORTED_VERSION,
            max: MAX_SUPPORTED_VERSION,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> LibraryBackup {
        let pets = Category::new("pets");
        let photo = Photo::new("rex.jpg", pets.id);

        let mut doc = LibraryBackup::new(BackupFormat::Archive);
        doc.categories.push(BackupCategory::from(&pets));
        doc.photos.push(BackupPhoto::from(&photo));
        doc.payload_manifest.push(ManifestEntry {
            photo_id: photo.id.key(),
            original_path: "rex.jpg".into(),
            archive_entry_name: photo_entry_name("rex.jpg"),
            file_name: "rex.jpg".into(),
            file_size_bytes: 3,
            checksum: None,
        });
        doc
    }

    #[test]
    fn test_version_range() {
        assert!(check_version(MIN_SUPPORTED_VERSION).is_ok());
        assert!(check_version(MAX_SUPPORTED_VERSION).is_ok());
        assert!(matches!(
            check_version(0),
            Err(ShoeboxError::VersionUnsupported { version: 0, .. })
        ));
        assert!(matches!(
            check_version(MAX_SUPPORTED_VERSION + 1),
            Err(ShoeboxError::VersionUnsupported { .. })
        ));
    }

    #[test]
    fn test_decode_rejects_future_version_before_parsing() {
        // Shape is wrong too; the version gate must win
        let bytes = serde_json::to_vec(&json!({
            "schemaVersion": MAX_SUPPORTED_VERSION + 1,
            "categories": "not a list",
        }))
        .unwrap();

        assert!(matches!(
            LibraryBackup::decode(&bytes),
            Err(ShoeboxError::VersionUnsupported { .. })
        ));
    }

    #[test]
    fn test_decode_ignores_unknown_fields() {
        let bytes = serde_json::to_vec(&json!({
            "schemaVersion": 1,
            "categories": [{"id": "c1", "name": "family", "futureField": true}],
            "photos": [],
            "albumCovers": {"c1": "x"},
        }))
        .unwrap();

        let doc = LibraryBackup::decode(&bytes).unwrap();
        assert_eq!(doc.schema_version, 1);
        assert_eq!(doc.categories[0].name, "family");
        assert_eq!(doc.format, BackupFormat::Archive);
    }

    #[test]
    fn test_decode_missing_version_is_invalid_format() {
        let result = LibraryBackup::decode(br#"{"categories": []}"#);
        assert!(matches!(result, Err(ShoeboxError::InvalidFormat(_))));

        let result = LibraryBackup::decode(b"PK\x03\x04garbage");
        assert!(matches!(result, Err(ShoeboxError::InvalidFormat(_))));
    }

    #[test]
    fn test_validate_accepts_consistent_document() {
        let doc = sample();
        assert!(doc.validate().unwrap().is_empty());

        let bytes = doc.encode().unwrap();
        let decoded = LibraryBackup::decode(&bytes).unwrap();
        assert_eq!(decoded.photos, doc.photos);
    }

    #[test]
    fn test_validate_rejects_dangling_category() {
        let mut doc = sample();
        doc.photos[0].category_id = "missing".into();
        assert!(matches!(doc.validate(), Err(ShoeboxError::Validation(_))));
    }

    #[test]
    fn test_validate_rejects_shared_category_id() {
        let mut doc = sample();
        let mut twin = BackupCategory::from(&Category::new("strays"));
        twin.id = doc.categories[0].id.clone();
        doc.categories.push(twin);

        let err = doc.validate().unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().contains("Duplicate category id"));
    }

    #[test]
    fn test_validate_rejects_nested_entry_name() {
        let mut doc = sample();
        doc.payload_manifest[0].archive_entry_name = "photos/sub/rex.jpg".into();
        assert!(doc.validate().unwrap_err().is_validation());

        doc.payload_manifest[0].archive_entry_name = "photos/../rex.jpg".into();
        assert!(doc.validate().unwrap_err().is_validation());
    }

    #[test]
    fn test_validate_rejects_duplicate_entry_name() {
        let mut doc = sample();
        let mut twin = doc.payload_manifest[0].clone();
        twin.photo_id = "other".into();
        doc.payload_manifest.push(twin);
        assert!(doc.validate().unwrap_err().is_validation());
    }

    #[test]
    fn test_orphan_manifest_entry_is_warning() {
        let mut doc = sample();
        doc.payload_manifest[0].photo_id = "ghost".into();
        let warnings = doc.validate().unwrap();
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn test_strip_credentials() {
        let mut settings = BackupSettings::new();
        settings.insert("theme".into(), json!("dark"));
        settings.insert("pinHash".into(), json!("$argon2id$..."));

        let stripped = strip_credentials(&mut settings);
        assert_eq!(stripped, vec!["pinHash".to_string()]);
        assert_eq!(settings.len(), 1);
    }

    #[test]
    fn test_is_flat_name() {
        assert!(is_flat_name("img_1.jpg"));
        assert!(!is_flat_name("a/b.jpg"));
        assert!(!is_flat_name("../b.jpg"));
        assert!(!is_flat_name(""));
        assert!(!is_flat_name("/etc/passwd"));
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(BackupFormat::from_path(Path::new("a.JSON")), BackupFormat::Json);
        assert_eq!(BackupFormat::from_path(Path::new("a.zip")), BackupFormat::Archive);
    }
}

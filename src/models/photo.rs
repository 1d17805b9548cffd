//! Photo model
//!
//! A photo record points at its payload through `source_path`: a path relative
//! to the photo storage directory for user photos, or an asset reference for
//! photos bundled with the app.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use super::ids::{CategoryId, PhotoId};

/// A photo in the library
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Photo {
    /// Unique identifier
    pub id: PhotoId,

    /// Payload location (storage-relative path or bundled asset reference)
    pub source_path: String,

    /// The category this photo belongs to
    pub category_id: CategoryId,

    /// Caption shown in the UI
    #[serde(default)]
    pub display_name: String,

    /// Payload ships inside the app bundle and is never copied
    #[serde(default)]
    pub is_from_bundled_assets: bool,

    /// When the photo was added
    pub created_at: DateTime<Utc>,

    /// Payload size on disk
    #[serde(default)]
    pub file_size_bytes: u64,

    /// Pixel width (0 if unknown)
    #[serde(default)]
    pub width: u32,

    /// Pixel height (0 if unknown)
    #[serde(default)]
    pub height: u32,
}

impl Photo {
    /// Create a new photo record
    pub fn new(source_path: impl Into<String>, category_id: CategoryId) -> Self {
        let source_path = source_path.into();
        let display_name = Path::new(&source_path)
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();

        Self {
            id: PhotoId::new(),
            source_path,
            category_id,
            display_name,
            is_from_bundled_assets: false,
            created_at: Utc::now(),
            file_size_bytes: 0,
            width: 0,
            height: 0,
        }
    }

    /// Create a record for a photo shipped with the app
    pub fn bundled(asset_ref: impl Into<String>, category_id: CategoryId) -> Self {
        let mut photo = Self::new(asset_ref, category_id);
        photo.is_from_bundled_assets = true;
        photo
    }

    /// File name component of the source path
    pub fn file_name(&self) -> Option<String> {
        Path::new(&self.source_path)
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
    }

    /// Whether the payload is a user file that a backup can carry
    pub fn has_user_payload(&self) -> bool {
        !self.is_from_bundled_assets
    }
}

impl fmt::Display for Photo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.display_name.is_empty() {
            write!(f, "{}", self.source_path)
        } else {
            write!(f, "{}", self.display_name)
        }
    }
}

//! Custom error types for Shoebox
//!
//! This module defines the error hierarchy for the library store and the
//! backup engine using thiserror for ergonomic error definitions.

use std::path::PathBuf;

use thiserror::Error;

/// The main error type for Shoebox operations
#[derive(Error, Debug)]
pub enum ShoeboxError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(String),

    /// Validation errors for data models and backup documents
    #[error("Validation error: {0}")]
    Validation(String),

    /// Entity not found errors
    #[error("{entity_type} not found: {identifier}")]
    NotFound {
        entity_type: &'static str,
        identifier: String,
    },

    /// Duplicate entity errors
    #[error("{entity_type} already exists: {identifier}")]
    Duplicate {
        entity_type: &'static str,
        identifier: String,
    },

    /// Storage errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// Settings and credential errors
    #[error("Settings error: {0}")]
    Settings(String),

    /// Backup document schema version outside the supported range
    #[error("Unsupported backup version {version} (supported: {min}..={max})")]
    VersionUnsupported { version: u32, min: u32, max: u32 },

    /// Not a valid archive, or the metadata document is missing/unreadable
    #[error("Invalid backup format: {0}")]
    InvalidFormat(String),

    /// A required file does not exist
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// Archive rejected by a security limit (zip bomb, traversal, size caps)
    #[error("Security violation: {0}")]
    SecurityViolation(String),

    /// Payload re-encoding or archive compression failed
    #[error("Compression failed: {0}")]
    CompressionFailed(String),

    /// Payload bytes do not match the manifest checksum
    #[error("Checksum mismatch for {entry}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        entry: String,
        expected: String,
        actual: String,
    },

    /// Not enough free space at the destination
    #[error("Insufficient storage: need {required} bytes, {available} available")]
    InsufficientStorage { required: u64, available: u64 },

    /// Export could not produce an archive
    #[error("Export failed: {0}")]
    ExportFailed(String),

    /// Restore could not be applied
    #[error("Import failed: {0}")]
    ImportFailed(String),

    /// Operation was cancelled by the caller
    #[error("Operation cancelled")]
    Cancelled,
}

impl ShoeboxError {
    /// Create a "not found" error for categories
    pub fn category_not_found(identifier: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: "Category",
            identifier: identifier.into(),
        }
    }

    /// Create a "not found" error for photos
    pub fn photo_not_found(identifier: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: "Photo",
            identifier: identifier.into(),
        }
    }

    /// Create a "not found" error for backups
    pub fn backup_not_found(identifier: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: "Backup",
            identifier: identifier.into(),
        }
    }

    /// Check if this is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::FileNotFound(_))
    }

    /// Check if this is a validation error
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Errors that must abort a restore before the live store is touched
    pub fn is_fatal_for_restore(&self) -> bool {
        matches!(
            self,
            Self::VersionUnsupported { .. }
                | Self::InvalidFormat(_)
                | Self::SecurityViolation(_)
                | Self::Validation(_)
                | Self::FileNotFound(_)
        )
    }
}

// Implement From traits for common error types

impl From<std::io::Error> for ShoeboxError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for ShoeboxError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}

impl From<zip::result::ZipError> for ShoeboxError {
    fn from(err: zip::result::ZipError) -> Self {
        match err {
            zip::result::ZipError::Io(e) => Self::Io(e.to_string()),
            other => Self::InvalidFormat(other.to_string()),
        }
    }
}

impl From<image::ImageError> for ShoeboxError {
    fn from(err: image::ImageError) -> Self {
        Self::CompressionFailed(err.to_string())
    }
}

/// Result type alias for Shoebox operations
pub type ShoeboxResult<T> = Result<T, ShoeboxError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ShoeboxError::Config("test error".into());
        assert_eq!(err.to_string(), "Configuration error: test error");
    }

    #[test]
    fn test_not_found_error() {
        let err = ShoeboxError::category_not_found("pets");
        assert_eq!(err.to_string(), "Category not found: pets");
        assert!(err.is_not_found());
    }

    #[test]
    fn test_version_error_display() {
        let err = ShoeboxError::VersionUnsupported {
            version: 3,
            min: 1,
            max: 2,
        };
        assert_eq!(
            err.to_string(),
            "Unsupported backup version 3 (supported: 1..=2)"
        );
        assert!(err.is_fatal_for_restore());
    }

    #[test]
    fn test_checksum_mismatch_is_not_fatal() {
        let err = ShoeboxError::ChecksumMismatch {
            entry: "photos/a.jpg".into(),
            expected: "aa".into(),
            actual: "bb".into(),
        };
        assert!(!err.is_fatal_for_restore());
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: ShoeboxError = io_err.into();
        assert!(matches!(err, ShoeboxError::Io(_)));
    }

    #[test]
    fn test_from_zip_error() {
        let err: ShoeboxError = zip::result::ZipError::InvalidArchive("bad".into()).into();
        assert!(matches!(err, ShoeboxError::InvalidFormat(_)));
    }
}

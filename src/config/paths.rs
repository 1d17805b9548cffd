//! Path management for Shoebox
//!
//! Provides platform-aware path resolution for settings, library data,
//! photo payloads, backups and scratch space.
//!
//! ## Path Resolution Order
//!
//! 1. `SHOEBOX_DATA_DIR` environment variable (if set)
//! 2. The platform config directory reported by `directories`
//!    (`~/.config/shoebox` on Linux, `~/Library/Application Support/...` on macOS,
//!    `%APPDATA%\...` on Windows)

use std::path::PathBuf;

use directories::ProjectDirs;

use crate::error::ShoeboxError;

/// Environment variable that overrides the base directory
pub const DATA_DIR_ENV: &str = "SHOEBOX_DATA_DIR";

/// Manages all paths used by Shoebox
#[derive(Debug, Clone)]
pub struct ShoeboxPaths {
    /// Base directory for all Shoebox data
    base_dir: PathBuf,
}

impl ShoeboxPaths {
    /// Create a new ShoeboxPaths instance
    ///
    /// # Errors
    ///
    /// Returns an error if no home directory can be determined.
    pub fn new() -> Result<Self, ShoeboxError> {
        let base_dir = if let Ok(custom) = std::env::var(DATA_DIR_ENV) {
            PathBuf::from(custom)
        } else {
            resolve_default_path()?
        };

        Ok(Self { base_dir })
    }

    /// Create ShoeboxPaths with a custom base directory (useful for testing)
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Get the base directory
    pub fn base_dir(&self) -> &PathBuf {
        &self.base_dir
    }

    /// Get the library data directory (categories and photo records)
    pub fn data_dir(&self) -> PathBuf {
        self.base_dir.join("data")
    }

    /// Get the directory holding photo payload files
    pub fn photos_dir(&self) -> PathBuf {
        self.base_dir.join("photos")
    }

    /// Get the backup directory
    pub fn backup_dir(&self) -> PathBuf {
        self.base_dir.join("backups")
    }

    /// Get the scratch directory used for export staging and restore extraction
    pub fn work_dir(&self) -> PathBuf {
        self.base_dir.join("tmp")
    }

    /// Get the path to the settings file
    pub fn settings_file(&self) -> PathBuf {
        self.base_dir.join("settings.json")
    }

    /// Get the path to categories.json
    pub fn categories_file(&self) -> PathBuf {
        self.data_dir().join("categories.json")
    }

    /// Get the path to photos.json
    pub fn photos_file(&self) -> PathBuf {
        self.data_dir().join("photos.json")
    }

    /// Ensure all required directories exist
    pub fn ensure_directories(&self) -> Result<(), ShoeboxError> {
        for (label, dir) in [
            ("base", self.base_dir.clone()),
            ("data", self.data_dir()),
            ("photos", self.photos_dir()),
            ("backup", self.backup_dir()),
            ("work", self.work_dir()),
        ] {
            std::fs::create_dir_all(&dir).map_err(|e| {
                ShoeboxError::Io(format!("Failed to create {} directory: {}", label, e))
            })?;
        }

        Ok(())
    }

    /// Check if Shoebox has been initialized (settings file exists)
    pub fn is_initialized(&self) -> bool {
        self.settings_file().exists()
    }
}

/// Resolve the default base directory for this platform
fn resolve_default_path() -> Result<PathBuf, ShoeboxError> {
    ProjectDirs::from("org", "shoebox", "shoebox")
        .map(|dirs| dirs.config_dir().to_path_buf())
        .ok_or_else(|| ShoeboxError::Config("Could not determine home directory".into()))
}

//! Collaborator interfaces consumed by the backup engine
//!
//! The export pipeline, integrity validator and restore engine never touch
//! persistence directly. They work against these three traits, which the
//! storage layer implements for the on-disk library and tests may implement
//! however they like.

use std::path::{Path, PathBuf};

use crate::config::settings::Preferences;
use crate::error::ShoeboxResult;
use crate::models::{Category, CategoryId, Photo, PhotoId};

/// Category and photo records of the live library
///
/// The store is treated as a single-writer resource while a restore is running.
pub trait LibraryStore {
    /// All categories, ordered by position then name
    fn list_categories(&self) -> ShoeboxResult<Vec<Category>>;

    /// All photos, ordered by creation time
    fn list_photos(&self) -> ShoeboxResult<Vec<Photo>>;

    /// Insert a new category. Fails with `Duplicate` on an existing id or name.
    fn insert_category(&self, category: Category) -> ShoeboxResult<Category>;

    /// Replace an existing category. Fails with `NotFound` if the id is unknown.
    fn update_category(&self, category: Category) -> ShoeboxResult<()>;

    /// Delete a category, returning whether it existed
    fn delete_category(&self, id: CategoryId) -> ShoeboxResult<bool>;

    /// Insert a new photo. Fails with `Duplicate` on an existing id.
    fn insert_photo(&self, photo: Photo) -> ShoeboxResult<Photo>;

    /// Replace an existing photo. Fails with `NotFound` if the id is unknown.
    fn update_photo(&self, photo: Photo) -> ShoeboxResult<()>;

    /// Delete a photo record, returning whether it existed
    fn delete_photo(&self, id: PhotoId) -> ShoeboxResult<bool>;

    /// Case-sensitive lookup by category name
    fn find_category_by_name(&self, name: &str) -> ShoeboxResult<Option<Category>>;

    /// Lookup by exact `source_path`
    fn find_photo_by_path(&self, path: &str) -> ShoeboxResult<Option<Photo>>;
}

/// Location of photo payload bytes
pub trait PhotoFileStore {
    /// On-disk location of a photo's `source_path`
    fn resolve(&self, source_path: &str) -> PathBuf;

    /// Whether the payload exists
    fn exists(&self, source_path: &str) -> bool {
        self.resolve(source_path).is_file()
    }

    /// Size of the payload in bytes
    fn size(&self, source_path: &str) -> ShoeboxResult<u64>;

    /// Copy a payload out to `dest`, returning bytes copied
    fn copy_out(&self, source_path: &str, dest: &Path) -> ShoeboxResult<u64>;

    /// Copy `src` into storage under `source_path`, overwriting, returning bytes copied
    fn copy_in(&self, src: &Path, source_path: &str) -> ShoeboxResult<u64>;

    /// Remove a payload, returning whether it existed
    fn remove(&self, source_path: &str) -> ShoeboxResult<bool>;
}

/// The non-secret preference fields a backup carries
pub trait SettingsStore {
    /// Current preferences. Never contains credential material.
    fn preferences(&self) -> ShoeboxResult<Preferences>;

    /// Apply preferences, returning the keys that were ignored
    fn apply_preferences(&self, preferences: &Preferences) -> ShoeboxResult<Vec<String>>;
}

//! Storage layer for Shoebox
//!
//! Provides JSON file storage with atomic writes for the live library and
//! the implementations of the collaborator traits the backup engine uses.

pub mod categories;
pub mod file_io;
pub mod files;
pub mod init;
pub mod photos;
pub mod settings;
pub mod traits;

pub use categories::CategoryRepository;
pub use file_io::{read_json, write_json_atomic};
pub use files::LocalPhotoFiles;
pub use init::initialize_storage;
pub use photos::PhotoRepository;
pub use settings::SettingsFile;
pub use traits::{LibraryStore, PhotoFileStore, SettingsStore};

use crate::config::paths::ShoeboxPaths;
use crate::error::{ShoeboxError, ShoeboxResult};
use crate::models::{Category, CategoryId, Photo, PhotoId};

/// Main storage coordinator that provides access to all repositories
pub struct Storage {
    paths: ShoeboxPaths,
    pub categories: CategoryRepository,
    pub photos: PhotoRepository,
}

impl Storage {
    /// Create a new Storage instance
    pub fn new(paths: ShoeboxPaths) -> Result<Self, ShoeboxError> {
        paths.ensure_directories()?;

        Ok(Self {
            categories: CategoryRepository::new(paths.categories_file()),
            photos: PhotoRepository::new(paths.photos_file()),
            paths,
        })
    }

    /// Create a Storage instance and load everything from disk
    pub fn open(paths: ShoeboxPaths) -> Result<Self, ShoeboxError> {
        let storage = Self::new(paths)?;
        storage.load_all()?;
        Ok(storage)
    }

    /// Get the paths configuration
    pub fn paths(&self) -> &ShoeboxPaths {
        &self.paths
    }

    /// Payload store rooted at the photo directory
    pub fn files(&self) -> LocalPhotoFiles {
        LocalPhotoFiles::new(self.paths.photos_dir())
    }

    /// Settings store over settings.json
    pub fn settings(&self) -> SettingsFile {
        SettingsFile::new(self.paths.clone())
    }

    /// Load all data from disk
    pub fn load_all(&self) -> Result<(), ShoeboxError> {
        self.categories.load()?;
        self.photos.load()?;
        Ok(())
    }

    /// Save all data to disk
    pub fn save_all(&self) -> Result<(), ShoeboxError> {
        self.categories.save()?;
        self.photos.save()?;
        Ok(())
    }

    /// Check if storage has been initialized
    pub fn is_initialized(&self) -> bool {
        self.paths.is_initialized()
    }
}

impl LibraryStore for Storage {
    fn list_categories(&self) -> ShoeboxResult<Vec<Category>> {
        self.categories.get_all()
    }

    fn list_photos(&self) -> ShoeboxResult<Vec<Photo>> {
        self.photos.get_all()
    }

    fn insert_category(&self, category: Category) -> ShoeboxResult<Category> {
        category
            .validate()
            .map_err(|e| ShoeboxError::Validation(e.to_string()))?;

        if self.categories.get(category.id)?.is_some() {
            return Err(ShoeboxError::Duplicate {
                entity_type: "Category",
                identifier: category.id.to_string(),
            });
        }
        if self.categories.get_by_name(&category.name)?.is_some() {
            return Err(ShoeboxError::Duplicate {
                entity_type: "Category",
                identifier: category.name.clone(),
            });
        }

        self.categories.upsert(category.clone())?;
        self.categories.save()?;
        Ok(category)
    }

    fn update_category(&self, category: Category) -> ShoeboxResult<()> {
        category
            .validate()
            .map_err(|e| ShoeboxError::Validation(e.to_string()))?;

        if self.categories.get(category.id)?.is_none() {
            return Err(ShoeboxError::category_not_found(category.id.to_string()));
        }
        if let Some(existing) = self.categories.get_by_name(&category.name)? {
            if existing.id != category.id {
                return Err(ShoeboxError::Duplicate {
                    entity_type: "Category",
                    identifier: category.name.clone(),
                });
            }
        }

        self.categories.upsert(category)?;
        self.categories.save()
    }

    fn delete_category(&self, id: CategoryId) -> ShoeboxResult<bool> {
        let removed = self.categories.delete(id)?;
        if removed {
            self.categories.save()?;
        }
        Ok(removed)
    }

    fn insert_photo(&self, photo: Photo) -> ShoeboxResult<Photo> {
        if self.photos.get(photo.id)?.is_some() {
            return Err(ShoeboxError::Duplicate {
                entity_type: "Photo",
                identifier: photo.id.to_string(),
            });
        }
        if self.categories.get(photo.category_id)?.is_none() {
            return Err(ShoeboxError::category_not_found(photo.category_id.to_string()));
        }

        self.photos.upsert(photo.clone())?;
        self.photos.save()?;
        Ok(photo)
    }

    fn update_photo(&self, photo: Photo) -> ShoeboxResult<()> {
        if self.photos.get(photo.id)?.is_none() {
            return Err(ShoeboxError::photo_not_found(photo.id.to_string()));
        }

        self.photos.upsert(photo)?;
        self.photos.save()
    }

    fn delete_photo(&self, id: PhotoId) -> ShoeboxResult<bool> {
        let removed = self.photos.delete(id)?;
        if removed {
            self.photos.save()?;
        }
        Ok(removed)
    }

    fn find_category_by_name(&self, name: &str) -> ShoeboxResult<Option<Category>> {
        self.categories.get_by_name(name)
    }

    fn find_photo_by_path(&self, path: &str) -> ShoeboxResult<Option<Photo>> {
        self.photos.get_by_path(path)
    }
}

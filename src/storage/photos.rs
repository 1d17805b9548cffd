//! Photo repository for JSON storage
//!
//! Manages loading and saving photo records to photos.json

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::RwLock;

use crate::error::ShoeboxError;
use crate::models::{CategoryId, Photo, PhotoId};

use super::file_io::{read_json, write_json_atomic};

/// Serializable photo data structure
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct PhotoData {
    pub photos: Vec<Photo>,
}

/// Repository for photo record persistence
pub struct PhotoRepository {
    path: PathBuf,
    photos: RwLock<HashMap<PhotoId, Photo>>,
}

impl PhotoRepository {
    /// Create a new photo repository
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            photos: RwLock::new(HashMap::new()),
        }
    }

    /// Load photos from disk
    pub fn load(&self) -> Result<(), ShoeboxError> {
        let file_data: PhotoData = read_json(&self.path)?;

        let mut photos = self
            .photos
            .write()
            .map_err(|e| ShoeboxError::Storage(format!("Failed to acquire write lock: {}", e)))?;

        photos.clear();
        for photo in file_data.photos {
            photos.insert(photo.id, photo);
        }

        Ok(())
    }

    /// Save photos to disk
    pub fn save(&self) -> Result<(), ShoeboxError> {
        let file_data = PhotoData {
            photos: self.get_all()?,
        };

        write_json_atomic(&self.path, &file_data)
    }

    /// Get a photo by ID
    pub fn get(&self, id: PhotoId) -> Result<Option<Photo>, ShoeboxError> {
        let photos = self
            .photos
            .read()
            .map_err(|e| ShoeboxError::Storage(format!("Failed to acquire read lock: {}", e)))?;

        Ok(photos.get(&id).cloned())
    }

    /// Get all photos ordered by creation time
    pub fn get_all(&self) -> Result<Vec<Photo>, ShoeboxError> {
        let photos = self
            .photos
            .read()
            .map_err(|e| ShoeboxError::Storage(format!("Failed to acquire read lock: {}", e)))?;

        let mut list: Vec<_> = photos.values().cloned().collect();
        list.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.source_path.cmp(&b.source_path))
        });
        Ok(list)
    }

    /// Get photos in a category
    pub fn get_by_category(&self, category_id: CategoryId) -> Result<Vec<Photo>, ShoeboxError> {
        Ok(self
            .get_all()?
            .into_iter()
            .filter(|p| p.category_id == category_id)
            .collect())
    }

    /// Get a photo by its exact source path
    pub fn get_by_path(&self, source_path: &str) -> Result<Option<Photo>, ShoeboxError> {
        let photos = self
            .photos
            .read()
            .map_err(|e| ShoeboxError::Storage(format!("Failed to acquire read lock: {}", e)))?;

        Ok(photos.values().find(|p| p.source_path == source_path).cloned())
    }

    /// Insert or update a photo
    pub fn upsert(&self, photo: Photo) -> Result<(), ShoeboxError> {
        let mut photos = self
            .photos
            .write()
            .map_err(|e| ShoeboxError::Storage(format!("Failed to acquire write lock: {}", e)))?;

        photos.insert(photo.id, photo);
        Ok(())
    }

    /// Delete a photo record
    pub fn delete(&self, id: PhotoId) -> Result<bool, ShoeboxError> {
        let mut photos = self
            .photos
            .write()
            .map_err(|e| ShoeboxError::Storage(format!("Failed to acquire write lock: {}", e)))?;

        Ok(photos.remove(&id).is_some())
    }

    /// Count photos
    pub fn count(&self) -> Result<usize, ShoeboxError> {
        let photos = self
            .photos
            .read()
            .map_err(|e| ShoeboxError::Storage(format!("Failed to acquire read lock: {}", e)))?;
        Ok(photos.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_repo() -> (TempDir, PhotoRepository) {
        let temp_dir = TempDir::new().unwrap();
        let repo = PhotoRepository::new(temp_dir.path().join("photos.json"));
        (temp_dir, repo)
    }

    #[test]
    fn test_upsert_and_lookup_by_path() {
        let (_temp_dir, repo) = create_test_repo();
        let photo = Photo::new("img_1.jpg", CategoryId::new());
        let id = photo.id;
        repo.upsert(photo).unwrap();

        assert_eq!(repo.get_by_path("img_1.jpg").unwrap().unwrap().id, id);
        assert!(repo.get_by_path("img_2.jpg").unwrap().is_none());
    }

    #[test]
    fn test_get_by_category() {
        let (_temp_dir, repo) = create_test_repo();
        let pets = CategoryId::new();
        let family = CategoryId::new();
        repo.upsert(Photo::new("a.jpg", pets)).unwrap();
        repo.upsert(Photo::new("b.jpg", pets)).unwrap();
        repo.upsert(Photo::new("c.jpg", family)).unwrap();

        assert_eq!(repo.get_by_category(pets).unwrap().len(), 2);
        assert_eq!(repo.get_by_category(family).unwrap().len(), 1);
    }

    #[test]
    fn test_save_and_reload() {
        let (temp_dir, repo) = create_test_repo();
        repo.upsert(Photo::new("a.jpg", CategoryId::new())).unwrap();
        repo.save().unwrap();

        let repo2 = PhotoRepository::new(temp_dir.path().join("photos.json"));
        repo2.load().unwrap();
        assert_eq!(repo2.count().unwrap(), 1);
    }
}

//! Photo payload storage on the local filesystem
//!
//! User photos live under the `photos/` directory and are addressed by a
//! storage-relative `source_path`. Absolute paths are accepted for reading
//! (photos that were linked rather than copied), but writes always stay
//! inside the storage root.

use std::fs::{self, File};
use std::path::{Component, Path, PathBuf};

use crate::error::{ShoeboxError, ShoeboxResult};

use super::file_io::copy_atomic;
use super::traits::PhotoFileStore;

/// `PhotoFileStore` rooted at a directory
#[derive(Debug, Clone)]
pub struct LocalPhotoFiles {
    root: PathBuf,
}

impl LocalPhotoFiles {
    /// Create a file store rooted at `root`
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// The storage root
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn writable_path(&self, source_path: &str) -> ShoeboxResult<PathBuf> {
        let relative = Path::new(source_path);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));

        if source_path.is_empty() || escapes {
            return Err(ShoeboxError::SecurityViolation(format!(
                "refusing to write outside photo storage: {}",
                source_path
            )));
        }

        Ok(self.root.join(relative))
    }
}

impl PhotoFileStore for LocalPhotoFiles {
    fn resolve(&self, source_path: &str) -> PathBuf {
        let path = Path::new(source_path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    fn size(&self, source_path: &str) -> ShoeboxResult<u64> {
        let path = self.resolve(source_path);
        fs::metadata(&path)
            .map(|m| m.len())
            .map_err(|_| ShoeboxError::FileNotFound(path))
    }

    fn copy_out(&self, source_path: &str, dest: &Path) -> ShoeboxResult<u64> {
        let path = self.resolve(source_path);
        let mut file = File::open(&path).map_err(|_| ShoeboxError::FileNotFound(path.clone()))?;
        copy_atomic(&mut file, dest)
    }

    fn copy_in(&self, src: &Path, source_path: &str) -> ShoeboxResult<u64> {
        let dest = self.writable_path(source_path)?;
        let mut file =
            File::open(src).map_err(|_| ShoeboxError::FileNotFound(src.to_path_buf()))?;
        copy_atomic(&mut file, dest)
    }

    fn remove(&self, source_path: &str) -> ShoeboxResult<bool> {
        let path = self.writable_path(source_path)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(ShoeboxError::Io(format!(
                "Failed to remove {}: {}",
                path.display(),
                e
            ))),
        }
    }
}

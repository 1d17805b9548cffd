#![allow(dead_code)]

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use shoebox::backup::{
    ExportPipeline, ExportRequest, ExportResult, RestoreEngine, RestoreOptions, RestoreResult,
};
use shoebox::config::paths::ShoeboxPaths;
use shoebox::models::Photo;
use shoebox::storage::{initialize_storage, LibraryStore, SettingsStore, Storage};
use shoebox::ShoeboxResult;
use tempfile::TempDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// An initialized library in its own temp directory
pub struct TestLibrary {
    pub dir: TempDir,
    pub storage: Storage,
}

/// Comparable view of a library, independent of ids
#[derive(Debug, PartialEq, Eq)]
pub struct Snapshot {
    pub categories: Vec<(String, String, bool)>,
    pub photos: Vec<(String, String, String)>,
    pub payloads: BTreeMap<String, Vec<u8>>,
}

impl TestLibrary {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let paths = ShoeboxPaths::with_base_dir(dir.path().join("library"));
        initialize_storage(&paths).unwrap();
        let storage = Storage::open(paths).unwrap();
        Self { dir, storage }
    }

    /// A library with no categories at all
    pub fn empty() -> Self {
        let dir = TempDir::new().unwrap();
        let paths = ShoeboxPaths::with_base_dir(dir.path().join("library"));
        let storage = Storage::open(paths).unwrap();
        Self { dir, storage }
    }

    pub fn add_photo(&self, category: &str, name: &str, bytes: &[u8]) -> Photo {
        let category = self
            .storage
            .find_category_by_name(category)
            .unwrap()
            .unwrap();
        fs::write(self.storage.paths().photos_dir().join(name), bytes).unwrap();
        let mut photo = Photo::new(name, category.id);
        photo.file_size_bytes = bytes.len() as u64;
        self.storage.insert_photo(photo).unwrap()
    }

    pub fn export_to(&self, name: &str, request: &ExportRequest) -> ExportResult {
        let dest = self.dir.path().join(name);
        let files = self.storage.files();
        let settings = self.storage.settings();
        ExportPipeline::new(&self.storage, &files, &settings, self.work_dir())
            .export_library(request, &dest)
            .unwrap()
    }

    pub fn export(&self) -> PathBuf {
        self.export_to("backup.zip", &ExportRequest::default()).path
    }

    pub fn restore(&self, path: &Path, options: RestoreOptions) -> ShoeboxResult<RestoreResult> {
        let files = self.storage.files();
        let settings = self.storage.settings();
        RestoreEngine::new(&self.storage, &files, &settings, self.work_dir()).restore(path, &options)
    }

    pub fn work_dir(&self) -> PathBuf {
        self.storage.paths().work_dir()
    }

    pub fn payload(&self, source_path: &str) -> Option<Vec<u8>> {
        fs::read(self.storage.paths().photos_dir().join(source_path)).ok()
    }

    pub fn preferences(&self) -> BTreeMap<String, serde_json::Value> {
        self.storage.settings().preferences().unwrap()
    }

    pub fn snapshot(&self) -> Snapshot {
        let all_categories = self.storage.list_categories().unwrap();
        let mut categories: Vec<_> = all_categories
            .iter()
            .map(|c| (c.name.clone(), c.display_name.clone(), c.is_default))
            .collect();
        categories.sort();

        let mut photos = Vec::new();
        let mut payloads = BTreeMap::new();
        for photo in self.storage.list_photos().unwrap() {
            let category = all_categories
                .iter()
                .find(|c| c.id == photo.category_id)
                .map(|c| c.name.clone())
                .unwrap_or_default();
            if let Some(bytes) = self.payload(&photo.source_path) {
                payloads.insert(photo.source_path.clone(), bytes);
            }
            photos.push((photo.source_path, category, photo.display_name));
        }
        photos.sort();

        Snapshot {
            categories,
            photos,
            payloads,
        }
    }

    /// Whether any restore or export workspace is left behind
    pub fn work_dir_is_empty(&self) -> bool {
        fs::read_dir(self.work_dir())
            .map(|mut entries| entries.next().is_none())
            .unwrap_or(true)
    }
}

/// Write a ZIP with stored (uncompressed) entries
pub fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
    let mut zip = ZipWriter::new(File::create(path).unwrap());
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    for (name, bytes) in entries {
        zip.start_file(*name, options).unwrap();
        zip.write_all(bytes).unwrap();
    }
    zip.finish().unwrap();
}

/// Minimal backup document with the given version and no records
pub fn empty_document(version: u32) -> Vec<u8> {
    serde_json::to_vec(&serde_json::json!({
        "schemaVersion": version,
        "exportTimestamp": 1_700_000_000_000i64,
        "producerVersion": "shoebox/test",
        "format": "ARCHIVE",
        "categories": [],
        "photos": [],
        "settings": {},
        "payloadManifest": []
    }))
    .unwrap()
}

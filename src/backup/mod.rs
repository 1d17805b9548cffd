//! Backup and restore for the photo library
//!
//! A backup is either a ZIP archive or a bare JSON document:
//!
//! ```text
//! metadata.json          versioned LibraryBackup document
//! photos/<name>          user photo payloads, flat
//! thumbnails/<name>      optional JPEG thumbnails
//! ```
//!
//! - `schema`: the document, its version gate and structural validation
//! - `archive`: bounded ZIP reading/writing with zip-bomb and traversal limits
//! - `export`: `ExportPipeline`, library to backup file
//! - `validate`: `IntegrityValidator`, non-destructive inspection
//! - `restore`: `RestoreEngine`, backup file to library (merge or replace)
//! - `manager`: naming, listing and retention in the backup directory
//!
//! # Example
//!
//! ```rust,ignore
//! use shoebox::backup::{ExportPipeline, ExportRequest, RestoreEngine, RestoreOptions};
//!
//! let files = storage.files();
//! let settings = storage.settings();
//! let work_dir = storage.paths().work_dir();
//!
//! ExportPipeline::new(&storage, &files, &settings, work_dir.clone())
//!     .export_library(&ExportRequest::default(), &dest)?;
//!
//! let result = RestoreEngine::new(&storage, &files, &settings, work_dir)
//!     .restore(&dest, &RestoreOptions::default())?;
//! println!("{}", result.summary());
//! ```

pub mod archive;
pub mod export;
pub mod manager;
pub mod progress;
pub mod restore;
pub mod schema;
pub mod validate;

pub use archive::{ArchiveListing, ArchiveReader, EntryInfo, EntryKind};
pub use export::{DateRange, ExportFilter, ExportPipeline, ExportRequest, ExportResult};
pub use manager::{BackupInfo, BackupManager};
pub use progress::{CancellationToken, ProgressEvent, ProgressReporter};
pub use restore::{DuplicatePolicy, RestoreEngine, RestoreOptions, RestoreResult, RestoreStrategy};
pub use schema::{BackupFormat, LibraryBackup, ManifestEntry};
pub use validate::{IntegrityValidator, ValidationReport};

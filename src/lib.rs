//! Shoebox - photo library organizer with portable backups
//!
//! This library holds the photo library store and the backup engine behind
//! the `shoebox` command. A library is a set of categories and the photos
//! filed under them; a backup is a versioned, self-describing snapshot of it
//! that can be restored on another device.
//!
//! # Architecture
//!
//! - `config`: paths, settings and the settings PIN
//! - `error`: the crate error type
//! - `models`: categories, photos and their ids
//! - `storage`: JSON-backed library store and photo file storage
//! - `backup`: archive codec, export, validation, restore and retention
//! - `cli`: command handlers for the binary
//!
//! # Example
//!
//! ```rust,ignore
//! use shoebox::config::paths::ShoeboxPaths;
//! use shoebox::storage::Storage;
//!
//! let paths = ShoeboxPaths::new()?;
//! let storage = Storage::open(paths)?;
//! ```

pub mod backup;
pub mod cli;
pub mod config;
pub mod error;
pub mod models;
pub mod storage;

pub use error::{ShoeboxError, ShoeboxResult};

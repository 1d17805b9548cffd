//! File I/O utilities with atomic writes
//!
//! Provides safe file operations that won't corrupt data on failure. JSON
//! documents and photo payloads are both written to a sibling temp file and
//! renamed into place.

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Serialize};

use crate::error::ShoeboxError;

/// Read JSON from a file, returning a default value if file doesn't exist
pub fn read_json<T, P>(path: P) -> Result<T, ShoeboxError>
where
    T: DeserializeOwned + Default,
    P: AsRef<Path>,
{
    let path = path.as_ref();

    if !path.exists() {
        return Ok(T::default());
    }

    let file = File::open(path)
        .map_err(|e| ShoeboxError::Storage(format!("Failed to open {}: {}", path.display(), e)))?;

    let reader = BufReader::new(file);
    serde_json::from_reader(reader)
        .map_err(|e| ShoeboxError::Storage(format!("Failed to parse {}: {}", path.display(), e)))
}

/// Write JSON to a file atomically (write to temp, then rename)
pub fn write_json_atomic<T, P>(path: P, data: &T) -> Result<(), ShoeboxError>
where
    T: Serialize,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    write_atomic(path, |writer| {
        serde_json::to_writer_pretty(&mut *writer, data)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        Ok(())
    })
}

/// Stream `reader` into `path` atomically, returning the number of bytes written
pub fn copy_atomic<R: Read, P: AsRef<Path>>(reader: &mut R, path: P) -> Result<u64, ShoeboxError> {
    let mut written = 0;
    write_atomic(path.as_ref(), |writer| {
        written = io::copy(reader, writer)?;
        Ok(())
    })?;
    Ok(written)
}

fn write_atomic<F>(path: &Path, fill: F) -> Result<(), ShoeboxError>
where
    F: FnOnce(&mut BufWriter<File>) -> io::Result<()>,
{
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            ShoeboxError::Storage(format!(
                "Failed to create directory {}: {}",
                parent.display(),
                e
            ))
        })?;
    }

    // Same directory as the target so the rename stays atomic
    let temp_path = temp_sibling(path);

    let file = File::create(&temp_path)
        .map_err(|e| ShoeboxError::Storage(format!("Failed to create temp file: {}", e)))?;
    let mut writer = BufWriter::new(file);

    let result = fill(&mut writer)
        .and_then(|_| writer.flush())
        .and_then(|_| writer.get_ref().sync_all());

    if let Err(e) = result {
        let _ = fs::remove_file(&temp_path);
        return Err(ShoeboxError::Storage(format!(
            "Failed to write {}: {}",
            path.display(),
            e
        )));
    }

    fs::rename(&temp_path, path).map_err(|e| {
        let _ = fs::remove_file(&temp_path);
        ShoeboxError::Storage(format!("Failed to rename temp file: {}", e))
    })?;

    Ok(())
}

fn temp_sibling(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

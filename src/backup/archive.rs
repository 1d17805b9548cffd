//! Archive codec
//!
//! Reads and writes the ZIP container: `metadata.json`, a flat `photos/`
//! directory and an optional flat `thumbnails/` directory. The codec knows
//! nothing about categories or photos; it enforces the security limits on
//! every read before any entry is materialized.

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Seek, Write};
use std::path::{Component, Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::{debug, warn};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::{ShoeboxError, ShoeboxResult};

use super::schema::{is_flat_name, METADATA_ENTRY, PHOTOS_DIR, THUMBNAILS_DIR};

/// Maximum number of entries in one archive
pub const MAX_ENTRIES: usize = 10_000;

/// Maximum cumulative uncompressed size (1 GiB)
pub const MAX_UNCOMPRESSED_SIZE: u64 = 1024 * 1024 * 1024;

/// Maximum uncompressed/compressed ratio of any entry
pub const MAX_RATIO: u64 = 100;

/// What a valid entry holds
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryKind {
    Metadata,
    /// Photo payload with its flat file name
    Photo(String),
    /// Thumbnail with its flat file name
    Thumbnail(String),
}

/// A valid entry as declared by the central directory
#[derive(Debug, Clone)]
pub struct EntryInfo {
    pub name: String,
    pub size: u64,
    pub compressed_size: u64,
    pub kind: EntryKind,
}

/// Valid entries of an archive plus the warnings for skipped ones
#[derive(Debug, Clone, Default)]
pub struct ArchiveListing {
    pub entries: Vec<EntryInfo>,
    pub warnings: Vec<String>,
}

impl ArchiveListing {
    /// Look up a valid entry by full name
    pub fn get(&self, name: &str) -> Option<&EntryInfo> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn has_metadata(&self) -> bool {
        self.entries.iter().any(|e| e.kind == EntryKind::Metadata)
    }

    pub fn photo_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| matches!(e.kind, EntryKind::Photo(_)))
            .count()
    }

    /// Sum of declared uncompressed sizes
    pub fn total_size(&self) -> u64 {
        self.entries.iter().map(|e| e.size).sum()
    }
}

/// Outcome of extracting an archive
#[derive(Debug, Clone, Default)]
pub struct ExtractReport {
    /// Names of the entries written under the destination
    pub extracted: Vec<String>,
    pub warnings: Vec<String>,
}

/// Central directory record before classification
#[derive(Debug, Clone)]
pub(crate) struct RawEntry {
    pub name: String,
    pub size: u64,
    pub compressed_size: u64,
    pub is_dir: bool,
    pub enclosed: bool,
}

/// Apply the entry count, size and ratio limits
pub(crate) fn check_limits(entries: &[RawEntry]) -> ShoeboxResult<()> {
    if entries.len() > MAX_ENTRIES {
        return Err(ShoeboxError::SecurityViolation(format!(
            "archive has {} entries (limit {})",
            entries.len(),
            MAX_ENTRIES
        )));
    }

    let mut total: u64 = 0;
    for entry in entries {
        if entry.size > 0 {
            if entry.compressed_size == 0 {
                return Err(ShoeboxError::SecurityViolation(format!(
                    "entry '{}' declares {} bytes from an empty stream",
                    entry.name, entry.size
                )));
            }
            if entry.size > entry.compressed_size.saturating_mul(MAX_RATIO) {
                return Err(ShoeboxError::SecurityViolation(format!(
                    "entry '{}' expands {} bytes to {} (ratio limit {})",
                    entry.name, entry.compressed_size, entry.size, MAX_RATIO
                )));
            }
        }

        total = total.saturating_add(entry.size);
        if total > MAX_UNCOMPRESSED_SIZE {
            return Err(ShoeboxError::SecurityViolation(format!(
                "archive expands beyond {} bytes",
                MAX_UNCOMPRESSED_SIZE
            )));
        }
    }

    Ok(())
}

fn escapes_root(name: &str) -> bool {
    name.contains('\\')
        || name.contains('\0')
        || Path::new(name).components().any(|c| {
            matches!(
                c,
                Component::ParentDir | Component::RootDir | Component::Prefix(_)
            )
        })
}

/// Classify a file entry, or explain why it is skipped
pub(crate) fn classify(name: &str, enclosed: bool) -> Result<EntryKind, String> {
    if !enclosed || escapes_root(name) {
        return Err(format!("Skipped entry '{}': path escapes the archive root", name));
    }

    if name == METADATA_ENTRY {
        return Ok(EntryKind::Metadata);
    }

    let flat_child = |dir: &str| {
        name.strip_prefix(dir)
            .and_then(|rest| rest.strip_prefix('/'))
            .map(|rest| rest.to_string())
    };

    if let Some(rest) = flat_child(PHOTOS_DIR) {
        return if is_flat_name(&rest) {
            Ok(EntryKind::Photo(rest))
        } else {
            Err(format!("Skipped entry '{}': nested photo path", name))
        };
    }

    if let Some(rest) = flat_child(THUMBNAILS_DIR) {
        return if is_flat_name(&rest) {
            Ok(EntryKind::Thumbnail(rest))
        } else {
            Err(format!("Skipped entry '{}': nested thumbnail path", name))
        };
    }

    Err(format!("Skipped entry '{}': not part of the backup layout", name))
}

/// An open archive whose limits have already been enforced
pub struct ArchiveReader {
    archive: ZipArchive<BufReader<File>>,
    listing: ArchiveListing,
}

impl ArchiveReader {
    /// Open an archive and scan its central directory
    pub fn open(path: &Path) -> ShoeboxResult<Self> {
        let file = File::open(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => ShoeboxError::FileNotFound(path.to_path_buf()),
            _ => ShoeboxError::Io(format!("Failed to open {}: {}", path.display(), e)),
        })?;

        let mut archive = ZipArchive::new(BufReader::new(file)).map_err(|e| {
            ShoeboxError::InvalidFormat(format!("{} is not a valid archive: {}", path.display(), e))
        })?;

        let listing = scan(&mut archive)?;
        Ok(Self { archive, listing })
    }

    pub fn listing(&self) -> &ArchiveListing {
        &self.listing
    }

    /// Read a whole valid entry into memory
    pub fn read(&mut self, name: &str) -> ShoeboxResult<Vec<u8>> {
        let declared = self.declared_size(name)?;
        let mut file = self.archive.by_name(name)?;

        let mut buf = Vec::with_capacity(declared.min(1024 * 1024) as usize);
        Read::by_ref(&mut file).take(declared + 1).read_to_end(&mut buf)?;
        if buf.len() as u64 > declared {
            return Err(oversized(name, declared));
        }
        Ok(buf)
    }

    /// Stream a valid entry through SHA-256
    pub fn checksum(&mut self, name: &str) -> ShoeboxResult<String> {
        let declared = self.declared_size(name)?;
        let mut file = self.archive.by_name(name)?;

        let mut hasher = Sha256::new();
        let read = io::copy(&mut Read::by_ref(&mut file).take(declared + 1), &mut hasher)?;
        if read > declared {
            return Err(oversized(name, declared));
        }
        Ok(format!("{:x}", hasher.finalize()))
    }

    /// Extract every valid entry under `dest`
    pub fn extract_to(&mut self, dest: &Path) -> ShoeboxResult<ExtractReport> {
        fs::create_dir_all(dest)?;

        let mut report = ExtractReport {
            extracted: Vec::new(),
            warnings: self.listing.warnings.clone(),
        };
        let mut written_total: u64 = 0;

        let entries = self.listing.entries.clone();
        for entry in entries {
            let out_path = dest.join(&entry.name);
            if !out_path.starts_with(dest) {
                warn!(entry = %entry.name, "entry resolves outside extraction root");
                report
                    .warnings
                    .push(format!("Skipped entry '{}': resolves outside destination", entry.name));
                continue;
            }
            if let Some(parent) = out_path.parent() {
                fs::create_dir_all(parent)?;
            }

            let mut file = self.archive.by_name(&entry.name)?;
            let mut out = BufWriter::new(File::create(&out_path)?);
            let copied = io::copy(&mut Read::by_ref(&mut file).take(entry.size + 1), &mut out)?;
            out.flush()?;
            drop(out);

            if copied > entry.size {
                let _ = fs::remove_file(&out_path);
                return Err(oversized(&entry.name, entry.size));
            }

            written_total += copied;
            if written_total > MAX_UNCOMPRESSED_SIZE {
                return Err(ShoeboxError::SecurityViolation(format!(
                    "extraction exceeded {} bytes",
                    MAX_UNCOMPRESSED_SIZE
                )));
            }

            debug!(entry = %entry.name, bytes = copied, "extracted");
            report.extracted.push(entry.name);
        }

        Ok(report)
    }

    fn declared_size(&self, name: &str) -> ShoeboxResult<u64> {
        self.listing.get(name).map(|e| e.size).ok_or_else(|| {
            ShoeboxError::InvalidFormat(format!("archive has no valid entry '{}'", name))
        })
    }
}

fn oversized(name: &str, declared: u64) -> ShoeboxError {
    ShoeboxError::SecurityViolation(format!(
        "entry '{}' expands beyond its declared {} bytes",
        name, declared
    ))
}

fn scan<R: Read + Seek>(archive: &mut ZipArchive<R>) -> ShoeboxResult<ArchiveListing> {
    if archive.is_empty() {
        return Err(ShoeboxError::InvalidFormat("archive has no entries".into()));
    }
    if archive.len() > MAX_ENTRIES {
        return Err(ShoeboxError::SecurityViolation(format!(
            "archive has {} entries (limit {})",
            archive.len(),
            MAX_ENTRIES
        )));
    }

    let mut raw = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
        let file = archive.by_index_raw(i)?;
        raw.push(RawEntry {
            name: file.name().to_string(),
            size: file.size(),
            compressed_size: file.compressed_size(),
            is_dir: file.is_dir(),
            enclosed: file.enclosed_name().is_some(),
        });
    }

    check_limits(&raw)?;

    let mut listing = ArchiveListing::default();
    for entry in raw {
        if entry.is_dir && !escapes_root(&entry.name) {
            continue;
        }
        match classify(&entry.name, entry.enclosed) {
            Ok(kind) => listing.entries.push(EntryInfo {
                name: entry.name,
                size: entry.size,
                compressed_size: entry.compressed_size,
                kind,
            }),
            Err(reason) => {
                warn!("{}", reason);
                listing.warnings.push(reason);
            }
        }
    }

    if listing.entries.is_empty() {
        return Err(if listing.warnings.is_empty() {
            ShoeboxError::InvalidFormat("archive has no entries".into())
        } else {
            ShoeboxError::SecurityViolation("no valid entries remain after filtering".into())
        });
    }

    Ok(listing)
}

/// List valid entry names without reading any payload
pub fn list_entries(path: &Path) -> ShoeboxResult<ArchiveListing> {
    Ok(ArchiveReader::open(path)?.listing)
}

/// Read one entry into memory
pub fn read_entry(path: &Path, name: &str) -> ShoeboxResult<Vec<u8>> {
    ArchiveReader::open(path)?.read(name)
}

/// Extract every valid entry under `dest`
pub fn extract_to(path: &Path, dest: &Path) -> ShoeboxResult<ExtractReport> {
    ArchiveReader::open(path)?.extract_to(dest)
}

/// Bytes for one archive entry
#[derive(Debug, Clone)]
pub enum EntrySource {
    File(PathBuf),
    Bytes(Vec<u8>),
}

impl EntrySource {
    fn len(&self) -> ShoeboxResult<u64> {
        match self {
            Self::File(path) => Ok(fs::metadata(path)
                .map_err(|_| ShoeboxError::FileNotFound(path.clone()))?
                .len()),
            Self::Bytes(bytes) => Ok(bytes.len() as u64),
        }
    }
}

/// Fail with `InsufficientStorage` unless `dir` has twice `payload_bytes` free
pub fn check_free_space(dir: &Path, payload_bytes: u64) -> ShoeboxResult<()> {
    let required = payload_bytes.saturating_mul(2);
    match fs4::statvfs(dir) {
        Ok(stats) if stats.available_space() < required => Err(ShoeboxError::InsufficientStorage {
            required,
            available: stats.available_space(),
        }),
        Ok(_) => Ok(()),
        Err(e) => {
            debug!(dir = %dir.display(), error = %e, "free space unknown, skipping check");
            Ok(())
        }
    }
}

/// Write `entries` to a new archive at `dest`, returning its size
///
/// JSON entries are deflated; image payloads are stored as-is.
pub fn write(
    dest: &Path,
    entries: &[(String, EntrySource)],
    compression_level: Option<i64>,
) -> ShoeboxResult<u64> {
    let mut payload_bytes = 0u64;
    for (_, source) in entries {
        payload_bytes += source.len()?;
    }

    let dest_dir = match dest.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    check_free_space(&dest_dir, payload_bytes)?;

    let file = File::create(dest).map_err(|e| {
        ShoeboxError::ExportFailed(format!("Cannot open {}: {}", dest.display(), e))
    })?;

    match write_entries(BufWriter::new(file), entries, compression_level) {
        Ok(()) => Ok(fs::metadata(dest)?.len()),
        Err(e) => {
            let _ = fs::remove_file(dest);
            Err(ShoeboxError::ExportFailed(format!(
                "Failed to write {}: {}",
                dest.display(),
                e
            )))
        }
    }
}

fn write_entries<W: Write + Seek>(
    writer: W,
    entries: &[(String, EntrySource)],
    compression_level: Option<i64>,
) -> ShoeboxResult<()> {
    let mut zip = ZipWriter::new(writer);
    let deflated = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .compression_level(compression_level);
    let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);

    for (name, source) in entries {
        let options = if name.ends_with(".json") { deflated } else { stored };
        zip.start_file(name.as_str(), options)?;
        match source {
            EntrySource::File(path) => {
                let mut input = BufReader::new(File::open(path)?);
                io::copy(&mut input, &mut zip)?;
            }
            EntrySource::Bytes(bytes) => zip.write_all(bytes)?,
        }
    }

    let mut inner = zip.finish()?;
    inner.flush()?;
    Ok(())
}

/// Pack a staging directory, metadata first, other entries in name order
pub fn write_dir(staging: &Path, dest: &Path, compression_level: Option<i64>) -> ShoeboxResult<u64> {
    let mut entries = Vec::new();

    for entry in WalkDir::new(staging).sort_by_file_name() {
        let entry = entry.map_err(|e| ShoeboxError::Io(e.to_string()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(staging)
            .map_err(|e| ShoeboxError::Io(e.to_string()))?;
        let name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        entries.push((name, EntrySource::File(entry.path().to_path_buf())));
    }

    entries.sort_by_key(|(name, _)| name != METADATA_ENTRY);
    write(dest, &entries, compression_level)
}

/// Lowercase hex SHA-256 of a reader
pub fn sha256_reader<R: Read>(reader: &mut R) -> ShoeboxResult<String> {
    let mut hasher = Sha256::new();
    io::copy(reader, &mut hasher)?;
    Ok(format!("{:x}", hasher.finalize()))
}

/// Lowercase hex SHA-256 of a file
pub fn sha256_file(path: &Path) -> ShoeboxResult<String> {
    let file = File::open(path).map_err(|_| ShoeboxError::FileNotFound(path.to_path_buf()))?;
    sha256_reader(&mut BufReader::new(file))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn zip_with(path: &Path, entries: &[(&str, &[u8])]) {
        let mut zip = ZipWriter::new(File::create(path).unwrap());
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        for (name, bytes) in entries {
            zip.start_file(*name, options).unwrap();
            zip.write_all(bytes).unwrap();
        }
        zip.finish().unwrap();
    }

    fn raw(name: &str, size: u64, compressed_size: u64) -> RawEntry {
        RawEntry {
            name: name.into(),
            size,
            compressed_size,
            is_dir: false,
            enclosed: true,
        }
    }

    #[test]
    fn test_limits_reject_ratio() {
        let entries = vec![raw("photos/a.jpg", 10_000, 10)];
        assert!(matches!(
            check_limits(&entries),
            Err(ShoeboxError::SecurityViolation(_))
        ));

        let entries = vec![raw("photos/a.jpg", 1_000, 10)];
        assert!(check_limits(&entries).is_ok());
    }

    #[test]
    fn test_limits_ratio_boundary() {
        assert!(check_limits(&[raw("photos/a.jpg", 10_000, 100)]).is_ok());
        assert!(matches!(
            check_limits(&[raw("photos/a.jpg", 10_099, 100)]),
            Err(ShoeboxError::SecurityViolation(_))
        ));
        assert!(matches!(
            check_limits(&[raw("photos/a.jpg", 10_001, 100)]),
            Err(ShoeboxError::SecurityViolation(_))
        ));
    }

    #[test]
    fn test_limits_reject_total_size() {
        let half = MAX_UNCOMPRESSED_SIZE / 2 + 1;
        let entries = vec![raw("photos/a.jpg", half, half), raw("photos/b.jpg", half, half)];
        assert!(matches!(
            check_limits(&entries),
            Err(ShoeboxError::SecurityViolation(_))
        ));
    }

    #[test]
    fn test_limits_reject_entry_count() {
        let entries: Vec<_> = (0..=MAX_ENTRIES)
            .map(|i| raw(&format!("photos/{}.jpg", i), 1, 1))
            .collect();
        assert!(check_limits(&entries).is_err());
    }

    #[test]
    fn test_limits_reject_empty_stream() {
        let entries = vec![raw("photos/a.jpg", 5, 0)];
        assert!(check_limits(&entries).is_err());
    }

    #[test]
    fn test_classify() {
        assert_eq!(classify("metadata.json", true), Ok(EntryKind::Metadata));
        assert_eq!(
            classify("photos/img_1.jpg", true),
            Ok(EntryKind::Photo("img_1.jpg".into()))
        );
        assert_eq!(
            classify("thumbnails/img_1.jpg", true),
            Ok(EntryKind::Thumbnail("img_1.jpg".into()))
        );
        assert!(classify("../../etc/passwd", false).is_err());
        assert!(classify("photos/../../x", true).is_err());
        assert!(classify("/etc/passwd", true).is_err());
        assert!(classify("photos/nested/a.jpg", true).is_err());
        assert!(classify("random.txt", true).is_err());
    }

    #[test]
    fn test_write_and_read_back() {
        let temp_dir = TempDir::new().unwrap();
        let dest = temp_dir.path().join("out.zip");

        let entries = vec![
            ("metadata.json".to_string(), EntrySource::Bytes(br#"{"schemaVersion":2}"#.to_vec())),
            ("photos/a.jpg".to_string(), EntrySource::Bytes(b"abc".to_vec())),
        ];
        let size = write(&dest, &entries, None).unwrap();
        assert!(size > 0);

        let listing = list_entries(&dest).unwrap();
        assert!(listing.has_metadata());
        assert_eq!(listing.photo_count(), 1);
        assert!(listing.warnings.is_empty());

        assert_eq!(read_entry(&dest, "photos/a.jpg").unwrap(), b"abc");

        let mut reader = ArchiveReader::open(&dest).unwrap();
        let expected = sha256_reader(&mut &b"abc"[..]).unwrap();
        assert_eq!(reader.checksum("photos/a.jpg").unwrap(), expected);
    }

    #[test]
    fn test_write_dir_puts_metadata_first() {
        let temp_dir = TempDir::new().unwrap();
        let staging = temp_dir.path().join("staging");
        fs::create_dir_all(staging.join("photos")).unwrap();
        fs::write(staging.join("photos").join("a.jpg"), b"a").unwrap();
        fs::write(staging.join("metadata.json"), b"{}").unwrap();

        let dest = temp_dir.path().join("out.zip");
        write_dir(&staging, &dest, Some(6)).unwrap();

        let mut archive = ZipArchive::new(File::open(&dest).unwrap()).unwrap();
        assert_eq!(archive.by_index(0).unwrap().name(), "metadata.json");
        assert_eq!(archive.by_index(1).unwrap().name(), "photos/a.jpg");
    }

    #[test]
    fn test_extract_skips_traversal() {
        let temp_dir = TempDir::new().unwrap();
        let archive = temp_dir.path().join("evil.zip");
        zip_with(
            &archive,
            &[
                ("metadata.json", b"{}"),
                ("../../etc/passwd", b"root"),
                ("photos/a.jpg", b"a"),
            ],
        );

        let dest = temp_dir.path().join("a").join("b").join("out");
        let report = extract_to(&archive, &dest).unwrap();

        assert_eq!(report.extracted, vec!["metadata.json", "photos/a.jpg"]);
        assert_eq!(report.warnings.len(), 1);
        assert!(!temp_dir.path().join("a").join("etc").join("passwd").exists());
        assert!(dest.join("photos").join("a.jpg").exists());
    }

    #[test]
    fn test_only_invalid_entries_is_violation() {
        let temp_dir = TempDir::new().unwrap();
        let archive = temp_dir.path().join("evil.zip");
        zip_with(&archive, &[("../x", b"x")]);

        assert!(matches!(
            list_entries(&archive),
            Err(ShoeboxError::SecurityViolation(_))
        ));
    }

    #[test]
    fn test_not_an_archive() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("bogus.zip");
        fs::write(&path, b"definitely not a zip").unwrap();

        assert!(matches!(
            list_entries(&path),
            Err(ShoeboxError::InvalidFormat(_))
        ));
        assert!(matches!(
            list_entries(&temp_dir.path().join("missing.zip")),
            Err(ShoeboxError::FileNotFound(_))
        ));
    }

    #[test]
    fn test_write_to_unopenable_destination() {
        let temp_dir = TempDir::new().unwrap();
        let dest = temp_dir.path().join("no-such-dir").join("out.zip");
        let entries = vec![("metadata.json".to_string(), EntrySource::Bytes(b"{}".to_vec()))];

        assert!(matches!(
            write(&dest, &entries, None),
            Err(ShoeboxError::ExportFailed(_))
        ));
    }
}

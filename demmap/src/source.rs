//! Raw byte sources for tile files.
//!
//! The tile engine never touches the file system directly. It asks a
//! [`ByteSource`] for the list of files it can see and for the bytes of one
//! logical path. Logical paths always use `/` separators.
//!
//! [`DirectorySource`] walks one or more root directories. Files inside a
//! `.zip` archive are listed as `archive.zip/inner/name`, and a gzip
//! compressed file `N35E138.hgt.gz` is listed as `N35E138.hgt`, so callers
//! never see the archive layer.

use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use tracing::{debug, warn};
use walkdir::WalkDir;
use zip::ZipArchive;

use crate::error::{DemError, Result};

/// A file visible through a [`ByteSource`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceEntry {
    /// Logical path, unique within the source.
    pub path: String,
    /// Last path component.
    pub name: String,
    /// Size in bytes of the data `read_all` returns.
    pub size: u64,
}

/// Supplier of tile bytes.
pub trait ByteSource: Send + Sync {
    /// Returns `true` if `path` names a readable entry.
    fn exists(&self, path: &str) -> bool;

    /// Read the full contents of `path`.
    ///
    /// Returns `None` when the entry does not exist or cannot be read; the
    /// reason is logged by the implementation.
    fn read_all(&self, path: &str) -> Option<Vec<u8>>;

    /// Every entry of the source, sorted by path.
    fn entries(&self) -> Vec<SourceEntry>;
}

#[derive(Debug, Clone)]
enum Location {
    Plain(PathBuf),
    Gzip(PathBuf),
    Zipped { archive: PathBuf, inner: String },
}

/// File system source over one or more root directories.
///
/// The listing is taken once at construction; call [`refresh`](Self::refresh)
/// to pick up new files. When two roots contain the same logical path the
/// earlier root wins.
pub struct DirectorySource {
    roots: Vec<PathBuf>,
    entries: BTreeMap<String, (Location, u64)>,
}

impl DirectorySource {
    /// Walk `roots` recursively and index every file found.
    ///
    /// Missing or unreadable roots are logged and skipped.
    pub fn new<I, P>(roots: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut source = Self {
            roots: roots.into_iter().map(|p| p.as_ref().to_path_buf()).collect(),
            entries: BTreeMap::new(),
        };
        source.refresh();
        source
    }

    /// Root directories in precedence order.
    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// Number of visible entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no entries are visible.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Re-walk all roots.
    pub fn refresh(&mut self) {
        self.entries.clear();
        let roots = self.roots.clone();
        for root in &roots {
            self.walk_root(root);
        }
        debug!(entries = self.entries.len(), roots = roots.len(), "indexed byte source");
    }

    fn walk_root(&mut self, root: &Path) {
        if !root.exists() {
            warn!(root = %root.display(), "data directory does not exist");
            return;
        }
        if !root.is_dir() {
            warn!(root = %root.display(), "data path is not a directory");
            return;
        }

        for item in WalkDir::new(root).follow_links(true) {
            let entry = match item {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(root = %root.display(), error = %e, "unreadable directory entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let Some(logical) = logical_path(root, path) else {
                continue;
            };
            let lower = logical.to_ascii_lowercase();

            if lower.ends_with(".zip") {
                if let Err(e) = self.add_archive(path, &logical) {
                    warn!(archive = %path.display(), error = %e, "skipping unreadable zip archive");
                }
            } else if lower.ends_with(".gz") {
                let stripped = logical[..logical.len() - 3].to_string();
                match gzip_size(path) {
                    Ok(size) => self.add(stripped, Location::Gzip(path.to_path_buf()), size),
                    Err(e) => {
                        warn!(file = %path.display(), error = %e, "skipping unreadable gzip file")
                    }
                }
            } else {
                let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
                self.add(logical, Location::Plain(path.to_path_buf()), size);
            }
        }
    }

    fn add_archive(&mut self, archive_path: &Path, logical: &str) -> Result<()> {
        let file = File::open(archive_path)?;
        let mut archive = ZipArchive::new(file).map_err(|e| archive_error(archive_path, e))?;

        for i in 0..archive.len() {
            let zip_file = archive
                .by_index(i)
                .map_err(|e| archive_error(archive_path, e))?;
            if zip_file.is_dir() {
                continue;
            }
            let inner = zip_file.name().to_string();
            let size = zip_file.size();
            self.add(
                format!("{}/{}", logical, inner),
                Location::Zipped {
                    archive: archive_path.to_path_buf(),
                    inner,
                },
                size,
            );
        }
        Ok(())
    }

    fn add(&mut self, logical: String, location: Location, size: u64) {
        if self.entries.contains_key(&logical) {
            debug!(path = %logical, "shadowed by an earlier root");
            return;
        }
        self.entries.insert(logical, (location, size));
    }

    fn read_location(location: &Location) -> Result<Vec<u8>> {
        match location {
            Location::Plain(path) => Ok(std::fs::read(path)?),
            Location::Gzip(path) => {
                let mut decoder = GzDecoder::new(File::open(path)?);
                let mut data = Vec::new();
                decoder.read_to_end(&mut data)?;
                Ok(data)
            }
            Location::Zipped { archive, inner } => {
                let file = File::open(archive)?;
                let mut zip = ZipArchive::new(file).map_err(|e| archive_error(archive, e))?;
                let mut zip_file = zip.by_name(inner).map_err(|e| archive_error(archive, e))?;
                let mut data = Vec::with_capacity(zip_file.size() as usize);
                zip_file.read_to_end(&mut data)?;
                Ok(data)
            }
        }
    }
}

impl ByteSource for DirectorySource {
    fn exists(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    fn read_all(&self, path: &str) -> Option<Vec<u8>> {
        let Some((location, _)) = self.entries.get(path) else {
            warn!(path, "tile file not found in data directories");
            return None;
        };
        match Self::read_location(location) {
            Ok(data) => Some(data),
            Err(e) => {
                warn!(path, error = %e, "failed to read tile file");
                None
            }
        }
    }

    fn entries(&self) -> Vec<SourceEntry> {
        self.entries
            .iter()
            .map(|(path, (_, size))| SourceEntry {
                path: path.clone(),
                name: base_name(path).to_string(),
                size: *size,
            })
            .collect()
    }
}

/// In-memory source, mainly for tests and embedding callers.
#[derive(Debug, Default, Clone)]
pub struct MemorySource {
    files: HashMap<String, Vec<u8>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file, builder style.
    pub fn with_file(mut self, path: impl Into<String>, data: Vec<u8>) -> Self {
        self.insert(path, data);
        self
    }

    /// Add or replace a file.
    pub fn insert(&mut self, path: impl Into<String>, data: Vec<u8>) {
        self.files.insert(path.into(), data);
    }

    /// Remove a file. Returns `true` if it existed.
    pub fn remove(&mut self, path: &str) -> bool {
        self.files.remove(path).is_some()
    }
}

impl ByteSource for MemorySource {
    fn exists(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    fn read_all(&self, path: &str) -> Option<Vec<u8>> {
        self.files.get(path).cloned()
    }

    fn entries(&self) -> Vec<SourceEntry> {
        let mut entries: Vec<SourceEntry> = self
            .files
            .iter()
            .map(|(path, data)| SourceEntry {
                path: path.clone(),
                name: base_name(path).to_string(),
                size: data.len() as u64,
            })
            .collect();
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        entries
    }
}

/// `path` relative to `root`, joined with `/`.
fn logical_path(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

fn base_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Uncompressed size from the gzip trailer (ISIZE, little-endian u32).
///
/// ISIZE is the size modulo 2^32, which is exact for any tile file.
fn gzip_size(path: &Path) -> std::io::Result<u64> {
    let mut file = File::open(path)?;
    file.seek(SeekFrom::End(-4))?;
    let mut trailer = [0u8; 4];
    file.read_exact(&mut trailer)?;
    Ok(u32::from_le_bytes(trailer) as u64)
}

fn archive_error(path: &Path, e: impl std::fmt::Display) -> DemError {
    DemError::Archive {
        path: path.to_path_buf(),
        reason: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::fs;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_file(dir: &Path, rel: &str, data: &[u8]) {
        let path = dir.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, data).unwrap();
    }

    fn write_zip(dir: &Path, rel: &str, files: &[(&str, &[u8])]) {
        let file = fs::File::create(dir.join(rel)).unwrap();
        let mut zip_writer = zip::ZipWriter::new(file);
        let options = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated);
        for (name, data) in files {
            zip_writer.start_file(*name, options).unwrap();
            zip_writer.write_all(data).unwrap();
        }
        zip_writer.finish().unwrap();
    }

    fn write_gz(dir: &Path, rel: &str, data: &[u8]) {
        let file = fs::File::create(dir.join(rel)).unwrap();
        let mut encoder = GzEncoder::new(file, Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap();
    }

    #[test]
    fn test_plain_files_recursive() {
        let temp_dir = TempDir::new().unwrap();
        write_file(temp_dir.path(), "N35E138.hgt", &[1, 2, 3]);
        write_file(temp_dir.path(), "sub/deeper/S01_W001.bil", &[4, 5]);

        let source = DirectorySource::new([temp_dir.path()]);
        let entries = source.entries();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].path, "N35E138.hgt");
        assert_eq!(entries[0].size, 3);
        assert_eq!(entries[1].path, "sub/deeper/S01_W001.bil");
        assert_eq!(entries[1].name, "S01_W001.bil");

        assert!(source.exists("sub/deeper/S01_W001.bil"));
        assert_eq!(source.read_all("sub/deeper/S01_W001.bil"), Some(vec![4, 5]));
        assert_eq!(source.read_all("missing.hgt"), None);
    }

    #[test]
    fn test_zip_entries_are_transparent() {
        let temp_dir = TempDir::new().unwrap();
        write_zip(
            temp_dir.path(),
            "tiles.zip",
            &[("N40E010.hgt", &[7u8; 16]), ("inner/N41E010.hgt", &[8u8; 4])],
        );

        let source = DirectorySource::new([temp_dir.path()]);
        let paths: Vec<String> = source.entries().into_iter().map(|e| e.path).collect();

        assert_eq!(paths, vec!["tiles.zip/N40E010.hgt", "tiles.zip/inner/N41E010.hgt"]);
        assert_eq!(source.read_all("tiles.zip/inner/N41E010.hgt"), Some(vec![8u8; 4]));

        let entry = &source.entries()[0];
        assert_eq!(entry.name, "N40E010.hgt");
        assert_eq!(entry.size, 16);
    }

    #[test]
    fn test_gzip_exposed_without_suffix() {
        let temp_dir = TempDir::new().unwrap();
        let data: Vec<u8> = (0..=255u8).cycle().take(5000).collect();
        write_gz(temp_dir.path(), "N35E138.hgt.gz", &data);

        let source = DirectorySource::new([temp_dir.path()]);
        let entries = source.entries();

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].path, "N35E138.hgt");
        assert_eq!(entries[0].size, 5000);
        assert_eq!(source.read_all("N35E138.hgt"), Some(data));
    }

    #[test]
    fn test_earlier_root_wins() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        write_file(first.path(), "N00E000.hgt", &[1]);
        write_file(second.path(), "N00E000.hgt", &[2, 2]);
        write_file(second.path(), "N01E000.hgt", &[3]);

        let source = DirectorySource::new([first.path(), second.path()]);

        assert_eq!(source.len(), 2);
        assert_eq!(source.read_all("N00E000.hgt"), Some(vec![1]));
        assert_eq!(source.read_all("N01E000.hgt"), Some(vec![3]));
    }

    #[test]
    fn test_missing_root_is_skipped() {
        let temp_dir = TempDir::new().unwrap();
        write_file(temp_dir.path(), "N00E000.hgt", &[1]);

        let source = DirectorySource::new([temp_dir.path().join("nope"), temp_dir.path().to_path_buf()]);
        assert_eq!(source.len(), 1);
    }

    #[test]
    fn test_corrupt_zip_is_skipped() {
        let temp_dir = TempDir::new().unwrap();
        write_file(temp_dir.path(), "broken.zip", b"not a zip archive");
        write_file(temp_dir.path(), "N00E000.hgt", &[1]);

        let source = DirectorySource::new([temp_dir.path()]);
        assert_eq!(source.len(), 1);
        assert!(source.exists("N00E000.hgt"));
    }

    #[test]
    fn test_refresh_picks_up_new_files() {
        let temp_dir = TempDir::new().unwrap();
        let mut source = DirectorySource::new([temp_dir.path()]);
        assert!(source.is_empty());

        write_file(temp_dir.path(), "N00E000.hgt", &[1]);
        source.refresh();
        assert_eq!(source.len(), 1);
    }

    #[test]
    fn test_memory_source() {
        let mut source = MemorySource::new()
            .with_file("b/N01E001.hgt", vec![1, 2])
            .with_file("a.hgt", vec![3]);

        let entries = source.entries();
        assert_eq!(entries[0].path, "a.hgt");
        assert_eq!(entries[1].name, "N01E001.hgt");
        assert_eq!(entries[1].size, 2);

        assert!(source.remove("a.hgt"));
        assert!(!source.exists("a.hgt"));
        assert_eq!(source.read_all("b/N01E001.hgt"), Some(vec![1, 2]));
    }
}

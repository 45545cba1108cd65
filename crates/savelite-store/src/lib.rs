//! # SaveLite Store
//!
//! Raw file-system access for the primary document file and its numbered
//! backups.
//!
//! ## ⚠️ Internal Implementation Detail
//!
//! **This crate is an internal implementation detail of SaveLite.**
//!
//! Users should depend on the main [`savelite`](https://crates.io/crates/savelite) crate
//! instead, which provides the stable public API.
//!
//! ---
//!
//! ## Layout
//!
//! ```text
//! <root>/<profile>/<file>.dat      primary document
//! <root>/<profile>/<file>.bkp.0    backup slot 0
//! <root>/<profile>/<file>.bkp.1    backup slot 1
//! ...
//! ```
//!
//! A store is immutable once built. Changing the root, profile, file name or
//! backup limit means building a new store and swapping it in.

#![warn(missing_docs)]
#![warn(clippy::all)]

use savelite_core::{Error, Result, Settings};
use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

/// Extension of the primary document file
pub const DATA_EXTENSION: &str = "dat";
/// Extension marker of backup files, followed by `.<index>`
pub const BACKUP_EXTENSION: &str = "bkp";

/// File store bound to one root/profile/file name
#[derive(Debug, Clone)]
pub struct BackupFileStore {
    /// Directory holding the primary file and backups
    dir: PathBuf,
    /// File base name without extension
    base_name: String,
    /// Number of backup slots written on flush
    max_backups: usize,
    /// Verify backup copies with CRC32
    verify_checksums: bool,
}

impl BackupFileStore {
    /// Create a store for `<root>/<profile>/<base_name>.dat`
    pub fn new(
        root: impl AsRef<Path>,
        profile: &str,
        base_name: &str,
        max_backups: usize,
    ) -> Result<Self> {
        let settings = Settings::new()
            .with_root(root.as_ref())
            .with_profile(profile)
            .with_file_name(base_name)
            .with_max_backups(max_backups);
        Self::from_settings(&settings)
    }

    /// Create a store from validated settings
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        settings.validate()?;

        Ok(Self {
            dir: settings.directory(),
            base_name: settings.file_name.clone(),
            max_backups: settings.max_backups,
            verify_checksums: settings.verify_backups,
        })
    }

    /// Enable or disable CRC32 verification of backup copies
    pub fn with_verify_checksums(mut self, verify: bool) -> Self {
        self.verify_checksums = verify;
        self
    }

    /// Directory holding the primary file and backups
    pub fn directory(&self) -> &Path {
        &self.dir
    }

    /// Configured number of backup slots
    pub fn max_backups(&self) -> usize {
        self.max_backups
    }

    /// Path of the primary file
    pub fn primary_path(&self) -> PathBuf {
        self.dir.join(format!("{}.{}", self.base_name, DATA_EXTENSION))
    }

    /// Path of backup slot `index`
    pub fn backup_path(&self, index: usize) -> PathBuf {
        self.dir.join(format!("{}.{}.{}", self.base_name, BACKUP_EXTENSION, index))
    }

    /// Create the directory tree if absent
    pub fn ensure_directory(&self) -> Result<()> {
        fs::create_dir_all(&self.dir).map_err(|e| Error::from_io(&self.dir, e))
    }

    /// Read the whole primary file
    pub fn read_primary(&self) -> Result<String> {
        Self::read_file(&self.primary_path())
    }

    /// Read the whole backup file for slot `index`
    pub fn read_backup(&self, index: usize) -> Result<String> {
        Self::read_file(&self.backup_path(index))
    }

    /// Create-or-truncate the primary file with `data`, creating directories as needed
    pub fn write_primary(&self, data: &str) -> Result<()> {
        self.ensure_directory()?;
        let path = self.primary_path();
        fs::write(&path, data).map_err(|e| Error::from_io(&path, e))?;
        tracing::debug!(path = %path.display(), bytes = data.len(), "wrote primary file");
        Ok(())
    }

    /// Remove the primary file
    pub fn delete_primary(&self) -> Result<()> {
        Self::remove_file(&self.primary_path())
    }

    /// Remove backup slot `index`
    pub fn delete_backup(&self, index: usize) -> Result<()> {
        Self::remove_file(&self.backup_path(index))
    }

    /// Copy the current primary file into backup slot `index`
    ///
    /// With verification enabled the copy is re-read and compared against
    /// the source checksum.
    pub fn backup_from_primary(&self, index: usize) -> Result<()> {
        let src = self.primary_path();
        let dst = self.backup_path(index);

        fs::copy(&src, &dst).map_err(|e| Error::from_io(&src, e))?;

        if self.verify_checksums {
            let expected = Self::compute_checksum(&src)?;
            let actual = Self::compute_checksum(&dst)?;
            if expected != actual {
                return Err(Error::ChecksumMismatch {
                    path: dst,
                    expected,
                    actual,
                });
            }
        }

        tracing::debug!(index, path = %dst.display(), "wrote backup");
        Ok(())
    }

    /// Move every backup up one slot, freeing slot 0
    ///
    /// Backups that would land at or beyond `max_backups` are dropped.
    pub fn shift_backups(&self) -> Result<()> {
        let mut indices = self.scan_backups()?;
        indices.sort_unstable_by(|a, b| b.cmp(a));

        for index in indices {
            let from = self.backup_path(index);
            if index + 1 >= self.max_backups {
                fs::remove_file(&from).map_err(|e| Error::from_io(&from, e))?;
                continue;
            }
            let to = self.backup_path(index + 1);
            fs::rename(&from, &to).map_err(|e| Error::from_io(&from, e))?;
        }

        Ok(())
    }

    /// Indices of the backup slots currently on disk, in ascending order
    ///
    /// Only slots below `max_backups` belong to the backup set; files left
    /// over from a larger limit are ignored until [`prune_backups`] removes
    /// them. A missing directory yields an empty list.
    ///
    /// [`prune_backups`]: BackupFileStore::prune_backups
    pub fn list_backups(&self) -> Result<Vec<usize>> {
        let mut indices = self.scan_backups()?;
        indices.retain(|&index| index < self.max_backups);
        Ok(indices)
    }

    /// Remove backup files at or beyond `max_backups`
    ///
    /// Returns the number of files removed.
    pub fn prune_backups(&self) -> Result<usize> {
        let stale: Vec<usize> = self
            .scan_backups()?
            .into_iter()
            .filter(|&index| index >= self.max_backups)
            .collect();

        for &index in &stale {
            self.delete_backup(index)?;
        }
        if !stale.is_empty() {
            tracing::debug!(removed = stale.len(), max = self.max_backups, "pruned stale backups");
        }
        Ok(stale.len())
    }

    // Every `<file>.bkp.<digits>` file, whatever the limit.
    fn scan_backups(&self) -> Result<Vec<usize>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::from_io(&self.dir, e)),
        };

        let prefix = format!("{}.{}.", self.base_name, BACKUP_EXTENSION);
        let mut indices = Vec::new();

        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if let Some(index) = parse_backup_index(name, &prefix) {
                indices.push(index);
            }
        }

        indices.sort_unstable();
        Ok(indices)
    }

    /// Number of backup files currently on disk
    pub fn count_backups(&self) -> Result<usize> {
        Ok(self.list_backups()?.len())
    }

    /// Compute CRC32 checksum of a file
    pub fn compute_checksum(path: &Path) -> Result<u32> {
        let file = File::open(path).map_err(|e| Error::from_io(path, e))?;
        let mut reader = BufReader::new(file);
        let mut hasher = crc32fast::Hasher::new();

        let mut buffer = [0u8; 8192];
        loop {
            let bytes_read = reader.read(&mut buffer)?;
            if bytes_read == 0 {
                break;
            }
            hasher.update(&buffer[..bytes_read]);
        }

        Ok(hasher.finalize())
    }

    fn read_file(path: &Path) -> Result<String> {
        let bytes = fs::read(path).map_err(|e| Error::from_io(path, e))?;
        // Stored text is always UTF-8; anything else is malformed content.
        String::from_utf8(bytes)
            .map_err(|e| Error::deserialization(format!("text of {}", path.display()), e))
    }

    fn remove_file(path: &Path) -> Result<()> {
        fs::remove_file(path).map_err(|e| Error::from_io(path, e))?;
        tracing::debug!(path = %path.display(), "removed file");
        Ok(())
    }
}

fn parse_backup_index(name: &str, prefix: &str) -> Option<usize> {
    let digits = name.strip_prefix(prefix)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

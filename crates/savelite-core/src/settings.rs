//! Persistence settings.
//!
//! A [`Settings`] value names where the document lives and how it is encoded
//! on disk. It is validated before any file-system binding is built from it.

use crate::error::{Error, Result};
use crate::validate::{validate_component, validate_root};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Default persistence root directory
pub const DEFAULT_ROOT: &str = "saves";
/// Default profile sub-directory
pub const DEFAULT_PROFILE: &str = "default";
/// Default file base name
pub const DEFAULT_FILE_NAME: &str = "save-game";
/// Default PBKDF2 iteration count used for key derivation
pub const DEFAULT_KDF_ITERATIONS: u32 = 10_000;
/// Default number of background worker threads
pub const DEFAULT_WORKER_THREADS: usize = 2;

/// Compression applied to the serialized document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CompressionMethod {
    /// Store the text as-is
    #[default]
    #[serde(alias = "none")]
    None,
    /// Gzip at the default level
    #[serde(alias = "gzip", alias = "Gzip")]
    GZip,
}

/// Encryption applied after compression
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EncryptionMethod {
    /// No encryption
    #[default]
    #[serde(alias = "none")]
    None,
    /// AES-256 with a passphrase-derived key
    #[serde(alias = "aes", alias = "AES")]
    Aes,
}

/// How backup slots are filled on flush
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BackupRotation {
    /// Every slot receives a copy of the freshly written primary file
    #[default]
    #[serde(alias = "mirror")]
    Mirror,
    /// Existing backups move up one slot and slot 0 receives the new copy
    #[serde(alias = "shift")]
    Shift,
}

/// Persistence configuration
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Top-level directory for all profiles
    #[serde(rename = "persistence_root")]
    pub root: PathBuf,
    /// Sub-directory under the root
    #[serde(rename = "persistence_profile")]
    pub profile: String,
    /// File base name, without extension
    #[serde(rename = "persistence_file")]
    pub file_name: String,
    /// Passphrase, required when encryption is enabled
    #[serde(rename = "encryption_passphrase")]
    pub passphrase: Option<String>,
    /// Number of backup slots written on flush
    pub max_backups: usize,
    /// Compression method
    #[serde(rename = "compression_method")]
    pub compression: CompressionMethod,
    /// Encryption method
    #[serde(rename = "encryption_method")]
    pub encryption: EncryptionMethod,
    /// PBKDF2 rounds for key derivation
    pub kdf_iterations: u32,
    /// Backup rotation strategy
    #[serde(rename = "backup_rotation")]
    pub rotation: BackupRotation,
    /// Verify every backup copy with a CRC32 comparison
    pub verify_backups: bool,
    /// Size of the background worker pool
    pub worker_threads: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            root: PathBuf::from(DEFAULT_ROOT),
            profile: DEFAULT_PROFILE.to_string(),
            file_name: DEFAULT_FILE_NAME.to_string(),
            passphrase: None,
            max_backups: 0,
            compression: CompressionMethod::None,
            encryption: EncryptionMethod::None,
            kdf_iterations: DEFAULT_KDF_ITERATIONS,
            rotation: BackupRotation::Mirror,
            verify_backups: true,
            worker_threads: DEFAULT_WORKER_THREADS,
        }
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("root", &self.root)
            .field("profile", &self.profile)
            .field("file_name", &self.file_name)
            .field("passphrase", &self.passphrase.as_ref().map(|_| "<redacted>"))
            .field("max_backups", &self.max_backups)
            .field("compression", &self.compression)
            .field("encryption", &self.encryption)
            .field("kdf_iterations", &self.kdf_iterations)
            .field("rotation", &self.rotation)
            .field("verify_backups", &self.verify_backups)
            .field("worker_threads", &self.worker_threads)
            .finish()
    }
}

impl Settings {
    /// Create settings with all defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the persistence root
    pub fn with_root<P: Into<PathBuf>>(mut self, root: P) -> Self {
        self.root = root.into();
        self
    }

    /// Set the profile sub-directory
    pub fn with_profile<S: Into<String>>(mut self, profile: S) -> Self {
        self.profile = profile.into();
        self
    }

    /// Set the file base name
    pub fn with_file_name<S: Into<String>>(mut self, file_name: S) -> Self {
        self.file_name = file_name.into();
        self
    }

    /// Set the encryption passphrase
    pub fn with_passphrase<S: Into<String>>(mut self, passphrase: S) -> Self {
        self.passphrase = Some(passphrase.into());
        self
    }

    /// Set the number of backup slots
    pub fn with_max_backups(mut self, max_backups: usize) -> Self {
        self.max_backups = max_backups;
        self
    }

    /// Set the compression method
    pub fn with_compression(mut self, compression: CompressionMethod) -> Self {
        self.compression = compression;
        self
    }

    /// Set the encryption method
    pub fn with_encryption(mut self, encryption: EncryptionMethod) -> Self {
        self.encryption = encryption;
        self
    }

    /// Set the PBKDF2 iteration count
    pub fn with_kdf_iterations(mut self, iterations: u32) -> Self {
        self.kdf_iterations = iterations;
        self
    }

    /// Set the backup rotation strategy
    pub fn with_rotation(mut self, rotation: BackupRotation) -> Self {
        self.rotation = rotation;
        self
    }

    /// Enable or disable CRC32 verification of backup copies
    pub fn with_verify_backups(mut self, verify: bool) -> Self {
        self.verify_backups = verify;
        self
    }

    /// Set the worker pool size
    pub fn with_worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = threads;
        self
    }

    /// Directory holding the primary file and its backups
    pub fn directory(&self) -> PathBuf {
        self.root.join(&self.profile)
    }

    /// Check every invariant the file store and codec rely on
    pub fn validate(&self) -> Result<()> {
        validate_root(&self.root.to_string_lossy())?;
        validate_component("Profile", &self.profile)?;
        validate_component("File name", &self.file_name)?;

        if self.encryption != EncryptionMethod::None
            && self.passphrase.as_deref().map_or(true, str::is_empty)
        {
            return Err(Error::InvalidConfig(
                "Encryption requires a non-empty passphrase".to_string(),
            ));
        }

        if self.kdf_iterations == 0 {
            return Err(Error::InvalidConfig(
                "Key derivation needs at least one iteration".to_string(),
            ));
        }

        if self.worker_threads == 0 {
            return Err(Error::InvalidConfig(
                "Worker pool needs at least one thread".to_string(),
            ));
        }

        Ok(())
    }

    /// Parse settings from JSON, filling in defaults, and validate them
    pub fn from_json_str(json: &str) -> Result<Self> {
        let settings: Settings = serde_json::from_str(json)
            .map_err(|e| Error::InvalidConfig(format!("Malformed settings: {}", e)))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Read settings from a JSON file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| Error::from_io(path, e))?;
        Self::from_json_str(&json)
    }
}

//! # SaveLite Codec
//!
//! Transform pipeline between the document's JSON text and the string that
//! is written to disk.
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
//! ```text
//! write:  json text → compress → encrypt → base64 → file
//! read:   file → base64 → decrypt → decompress → json text
//! ```
//!
//! Base64 framing is only applied when at least one transform is enabled,
//! so a `None`/`None` pipeline stores plain JSON.

#![warn(missing_docs)]
#![warn(clippy::all)]

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use savelite_core::{CompressionMethod, EncryptionMethod, Error, Result, Settings};

pub mod compression;
pub mod encryption;

pub use compression::{compress, decompress};
pub use encryption::{derive_key, Cipher};

/// Compression + encryption pipeline
pub struct Codec {
    compression: CompressionMethod,
    cipher: Cipher,
}

impl Codec {
    /// Build a pipeline; derives the encryption key if needed
    pub fn new(
        compression: CompressionMethod,
        encryption: EncryptionMethod,
        passphrase: Option<&str>,
        kdf_iterations: u32,
    ) -> Result<Self> {
        Ok(Self {
            compression,
            cipher: Cipher::new(encryption, passphrase, kdf_iterations)?,
        })
    }

    /// Build the pipeline described by `settings`
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Self::new(
            settings.compression,
            settings.encryption,
            settings.passphrase.as_deref(),
            settings.kdf_iterations,
        )
    }

    /// A pipeline that stores text unchanged
    pub fn plain() -> Self {
        Self {
            compression: CompressionMethod::None,
            cipher: Cipher::none(),
        }
    }

    /// Returns true if stored data is base64 framed
    pub fn is_framed(&self) -> bool {
        self.compression != CompressionMethod::None
            || self.cipher.method() != EncryptionMethod::None
    }

    /// Compression method in use
    pub fn compression(&self) -> CompressionMethod {
        self.compression
    }

    /// Encryption method in use
    pub fn encryption(&self) -> EncryptionMethod {
        self.cipher.method()
    }

    /// Write path: compress, then encrypt, then base64
    pub fn encode(&self, text: &str) -> Result<String> {
        if text.is_empty() || !self.is_framed() {
            return Ok(text.to_string());
        }

        let packed = compress(self.compression, text.as_bytes())?;
        let sealed = self.cipher.encrypt(&packed)?;
        tracing::trace!(
            plain = text.len(),
            stored = sealed.len(),
            "encoded document payload"
        );
        Ok(STANDARD.encode(sealed))
    }

    /// Read path: base64, then decrypt, then decompress
    pub fn decode(&self, stored: &str) -> Result<String> {
        if stored.is_empty() || !self.is_framed() {
            return Ok(stored.to_string());
        }

        let sealed = STANDARD
            .decode(stored.trim())
            .map_err(|e| Error::Codec(format!("invalid base64 framing: {}", e)))?;
        let packed = self.cipher.decrypt(&sealed)?;
        let text = decompress(self.compression, &packed)?;
        String::from_utf8(text)
            .map_err(|e| Error::Codec(format!("decoded text is not UTF-8: {}", e)))
    }
}

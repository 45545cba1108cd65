//! AES encryption stage.
//!
//! The 256-bit key is derived from the passphrase with PBKDF2-HMAC-SHA256.
//! The salt is a fixed constant, so equal passphrases always produce equal
//! keys; this is a known weakness kept for compatibility of existing saves.
//!
//! Layout of an encrypted payload:
//!
//! ```text
//! [nonce: 12 bytes][ciphertext][tag: 16 bytes]
//! ```

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Nonce};
use savelite_core::{EncryptionMethod, Error, Result};
use sha2::Sha256;

/// Fixed key-derivation salt
const KDF_SALT: &[u8] = b"savelite/document-store/v1";
/// AES-GCM nonce length
pub const NONCE_LEN: usize = 12;
/// AES-GCM authentication tag length
pub const TAG_LEN: usize = 16;

/// Derive a 256-bit key from a passphrase
pub fn derive_key(passphrase: &str, iterations: u32) -> [u8; 32] {
    let mut key = [0u8; 32];
    pbkdf2::pbkdf2_hmac::<Sha256>(passphrase.as_bytes(), KDF_SALT, iterations, &mut key);
    key
}

/// Encrypts and decrypts payloads with a key derived once at construction
pub struct Cipher {
    method: EncryptionMethod,
    aead: Option<Aes256Gcm>,
}

impl Cipher {
    /// Build a cipher for `method`
    ///
    /// A passphrase is required for every method except `None`.
    pub fn new(
        method: EncryptionMethod,
        passphrase: Option<&str>,
        iterations: u32,
    ) -> Result<Self> {
        let aead = match method {
            EncryptionMethod::None => None,
            EncryptionMethod::Aes => {
                let passphrase = passphrase.filter(|p| !p.is_empty()).ok_or_else(|| {
                    Error::InvalidConfig("Encryption requires a non-empty passphrase".to_string())
                })?;
                let key = derive_key(passphrase, iterations);
                let aead = Aes256Gcm::new_from_slice(&key)
                    .map_err(|e| Error::Codec(format!("invalid key length: {}", e)))?;
                Some(aead)
            }
        };

        Ok(Self { method, aead })
    }

    /// A cipher that passes data through unchanged
    pub fn none() -> Self {
        Self {
            method: EncryptionMethod::None,
            aead: None,
        }
    }

    /// Encryption method in use
    pub fn method(&self) -> EncryptionMethod {
        self.method
    }

    /// Encrypt `data`; empty input yields empty output
    pub fn encrypt(&self, data: &[u8]) -> Result<Vec<u8>> {
        if data.is_empty() {
            return Ok(Vec::new());
        }

        let Some(aead) = &self.aead else {
            return Ok(data.to_vec());
        };

        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = aead
            .encrypt(&nonce, data)
            .map_err(|_| Error::Codec("encryption failure".to_string()))?;

        let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        out.extend_from_slice(nonce.as_slice());
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    /// Reverse [`Cipher::encrypt`]
    pub fn decrypt(&self, data: &[u8]) -> Result<Vec<u8>> {
        if data.is_empty() {
            return Ok(Vec::new());
        }

        let Some(aead) = &self.aead else {
            return Ok(data.to_vec());
        };

        if data.len() < NONCE_LEN + TAG_LEN {
            return Err(Error::Codec(format!(
                "encrypted payload too short: {} bytes",
                data.len()
            )));
        }

        let (nonce, ciphertext) = data.split_at(NONCE_LEN);
        aead.decrypt(nonce_ref(nonce), ciphertext).map_err(|_| {
            Error::Codec("decryption failure (wrong passphrase or corrupt data)".to_string())
        })
    }
}

// aes-gcm relies on generic-array 0.14, so suppress the upstream deprecation locally.
#[allow(deprecated)]
fn nonce_ref(bytes: &[u8]) -> &Nonce<<Aes256Gcm as AeadCore>::NonceSize> {
    Nonce::from_slice(bytes)
}

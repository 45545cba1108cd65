//! Typed read/write access to the document.
//!
//! Two styles are offered: `read`/`write` return a [`Result`], while
//! `try_read`/`try_write` swallow the error and log it.

use crate::engine::Persistence;
use savelite_core::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;

impl Persistence {
    /// Returns true if the document holds `key`
    pub fn has(&self, key: &str) -> bool {
        self.with_document(|doc| doc.has(key)).unwrap_or(false)
    }

    /// Remove `key`, returning true if it existed
    pub fn remove(&self, key: &str) -> Result<bool> {
        self.with_document_mut(|doc| doc.remove(key))
    }

    /// Read `key` as `T`
    ///
    /// A missing key reports [`Error::NotLoaded`] while no load has
    /// succeeded yet, and [`Error::KeyNotFound`] afterwards.
    pub fn read<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        match self.with_document(|doc| doc.get_as::<T>(key))? {
            Err(Error::KeyNotFound(_)) if !self.is_loaded() => Err(Error::NotLoaded),
            other => other,
        }
    }

    /// Store `value` under `key`
    ///
    /// Writes are accepted before the first load, so a new save can be built
    /// from scratch.
    pub fn write<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        self.with_document_mut(|doc| doc.set(key, value))?
    }

    /// Read `key` as `T`, or `None` on any failure
    pub fn try_read<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self.read(key) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::debug!(key, error = %e, "typed read failed");
                None
            }
        }
    }

    /// Store `value` under `key`; returns false on failure
    pub fn try_write<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> bool {
        match self.write(key, value) {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!(key, error = %e, "typed write failed");
                false
            }
        }
    }
}

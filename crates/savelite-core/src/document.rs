//! The in-memory document.
//!
//! A document maps string keys to JSON values. Values are stored in their
//! serialized form and converted to a concrete type on read.

use crate::error::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Key/value document holding application state
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    entries: BTreeMap<String, Value>,
}

impl Document {
    /// Create an empty document
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a document from its on-disk JSON text
    ///
    /// The text must hold a JSON object; anything else is a deserialization
    /// error.
    pub fn from_json(text: &str) -> Result<Self> {
        let entries: BTreeMap<String, Value> =
            serde_json::from_str(text).map_err(|e| Error::deserialization("document", e))?;
        Ok(Self { entries })
    }

    /// Render the document as JSON text
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(&self.entries).map_err(|e| Error::serialization("document", e))
    }

    /// Returns true if the key is present
    pub fn has(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Remove a key, returning true if it existed
    pub fn remove(&mut self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Store a value, replacing any previous entry for the key
    pub fn set<T: Serialize + ?Sized>(&mut self, key: impl Into<String>, value: &T) -> Result<()> {
        let key = key.into();
        let value = serde_json::to_value(value)
            .map_err(|e| Error::serialization(format!("value for key '{}'", key), e))?;
        self.entries.insert(key, value);
        Ok(())
    }

    /// Read a value as `T`
    ///
    /// Fails with [`Error::KeyNotFound`] for a missing key and with
    /// [`Error::Deserialization`] if the stored value has a different shape.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        let value = self
            .entries
            .get(key)
            .ok_or_else(|| Error::KeyNotFound(key.to_string()))?;
        T::deserialize(value).map_err(|e| Error::deserialization(format!("key '{}'", key), e))
    }

    /// Raw stored value for a key
    pub fn get_raw(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    /// Iterate over keys in sorted order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the document holds no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every entry
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

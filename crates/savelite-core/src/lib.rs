//! # SaveLite Core
//!
//! Core types for the SaveLite document store.
//!
//! ## ⚠️ Internal Implementation Detail
//!
//! **This crate is an internal implementation detail of SaveLite.**
//!
//! Users should depend on the main [`savelite`](https://crates.io/crates/savelite) crate
//! instead, which provides the stable public API. This crate's API may change
//! without notice between minor versions.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod document;
pub mod error;
pub mod settings;
pub mod validate;

pub use document::Document;
pub use error::{BoxError, Error, ErrorKind, Result};
pub use settings::{BackupRotation, CompressionMethod, EncryptionMethod, Settings};

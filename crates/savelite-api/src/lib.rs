//! # SaveLite
//!
//! A small file-backed document store for application state such as save
//! games: an in-memory key/value document that is loaded from disk, mutated,
//! and flushed back with optional compression, optional passphrase-based
//! encryption, and numbered backups.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use savelite::{CompressionMethod, EncryptionMethod, Persistence, Settings};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let settings = Settings::new()
//!         .with_root("saves")
//!         .with_profile("alice")
//!         .with_max_backups(2)
//!         .with_compression(CompressionMethod::GZip)
//!         .with_encryption(EncryptionMethod::Aes)
//!         .with_passphrase("correct horse battery staple");
//!
//!     let saves = Persistence::new(settings)?;
//!
//!     // A missing save is fine on first launch
//!     let report = saves.load(true, true).wait()?;
//!     if report.not_found {
//!         println!("starting a new game");
//!     }
//!
//!     saves.write("level", &3)?;
//!     saves.write("inventory", &["sword", "shield"])?;
//!
//!     let report = saves.flush().wait()?;
//!     if let Some(problem) = report.problem {
//!         eprintln!("save failed: {}", problem);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## On-disk layout
//!
//! ```text
//! <root>/<profile>/<file>.dat      primary document
//! <root>/<profile>/<file>.bkp.<N>  backup N, for N in [0, max_backups)
//! ```
//!
//! Stored text is plain JSON, or `base64(aes(gzip(json)))` (or any
//! sub-combination) when compression or encryption is enabled.
//!
//! ## Notifications
//!
//! Operations never block the caller. Each returns a [`Pending`] handle, and
//! the same report is delivered to listeners registered on
//! [`Persistence::events`]. Listener failures are routed to
//! [`Events::on_fault`] instead of escaping the worker thread.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![cfg_attr(docsrs, feature(doc_cfg))]

mod access;
pub mod engine;
pub mod events;
pub mod logging;
pub mod pool;

pub use engine::Persistence;
pub use events::{
    DeleteReport, Events, Fault, FlushReport, ListenerError, ListenerPanic, ListenerResult,
    LoadReport, OperationKind,
};
pub use pool::{Pending, WorkerPool};

// Re-export core types
pub use savelite_core::{
    BackupRotation, CompressionMethod, Document, EncryptionMethod, Error, ErrorKind, Result,
    Settings,
};

// Building blocks
pub use savelite_codec::Codec;
pub use savelite_store::BackupFileStore;

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

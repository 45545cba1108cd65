//! The persistence engine.
//!
//! [`Persistence`] owns the in-memory [`Document`] and a binding to the file
//! store and codec. Operations are submitted to the worker pool and return a
//! [`Pending`] report immediately; the same report is handed to the
//! listeners registered on [`Persistence::events`].
//!
//! Disk operations on one instance are serialized by an internal lock, so a
//! load can never interleave with a flush on the same document.

use crate::events::{DeleteReport, Events, FlushReport, LoadReport, OperationKind};
use crate::pool::{Pending, WorkerPool};
use savelite_codec::Codec;
use savelite_core::{BackupRotation, Document, Error, Result, Settings};
use savelite_store::BackupFileStore;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tracing::{debug, info, warn};

/// Settings, file store and codec that are swapped as one unit
struct Binding {
    settings: Settings,
    store: BackupFileStore,
    codec: Codec,
}

impl Binding {
    fn new(settings: Settings) -> Result<Self> {
        settings.validate()?;
        let store = BackupFileStore::from_settings(&settings)?;
        let codec = Codec::from_settings(&settings)?;
        Ok(Self {
            settings,
            store,
            codec,
        })
    }

    /// Live backup count; enumeration failures count as zero
    fn backup_count(&self) -> usize {
        match self.store.count_backups() {
            Ok(count) => count,
            Err(e) => {
                warn!(error = %e, "could not enumerate backups");
                0
            }
        }
    }
}

/// Which file a load reads from
#[derive(Debug, Clone, Copy)]
enum Source {
    Primary,
    Backup(usize),
}

#[derive(Debug, Default)]
struct LoadFlags {
    empty_file: bool,
    not_found: bool,
}

struct EngineInner {
    binding: RwLock<Arc<Binding>>,
    document: RwLock<Document>,
    loaded: AtomicBool,
    /// Serializes disk operations on this instance
    disk: Mutex<()>,
    events: Events,
    pool: WorkerPool,
}

/// Handle to a file-backed document
///
/// Cloning the handle shares the same document, binding and listeners.
///
/// # Examples
///
/// ```rust,no_run
/// use savelite::{Persistence, Settings};
///
/// let saves = Persistence::new(Settings::new().with_root("saves"))?;
/// saves.write("gold", &250)?;
///
/// let report = saves.flush().wait()?;
/// assert!(report.is_success());
/// # Ok::<(), savelite::Error>(())
/// ```
#[derive(Clone)]
pub struct Persistence {
    inner: Arc<EngineInner>,
}

impl Persistence {
    /// Create an engine with its own worker pool
    ///
    /// Nothing is read from disk until [`Persistence::load`] is called.
    pub fn new(settings: Settings) -> Result<Self> {
        settings.validate()?;
        let pool = WorkerPool::new(settings.worker_threads)?;
        Self::with_pool(settings, pool)
    }

    /// Create an engine that submits its work to an existing pool
    pub fn with_pool(settings: Settings, pool: WorkerPool) -> Result<Self> {
        let binding = Binding::new(settings)?;

        info!(
            path = %binding.store.primary_path().display(),
            compression = ?binding.settings.compression,
            encryption = ?binding.settings.encryption,
            max_backups = binding.settings.max_backups,
            "opening persistence engine"
        );

        Ok(Self {
            inner: Arc::new(EngineInner {
                binding: RwLock::new(Arc::new(binding)),
                document: RwLock::new(Document::new()),
                loaded: AtomicBool::new(false),
                disk: Mutex::new(()),
                events: Events::new(),
                pool,
            }),
        })
    }

    /// Listener registry of this instance
    pub fn events(&self) -> &Events {
        &self.inner.events
    }

    /// The worker pool operations run on
    pub fn pool(&self) -> &WorkerPool {
        &self.inner.pool
    }

    /// Current settings
    pub fn settings(&self) -> Result<Settings> {
        Ok(self.inner.binding()?.settings.clone())
    }

    /// Path of the primary file under the current binding
    pub fn primary_path(&self) -> Result<PathBuf> {
        Ok(self.inner.binding()?.store.primary_path())
    }

    /// Path of backup slot `index` under the current binding
    pub fn backup_path(&self, index: usize) -> Result<PathBuf> {
        Ok(self.inner.binding()?.store.backup_path(index))
    }

    /// Live number of backup files on disk
    pub fn backup_count(&self) -> Result<usize> {
        self.inner.binding()?.store.count_backups()
    }

    /// Returns true once a load has populated the document
    pub fn is_loaded(&self) -> bool {
        self.inner.loaded.load(Ordering::Acquire)
    }

    /// Replace all settings
    ///
    /// The new file store and codec are built first and swapped in as one
    /// unit; operations already running keep the binding they started with.
    pub fn reconfigure(&self, settings: Settings) -> Result<()> {
        let binding = Arc::new(Binding::new(settings)?);
        let mut slot = self
            .inner
            .binding
            .write()
            .map_err(|_| Error::LockPoisoned)?;
        debug!(path = %binding.store.primary_path().display(), "rebinding file store");
        *slot = binding;
        Ok(())
    }

    /// Change the persistence root
    pub fn set_root(&self, root: impl Into<PathBuf>) -> Result<()> {
        let root = root.into();
        self.update_settings(move |s| s.with_root(root))
    }

    /// Change the profile sub-directory
    pub fn set_profile(&self, profile: impl Into<String>) -> Result<()> {
        let profile = profile.into();
        self.update_settings(move |s| s.with_profile(profile))
    }

    /// Change the file base name
    pub fn set_file_name(&self, file_name: impl Into<String>) -> Result<()> {
        let file_name = file_name.into();
        self.update_settings(move |s| s.with_file_name(file_name))
    }

    /// Change the number of backup slots
    pub fn set_max_backups(&self, max_backups: usize) -> Result<()> {
        self.update_settings(move |s| s.with_max_backups(max_backups))
    }

    fn update_settings(&self, change: impl FnOnce(Settings) -> Settings) -> Result<()> {
        // Hold the write lock across read-modify-swap so concurrent updates
        // cannot lose each other's changes.
        let mut slot = self
            .inner
            .binding
            .write()
            .map_err(|_| Error::LockPoisoned)?;
        let settings = change(slot.settings.clone());
        let binding = Arc::new(Binding::new(settings)?);
        debug!(path = %binding.store.primary_path().display(), "rebinding file store");
        *slot = binding;
        Ok(())
    }

    /// Load the primary file into the document
    ///
    /// * `may_be_empty` - an empty file yields an empty document instead of a problem
    /// * `may_not_exist` - a missing file is a success that leaves the document as is
    pub fn load(&self, may_be_empty: bool, may_not_exist: bool) -> Pending<LoadReport> {
        let inner = Arc::clone(&self.inner);
        self.inner.pool.submit(move || {
            let report = inner.run_load(may_be_empty, may_not_exist);
            inner.events.emit_load(&report);
            report
        })
    }

    /// Load the first usable backup into the document
    pub fn load_backup(&self, may_be_empty: bool, may_not_exist: bool) -> Pending<LoadReport> {
        let inner = Arc::clone(&self.inner);
        self.inner.pool.submit(move || {
            let report = inner.run_load_backup(may_be_empty, may_not_exist);
            inner.events.emit_load(&report);
            report
        })
    }

    /// Write the document to disk, then fill the backup slots
    pub fn flush(&self) -> Pending<FlushReport> {
        let inner = Arc::clone(&self.inner);
        self.inner.pool.submit(move || {
            let report = inner.run_flush();
            inner.events.emit_flush(&report);
            report
        })
    }

    /// Remove the primary file
    pub fn delete(&self) -> Pending<DeleteReport> {
        let inner = Arc::clone(&self.inner);
        self.inner.pool.submit(move || {
            let _disk = inner.lock_disk();
            let report = inner.run_delete();
            inner.events.emit_delete(&report);
            report
        })
    }

    /// Remove backup slot `index`
    pub fn delete_backup(&self, index: usize) -> Pending<DeleteReport> {
        let inner = Arc::clone(&self.inner);
        self.inner.pool.submit(move || {
            let _disk = inner.lock_disk();
            let report = inner.run_delete_backup(index);
            inner.events.emit_delete(&report);
            report
        })
    }

    /// Remove the primary file and every backup
    ///
    /// Each step is reported on its own, in order: the primary deletion,
    /// then one report per backup from the highest index down.
    pub fn purge(&self) -> Pending<Vec<DeleteReport>> {
        let inner = Arc::clone(&self.inner);
        self.inner.pool.submit(move || {
            let _disk = inner.lock_disk();
            let mut reports = Vec::new();

            let report = inner.run_delete();
            inner.events.emit_delete(&report);
            reports.push(report);

            let binding = match inner.binding() {
                Ok(binding) => binding,
                Err(e) => {
                    warn!(error = %e, "purge could not read the binding");
                    return reports;
                }
            };

            // Walk the slots actually on disk so gaps are neither retried nor skipped.
            let mut indices = match binding.store.list_backups() {
                Ok(indices) => indices,
                Err(e) => {
                    warn!(error = %e, "could not enumerate backups");
                    Vec::new()
                }
            };
            indices.reverse();
            for index in indices {
                let report = inner.remove_backup(&binding, index);
                inner.events.emit_delete(&report);
                reports.push(report);
            }

            if let Err(e) = binding.store.prune_backups() {
                warn!(error = %e, "could not remove stale backups");
            }

            info!(steps = reports.len(), "purge complete");
            reports
        })
    }

    /// Run `f` with shared access to the document
    pub fn with_document<R>(&self, f: impl FnOnce(&Document) -> R) -> Result<R> {
        let document = self
            .inner
            .document
            .read()
            .map_err(|_| Error::LockPoisoned)?;
        Ok(f(&document))
    }

    /// Run `f` with exclusive access to the document
    pub fn with_document_mut<R>(&self, f: impl FnOnce(&mut Document) -> R) -> Result<R> {
        let mut document = self
            .inner
            .document
            .write()
            .map_err(|_| Error::LockPoisoned)?;
        Ok(f(&mut document))
    }

    /// Copy of the current document
    pub fn snapshot(&self) -> Result<Document> {
        self.with_document(Document::clone)
    }
}

impl std::fmt::Debug for Persistence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut s = f.debug_struct("Persistence");
        if let Ok(binding) = self.inner.binding() {
            s.field("settings", &binding.settings);
        }
        s.field("loaded", &self.is_loaded())
            .field("pool", &self.inner.pool)
            .finish()
    }
}

impl EngineInner {
    fn binding(&self) -> Result<Arc<Binding>> {
        self.binding
            .read()
            .map(|b| Arc::clone(&b))
            .map_err(|_| Error::LockPoisoned)
    }

    fn lock_disk(&self) -> std::sync::MutexGuard<'_, ()> {
        // The guard protects no data, so a poisoned lock is still usable.
        self.disk.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn replace_document(&self, document: Document) -> Result<()> {
        let mut current = self.document.write().map_err(|_| Error::LockPoisoned)?;
        *current = document;
        self.loaded.store(true, Ordering::Release);
        Ok(())
    }

    fn run_load(&self, may_be_empty: bool, may_not_exist: bool) -> LoadReport {
        let _disk = self.lock_disk();
        let mut report = LoadReport::new(OperationKind::Load);

        let binding = match self.binding() {
            Ok(binding) => binding,
            Err(e) => {
                report.problem = Some(e);
                return report;
            }
        };

        debug!(path = %binding.store.primary_path().display(), "loading document");

        let mut flags = LoadFlags::default();
        let outcome = self.load_from(
            &binding,
            Source::Primary,
            may_be_empty,
            may_not_exist,
            &mut flags,
        );

        report.empty_file = flags.empty_file;
        report.not_found = flags.not_found;
        report.backup_count = binding.backup_count();
        report.problem = outcome.err();

        match &report.problem {
            None => info!(
                not_found = report.not_found,
                empty_file = report.empty_file,
                "load complete"
            ),
            Some(e) => warn!(error = %e, "load failed"),
        }
        report
    }

    fn run_load_backup(&self, may_be_empty: bool, may_not_exist: bool) -> LoadReport {
        let _disk = self.lock_disk();
        let mut report = LoadReport::new(OperationKind::LoadBackup);

        let binding = match self.binding() {
            Ok(binding) => binding,
            Err(e) => {
                report.problem = Some(e);
                return report;
            }
        };

        let mut indices = match binding.store.list_backups() {
            Ok(indices) => indices,
            Err(e) => {
                report.problem = Some(e);
                return report;
            }
        };
        report.backup_count = indices.len();

        if indices.is_empty() {
            report.backup_index = Some(report.backup_count);
            report.problem = Some(Error::NoBackups);
            warn!("no backups available");
            return report;
        }

        // Mirror fills every slot with the same copy and scans from the top;
        // Shift keeps the newest copy in slot 0 and scans from there.
        if binding.settings.rotation == BackupRotation::Mirror {
            indices.reverse();
        }

        let attempts = indices.len();
        let mut last: Option<(usize, Error, LoadFlags)> = None;

        for index in indices {
            let mut flags = LoadFlags::default();
            let outcome = self.load_from(
                &binding,
                Source::Backup(index),
                may_be_empty,
                may_not_exist,
                &mut flags,
            );
            match outcome {
                Ok(()) => {
                    report.backup_index = Some(index);
                    report.empty_file = flags.empty_file;
                    report.not_found = flags.not_found;
                    report.backup_count = binding.backup_count();
                    info!(index, "backup load complete");
                    return report;
                }
                Err(e) => {
                    debug!(index, error = %e, "backup unusable, trying next");
                    last = Some((index, e, flags));
                }
            }
        }

        report.backup_count = binding.backup_count();
        if let Some((index, error, flags)) = last {
            report.backup_index = Some(index);
            report.empty_file = flags.empty_file;
            report.not_found = flags.not_found;
            report.problem = Some(Error::BackupsExhausted {
                attempts,
                last: Box::new(error),
            });
        }

        if let Some(e) = &report.problem {
            warn!(error = %e, "backup load failed");
        }
        report
    }

    /// Read, decode and install one file
    fn load_from(
        &self,
        binding: &Binding,
        source: Source,
        may_be_empty: bool,
        may_not_exist: bool,
        flags: &mut LoadFlags,
    ) -> Result<()> {
        let (path, raw) = match source {
            Source::Primary => (binding.store.primary_path(), binding.store.read_primary()),
            Source::Backup(index) => (
                binding.store.backup_path(index),
                binding.store.read_backup(index),
            ),
        };

        let raw = match raw {
            Ok(raw) => raw,
            Err(e) if e.is_not_found() => {
                flags.not_found = true;
                return if may_not_exist { Ok(()) } else { Err(e) };
            }
            Err(e) => return Err(e),
        };

        let text = binding
            .codec
            .decode(&raw)
            .map_err(|e| Error::deserialization(format!("payload of {}", path.display()), e))?;

        if text.is_empty() {
            flags.empty_file = true;
            if may_be_empty {
                return self.replace_document(Document::new());
            }
            return Err(Error::EmptyFile { path });
        }

        let document = Document::from_json(&text)?;
        debug!(keys = document.len(), path = %path.display(), "parsed document");
        self.replace_document(document)
    }

    fn run_flush(&self) -> FlushReport {
        let _disk = self.lock_disk();

        // Collaborators finalize pending writes before anything is serialized.
        self.events.emit_save_preparing();

        let mut report = FlushReport {
            problem: None,
            backup_count: 0,
            backup_index: None,
        };

        let binding = match self.binding() {
            Ok(binding) => binding,
            Err(e) => {
                report.problem = Some(e);
                return report;
            }
        };

        if let Err(e) = self.write_primary(&binding) {
            let problem = match e {
                e @ Error::Serialization { .. } => e,
                e => Error::serialization("flush", e),
            };
            warn!(error = %problem, "flush failed, backups not attempted");
            report.problem = Some(problem);
            report.backup_count = binding.backup_count();
            return report;
        }

        if let Err((index, e)) = Self::rotate_backups(&binding) {
            report.backup_index = Some(index);
            report.problem = Some(if e.is_not_found() {
                e
            } else {
                Error::BackupFailed {
                    index,
                    source: Box::new(e),
                }
            });
        }

        report.backup_count = binding.backup_count();

        match &report.problem {
            None => info!(backups = report.backup_count, "flush complete"),
            Some(e) => warn!(error = %e, index = ?report.backup_index, "backup rotation failed"),
        }
        report
    }

    fn write_primary(&self, binding: &Binding) -> Result<()> {
        binding.store.ensure_directory()?;

        let text = {
            let document = self.document.read().map_err(|_| Error::LockPoisoned)?;
            document.to_json()?
        };
        let stored = binding.codec.encode(&text)?;
        binding.store.write_primary(&stored)
    }

    /// Fill the backup slots from the primary file and drop slots beyond the
    /// limit; on failure returns the slot that was being written, or
    /// `max_backups` if pruning failed
    fn rotate_backups(binding: &Binding) -> std::result::Result<(), (usize, Error)> {
        let max = binding.settings.max_backups;

        match binding.settings.rotation {
            BackupRotation::Mirror => {
                for index in 0..max {
                    binding
                        .store
                        .backup_from_primary(index)
                        .map_err(|e| (index, e))?;
                }
            }
            BackupRotation::Shift if max > 0 => {
                binding.store.shift_backups().map_err(|e| (0, e))?;
                binding.store.backup_from_primary(0).map_err(|e| (0, e))?;
            }
            BackupRotation::Shift => {}
        }

        // Slots left over from a larger limit would otherwise outlive the
        // data they were copied from.
        binding.store.prune_backups().map_err(|e| (max, e))?;
        Ok(())
    }

    fn run_delete(&self) -> DeleteReport {
        let mut report = DeleteReport {
            operation: OperationKind::Delete,
            problem: None,
            backup_count: 0,
            backup_index: None,
        };

        match self.binding() {
            Ok(binding) => {
                if let Err(e) = binding.store.delete_primary() {
                    report.problem = Some(Error::DeletionFailed {
                        source: Box::new(e),
                    });
                }
                report.backup_count = binding.backup_count();
            }
            Err(e) => report.problem = Some(e),
        }

        match &report.problem {
            None => info!("primary file deleted"),
            Some(e) => warn!(error = %e, "delete failed"),
        }
        report
    }

    fn run_delete_backup(&self, index: usize) -> DeleteReport {
        let mut report = DeleteReport {
            operation: OperationKind::DeleteBackup,
            problem: None,
            backup_count: 0,
            backup_index: Some(index),
        };

        let binding = match self.binding() {
            Ok(binding) => binding,
            Err(e) => {
                report.problem = Some(e);
                return report;
            }
        };

        let count = binding.backup_count();
        if index >= count {
            report.backup_count = count;
            report.problem = Some(Error::InvalidBackupIndex { index, count });
            warn!(index, count, "backup index out of range");
            return report;
        }

        self.remove_backup(&binding, index)
    }

    /// Delete one backup slot without the range check
    fn remove_backup(&self, binding: &Binding, index: usize) -> DeleteReport {
        let mut report = DeleteReport {
            operation: OperationKind::DeleteBackup,
            problem: None,
            backup_count: 0,
            backup_index: Some(index),
        };

        if let Err(e) = binding.store.delete_backup(index) {
            report.problem = Some(Error::BackupDeletionFailed {
                index,
                source: Box::new(e),
            });
        }
        report.backup_count = binding.backup_count();

        match &report.problem {
            None => info!(index, "backup deleted"),
            Some(e) => warn!(index, error = %e, "backup delete failed"),
        }
        report
    }
}

//! Completion reports and per-instance listener registration.
//!
//! Every engine operation produces a report that is handed to the listeners
//! registered on that engine's [`Events`], on the worker thread that ran the
//! operation. A listener that returns an error or panics never takes the
//! worker down: its cause is wrapped in a [`Fault`] and sent to the fault
//! listeners instead.

use savelite_core::Error;
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, PoisonError, RwLock};

/// Error type listeners may return
pub type ListenerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type returned by listeners
pub type ListenerResult = std::result::Result<(), ListenerError>;

type Listener<T> = Arc<dyn Fn(&T) -> ListenerResult + Send + Sync>;
type Hook = Arc<dyn Fn() -> ListenerResult + Send + Sync>;
type FaultListener = Arc<dyn Fn(&Fault) + Send + Sync>;

/// Engine operation that produced a report or fault
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    /// Load of the primary file
    Load,
    /// Load from the backup set
    LoadBackup,
    /// Serialize and write, then rotate backups
    Flush,
    /// Removal of the primary file
    Delete,
    /// Removal of one backup file
    DeleteBackup,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OperationKind::Load => "load",
            OperationKind::LoadBackup => "load-backup",
            OperationKind::Flush => "flush",
            OperationKind::Delete => "delete",
            OperationKind::DeleteBackup => "delete-backup",
        };
        f.write_str(name)
    }
}

/// Outcome of a load or backup load
#[derive(Debug)]
pub struct LoadReport {
    /// `Load` or `LoadBackup`
    pub operation: OperationKind,
    /// Problem, if the operation failed
    pub problem: Option<Error>,
    /// Live backup count when the report was built
    pub backup_count: usize,
    /// Backup slot involved, `None` for the primary file
    pub backup_index: Option<usize>,
    /// The source file existed but held no content
    pub empty_file: bool,
    /// The source file or its directory was absent
    pub not_found: bool,
}

impl LoadReport {
    pub(crate) fn new(operation: OperationKind) -> Self {
        Self {
            operation,
            problem: None,
            backup_count: 0,
            backup_index: None,
            empty_file: false,
            not_found: false,
        }
    }

    /// Returns true if no problem was reported
    pub fn is_success(&self) -> bool {
        self.problem.is_none()
    }
}

/// Outcome of a flush
#[derive(Debug)]
pub struct FlushReport {
    /// Problem, if the operation failed
    pub problem: Option<Error>,
    /// Live backup count when the report was built
    pub backup_count: usize,
    /// Backup slot where rotation stopped, `None` if it completed or never ran
    pub backup_index: Option<usize>,
}

impl FlushReport {
    /// Returns true if no problem was reported
    pub fn is_success(&self) -> bool {
        self.problem.is_none()
    }
}

/// Outcome of a primary or backup deletion
#[derive(Debug)]
pub struct DeleteReport {
    /// `Delete` or `DeleteBackup`
    pub operation: OperationKind,
    /// Problem, if the operation failed
    pub problem: Option<Error>,
    /// Live backup count when the report was built
    pub backup_count: usize,
    /// Backup slot involved, `None` for the primary file
    pub backup_index: Option<usize>,
}

impl DeleteReport {
    /// Returns true if no problem was reported
    pub fn is_success(&self) -> bool {
        self.problem.is_none()
    }
}

/// A listener panicked while handling a report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerPanic {
    /// Panic message, if it was a string
    pub message: String,
}

impl ListenerPanic {
    fn from_payload(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        Self { message }
    }
}

impl fmt::Display for ListenerPanic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener panicked: {}", self.message)
    }
}

impl std::error::Error for ListenerPanic {}

/// A failure raised by a listener, re-routed to the fault channel
#[derive(Debug, Clone)]
pub struct Fault {
    /// Operation whose notification raised the fault
    pub operation: OperationKind,
    /// The error returned by the listener, or a [`ListenerPanic`]
    pub cause: Arc<dyn std::error::Error + Send + Sync + 'static>,
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} listener failed: {}", self.operation, self.cause)
    }
}

/// Listener registry owned by one engine instance
#[derive(Default)]
pub struct Events {
    save_preparing: RwLock<Vec<Hook>>,
    load: RwLock<Vec<Listener<LoadReport>>>,
    flush: RwLock<Vec<Listener<FlushReport>>>,
    delete: RwLock<Vec<Listener<DeleteReport>>>,
    fault: RwLock<Vec<FaultListener>>,
}

impl fmt::Debug for Events {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Events")
            .field("save_preparing", &len(&self.save_preparing))
            .field("load", &len(&self.load))
            .field("flush", &len(&self.flush))
            .field("delete", &len(&self.delete))
            .field("fault", &len(&self.fault))
            .finish()
    }
}

impl Events {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a hook that runs before the document is serialized on flush
    ///
    /// Hooks may write into the document through the engine handle.
    pub fn on_save_preparing<F>(&self, hook: F)
    where
        F: Fn() -> ListenerResult + Send + Sync + 'static,
    {
        push(&self.save_preparing, Arc::new(hook));
    }

    /// Register a listener for load and backup load reports
    pub fn on_load<F>(&self, listener: F)
    where
        F: Fn(&LoadReport) -> ListenerResult + Send + Sync + 'static,
    {
        push(&self.load, Arc::new(listener));
    }

    /// Register a listener for flush reports
    pub fn on_flush<F>(&self, listener: F)
    where
        F: Fn(&FlushReport) -> ListenerResult + Send + Sync + 'static,
    {
        push(&self.flush, Arc::new(listener));
    }

    /// Register a listener for primary and backup deletion reports
    pub fn on_delete<F>(&self, listener: F)
    where
        F: Fn(&DeleteReport) -> ListenerResult + Send + Sync + 'static,
    {
        push(&self.delete, Arc::new(listener));
    }

    /// Register a listener for faults raised by other listeners
    pub fn on_fault<F>(&self, listener: F)
    where
        F: Fn(&Fault) + Send + Sync + 'static,
    {
        push(&self.fault, Arc::new(listener));
    }

    /// Remove every registered listener
    pub fn clear(&self) {
        self.save_preparing.write().unwrap_or_else(PoisonError::into_inner).clear();
        self.load.write().unwrap_or_else(PoisonError::into_inner).clear();
        self.flush.write().unwrap_or_else(PoisonError::into_inner).clear();
        self.delete.write().unwrap_or_else(PoisonError::into_inner).clear();
        self.fault.write().unwrap_or_else(PoisonError::into_inner).clear();
    }

    pub(crate) fn emit_save_preparing(&self) {
        for hook in snapshot(&self.save_preparing) {
            self.isolate(OperationKind::Flush, || hook());
        }
    }

    pub(crate) fn emit_load(&self, report: &LoadReport) {
        for listener in snapshot(&self.load) {
            self.isolate(report.operation, || listener(report));
        }
    }

    pub(crate) fn emit_flush(&self, report: &FlushReport) {
        for listener in snapshot(&self.flush) {
            self.isolate(OperationKind::Flush, || listener(report));
        }
    }

    pub(crate) fn emit_delete(&self, report: &DeleteReport) {
        for listener in snapshot(&self.delete) {
            self.isolate(report.operation, || listener(report));
        }
    }

    /// Run one listener, converting an error or panic into a fault
    fn isolate(&self, operation: OperationKind, call: impl FnOnce() -> ListenerResult) {
        let cause: Arc<dyn std::error::Error + Send + Sync> =
            match panic::catch_unwind(AssertUnwindSafe(call)) {
                Ok(Ok(())) => return,
                Ok(Err(err)) => Arc::from(err),
                Err(payload) => Arc::new(ListenerPanic::from_payload(payload)),
            };

        self.raise(Fault { operation, cause });
    }

    fn raise(&self, fault: Fault) {
        tracing::warn!(operation = %fault.operation, cause = %fault.cause, "listener fault");

        for listener in snapshot(&self.fault) {
            if panic::catch_unwind(AssertUnwindSafe(|| listener(&fault))).is_err() {
                tracing::error!(operation = %fault.operation, "fault listener panicked");
            }
        }
    }
}

fn push<T: ?Sized>(list: &RwLock<Vec<Arc<T>>>, item: Arc<T>) {
    list.write().unwrap_or_else(PoisonError::into_inner).push(item);
}

// Listeners run on a copy so they can register further listeners.
fn snapshot<T: ?Sized>(list: &RwLock<Vec<Arc<T>>>) -> Vec<Arc<T>> {
    list.read().unwrap_or_else(PoisonError::into_inner).clone()
}

fn len<T>(list: &RwLock<Vec<T>>) -> usize {
    list.read().unwrap_or_else(PoisonError::into_inner).len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn flush_report() -> FlushReport {
        FlushReport {
            problem: None,
            backup_count: 0,
            backup_index: None,
        }
    }

    #[test]
    fn test_listeners_receive_reports() {
        let events = Events::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let seen = Arc::clone(&calls);
        events.on_flush(move |report| {
            assert!(report.is_success());
            seen.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        events.emit_flush(&flush_report());
        events.emit_flush(&flush_report());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_listener_error_becomes_fault() {
        let events = Events::new();
        let faults = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&faults);
        events.on_fault(move |fault| sink.lock().unwrap().push(fault.clone()));
        events.on_flush(|_| Err("disk quota notification failed".into()));

        events.emit_flush(&flush_report());

        let faults = faults.lock().unwrap();
        assert_eq!(faults.len(), 1);
        assert_eq!(faults[0].operation, OperationKind::Flush);
        assert_eq!(faults[0].cause.to_string(), "disk quota notification failed");
    }

    #[test]
    fn test_listener_panic_becomes_fault() {
        let events = Events::new();
        let faults = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&faults);
        events.on_fault(move |fault| sink.lock().unwrap().push(fault.clone()));
        events.on_load(|_| panic!("boom"));

        events.emit_load(&LoadReport::new(OperationKind::LoadBackup));

        let faults = faults.lock().unwrap();
        assert_eq!(faults.len(), 1);
        assert_eq!(faults[0].operation, OperationKind::LoadBackup);
        let panic = faults[0].cause.downcast_ref::<ListenerPanic>().unwrap();
        assert_eq!(panic.message, "boom");
    }

    #[test]
    fn test_panicking_fault_listener_is_contained() {
        let events = Events::new();
        events.on_fault(|_| panic!("fault listener down"));
        events.on_delete(|_| Err("nope".into()));

        events.emit_delete(&DeleteReport {
            operation: OperationKind::Delete,
            problem: None,
            backup_count: 0,
            backup_index: None,
        });
    }

    #[test]
    fn test_save_preparing_faults_are_tagged_flush() {
        let events = Events::new();
        let faults = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&faults);
        events.on_fault(move |fault| sink.lock().unwrap().push(fault.operation));
        events.on_save_preparing(|| Err("not ready".into()));

        events.emit_save_preparing();
        assert_eq!(*faults.lock().unwrap(), vec![OperationKind::Flush]);
    }

    #[test]
    fn test_clear() {
        let events = Events::new();
        events.on_load(|_| Ok(()));
        events.on_fault(|_| {});
        events.clear();
        assert_eq!(len(&events.load), 0);
        assert_eq!(len(&events.fault), 0);
    }
}

//! Background worker pool.
//!
//! Jobs run to completion on a fixed set of named threads. Each submission
//! returns a [`Pending`] handle that receives the job's result; dropping the
//! handle does not cancel the job.

use savelite_core::{Error, Result};
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Fixed-size thread pool shared by engine instances
///
/// Cloning the pool shares the same threads.
#[derive(Clone)]
pub struct WorkerPool {
    inner: Arc<PoolInner>,
}

struct PoolInner {
    sender: Option<Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Start a pool with `threads` workers
    pub fn new(threads: usize) -> Result<Self> {
        if threads == 0 {
            return Err(Error::InvalidConfig(
                "Worker pool needs at least one thread".to_string(),
            ));
        }

        let (sender, receiver) = mpsc::channel::<Job>();
        let receiver = Arc::new(Mutex::new(receiver));

        let mut workers = Vec::with_capacity(threads);
        for id in 0..threads {
            let receiver = Arc::clone(&receiver);
            let handle = thread::Builder::new()
                .name(format!("savelite-worker-{}", id))
                .spawn(move || worker_loop(id, receiver))?;
            workers.push(handle);
        }

        tracing::debug!(threads, "worker pool started");

        Ok(Self {
            inner: Arc::new(PoolInner {
                sender: Some(sender),
                workers,
            }),
        })
    }

    /// Number of worker threads
    pub fn threads(&self) -> usize {
        self.inner.workers.len()
    }

    /// Queue `job` and return a handle to its result
    pub fn submit<T, F>(&self, job: F) -> Pending<T>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        let wrapped: Job = Box::new(move || {
            // The caller may have dropped its handle.
            let _ = tx.send(job());
        });

        match &self.inner.sender {
            Some(sender) => {
                if sender.send(wrapped).is_err() {
                    tracing::error!("worker pool is shut down, job dropped");
                }
            }
            None => tracing::error!("worker pool is shut down, job dropped"),
        }

        Pending { rx }
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("threads", &self.threads())
            .finish()
    }
}

impl Drop for PoolInner {
    fn drop(&mut self) {
        // Closing the channel lets workers drain the queue and exit.
        drop(self.sender.take());

        let current = thread::current().id();
        for handle in self.workers.drain(..) {
            // The last handle can be released from inside a job.
            if handle.thread().id() == current {
                continue;
            }
            let _ = handle.join();
        }
    }
}

fn worker_loop(id: usize, receiver: Arc<Mutex<Receiver<Job>>>) {
    loop {
        let job = {
            let Ok(receiver) = receiver.lock() else {
                break;
            };
            receiver.recv()
        };

        let Ok(job) = job else {
            break;
        };

        if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
            tracing::error!(worker = id, "job panicked; worker continues");
        }
    }

    tracing::trace!(worker = id, "worker exiting");
}

/// Handle to the result of a submitted job
#[derive(Debug)]
pub struct Pending<T> {
    rx: Receiver<T>,
}

impl<T> Pending<T> {
    /// Block until the job finishes
    pub fn wait(self) -> Result<T> {
        self.rx.recv().map_err(|_| Error::WorkerUnavailable)
    }

    /// Block for at most `timeout`; `Ok(None)` if the job is still running
    pub fn wait_timeout(&self, timeout: Duration) -> Result<Option<T>> {
        match self.rx.recv_timeout(timeout) {
            Ok(value) => Ok(Some(value)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(Error::WorkerUnavailable),
        }
    }

    /// Poll without blocking; `Ok(None)` if the job is still running
    pub fn try_wait(&self) -> Result<Option<T>> {
        match self.rx.try_recv() {
            Ok(value) => Ok(Some(value)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(Error::WorkerUnavailable),
        }
    }
}

//! Bounded worker pool
//!
//! Jobs are handed to workers through a zero-capacity channel, so `submit`
//! blocks while every worker is busy. This is the engine's backpressure: a
//! tick that cannot keep up slows the loop down instead of queueing work
//! without bound.

use crate::error::{Error, Result};
use crossbeam_channel::{bounded, Receiver, Sender};
use log::{debug, error, warn};
use parking_lot::{Condvar, Mutex};
use std::any::Any;
use std::cell::Cell;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// A unit of work for the pool
pub type Job = Box<dyn FnOnce() + Send + 'static>;

thread_local! {
    static IN_WORKER: Cell<bool> = const { Cell::new(false) };
}

/// True when called from one of any pool's worker threads
pub fn is_worker_thread() -> bool {
    IN_WORKER.with(|flag| flag.get())
}

#[derive(Debug, Default)]
struct PoolShared {
    active: AtomicUsize,
    alive: Mutex<usize>,
    exited: Condvar,
}

/// Fixed-size pool of worker threads
pub struct WorkerPool {
    sender: Mutex<Option<Sender<Job>>>,
    shared: Arc<PoolShared>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    worker_count: usize,
}

impl WorkerPool {
    /// Spawn `workers` threads named `{name}-worker-{n}`
    pub fn new(name: &str, workers: usize) -> Result<Self> {
        let workers = workers.max(1);
        let (sender, receiver) = bounded::<Job>(0);
        let shared = Arc::new(PoolShared::default());

        let mut handles = Vec::with_capacity(workers);
        for n in 0..workers {
            let receiver = receiver.clone();
            let shared_worker = shared.clone();
            let thread_name = format!("{name}-worker-{n}");
            *shared.alive.lock() += 1;
            let spawned = thread::Builder::new()
                .name(thread_name)
                .spawn(move || Self::run_worker(receiver, shared_worker));
            match spawned {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    *shared.alive.lock() -= 1;
                    return Err(Error::Spawn(e));
                }
            }
        }
        debug!("started worker pool '{}' with {} workers", name, workers);

        Ok(Self {
            sender: Mutex::new(Some(sender)),
            shared,
            handles: Mutex::new(handles),
            worker_count: workers,
        })
    }

    /// Hand a job to the next free worker, blocking while all are busy
    pub fn submit(&self, job: Job) -> Result<()> {
        // Clone out of the lock so a blocked submit never holds up shutdown.
        let sender = self.sender.lock().clone().ok_or(Error::Shutdown)?;
        sender.send(job).map_err(|_| Error::Shutdown)
    }

    /// Number of workers currently running a job
    pub fn active_count(&self) -> usize {
        self.shared.active.load(Ordering::Acquire)
    }

    /// Number of worker threads
    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Stop accepting jobs and wait up to `timeout` for workers to finish
    ///
    /// Workers still running after the timeout are detached. Returns how
    /// many workers were still running.
    pub fn shutdown(&self, timeout: Duration) -> usize {
        self.sender.lock().take();

        let remaining = if is_worker_thread() {
            // Waiting here would wait on ourselves.
            *self.shared.alive.lock()
        } else {
            let deadline = Instant::now().checked_add(timeout);
            let mut alive = self.shared.alive.lock();
            while *alive > 0 {
                match deadline {
                    Some(deadline) => {
                        if self.shared.exited.wait_until(&mut alive, deadline).timed_out() {
                            break;
                        }
                    }
                    // Too far out to represent: wait for every worker.
                    None => self.shared.exited.wait(&mut alive),
                }
            }
            *alive
        };

        let handles = std::mem::take(&mut *self.handles.lock());
        if remaining == 0 {
            for handle in handles {
                let _ = handle.join();
            }
        } else {
            warn!(
                "{} worker(s) still running after {:?}; detaching them",
                remaining, timeout
            );
        }
        remaining
    }

    fn run_worker(receiver: Receiver<Job>, shared: Arc<PoolShared>) {
        IN_WORKER.with(|flag| flag.set(true));
        while let Ok(job) = receiver.recv() {
            shared.active.fetch_add(1, Ordering::AcqRel);
            if let Err(panic) = panic::catch_unwind(AssertUnwindSafe(job)) {
                error!(
                    "worker '{}' caught a panic: {}",
                    thread::current().name().unwrap_or("unnamed"),
                    panic_message(&panic)
                );
            }
            shared.active.fetch_sub(1, Ordering::AcqRel);
        }
        let mut alive = shared.alive.lock();
        *alive -= 1;
        shared.exited.notify_all();
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.sender.lock().take();
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("worker_count", &self.worker_count)
            .field("active", &self.active_count())
            .finish()
    }
}

/// Best-effort text of a panic payload
pub(crate) fn panic_message(payload: &Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

//! Fixed-size worker pool for decode and scale work.
//!
//! Jobs are boxed closures sent over a flume channel. Results go back to the
//! UI thread through channels owned by the submitter; the pool itself knows
//! nothing about thumbnails or previews.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use flume::{Receiver, Sender};
use tracing::{debug, error, warn};

/// Maximum number of worker threads.
const MAX_WORKERS: usize = 4;

/// How long an idle worker waits before re-checking the shutdown flag.
const RECV_TIMEOUT: Duration = Duration::from_millis(100);

type Job = Box<dyn FnOnce() + Send + 'static>;

pub struct WorkerPool {
    job_tx: Option<Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
    /// Jobs submitted and not yet finished.
    pending: Arc<AtomicUsize>,
}

impl WorkerPool {
    /// Starts `workers` threads (clamped to 1..=4).
    pub fn new(workers: usize) -> Result<Self> {
        let num_workers = workers.clamp(1, MAX_WORKERS);
        let (job_tx, job_rx) = flume::unbounded::<Job>();
        let shutdown = Arc::new(AtomicBool::new(false));
        let pending = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::with_capacity(num_workers);
        for worker_id in 0..num_workers {
            let rx = job_rx.clone();
            let shutdown = Arc::clone(&shutdown);
            let pending = Arc::clone(&pending);
            let handle = thread::Builder::new()
                .name(format!("thumb-worker-{}", worker_id))
                .spawn(move || worker_loop(worker_id, rx, shutdown, pending))
                .context("Failed to spawn worker thread")?;
            handles.push(handle);
        }

        debug!(num_workers, "Started worker pool");

        Ok(Self {
            job_tx: Some(job_tx),
            workers: handles,
            shutdown,
            pending,
        })
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Queues `job`. Returns false once the pool is shut down.
    pub fn execute<F>(&self, job: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        let Some(tx) = &self.job_tx else {
            warn!("Worker pool is shut down, dropping job");
            return false;
        };

        self.pending.fetch_add(1, Ordering::SeqCst);
        if tx.send(Box::new(job)).is_err() {
            self.pending.fetch_sub(1, Ordering::SeqCst);
            error!("Worker pool disconnected");
            return false;
        }
        true
    }

    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    pub fn is_busy(&self) -> bool {
        self.pending() > 0
    }

    /// Blocks until every queued job has finished or `timeout` elapses.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let started = Instant::now();
        while self.is_busy() {
            if started.elapsed() >= timeout {
                return false;
            }
            thread::sleep(Duration::from_millis(1));
        }
        true
    }

    pub fn shutdown(&mut self) {
        debug!("Shutting down worker pool");
        self.shutdown.store(true, Ordering::SeqCst);
        self.job_tx = None;

        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
        debug!("Worker pool shutdown complete");
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        if !self.shutdown.load(Ordering::Relaxed) {
            self.shutdown();
        }
    }
}

fn worker_loop(
    worker_id: usize,
    rx: Receiver<Job>,
    shutdown: Arc<AtomicBool>,
    pending: Arc<AtomicUsize>,
) {
    debug!(worker_id, "Worker started");

    loop {
        if shutdown.load(Ordering::Relaxed) {
            break;
        }

        match rx.recv_timeout(RECV_TIMEOUT) {
            Ok(job) => {
                if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
                    error!(worker_id, "Worker job panicked");
                }
                pending.fetch_sub(1, Ordering::SeqCst);
            }
            Err(flume::RecvTimeoutError::Timeout) => continue,
            Err(flume::RecvTimeoutError::Disconnected) => break,
        }
    }

    debug!(worker_id, "Worker stopped");
}

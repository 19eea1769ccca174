//! Cancellable, single-flight thumbnail prefetching for one windowed view.
//!
//! Each [`PrefetchScheduler::submit`] supersedes the previous job: its token
//! is cancelled before the new job is queued. Workers check the token before
//! every item and again before publishing a result. Results travel back over
//! a flume channel and are applied on the UI thread by [`PrefetchScheduler::dispatch`],
//! which drops anything not produced by the current job.

use std::cell::{Cell, RefCell};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use flume::{Receiver, Sender};
use tracing::{debug, trace};

use super::cache::ThumbnailStore;
use super::generator::{Thumbnail, ThumbnailPurpose};
use super::pool::WorkerPool;

/// Cooperative cancellation flag shared with a worker job.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug)]
pub enum PrefetchEvent {
    Loaded {
        job_id: u64,
        path: PathBuf,
        thumb: Thumbnail,
    },
    Finished {
        job_id: u64,
    },
}

/// Paths to warm and the size to warm them at.
#[derive(Debug, Clone)]
pub struct PrefetchRequest {
    pub paths: Vec<PathBuf>,
    pub width: u32,
    pub height: u32,
    pub purpose: ThumbnailPurpose,
}

struct CurrentJob {
    id: u64,
    token: CancelToken,
    on_done: Option<Box<dyn FnOnce()>>,
}

pub struct PrefetchScheduler {
    name: String,
    pool: Arc<WorkerPool>,
    store: Arc<dyn ThumbnailStore>,
    event_tx: Sender<PrefetchEvent>,
    event_rx: Receiver<PrefetchEvent>,
    current: RefCell<Option<CurrentJob>>,
    next_job_id: Cell<u64>,
}

impl PrefetchScheduler {
    pub fn new(name: &str, pool: Arc<WorkerPool>, store: Arc<dyn ThumbnailStore>) -> Self {
        let (event_tx, event_rx) = flume::unbounded();
        Self {
            name: name.to_string(),
            pool,
            store,
            event_tx,
            event_rx,
            current: RefCell::new(None),
            next_job_id: Cell::new(0),
        }
    }

    pub fn store(&self) -> &Arc<dyn ThumbnailStore> {
        &self.store
    }

    /// Id of the job whose results are currently accepted.
    pub fn current_job(&self) -> Option<u64> {
        self.current.borrow().as_ref().map(|job| job.id)
    }

    /// Cancels the previous job and queues `request`. `on_done` runs on the
    /// UI thread once every item of this job has been applied, and never if
    /// the job is superseded or cancelled first.
    pub fn submit<F>(&self, request: PrefetchRequest, on_done: F) -> u64
    where
        F: FnOnce() + 'static,
    {
        self.cancel();

        let job_id = self.next_job_id.get() + 1;
        self.next_job_id.set(job_id);
        let token = CancelToken::new();
        *self.current.borrow_mut() = Some(CurrentJob {
            id: job_id,
            token: token.clone(),
            on_done: Some(Box::new(on_done)),
        });

        debug!(
            scheduler = %self.name,
            job_id,
            items = request.paths.len(),
            "Submitting prefetch job"
        );

        let store = Arc::clone(&self.store);
        let tx = self.event_tx.clone();
        self.pool
            .execute(move || run_job(job_id, request, token, store.as_ref(), &tx));
        job_id
    }

    /// Cancels the current job, if any. Its done callback is dropped.
    pub fn cancel(&self) {
        if let Some(job) = self.current.borrow_mut().take() {
            trace!(scheduler = %self.name, job_id = job.id, "Cancelling prefetch job");
            job.token.cancel();
        }
    }

    /// Applies results of the current job through `apply` and fires its
    /// done callback when it has finished. Returns the number of results applied.
    pub fn dispatch<F>(&self, mut apply: F) -> usize
    where
        F: FnMut(&Path, Thumbnail),
    {
        let mut applied = 0;
        let mut finished = None;

        for event in self.event_rx.try_iter() {
            let current = self.current_job();
            match event {
                PrefetchEvent::Loaded {
                    job_id,
                    path,
                    thumb,
                } => {
                    if Some(job_id) != current {
                        trace!(scheduler = %self.name, job_id, ?path, "Dropping stale prefetch result");
                        continue;
                    }
                    apply(&path, thumb);
                    applied += 1;
                }
                PrefetchEvent::Finished { job_id } if Some(job_id) == current => {
                    finished = self
                        .current
                        .borrow_mut()
                        .as_mut()
                        .and_then(|job| job.on_done.take());
                }
                PrefetchEvent::Finished { .. } => {}
            }
        }

        if let Some(on_done) = finished {
            on_done();
        }
        applied
    }
}

impl Drop for PrefetchScheduler {
    fn drop(&mut self) {
        self.cancel();
    }
}

fn run_job(
    job_id: u64,
    request: PrefetchRequest,
    token: CancelToken,
    store: &dyn ThumbnailStore,
    tx: &Sender<PrefetchEvent>,
) {
    for path in request.paths {
        if token.is_cancelled() {
            trace!(job_id, "Prefetch job cancelled");
            return;
        }
        let thumb = store.get_or_create(&path, request.width, request.height, request.purpose);
        if token.is_cancelled() {
            trace!(job_id, "Prefetch job cancelled");
            return;
        }
        if tx.send(PrefetchEvent::Loaded { job_id, path, thumb }).is_err() {
            return;
        }
    }
    let _ = tx.send(PrefetchEvent::Finished { job_id });
}

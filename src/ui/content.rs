//! Primary content pipeline: the preview of the selected item.
//!
//! Coordinators fire-and-forget [`ContentLoader`] calls. [`PreviewLoader`]
//! decodes on the worker pool and only shows a result if the key it was
//! loaded for is still the selected key when it arrives.

use std::cell::{Cell, RefCell};
use std::path::PathBuf;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::Result;
use flume::{Receiver, Sender};
use tracing::{debug, trace, warn};

use crate::models::{CatalogHub, CatalogMode, ItemKey};
use crate::thumbnails::generator::ThumbnailGenerator;
use crate::thumbnails::{Thumbnail, ThumbnailPurpose, WorkerPool};
use crate::ui::event_loop::{ControlFlow, EventLoop};

/// What to load for a newly selected item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentRequest {
    pub mode: CatalogMode,
    pub index: usize,
    pub key: ItemKey,
    pub path: Option<PathBuf>,
}

/// Primary image pipeline driven by the selection coordinators.
pub trait ContentLoader {
    fn load_for_index(&self, request: ContentRequest);
    fn clear_content(&self);
}

/// A decoded preview that is currently on display.
#[derive(Debug, Clone)]
pub struct Preview {
    pub mode: CatalogMode,
    pub key: ItemKey,
    pub image: Thumbnail,
}

struct Decoded {
    mode: CatalogMode,
    key: ItemKey,
    image: Result<Thumbnail>,
}

type PreviewListener = Rc<dyn Fn(Option<&Preview>)>;

pub struct PreviewLoader {
    pool: Arc<WorkerPool>,
    hub: Rc<CatalogHub>,
    max_edge: u32,
    generation: Arc<AtomicU64>,
    result_tx: Sender<Decoded>,
    result_rx: Receiver<Decoded>,
    current: RefCell<Option<Preview>>,
    listener: RefCell<Option<PreviewListener>>,
    requested: Cell<usize>,
    discarded: Cell<usize>,
}

impl PreviewLoader {
    /// Creates the loader and registers its result source on `event_loop`.
    pub fn new(
        pool: Arc<WorkerPool>,
        hub: Rc<CatalogHub>,
        max_edge: u32,
        event_loop: &EventLoop,
    ) -> Rc<Self> {
        let (result_tx, result_rx) = flume::unbounded();
        let loader = Rc::new(Self {
            pool,
            hub,
            max_edge: max_edge.max(1),
            generation: Arc::new(AtomicU64::new(0)),
            result_tx,
            result_rx,
            current: RefCell::new(None),
            listener: RefCell::new(None),
            requested: Cell::new(0),
            discarded: Cell::new(0),
        });

        let weak: Weak<Self> = Rc::downgrade(&loader);
        event_loop.add_source(move || match weak.upgrade() {
            Some(loader) => {
                loader.dispatch();
                ControlFlow::Continue
            }
            None => ControlFlow::Break,
        });
        loader
    }

    /// Called with the new preview, or `None` when the content is cleared.
    pub fn connect_changed<F>(&self, listener: F)
    where
        F: Fn(Option<&Preview>) + 'static,
    {
        *self.listener.borrow_mut() = Some(Rc::new(listener));
    }

    pub fn current(&self) -> Option<Preview> {
        self.current.borrow().clone()
    }

    pub fn current_key(&self) -> Option<ItemKey> {
        self.current.borrow().as_ref().map(|p| p.key.clone())
    }

    /// Number of `load_for_index` calls received.
    pub fn requested(&self) -> usize {
        self.requested.get()
    }

    /// Number of completed decodes dropped because the selection moved on.
    pub fn discarded(&self) -> usize {
        self.discarded.get()
    }

    /// Applies finished decodes. Returns how many were shown.
    pub fn dispatch(&self) -> usize {
        let mut shown = 0;
        for decoded in self.result_rx.try_iter() {
            let active = self.hub.active_mode();
            let selected = self
                .hub
                .context(active)
                .borrow()
                .selected_key()
                .map(str::to_string);
            if decoded.mode != active || selected.as_deref() != Some(decoded.key.as_str()) {
                trace!(key = %decoded.key, mode = %decoded.mode, %active, ?selected, "Discarding stale preview");
                self.discarded.set(self.discarded.get() + 1);
                continue;
            }

            let image = decoded.image.unwrap_or_else(|e| {
                warn!(key = %decoded.key, error = ?e, "Failed to decode preview");
                Thumbnail::placeholder()
            });
            let preview = Preview {
                mode: decoded.mode,
                key: decoded.key,
                image,
            };
            debug!(key = %preview.key, width = preview.image.width, height = preview.image.height, "Showing preview");
            *self.current.borrow_mut() = Some(preview);
            shown += 1;
            self.notify();
        }
        shown
    }

    fn notify(&self) {
        let listener = self.listener.borrow().clone();
        if let Some(listener) = listener {
            let current = self.current.borrow().clone();
            listener(current.as_ref());
        }
    }
}

impl ContentLoader for PreviewLoader {
    fn load_for_index(&self, request: ContentRequest) {
        self.requested.set(self.requested.get() + 1);
        let Some(path) = request.path else {
            warn!(key = %request.key, "No path for selected item");
            return;
        };

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let latest = Arc::clone(&self.generation);
        let tx = self.result_tx.clone();
        let max_edge = self.max_edge;
        let mode = request.mode;
        let key = request.key;

        self.pool.execute(move || {
            // Superseded before a worker picked it up.
            if latest.load(Ordering::SeqCst) != generation {
                trace!(%key, "Skipping superseded preview");
                return;
            }
            let image = ThumbnailGenerator::generate(&path, max_edge, max_edge, ThumbnailPurpose::Preview);
            let _ = tx.send(Decoded { mode, key, image });
        });
    }

    fn clear_content(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        if self.current.borrow_mut().take().is_some() {
            debug!("Cleared preview");
        }
        self.notify();
    }
}

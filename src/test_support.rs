//! Fixtures shared by the unit tests.

use std::cell::{Cell, RefCell};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use crate::models::{CatalogContext, CatalogHub, CatalogMode};
use crate::thumbnails::{Thumbnail, ThumbnailPurpose, ThumbnailStore};
use crate::ui::content::{ContentLoader, ContentRequest};

/// Catalog of `keys` with paths under a fake `/photos` tree.
pub fn catalog(mode: CatalogMode, keys: &[&str]) -> CatalogContext {
    CatalogContext::from_entries(
        mode,
        keys.iter().map(|key| {
            (
                key.to_string(),
                PathBuf::from(format!("/photos/{}/{}.jpg", mode, key)),
            )
        }),
    )
    .unwrap()
}

pub fn project_hub(selection: &[&str], discards: &[&str]) -> Rc<CatalogHub> {
    let hub = Rc::new(CatalogHub::new());
    hub.replace(catalog(CatalogMode::ProjectSelection, selection));
    hub.replace(catalog(CatalogMode::ProjectDiscards, discards));
    hub
}

#[derive(Default)]
pub struct RecordingLoader {
    requests: RefCell<Vec<ContentRequest>>,
    clears: Cell<usize>,
}

impl RecordingLoader {
    pub fn loaded_keys(&self) -> Vec<String> {
        self.requests.borrow().iter().map(|r| r.key.clone()).collect()
    }

    pub fn clears(&self) -> usize {
        self.clears.get()
    }
}

impl ContentLoader for RecordingLoader {
    fn load_for_index(&self, request: ContentRequest) {
        self.requests.borrow_mut().push(request);
    }

    fn clear_content(&self) {
        self.clears.set(self.clears.get() + 1);
    }
}

/// Store that never touches the disk. A gated store blocks every call
/// until [`FakeStore::open`].
pub struct FakeStore {
    open: Mutex<bool>,
    opened: Condvar,
    calls: Mutex<Vec<PathBuf>>,
    clears: AtomicUsize,
}

impl FakeStore {
    pub fn new() -> Self {
        Self::with_gate(true)
    }

    pub fn gated() -> Self {
        Self::with_gate(false)
    }

    fn with_gate(open: bool) -> Self {
        Self {
            open: Mutex::new(open),
            opened: Condvar::new(),
            calls: Mutex::new(Vec::new()),
            clears: AtomicUsize::new(0),
        }
    }

    pub fn open(&self) {
        *self.open.lock() = true;
        self.opened.notify_all();
    }

    pub fn calls(&self) -> Vec<PathBuf> {
        self.calls.lock().clone()
    }

    pub fn clears(&self) -> usize {
        self.clears.load(Ordering::SeqCst)
    }
}

impl ThumbnailStore for FakeStore {
    fn get_or_create(
        &self,
        path: &Path,
        width: u32,
        height: u32,
        _purpose: ThumbnailPurpose,
    ) -> Thumbnail {
        self.calls.lock().push(path.to_path_buf());
        let mut open = self.open.lock();
        while !*open {
            self.opened.wait(&mut open);
        }
        Thumbnail {
            width,
            height,
            pixels: Arc::from(vec![0u8; (width * height * 4) as usize]),
        }
    }

    fn clear(&self) {
        self.clears.fetch_add(1, Ordering::SeqCst);
    }
}

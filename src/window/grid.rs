//! Windowed thumbnail grid over the active catalog.
//!
//! Only a contiguous slice of the catalog lives in the grid's own list model.
//! The slice follows the viewport: every scroll or resize recomputes it and,
//! when it moved, rebuilds the model and prefetches the slice's thumbnails.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::rc::{Rc, Weak};
use std::sync::Arc;

use tracing::{debug, trace, warn};

use super::geometry::{
    columns_for, compute_window, is_row_visible, row_of, ThumbnailWindow, ViewportGeometry,
};
use crate::config::WindowConfig;
use crate::models::{CatalogChange, CatalogHub, CatalogMode};
use crate::thumbnails::{
    PrefetchRequest, PrefetchScheduler, Thumbnail, ThumbnailPurpose, ThumbnailStore, WorkerPool,
};
use crate::ui::binding::{SelectionForward, SelectionSink, ViewSyncAdapter};
use crate::ui::event_loop::{ControlFlow, EventLoop};

pub struct GridWindow {
    name: String,
    self_weak: Weak<GridWindow>,
    hub: Rc<CatalogHub>,
    event_loop: EventLoop,
    config: WindowConfig,
    model: Rc<dyn ViewSyncAdapter>,
    geometry: Rc<dyn ViewportGeometry>,
    prefetch: PrefetchScheduler,
    enabled: Cell<bool>,
    attached: Cell<Option<CatalogMode>>,
    window: Cell<Option<ThumbnailWindow>>,
    built_generation: Cell<Option<u64>>,
    /// Non-zero while a coordinator-driven selection is being applied.
    external_selection: Cell<usize>,
    master_selection: Cell<Option<usize>>,
    rebuild_count: Cell<usize>,
    resize_pending: Cell<bool>,
    applied: RefCell<HashMap<PathBuf, Thumbnail>>,
    forward: RefCell<Option<SelectionForward>>,
}

impl GridWindow {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: &str,
        hub: Rc<CatalogHub>,
        event_loop: EventLoop,
        config: WindowConfig,
        model: Rc<dyn ViewSyncAdapter>,
        geometry: Rc<dyn ViewportGeometry>,
        pool: Arc<WorkerPool>,
        store: Arc<dyn ThumbnailStore>,
    ) -> Rc<Self> {
        let grid = Rc::new_cyclic(|self_weak| Self {
            name: name.to_string(),
            self_weak: self_weak.clone(),
            hub: Rc::clone(&hub),
            event_loop: event_loop.clone(),
            config,
            model,
            geometry,
            prefetch: PrefetchScheduler::new(name, pool, store),
            enabled: Cell::new(false),
            attached: Cell::new(None),
            window: Cell::new(None),
            built_generation: Cell::new(None),
            external_selection: Cell::new(0),
            master_selection: Cell::new(None),
            rebuild_count: Cell::new(0),
            resize_pending: Cell::new(false),
            applied: RefCell::new(HashMap::new()),
            forward: RefCell::new(None),
        });

        let weak = Rc::downgrade(&grid);
        event_loop.add_source(move || match weak.upgrade() {
            Some(grid) => {
                grid.dispatch_prefetch();
                ControlFlow::Continue
            }
            None => ControlFlow::Break,
        });

        let weak = Rc::downgrade(&grid);
        hub.connect_changed(move |change| {
            if let (Some(grid), CatalogChange::Activated(mode)) = (weak.upgrade(), change) {
                if grid.is_enabled() && grid.attached_mode() != Some(mode) {
                    grid.on_master_catalog_changed(mode);
                }
            }
        });
        grid
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.get()
    }

    pub fn attached_mode(&self) -> Option<CatalogMode> {
        self.attached.get()
    }

    /// Current resident range, `None` while unknown.
    pub fn window(&self) -> Option<ThumbnailWindow> {
        self.window.get()
    }

    /// How many times the grid model was rebuilt.
    pub fn rebuild_count(&self) -> usize {
        self.rebuild_count.get()
    }

    pub fn store(&self) -> &Arc<dyn ThumbnailStore> {
        self.prefetch.store()
    }

    /// Where clicks in the grid are sent, as `(mode, master index)`.
    pub fn set_forward(&self, forward: SelectionForward) {
        *self.forward.borrow_mut() = Some(forward);
    }

    /// Thumbnail delivered for `path` by the current prefetch job.
    pub fn thumbnail_for(&self, path: &Path) -> Option<Thumbnail> {
        self.applied.borrow().get(path).cloned()
    }

    pub fn applied_count(&self) -> usize {
        self.applied.borrow().len()
    }

    pub fn set_enabled(&self, on: bool) {
        if on == self.enabled.get() {
            return;
        }
        if on {
            debug!(grid = %self.name, "Enabling grid");
            self.enabled.set(true);
            self.on_master_catalog_changed(self.hub.active_mode());
        } else {
            debug!(grid = %self.name, "Disabling grid");
            self.prefetch.cancel();
            self.enabled.set(false);
            self.attached.set(None);
            self.window.set(None);
            self.built_generation.set(None);
            self.applied.borrow_mut().clear();
            self.hold();
            self.model.rebuild_model(&[]);
            self.release_next_turn();
        }
    }

    /// Re-attaches to the `mode` catalog and rebuilds from scratch.
    pub fn on_master_catalog_changed(&self, mode: CatalogMode) {
        if !self.is_enabled() {
            return;
        }
        debug!(grid = %self.name, %mode, "Attaching grid to catalog");
        self.attached.set(Some(mode));
        self.reset();
        let selected = self.hub.context(mode).borrow().selected_index();
        self.master_selection.set(selected);
        self.recompute();
        if selected.is_some() {
            self.sync_selection_from_master(selected);
        }
    }

    /// Recomputes the resident range from the current geometry and rebuilds
    /// the grid model if it moved.
    pub fn recompute(&self) {
        if !self.is_enabled() {
            return;
        }
        let Some(mode) = self.attached.get() else {
            warn!(grid = %self.name, "Grid enabled but not attached");
            return;
        };

        let catalog = self.hub.context(mode);
        let catalog = catalog.borrow();
        if self.built_generation.get() != Some(catalog.generation()) {
            // Built from a replaced catalog; nothing cached is valid any more.
            if self.built_generation.get().is_some() {
                self.reset();
            }
            self.built_generation.set(Some(catalog.generation()));
        }

        let viewport = self.geometry.viewport();
        let Some(next) = compute_window(
            catalog.len(),
            &viewport,
            self.geometry.cell_size(),
            self.config.preload_rows,
        ) else {
            drop(catalog);
            self.clear_model();
            return;
        };

        if self.window.get() == Some(next) {
            trace!(grid = %self.name, first = next.first, last = next.last, "Window unchanged");
            return;
        }

        let keys = catalog.slice(next.first, next.last).to_vec();
        let paths: Vec<PathBuf> = (next.first..=next.last)
            .filter_map(|i| catalog.path_at(i).map(Path::to_path_buf))
            .collect();
        drop(catalog);

        debug!(
            grid = %self.name,
            first = next.first,
            last = next.last,
            columns = next.columns,
            "Rebuilding grid window"
        );
        self.window.set(Some(next));
        self.rebuild_count.set(self.rebuild_count.get() + 1);

        self.hold();
        self.model.rebuild_model(&keys);
        if let Some(local) = self.master_selection.get().and_then(|m| self.local_index_for(m)) {
            self.model.set_selected_local_index(local);
        }
        self.release_next_turn();

        let resident: HashSet<&PathBuf> = paths.iter().collect();
        self.applied.borrow_mut().retain(|path, _| resident.contains(path));

        let weak = self.self_weak.clone();
        self.prefetch.submit(
            PrefetchRequest {
                paths,
                width: self.config.thumb_width,
                height: self.config.thumb_height,
                purpose: ThumbnailPurpose::Grid,
            },
            move || {
                if let Some(grid) = weak.upgrade() {
                    trace!(grid = %grid.name, "Prefetch done");
                    grid.model.repaint();
                }
            },
        );
    }

    /// Shows master index `master` as the grid selection: scroll it into
    /// view, rebuild, then select on the next turn.
    pub fn sync_selection_from_master(&self, master: Option<usize>) {
        self.master_selection.set(master);
        if !self.is_enabled() {
            return;
        }
        let Some(master) = master else {
            self.hold();
            self.model.clear_selection();
            self.release_next_turn();
            return;
        };

        self.hold();
        let viewport = self.geometry.viewport();
        let (cell_width, cell_height) = self.geometry.cell_size();
        let row = row_of(master, columns_for(viewport.width, cell_width));
        if !is_row_visible(row, &viewport, cell_height) {
            trace!(grid = %self.name, master, row, "Scrolling to selection");
            self.geometry.scroll_to(row as u64 * cell_height as u64);
        }
        self.recompute();

        let weak = self.self_weak.clone();
        self.event_loop.defer(move || {
            if let Some(grid) = weak.upgrade() {
                grid.select_local_for(master);
                grid.release_next_turn();
            }
        });
    }

    /// `first + local selection`, or `None` if nothing is selected in the grid.
    pub fn selected_master_index(&self) -> Option<usize> {
        let window = self.window.get()?;
        let local = self.model.selected_local_index()?;
        (local < window.len()).then_some(window.first + local)
    }

    /// Grid scroll event.
    pub fn on_scroll(&self) {
        if self.external_selection.get() > 0 {
            trace!(grid = %self.name, "Ignoring scroll during selection sync");
            return;
        }
        self.recompute();
    }

    /// Viewport size changed. Coalesced into one recompute on the next turn.
    pub fn on_viewport_resized(&self) {
        if self.resize_pending.replace(true) {
            return;
        }
        let weak = self.self_weak.clone();
        self.event_loop.defer(move || {
            if let Some(grid) = weak.upgrade() {
                grid.resize_pending.set(false);
                grid.recompute();
            }
        });
    }

    /// Grid model selection-changed notification.
    pub fn on_local_selection_changed(&self, local: Option<usize>) {
        if self.external_selection.get() > 0 {
            trace!(grid = %self.name, ?local, "Ignoring selection echo");
            return;
        }
        let (Some(mode), Some(window), Some(local)) = (self.attached.get(), self.window.get(), local)
        else {
            return;
        };
        if local >= window.len() {
            return;
        }

        let forward = self.forward.borrow().clone();
        match forward {
            Some(forward) => forward(mode, Some(window.first + local)),
            None => warn!(grid = %self.name, "Grid not attached to a coordinator"),
        }
    }

    /// Applies finished prefetch results. Driven by the event loop.
    pub fn dispatch_prefetch(&self) -> usize {
        self.prefetch.dispatch(|path, thumb| {
            self.applied.borrow_mut().insert(path.to_path_buf(), thumb);
        })
    }

    /// Master index -> grid row, resolved through the item key.
    fn local_index_for(&self, master: usize) -> Option<usize> {
        let mode = self.attached.get()?;
        let catalog = self.hub.context(mode);
        let catalog = catalog.borrow();
        let key = catalog.key_at(master)?;
        (0..self.model.model_size()).find(|&local| self.model.local_key_at(local).as_deref() == Some(key))
    }

    fn select_local_for(&self, master: usize) {
        if self.master_selection.get() != Some(master) {
            trace!(grid = %self.name, master, "Selection superseded");
            return;
        }
        match self.local_index_for(master) {
            Some(local) => {
                if self.model.selected_local_index() != Some(local) {
                    self.model.set_selected_local_index(local);
                }
                self.model.ensure_index_visible(local);
            }
            None => debug!(grid = %self.name, master, "Selection outside grid window"),
        }
    }

    /// Forgets the window and every cached thumbnail.
    // A worker mid-decode may still insert into the cleared store; its result
    // belongs to a cancelled job and is never applied.
    fn reset(&self) {
        self.prefetch.cancel();
        self.prefetch.store().clear();
        self.applied.borrow_mut().clear();
        self.window.set(None);
        self.built_generation.set(None);
    }

    fn clear_model(&self) {
        self.prefetch.cancel();
        self.applied.borrow_mut().clear();
        if self.window.replace(None).is_some() || self.model.model_size() > 0 {
            self.hold();
            self.model.rebuild_model(&[]);
            self.release_next_turn();
        }
    }

    fn hold(&self) {
        self.external_selection.set(self.external_selection.get() + 1);
    }

    fn release_next_turn(&self) {
        let weak = self.self_weak.clone();
        self.event_loop.defer(move || {
            if let Some(grid) = weak.upgrade() {
                grid.external_selection
                    .set(grid.external_selection.get().saturating_sub(1));
            }
        });
    }
}

impl SelectionSink for GridWindow {
    fn apply_official(&self, mode: CatalogMode, index: Option<usize>) {
        if self.attached.get() == Some(mode) {
            self.sync_selection_from_master(index);
        }
    }

    fn ensure_visible(&self, mode: CatalogMode, index: Option<usize>) {
        if self.attached.get() == Some(mode) && index.is_some() {
            self.sync_selection_from_master(index);
        }
    }

    fn catalog_replaced(&self, mode: CatalogMode) {
        if !self.is_enabled() || self.attached.get() != Some(mode) {
            return;
        }
        let generation = self.hub.context(mode).borrow().generation();
        if self.built_generation.get() == Some(generation) {
            return;
        }
        self.on_master_catalog_changed(mode);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{catalog, FakeStore};
    use crate::ui::headless::{HeadlessListView, HeadlessViewport};
    use std::time::Duration;

    struct Fixture {
        hub: Rc<CatalogHub>,
        event_loop: EventLoop,
        grid: Rc<GridWindow>,
        model: Rc<HeadlessListView>,
        viewport: Rc<HeadlessViewport>,
        store: Arc<FakeStore>,
    }

    fn fixture_with(store: FakeStore, size: usize) -> Fixture {
        let keys: Vec<String> = (0..size).map(|i| format!("img{i:03}")).collect();
        let key_refs: Vec<&str> = keys.iter().map(String::as_str).collect();
        let hub = Rc::new(CatalogHub::new());
        hub.replace(catalog(CatalogMode::Browse, &key_refs));

        let event_loop = EventLoop::new();
        let model = Rc::new(HeadlessListView::new("grid"));
        // Five columns, two rows on screen.
        let viewport = Rc::new(HeadlessViewport::new(500, 200, 100, 100));
        let store = Arc::new(store);
        let grid = GridWindow::new(
            "grid",
            Rc::clone(&hub),
            event_loop.clone(),
            WindowConfig {
                preload_rows: 3,
                thumb_width: 16,
                thumb_height: 16,
            },
            model.clone(),
            viewport.clone(),
            Arc::new(WorkerPool::new(1).unwrap()),
            store.clone(),
        );

        let weak = Rc::downgrade(&grid);
        viewport.connect_scrolled(move |_| {
            if let Some(grid) = weak.upgrade() {
                grid.on_scroll();
            }
        });
        let weak = Rc::downgrade(&grid);
        viewport.connect_resized(move || {
            if let Some(grid) = weak.upgrade() {
                grid.on_viewport_resized();
            }
        });
        let weak = Rc::downgrade(&grid);
        model.connect_selection_changed(move |local| {
            if let Some(grid) = weak.upgrade() {
                grid.on_local_selection_changed(local);
            }
        });

        Fixture {
            hub,
            event_loop,
            grid,
            model,
            viewport,
            store,
        }
    }

    fn path_of(fx: &Fixture, index: usize) -> PathBuf {
        fx.hub
            .context(CatalogMode::Browse)
            .borrow()
            .path_at(index)
            .unwrap()
            .to_path_buf()
    }

    #[test]
    fn test_window_follows_selection_without_redundant_rebuild() {
        let fx = fixture_with(FakeStore::new(), 100);
        fx.grid.set_enabled(true);
        fx.event_loop.run_until_idle();
        let start = fx.grid.window().unwrap();
        assert_eq!((start.first, start.last), (0, 15));
        assert_eq!(fx.grid.rebuild_count(), 1);

        fx.grid.sync_selection_from_master(Some(50));
        fx.event_loop.run_until_idle();

        let window = fx.grid.window().unwrap();
        assert_eq!((window.first, window.last, window.columns), (35, 65, 5));
        assert_eq!(fx.viewport.viewport().scroll_y, 1000);
        assert_eq!(fx.model.selected_local_index(), Some(15));
        assert_eq!(fx.grid.selected_master_index(), Some(50));
        assert_eq!(fx.grid.rebuild_count(), 2);

        fx.grid.recompute();
        fx.grid.sync_selection_from_master(Some(50));
        fx.event_loop.run_until_idle();
        assert_eq!(fx.grid.rebuild_count(), 2);
    }

    #[test]
    fn test_prefetch_fills_window_and_repaints() {
        let fx = fixture_with(FakeStore::new(), 100);
        fx.grid.set_enabled(true);
        fx.grid.sync_selection_from_master(Some(50));

        let first = path_of(&fx, 35);
        let last = path_of(&fx, 65);
        assert!(fx.event_loop.run_until(Duration::from_secs(5), || {
            fx.grid.thumbnail_for(&first).is_some() && fx.grid.thumbnail_for(&last).is_some()
        }));
        assert!(fx.event_loop.run_until(Duration::from_secs(5), || fx.model.repaints() > 0));
        assert_eq!(fx.grid.applied_count(), 31);
        assert!(fx.grid.thumbnail_for(&path_of(&fx, 34)).is_none());
    }

    #[test]
    fn test_superseded_window_results_never_applied() {
        let fx = fixture_with(FakeStore::gated(), 100);
        fx.grid.set_enabled(true);
        // Worker blocks on the first item of the [0, 15] job.
        assert!(fx
            .event_loop
            .run_until(Duration::from_secs(5), || !fx.store.calls().is_empty()));

        fx.grid.sync_selection_from_master(Some(50));
        fx.store.open();

        let last = path_of(&fx, 65);
        assert!(fx
            .event_loop
            .run_until(Duration::from_secs(5), || fx.grid.thumbnail_for(&last).is_some()));
        for index in 0..=15 {
            assert!(fx.grid.thumbnail_for(&path_of(&fx, index)).is_none());
        }
    }

    #[test]
    fn test_scroll_ignored_while_applying_selection() {
        let fx = fixture_with(FakeStore::new(), 100);
        fx.grid.set_enabled(true);
        fx.event_loop.run_until_idle();

        fx.grid.sync_selection_from_master(Some(50));
        let rebuilds = fx.grid.rebuild_count();
        fx.viewport.user_scroll(0);
        assert_eq!(fx.grid.rebuild_count(), rebuilds);

        // The viewport already sits at the top; the next real scroll catches up.
        fx.event_loop.run_until_idle();
        fx.viewport.user_scroll(10);
        fx.event_loop.run_until_idle();
        assert_eq!(fx.grid.window().unwrap().first, 0);
    }

    #[test]
    fn test_click_forwards_master_index() {
        let fx = fixture_with(FakeStore::new(), 100);
        let forwarded = Rc::new(RefCell::new(Vec::new()));
        let forwarded_in = Rc::clone(&forwarded);
        fx.grid.set_forward(Rc::new(move |mode, index| {
            forwarded_in.borrow_mut().push((mode, index))
        }));
        fx.grid.set_enabled(true);
        fx.grid.sync_selection_from_master(Some(50));
        fx.event_loop.run_until_idle();
        assert!(forwarded.borrow().is_empty());

        fx.model.user_select(Some(3));
        assert_eq!(*forwarded.borrow(), vec![(CatalogMode::Browse, Some(38))]);
    }

    #[test]
    fn test_resize_is_debounced() {
        let fx = fixture_with(FakeStore::new(), 100);
        fx.grid.set_enabled(true);
        fx.event_loop.run_until_idle();
        let rebuilds = fx.grid.rebuild_count();

        fx.viewport.resize(400, 200);
        fx.viewport.resize(300, 200);
        assert_eq!(fx.grid.rebuild_count(), rebuilds);

        fx.event_loop.run_until_idle();
        assert_eq!(fx.grid.rebuild_count(), rebuilds + 1);
        assert_eq!(fx.grid.window().unwrap().columns, 3);
    }

    #[test]
    fn test_catalog_swap_resets_window_and_store() {
        let fx = fixture_with(FakeStore::new(), 100);
        fx.grid.set_enabled(true);
        fx.grid.sync_selection_from_master(Some(50));
        fx.event_loop.run_until_idle();
        let clears = fx.store.clears();

        fx.hub.replace(catalog(CatalogMode::Browse, &["a", "b", "c"]));
        fx.grid.catalog_replaced(CatalogMode::Browse);
        fx.event_loop.run_until_idle();

        let window = fx.grid.window().unwrap();
        assert_eq!((window.first, window.last), (0, 2));
        assert_eq!(fx.model.keys(), vec!["a", "b", "c"]);
        assert!(fx.store.clears() > clears);

        fx.hub.replace(catalog(CatalogMode::Browse, &[]));
        fx.grid.catalog_replaced(CatalogMode::Browse);
        assert!(fx.grid.window().is_none());
        assert_eq!(fx.model.model_size(), 0);
    }

    #[test]
    fn test_disable_empties_model() {
        let fx = fixture_with(FakeStore::new(), 20);
        fx.grid.set_enabled(true);
        fx.event_loop.run_until_idle();
        assert!(fx.model.model_size() > 0);

        fx.grid.set_enabled(false);
        fx.event_loop.run_until_idle();
        assert_eq!(fx.model.model_size(), 0);
        assert!(fx.grid.window().is_none());
        assert_eq!(fx.grid.attached_mode(), None);

        fx.grid.recompute();
        assert_eq!(fx.grid.rebuild_count(), 1);
    }

    #[test]
    fn test_follows_mode_activation() {
        let fx = fixture_with(FakeStore::new(), 10);
        fx.hub
            .replace(catalog(CatalogMode::ProjectDiscards, &["d1", "d2"]));
        fx.grid.set_enabled(true);
        fx.event_loop.run_until_idle();

        fx.hub.activate(CatalogMode::ProjectDiscards);
        fx.event_loop.run_until_idle();
        assert_eq!(fx.grid.attached_mode(), Some(CatalogMode::ProjectDiscards));
        assert_eq!(fx.model.keys(), vec!["d1", "d2"]);
    }
}

//! Toolkit-free widgets for the command-line front end and for tests.
//!
//! They behave like real list widgets where it matters to the coordinators:
//! changing the selection raises the selection-changed notification
//! synchronously, and rebuilding the model drops the selection.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use tracing::trace;

use crate::models::ItemKey;
use crate::ui::binding::{ViewBinding, ViewSyncAdapter};
use crate::window::geometry::{Viewport, ViewportGeometry};

type SelectionListener = Rc<dyn Fn(Option<usize>)>;

pub struct HeadlessListView {
    name: String,
    keys: RefCell<Vec<ItemKey>>,
    selected: Cell<Option<usize>>,
    last_ensured: Cell<Option<usize>>,
    ensure_calls: Cell<usize>,
    selection_events: Cell<usize>,
    rebuilds: Cell<usize>,
    repaints: Cell<usize>,
    listener: RefCell<Option<SelectionListener>>,
}

impl HeadlessListView {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            keys: RefCell::new(Vec::new()),
            selected: Cell::new(None),
            last_ensured: Cell::new(None),
            ensure_calls: Cell::new(0),
            selection_events: Cell::new(0),
            rebuilds: Cell::new(0),
            repaints: Cell::new(0),
            listener: RefCell::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Native selection-changed notification.
    pub fn connect_selection_changed<F>(&self, listener: F)
    where
        F: Fn(Option<usize>) + 'static,
    {
        *self.listener.borrow_mut() = Some(Rc::new(listener));
    }

    /// Routes this widget's notifications into `binding`.
    pub fn forward_to(&self, binding: &Rc<ViewBinding>) {
        let weak = Rc::downgrade(binding);
        self.connect_selection_changed(move |local| {
            if let Some(binding) = weak.upgrade() {
                binding.on_local_selection_changed(local);
            }
        });
    }

    /// Simulates a click on row `index` (or a deselect).
    pub fn user_select(&self, index: Option<usize>) {
        match index {
            Some(index) => self.set_selected_local_index(index),
            None => self.clear_selection(),
        }
    }

    pub fn keys(&self) -> Vec<ItemKey> {
        self.keys.borrow().clone()
    }

    pub fn last_ensured(&self) -> Option<usize> {
        self.last_ensured.get()
    }

    pub fn ensure_calls(&self) -> usize {
        self.ensure_calls.get()
    }

    /// Number of selection changes, programmatic or user-driven.
    pub fn selection_events(&self) -> usize {
        self.selection_events.get()
    }

    pub fn rebuilds(&self) -> usize {
        self.rebuilds.get()
    }

    pub fn repaints(&self) -> usize {
        self.repaints.get()
    }

    fn change_selection(&self, selected: Option<usize>) {
        if self.selected.replace(selected) == selected {
            return;
        }
        self.selection_events.set(self.selection_events.get() + 1);
        trace!(view = %self.name, ?selected, "Selection changed");
        let listener = self.listener.borrow().clone();
        if let Some(listener) = listener {
            listener(selected);
        }
    }
}

impl ViewSyncAdapter for HeadlessListView {
    fn selected_local_index(&self) -> Option<usize> {
        self.selected.get()
    }

    fn set_selected_local_index(&self, index: usize) {
        if index >= self.model_size() {
            trace!(view = %self.name, index, "Selection outside model");
            return;
        }
        self.change_selection(Some(index));
    }

    fn clear_selection(&self) {
        self.change_selection(None);
    }

    fn ensure_index_visible(&self, index: usize) {
        self.ensure_calls.set(self.ensure_calls.get() + 1);
        self.last_ensured.set(Some(index));
    }

    fn model_size(&self) -> usize {
        self.keys.borrow().len()
    }

    fn local_key_at(&self, index: usize) -> Option<ItemKey> {
        self.keys.borrow().get(index).cloned()
    }

    fn rebuild_model(&self, keys: &[ItemKey]) {
        *self.keys.borrow_mut() = keys.to_vec();
        self.rebuilds.set(self.rebuilds.get() + 1);
        self.change_selection(None);
    }

    fn repaint(&self) {
        self.repaints.set(self.repaints.get() + 1);
    }
}

type ScrollListener = Rc<dyn Fn(u64)>;
type ResizeListener = Rc<dyn Fn()>;

/// Scrollable area with fixed-size cells.
pub struct HeadlessViewport {
    viewport: Cell<Viewport>,
    cell: Cell<(u32, u32)>,
    scroll_listener: RefCell<Option<ScrollListener>>,
    resize_listener: RefCell<Option<ResizeListener>>,
}

impl HeadlessViewport {
    pub fn new(width: u32, height: u32, cell_width: u32, cell_height: u32) -> Self {
        Self {
            viewport: Cell::new(Viewport {
                width,
                height,
                scroll_y: 0,
            }),
            cell: Cell::new((cell_width, cell_height)),
            scroll_listener: RefCell::new(None),
            resize_listener: RefCell::new(None),
        }
    }

    pub fn connect_scrolled<F>(&self, listener: F)
    where
        F: Fn(u64) + 'static,
    {
        *self.scroll_listener.borrow_mut() = Some(Rc::new(listener));
    }

    pub fn connect_resized<F>(&self, listener: F)
    where
        F: Fn() + 'static,
    {
        *self.resize_listener.borrow_mut() = Some(Rc::new(listener));
    }

    /// Simulates the user dragging the scrollbar.
    pub fn user_scroll(&self, y: u64) {
        self.scroll_to(y);
    }

    pub fn resize(&self, width: u32, height: u32) {
        let mut viewport = self.viewport.get();
        viewport.width = width;
        viewport.height = height;
        self.viewport.set(viewport);
        let listener = self.resize_listener.borrow().clone();
        if let Some(listener) = listener {
            listener();
        }
    }
}

impl ViewportGeometry for HeadlessViewport {
    fn viewport(&self) -> Viewport {
        self.viewport.get()
    }

    fn cell_size(&self) -> (u32, u32) {
        self.cell.get()
    }

    fn scroll_to(&self, y: u64) {
        let mut viewport = self.viewport.get();
        if viewport.scroll_y == y {
            return;
        }
        viewport.scroll_y = y;
        self.viewport.set(viewport);
        let listener = self.scroll_listener.borrow().clone();
        if let Some(listener) = listener {
            listener(y);
        }
    }
}

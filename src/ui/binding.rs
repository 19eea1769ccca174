//! Driving concrete list widgets from the official selection.
//!
//! A widget implements [`ViewSyncAdapter`]; a [`ViewBinding`] owns the
//! translation between master-catalog indices and the widget's local rows,
//! and the "applying" guard that keeps the widget's own selection-changed
//! notification from echoing back into the coordinator.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use tracing::{debug, trace};

use crate::models::{CatalogHub, CatalogMode, ItemKey};
use crate::ui::event_loop::EventLoop;

/// Port implemented by every concrete list or grid widget.
///
/// All methods are called on the UI thread. `set_selected_local_index` and
/// `clear_selection` are expected to raise the widget's native
/// selection-changed notification.
pub trait ViewSyncAdapter {
    fn selected_local_index(&self) -> Option<usize>;
    fn set_selected_local_index(&self, index: usize);
    fn clear_selection(&self);
    fn ensure_index_visible(&self, index: usize);
    fn model_size(&self) -> usize;
    fn local_key_at(&self, index: usize) -> Option<ItemKey>;
    /// Replaces the widget's backing model with `keys`, in order.
    fn rebuild_model(&self, keys: &[ItemKey]);
    /// Redraw without any selection change.
    fn repaint(&self) {}
}

/// Anything a coordinator pushes the official selection into.
pub trait SelectionSink {
    /// Reflect `index` of the `mode` catalog as the visual selection.
    fn apply_official(&self, mode: CatalogMode, index: Option<usize>);
    /// Scroll the current selection into view without changing it.
    fn ensure_visible(&self, mode: CatalogMode, index: Option<usize>);
    /// The `mode` catalog was replaced wholesale.
    fn catalog_replaced(&self, _mode: CatalogMode) {}
}

/// Receives user-driven selections as `(mode, master index)`.
pub type SelectionForward = Rc<dyn Fn(CatalogMode, Option<usize>)>;

/// Row layout of a grouped project list: each group is a header row followed
/// by the group's items.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupedLayout {
    groups: Vec<(CatalogMode, usize)>,
}

impl GroupedLayout {
    pub fn new(groups: Vec<(CatalogMode, usize)>) -> Self {
        Self { groups }
    }

    /// Model key used for a group's header row.
    pub fn header_key(mode: CatalogMode) -> ItemKey {
        format!("#group:{}", mode)
    }

    /// Total number of rows, headers included.
    pub fn len(&self) -> usize {
        self.groups.iter().map(|(_, size)| size + 1).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn header_index(&self, mode: CatalogMode) -> Option<usize> {
        let mut offset = 0;
        for (group, size) in &self.groups {
            if *group == mode {
                return Some(offset);
            }
            offset += size + 1;
        }
        None
    }

    pub fn local_index(&self, mode: CatalogMode, index: usize) -> Option<usize> {
        let size = self.groups.iter().find(|(g, _)| *g == mode)?.1;
        if index >= size {
            return None;
        }
        Some(self.header_index(mode)? + 1 + index)
    }

    /// The group item shown at `local`; `None` for header rows.
    pub fn resolve(&self, local: usize) -> Option<(CatalogMode, usize)> {
        let mut offset = 0;
        for (group, size) in &self.groups {
            if local == offset {
                return None;
            }
            if local <= offset + size {
                return Some((*group, local - offset - 1));
            }
            offset += size + 1;
        }
        None
    }
}

/// How a widget's local rows relate to master-catalog indices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexMapping {
    /// The widget lists the whole catalog in order.
    Direct,
    /// The widget lists a caller-filtered subset; translate through keys.
    ByKey,
    /// The widget lists every project group under a header row.
    Grouped(GroupedLayout),
}

type KeyFilter = Box<dyn Fn(&str) -> bool>;

pub struct ViewBinding {
    name: String,
    mode: CatalogMode,
    self_weak: Weak<ViewBinding>,
    adapter: Rc<dyn ViewSyncAdapter>,
    hub: Rc<CatalogHub>,
    event_loop: EventLoop,
    mapping: RefCell<IndexMapping>,
    filter: Option<KeyFilter>,
    applying: Cell<usize>,
    forward: RefCell<Option<SelectionForward>>,
}

impl ViewBinding {
    /// Binds a widget showing the whole `mode` catalog.
    pub fn direct(
        name: &str,
        mode: CatalogMode,
        adapter: Rc<dyn ViewSyncAdapter>,
        hub: Rc<CatalogHub>,
        event_loop: EventLoop,
    ) -> Rc<Self> {
        Self::build(name, mode, adapter, hub, event_loop, IndexMapping::Direct, None)
    }

    /// Binds a widget showing only the keys of the `mode` catalog that pass `filter`.
    pub fn filtered<F>(
        name: &str,
        mode: CatalogMode,
        adapter: Rc<dyn ViewSyncAdapter>,
        hub: Rc<CatalogHub>,
        event_loop: EventLoop,
        filter: F,
    ) -> Rc<Self>
    where
        F: Fn(&str) -> bool + 'static,
    {
        Self::build(
            name,
            mode,
            adapter,
            hub,
            event_loop,
            IndexMapping::ByKey,
            Some(Box::new(filter)),
        )
    }

    /// Binds a widget showing all project groups with header rows.
    pub fn grouped(
        name: &str,
        adapter: Rc<dyn ViewSyncAdapter>,
        hub: Rc<CatalogHub>,
        event_loop: EventLoop,
    ) -> Rc<Self> {
        Self::build(
            name,
            CatalogMode::ProjectSelection,
            adapter,
            hub,
            event_loop,
            IndexMapping::Grouped(GroupedLayout::default()),
            None,
        )
    }

    fn build(
        name: &str,
        mode: CatalogMode,
        adapter: Rc<dyn ViewSyncAdapter>,
        hub: Rc<CatalogHub>,
        event_loop: EventLoop,
        mapping: IndexMapping,
        filter: Option<KeyFilter>,
    ) -> Rc<Self> {
        Rc::new_cyclic(|self_weak| Self {
            name: name.to_string(),
            mode,
            self_weak: self_weak.clone(),
            adapter,
            hub,
            event_loop,
            mapping: RefCell::new(mapping),
            filter,
            applying: Cell::new(0),
            forward: RefCell::new(None),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn adapter(&self) -> &Rc<dyn ViewSyncAdapter> {
        &self.adapter
    }

    pub fn mapping(&self) -> IndexMapping {
        self.mapping.borrow().clone()
    }

    pub fn is_applying(&self) -> bool {
        self.applying.get() > 0
    }

    /// Where user-driven selections are sent. Set by the owning coordinator.
    pub fn set_forward(&self, forward: SelectionForward) {
        *self.forward.borrow_mut() = Some(forward);
    }

    /// Whether this widget shows the `mode` catalog.
    pub fn handles(&self, mode: CatalogMode) -> bool {
        match &*self.mapping.borrow() {
            IndexMapping::Grouped(_) => mode.is_project(),
            _ => mode == self.mode,
        }
    }

    /// Rebuilds the widget model from the current catalog(s).
    pub fn rebuild(&self) {
        let keys = match &mut *self.mapping.borrow_mut() {
            IndexMapping::Grouped(layout) => {
                let mut keys = Vec::new();
                let mut groups = Vec::new();
                for mode in CatalogMode::PROJECT_GROUPS {
                    let catalog = self.hub.context(mode);
                    let catalog = catalog.borrow();
                    keys.push(GroupedLayout::header_key(mode));
                    keys.extend(catalog.keys().iter().cloned());
                    groups.push((mode, catalog.len()));
                }
                *layout = GroupedLayout::new(groups);
                keys
            }
            IndexMapping::ByKey => {
                let catalog = self.hub.context(self.mode);
                let catalog = catalog.borrow();
                catalog
                    .keys()
                    .iter()
                    .filter(|key| self.filter.as_ref().map_or(true, |keep| keep(key)))
                    .cloned()
                    .collect()
            }
            IndexMapping::Direct => self.hub.context(self.mode).borrow().keys().to_vec(),
        };

        debug!(view = %self.name, rows = keys.len(), "Rebuilding view model");
        self.hold();
        self.adapter.rebuild_model(&keys);
        self.release_next_turn(None);
    }

    /// Local row showing `index` of the `mode` catalog.
    pub fn local_index_for(&self, mode: CatalogMode, index: usize) -> Option<usize> {
        match &*self.mapping.borrow() {
            IndexMapping::Direct => (index < self.adapter.model_size()).then_some(index),
            IndexMapping::ByKey => {
                let catalog = self.hub.context(mode);
                let catalog = catalog.borrow();
                let key = catalog.key_at(index)?;
                (0..self.adapter.model_size())
                    .find(|&local| self.adapter.local_key_at(local).as_deref() == Some(key))
            }
            IndexMapping::Grouped(layout) => layout.local_index(mode, index),
        }
    }

    /// Master `(mode, index)` shown at local row `local`; `None` for rows
    /// that don't map to a catalog item.
    pub fn master_for_local(&self, local: usize) -> Option<(CatalogMode, usize)> {
        match &*self.mapping.borrow() {
            IndexMapping::Direct => Some((self.mode, local)),
            IndexMapping::ByKey => {
                let key = self.adapter.local_key_at(local)?;
                let index = self.hub.context(self.mode).borrow().index_of(&key)?;
                Some((self.mode, index))
            }
            IndexMapping::Grouped(layout) => layout.resolve(local),
        }
    }

    /// Sets the widget's selection to the row showing `index` of `mode`.
    pub fn apply(&self, mode: CatalogMode, index: Option<usize>) {
        if !self.handles(mode) {
            return;
        }
        let local = index.and_then(|i| self.local_index_for(mode, i));
        if index.is_some() && local.is_none() {
            debug!(view = %self.name, %mode, ?index, "Selection not shown in view");
        }

        if self.adapter.selected_local_index() == local {
            if let Some(local) = local {
                self.adapter.ensure_index_visible(local);
            }
            return;
        }

        self.hold();
        match local {
            Some(local) => self.adapter.set_selected_local_index(local),
            None => self.adapter.clear_selection(),
        }
        self.release_next_turn(local);
    }

    /// Entry point for the widget's native selection-changed notification.
    pub fn on_local_selection_changed(&self, local: Option<usize>) {
        if self.is_applying() {
            trace!(view = %self.name, ?local, "Ignoring selection echo");
            return;
        }

        let request = match local {
            Some(local) => match self.master_for_local(local) {
                Some((mode, index)) => (mode, Some(index)),
                None => {
                    trace!(view = %self.name, local, "Row has no catalog item");
                    return;
                }
            },
            None if self.handles(self.hub.active_mode()) => (self.hub.active_mode(), None),
            None => (self.mode, None),
        };

        let forward = self.forward.borrow().clone();
        match forward {
            Some(forward) => forward(request.0, request.1),
            None => debug!(view = %self.name, "View not attached to a coordinator"),
        }
    }

    fn hold(&self) {
        self.applying.set(self.applying.get() + 1);
    }

    /// Schedules the ensure-visible pass and drops the applying guard next turn.
    fn release_next_turn(&self, visible: Option<usize>) {
        let weak = self.self_weak.clone();
        self.event_loop.defer(move || {
            if let Some(binding) = weak.upgrade() {
                if let Some(local) = visible {
                    binding.adapter.ensure_index_visible(local);
                }
                binding.applying.set(binding.applying.get().saturating_sub(1));
            }
        });
    }
}

impl SelectionSink for ViewBinding {
    fn apply_official(&self, mode: CatalogMode, index: Option<usize>) {
        self.apply(mode, index);
    }

    fn ensure_visible(&self, mode: CatalogMode, index: Option<usize>) {
        if !self.handles(mode) {
            return;
        }
        if let Some(local) = index.and_then(|i| self.local_index_for(mode, i)) {
            self.adapter.ensure_index_visible(local);
        }
    }

    fn catalog_replaced(&self, mode: CatalogMode) {
        if self.handles(mode) {
            self.rebuild();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{catalog, project_hub};
    use crate::ui::headless::HeadlessListView;

    fn browse_hub(keys: &[&str]) -> Rc<CatalogHub> {
        let hub = Rc::new(CatalogHub::new());
        hub.replace(catalog(CatalogMode::Browse, keys));
        hub
    }

    fn wire(view: &Rc<HeadlessListView>, binding: &Rc<ViewBinding>) {
        let weak = Rc::downgrade(binding);
        view.connect_selection_changed(move |local| {
            if let Some(binding) = weak.upgrade() {
                binding.on_local_selection_changed(local);
            }
        });
    }

    #[test]
    fn test_grouped_layout_translation() {
        let layout = GroupedLayout::new(vec![
            (CatalogMode::ProjectSelection, 2),
            (CatalogMode::ProjectDiscards, 3),
        ]);

        assert_eq!(layout.len(), 7);
        assert_eq!(layout.header_index(CatalogMode::ProjectDiscards), Some(3));
        assert_eq!(layout.local_index(CatalogMode::ProjectSelection, 1), Some(2));
        assert_eq!(layout.local_index(CatalogMode::ProjectDiscards, 0), Some(4));
        assert_eq!(layout.local_index(CatalogMode::ProjectDiscards, 3), None);
        assert_eq!(layout.resolve(0), None);
        assert_eq!(layout.resolve(3), None);
        assert_eq!(layout.resolve(2), Some((CatalogMode::ProjectSelection, 1)));
        assert_eq!(layout.resolve(6), Some((CatalogMode::ProjectDiscards, 2)));
        assert_eq!(layout.resolve(7), None);
    }

    #[test]
    fn test_apply_sets_selection_and_ignores_echo() {
        let hub = browse_hub(&["a", "b", "c"]);
        let event_loop = EventLoop::new();
        let view = Rc::new(HeadlessListView::new("list"));
        let binding = ViewBinding::direct(
            "list",
            CatalogMode::Browse,
            view.clone(),
            hub,
            event_loop.clone(),
        );
        wire(&view, &binding);
        let forwarded = Rc::new(RefCell::new(Vec::new()));
        let forwarded_in = Rc::clone(&forwarded);
        binding.set_forward(Rc::new(move |mode, index| {
            forwarded_in.borrow_mut().push((mode, index))
        }));

        binding.rebuild();
        event_loop.run_until_idle();

        binding.apply(CatalogMode::Browse, Some(2));
        assert_eq!(view.selected_local_index(), Some(2));
        assert!(binding.is_applying());
        assert!(forwarded.borrow().is_empty());

        event_loop.run_until_idle();
        assert!(!binding.is_applying());
        assert_eq!(view.last_ensured(), Some(2));

        view.user_select(Some(1));
        assert_eq!(*forwarded.borrow(), vec![(CatalogMode::Browse, Some(1))]);
    }

    #[test]
    fn test_pending_release_does_not_keep_binding_alive() {
        let hub = browse_hub(&["a", "b", "c"]);
        let event_loop = EventLoop::new();
        let view = Rc::new(HeadlessListView::new("list"));
        let binding = ViewBinding::direct(
            "list",
            CatalogMode::Browse,
            view.clone(),
            hub,
            event_loop.clone(),
        );
        binding.rebuild();
        event_loop.run_until_idle();

        binding.apply(CatalogMode::Browse, Some(1));
        let weak = Rc::downgrade(&binding);
        drop(binding);
        assert!(weak.upgrade().is_none());

        // The deferred release finds nothing to touch.
        event_loop.run_until_idle();
        assert_eq!(view.last_ensured(), None);
        assert_eq!(view.selected_local_index(), Some(1));
    }

    #[test]
    fn test_apply_same_index_only_ensures_visible() {
        let hub = browse_hub(&["a", "b", "c"]);
        let event_loop = EventLoop::new();
        let view = Rc::new(HeadlessListView::new("list"));
        let binding = ViewBinding::direct(
            "list",
            CatalogMode::Browse,
            view.clone(),
            hub,
            event_loop.clone(),
        );
        binding.rebuild();
        binding.apply(CatalogMode::Browse, Some(1));
        event_loop.run_until_idle();
        let events = view.selection_events();

        binding.apply(CatalogMode::Browse, Some(1));
        assert_eq!(view.selection_events(), events);
        assert!(!binding.is_applying());
    }

    #[test]
    fn test_filtered_view_translates_by_key() {
        let hub = browse_hub(&["a", "b", "c", "d", "e"]);
        let event_loop = EventLoop::new();
        let view = Rc::new(HeadlessListView::new("filmstrip"));
        let binding = ViewBinding::filtered(
            "filmstrip",
            CatalogMode::Browse,
            view.clone(),
            Rc::clone(&hub),
            event_loop.clone(),
            |key| key != "b" && key != "d",
        );
        binding.rebuild();
        assert_eq!(view.keys(), vec!["a", "c", "e"]);

        let catalog = hub.context(CatalogMode::Browse);
        for key in ["a", "c", "e"] {
            let master = catalog.borrow().index_of(key).unwrap();
            let local = binding.local_index_for(CatalogMode::Browse, master).unwrap();
            assert_eq!(view.local_key_at(local).as_deref(), Some(key));
            assert_eq!(
                binding.master_for_local(local),
                Some((CatalogMode::Browse, master))
            );
        }

        assert_eq!(binding.local_index_for(CatalogMode::Browse, 1), None);
        binding.apply(CatalogMode::Browse, Some(4));
        assert_eq!(view.selected_local_index(), Some(2));
    }

    #[test]
    fn test_grouped_view_skips_headers() {
        let hub = project_hub(&["s1", "s2"], &["d1"]);
        let event_loop = EventLoop::new();
        let view = Rc::new(HeadlessListView::new("project"));
        let binding = ViewBinding::grouped("project", view.clone(), hub, event_loop.clone());
        wire(&view, &binding);
        let forwarded = Rc::new(RefCell::new(Vec::new()));
        let forwarded_in = Rc::clone(&forwarded);
        binding.set_forward(Rc::new(move |mode, index| {
            forwarded_in.borrow_mut().push((mode, index))
        }));

        binding.rebuild();
        event_loop.run_until_idle();
        assert_eq!(view.model_size(), 5);

        binding.apply(CatalogMode::ProjectDiscards, Some(0));
        assert_eq!(view.selected_local_index(), Some(4));
        event_loop.run_until_idle();

        view.user_select(Some(3));
        view.user_select(Some(1));
        assert_eq!(
            *forwarded.borrow(),
            vec![(CatalogMode::ProjectSelection, Some(0))]
        );
        assert!(!binding.handles(CatalogMode::Browse));
    }
}

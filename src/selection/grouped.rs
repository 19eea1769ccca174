//! Coordinator of the project mode.
//!
//! One grouped widget lists the project's selection and discards under a
//! header row each. Only one group holds the official selection at a time;
//! the other remembers what was selected in it when it was left.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use tracing::{debug, trace, warn};

use super::coordinator::SelectionCoordinator;
use super::sync::SyncCore;
use crate::config::NavigationConfig;
use crate::models::{CatalogChange, CatalogHub, CatalogMode, ItemKey};
use crate::ui::binding::{SelectionSink, ViewBinding};
use crate::ui::content::ContentLoader;
use crate::ui::event_loop::EventLoop;

pub struct GroupedCoordinator {
    core: Rc<SyncCore>,
    active_group: Cell<CatalogMode>,
    parked: RefCell<HashMap<CatalogMode, ItemKey>>,
}

impl GroupedCoordinator {
    pub fn new(hub: Rc<CatalogHub>, event_loop: EventLoop, navigation: NavigationConfig) -> Rc<Self> {
        let core = SyncCore::new("project", Rc::clone(&hub), event_loop, navigation);
        let coordinator = Rc::new(Self {
            core,
            active_group: Cell::new(CatalogMode::ProjectSelection),
            parked: RefCell::new(HashMap::new()),
        });

        let weak = Rc::downgrade(&coordinator);
        hub.connect_changed(move |change| {
            let Some(this) = weak.upgrade() else { return };
            if let CatalogChange::Replaced(mode) = change {
                if mode.is_project() {
                    this.on_group_replaced(mode);
                }
            }
        });
        coordinator
    }

    pub fn core(&self) -> &Rc<SyncCore> {
        &self.core
    }

    /// The group the official index refers to.
    pub fn active_group(&self) -> CatalogMode {
        self.active_group.get()
    }

    /// Key remembered for an inactive group.
    pub fn parked_key(&self, group: CatalogMode) -> Option<ItemKey> {
        self.parked.borrow().get(&group).cloned()
    }

    pub fn set_content_loader(&self, loader: Rc<dyn ContentLoader>) {
        self.core.set_content_loader(loader);
    }

    /// Drives the grouped widget and forwards its user-driven selections.
    pub fn attach_view(self: &Rc<Self>, binding: Rc<ViewBinding>) {
        let weak = Rc::downgrade(self);
        binding.set_forward(Rc::new(move |mode, index| {
            if let Some(this) = weak.upgrade() {
                this.select_in_group(mode, index);
            }
        }));
        binding.rebuild();
        binding.apply(self.active_group(), self.official_index());
        self.core.add_sink(binding);
    }

    pub fn attach_sink(&self, sink: Rc<dyn SelectionSink>) {
        self.core.add_sink(sink);
    }

    /// Selects `index` of `group`, moving the official selection between
    /// groups when needed.
    pub fn select_in_group(&self, group: CatalogMode, index: Option<usize>) {
        if !group.is_project() {
            warn!(%group, "Not a project group");
            return;
        }
        if self.core.is_synchronizing() {
            trace!(%group, ?index, "Dropping re-entrant group selection");
            return;
        }

        if group == self.active_group() {
            self.core.hub().activate(group);
            self.core.select(group, index);
            return;
        }

        if let Some(i) = index {
            let len = self.core.len(group);
            if i >= len {
                warn!(%group, index = i, len, "Ignoring out-of-range selection");
                return;
            }
        }
        self.switch_group(group);
        self.core.hub().activate(group);
        // Views and content still show the previous group's item.
        self.core.select_after_reset(group, index);
    }

    /// Moves to `group`, restoring the selection it had when it was left.
    pub fn activate_group(&self, group: CatalogMode) {
        let index = self
            .parked_key(group)
            .and_then(|key| self.core.hub().context(group).borrow().index_of(&key));
        self.select_in_group(group, index);
    }

    fn switch_group(&self, group: CatalogMode) {
        let previous = self.active_group.replace(group);
        if let Some(key) = self.core.selected_key() {
            self.parked.borrow_mut().insert(previous, key);
        }
        self.parked.borrow_mut().remove(&group);
        // The official index and selected key belonged to the previous group.
        self.core.hub().context(previous).borrow_mut().set_selected_key(None);
        self.core.reset_official(None, None);
        debug!(from = %previous, to = %group, "Switched project group");
    }

    fn on_group_replaced(&self, group: CatalogMode) {
        if group != self.active_group() {
            let gone = self
                .parked_key(group)
                .map_or(false, |key| self.core.hub().context(group).borrow().index_of(&key).is_none());
            if gone {
                self.parked.borrow_mut().remove(&group);
            }
        }
        self.core.resync_after_replace(group, self.active_group());
    }
}

impl SelectionCoordinator for GroupedCoordinator {
    fn mode(&self) -> CatalogMode {
        self.active_group()
    }

    fn len(&self) -> usize {
        self.core.len(self.active_group())
    }

    fn official_index(&self) -> Option<usize> {
        self.core.official()
    }

    fn is_synchronizing(&self) -> bool {
        self.core.is_synchronizing()
    }

    fn navigation(&self) -> NavigationConfig {
        self.core.navigation()
    }

    fn select_by_index(&self, index: Option<usize>) {
        self.select_in_group(self.active_group(), index);
    }

    fn ensure_selection_visible(&self) {
        self.core.ensure_visible(self.active_group());
    }
}

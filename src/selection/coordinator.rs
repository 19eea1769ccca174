//! The coordinator contract and the canonical list coordinator.

use std::rc::Rc;

use tracing::trace;

use super::navigation::{self, NavStep};
use super::sync::SyncCore;
use crate::config::NavigationConfig;
use crate::models::{CatalogChange, CatalogHub, CatalogMode, ItemKey};
use crate::ui::binding::{SelectionSink, ViewBinding};
use crate::ui::content::ContentLoader;
use crate::ui::event_loop::EventLoop;

/// Single source of truth for "which item is selected" in one context.
///
/// Implementors provide the commit path; navigation is derived from it.
pub trait SelectionCoordinator {
    fn mode(&self) -> CatalogMode;
    fn len(&self) -> usize;
    fn official_index(&self) -> Option<usize>;
    fn is_synchronizing(&self) -> bool;
    fn navigation(&self) -> NavigationConfig;
    /// `None` clears the selection. Out-of-range indices are ignored.
    fn select_by_index(&self, index: Option<usize>);
    fn ensure_selection_visible(&self);

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn step(&self, step: NavStep) {
        if self.is_synchronizing() {
            trace!(?step, "Dropping navigation while synchronizing");
            return;
        }
        let current = self.official_index();
        let Some(candidate) =
            navigation::candidate(current, self.len(), step, &self.navigation())
        else {
            return;
        };
        if Some(candidate) == current {
            self.ensure_selection_visible();
        } else {
            self.select_by_index(Some(candidate));
        }
    }

    fn select_next(&self) {
        self.step(NavStep::Next)
    }

    fn select_previous(&self) {
        self.step(NavStep::Previous)
    }

    fn select_first(&self) {
        self.step(NavStep::First)
    }

    fn select_last(&self) {
        self.step(NavStep::Last)
    }

    fn select_page_forward(&self) {
        self.step(NavStep::PageForward)
    }

    fn select_page_backward(&self) {
        self.step(NavStep::PageBackward)
    }
}

/// Coordinator of the browse catalog, shown by one or more list widgets.
pub struct ListCoordinator {
    core: Rc<SyncCore>,
}

impl ListCoordinator {
    pub fn new(hub: Rc<CatalogHub>, event_loop: EventLoop, navigation: NavigationConfig) -> Rc<Self> {
        let core = SyncCore::new("list", Rc::clone(&hub), event_loop, navigation);
        let coordinator = Rc::new(Self { core });

        let weak = Rc::downgrade(&coordinator);
        hub.connect_changed(move |change| {
            if let (Some(this), CatalogChange::Replaced(CatalogMode::Browse)) = (weak.upgrade(), change) {
                this.core
                    .resync_after_replace(CatalogMode::Browse, CatalogMode::Browse);
            }
        });
        coordinator
    }

    pub fn core(&self) -> &Rc<SyncCore> {
        &self.core
    }

    pub fn selected_key(&self) -> Option<ItemKey> {
        self.core.selected_key()
    }

    pub fn set_content_loader(&self, loader: Rc<dyn ContentLoader>) {
        self.core.set_content_loader(loader);
    }

    /// Drives `binding` from this coordinator and forwards its user-driven
    /// selections back.
    pub fn attach_view(self: &Rc<Self>, binding: Rc<ViewBinding>) {
        let weak = Rc::downgrade(self);
        binding.set_forward(Rc::new(move |mode, index| {
            if let Some(this) = weak.upgrade() {
                if mode == CatalogMode::Browse {
                    this.select_by_index(index);
                }
            }
        }));
        binding.rebuild();
        binding.apply(CatalogMode::Browse, self.official_index());
        self.core.add_sink(binding);
    }

    /// Registers a sink that only follows the selection, like a windowed grid.
    pub fn attach_sink(&self, sink: Rc<dyn SelectionSink>) {
        self.core.add_sink(sink);
    }
}

impl SelectionCoordinator for ListCoordinator {
    fn mode(&self) -> CatalogMode {
        CatalogMode::Browse
    }

    fn len(&self) -> usize {
        self.core.len(CatalogMode::Browse)
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
        self.core.select(CatalogMode::Browse, index);
    }

    fn ensure_selection_visible(&self) {
        self.core.ensure_visible(CatalogMode::Browse);
    }
}

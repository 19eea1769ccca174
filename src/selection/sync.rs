//! The commit path shared by every coordinator.
//!
//! `SyncCore` owns one [`SelectionState`] and pushes each accepted change to
//! the content loader and to every registered [`SelectionSink`]. The
//! `Synchronizing` phase is entered before anything downstream runs and left
//! on the next event-loop turn, so selection echoes raised by widgets while
//! the change propagates are dropped at this single entry point.

use std::cell::RefCell;
use std::path::Path;
use std::rc::{Rc, Weak};

use tracing::{debug, info, trace, warn};

use super::state::{SelectionState, SyncPhase};
use crate::config::NavigationConfig;
use crate::models::{CatalogHub, CatalogMode, ItemKey};
use crate::ui::binding::SelectionSink;
use crate::ui::content::{ContentLoader, ContentRequest};
use crate::ui::event_loop::EventLoop;

/// What a call to [`SyncCore::select`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectOutcome {
    /// Index outside the catalog; nothing changed.
    Invalid,
    /// Arrived while synchronizing; dropped.
    Dropped,
    /// Already the official index; only an ensure-visible pass ran.
    Unchanged,
    Applied,
}

pub struct SyncCore {
    name: &'static str,
    self_weak: Weak<SyncCore>,
    hub: Rc<CatalogHub>,
    event_loop: EventLoop,
    navigation: NavigationConfig,
    state: RefCell<SelectionState>,
    /// Key of the last committed selection, kept across catalog replacement.
    selected_key: RefCell<Option<ItemKey>>,
    loader: RefCell<Option<Rc<dyn ContentLoader>>>,
    sinks: RefCell<Vec<Rc<dyn SelectionSink>>>,
}

impl SyncCore {
    pub fn new(
        name: &'static str,
        hub: Rc<CatalogHub>,
        event_loop: EventLoop,
        navigation: NavigationConfig,
    ) -> Rc<Self> {
        Rc::new_cyclic(|self_weak| Self {
            name,
            self_weak: self_weak.clone(),
            hub,
            event_loop,
            navigation,
            state: RefCell::new(SelectionState::new()),
            selected_key: RefCell::new(None),
            loader: RefCell::new(None),
            sinks: RefCell::new(Vec::new()),
        })
    }

    pub fn hub(&self) -> &Rc<CatalogHub> {
        &self.hub
    }

    pub fn event_loop(&self) -> &EventLoop {
        &self.event_loop
    }

    pub fn navigation(&self) -> NavigationConfig {
        self.navigation
    }

    pub fn official(&self) -> Option<usize> {
        self.state.borrow().official()
    }

    pub fn phase(&self) -> SyncPhase {
        self.state.borrow().phase()
    }

    pub fn is_synchronizing(&self) -> bool {
        self.state.borrow().is_synchronizing()
    }

    pub fn selected_key(&self) -> Option<ItemKey> {
        self.selected_key.borrow().clone()
    }

    pub fn len(&self, mode: CatalogMode) -> usize {
        self.hub.context(mode).borrow().len()
    }

    pub fn set_content_loader(&self, loader: Rc<dyn ContentLoader>) {
        *self.loader.borrow_mut() = Some(loader);
    }

    pub fn add_sink(&self, sink: Rc<dyn SelectionSink>) {
        self.sinks.borrow_mut().push(sink);
    }

    /// Overwrites the official index without propagating it anywhere.
    pub(crate) fn reset_official(&self, index: Option<usize>, key: Option<ItemKey>) {
        self.state.borrow_mut().set_official(index);
        *self.selected_key.borrow_mut() = key;
    }

    /// Makes `index` of the `mode` catalog the official selection.
    pub fn select(&self, mode: CatalogMode, index: Option<usize>) -> SelectOutcome {
        self.commit(mode, index, false)
    }

    /// Like [`SyncCore::select`], but commits even when `index` equals the
    /// official index. Used after the official index was reset for another
    /// catalog, where sinks and content still show the old selection.
    pub(crate) fn select_after_reset(&self, mode: CatalogMode, index: Option<usize>) -> SelectOutcome {
        self.commit(mode, index, true)
    }

    fn commit(&self, mode: CatalogMode, index: Option<usize>, force: bool) -> SelectOutcome {
        let catalog = self.hub.context(mode);
        let len = catalog.borrow().len();
        if let Some(i) = index {
            if i >= len {
                warn!(coordinator = self.name, %mode, index = i, len, "Ignoring out-of-range selection");
                return SelectOutcome::Invalid;
            }
        }

        if self.is_synchronizing() {
            trace!(coordinator = self.name, ?index, "Dropping re-entrant selection");
            return SelectOutcome::Dropped;
        }

        if !force && index == self.official() {
            self.ensure_visible(mode);
            return SelectOutcome::Unchanged;
        }

        if !self.state.borrow_mut().try_begin() {
            return SelectOutcome::Dropped;
        }
        self.state.borrow_mut().set_official(index);

        let request = {
            let mut catalog = catalog.borrow_mut();
            let key = index.and_then(|i| catalog.key_at(i)).map(str::to_string);
            catalog.set_selected_key(key.clone());
            *self.selected_key.borrow_mut() = key.clone();
            index.zip(key).map(|(index, key)| ContentRequest {
                mode,
                index,
                path: catalog.path_for(&key).map(Path::to_path_buf),
                key,
            })
        };

        debug!(
            coordinator = self.name,
            %mode,
            ?index,
            key = request.as_ref().map(|r| r.key.as_str()),
            "Selection changed"
        );

        self.load_content(request);
        self.apply_to_sinks(mode, index);
        self.finish_next_turn();
        SelectOutcome::Applied
    }

    /// Scrolls every sink to the official selection.
    pub fn ensure_visible(&self, mode: CatalogMode) {
        let official = self.official();
        for sink in self.sinks_snapshot() {
            sink.ensure_visible(mode, official);
        }
    }

    /// Brings views and the official index in line after `replaced` was
    /// swapped on the hub. `selected_mode` is the catalog the official index
    /// refers to.
    pub fn resync_after_replace(&self, replaced: CatalogMode, selected_mode: CatalogMode) {
        let sinks = self.sinks_snapshot();
        for sink in &sinks {
            sink.catalog_replaced(replaced);
        }

        let began = self.state.borrow_mut().try_begin();
        if replaced == selected_mode {
            let key = self.selected_key();
            let catalog = self.hub.context(replaced);
            let index = key.as_deref().and_then(|k| catalog.borrow().index_of(k));
            catalog.borrow_mut().set_selected_key(index.and(key.clone()));
            self.state.borrow_mut().set_official(index);

            match (key, index) {
                (Some(key), None) => {
                    info!(coordinator = self.name, %key, "Selected item gone after reload");
                    *self.selected_key.borrow_mut() = None;
                    self.load_content(None);
                }
                (Some(key), Some(index)) => {
                    debug!(coordinator = self.name, %key, index, "Re-resolved selection after reload");
                }
                _ => {}
            }
        }

        let official = self.official();
        for sink in &sinks {
            sink.apply_official(selected_mode, official);
        }
        if began {
            self.finish_next_turn();
        }
    }

    fn load_content(&self, request: Option<ContentRequest>) {
        let loader = self.loader.borrow().clone();
        match (loader, request) {
            (Some(loader), Some(request)) => loader.load_for_index(request),
            (Some(loader), None) => loader.clear_content(),
            (None, _) => warn!(coordinator = self.name, "No content loader attached"),
        }
    }

    fn apply_to_sinks(&self, mode: CatalogMode, index: Option<usize>) {
        for sink in self.sinks_snapshot() {
            sink.apply_official(mode, index);
        }
    }

    // Sinks may register further sinks or re-enter; never hold the borrow while calling them.
    fn sinks_snapshot(&self) -> Vec<Rc<dyn SelectionSink>> {
        self.sinks.borrow().clone()
    }

    fn finish_next_turn(&self) {
        let weak = self.self_weak.clone();
        self.event_loop.defer(move || {
            if let Some(core) = weak.upgrade() {
                core.state.borrow_mut().finish();
                trace!(coordinator = core.name, "Synchronization finished");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{catalog, RecordingLoader};

    fn core_with(keys: &[&str]) -> (Rc<SyncCore>, Rc<RecordingLoader>, EventLoop) {
        let hub = Rc::new(CatalogHub::new());
        hub.replace(catalog(CatalogMode::Browse, keys));
        let event_loop = EventLoop::new();
        let core = SyncCore::new("test", hub, event_loop.clone(), NavigationConfig::default());
        let loader = Rc::new(RecordingLoader::default());
        core.set_content_loader(loader.clone());
        (core, loader, event_loop)
    }

    #[test]
    fn test_select_commits_key_and_loads() {
        let (core, loader, event_loop) = core_with(&["a", "b", "c"]);

        assert_eq!(core.select(CatalogMode::Browse, Some(1)), SelectOutcome::Applied);
        assert_eq!(core.official(), Some(1));
        assert_eq!(core.phase(), SyncPhase::Synchronizing);
        assert_eq!(
            core.hub().context(CatalogMode::Browse).borrow().selected_key(),
            Some("b")
        );
        assert_eq!(loader.loaded_keys(), vec!["b"]);

        event_loop.run_until_idle();
        assert_eq!(core.phase(), SyncPhase::Idle);
    }

    #[test]
    fn test_guard_drops_until_next_turn() {
        let (core, loader, event_loop) = core_with(&["a", "b", "c"]);

        core.select(CatalogMode::Browse, Some(0));
        assert_eq!(core.select(CatalogMode::Browse, Some(2)), SelectOutcome::Dropped);
        assert_eq!(core.official(), Some(0));

        event_loop.turn();
        assert_eq!(core.select(CatalogMode::Browse, Some(2)), SelectOutcome::Applied);
        assert_eq!(loader.loaded_keys(), vec!["a", "c"]);
    }

    #[test]
    fn test_invalid_and_clear() {
        let (core, loader, event_loop) = core_with(&["a", "b"]);

        assert_eq!(core.select(CatalogMode::Browse, Some(2)), SelectOutcome::Invalid);
        assert_eq!(core.select(CatalogMode::Browse, None), SelectOutcome::Unchanged);

        core.select(CatalogMode::Browse, Some(1));
        event_loop.run_until_idle();
        assert_eq!(core.select(CatalogMode::Browse, None), SelectOutcome::Applied);
        assert_eq!(core.official(), None);
        assert_eq!(core.selected_key(), None);
        assert_eq!(loader.clears(), 1);
    }

    #[test]
    fn test_replace_re_resolves_or_clears() {
        let (core, loader, event_loop) = core_with(&["a", "b", "c"]);
        core.select(CatalogMode::Browse, Some(1));
        event_loop.run_until_idle();

        core.hub().replace(catalog(CatalogMode::Browse, &["x", "b"]));
        core.resync_after_replace(CatalogMode::Browse, CatalogMode::Browse);
        assert_eq!(core.official(), Some(1));
        assert_eq!(core.selected_key().as_deref(), Some("b"));
        event_loop.run_until_idle();

        core.hub().replace(catalog(CatalogMode::Browse, &["x", "y"]));
        core.resync_after_replace(CatalogMode::Browse, CatalogMode::Browse);
        assert_eq!(core.official(), None);
        assert_eq!(core.selected_key(), None);
        assert_eq!(loader.clears(), 1);
    }
}

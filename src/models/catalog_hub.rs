//! Owner of the per-mode catalogs and of the "active mode" switch.
//!
//! All access happens on the UI thread. Listeners are told about wholesale
//! replacements and mode activations, in registration order.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use tracing::debug;

use super::catalog::{CatalogContext, CatalogMode};

/// A catalog shared between the hub, coordinators and windowed views.
pub type SharedCatalog = Rc<RefCell<CatalogContext>>;

/// Notification raised by [`CatalogHub`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogChange {
    /// The catalog of this mode was reloaded or replaced wholesale.
    Replaced(CatalogMode),
    /// This mode became the active one.
    Activated(CatalogMode),
}

type ChangeListener = Rc<dyn Fn(CatalogChange)>;

pub struct CatalogHub {
    contexts: HashMap<CatalogMode, SharedCatalog>,
    active: Cell<CatalogMode>,
    listeners: RefCell<Vec<ChangeListener>>,
}

impl CatalogHub {
    /// Creates a hub with an empty catalog for every mode; `Browse` is active.
    pub fn new() -> Self {
        let contexts = [
            CatalogMode::Browse,
            CatalogMode::ProjectSelection,
            CatalogMode::ProjectDiscards,
        ]
        .into_iter()
        .map(|mode| (mode, Rc::new(RefCell::new(CatalogContext::new(mode)))))
        .collect();

        Self {
            contexts,
            active: Cell::new(CatalogMode::Browse),
            listeners: RefCell::new(Vec::new()),
        }
    }

    /// The shared catalog of `mode`. The handle stays valid across replacements.
    pub fn context(&self, mode: CatalogMode) -> SharedCatalog {
        Rc::clone(&self.contexts[&mode])
    }

    pub fn active_mode(&self) -> CatalogMode {
        self.active.get()
    }

    pub fn active(&self) -> SharedCatalog {
        self.context(self.active_mode())
    }

    /// Replaces the catalog of `catalog.mode()` and notifies listeners.
    pub fn replace(&self, catalog: CatalogContext) {
        let mode = catalog.mode();
        debug!(
            %mode,
            items = catalog.len(),
            generation = catalog.generation(),
            "Replacing catalog"
        );
        *self.contexts[&mode].borrow_mut() = catalog;
        self.notify(CatalogChange::Replaced(mode));
    }

    /// Makes `mode` the active catalog. No notification if it already is.
    pub fn activate(&self, mode: CatalogMode) {
        if self.active.replace(mode) == mode {
            return;
        }
        debug!(%mode, "Activated catalog mode");
        self.notify(CatalogChange::Activated(mode));
    }

    pub fn connect_changed<F>(&self, listener: F)
    where
        F: Fn(CatalogChange) + 'static,
    {
        self.listeners.borrow_mut().push(Rc::new(listener));
    }

    fn notify(&self, change: CatalogChange) {
        // Snapshot so listeners may register further listeners.
        let listeners: Vec<ChangeListener> = self.listeners.borrow().clone();
        for listener in listeners {
            listener(change);
        }
    }
}

impl Default for CatalogHub {
    fn default() -> Self {
        Self::new()
    }
}

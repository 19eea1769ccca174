//! Routes navigation to the coordinator of the hub's active mode.

use std::rc::Rc;

use super::coordinator::{ListCoordinator, SelectionCoordinator};
use super::grouped::GroupedCoordinator;
use super::navigation::NavStep;
use crate::models::{CatalogHub, CatalogMode};

/// The coordinator in charge of one mode.
#[derive(Clone)]
pub enum ActiveCoordinator {
    List(Rc<ListCoordinator>),
    Grouped(Rc<GroupedCoordinator>),
}

impl ActiveCoordinator {
    pub fn as_dyn(&self) -> &dyn SelectionCoordinator {
        match self {
            Self::List(list) => list.as_ref(),
            Self::Grouped(grouped) => grouped.as_ref(),
        }
    }
}

pub struct ModeRouter {
    hub: Rc<CatalogHub>,
    browse: Rc<ListCoordinator>,
    project: Rc<GroupedCoordinator>,
}

impl ModeRouter {
    pub fn new(
        hub: Rc<CatalogHub>,
        browse: Rc<ListCoordinator>,
        project: Rc<GroupedCoordinator>,
    ) -> Rc<Self> {
        Rc::new(Self {
            hub,
            browse,
            project,
        })
    }

    pub fn browse(&self) -> &Rc<ListCoordinator> {
        &self.browse
    }

    pub fn project(&self) -> &Rc<GroupedCoordinator> {
        &self.project
    }

    pub fn coordinator_for(&self, mode: CatalogMode) -> ActiveCoordinator {
        match mode {
            CatalogMode::Browse => ActiveCoordinator::List(Rc::clone(&self.browse)),
            CatalogMode::ProjectSelection | CatalogMode::ProjectDiscards => {
                ActiveCoordinator::Grouped(Rc::clone(&self.project))
            }
        }
    }

    pub fn active(&self) -> ActiveCoordinator {
        self.coordinator_for(self.hub.active_mode())
    }

    pub fn step(&self, step: NavStep) {
        self.active().as_dyn().step(step);
    }

    pub fn select_by_index(&self, index: Option<usize>) {
        self.active().as_dyn().select_by_index(index);
    }

    /// Applies a view-originated `(mode, index)` request.
    pub fn select_in_mode(&self, mode: CatalogMode, index: Option<usize>) {
        match self.coordinator_for(mode) {
            ActiveCoordinator::List(list) => list.select_by_index(index),
            ActiveCoordinator::Grouped(grouped) => grouped.select_in_group(mode, index),
        }
    }

    /// Official index of the active mode's coordinator.
    pub fn official_index(&self) -> Option<usize> {
        self.active().as_dyn().official_index()
    }

    pub fn is_synchronizing(&self) -> bool {
        self.active().as_dyn().is_synchronizing()
    }

    /// Switches the hub to browsing.
    pub fn enter_browse(&self) {
        self.hub.activate(CatalogMode::Browse);
    }

    /// Switches the hub to the project group the grouped coordinator is on.
    pub fn enter_project(&self) {
        self.project.activate_group(self.project.active_group());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NavigationConfig;
    use crate::test_support::{catalog, project_hub};
    use crate::ui::event_loop::EventLoop;

    fn router() -> (Rc<ModeRouter>, Rc<CatalogHub>, EventLoop) {
        let hub = project_hub(&["s1", "s2"], &["d1"]);
        hub.replace(catalog(CatalogMode::Browse, &["a", "b", "c"]));
        let event_loop = EventLoop::new();
        let browse = ListCoordinator::new(Rc::clone(&hub), event_loop.clone(), NavigationConfig::default());
        let project =
            GroupedCoordinator::new(Rc::clone(&hub), event_loop.clone(), NavigationConfig::default());
        (ModeRouter::new(Rc::clone(&hub), browse, project), hub, event_loop)
    }

    #[test]
    fn test_routes_by_active_mode() {
        let (router, hub, event_loop) = router();

        router.step(NavStep::Last);
        event_loop.run_until_idle();
        assert_eq!(router.browse().official_index(), Some(2));
        assert_eq!(router.project().official_index(), None);

        router.enter_project();
        event_loop.run_until_idle();
        assert_eq!(hub.active_mode(), CatalogMode::ProjectSelection);

        router.step(NavStep::Next);
        event_loop.run_until_idle();
        assert_eq!(router.project().official_index(), Some(0));
        assert_eq!(router.official_index(), Some(0));
        assert_eq!(router.browse().official_index(), Some(2));

        router.enter_browse();
        assert_eq!(router.official_index(), Some(2));
    }

    #[test]
    fn test_select_in_mode_reaches_group() {
        let (router, hub, event_loop) = router();
        router.select_in_mode(CatalogMode::ProjectDiscards, Some(0));
        event_loop.run_until_idle();
        assert_eq!(hub.active_mode(), CatalogMode::ProjectDiscards);
        assert_eq!(router.project().active_group(), CatalogMode::ProjectDiscards);
        assert!(!router.is_synchronizing());
    }
}

//! Headless catalog session: every coordinator, view and pipeline wired to
//! one hub and one event loop.

use std::fmt;
use std::path::Path;
use std::rc::Rc;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::Settings;
use crate::models::{CatalogHub, CatalogMode, ItemKey};
use crate::scanner::{CatalogScanner, ScanConfig};
use crate::selection::{GroupedCoordinator, ListCoordinator, ModeRouter, NavStep};
use crate::thumbnails::{MemoryThumbnailStore, ThumbnailStore, WorkerPool};
use crate::ui::content::PreviewLoader;
use crate::ui::event_loop::EventLoop;
use crate::ui::headless::{HeadlessListView, HeadlessViewport};
use crate::ui::ViewBinding;
use crate::window::{GridWindow, ThumbnailWindow};

/// Size of the headless grid viewport in pixels.
const GRID_VIEWPORT: (u32, u32) = (960, 640);

/// How long a command may take to settle, decodes included.
const SETTLE_TIMEOUT: Duration = Duration::from_secs(10);

/// A navigation or view command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Step(NavStep),
    Select(usize),
    Clear,
    GridOn,
    GridOff,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("unknown command: {0}")]
    Unknown(String),
    #[error("invalid index in {0:?}")]
    InvalidIndex(String),
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(index) = s.strip_prefix("select=") {
            return index
                .parse()
                .map(Command::Select)
                .map_err(|_| CommandError::InvalidIndex(s.to_string()));
        }
        Ok(match s {
            "next" => Command::Step(NavStep::Next),
            "prev" => Command::Step(NavStep::Previous),
            "first" => Command::Step(NavStep::First),
            "last" => Command::Step(NavStep::Last),
            "page-forward" => Command::Step(NavStep::PageForward),
            "page-backward" => Command::Step(NavStep::PageBackward),
            "clear" => Command::Clear,
            "grid-on" => Command::GridOn,
            "grid-off" => Command::GridOff,
            other => return Err(CommandError::Unknown(other.to_string())),
        })
    }
}

/// Snapshot of what the session shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    pub mode: CatalogMode,
    pub len: usize,
    pub index: Option<usize>,
    pub key: Option<ItemKey>,
    pub preview: Option<ItemKey>,
    pub window: Option<ThumbnailWindow>,
}

impl fmt::Display for SessionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{} items] ", self.mode, self.len)?;
        match (self.index, &self.key) {
            (Some(index), Some(key)) => write!(f, "selected #{} {}", index, key)?,
            _ => f.write_str("no selection")?,
        }
        if let Some(window) = self.window {
            write!(
                f,
                ", grid window {}..={} ({} columns)",
                window.first, window.last, window.columns
            )?;
        }
        Ok(())
    }
}

pub struct CatalogSession {
    hub: Rc<CatalogHub>,
    event_loop: EventLoop,
    pool: Arc<WorkerPool>,
    router: Rc<ModeRouter>,
    scanner: Rc<CatalogScanner>,
    preview: Rc<PreviewLoader>,
    list_view: Rc<HeadlessListView>,
    project_view: Rc<HeadlessListView>,
    grid: Rc<GridWindow>,
    grid_model: Rc<HeadlessListView>,
    grid_viewport: Rc<HeadlessViewport>,
}

impl CatalogSession {
    pub fn new(settings: &Settings) -> Result<Self> {
        let hub = Rc::new(CatalogHub::new());
        let event_loop = EventLoop::new();
        let pool = Arc::new(WorkerPool::new(settings.workers).context("Failed to start workers")?);

        let browse =
            ListCoordinator::new(Rc::clone(&hub), event_loop.clone(), settings.navigation);
        let project =
            GroupedCoordinator::new(Rc::clone(&hub), event_loop.clone(), settings.navigation);

        let preview = PreviewLoader::new(
            Arc::clone(&pool),
            Rc::clone(&hub),
            settings.preview_edge,
            &event_loop,
        );
        browse.set_content_loader(preview.clone());
        project.set_content_loader(preview.clone());

        let list_view = Rc::new(HeadlessListView::new("browse-list"));
        let list_binding = ViewBinding::direct(
            "browse-list",
            CatalogMode::Browse,
            list_view.clone(),
            Rc::clone(&hub),
            event_loop.clone(),
        );
        list_view.forward_to(&list_binding);
        browse.attach_view(list_binding);

        let project_view = Rc::new(HeadlessListView::new("project-list"));
        let project_binding = ViewBinding::grouped(
            "project-list",
            project_view.clone(),
            Rc::clone(&hub),
            event_loop.clone(),
        );
        project_view.forward_to(&project_binding);
        project.attach_view(project_binding);

        let router = ModeRouter::new(Rc::clone(&hub), Rc::clone(&browse), Rc::clone(&project));

        let grid_model = Rc::new(HeadlessListView::new("grid"));
        let grid_viewport = Rc::new(HeadlessViewport::new(
            GRID_VIEWPORT.0,
            GRID_VIEWPORT.1,
            settings.window.thumb_width,
            settings.window.thumb_height,
        ));
        let store: Arc<dyn ThumbnailStore> =
            Arc::new(MemoryThumbnailStore::new("grid", settings.thumb_cache_mb));
        let grid = GridWindow::new(
            "grid",
            Rc::clone(&hub),
            event_loop.clone(),
            settings.window,
            grid_model.clone(),
            grid_viewport.clone(),
            Arc::clone(&pool),
            store,
        );
        Self::wire_grid(&grid, &grid_model, &grid_viewport, &router);
        browse.attach_sink(grid.clone());
        project.attach_sink(grid.clone());

        let scanner = CatalogScanner::new(Rc::clone(&hub), ScanConfig::default(), &event_loop);

        Ok(Self {
            hub,
            event_loop,
            pool,
            router,
            scanner,
            preview,
            list_view,
            project_view,
            grid,
            grid_model,
            grid_viewport,
        })
    }

    fn wire_grid(
        grid: &Rc<GridWindow>,
        model: &HeadlessListView,
        viewport: &HeadlessViewport,
        router: &Rc<ModeRouter>,
    ) {
        let weak = Rc::downgrade(grid);
        viewport.connect_scrolled(move |_| {
            if let Some(grid) = weak.upgrade() {
                grid.on_scroll();
            }
        });
        let weak = Rc::downgrade(grid);
        viewport.connect_resized(move || {
            if let Some(grid) = weak.upgrade() {
                grid.on_viewport_resized();
            }
        });
        let weak = Rc::downgrade(grid);
        model.connect_selection_changed(move |local| {
            if let Some(grid) = weak.upgrade() {
                grid.on_local_selection_changed(local);
            }
        });
        let weak = Rc::downgrade(router);
        grid.set_forward(Rc::new(move |mode, index| {
            if let Some(router) = weak.upgrade() {
                router.select_in_mode(mode, index);
            }
        }));
    }

    pub fn hub(&self) -> &Rc<CatalogHub> {
        &self.hub
    }

    pub fn event_loop(&self) -> &EventLoop {
        &self.event_loop
    }

    pub fn router(&self) -> &Rc<ModeRouter> {
        &self.router
    }

    pub fn preview(&self) -> &Rc<PreviewLoader> {
        &self.preview
    }

    pub fn list_view(&self) -> &Rc<HeadlessListView> {
        &self.list_view
    }

    pub fn project_view(&self) -> &Rc<HeadlessListView> {
        &self.project_view
    }

    pub fn grid(&self) -> &Rc<GridWindow> {
        &self.grid
    }

    /// The grid's own list model, holding only the resident window.
    pub fn grid_model(&self) -> &Rc<HeadlessListView> {
        &self.grid_model
    }

    pub fn grid_viewport(&self) -> &Rc<HeadlessViewport> {
        &self.grid_viewport
    }

    /// Scans `root` into the browse catalog and waits for it to be installed.
    pub fn load_directory(&self, root: &Path) -> Result<usize> {
        let generation = self
            .scanner
            .spawn_scan(root.to_path_buf(), CatalogMode::Browse)?;
        debug!(generation, root = %root.display(), "Loading directory");

        if !self
            .event_loop
            .run_until(SETTLE_TIMEOUT, || !self.scanner.is_scanning())
        {
            bail!("Timed out scanning {}", root.display());
        }
        self.settle();

        let len = self.hub.context(CatalogMode::Browse).borrow().len();
        if len == 0 {
            warn!(root = %root.display(), "No images found");
        }
        Ok(len)
    }

    pub fn apply(&self, command: Command) {
        debug!(?command, "Applying command");
        match command {
            Command::Step(step) => self.router.step(step),
            Command::Select(index) => self.router.select_by_index(Some(index)),
            Command::Clear => self.router.select_by_index(None),
            Command::GridOn => self.grid.set_enabled(true),
            Command::GridOff => self.grid.set_enabled(false),
        }
        self.settle();
    }

    /// Pumps the loop until deferred work and in-flight decodes are done.
    pub fn settle(&self) {
        self.event_loop.run_until_idle();
        let drained = self.event_loop.run_until(SETTLE_TIMEOUT, || {
            !self.pool.is_busy() && !self.event_loop.has_pending()
        });
        if !drained {
            warn!("Workers still busy after {:?}", SETTLE_TIMEOUT);
        }
        // Results sent by the last jobs are dispatched on this turn.
        self.event_loop.run_until_idle();
    }

    pub fn summary(&self) -> SessionSummary {
        let mode = self.hub.active_mode();
        let active = self.router.active();
        let coordinator = active.as_dyn();
        let index = coordinator.official_index();
        let key = self.hub.active().borrow().selected_key().map(str::to_string);

        SessionSummary {
            mode,
            len: coordinator.len(),
            index,
            key,
            preview: self.preview.current_key(),
            window: self.grid.window(),
        }
    }
}

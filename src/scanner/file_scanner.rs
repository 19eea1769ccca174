//! Directory scanner that fills a catalog.
//!
//! This module provides:
//! - `scan_catalog`, a blocking walk of a directory into a `CatalogContext`
//! - `CatalogScanner`, which runs scans on a background thread and installs
//!   the newest result into the hub from the UI thread

use std::cell::{Cell, RefCell};
use std::path::{Path, PathBuf};
use std::rc::{Rc, Weak};
use std::thread;

use anyhow::{bail, Context, Result};
use flume::{Receiver, Sender};
use tracing::{debug, info, trace, warn};
use walkdir::WalkDir;

use crate::models::{CatalogContext, CatalogHub, CatalogMode, ItemKey, MediaType};
use crate::ui::event_loop::{ControlFlow, EventLoop};

/// Configuration for the file scanner.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Whether to scan directories recursively.
    pub recursive: bool,
    /// Maximum directory depth (0 = unlimited).
    pub max_depth: usize,
    /// Whether to follow symbolic links.
    pub follow_symlinks: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            recursive: true,
            max_depth: 0, // unlimited
            follow_symlinks: false,
        }
    }
}

/// Walks `root` and builds the catalog for `mode`.
///
/// Only still images are kept. Items are ordered by path and keyed by their
/// path relative to `root`, with `/` separators.
pub fn scan_catalog(root: &Path, mode: CatalogMode, config: &ScanConfig) -> Result<CatalogContext> {
    if !root.is_dir() {
        bail!("Not a directory: {}", root.display());
    }
    info!(root = %root.display(), %mode, "Scanning");

    let entries = discover_images(root, config);
    debug!(count = entries.len(), "Discovered images");

    CatalogContext::from_entries(mode, entries)
        .with_context(|| format!("Failed to build catalog for {}", root.display()))
}

fn discover_images(root: &Path, config: &ScanConfig) -> Vec<(ItemKey, PathBuf)> {
    let mut walker = WalkDir::new(root).follow_links(config.follow_symlinks);

    if !config.recursive {
        walker = walker.max_depth(1);
    } else if config.max_depth > 0 {
        walker = walker.max_depth(config.max_depth);
    }

    let mut paths = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable entry: {}", e);
                continue;
            }
        };
        if entry.file_type().is_dir() {
            continue;
        }
        let catalogued = MediaType::from_path(entry.path())
            .map(|t| t.is_catalogued())
            .unwrap_or(false);
        if !catalogued {
            trace!(path = %entry.path().display(), "Not an image");
            continue;
        }
        paths.push(entry.into_path());
    }

    // Sort by path for consistent ordering
    paths.sort();

    paths
        .into_iter()
        .filter_map(|path| {
            let key = relative_key(root, &path)?;
            Some((key, path))
        })
        .collect()
}

fn relative_key(root: &Path, path: &Path) -> Option<ItemKey> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    if parts.is_empty() {
        return None;
    }
    Some(parts.join("/"))
}

struct ScanOutcome {
    generation: u64,
    root: PathBuf,
    catalog: Result<CatalogContext>,
}

type FinishedListener = Rc<dyn Fn(&Path, Result<usize, String>)>;

/// Background scanner that replaces a hub catalog when a scan completes.
///
/// Starting a scan supersedes any scan still running; a superseded result is
/// dropped when it arrives.
pub struct CatalogScanner {
    hub: Rc<CatalogHub>,
    config: ScanConfig,
    generation: Cell<u64>,
    in_flight: Cell<bool>,
    result_tx: Sender<ScanOutcome>,
    result_rx: Receiver<ScanOutcome>,
    listener: RefCell<Option<FinishedListener>>,
}

impl CatalogScanner {
    /// Creates the scanner and registers its result source on `event_loop`.
    pub fn new(hub: Rc<CatalogHub>, config: ScanConfig, event_loop: &EventLoop) -> Rc<Self> {
        let (result_tx, result_rx) = flume::unbounded();
        let scanner = Rc::new(Self {
            hub,
            config,
            generation: Cell::new(0),
            in_flight: Cell::new(false),
            result_tx,
            result_rx,
            listener: RefCell::new(None),
        });

        let weak: Weak<Self> = Rc::downgrade(&scanner);
        event_loop.add_source(move || match weak.upgrade() {
            Some(scanner) => {
                scanner.dispatch();
                ControlFlow::Continue
            }
            None => ControlFlow::Break,
        });
        scanner
    }

    /// Called once per applied scan with the item count or the failure.
    pub fn connect_finished<F>(&self, listener: F)
    where
        F: Fn(&Path, Result<usize, String>) + 'static,
    {
        *self.listener.borrow_mut() = Some(Rc::new(listener));
    }

    /// Whether the newest scan has not been applied yet.
    pub fn is_scanning(&self) -> bool {
        self.in_flight.get()
    }

    pub fn generation(&self) -> u64 {
        self.generation.get()
    }

    /// Scans `root` into the `mode` catalog on a background thread.
    ///
    /// Returns the scan's generation.
    pub fn spawn_scan(&self, root: PathBuf, mode: CatalogMode) -> Result<u64> {
        let generation = self.generation.get() + 1;
        self.generation.set(generation);
        self.in_flight.set(true);

        let config = self.config.clone();
        let tx = self.result_tx.clone();
        let spawned = thread::Builder::new()
            .name("catalog-scan".to_string())
            .spawn(move || {
                let catalog = scan_catalog(&root, mode, &config);
                let _ = tx.send(ScanOutcome {
                    generation,
                    root,
                    catalog,
                });
            })
            .context("Failed to spawn scan thread");

        if let Err(e) = spawned {
            self.in_flight.set(false);
            return Err(e);
        }
        debug!(generation, %mode, "Scan started");
        Ok(generation)
    }

    /// Applies finished scans. Returns how many were applied.
    pub fn dispatch(&self) -> usize {
        let mut applied = 0;
        for outcome in self.result_rx.try_iter() {
            if outcome.generation != self.generation.get() {
                debug!(
                    generation = outcome.generation,
                    current = self.generation.get(),
                    "Dropping superseded scan"
                );
                continue;
            }
            self.in_flight.set(false);
            applied += 1;

            let summary = match outcome.catalog {
                Ok(catalog) => {
                    let count = catalog.len();
                    info!(root = %outcome.root.display(), count, "Scan complete");
                    self.hub.replace(catalog);
                    Ok(count)
                }
                Err(e) => {
                    warn!(root = %outcome.root.display(), "Scan failed: {:#}", e);
                    Err(format!("{:#}", e))
                }
            };

            let listener = self.listener.borrow().clone();
            if let Some(listener) = listener {
                listener(&outcome.root, summary);
            }
        }
        applied
    }
}

//! Runtime settings, read from `CATSYNC_*` environment variables.
//!
//! Unset or unparsable values fall back to the defaults below.

use tracing::warn;

const DEFAULT_PAGE_BLOCK: usize = 10;
const DEFAULT_PRELOAD_ROWS: usize = 3;
const DEFAULT_WORKERS: usize = 2;
const MAX_WORKERS: usize = 4;
const DEFAULT_THUMB_MB: usize = 64;
const MIN_THUMB_MB: usize = 16;
const MAX_THUMB_MB: usize = 512;
const DEFAULT_THUMB_SIZE: u32 = 160;
const DEFAULT_PREVIEW_EDGE: u32 = 1600;

/// How navigation steps move the official index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NavigationConfig {
    /// Next/previous wrap around the catalog ends instead of clamping.
    pub circular: bool,
    /// Step size of page-forward / page-backward.
    pub page_block: usize,
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            circular: false,
            page_block: DEFAULT_PAGE_BLOCK,
        }
    }
}

/// Sizing of a windowed thumbnail view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowConfig {
    /// Rows kept resident on each side of the first on-screen row.
    pub preload_rows: usize,
    /// Requested thumbnail box in pixels.
    pub thumb_width: u32,
    pub thumb_height: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            preload_rows: DEFAULT_PRELOAD_ROWS,
            thumb_width: DEFAULT_THUMB_SIZE,
            thumb_height: DEFAULT_THUMB_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub navigation: NavigationConfig,
    pub window: WindowConfig,
    /// Size of the decode worker pool.
    pub workers: usize,
    /// Memory budget of each thumbnail store.
    pub thumb_cache_mb: usize,
    /// Longest edge of the decoded primary preview.
    pub preview_edge: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            navigation: NavigationConfig::default(),
            window: WindowConfig::default(),
            workers: DEFAULT_WORKERS,
            thumb_cache_mb: DEFAULT_THUMB_MB,
            preview_edge: DEFAULT_PREVIEW_EDGE,
        }
    }
}

impl Settings {
    /// Reads settings from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds settings from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let thumb_size = parse_var(&lookup, "CATSYNC_THUMB_SIZE", DEFAULT_THUMB_SIZE).max(1);

        Self {
            navigation: NavigationConfig {
                circular: lookup("CATSYNC_CIRCULAR_NAV")
                    .map(|v| parse_bool(&v))
                    .unwrap_or(defaults.navigation.circular),
                page_block: parse_var(&lookup, "CATSYNC_PAGE_BLOCK", DEFAULT_PAGE_BLOCK).max(1),
            },
            window: WindowConfig {
                preload_rows: parse_var(&lookup, "CATSYNC_PRELOAD_ROWS", DEFAULT_PRELOAD_ROWS),
                thumb_width: thumb_size,
                thumb_height: thumb_size,
            },
            workers: parse_var(&lookup, "CATSYNC_WORKERS", DEFAULT_WORKERS).clamp(1, MAX_WORKERS),
            thumb_cache_mb: parse_var(&lookup, "CATSYNC_THUMB_MB", DEFAULT_THUMB_MB)
                .clamp(MIN_THUMB_MB, MAX_THUMB_MB),
            preview_edge: parse_var(&lookup, "CATSYNC_PREVIEW_EDGE", DEFAULT_PREVIEW_EDGE).max(1),
        }
    }
}

fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn parse_var<F, T>(lookup: &F, name: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr + Copy,
{
    match lookup(name) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!(name, value = %raw, "Ignoring invalid setting");
            default
        }),
        None => default,
    }
}

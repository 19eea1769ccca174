//! Ordered item catalogs, one per logical mode.
//!
//! A `CatalogContext` is the ordered sequence of item keys for a mode plus the
//! key -> absolute path lookup and the currently selected key. Contexts are
//! replaced wholesale on reload; every instance carries a process-unique
//! generation so derived state can tell when it was built from a stale one.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use thiserror::Error;

/// Unique, order-significant identifier of a catalog item.
pub type ItemKey = String;

static NEXT_GENERATION: AtomicU64 = AtomicU64::new(1);

fn next_generation() -> u64 {
    NEXT_GENERATION.fetch_add(1, Ordering::Relaxed)
}

/// The logical catalog a view or coordinator operates on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CatalogMode {
    Browse,
    ProjectSelection,
    ProjectDiscards,
}

impl CatalogMode {
    /// Project groups in display order.
    pub const PROJECT_GROUPS: [CatalogMode; 2] =
        [CatalogMode::ProjectSelection, CatalogMode::ProjectDiscards];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Browse => "browse",
            Self::ProjectSelection => "project-selection",
            Self::ProjectDiscards => "project-discards",
        }
    }

    pub fn is_project(&self) -> bool {
        !matches!(self, Self::Browse)
    }
}

impl fmt::Display for CatalogMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("duplicate catalog key: {0}")]
    DuplicateKey(ItemKey),
    #[error("catalog keys must not be empty")]
    EmptyKey,
}

#[derive(Debug, Clone)]
pub struct CatalogContext {
    mode: CatalogMode,
    items: Vec<ItemKey>,
    positions: HashMap<ItemKey, usize>,
    paths: HashMap<ItemKey, PathBuf>,
    selected_key: Option<ItemKey>,
    generation: u64,
}

impl CatalogContext {
    /// Creates an empty catalog for `mode`.
    pub fn new(mode: CatalogMode) -> Self {
        Self {
            mode,
            items: Vec::new(),
            positions: HashMap::new(),
            paths: HashMap::new(),
            selected_key: None,
            generation: next_generation(),
        }
    }

    /// Builds a catalog from ordered `(key, path)` pairs.
    pub fn from_entries<I>(mode: CatalogMode, entries: I) -> Result<Self, CatalogError>
    where
        I: IntoIterator<Item = (ItemKey, PathBuf)>,
    {
        let mut catalog = Self::new(mode);
        for (key, path) in entries {
            if key.is_empty() {
                return Err(CatalogError::EmptyKey);
            }
            if catalog.positions.contains_key(&key) {
                return Err(CatalogError::DuplicateKey(key));
            }
            catalog.positions.insert(key.clone(), catalog.items.len());
            catalog.paths.insert(key.clone(), path);
            catalog.items.push(key);
        }
        Ok(catalog)
    }

    pub fn mode(&self) -> CatalogMode {
        self.mode
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn keys(&self) -> &[ItemKey] {
        &self.items
    }

    pub fn key_at(&self, index: usize) -> Option<&str> {
        self.items.get(index).map(String::as_str)
    }

    pub fn index_of(&self, key: &str) -> Option<usize> {
        self.positions.get(key).copied()
    }

    pub fn path_for(&self, key: &str) -> Option<&Path> {
        self.paths.get(key).map(PathBuf::as_path)
    }

    pub fn path_at(&self, index: usize) -> Option<&Path> {
        self.key_at(index).and_then(|key| self.path_for(key))
    }

    /// Keys in the inclusive range `[first, last]`, truncated to the catalog.
    pub fn slice(&self, first: usize, last: usize) -> &[ItemKey] {
        if first >= self.items.len() || first > last {
            return &[];
        }
        let end = last.saturating_add(1).min(self.items.len());
        &self.items[first..end]
    }

    pub fn selected_key(&self) -> Option<&str> {
        self.selected_key.as_deref()
    }

    pub fn set_selected_key(&mut self, key: Option<ItemKey>) {
        self.selected_key = key;
    }

    /// Position of the selected key, if it is still part of this catalog.
    pub fn selected_index(&self) -> Option<usize> {
        self.selected_key().and_then(|key| self.index_of(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries(keys: &[&str]) -> Vec<(ItemKey, PathBuf)> {
        keys.iter()
            .map(|k| (k.to_string(), PathBuf::from(format!("/photos/{}.jpg", k))))
            .collect()
    }

    #[test]
    fn test_lookup_by_index_and_key() {
        let catalog =
            CatalogContext::from_entries(CatalogMode::Browse, entries(&["a", "b", "c"])).unwrap();

        assert_eq!(catalog.len(), 3);
        assert_eq!(catalog.key_at(1), Some("b"));
        assert_eq!(catalog.key_at(3), None);
        assert_eq!(catalog.index_of("c"), Some(2));
        assert_eq!(catalog.path_at(0), Some(Path::new("/photos/a.jpg")));
        assert_eq!(catalog.path_for("zz"), None);
    }

    #[test]
    fn test_duplicate_and_empty_keys_rejected() {
        let err = CatalogContext::from_entries(CatalogMode::Browse, entries(&["a", "b", "a"]))
            .unwrap_err();
        assert_eq!(err, CatalogError::DuplicateKey("a".to_string()));

        let err = CatalogContext::from_entries(CatalogMode::Browse, entries(&[""])).unwrap_err();
        assert_eq!(err, CatalogError::EmptyKey);
    }

    #[test]
    fn test_slice_is_inclusive_and_truncated() {
        let catalog =
            CatalogContext::from_entries(CatalogMode::Browse, entries(&["a", "b", "c", "d"]))
                .unwrap();

        assert_eq!(catalog.slice(1, 2), &["b".to_string(), "c".to_string()]);
        assert_eq!(catalog.slice(2, 99).len(), 2);
        assert!(catalog.slice(4, 5).is_empty());
        assert!(catalog.slice(3, 1).is_empty());
    }

    #[test]
    fn test_generation_is_unique_per_instance() {
        let a = CatalogContext::new(CatalogMode::Browse);
        let b = CatalogContext::new(CatalogMode::Browse);
        assert_ne!(a.generation(), b.generation());
    }

    #[test]
    fn test_selected_index_follows_key() {
        let mut catalog =
            CatalogContext::from_entries(CatalogMode::Browse, entries(&["a", "b"])).unwrap();
        assert_eq!(catalog.selected_index(), None);

        catalog.set_selected_key(Some("b".to_string()));
        assert_eq!(catalog.selected_index(), Some(1));

        catalog.set_selected_key(Some("gone".to_string()));
        assert_eq!(catalog.selected_index(), None);
    }
}

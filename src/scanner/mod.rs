//! Catalog population from the filesystem.

pub mod file_scanner;

pub use file_scanner::{scan_catalog, CatalogScanner, ScanConfig};

//! Thumbnail pipeline for windowed views.
//!
//! This module provides:
//! - `ThumbnailGenerator` - Decodes and scales source images
//! - `MemoryThumbnailStore` - Memory store with LRU eviction behind the `ThumbnailStore` trait
//! - `WorkerPool` - Fixed-size pool running decode jobs off the UI thread
//! - `PrefetchScheduler` - Single-flight, cancellable prefetch jobs per view

pub mod cache;
pub mod generator;
pub mod pool;
pub mod prefetch;

pub use cache::{MemoryThumbnailStore, ThumbnailStore};
pub use generator::{Thumbnail, ThumbnailPurpose};
pub use pool::WorkerPool;
pub use prefetch::{CancelToken, PrefetchRequest, PrefetchScheduler};

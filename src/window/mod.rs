//! Windowed views: a grid that keeps only a slice of the catalog resident.

pub mod geometry;
pub mod grid;

pub use geometry::{ThumbnailWindow, Viewport, ViewportGeometry};
pub use grid::GridWindow;

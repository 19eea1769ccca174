//! Selection synchronization for catalog views.
//!
//! One official selection per catalog, applied to every view bound to it.
//! Thumbnails and previews are decoded off the UI thread.

pub mod app;
pub mod config;
pub mod image_loader;
pub mod models;
pub mod scanner;
pub mod selection;
pub mod thumbnails;
pub mod ui;
pub mod window;

#[cfg(test)]
mod test_support;

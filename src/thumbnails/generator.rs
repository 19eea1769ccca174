//! Thumbnail generation using the image crate.
//!
//! Thumbnails fit inside the requested box while preserving aspect ratio and
//! are never upscaled. Pixels are kept as RGBA8 in memory.

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use image::imageops::FilterType;
use image::GenericImageView;
use tracing::debug;

use crate::image_loader::open_image;

/// Bytes per RGBA pixel.
pub const BYTES_PER_PIXEL: usize = 4;

/// What a thumbnail is requested for. Selects the resampling filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThumbnailPurpose {
    /// Small cells of a windowed grid or strip.
    Grid,
    /// Larger previews where quality matters more than speed.
    Preview,
}

impl ThumbnailPurpose {
    fn filter(self) -> FilterType {
        match self {
            Self::Grid => FilterType::Triangle,
            // CatmullRom gives a good quality/speed balance for downscaling
            Self::Preview => FilterType::CatmullRom,
        }
    }
}

/// A decoded, scaled image. An empty pixel buffer is the placeholder for
/// files that could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Thumbnail {
    pub width: u32,
    pub height: u32,
    pub pixels: Arc<[u8]>,
}

impl Thumbnail {
    pub fn placeholder() -> Self {
        Self {
            width: 0,
            height: 0,
            pixels: Arc::from(Vec::new()),
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.pixels.is_empty()
    }

    /// Estimated memory usage in bytes.
    pub fn memory_bytes(&self) -> usize {
        self.pixels.len()
    }
}

pub struct ThumbnailGenerator;

impl ThumbnailGenerator {
    /// Decodes `src` and scales it to fit inside `max_width` x `max_height`.
    pub fn generate(
        src: &Path,
        max_width: u32,
        max_height: u32,
        purpose: ThumbnailPurpose,
    ) -> Result<Thumbnail> {
        let img = open_image(src)?;
        let (src_width, src_height) = img.dimensions();
        let (width, height) = Self::fit_dimensions(src_width, src_height, max_width, max_height);

        debug!(
            ?src,
            src_width, src_height, width, height, ?purpose, "Generating thumbnail"
        );

        let scaled = if (width, height) == (src_width, src_height) {
            img
        } else {
            img.resize_exact(width, height, purpose.filter())
        };
        let rgba = scaled.to_rgba8();

        Ok(Thumbnail {
            width,
            height,
            pixels: Arc::from(rgba.into_raw()),
        })
    }

    /// Largest size with the source aspect ratio that fits the box, without upscaling.
    pub fn fit_dimensions(
        src_width: u32,
        src_height: u32,
        max_width: u32,
        max_height: u32,
    ) -> (u32, u32) {
        let max_width = max_width.max(1);
        let max_height = max_height.max(1);
        if src_width == 0 || src_height == 0 {
            return (max_width, max_height);
        }
        if src_width <= max_width && src_height <= max_height {
            return (src_width, src_height);
        }

        let scale = f64::min(
            max_width as f64 / src_width as f64,
            max_height as f64 / src_height as f64,
        );
        let width = (src_width as f64 * scale).round() as u32;
        let height = (src_height as f64 * scale).round() as u32;
        (width.clamp(1, max_width), height.clamp(1, max_height))
    }
}

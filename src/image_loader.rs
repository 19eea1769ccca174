use std::io::Cursor;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use image::codecs::gif::GifDecoder;
use image::AnimationDecoder;
use image::{DynamicImage, ImageFormat, ImageReader};

/// Decodes the image at `path`, sniffing the format from its content.
///
/// Animated GIFs decode to their first frame.
pub fn open_image(path: &Path) -> Result<DynamicImage> {
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read image: {:?}", path))?;
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .context("Failed to guess image format")?;

    if reader.format() == Some(ImageFormat::Gif) {
        return first_gif_frame(reader.into_inner().into_inner(), path);
    }

    reader
        .decode()
        .with_context(|| format!("Failed to decode image: {:?}", path))
}

fn first_gif_frame(bytes: Vec<u8>, path: &Path) -> Result<DynamicImage> {
    let decoder = GifDecoder::new(Cursor::new(bytes))
        .with_context(|| format!("Failed to decode GIF: {:?}", path))?;
    let frame = decoder
        .into_frames()
        .next()
        .ok_or_else(|| anyhow!("GIF has no frames: {:?}", path))?
        .context("Failed to decode GIF frame")?;
    Ok(DynamicImage::ImageRgba8(frame.into_buffer()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::GenericImageView;

    #[test]
    fn test_open_png_regardless_of_extension() {
        let dir = tempfile::tempdir().unwrap();
        let png = dir.path().join("photo.png");
        image::RgbImage::from_pixel(7, 3, image::Rgb([1, 2, 3]))
            .save(&png)
            .unwrap();
        let misnamed = dir.path().join("photo.jpg");
        std::fs::copy(&png, &misnamed).unwrap();

        let img = open_image(&misnamed).unwrap();
        assert_eq!(img.dimensions(), (7, 3));
    }

    #[test]
    fn test_open_corrupt_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.jpg");
        std::fs::write(&path, b"not an image").unwrap();
        assert!(open_image(&path).is_err());
    }
}

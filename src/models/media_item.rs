use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaType {
    Image,
    Video,
}

impl MediaType {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "jpg" | "jpeg" | "png" | "webp" | "gif" | "bmp" | "tiff" | "tif" => Some(Self::Image),
            "webm" | "mp4" | "mkv" | "avi" | "mov" => Some(Self::Video),
            _ => None,
        }
    }

    /// Classify a path by its extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    /// Only still images get a catalog entry; the thumbnail pipeline can't decode video.
    pub fn is_catalogued(&self) -> bool {
        matches!(self, Self::Image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_extension_case_insensitive() {
        assert_eq!(MediaType::from_extension("JPG"), Some(MediaType::Image));
        assert_eq!(MediaType::from_extension("mov"), Some(MediaType::Video));
        assert_eq!(MediaType::from_extension("txt"), None);
    }

    #[test]
    fn test_from_path() {
        assert_eq!(
            MediaType::from_path(Path::new("/a/b/photo.Png")),
            Some(MediaType::Image)
        );
        assert_eq!(MediaType::from_path(Path::new("/a/b/noext")), None);
        assert!(!MediaType::Video.is_catalogued());
    }
}

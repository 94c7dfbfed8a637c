use image::{DynamicImage, GenericImageView};
use log::{debug, warn};
use std::path::{Path, PathBuf};

use crate::error::{ReaderError, Result};
use crate::pagination::ImageSize;
use crate::position::ImageIdentity;

/// A decoded raster. Immutable once loaded.
pub struct SourceImage {
    image: DynamicImage,
}

impl SourceImage {
    pub fn new(image: DynamicImage) -> Self {
        Self { image }
    }

    pub fn size(&self) -> ImageSize {
        let (width, height) = self.image.dimensions();
        ImageSize::new(width, height)
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn as_image(&self) -> &DynamicImage {
        &self.image
    }
}

impl From<DynamicImage> for SourceImage {
    fn from(image: DynamicImage) -> Self {
        Self::new(image)
    }
}

impl std::fmt::Debug for SourceImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceImage")
            .field("width", &self.width())
            .field("height", &self.height())
            .finish()
    }
}

/// Turns a platform resource into a decoded image and a stable identity
pub trait ImageDecoder {
    type Resource: ?Sized;

    fn decode(&self, resource: &Self::Resource) -> Result<SourceImage>;

    fn identity(&self, resource: &Self::Resource) -> ImageIdentity;
}

/// Decodes image files from the local filesystem
#[derive(Debug, Default, Clone, Copy)]
pub struct FileDecoder;

impl ImageDecoder for FileDecoder {
    type Resource = Path;

    fn decode(&self, resource: &Path) -> Result<SourceImage> {
        match image::open(resource) {
            Ok(img) => {
                debug!(
                    "Decoded {:?}: {}x{}",
                    resource,
                    img.width(),
                    img.height()
                );
                Ok(SourceImage::new(img))
            }
            Err(e) => {
                warn!("Failed to decode image {resource:?}: {e}");
                Err(ReaderError::Decode {
                    resource: resource.display().to_string(),
                    source: e,
                })
            }
        }
    }

    fn identity(&self, resource: &Path) -> ImageIdentity {
        ImageIdentity::from_path(resource)
    }
}

/// Path that a stored identity points back to, for reopening the last image
pub fn identity_path(identity: &ImageIdentity) -> PathBuf {
    PathBuf::from(identity.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgba};
    use tempfile::TempDir;

    #[test]
    fn test_decode_missing_file() {
        let err = FileDecoder
            .decode(Path::new("does/not/exist.png"))
            .unwrap_err();
        assert!(matches!(err, ReaderError::Decode { .. }));
        assert!(err.is_user_facing());
    }

    #[test]
    fn test_decode_corrupt_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("broken.png");
        std::fs::write(&path, b"definitely not a png").unwrap();
        assert!(FileDecoder.decode(&path).is_err());
    }

    #[test]
    fn test_decode_png_and_identity() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("strip.png");
        let img: ImageBuffer<Rgba<u8>, Vec<u8>> = ImageBuffer::new(4, 30);
        img.save(&path).unwrap();

        let source = FileDecoder.decode(&path).unwrap();
        assert_eq!(source.size(), ImageSize::new(4, 30));

        let identity = FileDecoder.identity(&path);
        assert_eq!(identity_path(&identity), path.canonicalize().unwrap());
    }
}

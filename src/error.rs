use thiserror::Error;

/// Errors surfaced by a reader session
#[derive(Debug, Error)]
pub enum ReaderError {
    #[error("Failed to load image {resource}: {source}")]
    Decode {
        resource: String,
        #[source]
        source: image::ImageError,
    },

    #[error("Page must be between 1 and {total}, got {input:?}")]
    InvalidPageNumber { input: String, total: usize },

    #[error("No image loaded")]
    NoImage,

    #[error("Page {index} ({start_y}+{height}) runs past image height {image_height}")]
    CropOutOfBounds {
        index: usize,
        start_y: u32,
        height: u32,
        image_height: u32,
    },

    #[error("Preference store: {0:#}")]
    Store(anyhow::Error),

    #[error("Display: {0:#}")]
    Surface(anyhow::Error),
}

impl ReaderError {
    pub fn invalid_page(input: impl Into<String>, total: usize) -> Self {
        Self::InvalidPageNumber {
            input: input.into(),
            total,
        }
    }

    /// Validation and decode failures are reported to the user and leave the
    /// session as it was.
    pub fn is_user_facing(&self) -> bool {
        matches!(self, Self::Decode { .. } | Self::InvalidPageNumber { .. })
    }
}

pub type Result<T> = std::result::Result<T, ReaderError>;

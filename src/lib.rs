// Export modules for use in tests
pub mod decoder;
pub mod display;
pub mod error;
pub mod pagination;
pub mod panic_handler;
pub mod paths;
pub mod position;
pub mod session;
pub mod settings;
pub mod store;

pub use decoder::{FileDecoder, ImageDecoder, SourceImage};
pub use display::{ColorTransform, DisplaySurface, ImageAdjustments, PageView, PngSurface};
pub use error::ReaderError;
pub use pagination::{
    ImageSize, PageList, PageRect, PaginationConfig, ViewportSpec, compute_pages,
};
pub use position::ImageIdentity;
pub use session::{LoadSummary, PageTurn, ReaderSession};
pub use store::{KeyValueStore, Preferences};

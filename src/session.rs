//! Reader session: owns the loaded image, its page list and the reading
//! position, and keeps the position persisted as it changes.

use image::DynamicImage;
use log::{debug, error, info, warn};
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Arc;

use crate::decoder::{ImageDecoder, SourceImage};
use crate::display::{ColorTransform, DisplaySurface, PageView};
use crate::error::{ReaderError, Result};
use crate::pagination::{
    PageList, PageRect, PaginationConfig, ViewportSpec, compute_pages, page_containing_row,
};
use crate::position::{self, ImageIdentity};
use crate::store::KeyValueStore;

/// Cropped pages kept around: the current one and its neighbours
pub const DEFAULT_CROP_CACHE_PAGES: usize = 3;

/// Result of a relative page turn
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PageTurn {
    Moved(usize),
    AtFirst,
    AtLast,
    /// Nothing is loaded or the image produced no pages
    Empty,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LoadSummary {
    pub total_pages: usize,
    pub current_index: usize,
    /// True when the index came from a saved position
    pub restored: bool,
}

struct LoadedImage {
    source: SourceImage,
    identity: ImageIdentity,
    pages: PageList,
}

pub struct ReaderSession<S: KeyValueStore> {
    store: S,
    viewport: ViewportSpec,
    config: PaginationConfig,
    loaded: Option<LoadedImage>,
    current_index: usize,
    crops: LruCache<usize, Arc<DynamicImage>>,
}

impl<S: KeyValueStore> ReaderSession<S> {
    pub fn new(store: S, viewport: ViewportSpec) -> Self {
        Self::with_cache_capacity(store, viewport, DEFAULT_CROP_CACHE_PAGES)
    }

    pub fn with_cache_capacity(store: S, viewport: ViewportSpec, crop_cache_pages: usize) -> Self {
        let config = PaginationConfig::new(position::saved_overlap(&store));
        let capacity = NonZeroUsize::new(crop_cache_pages).unwrap_or(NonZeroUsize::MIN);
        Self {
            store,
            viewport,
            config,
            loaded: None,
            current_index: 0,
            crops: LruCache::new(capacity),
        }
    }

    /// Decode `resource` and load it. A decode failure leaves the session
    /// exactly as it was.
    pub fn open<D: ImageDecoder>(
        &mut self,
        decoder: &D,
        resource: &D::Resource,
    ) -> Result<LoadSummary> {
        let source = decoder.decode(resource)?;
        let identity = decoder.identity(resource);
        Ok(self.load(source, identity))
    }

    /// Replace the current image, paginate it and restore its saved page.
    pub fn load(&mut self, source: SourceImage, identity: ImageIdentity) -> LoadSummary {
        self.release();

        let pages = paginate(&source, &self.viewport, self.config);
        let total_pages = pages.len();
        let saved = position::saved_page(&self.store, &identity);
        let restored = saved > 0 && saved < total_pages;
        self.current_index = if saved < total_pages { saved } else { 0 };

        info!(
            "Loaded {} ({}x{}): {} pages, starting at page {}",
            identity,
            source.width(),
            source.height(),
            total_pages,
            self.current_index + 1
        );

        if let Err(e) = position::save_last_opened(&mut self.store, &identity) {
            error!("Failed to remember last opened image: {e:#}");
        }
        self.loaded = Some(LoadedImage {
            source,
            identity,
            pages,
        });
        if total_pages > 0 {
            self.persist_position();
        }

        LoadSummary {
            total_pages,
            current_index: self.current_index,
            restored,
        }
    }

    /// Change the overlap and regenerate pages from the image already in
    /// memory. Page boundaries move, so reading restarts at the first page.
    pub fn set_overlap(&mut self, overlap_percent: u8) -> PaginationConfig {
        self.config = self.config.with_overlap(overlap_percent);
        if let Err(e) = position::save_overlap(&mut self.store, self.config.overlap_percent()) {
            error!("Failed to save page overlap: {e:#}");
        }

        if self.repaginate() {
            self.current_index = 0;
            self.persist_position();
        }
        self.config
    }

    /// Adopt a new viewport, staying on the page that shows the top row of
    /// the page being read.
    pub fn set_viewport(&mut self, viewport: ViewportSpec) {
        if viewport == self.viewport {
            return;
        }
        let anchor_row = self.current_page().map(|page| page.start_y);
        self.viewport = viewport;

        if self.repaginate() {
            let index = anchor_row
                .and_then(|row| page_containing_row(self.pages(), row))
                .unwrap_or(0);
            debug!(
                "Viewport now {}x{}, page {} -> {}",
                viewport.width,
                viewport.height,
                self.current_index + 1,
                index + 1
            );
            self.current_index = index;
            self.persist_position();
        }
    }

    pub fn next_page(&mut self) -> PageTurn {
        let total = self.total_pages();
        if total == 0 {
            return PageTurn::Empty;
        }
        if self.current_index + 1 >= total {
            return PageTurn::AtLast;
        }
        self.move_to(self.current_index + 1);
        PageTurn::Moved(self.current_index)
    }

    pub fn previous_page(&mut self) -> PageTurn {
        if self.total_pages() == 0 {
            return PageTurn::Empty;
        }
        if self.current_index == 0 {
            return PageTurn::AtFirst;
        }
        self.move_to(self.current_index - 1);
        PageTurn::Moved(self.current_index)
    }

    /// Jump to a one-based page number. Returns the new zero-based index.
    pub fn go_to_page(&mut self, page_number: usize) -> Result<usize> {
        let total = self.total_pages();
        if page_number == 0 || page_number > total {
            return Err(ReaderError::invalid_page(page_number.to_string(), total));
        }
        self.move_to(page_number - 1);
        Ok(self.current_index)
    }

    /// Like [`go_to_page`](Self::go_to_page) for text typed by the user
    pub fn go_to_page_input(&mut self, input: &str) -> Result<usize> {
        let trimmed = input.trim();
        match trimmed.parse::<usize>() {
            Ok(page_number) => self.go_to_page(page_number),
            Err(_) => Err(ReaderError::invalid_page(trimmed, self.total_pages())),
        }
    }

    pub fn current_page(&self) -> Option<PageRect> {
        self.pages().get(self.current_index).copied()
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn total_pages(&self) -> usize {
        self.pages().len()
    }

    pub fn pages(&self) -> &[PageRect] {
        self.loaded
            .as_ref()
            .map(|loaded| loaded.pages.as_slice())
            .unwrap_or_default()
    }

    pub fn identity(&self) -> Option<&ImageIdentity> {
        self.loaded.as_ref().map(|loaded| &loaded.identity)
    }

    pub fn config(&self) -> PaginationConfig {
        self.config
    }

    pub fn viewport(&self) -> ViewportSpec {
        self.viewport
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// "Page 3 / 10", or `None` with nothing to show
    pub fn page_indicator(&self) -> Option<String> {
        let total = self.total_pages();
        (total > 0).then(|| format!("Page {} / {}", self.current_index + 1, total))
    }

    /// Crop of page `index`, cut from the source image on first use
    pub fn page_image(&mut self, index: usize) -> Result<Arc<DynamicImage>> {
        let loaded = self.loaded.as_ref().ok_or(ReaderError::NoImage)?;
        let rect = *loaded
            .pages
            .get(index)
            .ok_or_else(|| ReaderError::invalid_page((index + 1).to_string(), loaded.pages.len()))?;

        if let Some(cached) = self.crops.get(&index) {
            return Ok(Arc::clone(cached));
        }

        let crop = Arc::new(crop_page(&loaded.source, index, rect)?);
        self.crops.put(index, Arc::clone(&crop));
        Ok(crop)
    }

    pub fn current_page_image(&mut self) -> Result<Arc<DynamicImage>> {
        if self.loaded.is_none() {
            return Err(ReaderError::NoImage);
        }
        self.page_image(self.current_index)
    }

    /// Render the current page on `surface`
    pub fn present_current<D: DisplaySurface + ?Sized>(
        &mut self,
        surface: &mut D,
        transform: &ColorTransform,
    ) -> Result<()> {
        let image = self.current_page_image()?;
        let rect = self.current_page().ok_or(ReaderError::NoImage)?;
        let view = PageView {
            index: self.current_index,
            total: self.total_pages(),
            rect,
            image: &image,
        };
        surface.present(&view, transform).map_err(ReaderError::Surface)
    }

    /// Write the current position to the store. Positions are already saved
    /// on every change; this is the hook for suspend and shutdown.
    pub fn flush(&mut self) -> Result<()> {
        let Some(loaded) = &self.loaded else {
            return Ok(());
        };
        if loaded.pages.is_empty() {
            return Ok(());
        }
        position::save_page(&mut self.store, &loaded.identity, self.current_index)
            .map_err(ReaderError::Store)
    }

    /// Save the position and drop the image, its pages and crops
    pub fn close(&mut self) {
        if let Err(e) = self.flush() {
            error!("Failed to save reading position on close: {e}");
        }
        self.release();
    }

    fn move_to(&mut self, index: usize) {
        if index != self.current_index {
            self.current_index = index;
            self.persist_position();
        }
    }

    fn persist_position(&mut self) {
        if let Err(e) = self.flush() {
            error!("Failed to save reading position: {e}");
        }
    }

    /// Recompute pages for the loaded image. Returns false with nothing loaded.
    fn repaginate(&mut self) -> bool {
        let Some(loaded) = self.loaded.as_mut() else {
            return false;
        };
        loaded.pages = paginate(&loaded.source, &self.viewport, self.config);
        self.crops.clear();
        true
    }

    fn release(&mut self) {
        self.crops.clear();
        self.loaded = None;
        self.current_index = 0;
    }
}

impl<S: KeyValueStore> Drop for ReaderSession<S> {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            error!("Failed to save reading position on shutdown: {e}");
        }
    }
}

/// Paginate and drop any page that would not crop cleanly from `source`
fn paginate(source: &SourceImage, viewport: &ViewportSpec, config: PaginationConfig) -> PageList {
    let size = source.size();
    let mut pages = compute_pages(size, viewport, config);
    let before = pages.len();
    pages.retain(|page| page.fits_within(size));
    if pages.len() != before {
        warn!(
            "Skipped {} pages outside the {}x{} image",
            before - pages.len(),
            size.width,
            size.height
        );
    }
    pages
}

fn crop_page(source: &SourceImage, index: usize, rect: PageRect) -> Result<DynamicImage> {
    if !rect.fits_within(source.size()) {
        return Err(ReaderError::CropOutOfBounds {
            index,
            start_y: rect.start_y,
            height: rect.height,
            image_height: source.height(),
        });
    }
    Ok(source
        .as_image()
        .crop_imm(0, rect.start_y, source.width(), rect.height))
}

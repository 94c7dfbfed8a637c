//! Vertical pagination of a tall source image
//!
//! The image is always scaled to fill the viewport width, so pages only ever
//! slice the image vertically. All geometry here is in source-image pixels.

use log::debug;

/// Dimensions of a decoded source image in pixels
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

impl ImageSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Display area available to a page
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ViewportSpec {
    pub width: u32,
    pub height: u32,
    /// Height taken by fixed chrome (status bar) and unavailable to the page
    pub reserved_height: u32,
}

impl ViewportSpec {
    pub fn new(width: u32, height: u32, reserved_height: u32) -> Self {
        Self {
            width,
            height,
            reserved_height,
        }
    }

    /// Height left for page content, never less than one pixel
    pub fn available_height(&self) -> u32 {
        self.height.saturating_sub(self.reserved_height).max(1)
    }
}

/// Pagination options. Updates produce a new value instead of mutating in place.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PaginationConfig {
    overlap_percent: u8,
}

impl PaginationConfig {
    pub const MAX_OVERLAP_PERCENT: u8 = 100;

    pub fn new(overlap_percent: u8) -> Self {
        Self {
            overlap_percent: overlap_percent.min(Self::MAX_OVERLAP_PERCENT),
        }
    }

    /// Returns a copy with the overlap replaced, clamped to `0..=100`
    #[must_use]
    pub fn with_overlap(self, overlap_percent: u8) -> Self {
        Self::new(overlap_percent)
    }

    pub fn overlap_percent(&self) -> u8 {
        self.overlap_percent
    }
}

/// One page: a full-width horizontal band of the source image
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PageRect {
    pub start_y: u32,
    pub height: u32,
}

impl PageRect {
    /// Exclusive end row
    pub fn end_y(&self) -> u32 {
        self.start_y + self.height
    }

    pub fn contains_row(&self, y: u32) -> bool {
        y >= self.start_y && y < self.end_y()
    }

    pub fn fits_within(&self, image: ImageSize) -> bool {
        self.height > 0 && self.start_y < image.height && self.end_y() <= image.height
    }
}

pub type PageList = Vec<PageRect>;

/// Intermediate values of a pagination pass, exposed for logging and tests
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PageGeometry {
    pub scale_factor: f64,
    pub available_height: u32,
    /// Full page height in source pixels
    pub page_height: u32,
    /// Rows repeated between consecutive pages, zero when overlap is off
    pub overlap: u32,
    /// Distance between the tops of consecutive pages
    pub advance: u32,
}

impl PageGeometry {
    /// Returns `None` for degenerate image or viewport widths.
    pub fn compute(
        image: ImageSize,
        viewport: &ViewportSpec,
        config: PaginationConfig,
    ) -> Option<Self> {
        if image.width == 0 || image.height == 0 || viewport.width == 0 {
            return None;
        }

        let available_height = viewport.available_height();
        let scale_factor = f64::from(viewport.width) / f64::from(image.width);

        // Dividing by the scale factor is done as `h * image_w / viewport_w` in
        // integers so that exact ratios do not lose a row to float rounding.
        let page_height = to_source(u128::from(available_height), image, viewport).max(1);

        let percent = u128::from(config.overlap_percent());
        let overlap = if percent == 0 {
            0
        } else {
            to_source(u128::from(available_height) * percent, image, viewport) / 100
        };

        let (overlap, advance) = if overlap < page_height {
            (overlap, page_height - overlap)
        } else {
            debug!(
                "Overlap {overlap}px consumes the whole {page_height}px page, paginating without overlap"
            );
            (0, page_height)
        };

        Some(Self {
            scale_factor,
            available_height,
            page_height,
            overlap,
            advance,
        })
    }

    /// Upper bound on the number of pages for an image of `image_height` rows
    pub fn estimated_pages(&self, image_height: u32) -> usize {
        let covered = image_height.saturating_sub(self.overlap);
        (covered.div_ceil(self.advance) as usize).max(1)
    }
}

/// `viewport_px * image.width / viewport.width`, saturating at `u32::MAX`.
/// `u128` holds a full `u32 * 100 * u32` product.
fn to_source(viewport_px: u128, image: ImageSize, viewport: &ViewportSpec) -> u32 {
    let source = viewport_px * u128::from(image.width) / u128::from(viewport.width);
    u32::try_from(source).unwrap_or(u32::MAX)
}

/// Split the image into top-to-bottom pages.
///
/// Degenerate dimensions produce an empty list rather than an error. The
/// returned pages cover `[0, image.height)` without gaps and the last page
/// ends exactly at the bottom row.
pub fn compute_pages(
    image: ImageSize,
    viewport: &ViewportSpec,
    config: PaginationConfig,
) -> PageList {
    let Some(geometry) = PageGeometry::compute(image, viewport, config) else {
        debug!("Degenerate geometry {image:?} in {viewport:?}, no pages");
        return PageList::new();
    };

    let estimate = geometry.estimated_pages(image.height);
    let mut pages = PageList::with_capacity(estimate);

    for index in 0..estimate {
        let Some(start_y) = u32::try_from(index)
            .ok()
            .and_then(|i| i.checked_mul(geometry.advance))
        else {
            break;
        };
        if start_y >= image.height {
            continue;
        }
        let height = geometry.page_height.min(image.height - start_y);
        if height == 0 {
            continue;
        }
        pages.push(PageRect { start_y, height });
    }

    debug!(
        "Paginated {}x{} into {} pages (scale {:.4}, page {}px, overlap {}px)",
        image.width,
        image.height,
        pages.len(),
        geometry.scale_factor,
        geometry.page_height,
        geometry.overlap
    );

    pages
}

/// Index of the last page whose band contains row `y`. With overlap a row can
/// sit on two pages; the later one shows it closer to the top of the screen.
pub fn page_containing_row(pages: &[PageRect], y: u32) -> Option<usize> {
    pages.iter().rposition(|page| page.contains_row(y))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn viewport() -> ViewportSpec {
        ViewportSpec::new(1000, 1600, 100)
    }

    fn assert_covers(pages: &[PageRect], height: u32) {
        assert!(!pages.is_empty());
        assert_eq!(pages[0].start_y, 0);
        for pair in pages.windows(2) {
            assert!(pair[0].start_y <= pair[1].start_y);
            assert!(
                pair[1].start_y <= pair[0].end_y(),
                "gap between {:?} and {:?}",
                pair[0],
                pair[1]
            );
        }
        assert_eq!(pages.last().unwrap().end_y(), height);
        assert!(pages.iter().all(|p| p.height > 0 && p.start_y < height));
    }

    #[test]
    fn test_simple_slicing() {
        let pages = compute_pages(
            ImageSize::new(1000, 3000),
            &viewport(),
            PaginationConfig::default(),
        );
        assert_eq!(
            pages,
            vec![
                PageRect {
                    start_y: 0,
                    height: 1500
                },
                PageRect {
                    start_y: 1500,
                    height: 1500
                },
            ]
        );
    }

    #[test]
    fn test_overlapping_pages() {
        let pages = compute_pages(
            ImageSize::new(1000, 3000),
            &viewport(),
            PaginationConfig::new(20),
        );
        let starts: Vec<u32> = pages.iter().map(|p| p.start_y).collect();
        let heights: Vec<u32> = pages.iter().map(|p| p.height).collect();
        assert_eq!(starts, vec![0, 1200, 2400]);
        assert_eq!(heights, vec![1500, 1500, 600]);
    }

    #[test]
    fn test_geometry_values() {
        let geometry = PageGeometry::compute(
            ImageSize::new(1000, 3000),
            &viewport(),
            PaginationConfig::new(20),
        )
        .unwrap();
        assert_eq!(geometry.scale_factor, 1.0);
        assert_eq!(geometry.available_height, 1500);
        assert_eq!(geometry.page_height, 1500);
        assert_eq!(geometry.overlap, 300);
        assert_eq!(geometry.advance, 1200);
        assert_eq!(geometry.estimated_pages(3000), 3);
    }

    #[test]
    fn test_scaled_image() {
        // Image twice as wide as the viewport: one screen shows 3000 source rows
        let pages = compute_pages(
            ImageSize::new(2000, 7000),
            &viewport(),
            PaginationConfig::default(),
        );
        let heights: Vec<u32> = pages.iter().map(|p| p.height).collect();
        assert_eq!(heights, vec![3000, 3000, 1000]);
        assert_covers(&pages, 7000);
    }

    #[test]
    fn test_degenerate_dimensions() {
        let config = PaginationConfig::default();
        assert!(compute_pages(ImageSize::new(0, 100), &viewport(), config).is_empty());
        assert!(compute_pages(ImageSize::new(100, 0), &viewport(), config).is_empty());
        assert!(
            compute_pages(
                ImageSize::new(100, 100),
                &ViewportSpec::new(0, 100, 0),
                config
            )
            .is_empty()
        );
    }

    #[test]
    fn test_single_pixel_image() {
        for overlap in [0, 50, 99, 100] {
            let pages = compute_pages(
                ImageSize::new(1000, 1),
                &viewport(),
                PaginationConfig::new(overlap),
            );
            assert_eq!(
                pages,
                vec![PageRect {
                    start_y: 0,
                    height: 1
                }]
            );
        }
    }

    #[test]
    fn test_evenly_divisible_has_no_trailing_page() {
        let pages = compute_pages(
            ImageSize::new(1000, 4500),
            &viewport(),
            PaginationConfig::default(),
        );
        assert_eq!(pages.len(), 3);
        assert_covers(&pages, 4500);
    }

    #[test]
    fn test_full_overlap_falls_back_to_plain_slicing() {
        let plain = compute_pages(
            ImageSize::new(1000, 3000),
            &viewport(),
            PaginationConfig::default(),
        );
        let full = compute_pages(
            ImageSize::new(1000, 3000),
            &viewport(),
            PaginationConfig::new(100),
        );
        assert_eq!(plain, full);
    }

    #[test]
    fn test_reserved_height_larger_than_viewport() {
        let pages = compute_pages(
            ImageSize::new(10, 5),
            &ViewportSpec::new(10, 50, 80),
            PaginationConfig::default(),
        );
        assert_eq!(pages.len(), 5);
        assert!(pages.iter().all(|p| p.height == 1));
    }

    #[test]
    fn test_tiny_page_height_is_clamped() {
        // 1px of viewport maps to a fraction of a source row
        let pages = compute_pages(
            ImageSize::new(1, 3),
            &ViewportSpec::new(1000, 1, 0),
            PaginationConfig::default(),
        );
        assert_eq!(pages.len(), 3);
        assert_covers(&pages, 3);
    }

    #[test]
    fn test_image_shorter_than_overlap() {
        let pages = compute_pages(
            ImageSize::new(1000, 100),
            &viewport(),
            PaginationConfig::new(50),
        );
        assert_eq!(
            pages,
            vec![PageRect {
                start_y: 0,
                height: 100
            }]
        );
    }

    #[test]
    fn test_coverage_across_inputs() {
        for height in [1, 7, 999, 1500, 1501, 3000, 12_345] {
            for vp_height in [101, 300, 1600] {
                for overlap in [0, 1, 20, 50, 99] {
                    let pages = compute_pages(
                        ImageSize::new(800, height),
                        &ViewportSpec::new(1000, vp_height, 100),
                        PaginationConfig::new(overlap),
                    );
                    assert_covers(&pages, height);
                }
            }
        }
    }

    #[test]
    fn test_extreme_dimensions_do_not_overflow() {
        for overlap in [0, 50, 100] {
            let pages = compute_pages(
                ImageSize::new(100_000_000, 10),
                &ViewportSpec::new(1, u32::MAX, 0),
                PaginationConfig::new(overlap),
            );
            assert_eq!(
                pages,
                vec![PageRect {
                    start_y: 0,
                    height: 10
                }]
            );
        }

        let geometry = PageGeometry::compute(
            ImageSize::new(u32::MAX, u32::MAX),
            &ViewportSpec::new(1, u32::MAX, 0),
            PaginationConfig::new(99),
        )
        .unwrap();
        assert_eq!(geometry.page_height, u32::MAX);
        assert_eq!(geometry.overlap, u32::MAX / 100);
    }

    #[test]
    fn test_plain_pagination_is_idempotent() {
        let size = ImageSize::new(640, 9001);
        let first = compute_pages(size, &viewport(), PaginationConfig::default());
        let second = compute_pages(size, &viewport(), PaginationConfig::default());
        assert_eq!(first, second);
    }

    #[test]
    fn test_config_clamps_overlap() {
        let config = PaginationConfig::new(30).with_overlap(250);
        assert_eq!(config.overlap_percent(), 100);
        assert_eq!(PaginationConfig::default().overlap_percent(), 0);
    }

    #[test]
    fn test_page_containing_row() {
        let pages = compute_pages(
            ImageSize::new(1000, 3000),
            &viewport(),
            PaginationConfig::new(20),
        );
        assert_eq!(page_containing_row(&pages, 0), Some(0));
        assert_eq!(page_containing_row(&pages, 1300), Some(1));
        assert_eq!(page_containing_row(&pages, 2999), Some(2));
        assert_eq!(page_containing_row(&pages, 3000), None);
    }
}

//! Display-side state: colour adjustments and the surfaces pages are shown on

use anyhow::Context;
use image::{DynamicImage, Rgba, RgbaImage};
use log::debug;
use std::path::{Path, PathBuf};

use crate::pagination::PageRect;
use crate::store::KeyValueStore;

pub const KEY_BRIGHTNESS: &str = "brightness";
pub const KEY_CONTRAST: &str = "contrast";
pub const KEY_INVERT_COLOR: &str = "invert_color";

/// User colour adjustments. Brightness and contrast are percentages where
/// 100 leaves the image unchanged.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ImageAdjustments {
    pub brightness: f32,
    pub contrast: f32,
    pub invert: bool,
}

impl Default for ImageAdjustments {
    fn default() -> Self {
        Self {
            brightness: Self::NEUTRAL,
            contrast: Self::NEUTRAL,
            invert: false,
        }
    }
}

impl ImageAdjustments {
    pub const NEUTRAL: f32 = 100.0;
    pub const MAX: f32 = 200.0;

    pub fn load<S: KeyValueStore + ?Sized>(store: &S) -> Self {
        Self {
            brightness: clamp_percent(store.get_float(KEY_BRIGHTNESS, Self::NEUTRAL)),
            contrast: clamp_percent(store.get_float(KEY_CONTRAST, Self::NEUTRAL)),
            invert: store.get_bool(KEY_INVERT_COLOR, false),
        }
    }

    pub fn save<S: KeyValueStore + ?Sized>(&self, store: &mut S) -> anyhow::Result<()> {
        store.put_float(KEY_BRIGHTNESS, self.brightness)?;
        store.put_float(KEY_CONTRAST, self.contrast)?;
        store.put_bool(KEY_INVERT_COLOR, self.invert)?;
        Ok(())
    }

    #[must_use]
    pub fn with_brightness(self, brightness: f32) -> Self {
        Self {
            brightness: clamp_percent(brightness),
            ..self
        }
    }

    #[must_use]
    pub fn with_contrast(self, contrast: f32) -> Self {
        Self {
            contrast: clamp_percent(contrast),
            ..self
        }
    }

    #[must_use]
    pub fn with_invert(self, invert: bool) -> Self {
        Self { invert, ..self }
    }

    /// Restore neutral values and persist them
    pub fn reset<S: KeyValueStore + ?Sized>(&mut self, store: &mut S) -> anyhow::Result<()> {
        *self = Self::default();
        self.save(store)
    }

    pub fn is_neutral(&self) -> bool {
        *self == Self::default()
    }

    pub fn transform(&self) -> ColorTransform {
        let scale = self.contrast / 100.0;
        let translate = (self.brightness - 100.0) / 100.0 * 255.0;
        let base = ColorTransform::scale_translate(scale, translate);
        if self.invert {
            base.then(&ColorTransform::invert())
        } else {
            base
        }
    }
}

fn clamp_percent(value: f32) -> f32 {
    if value.is_finite() {
        value.clamp(0.0, ImageAdjustments::MAX)
    } else {
        ImageAdjustments::NEUTRAL
    }
}

/// 4x5 colour matrix over RGBA in `[0, 255]`: each output channel is a
/// weighted sum of the input channels plus an offset.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ColorTransform {
    rows: [[f32; 5]; 4],
}

impl Default for ColorTransform {
    fn default() -> Self {
        Self::identity()
    }
}

impl ColorTransform {
    pub fn identity() -> Self {
        Self::scale_translate(1.0, 0.0)
    }

    /// Scale RGB by `scale` and add `translate`; alpha passes through
    pub fn scale_translate(scale: f32, translate: f32) -> Self {
        Self {
            rows: [
                [scale, 0.0, 0.0, 0.0, translate],
                [0.0, scale, 0.0, 0.0, translate],
                [0.0, 0.0, scale, 0.0, translate],
                [0.0, 0.0, 0.0, 1.0, 0.0],
            ],
        }
    }

    pub fn invert() -> Self {
        Self {
            rows: [
                [-1.0, 0.0, 0.0, 0.0, 255.0],
                [0.0, -1.0, 0.0, 0.0, 255.0],
                [0.0, 0.0, -1.0, 0.0, 255.0],
                [0.0, 0.0, 0.0, 1.0, 0.0],
            ],
        }
    }

    /// Compose so that `self` is applied first, then `next`
    #[must_use]
    pub fn then(&self, next: &ColorTransform) -> Self {
        let mut rows = [[0.0f32; 5]; 4];
        for (i, row) in rows.iter_mut().enumerate() {
            for j in 0..4 {
                row[j] = (0..4).map(|k| next.rows[i][k] * self.rows[k][j]).sum();
            }
            row[4] = (0..4)
                .map(|k| next.rows[i][k] * self.rows[k][4])
                .sum::<f32>()
                + next.rows[i][4];
        }
        Self { rows }
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::identity()
    }

    pub fn apply_pixel(&self, pixel: Rgba<u8>) -> Rgba<u8> {
        let input = pixel.0.map(f32::from);
        let mut out = [0u8; 4];
        for (channel, row) in out.iter_mut().zip(&self.rows) {
            let value = row[0] * input[0]
                + row[1] * input[1]
                + row[2] * input[2]
                + row[3] * input[3]
                + row[4];
            *channel = value.round().clamp(0.0, 255.0) as u8;
        }
        Rgba(out)
    }

    pub fn apply(&self, image: &DynamicImage) -> DynamicImage {
        if self.is_identity() {
            return image.clone();
        }
        let mut rgba: RgbaImage = image.to_rgba8();
        for pixel in rgba.pixels_mut() {
            *pixel = self.apply_pixel(*pixel);
        }
        DynamicImage::ImageRgba8(rgba)
    }
}

/// A page borrowed from the session for one render
pub struct PageView<'a> {
    pub index: usize,
    pub total: usize,
    pub rect: PageRect,
    pub image: &'a DynamicImage,
}

impl PageView<'_> {
    /// One-based page number
    pub fn number(&self) -> usize {
        self.index + 1
    }
}

/// Something that can show a page
pub trait DisplaySurface {
    fn present(&mut self, page: &PageView<'_>, transform: &ColorTransform) -> anyhow::Result<()>;
}

/// Writes each presented page to a PNG file
pub struct PngSurface {
    target: PngTarget,
}

enum PngTarget {
    File(PathBuf),
    Directory(PathBuf),
}

impl PngSurface {
    /// Every page overwrites `path`
    pub fn to_file(path: impl Into<PathBuf>) -> Self {
        Self {
            target: PngTarget::File(path.into()),
        }
    }

    /// Pages land in `dir` as `page_001.png`, `page_002.png`, ...
    pub fn to_directory(dir: impl Into<PathBuf>) -> Self {
        Self {
            target: PngTarget::Directory(dir.into()),
        }
    }

    pub fn path_for(&self, page_number: usize) -> PathBuf {
        match &self.target {
            PngTarget::File(path) => path.clone(),
            PngTarget::Directory(dir) => dir.join(format!("page_{page_number:03}.png")),
        }
    }
}

impl DisplaySurface for PngSurface {
    fn present(&mut self, page: &PageView<'_>, transform: &ColorTransform) -> anyhow::Result<()> {
        let path = self.path_for(page.number());
        ensure_parent(&path)?;
        let rendered = transform.apply(page.image);
        rendered
            .save(&path)
            .with_context(|| format!("Failed to write page {} to {path:?}", page.number()))?;
        debug!(
            "Wrote page {}/{} ({}px from row {}) to {path:?}",
            page.number(),
            page.total,
            page.rect.height,
            page.rect.start_y
        );
        Ok(())
    }
}

fn ensure_parent(path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {parent:?}"))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Preferences;

    #[test]
    fn test_neutral_adjustments_are_identity() {
        let adjustments = ImageAdjustments::default();
        assert!(adjustments.is_neutral());
        assert!(adjustments.transform().is_identity());
    }

    #[test]
    fn test_brightness_and_contrast() {
        let transform = ImageAdjustments::default()
            .with_brightness(150.0)
            .with_contrast(50.0)
            .transform();
        // 100 * 0.5 + 127.5
        assert_eq!(
            transform.apply_pixel(Rgba([100, 0, 255, 200])),
            Rgba([178, 128, 255, 200])
        );
    }

    #[test]
    fn test_invert_applies_after_brightness() {
        let transform = ImageAdjustments::default()
            .with_brightness(120.0)
            .with_invert(true)
            .transform();
        // 255 - (10 + 51)
        assert_eq!(
            transform.apply_pixel(Rgba([10, 0, 255, 255])),
            Rgba([194, 204, 0, 255])
        );
    }

    #[test]
    fn test_adjustments_clamped() {
        let adjustments = ImageAdjustments::default()
            .with_brightness(900.0)
            .with_contrast(f32::NAN);
        assert_eq!(adjustments.brightness, ImageAdjustments::MAX);
        assert_eq!(adjustments.contrast, ImageAdjustments::NEUTRAL);
    }

    #[test]
    fn test_persist_and_reset() {
        let mut prefs = Preferences::ephemeral();
        let mut adjustments = ImageAdjustments::default()
            .with_contrast(140.0)
            .with_invert(true);
        adjustments.save(&mut prefs).unwrap();
        assert_eq!(ImageAdjustments::load(&prefs), adjustments);

        adjustments.reset(&mut prefs).unwrap();
        assert!(adjustments.is_neutral());
        assert!(ImageAdjustments::load(&prefs).is_neutral());
    }

    #[test]
    fn test_png_surface_paths() {
        let dir = PngSurface::to_directory("/tmp/out");
        assert_eq!(dir.path_for(7), PathBuf::from("/tmp/out/page_007.png"));
        let file = PngSurface::to_file("/tmp/page.png");
        assert_eq!(file.path_for(7), PathBuf::from("/tmp/page.png"));
    }
}

//! Page rasterizer.
//!
//! Turns one page of a [`PageSource`] into a [`RasterImage`] that fits a
//! target box while preserving the page's aspect ratio.
//!
//! # Drawing Policy
//!
//! - The surface is filled opaque white before the page is drawn, so pages
//!   with transparent regions never show through to an empty buffer.
//! - Page space has y growing upward; image space has y growing downward.
//!   The page transform scales and then flips the vertical axis so "up" on
//!   the page is "up" in the image.

use image::Rgba;
use tracing::trace;

use crate::error::RenderError;
use crate::source::{PageIndex, PageSource, Surface, Transform};

use super::RasterImage;

/// Default target box side, in device-independent units.
pub const DEFAULT_THUMBNAIL_SIZE: f64 = 240.0;

/// Default pixels per device-independent unit.
pub const DEFAULT_DEVICE_SCALE: f64 = 1.0;

const BACKGROUND: Rgba<u8> = Rgba([255, 255, 255, 255]);

// =============================================================================
// Box Size
// =============================================================================

/// Bounding box a rendered page must fit inside.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoxSize {
    pub width: f64,
    pub height: f64,
}

impl BoxSize {
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub const fn square(side: f64) -> Self {
        Self::new(side, side)
    }

    fn is_valid(&self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
    }
}

impl Default for BoxSize {
    fn default() -> Self {
        Self::square(DEFAULT_THUMBNAIL_SIZE)
    }
}

// =============================================================================
// Rasterizer
// =============================================================================

/// Fits pages into a target box and draws them onto a white background.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rasterizer {
    target: BoxSize,
    device_scale: f64,
}

impl Rasterizer {
    pub fn new(target: BoxSize) -> Self {
        Self::with_device_scale(target, DEFAULT_DEVICE_SCALE)
    }

    /// Rasterizer producing `device_scale` pixels per unit of the target box.
    pub fn with_device_scale(target: BoxSize, device_scale: f64) -> Self {
        Self {
            target,
            device_scale,
        }
    }

    pub fn target(&self) -> BoxSize {
        self.target
    }

    pub fn device_scale(&self) -> f64 {
        self.device_scale
    }

    /// Render one page.
    ///
    /// # Errors
    ///
    /// - `RenderFailure` if the page does not resolve, has no drawable media
    ///   box, the target box is degenerate, the surface cannot be allocated,
    ///   or the source fails while drawing
    /// - `SourceUnavailable` if the source cannot serve pages at all
    pub fn render<S>(&self, source: &S, index: PageIndex) -> Result<RasterImage, RenderError>
    where
        S: PageSource + ?Sized,
    {
        let page = source.page_size(index)?;
        if !page.is_drawable() {
            return Err(RenderError::RenderFailure {
                index,
                reason: format!("page size {}x{} is not drawable", page.width, page.height),
            });
        }
        if !self.target.is_valid() || !(self.device_scale.is_finite() && self.device_scale > 0.0)
        {
            return Err(RenderError::RenderFailure {
                index,
                reason: "target box or device scale is not positive".to_string(),
            });
        }

        let fit = fit_scale(page.width, page.height, self.target);
        let pixel_scale = fit * self.device_scale;
        let width = pixel_extent(page.width * pixel_scale);
        let height = pixel_extent(page.height * pixel_scale);

        let mut surface = Surface::new(width, height).ok_or_else(|| RenderError::RenderFailure {
            index,
            reason: format!("cannot allocate {}x{} surface", width, height),
        })?;
        surface.fill(BACKGROUND);

        let transform = page_transform(pixel_scale, height);
        source.draw_page(index, &mut surface, &transform)?;

        trace!(page = %index, width, height, "Rasterized page");
        Ok(RasterImage::new(surface.into_image()))
    }
}

impl Default for Rasterizer {
    fn default() -> Self {
        Self::new(BoxSize::default())
    }
}

/// Largest uniform scale at which a `width x height` page fits inside `target`.
pub fn fit_scale(width: f64, height: f64, target: BoxSize) -> f64 {
    (target.width / width).min(target.height / height)
}

/// Page-space to pixel-space transform: scale, then flip y about the image height.
fn page_transform(scale: f64, image_height: u32) -> Transform {
    Transform::scale(scale, scale)
        .then(&Transform::scale(1.0, -1.0))
        .then(&Transform::translate(0.0, image_height as f64))
}

fn pixel_extent(extent: f64) -> u32 {
    let rounded = extent.round();
    if rounded < 1.0 {
        1
    } else if rounded >= u32::MAX as f64 {
        u32::MAX
    } else {
        rounded as u32
    }
}

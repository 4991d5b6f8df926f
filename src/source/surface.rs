//! Drawable pixel surface and page-to-pixel transforms.

use image::{Rgba, RgbaImage};

/// Largest width or height a surface may have, in pixels.
pub const MAX_SURFACE_DIMENSION: u32 = 16_384;

// =============================================================================
// Transform
// =============================================================================

/// 2D affine transform.
///
/// Maps `(x, y)` to `(a*x + c*y + tx, b*x + d*y + ty)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub tx: f64,
    pub ty: f64,
}

impl Transform {
    pub const IDENTITY: Transform = Transform {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        tx: 0.0,
        ty: 0.0,
    };

    pub fn scale(sx: f64, sy: f64) -> Self {
        Self {
            a: sx,
            d: sy,
            ..Self::IDENTITY
        }
    }

    pub fn translate(tx: f64, ty: f64) -> Self {
        Self {
            tx,
            ty,
            ..Self::IDENTITY
        }
    }

    /// Transform that applies `self` first and `next` second.
    pub fn then(&self, next: &Transform) -> Transform {
        Transform {
            a: next.a * self.a + next.c * self.b,
            b: next.b * self.a + next.d * self.b,
            c: next.a * self.c + next.c * self.d,
            d: next.b * self.c + next.d * self.d,
            tx: next.a * self.tx + next.c * self.ty + next.tx,
            ty: next.b * self.tx + next.d * self.ty + next.ty,
        }
    }

    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        (
            self.a * x + self.c * y + self.tx,
            self.b * x + self.d * y + self.ty,
        )
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

// =============================================================================
// Surface
// =============================================================================

/// RGBA pixel buffer a page source draws into.
///
/// Pixel `(0, 0)` is the top-left corner; y grows downward.
pub struct Surface {
    pixels: RgbaImage,
}

impl Surface {
    /// Allocate a transparent surface.
    ///
    /// Returns `None` if either side is zero or exceeds
    /// [`MAX_SURFACE_DIMENSION`].
    pub fn new(width: u32, height: u32) -> Option<Self> {
        if width == 0 || height == 0 {
            return None;
        }
        if width > MAX_SURFACE_DIMENSION || height > MAX_SURFACE_DIMENSION {
            return None;
        }
        Some(Self {
            pixels: RgbaImage::new(width, height),
        })
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    /// Overwrite every pixel with `color`.
    pub fn fill(&mut self, color: Rgba<u8>) {
        for pixel in self.pixels.pixels_mut() {
            *pixel = color;
        }
    }

    /// Composite `color` over the axis-aligned pixel-space rectangle
    /// `[x0, x1) x [y0, y1)`.
    ///
    /// A pixel is covered when its center lies inside the rectangle. The
    /// rectangle is clipped to the surface; corners may be given in any order.
    pub fn fill_rect(&mut self, x0: f64, y0: f64, x1: f64, y1: f64, color: Rgba<u8>) {
        if !(x0.is_finite() && y0.is_finite() && x1.is_finite() && y1.is_finite()) {
            return;
        }
        let (left, right) = if x0 <= x1 { (x0, x1) } else { (x1, x0) };
        let (top, bottom) = if y0 <= y1 { (y0, y1) } else { (y1, y0) };

        let col_start = pixel_bound(left, self.width());
        let col_end = pixel_bound(right, self.width());
        let row_start = pixel_bound(top, self.height());
        let row_end = pixel_bound(bottom, self.height());

        for y in row_start..row_end {
            for x in col_start..col_end {
                let dst = self.pixels.get_pixel_mut(x, y);
                *dst = blend_over(color, *dst);
            }
        }
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgba<u8>> {
        if x < self.width() && y < self.height() {
            Some(*self.pixels.get_pixel(x, y))
        } else {
            None
        }
    }

    pub fn into_image(self) -> RgbaImage {
        self.pixels
    }
}

/// First pixel index whose center is at or beyond `edge`, clamped to `[0, limit]`.
fn pixel_bound(edge: f64, limit: u32) -> u32 {
    let bound = (edge - 0.5).ceil();
    if bound <= 0.0 {
        0
    } else if bound >= limit as f64 {
        limit
    } else {
        bound as u32
    }
}

/// Source-over compositing of `src` onto `dst`.
fn blend_over(src: Rgba<u8>, dst: Rgba<u8>) -> Rgba<u8> {
    let sa = src[3] as u32;
    if sa == 255 {
        return src;
    }
    if sa == 0 {
        return dst;
    }
    let inv = 255 - sa;
    let da = dst[3] as u32;
    let out_a = sa + (da * inv + 127) / 255;
    if out_a == 0 {
        return Rgba([0, 0, 0, 0]);
    }

    let mut out = [0u8; 4];
    for channel in 0..3 {
        let src_premul = src[channel] as u32 * sa;
        let dst_premul = (dst[channel] as u32 * da * inv + 127) / 255;
        out[channel] = ((src_premul + dst_premul + out_a / 2) / out_a).min(255) as u8;
    }
    out[3] = out_a.min(255) as u8;
    Rgba(out)
}

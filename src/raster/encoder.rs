//! Page image encoder for export.
//!
//! Rendered pages are kept as RGBA pixel buffers in the cache. When a page
//! leaves the process (written to disk, handed to another program) it is
//! encoded as PNG or JPEG.
//!
//! - **PNG** keeps the buffer lossless, alpha included.
//! - **JPEG** drops alpha (pages are rendered onto an opaque background, so
//!   nothing is lost) and encodes at a configurable quality.

use std::io::Cursor;

use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat};

use crate::error::EncodeError;

use super::RasterImage;

/// Default JPEG quality (1-100).
pub const DEFAULT_JPEG_QUALITY: u8 = 80;

/// Minimum allowed JPEG quality.
pub const MIN_JPEG_QUALITY: u8 = 1;

/// Maximum allowed JPEG quality.
pub const MAX_JPEG_QUALITY: u8 = 100;

// =============================================================================
// Export Format
// =============================================================================

/// Output format for an encoded page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Png,
    Jpeg { quality: u8 },
}

impl ExportFormat {
    /// File extension without the dot.
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Png => "png",
            ExportFormat::Jpeg { .. } => "jpg",
        }
    }
}

impl Default for ExportFormat {
    fn default() -> Self {
        ExportFormat::Png
    }
}

// =============================================================================
// Encoder
// =============================================================================

/// Encodes [`RasterImage`] values into PNG or JPEG bytes.
#[derive(Debug, Clone, Default)]
pub struct PageEncoder {}

impl PageEncoder {
    pub fn new() -> Self {
        Self {}
    }

    /// Encode `image` in the requested format.
    ///
    /// # Errors
    ///
    /// - `InvalidQuality` if a JPEG quality is outside 1-100
    /// - `Codec` if the codec rejects the buffer
    pub fn encode(&self, image: &RasterImage, format: ExportFormat) -> Result<Bytes, EncodeError> {
        match format {
            ExportFormat::Png => self.encode_png(image),
            ExportFormat::Jpeg { quality } => self.encode_jpeg(image, quality),
        }
    }

    fn encode_png(&self, image: &RasterImage) -> Result<Bytes, EncodeError> {
        let mut output = Cursor::new(Vec::new());
        image
            .as_rgba()
            .write_to(&mut output, ImageFormat::Png)
            .map_err(|e| EncodeError::Codec(e.to_string()))?;
        Ok(Bytes::from(output.into_inner()))
    }

    fn encode_jpeg(&self, image: &RasterImage, quality: u8) -> Result<Bytes, EncodeError> {
        if !is_valid_quality(quality) {
            return Err(EncodeError::InvalidQuality(quality));
        }

        let rgb = DynamicImage::ImageRgba8(image.as_rgba().clone()).to_rgb8();

        let mut output = Vec::new();
        let mut encoder = JpegEncoder::new_with_quality(&mut output, quality);
        encoder
            .encode_image(&rgb)
            .map_err(|e| EncodeError::Codec(e.to_string()))?;

        Ok(Bytes::from(output))
    }
}

// =============================================================================
// Utility Functions
// =============================================================================

/// Returns `true` if quality is in the valid range (1-100).
#[inline]
pub fn is_valid_quality(quality: u8) -> bool {
    (MIN_JPEG_QUALITY..=MAX_JPEG_QUALITY).contains(&quality)
}

//! Rasterization layer.
//!
//! - [`Rasterizer`]: fits a page into a target box and draws it onto a white
//!   background, correcting the page's upward y axis
//! - [`RasterImage`]: immutable, cheaply shared page bitmap
//! - [`PageEncoder`]: PNG/JPEG encoding of rendered pages for export
//!
//! # Example
//!
//! ```
//! use page_raster::raster::{BoxSize, Rasterizer};
//! use page_raster::source::{PageIndex, ShapeDocument, ShapePage};
//!
//! let doc = ShapeDocument::new(vec![ShapePage::new(200.0, 100.0)]);
//! let image = Rasterizer::new(BoxSize::square(240.0))
//!     .render(&doc, PageIndex::FIRST)
//!     .unwrap();
//!
//! assert_eq!(image.dimensions(), (240, 120));
//! ```

mod bitmap;
mod encoder;
mod rasterizer;

pub use bitmap::RasterImage;
pub use encoder::{
    is_valid_quality, ExportFormat, PageEncoder, DEFAULT_JPEG_QUALITY, MAX_JPEG_QUALITY,
    MIN_JPEG_QUALITY,
};
pub use rasterizer::{
    fit_scale, BoxSize, Rasterizer, DEFAULT_DEVICE_SCALE, DEFAULT_THUMBNAIL_SIZE,
};

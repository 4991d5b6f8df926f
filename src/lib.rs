//! # page-raster
//!
//! Asynchronous, cached rasterization of document pages into thumbnails.
//!
//! This library turns pages of a vector document into bitmap images fitted
//! to a target box, keeps them in a bounded cache, and serves them to
//! presentation code either synchronously or through a callback delivered on
//! a context the caller chooses.
//!
//! ## Features
//!
//! - **Fit-to-box rendering**: Aspect-preserving scale with device pixel scaling
//! - **LRU page cache**: Byte budget by default, pluggable eviction policy
//! - **De-duplicated renders**: Concurrent misses for one page render it once
//! - **Background prefetch**: Warms the cache on open, cancelled on close
//! - **Export**: PNG and JPEG encoding of rendered pages
//!
//! ## Architecture
//!
//! - [`source`] - Page source and opener traits, drawing surface, JSON shape documents
//! - [`raster`] - Rasterizer, raster images, and export encoding
//! - [`cache`] - Page image cache and eviction policies
//! - [`render`] - Render coordinator, delivery contexts, prefetcher
//! - [`document`] - Open documents tying it all together
//! - [`config`] - Render configuration and CLI types
//!
//! ## Example
//!
//! ```rust,no_run
//! use page_raster::{Document, Inline, ManifestOpener, PageIndex, RenderConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let document = Document::open(
//!         &ManifestOpener::new(),
//!         "slides.json",
//!         Some("secret"),
//!         RenderConfig::default(),
//!     )
//!     .await
//!     .expect("document opens");
//!
//!     document.get_page_async(PageIndex::FIRST, Inline, |result| match result {
//!         Ok(image) => println!("page 1 is {}x{}", image.width(), image.height()),
//!         Err(e) => eprintln!("page 1 failed: {}", e),
//!     });
//! }
//! ```

pub mod cache;
pub mod config;
pub mod document;
pub mod error;
pub mod raster;
pub mod render;
pub mod source;

// Re-export commonly used types
pub use cache::{ByteBudget, CacheStats, EntryLimit, EvictionPolicy, PageCache, Unbounded};
pub use config::{Cli, Command, ExportConfig, ImageFormatArg, InfoConfig, RenderArgs, RenderConfig};
pub use document::Document;
pub use error::{EncodeError, OpenError, RenderError, SourceError};
pub use raster::{BoxSize, ExportFormat, PageEncoder, RasterImage, Rasterizer};
pub use render::{
    AllPages, CancellationToken, Delivery, DeliveryQueue, Inline, PrefetchReport, Prefetcher,
    QueueDelivery, RenderCoordinator, RuntimeDelivery,
};
pub use source::{
    DocumentOpener, ManifestOpener, PageIndex, PageSize, PageSource, Shape, ShapeDocument,
    ShapePage, Surface, Transform,
};

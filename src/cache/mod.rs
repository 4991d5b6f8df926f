//! Page image caching.
//!
//! One [`PageCache`] exists per open document. It maps page indices to
//! rendered [`RasterImage`](crate::raster::RasterImage) values and evicts in
//! LRU order under a pluggable [`EvictionPolicy`]:
//!
//! - [`ByteBudget`]: bound the total decoded pixel bytes (default)
//! - [`EntryLimit`]: bound the number of cached pages
//! - [`Unbounded`]: keep everything until trimmed or cleared
//!
//! # Example
//!
//! ```
//! use page_raster::cache::{EntryLimit, PageCache};
//! use page_raster::raster::RasterImage;
//! use page_raster::source::PageIndex;
//! use image::RgbaImage;
//!
//! let cache = PageCache::with_policy(EntryLimit(2));
//! cache.put(PageIndex::new(1), RasterImage::new(RgbaImage::new(4, 4)));
//!
//! if let Some(image) = cache.get(PageIndex::new(1)) {
//!     assert_eq!(image.dimensions(), (4, 4));
//! }
//! ```

mod page_cache;

pub use page_cache::{
    ByteBudget, CacheStats, CacheUsage, EntryLimit, EvictionPolicy, PageCache, Unbounded,
    DEFAULT_PAGE_CACHE_BYTES,
};

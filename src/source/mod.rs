//! Page source abstraction.
//!
//! The render pipeline never parses documents itself. It depends on a
//! [`PageSource`] that knows how many pages a document has, how large each
//! page is, and how to draw a page into a pixel [`Surface`] under a
//! [`Transform`]. Any decoder satisfying this contract can be plugged in.
//!
//! Opening a document (reading the file, unlocking it) is the job of a
//! [`DocumentOpener`], which turns a location plus an optional credential
//! into a page source.
//!
//! ```text
//! ┌──────────────────┐  open(location, credential)  ┌──────────────────┐
//! │  DocumentOpener  │ ───────────────────────────▶ │    PageSource    │
//! └──────────────────┘                              └────────┬─────────┘
//!                                                            │ page_size / draw_page
//!                                                            ▼
//!                                                   ┌──────────────────┐
//!                                                   │    Rasterizer    │
//!                                                   └──────────────────┘
//! ```
//!
//! [`ShapeDocument`] is the built-in source: pages made of filled
//! rectangles, loaded from a JSON manifest by [`ManifestOpener`].

mod manifest;
mod surface;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{OpenError, SourceError};

pub use manifest::{ManifestOpener, Shape, ShapeDocument, ShapePage};
pub use surface::{Surface, Transform, MAX_SURFACE_DIMENSION};

// =============================================================================
// Page Index
// =============================================================================

/// 1-based page number.
///
/// Any value can be constructed; whether it addresses a page is decided
/// against a document's page count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PageIndex(usize);

impl PageIndex {
    /// The first page of every non-empty document.
    pub const FIRST: PageIndex = PageIndex(1);

    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    pub const fn get(self) -> usize {
        self.0
    }

    /// Whether this index addresses a page of a document with `page_count` pages.
    pub fn is_valid_for(self, page_count: usize) -> bool {
        self.0 >= 1 && self.0 <= page_count
    }

    /// Iterate every index of a document with `page_count` pages, in order.
    pub fn all(page_count: usize) -> impl DoubleEndedIterator<Item = PageIndex> + Clone {
        (1..=page_count).map(PageIndex)
    }
}

impl From<usize> for PageIndex {
    fn from(index: usize) -> Self {
        Self(index)
    }
}

impl fmt::Display for PageIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Page Size
// =============================================================================

/// Intrinsic page size in page units (the media box).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width: f64,
    pub height: f64,
}

impl PageSize {
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Both sides finite and strictly positive.
    pub fn is_drawable(&self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
    }
}

// =============================================================================
// PageSource Trait
// =============================================================================

/// Capability supplying page geometry and drawing.
///
/// Implementations are shared across worker threads and must be safe to call
/// concurrently. Drawing is blocking work and is always invoked off the async
/// executor.
pub trait PageSource: Send + Sync {
    /// Number of pages in the document.
    fn page_count(&self) -> usize;

    /// Intrinsic size of a page.
    fn page_size(&self, index: PageIndex) -> Result<PageSize, SourceError>;

    /// Draw a page into `surface`, mapping page coordinates through `transform`.
    fn draw_page(
        &self,
        index: PageIndex,
        surface: &mut Surface,
        transform: &Transform,
    ) -> Result<(), SourceError>;
}

impl<T: PageSource + ?Sized> PageSource for Arc<T> {
    fn page_count(&self) -> usize {
        (**self).page_count()
    }

    fn page_size(&self, index: PageIndex) -> Result<PageSize, SourceError> {
        (**self).page_size(index)
    }

    fn draw_page(
        &self,
        index: PageIndex,
        surface: &mut Surface,
        transform: &Transform,
    ) -> Result<(), SourceError> {
        (**self).draw_page(index, surface, transform)
    }
}

// =============================================================================
// DocumentOpener Trait
// =============================================================================

/// Resolves a document location and optional password into a page source.
#[async_trait]
pub trait DocumentOpener: Send + Sync {
    /// Open and, if needed, unlock the document at `location`.
    ///
    /// Failures are terminal for the document: an unreadable file or a
    /// wrong password is reported as such, never as an empty document.
    async fn open(
        &self,
        location: &str,
        credential: Option<&str>,
    ) -> Result<Arc<dyn PageSource>, OpenError>;
}

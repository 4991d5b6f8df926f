//! Shape documents described by a JSON manifest.
//!
//! A manifest lists pages by intrinsic size plus filled rectangles in page
//! space. Page space follows the usual vector-document convention: the origin
//! is the bottom-left corner and y grows upward.
//!
//! ```json
//! {
//!   "password_sha256": "…optional hex digest…",
//!   "pages": [
//!     { "width": 200, "height": 100,
//!       "shapes": [ { "x": 0, "y": 50, "width": 200, "height": 50, "color": [255, 0, 0, 255] } ] }
//!   ]
//! }
//! ```
//!
//! When `password_sha256` is present the document is protected. Opening it
//! tries the blank password first and then the supplied credential.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use image::Rgba;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use tracing::debug;

use super::{DocumentOpener, PageIndex, PageSize, PageSource, Surface, Transform};
use crate::error::{OpenError, SourceError};

// =============================================================================
// Manifest Types
// =============================================================================

/// A filled rectangle in page space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shape {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    /// RGBA, 0-255 per channel.
    pub color: [u8; 4],
}

impl Shape {
    pub fn new(x: f64, y: f64, width: f64, height: f64, color: [u8; 4]) -> Self {
        Self {
            x,
            y,
            width,
            height,
            color,
        }
    }
}

/// One page of a shape document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapePage {
    pub width: f64,
    pub height: f64,
    #[serde(default)]
    pub shapes: Vec<Shape>,
}

impl ShapePage {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            shapes: Vec::new(),
        }
    }

    pub fn with_shape(mut self, shape: Shape) -> Self {
        self.shapes.push(shape);
        self
    }
}

#[derive(Debug, Deserialize)]
struct Manifest {
    #[serde(default)]
    password_sha256: Option<String>,
    pages: Vec<ShapePage>,
}

// =============================================================================
// ShapeDocument
// =============================================================================

/// In-memory vector document whose pages are lists of rectangles.
#[derive(Debug, Clone)]
pub struct ShapeDocument {
    pages: Vec<ShapePage>,
}

impl ShapeDocument {
    pub fn new(pages: Vec<ShapePage>) -> Self {
        Self { pages }
    }

    /// Parse a manifest and unlock it with `credential` if it is protected.
    pub fn from_manifest(
        bytes: &[u8],
        location: &str,
        credential: Option<&str>,
    ) -> Result<Self, OpenError> {
        let manifest: Manifest =
            serde_json::from_slice(bytes).map_err(|e| OpenError::Invalid {
                location: location.to_string(),
                reason: e.to_string(),
            })?;

        if let Some(ref digest) = manifest.password_sha256 {
            unlock(location, digest, credential)?;
        }

        Ok(Self::new(manifest.pages))
    }

    fn page(&self, index: PageIndex) -> Result<&ShapePage, SourceError> {
        index
            .get()
            .checked_sub(1)
            .and_then(|i| self.pages.get(i))
            .ok_or(SourceError::MissingPage(index))
    }
}

impl PageSource for ShapeDocument {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn page_size(&self, index: PageIndex) -> Result<PageSize, SourceError> {
        let page = self.page(index)?;
        let size = PageSize::new(page.width, page.height);
        if !size.is_drawable() {
            return Err(SourceError::MalformedPage {
                index,
                reason: format!("media box {}x{} is not drawable", page.width, page.height),
            });
        }
        Ok(size)
    }

    fn draw_page(
        &self,
        index: PageIndex,
        surface: &mut Surface,
        transform: &Transform,
    ) -> Result<(), SourceError> {
        let page = self.page(index)?;
        for shape in &page.shapes {
            let (x0, y0) = transform.apply(shape.x, shape.y);
            let (x1, y1) = transform.apply(shape.x + shape.width, shape.y + shape.height);
            surface.fill_rect(x0, y0, x1, y1, Rgba(shape.color));
        }
        Ok(())
    }
}

// =============================================================================
// Unlocking
// =============================================================================

/// Hex SHA-256 digest of a password, as stored in `password_sha256`.
pub(crate) fn password_digest(password: &str) -> String {
    hex::encode(Sha256::digest(password.as_bytes()))
}

/// Check a credential against the stored digest, trying the blank password first.
fn unlock(location: &str, expected_hex: &str, credential: Option<&str>) -> Result<(), OpenError> {
    let expected = hex::decode(expected_hex).map_err(|_| OpenError::Invalid {
        location: location.to_string(),
        reason: "password_sha256 is not valid hex".to_string(),
    })?;

    let matches = |candidate: &str| -> bool {
        let digest = Sha256::digest(candidate.as_bytes());
        digest.as_slice().ct_eq(&expected).into()
    };

    if matches("") {
        debug!(location, "Document unlocked with blank password");
        return Ok(());
    }

    match credential {
        None => Err(OpenError::Locked(location.to_string())),
        Some(password) if matches(password) => {
            debug!(location, "Document unlocked");
            Ok(())
        }
        Some(_) => Err(OpenError::WrongCredential(location.to_string())),
    }
}

// =============================================================================
// ManifestOpener
// =============================================================================

/// Opens shape manifests from the local filesystem.
#[derive(Debug, Clone, Default)]
pub struct ManifestOpener;

impl ManifestOpener {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DocumentOpener for ManifestOpener {
    async fn open(
        &self,
        location: &str,
        credential: Option<&str>,
    ) -> Result<Arc<dyn PageSource>, OpenError> {
        let bytes = tokio::fs::read(Path::new(location))
            .await
            .map_err(|e| OpenError::Unreadable {
                location: location.to_string(),
                reason: e.to_string(),
            })?;

        let document = ShapeDocument::from_manifest(&bytes, location, credential)?;
        debug!(location, pages = document.page_count(), "Manifest parsed");
        Ok(Arc::new(document))
    }
}

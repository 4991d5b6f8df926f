use thiserror::Error;

use crate::source::PageIndex;

/// Errors reported by a page source while answering geometry or draw requests
#[derive(Debug, Clone, Error)]
pub enum SourceError {
    /// The index does not resolve to a page in this source
    #[error("Page {0} does not exist")]
    MissingPage(PageIndex),

    /// The page exists but its content cannot be drawn
    #[error("Malformed page {index}: {reason}")]
    MalformedPage { index: PageIndex, reason: String },

    /// The source cannot supply pages at all (closed, locked, unreadable)
    #[error("Source unavailable: {0}")]
    Unavailable(String),
}

/// Errors that can occur while producing a page image
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RenderError {
    /// Requested index lies outside `[1, page_count]`
    #[error("Page {index} out of range: document has {page_count} page(s)")]
    PageOutOfRange { index: PageIndex, page_count: usize },

    /// Page content could not be rasterized
    #[error("Failed to render page {index}: {reason}")]
    RenderFailure { index: PageIndex, reason: String },

    /// The page source cannot supply geometry or content
    #[error("Page source unavailable: {0}")]
    SourceUnavailable(String),

    /// The request was dropped before it started (document closed or worker pool gone)
    #[error("Render request cancelled")]
    Cancelled,
}

impl From<SourceError> for RenderError {
    fn from(err: SourceError) -> Self {
        match err {
            SourceError::MissingPage(index) => RenderError::RenderFailure {
                index,
                reason: "page does not resolve in source".to_string(),
            },
            SourceError::MalformedPage { index, reason } => {
                RenderError::RenderFailure { index, reason }
            }
            SourceError::Unavailable(reason) => RenderError::SourceUnavailable(reason),
        }
    }
}

/// Errors from the document-open collaborator.
///
/// These are terminal for the document instance and are never folded into
/// an empty document.
#[derive(Debug, Clone, Error)]
pub enum OpenError {
    /// The file could not be read
    #[error("Unreadable document {location}: {reason}")]
    Unreadable { location: String, reason: String },

    /// The file was read but is not a valid document
    #[error("Invalid document {location}: {reason}")]
    Invalid { location: String, reason: String },

    /// The document is protected and no credential was supplied
    #[error("Document {0} is locked: a password is required")]
    Locked(String),

    /// The supplied credential does not unlock the document
    #[error("Wrong password for document {0}")]
    WrongCredential(String),

    /// The supplied configuration cannot be used to open a document
    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Errors that can occur when encoding a page image for export
#[derive(Debug, Clone, Error)]
pub enum EncodeError {
    /// Quality outside `[1, 100]`
    #[error("Invalid JPEG quality {0}: must be between 1 and 100")]
    InvalidQuality(u8),

    /// The image codec rejected the buffer
    #[error("Encoding failed: {0}")]
    Codec(String),
}

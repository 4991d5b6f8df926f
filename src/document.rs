//! Open documents.
//!
//! A [`Document`] owns everything tied to one open file: the page source,
//! its render coordinator and cache, the background prefetch, and the
//! cancellation token that stops queued work when the document closes.

use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::CacheStats;
use crate::config::RenderConfig;
use crate::error::{OpenError, RenderError};
use crate::raster::RasterImage;
use crate::render::{AllPages, Delivery, PrefetchReport, Prefetcher, RenderCoordinator};
use crate::source::{DocumentOpener, PageIndex, PageSize, PageSource};

/// An open, unlocked document serving page images.
///
/// Dropping the document cancels queued renders and the prefetch walk.
///
/// # Example
///
/// ```no_run
/// use page_raster::{Document, ManifestOpener, PageIndex, RenderConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let document = Document::open(
///     &ManifestOpener::new(),
///     "report.json",
///     None,
///     RenderConfig::default(),
/// )
/// .await?;
///
/// println!("{} has {} pages", document.file_name(), document.page_count());
/// document.wait_for_prefetch().await;
/// let first = document.get_page(PageIndex::FIRST)?;
/// println!("{}x{}", first.width(), first.height());
/// # Ok(())
/// # }
/// ```
pub struct Document {
    file_name: String,
    source: Arc<dyn PageSource>,
    coordinator: Arc<RenderCoordinator>,
    prefetch: Mutex<Option<JoinHandle<PrefetchReport>>>,
}

impl Document {
    /// Open and unlock the document at `location`.
    ///
    /// Must be called from within a tokio runtime; its blocking pool executes
    /// the prefetch walk and asynchronous renders.
    ///
    /// # Errors
    ///
    /// - `Config` if `config` fails validation
    /// - `Unreadable`, `Invalid`, `Locked` or `WrongCredential` from the opener
    pub async fn open(
        opener: &dyn DocumentOpener,
        location: &str,
        credential: Option<&str>,
        config: RenderConfig,
    ) -> Result<Self, OpenError> {
        config.validate().map_err(OpenError::Config)?;

        let source = opener.open(location, credential).await?;
        Self::from_source(file_name_of(location), source, config, Handle::current())
    }

    /// Build a document over an already opened page source.
    ///
    /// `workers` is the runtime whose blocking pool runs background work. If
    /// prefetch is enabled it starts before this returns.
    pub fn from_source(
        file_name: impl Into<String>,
        source: Arc<dyn PageSource>,
        config: RenderConfig,
        workers: Handle,
    ) -> Result<Self, OpenError> {
        config.validate().map_err(OpenError::Config)?;
        let file_name = file_name.into();

        let coordinator = Arc::new(RenderCoordinator::new(
            Arc::clone(&source),
            config.rasterizer(),
            config.page_cache(),
            workers.clone(),
            config.render_workers,
        ));

        info!(
            file = %file_name,
            pages = coordinator.page_count(),
            prefetch = config.prefetch,
            "Document opened"
        );

        let prefetch = config
            .prefetch
            .then(|| Prefetcher::new(Arc::clone(&coordinator)).spawn(&workers));

        Ok(Self {
            file_name,
            source,
            coordinator,
            prefetch: Mutex::new(prefetch),
        })
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn page_count(&self) -> usize {
        self.coordinator.page_count()
    }

    /// Size of a page in points, without rendering it.
    pub fn page_size(&self, index: PageIndex) -> Result<PageSize, RenderError> {
        if !index.is_valid_for(self.page_count()) {
            return Err(RenderError::PageOutOfRange {
                index,
                page_count: self.page_count(),
            });
        }
        Ok(self.source.page_size(index)?)
    }

    /// Get a page image, rendering on the calling thread on a cache miss.
    ///
    /// See [`RenderCoordinator::get_page`].
    pub fn get_page(&self, index: PageIndex) -> Result<RasterImage, RenderError> {
        self.coordinator.get_page(index)
    }

    /// Get a page image without blocking.
    ///
    /// See [`RenderCoordinator::get_page_async`].
    pub fn get_page_async<D, F>(&self, index: PageIndex, delivery: D, completion: F)
    where
        D: Delivery,
        F: FnOnce(Result<RasterImage, RenderError>) + Send + 'static,
    {
        self.coordinator.get_page_async(index, delivery, completion);
    }

    /// Every page that renders successfully, in ascending order.
    pub fn all_pages(&self) -> AllPages<'_> {
        self.coordinator.all_pages()
    }

    /// Wait for the background prefetch to finish.
    ///
    /// Returns `None` if prefetch was disabled, was already awaited, or the
    /// walk itself failed.
    pub async fn wait_for_prefetch(&self) -> Option<PrefetchReport> {
        let handle = self
            .prefetch
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()?;

        match handle.await {
            Ok(report) => Some(report),
            Err(e) => {
                warn!(file = %self.file_name, error = %e, "Prefetch task failed");
                None
            }
        }
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.coordinator.cache_stats()
    }

    /// Number of physical page renders performed so far.
    pub fn render_count(&self) -> u64 {
        self.coordinator.render_count()
    }

    /// Evict least recently used pages until the cache holds at most
    /// `max_bytes`. Returns the number of pages evicted.
    ///
    /// Intended for memory pressure notifications.
    pub fn trim_cache(&self, max_bytes: usize) -> usize {
        let evicted = self.coordinator.cache().trim_to(max_bytes);
        if evicted > 0 {
            debug!(file = %self.file_name, evicted, max_bytes, "Trimmed page cache");
        }
        evicted
    }

    /// Cancel queued renders and the prefetch walk.
    ///
    /// Later page requests fail with `Cancelled`. Idempotent.
    pub fn close(&self) {
        self.coordinator.shutdown();
    }

    pub fn is_closed(&self) -> bool {
        self.coordinator.is_shut_down()
    }
}

impl Drop for Document {
    fn drop(&mut self) {
        self.coordinator.shutdown();
    }
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("file_name", &self.file_name)
            .field("coordinator", &self.coordinator)
            .finish()
    }
}

/// Final path component of `location`, or the whole location if it has none.
fn file_name_of(location: &str) -> String {
    Path::new(location)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| location.to_string())
}
